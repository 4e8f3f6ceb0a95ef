//! End-to-end checks against the embedded reference building.

use std::sync::Arc;
use std::thread;

use egress_core::{
    estimate_distance, route, BuildingConfig, Error, ExitAdmission, ExitConfig, Localizer,
    PathLossParams, SegmentSet, UnsafeSegments,
};
use egress_types::{Point, Reading};

fn building() -> (BuildingConfig, Arc<egress_core::BuildingGraph>) {
    let cfg = BuildingConfig::reference().unwrap();
    let graph = Arc::new(cfg.graph().unwrap());
    (cfg, graph)
}

#[test]
fn stair_hall_to_entrance() {
    let (_, graph) = building();
    let r = route(&graph, "Stair Hall", "Entrance", &SegmentSet::new()).unwrap();
    assert_eq!(r.path, vec!["Stair Hall", "Verandah", "Entrance"]);
    assert_eq!(format!("{:.2}", r.total_distance), "6.00");
}

#[test]
fn routes_are_optimal_despite_short_edges() {
    let (_, graph) = building();
    // Toilet2 is 8.5m from Living Room on the plan but a 1.5m walk
    let r = route(&graph, "Toilet2", "Entrance", &SegmentSet::new()).unwrap();
    assert_eq!(r.path, vec!["Toilet2", "Living Room", "Verandah", "Entrance"]);
    assert_eq!(r.total_distance, 9.0);
}

#[test]
fn unsafe_verandah_detours_through_living_room() {
    let (_, graph) = building();
    let unsafe_segments = UnsafeSegments::new();
    unsafe_segments.mark(&graph, "Verandah", "Stair Hall").unwrap();
    let r = route(&graph, "Stair Hall", "Entrance", &unsafe_segments.snapshot()).unwrap();
    assert_eq!(r.path, vec!["Stair Hall", "Dining Space", "Living Room", "Verandah", "Entrance"]);
    assert_eq!(r.total_distance, 13.5);

    unsafe_segments.mark(&graph, "Entrance", "Verandah").unwrap();
    assert!(matches!(
        route(&graph, "Stair Hall", "Entrance", &unsafe_segments.snapshot()),
        Err(Error::NoPathFound { .. })
    ));
}

#[test]
fn reference_rssi_is_one_meter() {
    assert_eq!(estimate_distance(-55.0, &PathLossParams::default()).d_est, 1.00);
}

#[test]
fn device_near_master_bedroom_exits_via_balcony1() {
    let (cfg, graph) = building();
    let localizer = Localizer::from_config(&cfg, &graph).unwrap();
    let admission = ExitAdmission::new(graph.clone(), &cfg.exits).unwrap();

    let truth = Point::new(2.4, 7.2);
    let readings: Vec<Reading> = localizer
        .anchors()
        .iter()
        .map(|(name, p)| Reading::new(name.clone(), cfg.path_loss.rssi_at(truth.distance_to(p))))
        .collect();
    let fix = localizer.locate(&readings, &graph).unwrap();
    assert_eq!(fix.node, "Master Bedroom");

    let session = admission
        .assign("phone-1", &fix.node, Some(fix.position), |exit| {
            route(&graph, &fix.node, exit, &SegmentSet::new())
        })
        .unwrap();
    assert_eq!(session.assigned_exit, "Balcony1");
    assert_eq!(session.path, vec!["Master Bedroom", "Balcony1"]);
    assert_eq!(session.to_result().total_distance, "1.00 meters");
}

#[test]
fn concurrent_assigns_never_exceed_capacity() {
    let (_, graph) = building();
    const CAPACITY: usize = 7;
    const DEVICES: usize = 64;
    let admission = ExitAdmission::new(
        graph.clone(),
        &[ExitConfig { node: "Entrance".into(), capacity: CAPACITY }],
    )
    .unwrap();

    let outcomes: Vec<Result<String, Error>> = thread::scope(|s| {
        let handles: Vec<_> = (0..DEVICES)
            .map(|i| {
                let (admission, graph) = (&admission, &graph);
                s.spawn(move || {
                    admission
                        .assign(&format!("dev-{i}"), "Kitchen", None, |exit| {
                            route(graph, "Kitchen", exit, &SegmentSet::new())
                        })
                        .map(|session| session.assigned_exit)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let admitted = outcomes.iter().filter(|o| o.is_ok()).count();
    let rejected = outcomes.iter().filter(|o| matches!(o, Err(Error::NoExitAvailable))).count();
    assert_eq!(admitted, CAPACITY);
    assert_eq!(rejected, DEVICES - CAPACITY);

    let snap = admission.snapshot();
    assert_eq!(snap.exits[0].occupants.len(), CAPACITY);
    assert_eq!(snap.sessions.len(), CAPACITY);
}

#[test]
fn concurrent_release_and_assign_round_trip() {
    let (cfg, graph) = building();
    let admission = ExitAdmission::new(graph.clone(), &cfg.exits).unwrap();
    let plan = |from: &'static str| {
        let graph = graph.clone();
        move |exit: &str| route(&graph, from, exit, &SegmentSet::new())
    };

    for i in 0..20 {
        admission.assign(&format!("dev-{i}"), "Verandah", None, plan("Verandah")).unwrap();
    }

    thread::scope(|s| {
        for i in 0..20 {
            let admission = &admission;
            let plan = &plan;
            s.spawn(move || {
                let tag = format!("dev-{i}");
                let exit = admission.release(&tag).unwrap();
                let again = admission.assign(&tag, "Verandah", None, plan("Verandah")).unwrap();
                assert!(!exit.is_empty() && !again.assigned_exit.is_empty());
            });
        }
    });

    let snap = admission.snapshot();
    let occupied: usize = snap.exits.iter().map(|e| e.occupants.len()).sum();
    assert_eq!(occupied, 20);
    assert!(snap.exits.iter().all(|e| e.occupants.len() <= e.capacity));
}
