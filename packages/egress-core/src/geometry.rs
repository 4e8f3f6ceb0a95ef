//! Planar helpers: wall segments, line-of-sight and the localization area.

use egress_types::Point;
use serde::Deserialize;

/// A wall (or any radio obstruction) as a straight segment.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "WallSpec")]
pub struct Wall {
    pub from: Point,
    pub to: Point,
}

#[derive(Deserialize)]
struct WallSpec {
    from: [f64; 2],
    to: [f64; 2],
}

impl From<WallSpec> for Wall {
    fn from(w: WallSpec) -> Self {
        Self { from: w.from.into(), to: w.to.into() }
    }
}

impl Wall {
    pub fn new(from: Point, to: Point) -> Self { Self { from, to } }

    /// True if the straight line a→b crosses this wall.
    pub fn blocks(&self, a: &Point, b: &Point) -> bool {
        segments_intersect(a, b, &self.from, &self.to)
    }
}

/// Strict counter-clockwise orientation of the triangle (a, b, c).
fn ccw(a: &Point, b: &Point, c: &Point) -> bool {
    (c.y - a.y) * (b.x - a.x) > (b.y - a.y) * (c.x - a.x)
}

/// Proper intersection test for segments p1–p2 and p3–p4.
/// Collinear overlaps and touching endpoints do not count as crossings.
pub fn segments_intersect(p1: &Point, p2: &Point, p3: &Point, p4: &Point) -> bool {
    ccw(p1, p3, p4) != ccw(p2, p3, p4) && ccw(p1, p2, p3) != ccw(p1, p2, p4)
}

/// Axis-aligned rectangle the particle filter samples from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    pub fn new(min: Point, max: Point) -> Self { Self { min, max } }

    /// Smallest rectangle containing every point; `None` for an empty input.
    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        points.into_iter().fold(None, |acc: Option<Bounds>, p| {
            Some(match acc {
                None => Bounds::new(*p, *p),
                Some(b) => Bounds::new(
                    Point::new(b.min.x.min(p.x), b.min.y.min(p.y)),
                    Point::new(b.max.x.max(p.x), b.max.y.max(p.y)),
                ),
            })
        })
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.min.x <= self.max.x
            && self.min.y <= self.max.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_wall_blocks_crossing_line() {
        let wall = Wall::new(Point::new(2.0, 2.0), Point::new(4.0, 4.0));
        assert!(wall.blocks(&Point::new(2.0, 4.0), &Point::new(4.0, 2.0)));
        assert!(!wall.blocks(&Point::new(0.0, 1.0), &Point::new(5.0, 1.0)));
    }

    #[test]
    fn parallel_segments_never_intersect() {
        let a = (Point::new(0.0, 0.0), Point::new(5.0, 0.0));
        let b = (Point::new(0.0, 1.0), Point::new(5.0, 1.0));
        assert!(!segments_intersect(&a.0, &a.1, &b.0, &b.1));
    }

    #[test]
    fn enclosing_bounds_cover_all_points() {
        let pts = [Point::new(1.0, 7.0), Point::new(-2.0, 3.0), Point::new(4.0, 0.5)];
        let b = Bounds::enclosing(pts.iter()).unwrap();
        assert_eq!(b.min, Point::new(-2.0, 0.5));
        assert_eq!(b.max, Point::new(4.0, 7.0));
        assert!(pts
            .iter()
            .all(|p| (b.min.x..=b.max.x).contains(&p.x) && (b.min.y..=b.max.y).contains(&p.y)));
        assert!(Bounds::enclosing(std::iter::empty::<&Point>()).is_none());
    }
}
