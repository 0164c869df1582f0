//! Planimetric geometry primitives shared by the mesh algorithms.

mod bounds;
mod point3;

pub use bounds::Bounds3;
pub use point3::Point3;

/// Twice the signed area of triangle `a`, `b`, `c`. Positive when anticlockwise.
pub fn orient2d(a: &Point3, b: &Point3, c: &Point3) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Signed perpendicular distance of `p` from the infinite line through `a` and `b`.
///
/// Positive when `p` lies to the left of `a -> b`. Returns the distance to `a`
/// when the segment is degenerate.
pub fn signed_distance_to_line(a: &Point3, b: &Point3, p: &Point3) -> f64 {
    let len = a.distance_xy(b);
    if len == 0.0 {
        return a.distance_xy(p);
    }
    orient2d(a, b, p) / len
}

/// Parameter of the projection of `p` onto `a -> b` (0 at `a`, 1 at `b`).
pub fn projection_parameter(a: &Point3, b: &Point3, p: &Point3) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return 0.0;
    }
    ((p.x - a.x) * dx + (p.y - a.y) * dy) / len2
}

/// Distance from `p` to the closed segment `a`-`b`.
pub fn distance_to_segment(a: &Point3, b: &Point3, p: &Point3) -> f64 {
    let t = projection_parameter(a, b, p).clamp(0.0, 1.0);
    let q = lerp(a, b, t);
    q.distance_xy(p)
}

/// Linear interpolation between `a` and `b`, elevation included.
pub fn lerp(a: &Point3, b: &Point3, t: f64) -> Point3 {
    Point3::new(
        a.x + (b.x - a.x) * t,
        a.y + (b.y - a.y) * t,
        a.z + (b.z - a.z) * t,
    )
}

/// Intersection parameter along `c -> d` of the infinite lines `a -> b` and `c -> d`.
pub fn line_intersection_parameter(a: &Point3, b: &Point3, c: &Point3, d: &Point3) -> Option<f64> {
    let rx = b.x - a.x;
    let ry = b.y - a.y;
    let sx = d.x - c.x;
    let sy = d.y - c.y;
    let denom = sx * ry - sy * rx;
    if denom == 0.0 {
        return None;
    }
    Some(((a.x - c.x) * ry - (a.y - c.y) * rx) / denom)
}

/// Elevation of the plane through `a`, `b`, `c` at planimetric position (`x`, `y`).
pub fn plane_elevation(a: &Point3, b: &Point3, c: &Point3, x: f64, y: f64) -> Option<f64> {
    let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    if det == 0.0 {
        return None;
    }
    let w1 = ((b.y - c.y) * (x - c.x) + (c.x - b.x) * (y - c.y)) / det;
    let w2 = ((c.y - a.y) * (x - c.x) + (a.x - c.x) * (y - c.y)) / det;
    let w3 = 1.0 - w1 - w2;
    Some(w1 * a.z + w2 * b.z + w3 * c.z)
}

/// Signed shoelace area of a polygon ring. Positive when anticlockwise.
///
/// A repeated closing vertex contributes nothing, so open and closed rings
/// give the same answer.
pub fn signed_area(vertices: &[Point3]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..vertices.len() {
        let j = (i + 1) % vertices.len();
        sum += vertices[i].x * vertices[j].y - vertices[j].x * vertices[i].y;
    }
    sum * 0.5
}

/// Returns the absolute area of a polygon defined by its vertices.
pub fn polygon_area(vertices: &[Point3]) -> f64 {
    signed_area(vertices).abs()
}

/// Planimetric length of the closed ring through `vertices`.
pub fn polygon_perimeter(vertices: &[Point3]) -> f64 {
    if vertices.len() < 2 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..vertices.len() {
        let j = (i + 1) % vertices.len();
        sum += vertices[i].distance_xy(&vertices[j]);
    }
    sum
}

/// Ray-casting containment test used for diagnostics and tests only; the
/// mesh algorithms classify topologically.
pub fn point_in_polygon(p: &Point3, ring: &[Point3]) -> bool {
    let mut inside = false;
    if ring.len() < 3 {
        return false;
    }
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (pi, pj) = (&ring[i], &ring[j]);
        if (pi.y > p.y) != (pj.y > p.y)
            && p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}
