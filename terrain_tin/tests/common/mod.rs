#![allow(dead_code)]

use terrain_tin::{FeatureAttributes, FeatureIndex, FeatureType, Point3, PointId, TinMesh, TinSettings};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Square grid of `cells` x `cells` cells, each split along its rising diagonal.
pub fn grid(cells: usize, origin: (f64, f64), step: f64, z: impl Fn(f64, f64) -> f64) -> TinMesh {
    let n = cells + 1;
    let mut points = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            let x = origin.0 + i as f64 * step;
            let y = origin.1 + j as f64 * step;
            points.push(Point3::new(x, y, z(x, y)));
        }
    }
    let mut triangles = Vec::new();
    for j in 0..cells {
        for i in 0..cells {
            let a = j * n + i;
            triangles.push([a, a + 1, a + n + 1]);
            triangles.push([a, a + n + 1, a + n]);
        }
    }
    TinMesh::from_triangles(points, &triangles, TinSettings::default()).unwrap()
}

pub fn flat_grid(cells: usize) -> TinMesh {
    grid(cells, (0.0, 0.0), 1.0, |_, _| 0.0)
}

pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point3> {
    vec![
        Point3::new(x0, y0, 0.0),
        Point3::new(x1, y0, 0.0),
        Point3::new(x1, y1, 0.0),
        Point3::new(x0, y1, 0.0),
    ]
}

pub fn point_at(mesh: &TinMesh, x: f64, y: f64) -> PointId {
    let p = mesh.closest_point(x, y).unwrap();
    let at = mesh.point(p);
    assert!((at.x - x).abs() < 1e-9 && (at.y - y).abs() < 1e-9, "no point at ({x}, {y})");
    p
}

/// Threads a closed feature through existing mesh points at `corners`.
pub fn add_ring_feature(
    mesh: &mut TinMesh,
    feature_type: FeatureType,
    corners: &[(f64, f64)],
    feature_id: Option<i64>,
) -> FeatureIndex {
    let ids: Vec<PointId> = corners.iter().map(|&(x, y)| point_at(mesh, x, y)).collect();
    let mut chain = vec![ids[0]];
    for i in 0..ids.len() {
        let segment = mesh.insert_line(ids[i], ids[(i + 1) % ids.len()]).unwrap();
        chain.extend(segment.into_iter().skip(1));
    }
    let attributes = FeatureAttributes {
        user_tag: None,
        feature_id,
    };
    mesh.add_feature(feature_type, attributes, &chain).unwrap()
}

pub fn feature_area(mesh: &TinMesh, fi: FeatureIndex) -> f64 {
    terrain_tin::geometry::polygon_area(&mesh.feature_coordinates(fi).unwrap())
}

pub fn total_area(mesh: &TinMesh, feature_type: FeatureType) -> f64 {
    mesh.features_of_type(feature_type)
        .into_iter()
        .map(|f| feature_area(mesh, f))
        .sum()
}

/// Triangles as sorted coordinate triples, independent of point numbering.
pub fn triangle_coords(mesh: &TinMesh) -> Vec<[(i64, i64); 3]> {
    let key = |p: PointId| {
        let c = mesh.point(p);
        ((c.x * 1e6).round() as i64, (c.y * 1e6).round() as i64)
    };
    let mut out: Vec<[(i64, i64); 3]> = mesh
        .triangles()
        .into_iter()
        .map(|t| {
            let mut k = [key(t[0]), key(t[1]), key(t[2])];
            k.sort();
            k
        })
        .collect();
    out.sort();
    out
}
