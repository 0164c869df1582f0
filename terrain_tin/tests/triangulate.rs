mod common;

use common::{init_logging, point_at, rect};
use terrain_tin::check::check_topology;
use terrain_tin::{
    triangulate_dataset, triangulate_points, DataFeature, DataSet, FeatureState, FeatureType, Point3, TinError,
    TinMesh, TinSettings,
};

fn lattice(n: usize, step: f64) -> Vec<Point3> {
    let mut points = Vec::new();
    for j in 0..=n {
        for i in 0..=n {
            let (x, y) = (i as f64 * step, j as f64 * step);
            points.push(Point3::new(x, y, x - y));
        }
    }
    points
}

#[test]
fn points_are_deduplicated_before_triangulation() {
    init_logging();
    let mut points = rect(0.0, 0.0, 1.0, 1.0);
    points.push(Point3::new(1.0, 1.0, 7.0));
    points.push(Point3::new(0.5, 0.4, 0.0));
    let mesh = triangulate_points(&points, &TinSettings::default()).unwrap();
    assert_eq!(mesh.point_count(), 5);
    assert_eq!(mesh.triangle_count(), 4);
    assert!((mesh.area() - 1.0).abs() < 1e-12);
    check_topology(&mesh).unwrap();
}

#[test]
fn degenerate_point_sets_are_rejected() {
    let settings = TinSettings::default();
    let two = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
    assert!(matches!(triangulate_points(&two, &settings), Err(TinError::Validation(_))));
    let line: Vec<Point3> = (0..5).map(|i| Point3::new(i as f64, 2.0 * i as f64, 0.0)).collect();
    assert!(matches!(triangulate_points(&line, &settings), Err(TinError::Validation(_))));
}

#[test]
fn breakline_is_forced_into_the_surface() {
    let mut data = DataSet::new();
    data.points = lattice(4, 1.0);
    let line = vec![Point3::new(0.5, 0.25, 0.0), Point3::new(3.5, 3.75, 0.0)];
    data.add_feature(DataFeature::new(FeatureType::Breakline, line).with_feature_id(11));
    let mesh = triangulate_dataset(&data, &TinSettings::default()).unwrap();
    check_topology(&mesh).unwrap();

    let lines = mesh.features_of_type(FeatureType::Breakline);
    assert_eq!(lines.len(), 1);
    assert_eq!(mesh.feature(lines[0]).attributes.feature_id, Some(11));
    let coords = mesh.feature_coordinates(lines[0]).unwrap();
    assert!(coords.len() > 2);
    assert!(coords[0].same_xy(&Point3::new(0.5, 0.25, 0.0)));
    assert!(coords[coords.len() - 1].same_xy(&Point3::new(3.5, 3.75, 0.0)));
    // Every vertex of the chain lies on the straight line between its ends.
    for c in &coords {
        let t = (c.x - 0.5) / 3.0;
        assert!((c.y - (0.25 + 3.5 * t)).abs() < 1e-9);
    }
}

#[test]
fn void_feature_is_excluded_from_the_surface() {
    let mut data = DataSet::new();
    data.points = lattice(4, 1.0);
    data.add_feature(DataFeature::new(FeatureType::Void, rect(1.0, 1.0, 3.0, 3.0)));
    let mesh = triangulate_dataset(&data, &TinSettings::default()).unwrap();
    assert_eq!(mesh.count_features(FeatureType::Void), 1);
    assert!((mesh.area() - 16.0).abs() < 1e-9);
    assert!((mesh.surface_area().unwrap() - 12.0).abs() < 1e-9);
    assert!(mesh.is_void(point_at(&mesh, 2.0, 2.0)));
    assert!(!mesh.is_void(point_at(&mesh, 0.0, 0.0)));
}

#[test]
fn hull_feature_clips_the_result() {
    let mut data = DataSet::new();
    data.points = lattice(4, 1.0);
    data.add_feature(DataFeature::new(FeatureType::Hull, rect(0.5, 0.5, 2.5, 3.5)));
    let mesh = triangulate_dataset(&data, &TinSettings::default()).unwrap();
    assert!((mesh.area() - 6.0).abs() < 1e-9);
    let bounds = mesh.bounds();
    assert!((bounds.min.x - 0.5).abs() < 1e-9);
    assert!((bounds.max.y - 3.5).abs() < 1e-9);
    check_topology(&mesh).unwrap();
}

#[test]
fn inactive_features_are_ignored() {
    let mut data = DataSet::new();
    data.points = lattice(2, 1.0);
    let mut stale = DataFeature::new(FeatureType::Breakline, vec![Point3::new(0.5, 0.5, 0.0), Point3::new(1.5, 0.5, 0.0)]);
    stale.state = FeatureState::Deleted;
    data.add_feature(stale);
    let mesh = triangulate_dataset(&data, &TinSettings::default()).unwrap();
    assert_eq!(mesh.point_count(), 9);
    assert_eq!(mesh.active_features().len(), 0);
}

#[test]
fn explicit_triangles_accept_either_winding() {
    let points = rect(0.0, 0.0, 1.0, 1.0);
    let mesh = TinMesh::from_triangles(points, &[[0, 2, 1], [0, 3, 2]], TinSettings::default()).unwrap();
    assert_eq!(mesh.triangle_count(), 2);
    assert_eq!(mesh.hull_points().unwrap().len(), 4);
    check_topology(&mesh).unwrap();
}

#[test]
fn explicit_triangles_drop_unused_points() {
    let mut points = rect(0.0, 0.0, 1.0, 1.0);
    points.push(Point3::new(9.0, 9.0, 0.0));
    let mesh = TinMesh::from_triangles(points, &[[0, 1, 2], [0, 2, 3]], TinSettings::default()).unwrap();
    assert_eq!(mesh.point_count(), 4);
    assert_eq!(mesh.point_slots(), 4);
    assert!((mesh.bounds().max.x - 1.0).abs() < 1e-12);
}

#[test]
fn overlapping_triangles_are_rejected() {
    let points = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(1.0, 2.0, 0.0),
    ];
    let err = TinMesh::from_triangles(points.clone(), &[[0, 1, 2], [0, 1, 3]], TinSettings::default()).unwrap_err();
    assert!(err.is_fatal());
    let err = TinMesh::from_triangles(points, &[[0, 1, 7]], TinSettings::default()).unwrap_err();
    assert!(matches!(err, TinError::Validation(_)));
}
