mod common;

use common::{add_ring_feature, grid};
use tempfile::NamedTempFile;
use terrain_tin::io::{
    read_geojson_dataset, read_landxml_surface, read_snapshot, write_geojson_dataset, write_landxml_surface,
    write_snapshot,
};
use terrain_tin::{DataFeature, DataSet, FeatureType, Point3, TinSettings};

#[test]
fn landxml_roundtrip_keeps_surface_and_features() {
    let mut mesh = grid(4, (0.0, 0.0), 1.0, |x, y| x * y);
    add_ring_feature(&mut mesh, FeatureType::Void, &[(1.0, 1.0), (3.0, 1.0), (3.0, 3.0), (1.0, 3.0)], Some(3));
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap();
    write_landxml_surface(path, &mesh).unwrap();
    let read = read_landxml_surface(path, &TinSettings::default()).unwrap();
    assert_eq!(read.point_count(), mesh.point_count());
    assert_eq!(read.triangle_count(), mesh.triangle_count());
    assert!((read.area() - mesh.area()).abs() < 1e-9);
    let voids = read.features_of_type(FeatureType::Void);
    assert_eq!(voids.len(), 1);
    assert_eq!(read.feature(voids[0]).attributes.feature_id, Some(3));
    assert!((read.surface_area().unwrap() - 12.0).abs() < 1e-9);
    assert!((read.drape(2.5, 0.5).unwrap().unwrap() - mesh.drape(2.5, 0.5).unwrap().unwrap()).abs() < 1e-9);
}

#[test]
fn landxml_points_without_faces_are_triangulated() {
    let xml = r#"<?xml version="1.0"?>
<LandXML><Surfaces><Surface name="S"><Definition surfType="TIN"><Pnts>
<P id="a">0 0 1</P><P id="b">2 0 1</P><P id="c">2 2 1</P><P id="d">0 2 1</P>
</Pnts></Definition></Surface></Surfaces></LandXML>"#;
    let mesh = terrain_tin::io::landxml::parse_landxml_surface(xml, &TinSettings::default()).unwrap();
    assert_eq!(mesh.point_count(), 4);
    assert!((mesh.area() - 4.0).abs() < 1e-12);
}

#[test]
fn landxml_face_with_unknown_point_is_an_error() {
    let xml = r#"<LandXML><Pnts><P id="1">0 0 0</P><P id="2">1 0 0</P><P id="3">0 1 0</P></Pnts>
<Faces><F>1 2 9</F></Faces></LandXML>"#;
    assert!(terrain_tin::io::landxml::parse_landxml_surface(xml, &TinSettings::default()).is_err());
}

#[test]
fn snapshot_roundtrip_is_exact() {
    let mut mesh = grid(3, (10.0, 20.0), 0.5, |x, y| x - y);
    add_ring_feature(&mut mesh, FeatureType::Polygon, &[(10.5, 20.5), (11.0, 20.5), (11.0, 21.0)], None);
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap();
    write_snapshot(path, &mesh).unwrap();
    let read = read_snapshot(path).unwrap();
    assert_eq!(read, mesh);
}

#[test]
fn geojson_roundtrip_keeps_attributes() {
    let mut data = DataSet::new();
    data.points.push(Point3::new(5.0, 5.0, 1.0));
    data.add_feature(
        DataFeature::new(
            FeatureType::ContourLine,
            vec![Point3::new(0.0, 0.0, 10.0), Point3::new(1.0, 1.0, 10.0)],
        )
        .with_user_tag(4)
        .with_feature_id(12),
    );
    data.add_feature(DataFeature::new(
        FeatureType::Void,
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
        ],
    ));
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap();
    write_geojson_dataset(path, &data).unwrap();
    let read = read_geojson_dataset(path).unwrap();
    assert_eq!(read, data);
}

#[test]
fn csv_points_take_optional_elevation() {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap();
    terrain_tin::io::write_string(path, "0,0,1.5\n\n 2 , 0 \n2,2,3\n").unwrap();
    let points = terrain_tin::io::read_points_csv(path).unwrap();
    assert_eq!(
        points,
        vec![Point3::new(0.0, 0.0, 1.5), Point3::new(2.0, 0.0, 0.0), Point3::new(2.0, 2.0, 3.0)]
    );
}

#[test]
fn csv_reports_the_offending_line() {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap();
    terrain_tin::io::write_string(path, "0,0,0\n1,x,0\n").unwrap();
    let err = terrain_tin::io::read_points_csv(path).unwrap_err();
    assert!(err.to_string().contains("line 2"));
    terrain_tin::io::write_string(path, "0,0,0,0\n").unwrap();
    assert!(matches!(terrain_tin::io::read_points_csv(path), Err(terrain_tin::TinError::Parse(_))));
}
