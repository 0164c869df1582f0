mod common;

use terrain_tin::{
    join_features, join_features_with, DataFeature, DataSet, FeatureType, JoinDirection, JoinOptions,
    Point3, TinError,
};

fn line(points: &[(f64, f64)]) -> DataFeature {
    DataFeature::new(
        FeatureType::Breakline,
        points.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect(),
    )
    .with_user_tag(1)
}

#[test]
fn two_lines_sharing_an_end_join() {
    common::init_logging();
    let mut data = DataSet::new();
    data.add_feature(line(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.5)]));
    data.add_feature(line(&[(2.0, 0.5), (3.0, 1.0)]));
    let report = join_features(&mut data, FeatureType::Breakline, 0.01).unwrap();
    assert_eq!(report.before, 2);
    assert_eq!(report.after, 1);
    assert_eq!(data.features.len(), 1);
    assert_eq!(data.features[0].points.len(), 3 + 2 - 1);
    assert_eq!(report.provenance.len(), 2);
    assert!(report.provenance.iter().all(|r| r.user_tag == Some(1)));
}

#[test]
fn joined_loop_is_left_open() {
    let mut data = DataSet::new();
    data.add_feature(line(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]));
    data.add_feature(line(&[(1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]));
    let report = join_features(&mut data, FeatureType::Breakline, 0.01).unwrap();
    assert_eq!(report.after, 1);
    let joined = &data.features[0];
    assert_eq!(joined.feature_type, FeatureType::Breakline);
    assert_eq!(joined.points.len(), 5);
    assert_eq!(joined.points.first(), joined.points.last());
}

#[test]
fn join_result_does_not_depend_on_input_order() {
    let pieces = [
        line(&[(0.0, 0.0), (1.0, 0.0)]),
        line(&[(1.0, 0.0), (2.0, 0.0)]),
        line(&[(3.0, 0.0), (2.0, 0.0)]),
        line(&[(3.0, 0.0), (4.0, 1.0)]),
    ];
    for order in [[0, 1, 2, 3], [3, 2, 1, 0], [2, 0, 3, 1], [1, 3, 0, 2]] {
        let mut data = DataSet::new();
        for i in order {
            data.add_feature(pieces[i].clone());
        }
        let report = join_features(&mut data, FeatureType::Breakline, 0.0).unwrap();
        assert_eq!(report.before, 4);
        assert_eq!(report.after, 1);
        assert_eq!(data.features[0].points.len(), 5);
    }
}

#[test]
fn gap_within_tolerance_keeps_both_points() {
    let mut data = DataSet::new();
    data.add_feature(line(&[(0.0, 0.0), (1.0, 0.0)]));
    data.add_feature(line(&[(1.005, 0.0), (2.0, 0.0)]));
    let report = join_features(&mut data, FeatureType::Breakline, 0.01).unwrap();
    assert_eq!(report.after, 1);
    assert_eq!(data.features[0].points.len(), 4);
    let far = join_features(&mut data, FeatureType::Breakline, 0.001).unwrap();
    assert_eq!(far.after, 1);
}

#[test]
fn nearest_end_wins() {
    let mut data = DataSet::new();
    data.add_feature(line(&[(0.0, 0.0), (1.0, 0.0)]));
    data.add_feature(line(&[(1.004, 0.0), (2.0, 0.0)]));
    data.add_feature(line(&[(1.001, 0.0), (1.0, 2.0)]));
    let report = join_features(&mut data, FeatureType::Breakline, 0.01).unwrap();
    assert_eq!(report.before, 3);
    assert_eq!(report.after, 2);
    let joined = data.features.last().unwrap();
    assert!(joined.points.iter().any(|p| (p.y - 2.0).abs() < 1e-12));
}

#[test]
fn different_tags_do_not_join() {
    let mut data = DataSet::new();
    data.add_feature(line(&[(0.0, 0.0), (1.0, 0.0)]));
    data.add_feature(line(&[(1.0, 0.0), (2.0, 0.0)]).with_user_tag(2));
    let report = join_features(&mut data, FeatureType::Breakline, 0.01).unwrap();
    assert_eq!(report.after, 2);
    assert!(report.provenance.is_empty());
}

#[test]
fn contours_need_equal_elevation() {
    let contour = |a: (f64, f64, f64), b: (f64, f64, f64)| {
        DataFeature::new(
            FeatureType::ContourLine,
            vec![Point3::new(a.0, a.1, a.2), Point3::new(b.0, b.1, b.2)],
        )
    };
    let mut data = DataSet::new();
    data.add_feature(contour((0.0, 0.0, 10.0), (1.0, 0.0, 10.0)));
    data.add_feature(contour((1.0, 0.0, 11.0), (2.0, 0.0, 11.0)));
    data.add_feature(contour((2.0, 0.0, 11.0), (3.0, 0.0, 11.0)));
    let report = join_features(&mut data, FeatureType::ContourLine, 0.01).unwrap();
    assert_eq!(report.before, 3);
    assert_eq!(report.after, 2);
}

#[test]
fn closed_features_are_counted_but_untouched() {
    let mut data = DataSet::new();
    let ring = line(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
    data.add_feature(ring.clone());
    data.add_feature(line(&[(0.0, 0.0), (-1.0, 0.0)]));
    let report = join_features(&mut data, FeatureType::Breakline, 0.01).unwrap();
    assert_eq!(report.before, 2);
    assert_eq!(report.after, 2);
    assert_eq!(data.features[0], ring);
}

#[test]
fn output_type_and_provenance_directions() {
    let mut data = DataSet::new();
    data.add_feature(line(&[(0.0, 0.0), (1.0, 0.0)]).with_feature_id(10));
    data.add_feature(line(&[(2.0, 0.0), (1.0, 0.0)]).with_feature_id(11));
    let options = JoinOptions {
        output_type: Some(FeatureType::SoftBreakline),
    };
    let report = join_features_with(&mut data, FeatureType::Breakline, 0.01, &options).unwrap();
    assert_eq!(report.after, 0);
    assert_eq!(data.count(FeatureType::SoftBreakline), 1);
    let legs: Vec<(Option<i64>, JoinDirection)> = report
        .provenance
        .iter()
        .map(|r| (r.feature_id, r.direction))
        .collect();
    assert_eq!(legs, vec![(Some(10), JoinDirection::Forward), (Some(11), JoinDirection::Reverse)]);
    assert_eq!(data.features[0].feature_id, Some(10));
    assert_eq!(data.features[0].points.len(), 3);
}

#[test]
fn bad_arguments_are_rejected() {
    let mut data = DataSet::new();
    assert!(matches!(
        join_features(&mut data, FeatureType::Void, 0.1),
        Err(TinError::Validation(_))
    ));
    assert!(matches!(
        join_features(&mut data, FeatureType::Breakline, -1.0),
        Err(TinError::Validation(_))
    ));
}
