//! Untriangulated point and feature collections.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::geometry::Point3;
use crate::store::{FeatureState, FeatureType, TinMesh};

/// A feature stored by its coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFeature {
    pub feature_type: FeatureType,
    pub state: FeatureState,
    pub user_tag: Option<i64>,
    pub feature_id: Option<i64>,
    pub guid: Uuid,
    pub points: Vec<Point3>,
}

impl DataFeature {
    pub fn new(feature_type: FeatureType, points: Vec<Point3>) -> Self {
        Self {
            feature_type,
            state: FeatureState::Active,
            user_tag: None,
            feature_id: None,
            guid: Uuid::new_v4(),
            points,
        }
    }

    pub fn with_user_tag(mut self, tag: i64) -> Self {
        self.user_tag = Some(tag);
        self
    }

    pub fn with_feature_id(mut self, id: i64) -> Self {
        self.feature_id = Some(id);
        self
    }

    /// True when the last point repeats the first.
    pub fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) => self.points.len() > 2 && a.same_xy(b),
            _ => false,
        }
    }
}

/// Random spots plus features, the input of triangulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    pub points: Vec<Point3>,
    pub features: Vec<DataFeature>,
}

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a feature and returns its position.
    pub fn add_feature(&mut self, feature: DataFeature) -> usize {
        self.features.push(feature);
        self.features.len() - 1
    }

    /// Active features of one type.
    pub fn count(&self, feature_type: FeatureType) -> usize {
        self.features
            .iter()
            .filter(|f| f.feature_type == feature_type && f.state == FeatureState::Active)
            .count()
    }

    /// Copies every feature record of a mesh, threaded or detached.
    pub fn from_mesh(mesh: &TinMesh) -> Result<DataSet> {
        let mut out = DataSet::new();
        for fi in 0..mesh.feature_slots() {
            let fi = crate::store::FeatureIndex(fi);
            let record = mesh.feature(fi);
            if record.state == FeatureState::Deleted {
                continue;
            }
            out.features.push(DataFeature {
                feature_type: record.feature_type,
                state: record.state,
                user_tag: record.attributes.user_tag,
                feature_id: record.attributes.feature_id,
                guid: record.guid,
                points: mesh.feature_coordinates(fi)?,
            });
        }
        Ok(out)
    }
}
