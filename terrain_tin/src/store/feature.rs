//! Feature table records and membership entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::PointId;
use crate::geometry::Point3;

/// Index of a record in the feature table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureIndex(pub usize);

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// Kinds of feature threaded through a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureType {
    Breakline,
    SoftBreakline,
    ContourLine,
    GroupSpots,
    Region,
    Polygon,
    Void,
    Island,
    Hole,
    Hull,
}

impl FeatureType {
    pub const ALL: [FeatureType; 10] = [
        FeatureType::Breakline,
        FeatureType::SoftBreakline,
        FeatureType::ContourLine,
        FeatureType::GroupSpots,
        FeatureType::Region,
        FeatureType::Polygon,
        FeatureType::Void,
        FeatureType::Island,
        FeatureType::Hole,
        FeatureType::Hull,
    ];

    /// Closed area features re-segmented through the polygon oracle.
    pub fn is_polygonal(self) -> bool {
        matches!(
            self,
            FeatureType::Region
                | FeatureType::Polygon
                | FeatureType::Void
                | FeatureType::Island
                | FeatureType::Hole
        )
    }

    pub fn is_linear(self) -> bool {
        matches!(
            self,
            FeatureType::Breakline | FeatureType::SoftBreakline | FeatureType::ContourLine
        )
    }

    /// Features whose interior is excluded from the surface.
    pub fn excludes_surface(self) -> bool {
        matches!(self, FeatureType::Void | FeatureType::Hole)
    }

    pub fn name(self) -> &'static str {
        match self {
            FeatureType::Breakline => "breakline",
            FeatureType::SoftBreakline => "soft_breakline",
            FeatureType::ContourLine => "contour",
            FeatureType::GroupSpots => "group_spots",
            FeatureType::Region => "region",
            FeatureType::Polygon => "polygon",
            FeatureType::Void => "void",
            FeatureType::Island => "island",
            FeatureType::Hole => "hole",
            FeatureType::Hull => "hull",
        }
    }
}

impl std::str::FromStr for FeatureType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        FeatureType::ALL
            .iter()
            .copied()
            .find(|t| t.name() == lower)
            .ok_or_else(|| format!("unknown feature type '{s}'"))
    }
}

/// Lifecycle of a feature record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureState {
    Active,
    Deleted,
    /// Could not be inserted; coordinates kept for reporting.
    TinError,
    /// Left behind by an interrupted edit.
    RollbackPending,
}

/// Attributes copied onto every piece of a feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureAttributes {
    pub user_tag: Option<i64>,
    pub feature_id: Option<i64>,
}

/// Row of the feature table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub feature_type: FeatureType,
    pub state: FeatureState,
    pub first_point: Option<PointId>,
    pub attributes: FeatureAttributes,
    pub guid: Uuid,
    /// Void or hole enclosing an island, kept current by reconciliation.
    pub internal_to: Option<FeatureIndex>,
    /// Coordinates of features that are not threaded through the mesh.
    pub coordinates: Vec<Point3>,
}

impl FeatureRecord {
    pub fn is_active(&self) -> bool {
        self.state == FeatureState::Active
    }
}

/// Membership of a point in one feature, and that feature's next point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureListEntry {
    pub feature: FeatureIndex,
    pub next_point: Option<PointId>,
    pub next: Option<usize>,
}
