//! Core library for terrain surface editing: a triangulated irregular
//! network with threaded features, polygon clipping, void reconciliation,
//! elevation differencing, cut and fill volumes and feature joining.

pub mod check;
pub mod clip;
pub mod dataset;
pub mod delta;
mod edit;
pub mod error;
pub mod geometry;
pub mod io;
pub mod join;
pub mod locate;
pub mod oracle;
pub mod precision;
pub mod reconcile;
mod region;
pub mod settings;
pub mod store;
pub mod triangulate;
pub mod volume;

pub use clip::{clip_to_polygon, clone_and_clip, ClipMode};
pub use dataset::{DataFeature, DataSet};
pub use delta::{clone_and_delta_to_elevation, delta_between, delta_to_elevation, DeltaSurface};
pub use error::{Result, TinError};
pub use geometry::{Bounds3, Point3};
pub use join::{join_features, join_features_with, JoinDirection, JoinOptions, JoinRecord, JoinReport};
pub use locate::Location;
pub use oracle::{Classification, Intersection, Oracle, Polygon};
pub use reconcile::reconcile;
pub use settings::TinSettings;
pub use store::{FeatureAttributes, FeatureIndex, FeatureState, FeatureType, MeshState, NodeFlags, PointId, TinMesh};
pub use triangulate::{triangulate_dataset, triangulate_points};
pub use volume::{volumes_between, volumes_to_elevation, volumes_within, Volumes};
