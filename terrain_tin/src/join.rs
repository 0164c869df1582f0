//! Joining fragmented linear features into polylines.
//!
//! Each open feature contributes its two end nodes to a table sorted by
//! position. A join is committed only between mutually nearest nodes, which
//! makes the result independent of input order. Joined features are walked
//! into chains and replaced by one feature per chain.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dataset::{DataFeature, DataSet};
use crate::error::{Result, TinError};
use crate::geometry::Point3;
use crate::store::{FeatureState, FeatureType};

const CONTOUR_EPSILON: f64 = 1e-9;

/// Options for [`join_features_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JoinOptions {
    /// Type given to joined features instead of the first leg's type.
    pub output_type: Option<FeatureType>,
}

/// Orientation of a leg within its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinDirection {
    Forward,
    Reverse,
}

/// One original feature consumed by a join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRecord {
    /// GUID of the feature the leg became part of.
    pub joined_guid: Uuid,
    pub feature_id: Option<i64>,
    pub guid: Uuid,
    pub direction: JoinDirection,
    pub user_tag: Option<i64>,
}

/// Outcome of a join run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinReport {
    /// Active features of the joined type before the run.
    pub before: usize,
    /// Active features of the joined type after the run.
    pub after: usize,
    pub provenance: Vec<JoinRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Start,
    Finish,
}

#[derive(Debug, Clone, Copy)]
struct EndNode {
    leg: usize,
    end: End,
    at: Point3,
    tag: Option<i64>,
}

/// Joins open features of `feature_type` whose ends lie within `tolerance`.
pub fn join_features(data: &mut DataSet, feature_type: FeatureType, tolerance: f64) -> Result<JoinReport> {
    join_features_with(data, feature_type, tolerance, &JoinOptions::default())
}

pub fn join_features_with(
    data: &mut DataSet,
    feature_type: FeatureType,
    tolerance: f64,
    options: &JoinOptions,
) -> Result<JoinReport> {
    if !feature_type.is_linear() {
        return Err(TinError::invalid(format!(
            "{} features cannot be joined",
            feature_type.name()
        )));
    }
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(TinError::invalid("join tolerance must be a non-negative number"));
    }
    let before = data.count(feature_type);

    let legs: Vec<usize> = data
        .features
        .iter()
        .enumerate()
        .filter(|(_, f)| {
            f.feature_type == feature_type
                && f.state == FeatureState::Active
                && f.points.len() >= 2
                && !f.is_closed()
        })
        .map(|(i, _)| i)
        .collect();
    debug!(
        "{} open and {} closed {} features",
        legs.len(),
        before - legs.len(),
        feature_type.name()
    );

    let mut nodes: Vec<EndNode> = Vec::with_capacity(2 * legs.len());
    for (leg, &fi) in legs.iter().enumerate() {
        let f = &data.features[fi];
        for (end, at) in [(End::Start, f.points[0]), (End::Finish, f.points[f.points.len() - 1])] {
            nodes.push(EndNode { leg, end, at, tag: f.user_tag });
        }
    }
    nodes.sort_by(|a, b| {
        a.at.x
            .total_cmp(&b.at.x)
            .then(a.at.y.total_cmp(&b.at.y))
            .then(a.leg.cmp(&b.leg))
    });

    let partner = match_ends(&nodes, legs.len(), feature_type, tolerance);
    let chains = walk_chains(&nodes, &partner, legs.len());

    let mut provenance = Vec::new();
    let mut consumed = vec![false; data.features.len()];
    let mut joined = Vec::new();
    for chain in chains.iter().filter(|c| c.len() > 1) {
        let first = &data.features[legs[chain[0].0]];
        let mut feature = DataFeature::new(
            options.output_type.unwrap_or(first.feature_type),
            Vec::new(),
        );
        feature.user_tag = first.user_tag;
        feature.feature_id = first.feature_id;
        for &(leg, direction) in chain {
            let source = &data.features[legs[leg]];
            let mut points = source.points.clone();
            if direction == JoinDirection::Reverse {
                points.reverse();
            }
            let skip = usize::from(feature.points.last() == points.first());
            feature.points.extend(points.into_iter().skip(skip));
            consumed[legs[leg]] = true;
            provenance.push(JoinRecord {
                joined_guid: feature.guid,
                feature_id: source.feature_id,
                guid: source.guid,
                direction,
                user_tag: source.user_tag,
            });
        }
        joined.push(feature);
    }

    let mut index = 0;
    data.features.retain(|_| {
        let keep = !consumed[index];
        index += 1;
        keep
    });
    data.features.extend(joined);

    let after = data.count(feature_type);
    info!("joined {} features: {before} before, {after} after", feature_type.name());
    Ok(JoinReport {
        before,
        after,
        provenance,
    })
}

struct Legs {
    parent: Vec<usize>,
}

impl Legs {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

fn compatible(a: &EndNode, b: &EndNode, feature_type: FeatureType) -> bool {
    a.tag == b.tag
        && (feature_type != FeatureType::ContourLine || (a.at.z - b.at.z).abs() <= CONTOUR_EPSILON)
}

/// Nearest free, compatible node to `nodes[i]` within `tolerance`, scanning
/// outward from `i` until the x distance alone exceeds the tolerance.
fn nearest(
    nodes: &[EndNode],
    partner: &[Option<usize>],
    groups: &mut Legs,
    i: usize,
    feature_type: FeatureType,
    tolerance: f64,
) -> Option<usize> {
    let here = nodes[i];
    let group = groups.find(here.leg);
    let mut best: Option<(f64, usize)> = None;
    let mut consider = |j: usize, groups: &mut Legs| {
        let other = &nodes[j];
        if partner[j].is_some() || !compatible(&here, other, feature_type) || groups.find(other.leg) == group {
            return;
        }
        let d = here.at.distance_xy(&other.at);
        if d.is_nan() || d > tolerance {
            return;
        }
        if best.map_or(true, |(bd, bj)| d < bd || (d == bd && j < bj)) {
            best = Some((d, j));
        }
    };
    for j in (0..i).rev() {
        if here.at.x - nodes[j].at.x > tolerance {
            break;
        }
        consider(j, &mut *groups);
    }
    for j in (i + 1)..nodes.len() {
        if nodes[j].at.x - here.at.x > tolerance {
            break;
        }
        consider(j, &mut *groups);
    }
    best.map(|(_, j)| j)
}

/// Pairs end nodes by repeated rounds of mutual-nearest matching. Joins that
/// would close a chain on itself are refused.
fn match_ends(nodes: &[EndNode], leg_count: usize, feature_type: FeatureType, tolerance: f64) -> Vec<Option<usize>> {
    let mut partner: Vec<Option<usize>> = vec![None; nodes.len()];
    let mut groups = Legs::new(leg_count);
    loop {
        let candidates: Vec<Option<usize>> = (0..nodes.len())
            .map(|i| {
                if partner[i].is_some() {
                    None
                } else {
                    nearest(nodes, &partner, &mut groups, i, feature_type, tolerance)
                }
            })
            .collect();
        let mut committed = 0;
        for i in 0..nodes.len() {
            let Some(j) = candidates[i] else { continue };
            if j <= i || candidates[j] != Some(i) {
                continue;
            }
            if partner[i].is_some() || partner[j].is_some() {
                continue;
            }
            if groups.find(nodes[i].leg) == groups.find(nodes[j].leg) {
                continue;
            }
            partner[i] = Some(j);
            partner[j] = Some(i);
            groups.union(nodes[i].leg, nodes[j].leg);
            committed += 1;
        }
        debug!("join round committed {committed} joins");
        if committed == 0 {
            return partner;
        }
    }
}

/// Orders joined legs into chains, starting each chain at its lowest leg
/// that has a free end.
fn walk_chains(nodes: &[EndNode], partner: &[Option<usize>], leg_count: usize) -> Vec<Vec<(usize, JoinDirection)>> {
    let mut ends = vec![[0usize; 2]; leg_count];
    for (i, n) in nodes.iter().enumerate() {
        ends[n.leg][usize::from(n.end == End::Finish)] = i;
    }
    let mut visited = vec![false; leg_count];
    let mut chains = Vec::new();
    for head in 0..leg_count {
        if visited[head] {
            continue;
        }
        let [start, finish] = ends[head];
        let direction = match (partner[start], partner[finish]) {
            (None, _) => JoinDirection::Forward,
            (Some(_), None) => JoinDirection::Reverse,
            (Some(_), Some(_)) => continue,
        };
        let mut chain = Vec::new();
        let (mut leg, mut direction) = (head, direction);
        loop {
            visited[leg] = true;
            chain.push((leg, direction));
            let exit = match direction {
                JoinDirection::Forward => ends[leg][1],
                JoinDirection::Reverse => ends[leg][0],
            };
            let Some(entry) = partner[exit] else { break };
            let next = nodes[entry].leg;
            if visited[next] {
                break;
            }
            direction = match nodes[entry].end {
                End::Start => JoinDirection::Forward,
                End::Finish => JoinDirection::Reverse,
            };
            leg = next;
        }
        chains.push(chain);
    }
    chains
}
