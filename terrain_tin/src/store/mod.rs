//! In-memory terrain mesh: points, adjacency rings, hull and feature table.
//!
//! Everything is addressed by index into append-only partitioned arrays.
//! Each point owns an anticlockwise list of its neighbours; the edge `a -> b`
//! is present in `a`'s list exactly when `b -> a` is present in `b`'s list.
//! The hull runs anticlockwise through `hull_next` with the surface on its
//! left.

mod feature;
mod node;
mod partition;

pub use feature::{
    FeatureAttributes, FeatureIndex, FeatureListEntry, FeatureRecord, FeatureState, FeatureType,
};
pub use node::{AdjacencyEntry, Node, NodeFlags, PointId};
pub use partition::PartitionedVec;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TinError};
use crate::geometry::{orient2d, signed_area, Bounds3, Point3};
use crate::locate::SpatialIndex;
use crate::precision::{machine_precision, Tolerances};
use crate::settings::TinSettings;

/// Whether the mesh has been triangulated yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeshState {
    Data,
    Tin,
}

/// Triangulated terrain model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TinMesh {
    pub(crate) settings: TinSettings,
    pub(crate) state: MeshState,
    pub(crate) points: PartitionedVec<Point3>,
    pub(crate) nodes: PartitionedVec<Node>,
    pub(crate) adjacency: PartitionedVec<AdjacencyEntry>,
    pub(crate) free_adjacency: Vec<usize>,
    pub(crate) features: PartitionedVec<FeatureRecord>,
    pub(crate) feature_list: PartitionedVec<FeatureListEntry>,
    pub(crate) free_feature_list: Vec<usize>,
    pub(crate) hull_start: Option<PointId>,
    pub(crate) tolerances: Tolerances,
    pub(crate) bounds: Bounds3,
    pub(crate) modified: DateTime<Utc>,
    pub(crate) index: SpatialIndex,
}

impl TinMesh {
    /// Creates an empty, untriangulated mesh.
    pub fn new(settings: TinSettings) -> Self {
        let size = settings.partition_size;
        let tolerances = Tolerances::from_machine(
            machine_precision(1.0, settings.machine_precision_iterations),
            settings.point_tolerance_factor,
        );
        Self {
            settings,
            state: MeshState::Data,
            points: PartitionedVec::new(size),
            nodes: PartitionedVec::new(size),
            adjacency: PartitionedVec::new(size),
            free_adjacency: Vec::new(),
            features: PartitionedVec::new(size),
            feature_list: PartitionedVec::new(size),
            free_feature_list: Vec::new(),
            hull_start: None,
            tolerances,
            bounds: Bounds3::empty(),
            modified: Utc::now(),
            index: SpatialIndex::default(),
        }
    }

    pub fn settings(&self) -> &TinSettings {
        &self.settings
    }

    pub fn state(&self) -> MeshState {
        self.state
    }

    pub fn is_triangulated(&self) -> bool {
        self.state == MeshState::Tin
    }

    pub fn tolerances(&self) -> Tolerances {
        self.tolerances
    }

    /// Overrides the stored tolerances, as a deserializer of older files does.
    pub fn set_tolerances(&mut self, tolerances: Tolerances) {
        self.tolerances = tolerances;
    }

    pub fn bounds(&self) -> Bounds3 {
        self.bounds
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    /// Records a modification.
    pub fn touch(&mut self) {
        self.modified = Utc::now();
    }

    pub(crate) fn require_tin(&self) -> Result<()> {
        if self.state != MeshState::Tin {
            return Err(TinError::invalid("mesh is not triangulated"));
        }
        if self.tolerances.is_legacy() {
            return Err(TinError::LegacyFormat);
        }
        Ok(())
    }

    // ---- points -------------------------------------------------------

    /// Number of point slots, deleted ones included.
    pub fn point_slots(&self) -> usize {
        self.points.len()
    }

    /// Number of live points.
    pub fn point_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| !n.flags.contains(NodeFlags::DELETED))
            .count()
    }

    pub fn point(&self, id: PointId) -> Point3 {
        self.points[id.0]
    }

    pub fn set_z(&mut self, id: PointId, z: f64) {
        self.points[id.0].z = z;
    }

    pub fn node(&self, id: PointId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: PointId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn flags(&self, id: PointId) -> NodeFlags {
        self.nodes[id.0].flags
    }

    pub fn is_deleted(&self, id: PointId) -> bool {
        self.flags(id).contains(NodeFlags::DELETED)
    }

    pub fn is_void(&self, id: PointId) -> bool {
        self.flags(id).contains(NodeFlags::VOID)
    }

    /// Ids of every live point in ascending order.
    pub fn live_points(&self) -> Vec<PointId> {
        (0..self.points.len())
            .map(PointId)
            .filter(|&p| !self.is_deleted(p))
            .collect()
    }

    /// Appends a point with an empty adjacency list.
    pub fn add_point(&mut self, p: Point3) -> Result<PointId> {
        let index = self.points.push(p)?;
        self.nodes.push(Node::default())?;
        let id = PointId(index);
        self.bounds.include(&p);
        self.index.insert(id);
        if self.index.pending_len() > self.settings.resort_threshold {
            self.index.resort(&self.points);
        }
        Ok(id)
    }

    // ---- adjacency ----------------------------------------------------

    fn alloc_adjacency(&mut self, entry: AdjacencyEntry) -> Result<usize> {
        if let Some(slot) = self.free_adjacency.pop() {
            self.adjacency[slot] = entry;
            return Ok(slot);
        }
        self.adjacency.push(entry)
    }

    /// Neighbours of `p` in anticlockwise order.
    pub fn ring(&self, p: PointId) -> Vec<PointId> {
        let mut out = Vec::new();
        let mut cursor = self.nodes[p.0].adjacency;
        while let Some(slot) = cursor {
            let entry = &self.adjacency[slot];
            out.push(entry.point);
            cursor = entry.next;
            if out.len() > self.points.len() {
                break;
            }
        }
        out
    }

    fn find_entry(&self, p: PointId, q: PointId) -> Option<usize> {
        let mut cursor = self.nodes[p.0].adjacency;
        let mut steps = 0;
        while let Some(slot) = cursor {
            let entry = &self.adjacency[slot];
            if entry.point == q {
                return Some(slot);
            }
            cursor = entry.next;
            steps += 1;
            if steps > self.points.len() {
                break;
            }
        }
        None
    }

    pub fn has_link(&self, p: PointId, q: PointId) -> bool {
        self.find_entry(p, q).is_some()
    }

    /// Neighbour of `p` that follows `q` anticlockwise.
    pub fn next_anticlockwise(&self, p: PointId, q: PointId) -> Result<PointId> {
        let slot = self
            .find_entry(p, q)
            .ok_or_else(|| TinError::corrupt(format!("{q} is not adjacent to {p}")))?;
        match self.adjacency[slot].next {
            Some(next) => Ok(self.adjacency[next].point),
            None => self.first_neighbour(p),
        }
    }

    /// Neighbour of `p` that precedes `q` anticlockwise.
    pub fn next_clockwise(&self, p: PointId, q: PointId) -> Result<PointId> {
        let ring = self.ring(p);
        let pos = ring
            .iter()
            .position(|&n| n == q)
            .ok_or_else(|| TinError::corrupt(format!("{q} is not adjacent to {p}")))?;
        Ok(ring[(pos + ring.len() - 1) % ring.len()])
    }

    fn first_neighbour(&self, p: PointId) -> Result<PointId> {
        self.nodes[p.0]
            .adjacency
            .map(|slot| self.adjacency[slot].point)
            .ok_or_else(|| TinError::corrupt(format!("{p} has no neighbours")))
    }

    /// Appends `q` at the end of `p`'s list.
    pub(crate) fn push_link(&mut self, p: PointId, q: PointId) -> Result<()> {
        let slot = self.alloc_adjacency(AdjacencyEntry { point: q, next: None })?;
        match self.nodes[p.0].adjacency {
            None => self.nodes[p.0].adjacency = Some(slot),
            Some(mut cursor) => {
                while let Some(next) = self.adjacency[cursor].next {
                    cursor = next;
                }
                self.adjacency[cursor].next = Some(slot);
            }
        }
        Ok(())
    }

    /// Inserts `q` directly after `after` in `p`'s anticlockwise list.
    pub(crate) fn insert_link_after(&mut self, p: PointId, after: PointId, q: PointId) -> Result<()> {
        let at = self
            .find_entry(p, after)
            .ok_or_else(|| TinError::corrupt(format!("{after} is not adjacent to {p}")))?;
        let next = self.adjacency[at].next;
        let slot = self.alloc_adjacency(AdjacencyEntry { point: q, next })?;
        self.adjacency[at].next = Some(slot);
        Ok(())
    }

    /// Replaces neighbour `old` of `p` with `new` in place.
    pub(crate) fn replace_link(&mut self, p: PointId, old: PointId, new: PointId) -> Result<()> {
        let slot = self
            .find_entry(p, old)
            .ok_or_else(|| TinError::corrupt(format!("{old} is not adjacent to {p}")))?;
        self.adjacency[slot].point = new;
        Ok(())
    }

    /// Removes `q` from `p`'s list.
    pub(crate) fn unlink(&mut self, p: PointId, q: PointId) -> Result<()> {
        let mut prev: Option<usize> = None;
        let mut cursor = self.nodes[p.0].adjacency;
        while let Some(slot) = cursor {
            let entry = self.adjacency[slot];
            if entry.point == q {
                match prev {
                    None => self.nodes[p.0].adjacency = entry.next,
                    Some(prev) => self.adjacency[prev].next = entry.next,
                }
                self.free_adjacency.push(slot);
                return Ok(());
            }
            prev = Some(slot);
            cursor = entry.next;
        }
        Err(TinError::corrupt(format!("cannot unlink {q} from {p}")))
    }

    /// Removes the edge `p`-`q` from both ends.
    pub(crate) fn delete_edge(&mut self, p: PointId, q: PointId) -> Result<()> {
        self.unlink(p, q)?;
        self.unlink(q, p)
    }

    /// Cuts every edge of `p`, drops the features through it and marks it deleted.
    pub(crate) fn detach_point(&mut self, p: PointId) -> Result<()> {
        for q in self.ring(p) {
            self.unlink(q, p)?;
        }
        let mut cursor = self.nodes[p.0].adjacency.take();
        while let Some(slot) = cursor {
            cursor = self.adjacency[slot].next;
            self.free_adjacency.push(slot);
        }
        for (f, _) in self.features_at(p) {
            if self.features[f.0].is_active() {
                self.remove_feature(f)?;
            }
            self.remove_membership(p, f);
        }
        let node = &mut self.nodes[p.0];
        node.hull_next = None;
        node.scratch_a = None;
        node.scratch_b = None;
        node.flags = NodeFlags::DELETED;
        Ok(())
    }

    // ---- triangles ----------------------------------------------------

    /// True when `b -> c` around `a` is the wedge outside the hull.
    pub(crate) fn is_hull_gap(&self, a: PointId, b: PointId, c: PointId) -> bool {
        self.nodes[a.0].hull_next == Some(c) && self.nodes[b.0].hull_next == Some(a)
    }

    /// Apex of the triangle on the left of `a -> b`, if there is one.
    pub fn triangle_apex(&self, a: PointId, b: PointId) -> Result<Option<PointId>> {
        let c = self.next_anticlockwise(a, b)?;
        if c == b || self.is_hull_gap(a, b, c) {
            return Ok(None);
        }
        Ok(Some(c))
    }

    /// True when `a`, `b`, `c` is an anticlockwise triangle of the mesh.
    pub fn is_triangle(&self, a: PointId, b: PointId, c: PointId) -> bool {
        matches!(self.triangle_apex(a, b), Ok(Some(apex)) if apex == c)
    }

    /// Every triangle once, anticlockwise, starting at its smallest vertex.
    pub fn triangles(&self) -> Vec<[PointId; 3]> {
        let mut out = Vec::new();
        for p in self.live_points() {
            let ring = self.ring(p);
            for (i, &a) in ring.iter().enumerate() {
                let b = ring[(i + 1) % ring.len()];
                if a > p && b > p && ring.len() > 1 && !self.is_hull_gap(p, a, b) {
                    out.push([p, a, b]);
                }
            }
        }
        out
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles().len()
    }

    pub fn triangle_area(&self, t: &[PointId; 3]) -> f64 {
        0.5 * orient2d(&self.point(t[0]), &self.point(t[1]), &self.point(t[2]))
    }

    /// Planimetric area covered by all triangles, voids included.
    pub fn area(&self) -> f64 {
        self.triangles().iter().map(|t| self.triangle_area(t)).sum()
    }

    // ---- hull ---------------------------------------------------------

    pub fn hull_start(&self) -> Option<PointId> {
        self.hull_start
    }

    pub fn hull_next(&self, p: PointId) -> Option<PointId> {
        self.nodes[p.0].hull_next
    }

    pub fn is_hull_point(&self, p: PointId) -> bool {
        self.nodes[p.0].hull_next.is_some()
    }

    /// Hull points in anticlockwise order, starting at the hull start.
    pub fn hull_points(&self) -> Result<Vec<PointId>> {
        let start = self
            .hull_start
            .ok_or_else(|| TinError::invalid("mesh has no hull"))?;
        let mut out = vec![start];
        let mut cur = start;
        loop {
            let next = self
                .hull_next(cur)
                .ok_or_else(|| TinError::corrupt(format!("hull breaks at {cur}")))?;
            if next == start {
                break;
            }
            out.push(next);
            if out.len() > self.points.len() {
                return Err(TinError::corrupt("hull does not close"));
            }
            cur = next;
        }
        Ok(out)
    }

    /// Hull as an open anticlockwise coordinate ring.
    pub fn hull_polygon(&self) -> Result<Vec<Point3>> {
        Ok(self
            .hull_points()?
            .into_iter()
            .map(|p| self.point(p))
            .collect())
    }

    /// Makes the closed chain `ring` the hull. The chain must run anticlockwise.
    pub(crate) fn set_hull(&mut self, ring: &[PointId]) {
        for node in self.nodes.iter_mut() {
            node.hull_next = None;
        }
        for (i, &p) in ring.iter().enumerate() {
            self.nodes[p.0].hull_next = Some(ring[(i + 1) % ring.len()]);
        }
        self.hull_start = ring.first().copied();
    }

    // ---- features -----------------------------------------------------

    fn alloc_feature_entry(&mut self, entry: FeatureListEntry) -> Result<usize> {
        if let Some(slot) = self.free_feature_list.pop() {
            self.feature_list[slot] = entry;
            return Ok(slot);
        }
        self.feature_list.push(entry)
    }

    /// Number of feature table rows, deleted ones included.
    pub fn feature_slots(&self) -> usize {
        self.features.len()
    }

    pub fn feature(&self, fi: FeatureIndex) -> &FeatureRecord {
        &self.features[fi.0]
    }

    pub(crate) fn feature_mut(&mut self, fi: FeatureIndex) -> &mut FeatureRecord {
        &mut self.features[fi.0]
    }

    /// Active features in table order.
    pub fn active_features(&self) -> Vec<FeatureIndex> {
        (0..self.features.len())
            .map(FeatureIndex)
            .filter(|&fi| self.features[fi.0].is_active())
            .collect()
    }

    /// Active features of one type.
    pub fn features_of_type(&self, feature_type: FeatureType) -> Vec<FeatureIndex> {
        self.active_features()
            .into_iter()
            .filter(|&fi| self.features[fi.0].feature_type == feature_type)
            .collect()
    }

    pub fn count_features(&self, feature_type: FeatureType) -> usize {
        self.features_of_type(feature_type).len()
    }

    pub(crate) fn add_membership(&mut self, p: PointId, feature: FeatureIndex, next_point: Option<PointId>) -> Result<()> {
        let head = self.nodes[p.0].features;
        let slot = self.alloc_feature_entry(FeatureListEntry {
            feature,
            next_point,
            next: head,
        })?;
        self.nodes[p.0].features = Some(slot);
        Ok(())
    }

    /// Drops every membership of `feature` at `p`.
    pub(crate) fn remove_membership(&mut self, p: PointId, feature: FeatureIndex) {
        let mut prev: Option<usize> = None;
        let mut cursor = self.nodes[p.0].features;
        while let Some(slot) = cursor {
            let entry = self.feature_list[slot];
            if entry.feature == feature {
                match prev {
                    None => self.nodes[p.0].features = entry.next,
                    Some(prev) => self.feature_list[prev].next = entry.next,
                }
                self.free_feature_list.push(slot);
            } else {
                prev = Some(slot);
            }
            cursor = entry.next;
        }
    }

    /// Features passing through `p`, each with its next point.
    pub fn features_at(&self, p: PointId) -> Vec<(FeatureIndex, Option<PointId>)> {
        let mut out = Vec::new();
        let mut cursor = self.nodes[p.0].features;
        while let Some(slot) = cursor {
            let entry = &self.feature_list[slot];
            out.push((entry.feature, entry.next_point));
            cursor = entry.next;
            if out.len() > self.feature_list.len() {
                break;
            }
        }
        out
    }

    pub fn next_feature_point(&self, feature: FeatureIndex, p: PointId) -> Option<PointId> {
        self.features_at(p)
            .into_iter()
            .find(|(f, _)| *f == feature)
            .and_then(|(_, next)| next)
    }

    /// True when some active feature accepted by `filter` runs along `p`-`q`.
    pub fn is_feature_edge(&self, p: PointId, q: PointId, filter: impl Fn(&FeatureRecord) -> bool) -> bool {
        let runs = |a: PointId, b: PointId| {
            self.features_at(a).into_iter().any(|(f, next)| {
                next == Some(b) && {
                    let record = &self.features[f.0];
                    record.is_active() && filter(record)
                }
            })
        };
        runs(p, q) || runs(q, p)
    }

    /// Threads a feature through the point chain `chain`.
    ///
    /// Consecutive points must be linked unless the feature is a spot group.
    /// A chain whose last point equals its first is stored closed.
    pub fn add_feature(
        &mut self,
        feature_type: FeatureType,
        attributes: FeatureAttributes,
        chain: &[PointId],
    ) -> Result<FeatureIndex> {
        let mut points: Vec<PointId> = Vec::with_capacity(chain.len());
        for &p in chain {
            if p.0 >= self.points.len() || self.is_deleted(p) {
                return Err(TinError::invalid(format!("feature point {p} does not exist")));
            }
            if points.last() != Some(&p) {
                points.push(p);
            }
        }
        let closed = points.len() > 2 && points.first() == points.last();
        let minimum = match feature_type {
            FeatureType::GroupSpots => 1,
            t if t.is_polygonal() || t == FeatureType::Hull => 4,
            _ => 2,
        };
        if points.len() < minimum {
            return Err(TinError::invalid(format!(
                "{} needs at least {minimum} points",
                feature_type.name()
            )));
        }
        if (feature_type.is_polygonal() || feature_type == FeatureType::Hull) && !closed {
            return Err(TinError::invalid(format!("{} must be closed", feature_type.name())));
        }
        if feature_type != FeatureType::GroupSpots {
            for w in points.windows(2) {
                if !self.has_link(w[0], w[1]) {
                    return Err(TinError::invalid(format!(
                        "feature edge {}-{} is not a mesh edge",
                        w[0], w[1]
                    )));
                }
            }
        }
        let fi = FeatureIndex(self.features.push(FeatureRecord {
            feature_type,
            state: FeatureState::Active,
            first_point: points.first().copied(),
            attributes,
            guid: Uuid::new_v4(),
            internal_to: None,
            coordinates: Vec::new(),
        })?);
        let stored = if closed { points.len() - 1 } else { points.len() };
        for i in 0..stored {
            self.add_membership(points[i], fi, points.get(i + 1).copied())?;
        }
        Ok(fi)
    }

    /// Stores a feature that is not threaded through the mesh.
    pub fn add_detached_feature(
        &mut self,
        feature_type: FeatureType,
        state: FeatureState,
        attributes: FeatureAttributes,
        coordinates: Vec<Point3>,
    ) -> Result<FeatureIndex> {
        Ok(FeatureIndex(self.features.push(FeatureRecord {
            feature_type,
            state,
            first_point: None,
            attributes,
            guid: Uuid::new_v4(),
            internal_to: None,
            coordinates,
        })?))
    }

    /// Unthreads a feature and marks its record deleted.
    pub fn remove_feature(&mut self, fi: FeatureIndex) -> Result<()> {
        if fi.0 >= self.features.len() {
            return Err(TinError::invalid(format!("no feature {fi}")));
        }
        if self.features[fi.0].first_point.is_some() {
            for p in self.feature_points(fi)? {
                self.remove_membership(p, fi);
            }
        }
        let record = &mut self.features[fi.0];
        record.state = FeatureState::Deleted;
        record.first_point = None;
        Ok(())
    }

    /// Point chain of a feature; closed features repeat their first point.
    pub fn feature_points(&self, fi: FeatureIndex) -> Result<Vec<PointId>> {
        let record = &self.features[fi.0];
        let Some(first) = record.first_point else {
            return Ok(Vec::new());
        };
        let mut out = vec![first];
        let mut cur = first;
        while let Some(next) = self.next_feature_point(fi, cur) {
            out.push(next);
            if next == first {
                break;
            }
            if out.len() > self.points.len() + 1 {
                return Err(TinError::corrupt(format!("feature {fi} does not terminate")));
            }
            cur = next;
        }
        Ok(out)
    }

    /// Coordinates of a feature, threaded or detached.
    pub fn feature_coordinates(&self, fi: FeatureIndex) -> Result<Vec<Point3>> {
        let record = &self.features[fi.0];
        if record.first_point.is_none() {
            return Ok(record.coordinates.clone());
        }
        Ok(self
            .feature_points(fi)?
            .into_iter()
            .map(|p| self.point(p))
            .collect())
    }

    pub fn is_closed_feature(&self, fi: FeatureIndex) -> Result<bool> {
        let points = self.feature_points(fi)?;
        Ok(points.len() > 2 && points.first() == points.last())
    }

    // ---- maintenance --------------------------------------------------

    /// Empties both scratch slots on every node.
    pub fn clear_scratch(&mut self) {
        for node in self.nodes.iter_mut() {
            node.scratch_a = None;
            node.scratch_b = None;
        }
    }

    pub fn scratch_is_clear(&self) -> bool {
        self.nodes
            .iter()
            .all(|n| n.scratch_a.is_none() && n.scratch_b.is_none())
    }

    pub(crate) fn clear_flag(&mut self, flag: NodeFlags) {
        for node in self.nodes.iter_mut() {
            node.flags.remove(flag);
        }
    }

    /// Recomputes the bounding box from live points.
    pub fn update_bounds(&mut self) {
        let live = self.live_points();
        self.bounds = Bounds3::from_points(live.iter().map(|&p| &self.points[p.0]));
    }

    /// Signed area of a point chain, used to orient loops.
    pub(crate) fn chain_signed_area(&self, chain: &[PointId]) -> f64 {
        let coords: Vec<Point3> = chain.iter().map(|&p| self.point(p)).collect();
        signed_area(&coords)
    }

    /// Drops deleted points and feature records and renumbers what is left.
    pub fn compact(&mut self) -> Result<()> {
        let mut out = TinMesh::new(self.settings.clone());
        out.state = self.state;
        out.tolerances = self.tolerances;
        out.modified = self.modified;

        let mut point_map: Vec<Option<PointId>> = vec![None; self.points.len()];
        for old in self.live_points() {
            let new = out.add_point(self.point(old))?;
            let mut flags = self.flags(old);
            flags.remove(NodeFlags::PENDING_DELETE);
            out.nodes[new.0].flags = flags;
            point_map[old.0] = Some(new);
        }
        let map = |p: PointId| point_map[p.0];

        let mut feature_map: Vec<Option<FeatureIndex>> = vec![None; self.features.len()];
        for i in 0..self.features.len() {
            let record = &self.features[i];
            if record.state == FeatureState::Deleted {
                continue;
            }
            let mut copy = record.clone();
            copy.first_point = record.first_point.and_then(map);
            let new = out.features.push(copy)?;
            feature_map[i] = Some(FeatureIndex(new));
        }
        for i in 0..out.features.len() {
            let internal = out.features[i].internal_to.and_then(|f| feature_map[f.0]);
            out.features[i].internal_to = internal;
        }

        for old in self.live_points() {
            let Some(new) = map(old) else { continue };
            for q in self.ring(old) {
                let nq = map(q).ok_or_else(|| {
                    TinError::corrupt(format!("live point {old} is linked to removed {q}"))
                })?;
                out.push_link(new, nq)?;
            }
            out.nodes[new.0].hull_next = self.hull_next(old).and_then(map);
            let mut memberships = self.features_at(old);
            memberships.reverse();
            for (f, next) in memberships {
                if let Some(nf) = feature_map[f.0] {
                    out.add_membership(new, nf, next.and_then(map))?;
                }
            }
        }
        out.hull_start = self.hull_start.and_then(map);
        out.update_bounds();
        *self = out;
        Ok(())
    }
}
