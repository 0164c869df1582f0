//! Clipping a mesh to a boundary polygon.
//!
//! The effective boundary is resolved by the polygon oracle against the
//! current hull, inserted into the mesh as a point chain held in the
//! `scratch_a` slots, and the points on its discard side are found by
//! flooding the adjacency graph. Features are then re-segmented against
//! those marks before the discarded part is cut away.

use log::{debug, warn};
use std::collections::HashSet;

use crate::check::{check_scratch_clear, check_topology};
use crate::error::{Result, TinError};
use crate::geometry::{lerp, Point3};
use crate::oracle::{clean_polygon, Classification, Intersection, Operand, Oracle, Polygon};
use crate::reconcile::reconcile;
use crate::region::flood_points;
use crate::store::{FeatureAttributes, FeatureIndex, FeatureState, FeatureType, NodeFlags, PointId, TinMesh};

/// Which side of the boundary survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipMode {
    /// Keep the part of the surface inside the boundary.
    Internal,
    /// Remove the part of the surface inside the boundary.
    External,
}

/// Side of the anticlockwise boundary loop that is thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Right,
    Left,
}

/// How polygonal features are cut.
enum Pieces {
    /// Intersect with the retained outline, keeping the feature type.
    Keep(Vec<Point3>),
    /// Subtract the boundary and remap the type by operand.
    Remove(Vec<Point3>),
}

enum Plan {
    Unchanged,
    ReplaceHull { keep: Vec<Point3>, pieces: Pieces },
    CutVoid(Vec<Point3>),
}

/// Clips `mesh` in place.
///
/// Not transactional: an error raised after the boundary has been inserted
/// leaves the mesh with the extra points and edges. Use [`clone_and_clip`]
/// when the original must survive a failure. Scratch slots and deletion
/// marks are cleared on every exit path.
pub fn clip_to_polygon(mesh: &mut TinMesh, boundary: &[Point3], mode: ClipMode) -> Result<()> {
    mesh.require_tin()?;
    if boundary.len() < 3 {
        return Err(TinError::invalid("clip boundary needs at least three points"));
    }
    check_scratch_clear(mesh)?;
    purge_stale_features(mesh)?;

    let saved = mesh.tolerances;
    mesh.tolerances = saved.capped(mesh.settings.clip_tolerance_factor);
    let outcome = clip_inner(mesh, boundary, mode);
    mesh.clear_scratch();
    mesh.clear_flag(NodeFlags::PENDING_DELETE);
    mesh.tolerances = saved;
    outcome?;

    mesh.update_bounds();
    mesh.touch();
    if mesh.settings.integrity_checks {
        check_topology(mesh)?;
    }
    Ok(())
}

/// Clips a copy of `mesh`, leaving the original untouched on success and failure.
pub fn clone_and_clip(mesh: &TinMesh, boundary: &[Point3], mode: ClipMode) -> Result<TinMesh> {
    let mut copy = mesh.clone();
    clip_to_polygon(&mut copy, boundary, mode)?;
    Ok(copy)
}

fn purge_stale_features(mesh: &mut TinMesh) -> Result<()> {
    for fi in 0..mesh.feature_slots() {
        let fi = FeatureIndex(fi);
        if matches!(
            mesh.feature(fi).state,
            FeatureState::TinError | FeatureState::RollbackPending
        ) {
            mesh.remove_feature(fi)?;
        }
    }
    Ok(())
}

fn plan(mesh: &TinMesh, boundary: &[Point3], mode: ClipMode) -> Result<Plan> {
    let oracle = Oracle::new(&mesh.settings)
        .with_basis(mesh.tolerances)
        .with_tolerance_factor(mesh.settings.clip_tolerance_factor);
    let hull = mesh.hull_polygon()?;
    let boundary = clean_polygon(boundary, mesh.tolerances.point_point)?;
    let relation = oracle.intersect(&hull, &boundary)?;
    debug!(
        "clip {:?}: hull vs boundary {:?}, {} crossings",
        mode, relation.classification, relation.crossings
    );
    let largest = |result: &Intersection| -> Result<Vec<Point3>> {
        result
            .largest()
            .map(|p| p.points.clone())
            .ok_or_else(|| TinError::corrupt("overlap produced no outline"))
    };
    Ok(match (mode, relation.classification) {
        (_, Classification::Disjoint) => return Err(TinError::DisjointGeometry),
        (ClipMode::Internal, Classification::AInsideB | Classification::Coincident) => Plan::Unchanged,
        (ClipMode::Internal, _) => {
            let keep = largest(&relation)?;
            Plan::ReplaceHull {
                pieces: Pieces::Keep(keep.clone()),
                keep,
            }
        }
        (ClipMode::External, Classification::AInsideB | Classification::Coincident) => {
            return Err(TinError::invalid("boundary removes the entire surface"))
        }
        (ClipMode::External, kind) => {
            let rest = oracle.exclusive(&hull, &boundary)?;
            // A boundary inside the hull, touching it at single points at most,
            // leaves a ring-shaped surface that no hull can bound.
            if kind == Classification::BInsideA && rest.polygons.iter().any(|p| p.hole) {
                Plan::CutVoid(boundary)
            } else {
                Plan::ReplaceHull {
                    keep: largest(&rest)?,
                    pieces: Pieces::Remove(boundary),
                }
            }
        }
    })
}

fn clip_inner(mesh: &mut TinMesh, boundary: &[Point3], mode: ClipMode) -> Result<()> {
    match plan(mesh, boundary, mode)? {
        Plan::Unchanged => {
            debug!("hull lies inside the boundary; nothing to clip");
            Ok(())
        }
        Plan::ReplaceHull { keep, pieces } => {
            let ring = insert_loop(mesh, &keep)?;
            fix_concave_spans(mesh, &ring, Side::Right)?;
            let marked = mark_discard(mesh, &ring, Side::Right)?;
            debug!("replacing hull with {} points, discarding {marked}", ring.len());
            resegment_features(mesh, &pieces, true)?;
            apply_hull(mesh, ring[0])?;
            mesh.clear_scratch();
            mesh.compact()?;
            reconcile(mesh)
        }
        Plan::CutVoid(boundary) => {
            let ring = insert_loop(mesh, &boundary)?;
            fix_concave_spans(mesh, &ring, Side::Left)?;
            let marked = mark_discard(mesh, &ring, Side::Left)?;
            debug!("cutting void with {} points around {marked}", ring.len());
            resegment_features(mesh, &Pieces::Remove(boundary), false)?;
            let mut chain = scratch_loop(mesh, ring[0])?;
            chain.push(ring[0]);
            mesh.clear_scratch();
            mesh.clear_flag(NodeFlags::PENDING_DELETE);
            mesh.add_feature(FeatureType::Void, FeatureAttributes::default(), &chain)?;
            reconcile(mesh)
        }
    }
}

/// Inserts a closed boundary and threads it anticlockwise through `scratch_a`.
fn insert_loop(mesh: &mut TinMesh, coords: &[Point3]) -> Result<Vec<PointId>> {
    let mut ids: Vec<PointId> = Vec::with_capacity(coords.len());
    for c in coords {
        let id = mesh.insert_point(c.x, c.y)?;
        if ids.last() != Some(&id) {
            ids.push(id);
        }
    }
    while ids.len() > 1 && ids.first() == ids.last() {
        ids.pop();
    }
    if ids.len() < 3 {
        return Err(TinError::invalid("clip boundary collapses onto the mesh"));
    }
    let mut ring = mesh.link_ring(&ids)?;
    ring.pop();
    let distinct: HashSet<PointId> = ring.iter().copied().collect();
    if distinct.len() != ring.len() {
        return Err(TinError::invalid("clip boundary touches itself"));
    }
    if mesh.chain_signed_area(&ring) < 0.0 {
        ring.reverse();
    }
    for i in 0..ring.len() {
        let next = ring[(i + 1) % ring.len()];
        mesh.node_mut(ring[i]).scratch_a = Some(next);
    }
    Ok(ring)
}

/// Reads the loop held in `scratch_a` starting at `start`.
fn scratch_loop(mesh: &TinMesh, start: PointId) -> Result<Vec<PointId>> {
    let mut ring = vec![start];
    let mut cur = start;
    loop {
        let next = mesh
            .node(cur)
            .scratch_a
            .ok_or_else(|| TinError::corrupt(format!("boundary loop breaks at {cur}")))?;
        if next == start {
            return Ok(ring);
        }
        if ring.len() > mesh.point_slots() {
            return Err(TinError::corrupt("boundary loop does not close"));
        }
        ring.push(next);
        cur = next;
    }
}

/// Neighbours of loop point `s` strictly between `next` and `prev` on the discard side.
fn discard_wedge(mesh: &TinMesh, s: PointId, next: PointId, prev: PointId, side: Side) -> Result<Vec<PointId>> {
    let step = |q: PointId| match side {
        Side::Right => mesh.next_clockwise(s, q),
        Side::Left => mesh.next_anticlockwise(s, q),
    };
    let mut out = Vec::new();
    let mut c = step(next)?;
    while c != prev {
        if c == next || out.len() > mesh.point_slots() {
            return Err(TinError::corrupt(format!("{prev} is not adjacent to loop point {s}")));
        }
        out.push(c);
        c = step(c)?;
    }
    Ok(out)
}

/// Splits feature edges joining two loop points across the discard side, so
/// the flood marks them instead of mistaking them for retained edges.
fn fix_concave_spans(mesh: &mut TinMesh, ring: &[PointId], side: Side) -> Result<()> {
    let on_loop: HashSet<PointId> = ring.iter().copied().collect();
    let n = ring.len();
    let mut spans: Vec<(PointId, PointId)> = Vec::new();
    for i in 0..n {
        let (s, next, prev) = (ring[i], ring[(i + 1) % n], ring[(i + n - 1) % n]);
        let wedge: HashSet<PointId> = discard_wedge(mesh, s, next, prev, side)?.into_iter().collect();
        for (f, q) in mesh.features_at(s) {
            let Some(q) = q else { continue };
            let record = mesh.feature(f);
            if !record.is_active() || record.feature_type == FeatureType::GroupSpots {
                continue;
            }
            if on_loop.contains(&q) && wedge.contains(&q) {
                let span = (s.min(q), s.max(q));
                if !spans.contains(&span) {
                    spans.push(span);
                }
            }
        }
    }
    for (a, b) in spans {
        if mesh.has_link(a, b) {
            let mid = lerp(&mesh.point(a), &mesh.point(b), 0.5);
            debug!("splitting concave span {a}-{b}");
            mesh.split_edge(a, b, mid.x, mid.y)?;
        }
    }
    Ok(())
}

/// Flags every point on the discard side of the loop as pending delete.
fn mark_discard(mesh: &mut TinMesh, ring: &[PointId], side: Side) -> Result<usize> {
    let on_loop: HashSet<PointId> = ring.iter().copied().collect();
    let n = ring.len();
    let mut seeds = Vec::new();
    for i in 0..n {
        let (s, next, prev) = (ring[i], ring[(i + 1) % n], ring[(i + n - 1) % n]);
        seeds.extend(
            discard_wedge(mesh, s, next, prev, side)?
                .into_iter()
                .filter(|q| !on_loop.contains(q)),
        );
    }
    let marked = flood_points(mesh, &seeds, |p| on_loop.contains(&p));
    for &p in &marked {
        mesh.node_mut(p).flags.insert(NodeFlags::PENDING_DELETE);
    }
    Ok(marked.len())
}

/// Output type for a piece of `input` left over after subtracting the
/// boundary, keyed on the operand the piece came from. `None` rejects it.
pub(crate) fn remap_exclusive_type(input: FeatureType, operand: Operand) -> Option<FeatureType> {
    let output = match (input, operand) {
        (FeatureType::Polygon, _) => FeatureType::Polygon,
        (FeatureType::Void, Operand::A) => FeatureType::Void,
        (FeatureType::Void, Operand::B) => FeatureType::Island,
        (FeatureType::Island, Operand::A) => FeatureType::Island,
        (FeatureType::Island, Operand::B) => FeatureType::Void,
        (FeatureType::Hole, Operand::A) => FeatureType::Void,
        (FeatureType::Hole, Operand::B) => FeatureType::Island,
        _ => FeatureType::Polygon,
    };
    if output == FeatureType::Island && input != FeatureType::Island {
        return None;
    }
    if output == FeatureType::Void && !matches!(input, FeatureType::Void | FeatureType::Hole) {
        return None;
    }
    Some(output)
}

fn resegment_features(mesh: &mut TinMesh, pieces: &Pieces, hull_replaced: bool) -> Result<()> {
    let on_loop = |mesh: &TinMesh, p: PointId| mesh.node(p).scratch_a.is_some();
    let pending = |mesh: &TinMesh, p: PointId| mesh.flags(p).contains(NodeFlags::PENDING_DELETE);
    let mut removed = 0usize;
    let mut added = 0usize;

    for fi in 0..mesh.feature_slots() {
        let fi = FeatureIndex(fi);
        let record = mesh.feature(fi).clone();
        if !record.is_active() || record.first_point.is_none() {
            continue;
        }
        if record.feature_type == FeatureType::Hull {
            if hull_replaced {
                mesh.remove_feature(fi)?;
                removed += 1;
            }
            continue;
        }
        let points = mesh.feature_points(fi)?;
        let closed = points.len() > 2 && points.first() == points.last();
        let distinct = if closed { &points[..points.len() - 1] } else { &points[..] };
        let marked = distinct.iter().filter(|&&p| pending(mesh, p)).count();
        let touches_loop = distinct.iter().any(|&p| on_loop(mesh, p));

        if record.feature_type.is_polygonal() {
            if marked == 0 && !touches_loop {
                continue;
            }
            let coords = mesh.feature_coordinates(fi)?;
            mesh.remove_feature(fi)?;
            removed += 1;
            added += resegment_polygon(mesh, record.feature_type, record.attributes, &coords, pieces)?;
            continue;
        }
        if marked == 0 {
            continue;
        }
        mesh.remove_feature(fi)?;
        removed += 1;
        if record.feature_type == FeatureType::GroupSpots {
            let kept: Vec<PointId> = distinct.iter().copied().filter(|&p| !pending(mesh, p)).collect();
            if !kept.is_empty() {
                mesh.add_feature(FeatureType::GroupSpots, record.attributes, &kept)?;
                added += 1;
            }
            continue;
        }
        let sequence: Vec<PointId> = if closed {
            let k = distinct.iter().position(|&p| pending(mesh, p)).unwrap_or(0);
            distinct[k..].iter().chain(distinct[..k].iter()).copied().collect()
        } else {
            distinct.to_vec()
        };
        let mut run: Vec<PointId> = Vec::new();
        for p in sequence.into_iter().map(Some).chain(std::iter::once(None)) {
            match p {
                Some(p) if !pending(mesh, p) => run.push(p),
                _ => {
                    if run.len() >= 2 {
                        mesh.add_feature(record.feature_type, record.attributes, &run)?;
                        added += 1;
                    }
                    run.clear();
                }
            }
        }
    }
    debug!("re-segmentation removed {removed} features and added {added}");
    Ok(())
}

fn resegment_polygon(
    mesh: &mut TinMesh,
    feature_type: FeatureType,
    attributes: FeatureAttributes,
    coords: &[Point3],
    pieces: &Pieces,
) -> Result<usize> {
    let oracle = Oracle::new(&mesh.settings).with_basis(mesh.tolerances);
    let result = match pieces {
        Pieces::Keep(keep) => oracle.intersect(keep, coords),
        Pieces::Remove(boundary) => oracle.exclusive(coords, boundary),
    };
    let result = match result {
        Ok(r) => r,
        Err(e) if !e.is_fatal() => {
            warn!("dropping {} that cannot be clipped: {e}", feature_type.name());
            return Ok(0);
        }
        Err(e) => return Err(e),
    };
    let mut added = 0;
    for polygon in &result.polygons {
        let output = match pieces {
            Pieces::Keep(_) if polygon.hole => continue,
            Pieces::Keep(_) => feature_type,
            Pieces::Remove(_) => {
                let Some(output) = remap_exclusive_type(feature_type, polygon.operand) else {
                    continue;
                };
                if !meets_size_limits(mesh, polygon) {
                    debug!("dropping {} piece of area {}", output.name(), polygon.area);
                    continue;
                }
                output
            }
        };
        if let Some(chain) = thread_piece(mesh, polygon)? {
            mesh.add_feature(output, attributes, &chain)?;
            added += 1;
        }
    }
    Ok(added)
}

fn meets_size_limits(mesh: &TinMesh, polygon: &Polygon) -> bool {
    let perimeter = polygon.perimeter();
    polygon.area >= mesh.settings.min_polygon_area
        && perimeter > 0.0
        && polygon.area / perimeter >= mesh.settings.min_area_perimeter_ratio
}

/// Threads a result polygon through the mesh. Pieces that would touch the
/// discarded part are dropped.
fn thread_piece(mesh: &mut TinMesh, polygon: &Polygon) -> Result<Option<Vec<PointId>>> {
    let tol = mesh.tolerances.point_point;
    let mut ids: Vec<PointId> = Vec::new();
    for c in &polygon.points {
        let existing = mesh
            .closest_point(c.x, c.y)
            .filter(|&p| mesh.point(p).distance_xy(c) <= tol);
        let id = match existing {
            Some(p) => p,
            None => {
                let p = mesh.insert_point(c.x, c.y)?;
                if mesh
                    .ring(p)
                    .iter()
                    .any(|&q| mesh.flags(q).contains(NodeFlags::PENDING_DELETE))
                {
                    mesh.node_mut(p).flags.insert(NodeFlags::PENDING_DELETE);
                }
                p
            }
        };
        if mesh.flags(id).contains(NodeFlags::PENDING_DELETE) {
            return Ok(None);
        }
        if ids.last() != Some(&id) {
            ids.push(id);
        }
    }
    while ids.len() > 1 && ids.first() == ids.last() {
        ids.pop();
    }
    if ids.len() < 3 {
        return Ok(None);
    }
    let chain = mesh.link_ring(&ids)?;
    if chain
        .iter()
        .any(|&p| mesh.flags(p).contains(NodeFlags::PENDING_DELETE))
    {
        return Ok(None);
    }
    Ok(Some(chain))
}

/// Cuts away the discard side and makes the loop the hull.
fn apply_hull(mesh: &mut TinMesh, start: PointId) -> Result<()> {
    let ring = scratch_loop(mesh, start)?;
    let n = ring.len();
    for i in 0..n {
        let (s, next, prev) = (ring[i], ring[(i + 1) % n], ring[(i + n - 1) % n]);
        for c in discard_wedge(mesh, s, next, prev, Side::Right)? {
            mesh.delete_edge(s, c)?;
        }
    }
    for p in mesh.live_points() {
        if mesh.flags(p).contains(NodeFlags::PENDING_DELETE) {
            mesh.detach_point(p)?;
        }
    }
    mesh.set_hull(&ring);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remap_table_is_literal() {
        use FeatureType::*;
        assert_eq!(remap_exclusive_type(Polygon, Operand::B), Some(Polygon));
        assert_eq!(remap_exclusive_type(Region, Operand::A), Some(Polygon));
        assert_eq!(remap_exclusive_type(Void, Operand::A), Some(Void));
        assert_eq!(remap_exclusive_type(Void, Operand::B), None);
        assert_eq!(remap_exclusive_type(Island, Operand::A), Some(Island));
        assert_eq!(remap_exclusive_type(Island, Operand::B), None);
        assert_eq!(remap_exclusive_type(Hole, Operand::A), Some(Void));
        assert_eq!(remap_exclusive_type(Hole, Operand::B), None);
    }
}
