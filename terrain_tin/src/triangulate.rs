//! Building meshes from points, triangle lists and data sets.

use log::{debug, warn};
use std::collections::{HashMap, HashSet};

use crate::clip::{clip_to_polygon, ClipMode};
use crate::dataset::DataSet;
use crate::error::{Result, TinError};
use crate::geometry::{orient2d, Bounds3, Point3};
use crate::precision::Tolerances;
use crate::settings::TinSettings;
use crate::store::{FeatureAttributes, FeatureState, FeatureType, MeshState, NodeFlags, PointId, TinMesh};

impl TinMesh {
    /// Builds the store from an explicit triangle list.
    ///
    /// Triangles may arrive in either winding. Points referenced by no
    /// triangle are dropped and the remaining ones renumbered. The triangles
    /// must form a single manifold patch with one outer boundary.
    pub fn from_triangles(points: Vec<Point3>, triangles: &[[usize; 3]], settings: TinSettings) -> Result<TinMesh> {
        let n = points.len();
        let mut mesh = TinMesh::new(settings);
        for p in &points {
            mesh.add_point(*p)?;
        }
        mesh.tolerances = Tolerances::derive(
            &mesh.bounds,
            mesh.settings.point_tolerance_factor,
            mesh.settings.machine_precision_iterations,
        );

        let mut wedges: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
        let mut directed: HashSet<(usize, usize)> = HashSet::new();
        for (i, t) in triangles.iter().enumerate() {
            let [a, mut b, mut c] = *t;
            if a >= n || b >= n || c >= n {
                return Err(TinError::invalid(format!("triangle {i} references a missing point")));
            }
            if a == b || b == c || a == c {
                return Err(TinError::invalid(format!("triangle {i} repeats a vertex")));
            }
            let o = orient2d(&points[a], &points[b], &points[c]);
            if o == 0.0 {
                warn!("skipping zero-area triangle {i}");
                continue;
            }
            if o < 0.0 {
                std::mem::swap(&mut b, &mut c);
            }
            for edge in [(a, b), (b, c), (c, a)] {
                if !directed.insert(edge) {
                    return Err(TinError::corrupt(format!(
                        "edge {}-{} is shared by overlapping triangles",
                        edge.0, edge.1
                    )));
                }
            }
            wedges[a].push((b, c));
            wedges[b].push((c, a));
            wedges[c].push((a, b));
        }
        if directed.is_empty() {
            return Err(TinError::invalid("no triangles to build a mesh from"));
        }

        for (v, fan) in wedges.iter().enumerate() {
            if fan.is_empty() {
                mesh.nodes[v].flags.insert(NodeFlags::DELETED);
                continue;
            }
            let next: HashMap<usize, usize> = fan.iter().copied().collect();
            let targets: HashSet<usize> = fan.iter().map(|w| w.1).collect();
            let mut starts: Vec<usize> = fan
                .iter()
                .map(|w| w.0)
                .filter(|a| !targets.contains(a))
                .collect();
            starts.sort_unstable();
            if starts.len() > 1 {
                return Err(TinError::corrupt(format!("point {v} joins separate triangle fans")));
            }
            let boundary = !starts.is_empty();
            let start = match starts.first() {
                Some(&s) => s,
                None => fan.iter().map(|w| w.0).min().unwrap_or_default(),
            };
            let mut ring = vec![start];
            let mut cur = start;
            while let Some(&nxt) = next.get(&cur) {
                if nxt == start {
                    break;
                }
                ring.push(nxt);
                cur = nxt;
                if ring.len() > fan.len() + 1 {
                    break;
                }
            }
            let expected = if boundary { fan.len() + 1 } else { fan.len() };
            if ring.len() != expected {
                return Err(TinError::corrupt(format!("point {v} has a broken triangle fan")));
            }
            for q in ring {
                mesh.push_link(PointId(v), PointId(q))?;
            }
        }

        let mut boundary_edges = 0;
        let mut hull_start: Option<usize> = None;
        for &(u, v) in &directed {
            if directed.contains(&(v, u)) {
                continue;
            }
            if mesh.nodes[u].hull_next.is_some() {
                return Err(TinError::corrupt(format!("hull touches itself at point {u}")));
            }
            mesh.nodes[u].hull_next = Some(PointId(v));
            boundary_edges += 1;
            hull_start = Some(hull_start.map_or(u, |s| s.min(u)));
        }
        mesh.hull_start = hull_start.map(PointId);
        mesh.state = MeshState::Tin;
        if mesh.hull_points()?.len() != boundary_edges {
            return Err(TinError::corrupt("triangles have more than one boundary"));
        }
        if mesh.point_count() != n {
            debug!("dropping {} unreferenced points", n - mesh.point_count());
            mesh.compact()?;
        }
        mesh.update_bounds();
        Ok(mesh)
    }
}

/// Merges points closer than `tolerance`. Returns, for every input point, the
/// position of its representative among the kept points (kept in input order).
fn deduplicate(points: &[Point3], tolerance: f64) -> (Vec<Point3>, Vec<usize>) {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| {
        points[a]
            .x
            .total_cmp(&points[b].x)
            .then(points[a].y.total_cmp(&points[b].y))
            .then(a.cmp(&b))
    });
    let mut representative: Vec<usize> = (0..points.len()).collect();
    let mut kept: Vec<usize> = Vec::new();
    for &i in &order {
        let p = &points[i];
        let mut found = None;
        for &k in kept.iter().rev() {
            if p.x - points[k].x > tolerance {
                break;
            }
            if p.distance_xy(&points[k]) <= tolerance {
                found = Some(k);
                break;
            }
        }
        match found {
            Some(k) => representative[i] = k,
            None => kept.push(i),
        }
    }
    let mut position = vec![usize::MAX; points.len()];
    let mut unique = Vec::new();
    for i in 0..points.len() {
        if representative[i] == i {
            position[i] = unique.len();
            unique.push(points[i]);
        }
    }
    let map = (0..points.len()).map(|i| position[representative[i]]).collect();
    (unique, map)
}

/// Delaunay-triangulates `points`, returning the mesh and the id each input
/// point ended up with.
pub(crate) fn triangulate_with_map(points: &[Point3], settings: &TinSettings) -> Result<(TinMesh, Vec<PointId>)> {
    if points.len() < 3 {
        return Err(TinError::invalid("at least three points are needed"));
    }
    let bounds = Bounds3::from_points(points.iter());
    let tolerances = Tolerances::derive(
        &bounds,
        settings.point_tolerance_factor,
        settings.machine_precision_iterations,
    );
    let (unique, map) = deduplicate(points, tolerances.point_point);
    let coords: Vec<delaunator::Point> = unique
        .iter()
        .map(|p| delaunator::Point { x: p.x, y: p.y })
        .collect();
    let triangulation = delaunator::triangulate(&coords);
    let triangles: Vec<[usize; 3]> = triangulation
        .triangles
        .chunks(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();
    if triangles.is_empty() {
        return Err(TinError::invalid("points are collinear"));
    }
    let mut mesh = TinMesh::from_triangles(unique.clone(), &triangles, settings.clone())?;
    if mesh.point_slots() != unique.len() {
        return Err(TinError::corrupt("triangulator skipped input points"));
    }
    mesh.tolerances = tolerances;
    Ok((mesh, map.into_iter().map(PointId).collect()))
}

/// Delaunay-triangulates a point cloud.
pub fn triangulate_points(points: &[Point3], settings: &TinSettings) -> Result<TinMesh> {
    Ok(triangulate_with_map(points, settings)?.0)
}

/// Triangulates a data set and threads its features through the mesh.
///
/// Feature edges are forced into the triangulation by line insertion. A
/// feature that cannot be threaded is kept detached in the `TinError` state.
/// An active `Hull` feature clips the result to that boundary.
pub fn triangulate_dataset(data: &DataSet, settings: &TinSettings) -> Result<TinMesh> {
    let mut all: Vec<Point3> = data.points.clone();
    let mut ranges = Vec::with_capacity(data.features.len());
    for feature in &data.features {
        let start = all.len();
        if feature.state == FeatureState::Active && feature.feature_type != FeatureType::Hull {
            all.extend_from_slice(&feature.points);
        }
        ranges.push(start..all.len());
    }
    let (mut mesh, map) = triangulate_with_map(&all, settings)?;

    for (feature, range) in data.features.iter().zip(ranges) {
        if feature.state != FeatureState::Active || feature.feature_type == FeatureType::Hull {
            continue;
        }
        let attributes = FeatureAttributes {
            user_tag: feature.user_tag,
            feature_id: feature.feature_id,
        };
        let ids: Vec<PointId> = map[range].to_vec();
        match thread_feature(&mut mesh, feature.feature_type, attributes, &ids) {
            Ok(()) => {}
            Err(e) if !e.is_fatal() => {
                warn!("feature {:?} could not be inserted: {e}", feature.feature_id);
                mesh.add_detached_feature(
                    feature.feature_type,
                    FeatureState::TinError,
                    attributes,
                    feature.points.clone(),
                )?;
            }
            Err(e) => return Err(e),
        }
    }
    crate::reconcile::refresh_void_marks(&mut mesh)?;

    if let Some(hull) = data
        .features
        .iter()
        .find(|f| f.feature_type == FeatureType::Hull && f.state == FeatureState::Active)
    {
        clip_to_polygon(&mut mesh, &hull.points, ClipMode::Internal)?;
    }
    mesh.touch();
    Ok(mesh)
}

pub(crate) fn thread_feature(
    mesh: &mut TinMesh,
    feature_type: FeatureType,
    attributes: FeatureAttributes,
    ids: &[PointId],
) -> Result<()> {
    if feature_type == FeatureType::GroupSpots {
        mesh.add_feature(feature_type, attributes, ids)?;
        return Ok(());
    }
    let mut ids = ids.to_vec();
    if (feature_type.is_polygonal() || feature_type == FeatureType::Hull) && ids.first() != ids.last() {
        if let Some(&first) = ids.first() {
            ids.push(first);
        }
    }
    let mut chain: Vec<PointId> = Vec::new();
    for pair in ids.windows(2) {
        if pair[0] == pair[1] {
            continue;
        }
        let segment = mesh.insert_line(pair[0], pair[1])?;
        if chain.is_empty() {
            chain.extend(segment);
        } else {
            chain.extend(segment.into_iter().skip(1));
        }
    }
    mesh.add_feature(feature_type, attributes, &chain)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicate_keeps_input_order() {
        let pts = vec![
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 5.0),
        ];
        let (unique, map) = deduplicate(&pts, 1e-9);
        assert_eq!(unique.len(), 2);
        assert_eq!(map, vec![0, 1, 0]);
    }
}
