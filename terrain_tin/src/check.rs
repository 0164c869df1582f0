//! Integrity checks over the mesh invariants.

use crate::error::{Result, TinError};
use crate::geometry::orient2d;
use crate::store::{FeatureIndex, FeatureType, TinMesh};

/// Fails unless both scratch slots are empty on every node.
pub fn check_scratch_clear(mesh: &TinMesh) -> Result<()> {
    if mesh.scratch_is_clear() {
        Ok(())
    } else {
        Err(TinError::corrupt("scratch slots were left set by an earlier operation"))
    }
}

/// Verifies hull, adjacency and feature invariants.
pub fn check_topology(mesh: &TinMesh) -> Result<()> {
    check_scratch_clear(mesh)?;
    let live = mesh.live_points();

    for &p in &live {
        let ring = mesh.ring(p);
        if ring.is_empty() {
            return Err(TinError::corrupt(format!("{p} has no neighbours")));
        }
        for &q in &ring {
            if q == p || mesh.is_deleted(q) {
                return Err(TinError::corrupt(format!("{p} links to invalid point {q}")));
            }
            if !mesh.has_link(q, p) {
                return Err(TinError::corrupt(format!("edge {p}->{q} has no reverse")));
            }
        }
    }

    for t in mesh.triangles() {
        let [a, b, c] = t;
        if orient2d(&mesh.point(a), &mesh.point(b), &mesh.point(c)) <= 0.0 {
            return Err(TinError::corrupt(format!("triangle {a} {b} {c} is not anticlockwise")));
        }
    }

    let hull = mesh.hull_points()?;
    let on_hull = live.iter().filter(|&&p| mesh.is_hull_point(p)).count();
    if on_hull != hull.len() {
        return Err(TinError::corrupt(format!(
            "{} points claim a hull successor but the hull cycle has {}",
            on_hull,
            hull.len()
        )));
    }
    for &p in &hull {
        if let Some(n) = mesh.hull_next(p) {
            if !mesh.has_link(p, n) {
                return Err(TinError::corrupt(format!("hull edge {p}->{n} is not a mesh edge")));
            }
        }
    }

    for fi in mesh.active_features() {
        check_feature(mesh, fi)?;
    }
    Ok(())
}

fn check_feature(mesh: &TinMesh, fi: FeatureIndex) -> Result<()> {
    let record = mesh.feature(fi);
    if record.first_point.is_none() {
        return Ok(());
    }
    let points = mesh.feature_points(fi)?;
    let closes = points.len() > 2 && points.first() == points.last();
    if (record.feature_type.is_polygonal() || record.feature_type == FeatureType::Hull) && !closes {
        return Err(TinError::corrupt(format!("closed feature {fi} does not return to its start")));
    }
    if record.feature_type != FeatureType::GroupSpots {
        for w in points.windows(2) {
            if !mesh.has_link(w[0], w[1]) {
                return Err(TinError::corrupt(format!(
                    "feature {fi} steps across missing edge {}-{}",
                    w[0], w[1]
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3;
    use crate::settings::TinSettings;
    use crate::store::{FeatureAttributes, PointId};

    fn square() -> TinMesh {
        let pts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        TinMesh::from_triangles(pts, &[[0, 1, 2], [0, 2, 3]], TinSettings::default()).unwrap()
    }

    #[test]
    fn clean_mesh_passes() {
        check_topology(&square()).unwrap();
    }

    #[test]
    fn leftover_scratch_is_reported() {
        let mut mesh = square();
        mesh.node_mut(PointId(2)).scratch_a = Some(PointId(3));
        assert!(check_scratch_clear(&mesh).unwrap_err().is_fatal());
        assert!(check_topology(&mesh).is_err());
        mesh.clear_scratch();
        check_topology(&mesh).unwrap();
    }

    #[test]
    fn one_sided_edge_is_reported() {
        let mut mesh = square();
        mesh.unlink(PointId(0), PointId(2)).unwrap();
        assert!(check_topology(&mesh).unwrap_err().is_fatal());
    }

    #[test]
    fn broken_hull_is_reported() {
        let mut mesh = square();
        mesh.node_mut(PointId(1)).hull_next = None;
        assert!(check_topology(&mesh).is_err());
    }

    #[test]
    fn feature_across_a_missing_edge_is_reported() {
        let mut mesh = square();
        mesh.add_feature(FeatureType::Breakline, FeatureAttributes::default(), &[PointId(0), PointId(2)])
            .unwrap();
        mesh.delete_edge(PointId(0), PointId(2)).unwrap();
        assert!(check_topology(&mesh).is_err());
    }
}
