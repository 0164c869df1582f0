//! Topological regions: triangle floods bounded by point chains, and the
//! boundary loops of a triangle set.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::error::{Result, TinError};
use crate::store::{PointId, TinMesh};

/// A triangle rotated so that its smallest vertex comes first.
pub(crate) type TriangleKey = [PointId; 3];

pub(crate) fn canonical(t: [PointId; 3]) -> TriangleKey {
    let [a, b, c] = t;
    if a < b && a < c {
        [a, b, c]
    } else if b < a && b < c {
        [b, c, a]
    } else {
        [c, a, b]
    }
}

/// Drops a repeated closing point.
pub(crate) fn open_ring(chain: &[PointId]) -> Vec<PointId> {
    let mut ring = chain.to_vec();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// Same ring, anticlockwise.
pub(crate) fn anticlockwise_ring(mesh: &TinMesh, chain: &[PointId]) -> Vec<PointId> {
    let mut ring = open_ring(chain);
    if mesh.chain_signed_area(&ring) < 0.0 {
        ring.reverse();
    }
    ring
}

/// Triangles enclosed by the closed chain `chain`, found by flooding from the
/// chain's inner side without crossing chain edges.
pub(crate) fn triangles_inside(mesh: &TinMesh, chain: &[PointId]) -> Result<HashSet<TriangleKey>> {
    let ring = anticlockwise_ring(mesh, chain);
    let mut barrier: HashSet<(PointId, PointId)> = HashSet::new();
    let mut queue: VecDeque<TriangleKey> = VecDeque::new();
    for i in 0..ring.len() {
        let (s, n) = (ring[i], ring[(i + 1) % ring.len()]);
        barrier.insert((s.min(n), s.max(n)));
        if !mesh.has_link(s, n) {
            return Err(TinError::corrupt(format!("chain edge {s}-{n} is not a mesh edge")));
        }
        if let Some(c) = mesh.triangle_apex(s, n)? {
            queue.push_back(canonical([s, n, c]));
        }
    }
    let mut inside = HashSet::new();
    while let Some(t) = queue.pop_front() {
        if !inside.insert(t) {
            continue;
        }
        for i in 0..3 {
            let (a, b) = (t[i], t[(i + 1) % 3]);
            if barrier.contains(&(a.min(b), a.max(b))) {
                continue;
            }
            if let Some(c) = mesh.triangle_apex(b, a)? {
                let next = canonical([b, a, c]);
                if !inside.contains(&next) {
                    queue.push_back(next);
                }
            }
        }
    }
    Ok(inside)
}

/// Points strictly inside the closed chain `chain`.
pub(crate) fn points_inside(mesh: &TinMesh, chain: &[PointId]) -> Result<Vec<PointId>> {
    let on_chain: HashSet<PointId> = chain.iter().copied().collect();
    let mut out = BTreeSet::new();
    for t in triangles_inside(mesh, chain)? {
        for p in t {
            if !on_chain.contains(&p) {
                out.insert(p);
            }
        }
    }
    Ok(out.into_iter().collect())
}

/// Breadth-first flood over adjacency rings from `seeds`, never entering a
/// point for which `blocked` holds. Returns the reached points in ascending order.
pub(crate) fn flood_points(mesh: &TinMesh, seeds: &[PointId], blocked: impl Fn(PointId) -> bool) -> Vec<PointId> {
    let mut reached: BTreeSet<PointId> = BTreeSet::new();
    let mut queue: VecDeque<PointId> = seeds.iter().copied().filter(|&p| !blocked(p)).collect();
    while let Some(p) = queue.pop_front() {
        if !reached.insert(p) {
            continue;
        }
        for q in mesh.ring(p) {
            if !blocked(q) && !reached.contains(&q) {
                queue.push_back(q);
            }
        }
    }
    reached.into_iter().collect()
}

/// Boundary loops of the triangles accepted by `in_region`.
///
/// Each loop keeps the region on its left, so outer boundaries come out
/// anticlockwise and holes clockwise. Loops are traced from directed
/// boundary edges in ascending point order; a loop touching itself at a
/// point is split there.
pub(crate) fn trace_loops(mesh: &TinMesh, in_region: impl Fn(&TriangleKey) -> bool) -> Result<Vec<Vec<PointId>>> {
    let inside = |a: PointId, b: PointId| -> Result<bool> {
        Ok(match mesh.triangle_apex(a, b)? {
            Some(c) => in_region(&canonical([a, b, c])),
            None => false,
        })
    };
    let mut visited: HashSet<(PointId, PointId)> = HashSet::new();
    let mut loops = Vec::new();
    for p in mesh.live_points() {
        for q in mesh.ring(p) {
            if visited.contains(&(p, q)) || !inside(p, q)? || inside(q, p)? {
                continue;
            }
            visited.insert((p, q));
            let mut ring = vec![p];
            let (mut u, mut v) = (p, q);
            let limit = mesh.point_slots() * 2 + 4;
            while v != p {
                if ring.len() > limit {
                    return Err(TinError::corrupt("region boundary does not close"));
                }
                ring.push(v);
                let mut w = mesh.next_clockwise(v, u)?;
                let mut turns = 0;
                loop {
                    let w2 = mesh.next_clockwise(v, w)?;
                    let between = matches!(mesh.triangle_apex(v, w2)?, Some(apex) if apex == w);
                    if !between || !in_region(&canonical([v, w2, w])) {
                        break;
                    }
                    w = w2;
                    turns += 1;
                    if turns > limit {
                        return Err(TinError::corrupt(format!("region surrounds {v}")));
                    }
                }
                visited.insert((v, w));
                u = v;
                v = w;
            }
            loops.extend(split_pinches(ring));
        }
    }
    Ok(loops)
}

/// Splits a traced loop that passes through a point more than once into
/// simple loops. Each lobe between two visits of a point becomes its own
/// loop, in the order the lobes close.
pub(crate) fn split_pinches(ring: Vec<PointId>) -> Vec<Vec<PointId>> {
    let mut out = Vec::new();
    let mut stack: Vec<PointId> = Vec::with_capacity(ring.len());
    let mut position: HashMap<PointId, usize> = HashMap::new();
    for p in ring {
        if let Some(&i) = position.get(&p) {
            let lobe: Vec<PointId> = stack.drain(i..).collect();
            for q in &lobe {
                position.remove(q);
            }
            if lobe.len() >= 3 {
                out.push(lobe);
            }
        }
        position.insert(p, stack.len());
        stack.push(p);
    }
    if stack.len() >= 3 {
        out.push(stack);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[usize]) -> Vec<PointId> {
        raw.iter().copied().map(PointId).collect()
    }

    #[test]
    fn simple_loop_is_kept_whole() {
        assert_eq!(split_pinches(ids(&[0, 1, 2, 3])), vec![ids(&[0, 1, 2, 3])]);
    }

    #[test]
    fn pinched_loop_splits_at_repeated_point() {
        let lobes = split_pinches(ids(&[0, 4, 7, 8, 9, 4, 5]));
        assert_eq!(lobes, vec![ids(&[4, 7, 8, 9]), ids(&[0, 4, 5])]);
    }

    #[test]
    fn two_pinches_give_three_loops() {
        let lobes = split_pinches(ids(&[0, 1, 10, 11, 12, 1, 2, 20, 21, 22, 2, 3]));
        assert_eq!(
            lobes,
            vec![ids(&[1, 10, 11, 12]), ids(&[2, 20, 21, 22]), ids(&[0, 1, 2, 3])]
        );
    }
}
