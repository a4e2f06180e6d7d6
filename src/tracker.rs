//! Inter-frame contact tracker: preserves each contact's `id` across frames via nearest-centroid
//! matching, then recycles the lowest free positive integer for anything left unmatched.

use crate::cluster::ClusterSet;

fn dist2(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}

/// The lowest positive integer not currently assigned to any cluster in `current`.
fn lowest_free_id(current: &ClusterSet) -> u32 {
    let mut candidate = 1u32;
    while current.iter().any(|c| c.id == candidate) {
        candidate += 1;
    }
    candidate
}

/// Pair `current`'s valid clusters against `previous`'s, preserving IDs by nearest centroid, then
/// assign fresh IDs to whatever remains unmatched. `current` clusters all start with `id == 0`
/// (freshly zero-initialised by [`crate::cluster::ClusterSet::alloc`]).
pub fn track(current: &mut ClusterSet, previous: &ClusterSet) {
    // Phase 1: for every valid previous cluster, in scan order, claim the nearest unmatched valid
    // current cluster. No distance gate -- the nearest match wins unconditionally, even if an
    // earlier previous cluster "steals" a current cluster that would have been a better match for
    // a later previous cluster.
    for p in previous.iter().filter(|p| p.valid) {
        let mut best: Option<(usize, f32)> = None;
        for (idx, c) in current.iter().enumerate() {
            if !c.valid || c.id != 0 {
                continue;
            }
            let d = dist2(p.centre, c.centre);
            let better = match best {
                None => true,
                Some((_, best_d)) => d < best_d,
            };
            if better {
                best = Some((idx, d));
            }
        }
        if let Some((idx, _)) = best {
            current[idx].id = p.id;
        }
    }

    // Phase 2: anything still unmatched gets the lowest free positive integer, in scan order.
    for idx in 0..current.len() {
        if current[idx].valid && current[idx].id == 0 {
            current[idx].id = lowest_free_id(current);
        }
    }
}
