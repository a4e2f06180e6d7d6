//! Geometric post-processing: weighted centroid, diameter, bounding box, and the two
//! invalidation passes (giant-contact veto and pairwise overlap suppression).

use crate::cluster::{Cluster, ClusterSet};
use crate::config::{DIAMETER_PALM, DIAMETER_VALID, OVERLAP_RATIO};

fn compute_one(cluster: &mut Cluster) {
    let mut weighted_x = 0.0f32;
    let mut weighted_y = 0.0f32;
    let mut total_weight = 0.0f32;
    for s in cluster.members() {
        let v = f32::from(s.value);
        weighted_x += f32::from(s.x) * v;
        weighted_y += f32::from(s.y) * v;
        total_weight += v;
    }
    if total_weight <= 0.0 {
        // A cluster always has at least its seed, which has value > 0, so this is unreachable in
        // practice; kept as a guard against dividing by zero rather than panicking.
        cluster.valid = false;
        return;
    }

    let cx = weighted_x / total_weight + 0.5;
    let cy = weighted_y / total_weight + 0.5;
    let diameter = total_weight / 100.0;
    let r = diameter / 2.0;

    cluster.centre = (cx, cy);
    cluster.diameter = diameter;
    cluster.bbox = (cx - r, cy - r, cx + r, cy + r);
    cluster.valid = diameter > DIAMETER_VALID;
}

fn bbox_area(bbox: (f32, f32, f32, f32)) -> f32 {
    (bbox.2 - bbox.0) * (bbox.3 - bbox.1)
}

fn intersection_area(a: (f32, f32, f32, f32), b: (f32, f32, f32, f32)) -> f32 {
    let ix1 = a.0.max(b.0);
    let iy1 = a.1.max(b.1);
    let ix2 = a.2.min(b.2);
    let iy2 = a.3.min(b.3);
    (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0)
}

/// If any cluster's diameter exceeds [`DIAMETER_PALM`], invalidate every cluster in the frame
/// (the palm-rejection heuristic).
fn apply_palm_veto(clusters: &mut ClusterSet) {
    let triggered = clusters
        .iter()
        .any(|c| c.valid && c.diameter > DIAMETER_PALM);
    if triggered {
        for c in clusters.iter_mut() {
            c.valid = false;
        }
    }
}

/// For each ordered pair of still-valid clusters whose bounding-box intersection exceeds
/// [`OVERLAP_RATIO`] of the smaller box's area, invalidate the smaller-area cluster of the pair.
/// Single-shot: later pairs observe earlier invalidations within the same pass.
fn apply_overlap_suppression(clusters: &mut ClusterSet) {
    let len = clusters.len();
    for i in 0..len {
        for j in (i + 1)..len {
            if !clusters[i].valid || !clusters[j].valid {
                continue;
            }
            let area_i = bbox_area(clusters[i].bbox);
            let area_j = bbox_area(clusters[j].bbox);
            let small = area_i.min(area_j);
            if small <= 0.0 {
                continue;
            }
            let inter = intersection_area(clusters[i].bbox, clusters[j].bbox);
            if inter / small > OVERLAP_RATIO {
                // The ratio is computed against the smaller box, and it is that same smaller box
                // that gets invalidated.
                if area_i <= area_j {
                    clusters[i].valid = false;
                } else {
                    clusters[j].valid = false;
                }
            }
        }
    }
}

/// Compute geometry for every cluster and apply both invalidation passes, in order.
pub fn compute_geometry(clusters: &mut ClusterSet) {
    for c in clusters.iter_mut() {
        compute_one(c);
    }
    apply_palm_veto(clusters);
    apply_overlap_suppression(clusters);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Sample;

    fn cluster_from_samples(samples: &[(u8, u8, u8)]) -> Cluster {
        let mut c = Cluster::default();
        for &(x, y, value) in samples {
            c.push(Sample { x, y, value });
        }
        c
    }

    #[test]
    fn centre_always_inside_bbox() {
        let mut set = ClusterSet::new();
        *set.alloc().unwrap() = cluster_from_samples(&[(10, 10, 40), (11, 10, 30), (10, 11, 20)]);
        compute_geometry(&mut set);
        let c = &set[0];
        assert!(c.bbox.0 <= c.centre.0 && c.centre.0 <= c.bbox.2);
        assert!(c.bbox.1 <= c.centre.1 && c.centre.1 <= c.bbox.3);
    }

    #[test]
    fn palm_veto_invalidates_all_and_is_idempotent() {
        let mut set = ClusterSet::new();
        // Enough total weight to push diameter well past DIAMETER_PALM (10): 1100/100 = 11.
        let big: Vec<(u8, u8, u8)> = (0..50).map(|i| (i, 0, 22)).collect();
        *set.alloc().unwrap() = cluster_from_samples(&big);
        *set.alloc().unwrap() = cluster_from_samples(&[(40, 40, 10)]);
        compute_geometry(&mut set);
        assert!(set.iter().all(|c| !c.valid));
        let before = set;
        let mut after = before;
        apply_palm_veto(&mut after);
        assert!(after.iter().all(|c| !c.valid));
    }

    #[test]
    fn overlapping_small_cluster_is_suppressed() {
        let mut set = ClusterSet::new();
        // Large cluster: 10 x-values x2 rows, value 10 each -> weight 200, diameter 2,
        // bbox (4.0, 0.0, 6.0, 2.0).
        let large: Vec<(u8, u8, u8)> = (0..10)
            .flat_map(|x| [(x, 0u8, 10u8), (x, 1u8, 10u8)])
            .collect();
        *set.alloc().unwrap() = cluster_from_samples(&large);
        // Small cluster: single point, weight 60, diameter 0.6, bbox (4.2, 0.2, 4.8, 0.8),
        // wholly inside the large cluster's bbox -- overlap ratio against the smaller box is 1.0.
        *set.alloc().unwrap() = cluster_from_samples(&[(4, 0, 60)]);
        compute_geometry(&mut set);
        let valid_count = set.iter().filter(|c| c.valid).count();
        assert_eq!(valid_count, 1);
        assert!(set[0].valid);
        assert!(!set[1].valid);
    }
}
