//! Bake-Point Generation
//!
//! Probes are placed on a uniform 3-D grid inside each selected cluster's
//! AABB, shrunk by a small epsilon on every axis so points never sit on
//! cluster boundaries. Per-cluster point lists index into one flat probe
//! array through a prefix-sum table.

use glam::Vec3;

use super::scene::{Aabb, BspQuery};

/// Bake points of the selected clusters, plus the flat-array layout.
#[derive(Debug, Clone)]
pub struct ClusterBakePoints {
    /// Selected clusters, ascending.
    pub clusters: Vec<u32>,
    /// Bake points per cluster, parallel to `clusters`.
    pub points: Vec<Vec<Vec3>>,
    /// `first_probe_indices[i]` is the flat index of cluster `i`'s first
    /// probe; prefix sums of the per-cluster point counts.
    pub first_probe_indices: Vec<usize>,
    /// Total probe count.
    pub total: usize,
}

/// Grid positions along one axis: `min + i·spacing`, clamped to `max`.
/// A span smaller than the spacing (or even negative after the epsilon
/// shrink) still yields one position.
fn axis_steps(min: f32, max: f32, spacing: f32) -> Vec<f32> {
    let span = (max - min).max(0.0);
    let count = (span / spacing).floor() as usize + 1;
    (0..count).map(|i| (min + i as f32 * spacing).min(max)).collect()
}

/// Uniform grid inside one cluster AABB.
#[must_use]
pub fn cluster_grid(aabb: &Aabb, spacing: f32, epsilon: f32) -> Vec<Vec3> {
    let min = aabb.min + Vec3::splat(epsilon);
    let max = aabb.max - Vec3::splat(epsilon);
    // A degenerate axis collapses to a single coordinate.
    let max = max.max(min);

    let xs = axis_steps(min.x, max.x, spacing);
    let ys = axis_steps(min.y, max.y, spacing);
    let zs = axis_steps(min.z, max.z, spacing);

    let mut points = Vec::with_capacity(xs.len() * ys.len() * zs.len());
    for &x in &xs {
        for &y in &ys {
            for &z in &zs {
                points.push(Vec3::new(x, y, z));
            }
        }
    }
    points
}

/// Generates bake points for `clusters` and lays out the flat probe array.
#[must_use]
pub fn generate_bake_points(
    bsp: &dyn BspQuery,
    clusters: &[u32],
    spacing: f32,
    epsilon: f32,
) -> ClusterBakePoints {
    let mut points = Vec::with_capacity(clusters.len());
    let mut first_probe_indices = Vec::with_capacity(clusters.len());
    let mut total = 0usize;

    for &cluster in clusters {
        let cluster_points = match bsp.cluster_aabb(cluster) {
            Some(aabb) => cluster_grid(&aabb, spacing, epsilon),
            None => {
                log::warn!("cluster {cluster} has no AABB, baking no probes for it");
                Vec::new()
            }
        };
        first_probe_indices.push(total);
        total += cluster_points.len();
        points.push(cluster_points);
    }

    ClusterBakePoints {
        clusters: clusters.to_vec(),
        points,
        first_probe_indices,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_spacing_and_clamping() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::new(120.0, 60.0, 10.0));
        let points = cluster_grid(&aabb, 50.0, 1.0);
        // x: 1, 51, 101 → 3 steps; y: 1, 51 → 2; z: 1 → 1.
        assert_eq!(points.len(), 3 * 2 * 1);
        for point in &points {
            assert!(aabb.contains(*point));
        }
    }

    #[test]
    fn degenerate_axis_yields_one_point() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::new(0.5, 200.0, 200.0));
        let points = cluster_grid(&aabb, 50.0, 1.0);
        // x collapses below the epsilon shrink: exactly one x coordinate.
        let xs: Vec<f32> = points.iter().map(|p| p.x).collect();
        assert!(xs.iter().all(|&x| (x - xs[0]).abs() < 1e-6));
        assert!(!points.is_empty());
    }

    #[test]
    fn prefix_sums_cover_all_points() {
        struct GridBsp;
        impl BspQuery for GridBsp {
            fn clusters_set(&self) -> Vec<u32> {
                vec![0, 1]
            }
            fn cluster_aabb(&self, cluster: u32) -> Option<Aabb> {
                let offset = cluster as f32 * 100.0;
                Some(Aabb::new(
                    Vec3::splat(offset),
                    Vec3::splat(offset + 60.0),
                ))
            }
            fn cluster_with_point(&self, _point: Vec3) -> Option<u32> {
                None
            }
            fn is_point_visible_from(&self, _from: Vec3, _to: Vec3) -> bool {
                true
            }
            fn potentially_visible_objects(&self, _point: Vec3) -> Vec<usize> {
                Vec::new()
            }
            fn closest_ray_intersection(
                &self,
                _ray: &super::super::scene::Ray,
            ) -> Option<super::super::scene::RayHit> {
                None
            }
        }

        let layout = generate_bake_points(&GridBsp, &[0, 1], 50.0, 1.0);
        assert_eq!(layout.first_probe_indices[0], 0);
        assert_eq!(layout.first_probe_indices[1], layout.points[0].len());
        assert_eq!(
            layout.total,
            layout.points.iter().map(Vec::len).sum::<usize>()
        );
    }
}
