//! Monte-Carlo Sampling Primitives
//!
//! Uniform sphere directions for the initial probe rays, Shirley's
//! concentric square-to-disk map lifted into cosine-weighted hemisphere
//! directions for the bounce rays, basis rotation onto the shading
//! normal, and the ray/triangle intersection the brute-force test BSP
//! shares with production queries.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use glam::{Vec2, Vec3};

/// PDF of a uniform direction on the full sphere.
pub const UNIFORM_SPHERE_PDF: f32 = 1.0 / (4.0 * PI);

/// Uniform direction on the unit sphere from two uniform randoms.
#[must_use]
pub fn uniform_sphere_sample(u1: f32, u2: f32) -> Vec3 {
    let z = 1.0 - 2.0 * u1;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * u2;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// Shirley's area-preserving square-to-disk map.
#[must_use]
pub fn concentric_disk_sample(u1: f32, u2: f32) -> Vec2 {
    // Map [0,1)² onto [-1,1)².
    let offset = Vec2::new(2.0 * u1 - 1.0, 2.0 * u2 - 1.0);
    if offset.x == 0.0 && offset.y == 0.0 {
        return Vec2::ZERO;
    }
    let (r, theta) = if offset.x.abs() > offset.y.abs() {
        (offset.x, FRAC_PI_4 * (offset.y / offset.x))
    } else {
        (offset.y, FRAC_PI_2 - FRAC_PI_4 * (offset.x / offset.y))
    };
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Cosine-weighted hemisphere direction around +Z: concentric disk point
/// with the z coordinate lifted onto the sphere.
#[must_use]
pub fn cosine_hemisphere_sample(u1: f32, u2: f32) -> Vec3 {
    let disk = concentric_disk_sample(u1, u2);
    let z = (1.0 - disk.x * disk.x - disk.y * disk.y).max(0.0).sqrt();
    Vec3::new(disk.x, disk.y, z)
}

/// PDF of a cosine-weighted hemisphere direction with the given cosine.
#[inline]
#[must_use]
pub fn cosine_hemisphere_pdf(cos_theta: f32) -> f32 {
    cos_theta / PI
}

/// Rotates a +Z-hemisphere sample so its z axis aligns with `normal`.
///
/// Uses the branchless orthonormal basis of Duff et al.; the rotated
/// direction satisfies `normal.dot(result) == sample.z`.
#[must_use]
pub fn align_to_normal(normal: Vec3, sample: Vec3) -> Vec3 {
    let sign = 1.0f32.copysign(normal.z);
    let a = -1.0 / (sign + normal.z);
    let b = normal.x * normal.y * a;
    let tangent = Vec3::new(1.0 + sign * normal.x * normal.x * a, sign * b, -sign * normal.x);
    let bitangent = Vec3::new(b, sign + normal.y * normal.y * a, -normal.y);
    tangent * sample.x + bitangent * sample.y + normal * sample.z
}

/// Möller–Trumbore ray/triangle intersection. Returns `(t, u, v)` with
/// `u`, `v` the barycentric weights of `v1`, `v2`.
#[must_use]
pub fn ray_triangle_intersection(
    origin: Vec3,
    direction: Vec3,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
) -> Option<(f32, f32, f32)> {
    const EPSILON: f32 = 1e-7;

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let p = direction.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - v0;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inv_det;
    if t <= EPSILON {
        return None;
    }
    Some((t, u, v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn halton(index: u32, base: u32) -> f32 {
        let mut f = 1.0f32;
        let mut r = 0.0f32;
        let mut i = index;
        while i > 0 {
            f /= base as f32;
            r += f * (i % base) as f32;
            i /= base;
        }
        r
    }

    #[test]
    fn uniform_sphere_samples_are_unit() {
        for i in 1..256 {
            let dir = uniform_sphere_sample(halton(i, 2), halton(i, 3));
            assert!((dir.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn cosine_samples_stay_in_upper_hemisphere() {
        for i in 1..256 {
            let sample = cosine_hemisphere_sample(halton(i, 2), halton(i, 3));
            assert!(sample.z >= 0.0);
            assert!(sample.length() <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn rotated_sample_preserves_cosine() {
        let normal = Vec3::new(1.0, 2.0, -0.5).normalize();
        for i in 1..64 {
            let sample = cosine_hemisphere_sample(halton(i, 2), halton(i, 3));
            let rotated = align_to_normal(normal, sample);
            assert!((rotated.length() - 1.0).abs() < 1e-4);
            assert!((normal.dot(rotated) - sample.z).abs() < 1e-4);
        }
    }

    #[test]
    fn concentric_disk_center_maps_to_origin() {
        assert_eq!(concentric_disk_sample(0.5, 0.5), Vec2::ZERO);
    }

    #[test]
    fn triangle_hit_and_miss() {
        let v0 = Vec3::new(-1.0, -1.0, 5.0);
        let v1 = Vec3::new(1.0, -1.0, 5.0);
        let v2 = Vec3::new(0.0, 1.0, 5.0);

        let hit = ray_triangle_intersection(Vec3::ZERO, Vec3::Z, v0, v1, v2).unwrap();
        assert!((hit.0 - 5.0).abs() < 1e-5);

        assert!(ray_triangle_intersection(Vec3::ZERO, -Vec3::Z, v0, v1, v2).is_none());
        assert!(
            ray_triangle_intersection(Vec3::new(5.0, 0.0, 0.0), Vec3::Z, v0, v1, v2).is_none()
        );
    }
}
