//! Per-Probe Monte-Carlo Integration
//!
//! One probe integrates incident radiance over the sphere: uniform
//! initial directions, a bounce chain with cosine-weighted continuation
//! and direct-light gathering at every vertex, projection of each
//! sample's accumulated radiance onto the SH9 basis in the *initial*
//! direction, and the Monte-Carlo estimator scale at the end.
//!
//! Russian roulette starts after the guaranteed bounces; surviving paths
//! compensate their throughput by `1 / (1 − absorb)`.

use std::f32::consts::PI;

use glam::Vec3;
use rand::RngExt;
use rand::rngs::StdRng;

use super::BakerSettings;
use super::lights::gather_direct_irradiance;
use super::sampling::{
    UNIFORM_SPHERE_PDF, align_to_normal, cosine_hemisphere_pdf, cosine_hemisphere_sample,
    uniform_sphere_sample,
};
use super::scene::{BakeScene, BspQuery, Ray};
use super::sh::{SH_COEFF_COUNT, project_sh9};
use super::{DiffuseProbe, PathSegment};

/// Integrates one probe at `position`.
#[must_use]
pub fn integrate_probe(
    scene: &BakeScene,
    bsp: &dyn BspQuery,
    settings: &BakerSettings,
    rng: &mut StdRng,
    position: Vec3,
) -> DiffuseProbe {
    let mut coefficients = [Vec3::ZERO; SH_COEFF_COUNT];
    let mut debug_paths = settings.debug_paths.then(Vec::new);

    for _ in 0..settings.probe_samples {
        let direction = uniform_sphere_sample(rng.random::<f32>(), rng.random::<f32>());
        let ray = Ray {
            origin: position,
            direction,
        };
        let radiance = trace_path(scene, bsp, settings, rng, ray, debug_paths.as_mut());
        project_sh9(direction, radiance, &mut coefficients);
    }

    // Monte-Carlo estimator of the sphere integral: divide by the sample
    // count and the uniform-sphere PDF.
    let scale = (1.0 / UNIFORM_SPHERE_PDF) / settings.probe_samples as f32;
    for coefficient in &mut coefficients {
        *coefficient *= scale;
    }

    DiffuseProbe {
        coefficients,
        debug_paths,
    }
}

/// Traces one path and returns its accumulated radiance.
fn trace_path(
    scene: &BakeScene,
    bsp: &dyn BspQuery,
    settings: &BakerSettings,
    rng: &mut StdRng,
    mut ray: Ray,
    mut debug_paths: Option<&mut Vec<PathSegment>>,
) -> Vec3 {
    let mut radiance = Vec3::ZERO;
    let mut throughput = Vec3::ONE;

    for bounce in 0..settings.max_bounces {
        let Some(hit) = bsp.closest_ray_intersection(&ray) else {
            break;
        };
        // Reconstruct the hit slightly before the surface so follow-up
        // rays cannot re-hit the same triangle.
        let hit_point = ray.origin + ray.direction * (hit.t - settings.ray_epsilon);

        if let Some(segments) = &mut debug_paths {
            segments.push(PathSegment {
                start: ray.origin,
                end: hit_point,
            });
        }

        let Some(object) = scene.static_objects.get(hit.static_obj_index) else {
            break;
        };
        let normal = object.interpolated_normal(&hit);
        let albedo = object.albedo;

        let direct =
            gather_direct_irradiance(scene, bsp, settings, rng, hit_point, normal, albedo);
        radiance += throughput * direct;

        let is_guaranteed_bounce = bounce + 1 < settings.guaranteed_bounces;
        if !is_guaranteed_bounce {
            let absorb = settings.russian_roulette_absorb.clamp(0.0, 0.95);
            if rng.random::<f32>() < absorb {
                break;
            }
            throughput /= 1.0 - absorb;
        }

        let local = cosine_hemisphere_sample(rng.random::<f32>(), rng.random::<f32>());
        let cos_theta = local.z;
        if cos_theta <= 0.0 {
            break;
        }
        let brdf = albedo / PI;
        throughput *= brdf * cos_theta / cosine_hemisphere_pdf(cos_theta);

        ray = Ray {
            origin: hit_point,
            direction: align_to_normal(normal, local),
        };
    }

    radiance
}
