//! Direct Light Gathering
//!
//! Irradiance arriving at a path vertex straight from the scene's lights.
//! Point lights use the windowed inverse-square falloff from Real-Time
//! Rendering; area lights are sampled over their surface through the
//! precomputed triangle-area CDF, pruned by the BSP's PVS.

use std::f32::consts::PI;

use glam::Vec3;
use rand::RngExt;
use rand::rngs::StdRng;

use super::BakerSettings;
use super::LightSamplingFlags;
use super::scene::{BakeScene, BspQuery};

/// Windowed inverse-square falloff.
///
/// 1 for `distance <= reference_dist`, 0 for `distance >= max_dist`,
/// strictly decreasing in between:
/// `(max(0, 1 − (d/dMax)⁴))² · (d₀/d)²`.
#[must_use]
pub fn windowed_inverse_square_falloff(distance: f32, reference_dist: f32, max_dist: f32) -> f32 {
    if distance >= max_dist {
        return 0.0;
    }
    if distance <= reference_dist {
        return 1.0;
    }
    let window = (1.0 - (distance / max_dist).powi(4)).max(0.0);
    window * window * (reference_dist / distance).powi(2)
}

/// Gathers direct irradiance at `point` with shading normal `normal` and
/// Lambertian albedo `albedo`. Which light kinds contribute is controlled
/// by the settings' sampling flags.
#[must_use]
pub fn gather_direct_irradiance(
    scene: &BakeScene,
    bsp: &dyn BspQuery,
    settings: &BakerSettings,
    rng: &mut StdRng,
    point: Vec3,
    normal: Vec3,
    albedo: Vec3,
) -> Vec3 {
    let brdf = albedo / PI;
    let mut irradiance = Vec3::ZERO;

    if settings.flags.contains(LightSamplingFlags::SAMPLE_POINT_LIGHTS) {
        irradiance += gather_point_lights(scene, bsp, settings, point, normal, brdf);
    }
    if settings.flags.contains(LightSamplingFlags::SAMPLE_AREA_LIGHTS) {
        irradiance += gather_area_lights(scene, bsp, settings, rng, point, normal, brdf);
    }
    irradiance
}

fn gather_point_lights(
    scene: &BakeScene,
    bsp: &dyn BspQuery,
    settings: &BakerSettings,
    point: Vec3,
    normal: Vec3,
    brdf: Vec3,
) -> Vec3 {
    let mut sum = Vec3::ZERO;
    for light in &scene.point_lights {
        if light.intensity <= 0.0 {
            continue;
        }
        let to_light = light.origin - point;
        let distance = to_light.length();
        if distance > settings.point_light_max_distance {
            continue;
        }
        let direction = to_light / distance;
        let n_dot_l = normal.dot(direction);
        if n_dot_l <= 0.0 {
            continue;
        }
        if !bsp.is_point_visible_from(point, light.origin) {
            continue;
        }
        let falloff = windowed_inverse_square_falloff(
            distance,
            light.radius,
            settings.point_light_max_distance,
        );
        sum += brdf * falloff * light.color * light.intensity * n_dot_l;
    }
    sum
}

fn gather_area_lights(
    scene: &BakeScene,
    bsp: &dyn BspQuery,
    settings: &BakerSettings,
    rng: &mut StdRng,
    point: Vec3,
    normal: Vec3,
    brdf: Vec3,
) -> Vec3 {
    let visible = bsp.potentially_visible_objects(point);
    let mut sum = Vec3::ZERO;

    for light in &scene.area_lights {
        if !visible.contains(&light.object_index) {
            continue;
        }
        let Some(object) = scene.static_objects.get(light.object_index) else {
            continue;
        };
        if light.area <= 0.0 {
            continue;
        }

        let mut gathered = Vec3::ZERO;
        for _ in 0..settings.area_light_samples {
            let (x, y, z) = (
                rng.random::<f32>(),
                rng.random::<f32>(),
                rng.random::<f32>(),
            );
            let triangle_index = light.pick_triangle(z);
            let [v0, v1, v2] = object.triangle(triangle_index);

            // Uniform barycentrics over the picked triangle.
            let sqrt_x = x.sqrt();
            let u = 1.0 - sqrt_x;
            let v = y * sqrt_x;
            let w = 1.0 - u - v;
            let sample = v0 * u + v1 * v + v2 * w;

            // The light face must point toward the shaded point.
            let light_normal = object.triangle_face_normal(triangle_index);
            if light_normal.dot(sample - point) >= 0.0 {
                continue;
            }

            let to_sample = sample - point;
            let distance = to_sample.length();
            if distance > settings.point_light_max_distance || distance <= 0.0 {
                continue;
            }
            let direction = to_sample / distance;
            let n_dot_l = normal.dot(direction);
            if n_dot_l <= 0.0 {
                continue;
            }
            if !bsp.is_point_visible_from(point, sample) {
                continue;
            }

            let falloff = windowed_inverse_square_falloff(
                distance,
                settings.light_reference_distance,
                settings.point_light_max_distance,
            );
            gathered += brdf * light.radiance * falloff * n_dot_l;
        }
        sum += gathered * (light.area / settings.area_light_samples as f32);
    }
    sum
}
