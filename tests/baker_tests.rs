//! Light Baker Tests
//!
//! End-to-end bakes against a brute-force BSP stand-in: cluster
//! selection in both baking modes, prefix-sum layout invariants,
//! point-light occlusion, and the textual round trip of baked data.

use cinder::baker::sampling::ray_triangle_intersection;
use cinder::baker::scene::{
    Aabb, AreaLight, BakeScene, BspQuery, PointLight, Ray, RayHit, StaticObject,
};
use cinder::baker::{BakerSettings, BakingData, BakingMode, LightBaker, LightSamplingFlags};
use glam::Vec3;

// ============================================================================
// Brute-force BSP stand-in
// ============================================================================

/// Clusters are plain boxes; ray and visibility queries walk every
/// triangle of the scene.
struct BruteForceBsp {
    clusters: Vec<Aabb>,
    objects: Vec<StaticObject>,
}

impl BruteForceBsp {
    fn new(clusters: Vec<Aabb>, objects: Vec<StaticObject>) -> Self {
        Self { clusters, objects }
    }
}

impl BspQuery for BruteForceBsp {
    fn clusters_set(&self) -> Vec<u32> {
        (0..self.clusters.len() as u32).collect()
    }

    fn cluster_aabb(&self, cluster: u32) -> Option<Aabb> {
        self.clusters.get(cluster as usize).copied()
    }

    fn cluster_with_point(&self, point: Vec3) -> Option<u32> {
        self.clusters
            .iter()
            .position(|aabb| aabb.contains(point))
            .map(|index| index as u32)
    }

    fn is_point_visible_from(&self, from: Vec3, to: Vec3) -> bool {
        let delta = to - from;
        let distance = delta.length();
        if distance <= f32::EPSILON {
            return true;
        }
        let ray = Ray {
            origin: from,
            direction: delta / distance,
        };
        match self.closest_ray_intersection(&ray) {
            Some(hit) => hit.t >= distance - 1e-3,
            None => true,
        }
    }

    fn potentially_visible_objects(&self, _point: Vec3) -> Vec<usize> {
        (0..self.objects.len()).collect()
    }

    fn closest_ray_intersection(&self, ray: &Ray) -> Option<RayHit> {
        let mut closest: Option<RayHit> = None;
        for (object_index, object) in self.objects.iter().enumerate() {
            for triangle_index in 0..object.triangle_count() {
                let [v0, v1, v2] = object.triangle(triangle_index);
                if let Some((t, u, v)) =
                    ray_triangle_intersection(ray.origin, ray.direction, v0, v1, v2)
                {
                    if closest.as_ref().is_none_or(|hit| t < hit.t) {
                        closest = Some(RayHit {
                            t,
                            u,
                            v,
                            w: 1.0 - u - v,
                            static_obj_index: object_index,
                            triangle_index,
                        });
                    }
                }
            }
        }
        closest
    }
}

/// Horizontal quad at height `z` spanning `[min, max]²`, normals up.
fn floor_quad(min: f32, max: f32, z: f32) -> StaticObject {
    StaticObject {
        vertices: vec![
            Vec3::new(min, min, z),
            Vec3::new(max, min, z),
            Vec3::new(max, max, z),
            Vec3::new(min, max, z),
        ],
        normals: vec![Vec3::Z; 4],
        indices: vec![0, 1, 2, 0, 2, 3],
        albedo: Vec3::splat(0.5),
    }
}

fn quick_settings() -> BakerSettings {
    BakerSettings {
        probe_samples: 32,
        area_light_samples: 4,
        guaranteed_bounces: 2,
        max_bounces: 4,
        ..BakerSettings::default()
    }
}

// ============================================================================
// Mode selection & layout
// ============================================================================

#[test]
fn current_position_mode_bakes_only_the_camera_cluster() {
    let clusters = vec![
        Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(100.0, 100.0, 100.0)),
        Aabb::new(Vec3::new(100.0, 0.0, 0.0), Vec3::new(200.0, 100.0, 100.0)),
        Aabb::new(Vec3::new(200.0, 0.0, 0.0), Vec3::new(300.0, 100.0, 100.0)),
    ];
    let bsp = BruteForceBsp::new(clusters, vec![floor_quad(0.0, 300.0, 0.0)]);
    let scene = BakeScene {
        static_objects: vec![floor_quad(0.0, 300.0, 0.0)],
        point_lights: vec![],
        area_lights: vec![],
    };

    let mut baker = LightBaker::new(quick_settings());
    baker.set_mode(BakingMode::CurrentPositionCluster);
    baker.set_bake_position(Vec3::new(150.0, 50.0, 50.0));
    baker.bake(&scene, &bsp).unwrap();

    assert!(baker.is_complete());
    let (baked, total) = baker.progress();
    assert_eq!(baked, total);

    let data = baker.transfer_result().unwrap();
    assert_eq!(data.mode, BakingMode::CurrentPositionCluster);
    assert_eq!(data.bake_cluster, Some(1));
    assert!(data.cluster_first_probe_indices.is_none());
    // 100³ box, epsilon-shrunk, spacing 50: two grid steps per axis.
    assert_eq!(data.probes.len(), 8);

    // The transfer cleared the in-progress snapshot.
    assert!(!baker.is_complete());
    assert!(baker.transfer_result().is_none());
}

#[test]
fn all_clusters_mode_lays_probes_out_by_prefix_sums() {
    let clusters = vec![
        Aabb::new(Vec3::ZERO, Vec3::new(60.0, 60.0, 60.0)),
        Aabb::new(Vec3::new(60.0, 0.0, 0.0), Vec3::new(180.0, 60.0, 60.0)),
    ];
    let bsp = BruteForceBsp::new(clusters, vec![]);
    let scene = BakeScene::default();

    let mut baker = LightBaker::new(quick_settings());
    baker.set_mode(BakingMode::AllClusters);
    baker.bake(&scene, &bsp).unwrap();

    let data = baker.transfer_result().unwrap();
    let indices = data.cluster_first_probe_indices.as_ref().unwrap();
    assert_eq!(indices.len(), 2);
    assert_eq!(indices[0], 0);
    // Cluster 0 spans 58 units per axis after the shrink: 2 steps each.
    assert_eq!(indices[1], 8);
    assert_eq!(data.probes.len(), 8 + 3 * 2 * 2);
}

#[test]
fn missing_bake_position_is_invalid_input() {
    let bsp = BruteForceBsp::new(
        vec![Aabb::new(Vec3::ZERO, Vec3::splat(10.0))],
        vec![],
    );
    let mut baker = LightBaker::new(quick_settings());
    baker.set_mode(BakingMode::CurrentPositionCluster);
    let err = baker.bake(&BakeScene::default(), &bsp).unwrap_err();
    assert!(matches!(err, cinder::CinderError::BakingInputInvalid(_)));
    assert!(!baker.is_complete());
}

#[test]
fn empty_cluster_set_is_invalid_input() {
    let bsp = BruteForceBsp::new(vec![], vec![]);
    let mut baker = LightBaker::new(quick_settings());
    let err = baker.bake(&BakeScene::default(), &bsp).unwrap_err();
    assert!(matches!(err, cinder::CinderError::BakingInputInvalid(_)));
}

// ============================================================================
// Lighting
// ============================================================================

fn lit_box_scene(light_color: Vec3) -> (BruteForceBsp, BakeScene) {
    let objects = vec![floor_quad(-100.0, 100.0, 0.0)];
    let bsp = BruteForceBsp::new(
        vec![Aabb::new(
            Vec3::new(-60.0, -60.0, 10.0),
            Vec3::new(60.0, 60.0, 90.0),
        )],
        objects.clone(),
    );
    let scene = BakeScene {
        static_objects: objects,
        point_lights: vec![PointLight {
            origin: Vec3::new(0.0, 0.0, 80.0),
            color: light_color,
            intensity: 10.0,
            radius: 1.0,
        }],
        area_lights: vec![],
    };
    (bsp, scene)
}

#[test]
fn lit_probe_gathers_positive_irradiance() {
    let (bsp, scene) = lit_box_scene(Vec3::ONE);
    let mut baker = LightBaker::new(quick_settings());
    baker.set_mode(BakingMode::CurrentPositionCluster);
    baker.set_bake_position(Vec3::new(0.0, 0.0, 50.0));
    baker.bake(&scene, &bsp).unwrap();

    let data = baker.transfer_result().unwrap();
    // The DC band must see energy coming off the lit floor.
    let dc_sum: f32 = data.probes.iter().map(|p| p.coefficients[0].x).sum();
    assert!(dc_sum > 0.0, "expected positive DC irradiance, got {dc_sum}");
}

#[test]
fn occluded_point_light_contributes_nothing() {
    // A wall between the light and everything the probe's paths can hit.
    let wall = floor_quad(-200.0, 200.0, 100.0);
    let floor = floor_quad(-200.0, 200.0, 0.0);
    let light = PointLight {
        origin: Vec3::new(0.0, 0.0, 150.0),
        color: Vec3::ONE,
        intensity: 10.0,
        radius: 1.0,
    };
    let cluster = Aabb::new(Vec3::new(-40.0, -40.0, 20.0), Vec3::new(40.0, 40.0, 80.0));

    let settings = quick_settings();

    let run = |color: Vec3| -> BakingData {
        let objects = vec![floor.clone(), wall.clone()];
        let bsp = BruteForceBsp::new(vec![cluster], objects.clone());
        let scene = BakeScene {
            static_objects: objects,
            point_lights: vec![PointLight {
                color,
                ..light
            }],
            area_lights: vec![],
        };
        let mut baker = LightBaker::new(settings.clone());
        baker.set_mode(BakingMode::CurrentPositionCluster);
        baker.set_bake_position(Vec3::new(0.0, 0.0, 50.0));
        baker.bake(&scene, &bsp).unwrap();
        baker.transfer_result().unwrap()
    };

    let occluded = run(Vec3::ONE);
    let dark = run(Vec3::ZERO);

    assert_eq!(occluded.probes.len(), dark.probes.len());
    for (a, b) in occluded.probes.iter().zip(&dark.probes) {
        for (ca, cb) in a.coefficients.iter().zip(&b.coefficients) {
            assert!(
                (*ca - *cb).abs().max_element() < 1e-6,
                "occluded light leaked: {ca} vs {cb}"
            );
        }
    }
}

#[test]
fn area_light_illuminates_the_floor() {
    let floor = floor_quad(-100.0, 100.0, 0.0);
    // Emissive panel above, facing down.
    let panel = StaticObject {
        vertices: vec![
            Vec3::new(-20.0, -20.0, 90.0),
            Vec3::new(-20.0, 20.0, 90.0),
            Vec3::new(20.0, 20.0, 90.0),
            Vec3::new(20.0, -20.0, 90.0),
        ],
        normals: vec![-Vec3::Z; 4],
        indices: vec![0, 1, 2, 0, 2, 3],
        albedo: Vec3::splat(0.5),
    };
    let objects = vec![floor, panel];
    let area_light = AreaLight::new(1, &objects[1], Vec3::splat(5.0));
    assert!(area_light.area > 0.0);

    let bsp = BruteForceBsp::new(
        vec![Aabb::new(
            Vec3::new(-30.0, -30.0, 20.0),
            Vec3::new(30.0, 30.0, 60.0),
        )],
        objects.clone(),
    );
    let scene = BakeScene {
        static_objects: objects,
        point_lights: vec![],
        area_lights: vec![area_light],
    };

    let mut settings = quick_settings();
    settings.flags = LightSamplingFlags::SAMPLE_AREA_LIGHTS;
    let mut baker = LightBaker::new(settings);
    baker.set_mode(BakingMode::CurrentPositionCluster);
    baker.set_bake_position(Vec3::new(0.0, 0.0, 40.0));
    baker.bake(&scene, &bsp).unwrap();

    let data = baker.transfer_result().unwrap();
    let dc_sum: f32 = data.probes.iter().map(|p| p.coefficients[0].x).sum();
    assert!(dc_sum > 0.0, "area light produced no irradiance");
}

// ============================================================================
// Serialization round trip
// ============================================================================

#[test]
fn baked_data_round_trips_through_text() {
    let (bsp, scene) = lit_box_scene(Vec3::new(1.0, 0.6, 0.2));
    let mut baker = LightBaker::new(quick_settings());
    baker.set_mode(BakingMode::AllClusters);
    baker.bake(&scene, &bsp).unwrap();
    let data = baker.transfer_result().unwrap();

    let parsed = BakingData::parse(&data.to_text()).unwrap();
    assert_eq!(parsed.mode, data.mode);
    assert_eq!(
        parsed.cluster_first_probe_indices,
        data.cluster_first_probe_indices
    );
    assert_eq!(parsed.probes.len(), data.probes.len());
    for (a, b) in data.probes.iter().zip(&parsed.probes) {
        for (ca, cb) in a.coefficients.iter().zip(&b.coefficients) {
            assert!((*ca - *cb).abs().max_element() < 1e-6);
        }
    }
}

#[test]
fn baked_data_round_trips_through_a_file() -> anyhow::Result<()> {
    let (bsp, scene) = lit_box_scene(Vec3::ONE);
    let mut baker = LightBaker::new(quick_settings());
    baker.set_mode(BakingMode::CurrentPositionCluster);
    baker.set_bake_position(Vec3::new(0.0, 0.0, 50.0));
    baker.bake(&scene, &bsp)?;
    let data = baker.transfer_result().expect("bake completed");

    let path = std::env::temp_dir().join(format!("cinder-bake-{}.txt", std::process::id()));
    data.save_to_file(&path)?;
    let loaded = BakingData::load_from_file(&path)?;
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.bake_cluster, data.bake_cluster);
    assert_eq!(loaded.probes.len(), data.probes.len());
    Ok(())
}

#[test]
fn missing_baked_file_is_an_io_error() {
    let err = BakingData::load_from_file("/nonexistent/bake.txt").unwrap_err();
    assert!(matches!(err, cinder::CinderError::BakingDataIoError(_)));
}
