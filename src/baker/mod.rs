//! Diffuse-Indirect Light Baker
//!
//! Offline Monte-Carlo path tracer producing irradiance probes encoded
//! as order-3 spherical-harmonic coefficients, either for every PVS
//! cluster of the level or only for the cluster containing the camera.
//!
//! A worker pool claims clusters atomically; every worker owns its RNG
//! stream and sends finished clusters over a channel, so probe storage
//! needs no locking. The finished snapshot is transferable: the renderer
//! takes it by move, after which the baker holds nothing.

pub mod bake_points;
pub mod lights;
pub mod pathtrace;
pub mod sampling;
pub mod scene;
pub mod serialization;
pub mod sh;

use std::sync::atomic::{AtomicUsize, Ordering};

use bitflags::bitflags;
use glam::Vec3;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::errors::{CinderError, Result};

use bake_points::generate_bake_points;
use pathtrace::integrate_probe;
use scene::{BakeScene, BspQuery};
use sh::SH_COEFF_COUNT;

bitflags! {
    /// Which direct-light kinds the baker samples.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LightSamplingFlags: u32 {
        const SAMPLE_POINT_LIGHTS = 1 << 0;
        const SAMPLE_AREA_LIGHTS = 1 << 1;
    }
}

/// What the bake covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakingMode {
    /// Every cluster of the BSP.
    AllClusters,
    /// Only the cluster containing the configured bake position.
    CurrentPositionCluster,
}

/// One segment of a traced debug path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSegment {
    pub start: Vec3,
    pub end: Vec3,
}

/// One baked probe: nine RGB SH coefficients plus an optional debug
/// payload of the paths that produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffuseProbe {
    pub coefficients: [Vec3; SH_COEFF_COUNT],
    pub debug_paths: Option<Vec<PathSegment>>,
}

/// A completed (or deserialized) bake, ready for the renderer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BakingData {
    pub mode: BakingMode,
    /// Baked cluster in current-position mode.
    pub bake_cluster: Option<u32>,
    /// Flat-array layout in all-clusters mode.
    pub cluster_first_probe_indices: Option<Vec<usize>>,
    pub probes: Vec<DiffuseProbe>,
}

impl Default for BakingMode {
    fn default() -> Self {
        BakingMode::AllClusters
    }
}

/// Baker tuning knobs. The defaults match the shipped bake profile.
#[derive(Debug, Clone)]
pub struct BakerSettings {
    /// Initial directions drawn per probe.
    pub probe_samples: u32,
    /// Surface samples per area light per gather.
    pub area_light_samples: u32,
    /// Bounces taken before Russian roulette may terminate the path.
    pub guaranteed_bounces: u32,
    /// Hard upper bound on the bounce chain.
    pub max_bounces: u32,
    /// Russian-roulette absorption probability.
    pub russian_roulette_absorb: f32,
    /// Grid spacing of bake points inside a cluster, in world units.
    pub bake_point_spacing: f32,
    /// Per-axis shrink applied to a cluster AABB before gridding.
    pub cluster_shrink_epsilon: f32,
    /// Offset applied backwards along a ray to reconstruct hit points.
    pub ray_epsilon: f32,
    /// Beyond this distance lights contribute nothing.
    pub point_light_max_distance: f32,
    /// Falloff reference distance of area-light samples.
    pub light_reference_distance: f32,
    pub flags: LightSamplingFlags,
    /// Collect per-sample path segments into the probes.
    pub debug_paths: bool,
    /// Base seed of the per-worker RNG streams.
    pub seed: u64,
}

impl Default for BakerSettings {
    fn default() -> Self {
        Self {
            probe_samples: 128,
            area_light_samples: 16,
            guaranteed_bounces: 3,
            max_bounces: 16,
            russian_roulette_absorb: 0.3,
            bake_point_spacing: 50.0,
            cluster_shrink_epsilon: 1.0,
            ray_epsilon: 0.01,
            point_light_max_distance: 400.0,
            light_reference_distance: 1.0,
            flags: LightSamplingFlags::SAMPLE_POINT_LIGHTS | LightSamplingFlags::SAMPLE_AREA_LIGHTS,
            debug_paths: false,
            seed: 0x00C1_D3F0_0D5E_ED00,
        }
    }
}

/// The offline baker.
pub struct LightBaker {
    settings: BakerSettings,
    mode: BakingMode,
    bake_position: Option<Vec3>,
    probes_baked: AtomicUsize,
    total_probes: usize,
    result: Option<BakingData>,
    complete: bool,
}

impl Default for LightBaker {
    fn default() -> Self {
        Self::new(BakerSettings::default())
    }
}

impl LightBaker {
    #[must_use]
    pub fn new(settings: BakerSettings) -> Self {
        Self {
            settings,
            mode: BakingMode::AllClusters,
            bake_position: None,
            probes_baked: AtomicUsize::new(0),
            total_probes: 0,
            result: None,
            complete: false,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &BakerSettings {
        &self.settings
    }

    pub fn set_mode(&mut self, mode: BakingMode) {
        self.mode = mode;
    }

    /// Sets the camera position used by current-position-cluster mode.
    pub fn set_bake_position(&mut self, position: Vec3) {
        self.bake_position = Some(position);
    }

    /// `(probes baked so far, total probes)` of the running or finished bake.
    #[must_use]
    pub fn progress(&self) -> (usize, usize) {
        (self.probes_baked.load(Ordering::Relaxed), self.total_probes)
    }

    /// Whether a complete baking result is held and not yet transferred.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Runs a full bake. Blocks until every worker has finished; on error
    /// no partial result is retained.
    pub fn bake(&mut self, scene: &BakeScene, bsp: &dyn BspQuery) -> Result<()> {
        self.complete = false;
        self.result = None;
        self.total_probes = 0;
        self.probes_baked.store(0, Ordering::Relaxed);

        let all_clusters = bsp.clusters_set();
        if all_clusters.is_empty() {
            return Err(CinderError::BakingInputInvalid(
                "the BSP has no clusters".to_string(),
            ));
        }

        let (clusters, bake_cluster) = match self.mode {
            BakingMode::AllClusters => (all_clusters, None),
            BakingMode::CurrentPositionCluster => {
                let position = self.bake_position.ok_or_else(|| {
                    CinderError::BakingInputInvalid(
                        "current-position mode requires a bake position".to_string(),
                    )
                })?;
                let cluster = bsp.cluster_with_point(position).ok_or_else(|| {
                    CinderError::BakingInputInvalid(format!(
                        "bake position {position} is outside every cluster"
                    ))
                })?;
                (vec![cluster], Some(cluster))
            }
        };

        let layout = generate_bake_points(
            bsp,
            &clusters,
            self.settings.bake_point_spacing,
            self.settings.cluster_shrink_epsilon,
        );
        self.total_probes = layout.total;

        let worker_count = std::thread::available_parallelism()
            .map_or(4, std::num::NonZeroUsize::get)
            .min(clusters.len());
        log::info!(
            "baking {} probes across {} clusters on {worker_count} workers",
            layout.total,
            clusters.len()
        );

        let next_cluster = AtomicUsize::new(0);
        let (sender, receiver) = flume::unbounded::<(usize, Vec<DiffuseProbe>)>();

        let settings = &self.settings;
        let probes_baked = &self.probes_baked;
        let layout_ref = &layout;
        let next_cluster_ref = &next_cluster;

        std::thread::scope(|scope| {
            for worker_index in 0..worker_count {
                let sender = sender.clone();
                scope.spawn(move || {
                    let mut rng =
                        StdRng::seed_from_u64(mix_seed(settings.seed, worker_index as u64));
                    loop {
                        let claim = next_cluster_ref.fetch_add(1, Ordering::Relaxed);
                        if claim >= layout_ref.clusters.len() {
                            break;
                        }
                        let points = &layout_ref.points[claim];
                        let mut probes = Vec::with_capacity(points.len());
                        for &point in points {
                            probes.push(integrate_probe(scene, bsp, settings, &mut rng, point));
                            probes_baked.fetch_add(1, Ordering::Relaxed);
                        }
                        if sender.send((claim, probes)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(sender);

        // Each cluster occupies a disjoint range of the flat array.
        let mut probes = Vec::new();
        probes.resize_with(layout.total, DiffuseProbe::default);
        for (claim, cluster_probes) in receiver.try_iter() {
            let first = layout.first_probe_indices[claim];
            for (offset, probe) in cluster_probes.into_iter().enumerate() {
                probes[first + offset] = probe;
            }
        }

        self.result = Some(BakingData {
            mode: self.mode,
            bake_cluster,
            cluster_first_probe_indices: (self.mode == BakingMode::AllClusters)
                .then(|| layout.first_probe_indices.clone()),
            probes,
        });
        self.complete = true;
        log::info!("bake finished: {} probes", self.total_probes);
        Ok(())
    }

    /// Moves the finished snapshot out, clearing the in-progress state.
    pub fn transfer_result(&mut self) -> Option<BakingData> {
        let result = self.result.take();
        if result.is_some() {
            self.complete = false;
            self.total_probes = 0;
            self.probes_baked.store(0, Ordering::Relaxed);
        }
        result
    }
}

/// splitmix64-style mix of the base seed with a worker stream index.
fn mix_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
