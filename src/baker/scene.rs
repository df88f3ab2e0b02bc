//! Bake Scene Inputs
//!
//! The baker consumes the static world through two collaborator
//! interfaces: [`BspQuery`] (clusters, PVS, visibility and ray queries of
//! the map's BSP) and [`BakeScene`] (triangle geometry, point lights and
//! area lights). Loading either from disk is someone else's job.

use glam::Vec3;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// A ray with normalized direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// Closest-hit result of a BSP ray query.
///
/// `u`, `v`, `w` are barycentric weights of the hit triangle's second,
/// third and first vertex respectively (`w = 1 - u - v`).
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
    pub w: f32,
    pub static_obj_index: usize,
    pub triangle_index: usize,
}

/// Interface the baker consumes from the BSP tree.
///
/// Implementations must be callable from the bake worker pool.
pub trait BspQuery: Sync {
    /// The set of clusters of the map, ascending.
    fn clusters_set(&self) -> Vec<u32>;

    /// Bounding box of one cluster.
    fn cluster_aabb(&self, cluster: u32) -> Option<Aabb>;

    /// Cluster of the leaf containing `point`.
    fn cluster_with_point(&self, point: Vec3) -> Option<u32>;

    /// Whether `to` is visible from `from` (occlusion ray test).
    fn is_point_visible_from(&self, from: Vec3, to: Vec3) -> bool;

    /// Indices of static objects potentially visible from `point` (PVS).
    fn potentially_visible_objects(&self, point: Vec3) -> Vec<usize>;

    /// Closest intersection of `ray` with the static world.
    fn closest_ray_intersection(&self, ray: &Ray) -> Option<RayHit>;
}

/// One static triangle mesh of the world.
#[derive(Debug, Clone)]
pub struct StaticObject {
    pub vertices: Vec<Vec3>,
    /// One normal per vertex.
    pub normals: Vec<Vec3>,
    /// Triangle list, three indices per triangle.
    pub indices: Vec<u32>,
    /// Average surface reflectivity of the object's material.
    pub albedo: Vec3,
}

/// Reflectivity used when a material provides none.
pub const DEFAULT_ALBEDO: f32 = 0.5;

impl StaticObject {
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex positions of one triangle.
    #[must_use]
    pub fn triangle(&self, triangle_index: usize) -> [Vec3; 3] {
        let base = triangle_index * 3;
        [
            self.vertices[self.indices[base] as usize],
            self.vertices[self.indices[base + 1] as usize],
            self.vertices[self.indices[base + 2] as usize],
        ]
    }

    /// Vertex normals of one triangle.
    #[must_use]
    pub fn triangle_normals(&self, triangle_index: usize) -> [Vec3; 3] {
        let base = triangle_index * 3;
        [
            self.normals[self.indices[base] as usize],
            self.normals[self.indices[base + 1] as usize],
            self.normals[self.indices[base + 2] as usize],
        ]
    }

    /// Geometric (face) normal of one triangle.
    #[must_use]
    pub fn triangle_face_normal(&self, triangle_index: usize) -> Vec3 {
        let [v0, v1, v2] = self.triangle(triangle_index);
        (v1 - v0).cross(v2 - v0).normalize_or_zero()
    }

    /// Shading normal from barycentric interpolation.
    #[must_use]
    pub fn interpolated_normal(&self, hit: &RayHit) -> Vec3 {
        let [n0, n1, n2] = self.triangle_normals(hit.triangle_index);
        (n0 * hit.w + n1 * hit.u + n2 * hit.v).normalize_or_zero()
    }
}

/// A point light.
#[derive(Debug, Clone, Copy)]
pub struct PointLight {
    pub origin: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    /// Reference distance of the falloff window (contribution is 1 inside).
    pub radius: f32,
}

/// An emissive mesh with a precomputed triangle-area CDF.
#[derive(Debug, Clone)]
pub struct AreaLight {
    /// Index of the emitting mesh in the scene's static objects.
    pub object_index: usize,
    pub radiance: Vec3,
    /// Total surface area.
    pub area: f32,
    /// Normalized cumulative triangle areas, one entry per triangle.
    pub triangle_cdf: Vec<f32>,
}

impl AreaLight {
    /// Builds the light for `object`, precomputing area and CDF.
    #[must_use]
    pub fn new(object_index: usize, object: &StaticObject, radiance: Vec3) -> Self {
        let mut cumulative = Vec::with_capacity(object.triangle_count());
        let mut total = 0.0f32;
        for triangle_index in 0..object.triangle_count() {
            let [v0, v1, v2] = object.triangle(triangle_index);
            total += 0.5 * (v1 - v0).cross(v2 - v0).length();
            cumulative.push(total);
        }
        if total > 0.0 {
            for value in &mut cumulative {
                *value /= total;
            }
        }
        Self {
            object_index,
            radiance,
            area: total,
            triangle_cdf: cumulative,
        }
    }

    /// Maps a uniform random value to a triangle index via the CDF.
    #[must_use]
    pub fn pick_triangle(&self, random: f32) -> usize {
        let index = self.triangle_cdf.partition_point(|&cum| cum < random);
        index.min(self.triangle_cdf.len().saturating_sub(1))
    }
}

/// Static scene inputs of one bake.
#[derive(Debug, Default, Clone)]
pub struct BakeScene {
    pub static_objects: Vec<StaticObject>,
    pub point_lights: Vec<PointLight>,
    pub area_lights: Vec<AreaLight>,
}
