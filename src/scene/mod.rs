//! Scene geometry and acoustic environment.
//!
//! A [`SceneData`] is an indexed triangle soup with a surface table: every
//! triangle references a vertex triple and one entry in the surface table.
//! The same scene is handed to both simulation stages of a render, so the
//! surface indices recorded in reflection paths always resolve against the
//! table stored here.
//!
//! # Overview
//!
//! 1. **Surface** - Per-band absorption and scattering of a wall
//! 2. **SceneData** - Triangles, vertices and surfaces, with bounds queries
//! 3. **Environment** - Global propagation constants (speed of sound,
//!    acoustic impedance)

pub mod material;

pub use material::{SIMULATION_BANDS, Surface};

use crate::error::{AuralizeError, Result};
use crate::math::Vec3;

/// One triangle of scene geometry.
///
/// `v0`..`v2` index into the scene's vertex list, `surface` into its
/// surface table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    pub surface: u32,
    pub v0: u32,
    pub v1: u32,
    pub v2: u32,
}

impl Triangle {
    pub fn new(surface: u32, v0: u32, v1: u32, v2: u32) -> Self {
        Self { surface, v0, v1, v2 }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    min: Vec3,
    max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box enclosing all `points`. Collapses to a point at the
    /// origin when `points` is empty.
    pub fn enclosing(points: &[Vec3]) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for point in points {
            min = min.min(*point);
            max = max.max(*point);
        }
        if points.is_empty() {
            Self {
                min: Vec3::ZERO,
                max: Vec3::ZERO,
            }
        } else {
            Self { min, max }
        }
    }

    pub fn min(&self) -> Vec3 {
        self.min
    }

    pub fn max(&self) -> Vec3 {
        self.max
    }

    pub fn centre(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn dimensions(&self) -> Vec3 {
        self.max - self.min
    }

    /// Inclusive containment test.
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// Triangle geometry plus the surface table it indexes.
#[derive(Debug, Clone)]
pub struct SceneData {
    triangles: Vec<Triangle>,
    vertices: Vec<Vec3>,
    surfaces: Vec<Surface>,
}

impl SceneData {
    /// Builds a scene from raw geometry.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when any list is empty, a triangle
    /// references an out-of-range vertex or surface, or a surface carries
    /// band values outside [0.0, 1.0].
    pub fn new(
        triangles: Vec<Triangle>,
        vertices: Vec<Vec3>,
        surfaces: Vec<Surface>,
    ) -> Result<Self> {
        if triangles.is_empty() {
            return Err(AuralizeError::Configuration(
                "Scene must contain at least one triangle".to_string(),
            ));
        }
        if vertices.is_empty() {
            return Err(AuralizeError::Configuration(
                "Scene must contain at least one vertex".to_string(),
            ));
        }
        if surfaces.is_empty() {
            return Err(AuralizeError::Configuration(
                "Scene must contain at least one surface".to_string(),
            ));
        }

        for (index, surface) in surfaces.iter().enumerate() {
            surface.validate().map_err(|e| {
                AuralizeError::Configuration(format!("Surface {}: {}", index, e))
            })?;
        }

        let vertex_count = vertices.len() as u32;
        let surface_count = surfaces.len() as u32;
        for (index, triangle) in triangles.iter().enumerate() {
            if triangle.v0 >= vertex_count
                || triangle.v1 >= vertex_count
                || triangle.v2 >= vertex_count
            {
                return Err(AuralizeError::Configuration(format!(
                    "Triangle {} references a vertex outside the vertex list",
                    index
                )));
            }
            if triangle.surface >= surface_count {
                return Err(AuralizeError::Configuration(format!(
                    "Triangle {} references surface {} but only {} surfaces exist",
                    index, triangle.surface, surface_count
                )));
            }
        }

        Ok(Self {
            triangles,
            vertices,
            surfaces,
        })
    }

    /// Builds an axis-aligned box room spanning the origin to `dimensions`,
    /// with every wall using the same surface.
    pub fn shoebox(dimensions: Vec3, surface: Surface) -> Result<Self> {
        if dimensions.cmple(Vec3::ZERO).any() {
            return Err(AuralizeError::Configuration(
                "Shoebox dimensions must be positive".to_string(),
            ));
        }

        let vertices = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 != 0 { dimensions.x } else { 0.0 },
                    if i & 2 != 0 { dimensions.y } else { 0.0 },
                    if i & 4 != 0 { dimensions.z } else { 0.0 },
                )
            })
            .collect();

        // Two triangles per face, outward winding.
        let quads: [[u32; 4]; 6] = [
            [0, 1, 3, 2], // z = 0
            [4, 6, 7, 5], // z = depth
            [0, 2, 6, 4], // x = 0
            [1, 5, 7, 3], // x = width
            [0, 4, 5, 1], // y = 0
            [2, 3, 7, 6], // y = height
        ];
        let triangles = quads
            .iter()
            .flat_map(|&[a, b, c, d]| {
                [Triangle::new(0, a, b, c), Triangle::new(0, a, c, d)]
            })
            .collect();

        Self::new(triangles, vertices, vec![surface])
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    /// Bounding box of all vertices.
    pub fn aabb(&self) -> Aabb {
        Aabb::enclosing(&self.vertices)
    }
}

/// Global propagation constants shared by both simulation stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    /// Speed of sound in metres per second
    pub speed_of_sound: f32,
    /// Specific acoustic impedance of air in rayls
    pub acoustic_impedance: f32,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            speed_of_sound: 340.0,
            acoustic_impedance: 400.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shoebox_geometry() {
        let scene = SceneData::shoebox(Vec3::new(5.0, 3.0, 4.0), Surface::GENERIC)
            .expect("valid shoebox");
        assert_eq!(scene.triangles().len(), 12);
        assert_eq!(scene.vertices().len(), 8);
        assert_eq!(scene.surfaces().len(), 1);

        let aabb = scene.aabb();
        assert_eq!(aabb.min(), Vec3::ZERO);
        assert_eq!(aabb.max(), Vec3::new(5.0, 3.0, 4.0));
        assert_eq!(aabb.centre(), Vec3::new(2.5, 1.5, 2.0));
    }

    #[test]
    fn test_aabb_contains() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::splat(2.0));
        assert!(aabb.contains(Vec3::splat(1.0)));
        assert!(aabb.contains(Vec3::ZERO));
        assert!(aabb.contains(Vec3::splat(2.0)));
        assert!(!aabb.contains(Vec3::new(1.0, 2.1, 1.0)));
        assert!(!aabb.contains(Vec3::new(-0.1, 1.0, 1.0)));
    }

    #[test]
    fn test_scene_rejects_bad_indices() {
        let vertices = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let surfaces = vec![Surface::GENERIC];

        let bad_vertex = SceneData::new(
            vec![Triangle::new(0, 0, 1, 3)],
            vertices.clone(),
            surfaces.clone(),
        );
        assert!(bad_vertex.is_err());

        let bad_surface =
            SceneData::new(vec![Triangle::new(1, 0, 1, 2)], vertices, surfaces);
        assert!(bad_surface.is_err());
    }

    #[test]
    fn test_scene_rejects_empty_lists() {
        assert!(SceneData::new(vec![], vec![Vec3::ZERO], vec![Surface::GENERIC]).is_err());
        assert!(SceneData::shoebox(Vec3::new(0.0, 1.0, 1.0), Surface::GENERIC).is_err());
    }
}
