//! Numerical backend interface for the two simulation stages.
//!
//! The engine owns the simulation loops (batching, cancellation polling,
//! progress reporting) but delegates the numerics to a [`ComputeBackend`].
//! A backend hands out one stage object per simulation: the engine drives a
//! [`RaytraceStage`] batch by batch, merges the returned reflection
//! histories into an [`ImageSourceTree`](crate::image_source::ImageSourceTree),
//! and feeds the deduplicated paths back into [`RaytraceStage::finish`];
//! then it drives a [`WaveguideStage`] step by step and collects the
//! band-limited pressure signal from [`WaveguideStage::finish`].
//!
//! [`SyntheticBackend`](synthetic::SyntheticBackend) is a deterministic
//! stand-in for a real numerical backend, useful for tests and demos.

pub mod synthetic;

use crate::error::Result;
use crate::image_source::PathElement;
use crate::job::{RaytracerParams, WaveguideParams};
use crate::math::Vec3;
use crate::scene::{Environment, SIMULATION_BANDS, SceneData};

/// One bounce recorded by the raytracer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reflection {
    /// Index of the reflecting surface in the scene's surface table
    pub surface: u32,
    /// World-space position of the bounce
    pub position: Vec3,
    /// False when the ray terminated at this bounce
    pub keep_going: bool,
    /// True when the receiver is directly visible from the bounce point
    pub receiver_visible: bool,
}

impl Reflection {
    /// Projects this bounce onto the information the path tree keys on.
    pub fn path_element(&self) -> PathElement {
        PathElement::new(self.surface, self.keep_going)
    }
}

/// One arriving contribution computed from an image-source path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impulse {
    /// Per-band pressure of the arrival
    pub volume: [f32; SIMULATION_BANDS],
    /// World-space position the arrival appears to come from
    pub position: Vec3,
    /// Total path length in metres, which fixes the arrival time
    pub distance: f32,
}

/// Static description of a waveguide mesh, emitted once per run so
/// visualization listeners can allocate before pressures start flowing.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshDescriptor {
    pub node_positions: Vec<Vec3>,
    /// Distance between neighbouring nodes in metres
    pub spacing: f32,
    /// Mesh update rate in Hz
    pub sample_rate: f64,
}

/// Everything the raytracer stage produces.
#[derive(Debug, Clone)]
pub struct RaytraceResults {
    pub impulses: Vec<Impulse>,
    /// Sample of traced ray histories kept for visualization
    pub visual: Vec<Vec<Reflection>>,
}

impl RaytraceResults {
    /// Longest arrival distance, used to size the waveguide simulation.
    pub fn max_distance(&self) -> f32 {
        self.impulses
            .iter()
            .map(|impulse| impulse.distance)
            .fold(0.0, f32::max)
    }
}

/// Everything the waveguide stage produces.
#[derive(Debug, Clone)]
pub struct WaveguideResults {
    /// Band-limited pressure signal at the receiver, at the mesh update rate
    pub band: Vec<f32>,
    /// Mesh update rate in Hz
    pub sample_rate: f64,
}

/// An in-flight image-source simulation.
///
/// The engine calls [`trace_batch`](Self::trace_batch) once for every index
/// in `0..batch_count()`, in order, polling for cancellation in between,
/// then consumes the stage with [`finish`](Self::finish).
pub trait RaytraceStage: Send {
    /// Number of ray batches this stage will trace. Stable for the
    /// lifetime of the stage.
    fn batch_count(&self) -> usize;

    /// Traces batch `batch` and returns one reflection history per ray.
    fn trace_batch(&mut self, batch: usize) -> Result<Vec<Vec<Reflection>>>;

    /// Converts the deduplicated mirror sequences into arriving impulses.
    fn finish(self: Box<Self>, distinct_paths: &[Vec<PathElement>]) -> Result<RaytraceResults>;
}

/// An in-flight waveguide simulation.
///
/// The engine calls [`step`](Self::step) once for every index in
/// `0..step_count()`, polling for cancellation in between. Node pressures
/// are only requested when a visualization listener is connected, so
/// implementations should not materialize them eagerly.
pub trait WaveguideStage: Send {
    /// Mesh layout for visualization listeners.
    fn descriptor(&self) -> MeshDescriptor;

    /// Number of mesh updates this stage will run. Stable for the lifetime
    /// of the stage.
    fn step_count(&self) -> usize;

    /// Advances the mesh by one update.
    fn step(&mut self) -> Result<()>;

    /// Pressure at every mesh node after the most recent step, in
    /// [`MeshDescriptor::node_positions`] order.
    fn node_pressures(&self) -> Vec<f32>;

    /// Returns the receiver's pressure signal.
    fn finish(self: Box<Self>) -> Result<WaveguideResults>;
}

/// Factory for the two simulation stages of a source/receiver pair.
///
/// Implementations must be `Send + Sync`; the engine invokes them from its
/// render thread.
pub trait ComputeBackend: Send + Sync {
    fn start_raytrace(
        &self,
        scene: &SceneData,
        environment: Environment,
        source: Vec3,
        receiver: Vec3,
        params: &RaytracerParams,
    ) -> Result<Box<dyn RaytraceStage>>;

    fn start_waveguide(
        &self,
        scene: &SceneData,
        environment: Environment,
        source: Vec3,
        receiver: Vec3,
        params: &WaveguideParams,
        simulation_time: f64,
    ) -> Result<Box<dyn WaveguideStage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflection_to_path_element() {
        let reflection = Reflection {
            surface: 3,
            position: Vec3::ZERO,
            keep_going: false,
            receiver_visible: true,
        };
        let element = reflection.path_element();
        assert_eq!(element.index, 3);
        assert!(!element.keep_going);
    }

    #[test]
    fn test_max_distance_of_empty_results_is_zero() {
        let results = RaytraceResults {
            impulses: vec![],
            visual: vec![],
        };
        assert_eq!(results.max_distance(), 0.0);
    }

    #[test]
    fn test_max_distance_picks_largest() {
        let impulse = |distance| Impulse {
            volume: [0.0; SIMULATION_BANDS],
            position: Vec3::ZERO,
            distance,
        };
        let results = RaytraceResults {
            impulses: vec![impulse(3.0), impulse(11.5), impulse(7.0)],
            visual: vec![],
        };
        assert_eq!(results.max_distance(), 11.5);
    }
}
