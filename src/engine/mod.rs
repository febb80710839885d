//! Render orchestration.
//!
//! [`RenderEngine`] owns a background render thread that walks every
//! source/receiver pair of a job through the two simulation stages, caches
//! the raw stage output per pair, then postprocesses all pairs together and
//! writes one file per capsule. Everything observable about a run arrives
//! through events: the engine never calls host code from the render thread,
//! it queues emission closures that run inside
//! [`RenderEngine::drain_events`].

mod pair;
mod render;

pub use render::RenderEngine;

use crate::compute::{MeshDescriptor, RaytraceResults, Reflection, WaveguideResults};
use crate::events::{Event, WorkQueueHandle};
use crate::math::Vec3;
use std::fmt;

/// Phase of the engine's state machine, as reported through progress
/// events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Raytracing,
    Waveguiding,
    Postprocessing,
    Finished,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Idle => "idle",
            State::Raytracing => "raytracing",
            State::Waveguiding => "waveguiding",
            State::Postprocessing => "postprocessing",
            State::Finished => "finished",
        };
        write!(f, "{}", name)
    }
}

/// One progress report.
///
/// `run` counts source/receiver pairs from zero; `progress` is the
/// completed fraction of the current phase in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub run: usize,
    pub total_runs: usize,
    pub state: State,
    pub progress: f64,
}

/// Payload of the waveguide pressure visualization event.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePressures {
    /// Pressure per mesh node, in [`MeshDescriptor::node_positions`] order
    pub pressures: Vec<f32>,
    /// Distance the wavefront has travelled so far, in metres
    pub distance: f64,
}

/// Payload of the raytracer visualization event.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionsGenerated {
    /// Sample of traced ray histories
    pub reflections: Vec<Vec<Reflection>>,
    /// Source position the rays were fired from
    pub source: Vec3,
}

/// Raw stage output for one source/receiver pair, cached until
/// postprocessing consumes it.
#[derive(Debug, Clone)]
pub struct Intermediate {
    pub source_index: usize,
    pub receiver_index: usize,
    pub raytracer: RaytraceResults,
    pub waveguide: WaveguideResults,
}

/// Render-thread side of the event system: wraps every notification in a
/// closure and queues it for the draining thread.
#[derive(Clone)]
pub(crate) struct EventSink {
    pub(crate) queue: WorkQueueHandle,
    pub(crate) begun: Event<()>,
    pub(crate) engine_state_changed: Event<Progress>,
    pub(crate) waveguide_node_positions_changed: Event<MeshDescriptor>,
    pub(crate) waveguide_node_pressures_changed: Event<NodePressures>,
    pub(crate) raytracer_reflections_generated: Event<ReflectionsGenerated>,
    pub(crate) encountered_error: Event<String>,
    pub(crate) finished: Event<()>,
}

impl EventSink {
    pub(crate) fn new(queue: WorkQueueHandle) -> Self {
        Self {
            queue,
            begun: Event::new(),
            engine_state_changed: Event::new(),
            waveguide_node_positions_changed: Event::new(),
            waveguide_node_pressures_changed: Event::new(),
            raytracer_reflections_generated: Event::new(),
            encountered_error: Event::new(),
            finished: Event::new(),
        }
    }

    pub(crate) fn emit_begun(&self) {
        let event = self.begun.clone();
        self.queue.push(move || event.emit(&()));
    }

    pub(crate) fn emit_state(&self, progress: Progress) {
        let event = self.engine_state_changed.clone();
        self.queue.push(move || event.emit(&progress));
    }

    pub(crate) fn emit_node_positions(&self, descriptor: MeshDescriptor) {
        let event = self.waveguide_node_positions_changed.clone();
        self.queue.push(move || event.emit(&descriptor));
    }

    pub(crate) fn emit_node_pressures(&self, pressures: NodePressures) {
        let event = self.waveguide_node_pressures_changed.clone();
        self.queue.push(move || event.emit(&pressures));
    }

    pub(crate) fn emit_reflections(&self, reflections: ReflectionsGenerated) {
        let event = self.raytracer_reflections_generated.clone();
        self.queue.push(move || event.emit(&reflections));
    }

    pub(crate) fn emit_error(&self, message: String) {
        let event = self.encountered_error.clone();
        self.queue.push(move || event.emit(&message));
    }

    pub(crate) fn emit_finished(&self) {
        let event = self.finished.clone();
        self.queue.push(move || event.emit(&()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(State::Idle.to_string(), "idle");
        assert_eq!(State::Raytracing.to_string(), "raytracing");
        assert_eq!(State::Waveguiding.to_string(), "waveguiding");
        assert_eq!(State::Postprocessing.to_string(), "postprocessing");
        assert_eq!(State::Finished.to_string(), "finished");
    }
}
