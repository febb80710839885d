//! Drives the two simulation stages for one source/receiver pair.

use super::{EventSink, Intermediate, NodePressures, Progress, ReflectionsGenerated, State};
use crate::compute::{ComputeBackend, RaytraceResults, Reflection, WaveguideResults};
use crate::error::{AuralizeError, Result};
use crate::image_source::{ImageSourceTree, PathElement};
use crate::job::JobDescriptor;
use std::sync::atomic::{AtomicBool, Ordering};

/// Upper bound on pressure visualization events per waveguide stage.
const PRESSURE_EVENTS_PER_STAGE: usize = 60;

/// Borrowed context for simulating one source/receiver pair.
pub(crate) struct PairContext<'a> {
    pub job: &'a JobDescriptor,
    pub backend: &'a dyn ComputeBackend,
    pub events: &'a EventSink,
    pub keep_going: &'a AtomicBool,
    pub run: usize,
    pub total_runs: usize,
    pub source_index: usize,
    pub receiver_index: usize,
}

impl PairContext<'_> {
    /// Runs the raytracer then the waveguide and returns the pair's raw
    /// results for later postprocessing.
    pub fn simulate(&self) -> Result<Intermediate> {
        let raytracer = self.run_raytracer()?;
        self.check_cancelled()?;
        let waveguide = self.run_waveguide(&raytracer)?;
        Ok(Intermediate {
            source_index: self.source_index,
            receiver_index: self.receiver_index,
            raytracer,
            waveguide,
        })
    }

    fn run_raytracer(&self) -> Result<RaytraceResults> {
        let source = &self.job.sources[self.source_index];
        let receiver = &self.job.receivers[self.receiver_index];

        self.report(State::Raytracing, 0.0);
        let mut stage = self.backend.start_raytrace(
            &self.job.scene,
            self.job.environment,
            source.position,
            receiver.position,
            &self.job.raytracer,
        )?;

        let batches = stage.batch_count();
        let depth = self.job.raytracer.maximum_image_source_order;
        let mut tree = ImageSourceTree::new();
        for batch in 0..batches {
            self.check_cancelled()?;
            let histories = stage.trace_batch(batch)?;
            for history in &histories {
                let truncated = history.len().min(depth);
                if truncated == 0 {
                    continue;
                }
                let elements: Vec<PathElement> = history[..truncated]
                    .iter()
                    .map(Reflection::path_element)
                    .collect();
                tree.push(&elements);
            }
            self.report(State::Raytracing, (batch + 1) as f64 / batches.max(1) as f64);
        }

        let distinct_paths = tree.distinct_paths();
        log::debug!(
            "Run {}: image-source tree has {} nodes, {} distinct paths",
            self.run,
            tree.node_count(),
            distinct_paths.len()
        );
        let results = stage.finish(&distinct_paths)?;

        if !self.events.raytracer_reflections_generated.is_empty() {
            self.events.emit_reflections(ReflectionsGenerated {
                reflections: results.visual.clone(),
                source: source.position,
            });
        }
        Ok(results)
    }

    fn run_waveguide(&self, raytracer: &RaytraceResults) -> Result<WaveguideResults> {
        let source = &self.job.sources[self.source_index];
        let receiver = &self.job.receivers[self.receiver_index];
        let environment = self.job.environment;

        // Simulate for as long as the slowest raytracer arrival is in
        // flight, so both stages cover the same span of the response.
        let direct_distance = source.position.distance(receiver.position);
        let simulation_time =
            f64::from(raytracer.max_distance().max(direct_distance) / environment.speed_of_sound);

        self.report(State::Waveguiding, 0.0);
        let mut mesh = self.backend.start_waveguide(
            &self.job.scene,
            environment,
            source.position,
            receiver.position,
            &self.job.waveguide,
            simulation_time,
        )?;

        if !self.events.waveguide_node_positions_changed.is_empty() {
            self.events.emit_node_positions(mesh.descriptor());
        }

        let steps = mesh.step_count();
        let stride = (steps / PRESSURE_EVENTS_PER_STAGE).max(1);
        let mesh_rate = self.job.waveguide.sampling_frequency();
        for step in 0..steps {
            self.check_cancelled()?;
            mesh.step()?;

            let last = step + 1 == steps;
            if (step % stride == 0 || last)
                && !self.events.waveguide_node_pressures_changed.is_empty()
            {
                let distance =
                    f64::from(environment.speed_of_sound) * (step + 1) as f64 / mesh_rate;
                self.events.emit_node_pressures(NodePressures {
                    pressures: mesh.node_pressures(),
                    distance,
                });
            }
            self.report(State::Waveguiding, (step + 1) as f64 / steps.max(1) as f64);
        }

        mesh.finish()
    }

    fn report(&self, state: State, progress: f64) {
        self.events.emit_state(Progress {
            run: self.run,
            total_runs: self.total_runs,
            state,
            progress,
        });
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.keep_going.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(AuralizeError::Cancelled)
        }
    }
}
