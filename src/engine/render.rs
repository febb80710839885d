//! The public render engine.

use super::pair::PairContext;
use super::{EventSink, NodePressures, Progress, ReflectionsGenerated, State};
use crate::compute::{ComputeBackend, MeshDescriptor};
use crate::error::{AuralizeError, Result};
use crate::events::{Connection, WorkQueue};
use crate::job::JobDescriptor;
use crate::output::OutputConfig;
use crate::postprocess::{self, ChannelData, writer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Renders jobs on a background thread and reports through events.
///
/// One engine handles one run at a time; starting a new run cancels the
/// previous one. Event callbacks never run on the render thread: they are
/// queued and executed inside [`drain_events`](Self::drain_events), so a
/// host can keep all listener code on its own thread.
///
/// Dropping the engine cancels and joins any in-flight run.
pub struct RenderEngine {
    queue: WorkQueue,
    sink: EventSink,
    keep_going: Arc<AtomicBool>,
    is_running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl RenderEngine {
    pub fn new() -> Self {
        let queue = WorkQueue::new();
        let sink = EventSink::new(queue.handle());
        Self {
            queue,
            sink,
            keep_going: Arc::new(AtomicBool::new(false)),
            is_running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Starts rendering `job` on a background thread.
    ///
    /// The job and output configuration are validated synchronously:
    /// nothing is emitted and no thread is spawned when validation fails.
    /// A run already in flight is cancelled and joined first; its queued
    /// events stay in the queue for the next drain.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid job or output
    /// configuration, or an IO error when the render thread cannot be
    /// spawned.
    pub fn start_render(
        &mut self,
        job: JobDescriptor,
        output: OutputConfig,
        backend: Arc<dyn ComputeBackend>,
    ) -> Result<()> {
        job.validate()?;
        output.validate()?;
        self.join_worker();

        self.keep_going.store(true, Ordering::Relaxed);
        self.is_running.store(true, Ordering::Relaxed);

        let sink = self.sink.clone();
        let keep_going = Arc::clone(&self.keep_going);
        let is_running = Arc::clone(&self.is_running);
        let spawned = std::thread::Builder::new()
            .name("auralize-render".to_string())
            .spawn(move || run_render(job, output, backend, sink, keep_going, is_running));
        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(error) => {
                self.keep_going.store(false, Ordering::Relaxed);
                self.is_running.store(false, Ordering::Relaxed);
                Err(error.into())
            }
        }
    }

    /// Requests cancellation of the in-flight run without blocking.
    ///
    /// The render thread notices at its next poll point, winds down and
    /// queues its finished event as usual. Cancellation is not an error,
    /// so no error event fires.
    pub fn cancel(&self) {
        self.keep_going.store(false, Ordering::Relaxed);
    }

    /// Cancels the in-flight run and waits for the render thread to exit.
    pub fn stop(&mut self) {
        self.join_worker();
    }

    /// True from the moment a run is accepted until just before its
    /// finished event is queued.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Runs every queued event callback on the calling thread and returns
    /// how many ran. Never blocks.
    pub fn drain_events(&self) -> usize {
        self.queue.drain()
    }

    /// A run was accepted and is about to start.
    pub fn connect_begun<F>(&self, callback: F) -> Connection
    where
        F: FnMut(&()) + Send + 'static,
    {
        self.sink.begun.connect(callback)
    }

    /// Progress through the state machine, many times per run.
    pub fn connect_engine_state_changed<F>(&self, callback: F) -> Connection
    where
        F: FnMut(&Progress) + Send + 'static,
    {
        self.sink.engine_state_changed.connect(callback)
    }

    /// Waveguide mesh layout, once per pair, before pressures flow.
    pub fn connect_waveguide_node_positions_changed<F>(&self, callback: F) -> Connection
    where
        F: FnMut(&MeshDescriptor) + Send + 'static,
    {
        self.sink.waveguide_node_positions_changed.connect(callback)
    }

    /// Mesh pressure snapshots while the waveguide runs. Only produced
    /// while at least one listener is connected.
    pub fn connect_waveguide_node_pressures_changed<F>(&self, callback: F) -> Connection
    where
        F: FnMut(&NodePressures) + Send + 'static,
    {
        self.sink.waveguide_node_pressures_changed.connect(callback)
    }

    /// Sample of traced ray histories, once per pair. Only produced while
    /// at least one listener is connected.
    pub fn connect_raytracer_reflections_generated<F>(&self, callback: F) -> Connection
    where
        F: FnMut(&ReflectionsGenerated) + Send + 'static,
    {
        self.sink.raytracer_reflections_generated.connect(callback)
    }

    /// The run failed. Fires at most once per run, before finished.
    pub fn connect_encountered_error<F>(&self, callback: F) -> Connection
    where
        F: FnMut(&String) + Send + 'static,
    {
        self.sink.encountered_error.connect(callback)
    }

    /// The render thread is done, whether the run succeeded, failed or
    /// was cancelled. Fires exactly once per run.
    pub fn connect_finished<F>(&self, callback: F) -> Connection
    where
        F: FnMut(&()) + Send + 'static,
    {
        self.sink.finished.connect(callback)
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.keep_going.store(false, Ordering::Relaxed);
            if worker.join().is_err() {
                log::error!("Render thread panicked");
            }
        }
    }
}

impl Default for RenderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RenderEngine {
    fn drop(&mut self) {
        self.join_worker();
    }
}

/// Render thread entry point: brackets the run with begun/finished and
/// converts failures into error events.
fn run_render(
    job: JobDescriptor,
    output: OutputConfig,
    backend: Arc<dyn ComputeBackend>,
    sink: EventSink,
    keep_going: Arc<AtomicBool>,
    is_running: Arc<AtomicBool>,
) {
    sink.emit_begun();
    log::info!(
        "Render started: {} source(s), {} receiver(s), {} rays",
        job.sources.len(),
        job.receivers.len(),
        job.raytracer.rays
    );

    let outcome = execute_render(&job, &output, backend.as_ref(), &sink, &keep_going);
    match &outcome {
        Ok(()) => log::info!("Render complete"),
        Err(AuralizeError::Cancelled) => log::info!("Render cancelled"),
        Err(error) => {
            log::error!("Render failed: {}", error);
            sink.emit_error(error.to_string());
        }
    }

    is_running.store(false, Ordering::Relaxed);
    sink.emit_finished();
}

fn execute_render(
    job: &JobDescriptor,
    output: &OutputConfig,
    backend: &dyn ComputeBackend,
    sink: &EventSink,
    keep_going: &AtomicBool,
) -> Result<()> {
    let total_runs = job.total_runs();

    // Simulate every pair before postprocessing any of them: the final
    // normalization needs the peak across the whole render.
    let mut intermediates = Vec::with_capacity(total_runs);
    for (source_index, source) in job.sources.iter().enumerate() {
        for (receiver_index, receiver) in job.receivers.iter().enumerate() {
            let run = source_index * job.receivers.len() + receiver_index;
            log::info!(
                "Run {}/{}: source '{}' to receiver '{}'",
                run + 1,
                total_runs,
                source.name,
                receiver.name
            );
            let pair = PairContext {
                job,
                backend,
                events: sink,
                keep_going,
                run,
                total_runs,
                source_index,
                receiver_index,
            };
            intermediates.push(pair.simulate()?);
        }
    }

    let total_channels = job.sources.len()
        * job
            .receivers
            .iter()
            .map(|receiver| receiver.capsules.len())
            .sum::<usize>();
    let mut channels = Vec::with_capacity(total_channels);
    for intermediate in &intermediates {
        let source = &job.sources[intermediate.source_index];
        let receiver = &job.receivers[intermediate.receiver_index];
        let run = intermediate.source_index * job.receivers.len() + intermediate.receiver_index;
        for capsule in &receiver.capsules {
            if !keep_going.load(Ordering::Relaxed) {
                return Err(AuralizeError::Cancelled);
            }
            let samples = postprocess::render_channel(
                &intermediate.raytracer,
                &intermediate.waveguide,
                receiver.position,
                &receiver.orientation,
                capsule,
                job.environment,
                output.sample_rate,
            )?;
            channels.push(ChannelData {
                source_name: source.name.clone(),
                receiver_name: receiver.name.clone(),
                capsule_name: capsule.name.clone(),
                samples,
            });
            sink.emit_state(Progress {
                run,
                total_runs,
                state: State::Postprocessing,
                progress: channels.len() as f64 / total_channels.max(1) as f64,
            });
        }
    }

    let factor = postprocess::normalize(&mut channels);
    log::debug!("Normalized {} channel(s) by {}", channels.len(), factor);
    postprocess::trim(&mut channels, &output.trim);

    for channel in &channels {
        if !keep_going.load(Ordering::Relaxed) {
            return Err(AuralizeError::Cancelled);
        }
        let path = writer::write_channel(output, channel)?;
        log::info!("Wrote {}", path.display());
    }

    sink.emit_state(Progress {
        run: total_runs.saturating_sub(1),
        total_runs,
        state: State::Finished,
        progress: 1.0,
    });
    Ok(())
}
