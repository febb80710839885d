//! End-to-end render of a shoebox room.
//!
//! Builds a small plastered room with one source and one binaural
//! receiver, renders it with the synthetic backend and writes the impulse
//! responses to a temp directory.
//!
//! Run with `cargo run --example render_demo`.

use auralize::job::{HrtfChannel, RaytracerParams, WaveguideParams};
use auralize::math::{Orientation, Vec3};
use auralize::{
    Capsule, Environment, JobDescriptor, OutputConfig, Receiver, RenderEngine, SceneData, Source,
    Surface, SyntheticBackend,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    // A 5 x 3 x 4 m plastered room.
    let scene = SceneData::shoebox(Vec3::new(5.0, 3.0, 4.0), Surface::PLASTER)?;

    let source = Source::new("organ", Vec3::new(1.0, 1.6, 1.0));
    let position = Vec3::new(3.8, 1.6, 3.0);
    let receiver = Receiver::new(
        "listener",
        position,
        Orientation::towards(position, source.position),
        vec![
            Capsule::microphone("cardioid", Orientation::default(), 0.5),
            Capsule::hrtf("ear_l", Orientation::default(), HrtfChannel::Left),
            Capsule::hrtf("ear_r", Orientation::default(), HrtfChannel::Right),
        ],
    );

    let job = JobDescriptor {
        scene,
        environment: Environment::default(),
        sources: vec![source],
        receivers: vec![receiver],
        // Reduced ray count keeps the demo quick.
        raytracer: RaytracerParams {
            rays: 10_000,
            maximum_image_source_order: 3,
        },
        waveguide: WaveguideParams::default(),
    };

    let mut output = OutputConfig::new(std::env::temp_dir().join("auralize_demo"));
    output.generate_unique_id();
    output.trim.trim_tail = true;
    let directory = output.directory.clone();

    let mut engine = RenderEngine::new();

    let _begun = engine.connect_begun(|_| println!("render started"));
    let _state = engine.connect_engine_state_changed({
        let mut last_state = None;
        move |progress| {
            if last_state != Some(progress.state) {
                last_state = Some(progress.state);
                println!(
                    "run {}/{}: {}",
                    progress.run + 1,
                    progress.total_runs,
                    progress.state
                );
            }
        }
    });
    let _reflections = engine.connect_raytracer_reflections_generated(|generated| {
        println!("traced {} visual ray paths", generated.reflections.len());
    });
    let _error = engine.connect_encountered_error(|message| {
        eprintln!("render failed: {}", message);
    });

    let finished = Arc::new(AtomicBool::new(false));
    let _finished = engine.connect_finished({
        let finished = Arc::clone(&finished);
        move |_| finished.store(true, Ordering::Relaxed)
    });

    engine.start_render(job, output, Arc::new(SyntheticBackend::new()))?;

    while !finished.load(Ordering::Relaxed) {
        engine.drain_events();
        std::thread::sleep(Duration::from_millis(20));
    }
    engine.drain_events();

    println!("wrote impulse responses to {}", directory.display());
    Ok(())
}
