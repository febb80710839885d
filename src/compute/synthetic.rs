//! Deterministic stand-in for a real numerical backend.
//!
//! The synthetic backend produces physically shaped but cheaply computed
//! data: image-source impulses follow inverse-distance spreading with
//! per-band surface absorption, and the waveguide tail is low-passed noise
//! under a Sabine decay envelope. Everything is seeded from the pair's
//! source and receiver positions, so identical inputs give identical
//! outputs. Useful wherever real numerics would be overkill: engine tests,
//! demos, and host integration work.

use super::{
    ComputeBackend, Impulse, MeshDescriptor, RaytraceResults, RaytraceStage, Reflection,
    WaveguideResults, WaveguideStage,
};
use crate::error::Result;
use crate::image_source::PathElement;
use crate::job::{RaytracerParams, WaveguideParams};
use crate::math::Vec3;
use crate::scene::{Aabb, Environment, SIMULATION_BANDS, SceneData, Surface};

const RAYS_PER_BATCH: usize = 8192;
const VISUAL_PATHS: usize = 64;
const MAX_MESH_NODES: usize = 32_768;

/// Splitmix-style generator, small enough to avoid an RNG dependency.
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0x9e3779b97f4a7c15,
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let x = self.state;
        (x ^ (x >> 31)).wrapping_mul(0xd6e8feb86659fd93)
    }

    /// Uniform in [0, 1).
    fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    fn next_index(&mut self, bound: u32) -> u32 {
        (self.next_u64() % bound.max(1) as u64) as u32
    }

    fn point_in(&mut self, aabb: &Aabb) -> Vec3 {
        let extent = aabb.dimensions();
        aabb.min()
            + Vec3::new(
                self.next_f32() * extent.x,
                self.next_f32() * extent.y,
                self.next_f32() * extent.z,
            )
    }

    fn unit_vector(&mut self) -> Vec3 {
        let y = 2.0 * self.next_f32() - 1.0;
        let phi = std::f32::consts::TAU * self.next_f32();
        let r = (1.0 - y * y).max(0.0).sqrt();
        Vec3::new(r * phi.cos(), y, r * phi.sin())
    }
}

fn pair_seed(source: Vec3, receiver: Vec3) -> u64 {
    let mut seed = 0xcbf29ce484222325_u64;
    for value in [
        source.x, source.y, source.z, receiver.x, receiver.y, receiver.z,
    ] {
        seed ^= value.to_bits() as u64;
        seed = seed.wrapping_mul(0x100000001b3);
    }
    seed
}

fn path_seed(path: &[PathElement]) -> u64 {
    let mut seed = 0xcbf29ce484222325_u64;
    for element in path {
        seed ^= element.index as u64;
        seed = seed.wrapping_mul(0x100000001b3);
    }
    seed
}

/// Deterministic [`ComputeBackend`] producing plausible data without real
/// numerics.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticBackend;

impl SyntheticBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ComputeBackend for SyntheticBackend {
    fn start_raytrace(
        &self,
        scene: &SceneData,
        _environment: Environment,
        source: Vec3,
        receiver: Vec3,
        params: &RaytracerParams,
    ) -> Result<Box<dyn RaytraceStage>> {
        Ok(Box::new(SyntheticRaytrace::new(
            scene, source, receiver, params,
        )))
    }

    fn start_waveguide(
        &self,
        scene: &SceneData,
        environment: Environment,
        source: Vec3,
        receiver: Vec3,
        params: &WaveguideParams,
        simulation_time: f64,
    ) -> Result<Box<dyn WaveguideStage>> {
        Ok(Box::new(SyntheticWaveguide::new(
            scene,
            environment,
            source,
            receiver,
            params,
            simulation_time,
        )))
    }
}

struct SyntheticRaytrace {
    surfaces: Vec<Surface>,
    aabb: Aabb,
    source: Vec3,
    receiver: Vec3,
    rays: usize,
    max_depth: usize,
    /// Typical bounce-to-bounce distance, half the room diagonal
    mean_hop: f32,
    rng: Lcg,
    visual: Vec<Vec<Reflection>>,
}

impl SyntheticRaytrace {
    fn new(scene: &SceneData, source: Vec3, receiver: Vec3, params: &RaytracerParams) -> Self {
        let aabb = scene.aabb();
        Self {
            surfaces: scene.surfaces().to_vec(),
            aabb,
            source,
            receiver,
            rays: params.rays,
            max_depth: params.maximum_image_source_order.max(1) + 2,
            mean_hop: (aabb.dimensions().length() * 0.5).max(0.1),
            rng: Lcg::new(pair_seed(source, receiver)),
            visual: Vec::new(),
        }
    }
}

impl RaytraceStage for SyntheticRaytrace {
    fn batch_count(&self) -> usize {
        self.rays.div_ceil(RAYS_PER_BATCH)
    }

    fn trace_batch(&mut self, batch: usize) -> Result<Vec<Vec<Reflection>>> {
        let start = batch * RAYS_PER_BATCH;
        let count = self.rays.saturating_sub(start).min(RAYS_PER_BATCH);
        let surface_count = self.surfaces.len() as u32;

        let mut histories = Vec::with_capacity(count);
        for _ in 0..count {
            let bounces = 1 + self.rng.next_index(self.max_depth as u32) as usize;
            let mut history = Vec::with_capacity(bounces);
            for bounce in 0..bounces {
                history.push(Reflection {
                    surface: self.rng.next_index(surface_count),
                    position: self.rng.point_in(&self.aabb),
                    keep_going: bounce + 1 < bounces,
                    receiver_visible: self.rng.next_f32() < 0.25,
                });
            }
            if self.visual.len() < VISUAL_PATHS {
                self.visual.push(history.clone());
            }
            histories.push(history);
        }
        Ok(histories)
    }

    fn finish(self: Box<Self>, distinct_paths: &[Vec<PathElement>]) -> Result<RaytraceResults> {
        let this = *self;
        let direct_distance = this.source.distance(this.receiver).max(1e-3);

        let mut impulses = Vec::with_capacity(distinct_paths.len() + 1);

        // Direct sound, unobstructed by any surface.
        impulses.push(Impulse {
            volume: [1.0 / direct_distance; SIMULATION_BANDS],
            position: this.source,
            distance: direct_distance,
        });

        for path in distinct_paths {
            let distance = direct_distance + path.len() as f32 * this.mean_hop;
            let mut volume = [1.0 / distance; SIMULATION_BANDS];
            for element in path {
                let surface = &this.surfaces[element.index as usize];
                for (band, value) in volume.iter_mut().enumerate() {
                    *value *= 1.0 - surface.absorption[band];
                }
            }

            let direction = Lcg::new(path_seed(path)).unit_vector();
            impulses.push(Impulse {
                volume,
                position: this.receiver + direction * distance,
                distance,
            });
        }

        Ok(RaytraceResults {
            impulses,
            visual: this.visual,
        })
    }
}

struct SyntheticWaveguide {
    node_positions: Vec<Vec3>,
    /// Distance from each node to the source, for the wavefront shell
    node_distances: Vec<f32>,
    spacing: f32,
    sample_rate: f64,
    steps: usize,
    current_step: usize,
    speed_of_sound: f32,
    direct_distance: f32,
    /// Exponential decay constant from Sabine's reverberation formula
    decay_per_second: f64,
    lowpass_alpha: f32,
    lowpass_state: f32,
    rng: Lcg,
    band: Vec<f32>,
}

impl SyntheticWaveguide {
    fn new(
        scene: &SceneData,
        environment: Environment,
        source: Vec3,
        receiver: Vec3,
        params: &WaveguideParams,
        simulation_time: f64,
    ) -> Self {
        let aabb = scene.aabb();
        let sample_rate = params.sampling_frequency();

        // Rectilinear mesh spacing from the CFL condition, widened until
        // the node count stays manageable for visualization.
        let mut spacing =
            environment.speed_of_sound * 3.0_f32.sqrt() / sample_rate as f32;
        let extent = aabb.dimensions();
        let node_count = |spacing: f32| {
            let counts = (extent / spacing).floor() + Vec3::ONE;
            counts.x as usize * counts.y as usize * counts.z as usize
        };
        while node_count(spacing) > MAX_MESH_NODES {
            spacing *= 2.0;
        }

        let mut node_positions = Vec::with_capacity(node_count(spacing));
        let mut z = aabb.min().z;
        while z <= aabb.max().z {
            let mut y = aabb.min().y;
            while y <= aabb.max().y {
                let mut x = aabb.min().x;
                while x <= aabb.max().x {
                    node_positions.push(Vec3::new(x, y, z));
                    x += spacing;
                }
                y += spacing;
            }
            z += spacing;
        }
        let node_distances = node_positions
            .iter()
            .map(|position| position.distance(source))
            .collect();

        let steps = ((simulation_time * sample_rate).ceil() as usize).max(1);
        let t60 = sabine_t60(scene);
        let cutoff_hz = params.cutoff_hz();
        let lowpass_alpha =
            (1.0 - (-std::f64::consts::TAU * cutoff_hz / sample_rate).exp()) as f32;

        Self {
            node_positions,
            node_distances,
            spacing,
            sample_rate,
            steps,
            current_step: 0,
            speed_of_sound: environment.speed_of_sound,
            direct_distance: source.distance(receiver).max(1e-3),
            decay_per_second: 6.91 / t60,
            lowpass_alpha: lowpass_alpha.clamp(0.0, 1.0),
            lowpass_state: 0.0,
            rng: Lcg::new(pair_seed(source, receiver).rotate_left(17)),
            band: Vec::with_capacity(steps),
        }
    }
}

impl WaveguideStage for SyntheticWaveguide {
    fn descriptor(&self) -> MeshDescriptor {
        MeshDescriptor {
            node_positions: self.node_positions.clone(),
            spacing: self.spacing,
            sample_rate: self.sample_rate,
        }
    }

    fn step_count(&self) -> usize {
        self.steps
    }

    fn step(&mut self) -> Result<()> {
        let time = self.current_step as f64 / self.sample_rate;
        let onset = self.direct_distance as f64 / self.speed_of_sound as f64;

        let noise = 2.0 * self.rng.next_f32() - 1.0;
        self.lowpass_state += self.lowpass_alpha * (noise - self.lowpass_state);

        let mut value = 0.0;
        if time >= onset {
            let envelope = (-(time - onset) * self.decay_per_second).exp() as f32;
            value = envelope * self.lowpass_state * 0.5 / self.direct_distance;

            let onset_step = (onset * self.sample_rate) as usize;
            if self.current_step == onset_step {
                value += 1.0 / self.direct_distance;
            }
        }

        self.band.push(value);
        self.current_step += 1;
        Ok(())
    }

    fn node_pressures(&self) -> Vec<f32> {
        // A Gaussian shell expanding from the source at the speed of sound.
        let radius = self.speed_of_sound * self.current_step as f32 / self.sample_rate as f32;
        let width = (2.0 * self.spacing).max(1e-3);
        self.node_distances
            .iter()
            .map(|&distance| {
                let offset = (distance - radius) / width;
                (-offset * offset).exp() / distance.max(self.spacing)
            })
            .collect()
    }

    fn finish(self: Box<Self>) -> Result<WaveguideResults> {
        Ok(WaveguideResults {
            band: self.band,
            sample_rate: self.sample_rate,
        })
    }
}

/// Sabine's reverberation time estimate for the whole scene.
fn sabine_t60(scene: &SceneData) -> f64 {
    let aabb = scene.aabb();
    let extent = aabb.dimensions();
    let volume = (extent.x * extent.y * extent.z).max(1e-3) as f64;

    let vertices = scene.vertices();
    let surfaces = scene.surfaces();
    let mut absorption_area = 0.0_f64;
    for triangle in scene.triangles() {
        let a = vertices[triangle.v0 as usize];
        let b = vertices[triangle.v1 as usize];
        let c = vertices[triangle.v2 as usize];
        let area = 0.5 * (b - a).cross(c - a).length() as f64;

        let surface = &surfaces[triangle.surface as usize];
        let mean_absorption = surface.absorption.iter().sum::<f32>() as f64
            / SIMULATION_BANDS as f64;
        absorption_area += area * mean_absorption;
    }

    (0.161 * volume / absorption_area.max(1e-6)).clamp(0.05, 20.0)
}
