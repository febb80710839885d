//! Render job description.
//!
//! A [`JobDescriptor`] bundles everything one render needs: the scene, the
//! environment, the sources and receivers to simulate, and the parameters of
//! the two simulation stages. It is built once, validated synchronously by
//! [`RenderEngine::start_render`](crate::engine::RenderEngine::start_render),
//! and then owned by the render thread until the run ends.

use crate::error::{AuralizeError, Result};
use crate::math::{Orientation, Vec3};
use crate::scene::{Environment, SIMULATION_BANDS, SceneData};
use std::collections::HashSet;

/// A point source to simulate.
#[derive(Debug, Clone)]
pub struct Source {
    /// Name used in output file paths; must be unique among sources
    pub name: String,
    pub position: Vec3,
}

impl Source {
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// Which ear of the listener model a capsule renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HrtfChannel {
    Left,
    Right,
}

/// How a capsule converts arriving sound into one output channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapsuleKind {
    /// Polar-pattern microphone.
    ///
    /// `shape` blends the pattern: 0.0 is omnidirectional, 0.5 cardioid,
    /// 1.0 bidirectional.
    Microphone { orientation: Orientation, shape: f32 },
    /// One ear of the parametric head model.
    Hrtf {
        orientation: Orientation,
        channel: HrtfChannel,
    },
}

/// One output channel at a receiver.
///
/// The capsule's orientation is local to its receiver.
#[derive(Debug, Clone)]
pub struct Capsule {
    /// Name used in output file paths; must be unique within the receiver
    pub name: String,
    pub kind: CapsuleKind,
}

impl Capsule {
    pub fn microphone(name: impl Into<String>, orientation: Orientation, shape: f32) -> Self {
        Self {
            name: name.into(),
            kind: CapsuleKind::Microphone { orientation, shape },
        }
    }

    pub fn hrtf(name: impl Into<String>, orientation: Orientation, channel: HrtfChannel) -> Self {
        Self {
            name: name.into(),
            kind: CapsuleKind::Hrtf {
                orientation,
                channel,
            },
        }
    }
}

/// A listening position with one or more capsules.
#[derive(Debug, Clone)]
pub struct Receiver {
    /// Name used in output file paths; must be unique among receivers
    pub name: String,
    pub position: Vec3,
    pub orientation: Orientation,
    pub capsules: Vec<Capsule>,
}

impl Receiver {
    pub fn new(
        name: impl Into<String>,
        position: Vec3,
        orientation: Orientation,
        capsules: Vec<Capsule>,
    ) -> Self {
        Self {
            name: name.into(),
            position,
            orientation,
            capsules,
        }
    }
}

/// Parameters of the image-source stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaytracerParams {
    /// Number of rays to fire from the source
    pub rays: usize,
    /// Deepest reflection order considered for image-source contributions
    pub maximum_image_source_order: usize,
}

impl Default for RaytracerParams {
    fn default() -> Self {
        Self {
            rays: 100_000,
            maximum_image_source_order: 4,
        }
    }
}

/// Parameters of the waveguide stage.
///
/// The mesh update rate is dispersion-limited: only the bottom quarter of
/// its Nyquist range is physically trustworthy, and `usable_portion` is the
/// fraction of that quarter the caller is willing to use. The update rate
/// therefore comes out as `cutoff_hz / (0.25 * usable_portion)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaveguideParams {
    /// Model a single band up to `cutoff_hz` on one mesh.
    SingleBand { cutoff_hz: f64, usable_portion: f64 },
    /// Model `bands` octave bands up to `cutoff_hz`, each on its own mesh.
    MultipleBand {
        bands: usize,
        cutoff_hz: f64,
        usable_portion: f64,
    },
}

impl WaveguideParams {
    pub fn cutoff_hz(&self) -> f64 {
        match self {
            Self::SingleBand { cutoff_hz, .. } | Self::MultipleBand { cutoff_hz, .. } => {
                *cutoff_hz
            }
        }
    }

    pub fn usable_portion(&self) -> f64 {
        match self {
            Self::SingleBand { usable_portion, .. }
            | Self::MultipleBand { usable_portion, .. } => *usable_portion,
        }
    }

    /// Mesh update rate in Hz required to keep `cutoff_hz` inside the
    /// usable portion of the mesh's valid range.
    pub fn sampling_frequency(&self) -> f64 {
        self.cutoff_hz() / (0.25 * self.usable_portion())
    }
}

impl Default for WaveguideParams {
    fn default() -> Self {
        Self::SingleBand {
            cutoff_hz: 500.0,
            usable_portion: 0.6,
        }
    }
}

/// Complete description of one render.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    pub scene: SceneData,
    pub environment: Environment,
    pub sources: Vec<Source>,
    pub receivers: Vec<Receiver>,
    pub raytracer: RaytracerParams,
    pub waveguide: WaveguideParams,
}

impl JobDescriptor {
    /// Number of source/receiver pairs this job simulates.
    pub fn total_runs(&self) -> usize {
        self.sources.len() * self.receivers.len()
    }

    /// Checks the job is renderable.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the job has no sources, no
    /// receivers, a receiver without capsules, out-of-range stage
    /// parameters, a source or receiver outside the scene bounds, or
    /// colliding names.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(AuralizeError::Configuration(
                "Job must contain at least one source".to_string(),
            ));
        }
        if self.receivers.is_empty() {
            return Err(AuralizeError::Configuration(
                "Job must contain at least one receiver".to_string(),
            ));
        }

        if self.raytracer.rays == 0 {
            return Err(AuralizeError::Configuration(
                "Ray count must be greater than 0".to_string(),
            ));
        }

        let usable = self.waveguide.usable_portion();
        if !(usable > 0.0 && usable <= 1.0) {
            return Err(AuralizeError::Configuration(format!(
                "Waveguide usable portion must be in (0, 1], got {}",
                usable
            )));
        }
        if !(self.waveguide.cutoff_hz() > 0.0) {
            return Err(AuralizeError::Configuration(format!(
                "Waveguide cutoff must be greater than 0 Hz, got {}",
                self.waveguide.cutoff_hz()
            )));
        }
        if let WaveguideParams::MultipleBand { bands, .. } = self.waveguide {
            if bands == 0 || bands > SIMULATION_BANDS {
                return Err(AuralizeError::Configuration(format!(
                    "Waveguide band count must be in 1..={}, got {}",
                    SIMULATION_BANDS, bands
                )));
            }
        }

        let aabb = self.scene.aabb();
        let mut source_names = HashSet::new();
        for source in &self.sources {
            if source.name.is_empty() {
                return Err(AuralizeError::Configuration(
                    "Source names must not be empty".to_string(),
                ));
            }
            if !source_names.insert(source.name.as_str()) {
                return Err(AuralizeError::Configuration(format!(
                    "Duplicate source name: {}",
                    source.name
                )));
            }
            if !aabb.contains(source.position) {
                return Err(AuralizeError::Configuration(format!(
                    "Source {} lies outside the scene bounds",
                    source.name
                )));
            }
        }

        let mut receiver_names = HashSet::new();
        for receiver in &self.receivers {
            if receiver.name.is_empty() {
                return Err(AuralizeError::Configuration(
                    "Receiver names must not be empty".to_string(),
                ));
            }
            if !receiver_names.insert(receiver.name.as_str()) {
                return Err(AuralizeError::Configuration(format!(
                    "Duplicate receiver name: {}",
                    receiver.name
                )));
            }
            if !aabb.contains(receiver.position) {
                return Err(AuralizeError::Configuration(format!(
                    "Receiver {} lies outside the scene bounds",
                    receiver.name
                )));
            }
            if receiver.capsules.is_empty() {
                return Err(AuralizeError::Configuration(format!(
                    "Receiver {} must have at least one capsule",
                    receiver.name
                )));
            }

            let mut capsule_names = HashSet::new();
            for capsule in &receiver.capsules {
                if capsule.name.is_empty() {
                    return Err(AuralizeError::Configuration(format!(
                        "Receiver {} has a capsule with an empty name",
                        receiver.name
                    )));
                }
                if !capsule_names.insert(capsule.name.as_str()) {
                    return Err(AuralizeError::Configuration(format!(
                        "Receiver {} has duplicate capsule name: {}",
                        receiver.name, capsule.name
                    )));
                }
                if let CapsuleKind::Microphone { shape, .. } = capsule.kind {
                    if !(0.0..=1.0).contains(&shape) {
                        return Err(AuralizeError::Configuration(format!(
                            "Capsule {} shape must be in [0, 1], got {}",
                            capsule.name, shape
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
