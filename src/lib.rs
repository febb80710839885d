pub mod compute;
pub mod engine;
pub mod error;
pub mod events;
pub mod image_source;
pub mod job;
pub mod math;
pub mod output;
pub mod postprocess;
pub mod scene;

pub use compute::ComputeBackend;
pub use compute::synthetic::SyntheticBackend;
pub use engine::{Progress, RenderEngine, State};
pub use error::{AuralizeError, Result};
pub use events::{Connection, Event};
pub use job::{Capsule, JobDescriptor, Receiver, Source};
pub use output::OutputConfig;
pub use scene::{Environment, SceneData, Surface};
