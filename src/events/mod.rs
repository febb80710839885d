//! Event delivery primitives.
//!
//! The render engine runs on a background thread but must never call host
//! code from it. Two pieces make that work:
//!
//! 1. [`Event`] - a multicast callback list with RAII [`Connection`] handles
//! 2. [`WorkQueue`] - a FIFO of deferred closures drained by one consumer
//!    thread
//!
//! The engine wraps every notification in a closure that performs the
//! actual [`Event::emit`], pushes it onto its work queue, and leaves it
//! there until the host calls
//! [`RenderEngine::drain_events`](crate::engine::RenderEngine::drain_events).
//! Callbacks therefore always run on the draining thread, in the order the
//! engine produced them.

pub mod event;
pub mod work_queue;

pub use event::{Connection, Event};
pub use work_queue::{WorkQueue, WorkQueueHandle};
