//! Single-consumer task queue for cross-thread event delivery.

use crossbeam_channel::{Receiver, Sender, unbounded};

type Task = Box<dyn FnOnce() + Send>;

/// FIFO queue of deferred closures, drained by one consumer thread.
///
/// Producers push closures through a [`WorkQueueHandle`]; the owner calls
/// [`WorkQueue::drain`] to run everything queued so far on its own thread.
/// The render engine uses this to move event emission off the render thread
/// and onto whichever thread the host drains from.
///
/// Dropping the queue discards pending tasks without running them, and any
/// handle pushes after that are silently ignored.
pub struct WorkQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
}

impl WorkQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Returns a cloneable producer handle.
    pub fn handle(&self) -> WorkQueueHandle {
        WorkQueueHandle {
            sender: self.sender.clone(),
        }
    }

    /// Runs every task queued so far on the calling thread, in push order,
    /// and returns how many ran. Never blocks.
    pub fn drain(&self) -> usize {
        let mut count = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            count += 1;
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of a [`WorkQueue`].
#[derive(Clone)]
pub struct WorkQueueHandle {
    sender: Sender<Task>,
}

impl WorkQueueHandle {
    /// Queues `task` to run on the next [`WorkQueue::drain`].
    ///
    /// If the queue has been dropped the task is discarded.
    pub fn push<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let _ = self.sender.send(Box::new(task));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_drain_runs_tasks_in_push_order() {
        let queue = WorkQueue::new();
        let handle = queue.handle();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let seen_clone = seen.clone();
            handle.push(move || seen_clone.lock().unwrap().push(i));
        }

        assert_eq!(queue.drain(), 100);
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_fifo_across_threads() {
        let queue = WorkQueue::new();
        let handle = queue.handle();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_producer = seen.clone();
        let producer = std::thread::spawn(move || {
            for i in 0..1000 {
                let seen_clone = seen_producer.clone();
                handle.push(move || seen_clone.lock().unwrap().push(i));
            }
        });
        producer.join().unwrap();

        queue.drain();
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn test_drain_on_empty_queue_returns_zero() {
        let queue = WorkQueue::new();
        assert_eq!(queue.drain(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dropping_queue_discards_tasks() {
        let queue = WorkQueue::new();
        let handle = queue.handle();
        let ran = Arc::new(AtomicBool::new(false));

        let ran_clone = ran.clone();
        handle.push(move || ran_clone.store(true, Ordering::SeqCst));
        drop(queue);

        assert!(!ran.load(Ordering::SeqCst));

        // Pushing into a dropped queue is a silent no-op.
        handle.push(|| {});
    }
}
