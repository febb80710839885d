//! Callback registry with RAII connections.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Slot<T> = Box<dyn FnMut(&T) + Send>;

struct Registry<T> {
    slots: Vec<(u64, Slot<T>)>,
    next_id: u64,
}

impl<T> Registry<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_id: 0,
        }
    }
}

/// Type-erased removal hook so a [`Connection`] does not need the payload
/// type of the event it came from.
trait Disconnect: Send + Sync {
    fn remove(&self, id: u64);
}

impl<T: 'static> Disconnect for Mutex<Registry<T>> {
    fn remove(&self, id: u64) {
        let mut registry = recover(self.lock());
        registry.slots.retain(|(slot_id, _)| *slot_id != id);
    }
}

fn recover<T>(result: std::sync::LockResult<MutexGuard<'_, T>>) -> MutexGuard<'_, T> {
    // A panicking callback poisons the lock; the registry itself is still
    // consistent, so keep going.
    match result {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// A multicast callback list.
///
/// Callbacks registered through [`Event::connect`] are invoked in connection
/// order every time [`Event::emit`] runs. Cloning an `Event` shares the
/// underlying registry, so emitting through any clone reaches all callbacks.
///
/// The registry lock is held for the whole of `emit`: a callback that
/// connects to or disconnects from the same event it was called from will
/// deadlock. Disconnect from another thread instead, or after `emit`
/// returns.
pub struct Event<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T: 'static> Event<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::new())),
        }
    }

    /// Registers `callback` and returns the connection keeping it alive.
    ///
    /// Dropping the returned [`Connection`] unsubscribes the callback; call
    /// [`Connection::detach`] to keep it registered for the lifetime of the
    /// event instead.
    pub fn connect<F>(&self, callback: F) -> Connection
    where
        F: FnMut(&T) + Send + 'static,
    {
        let mut registry = recover(self.registry.lock());
        let id = registry.next_id;
        registry.next_id += 1;
        registry.slots.push((id, Box::new(callback)));
        Connection {
            registry: Arc::downgrade(&self.registry) as Weak<dyn Disconnect>,
            id,
            detached: false,
        }
    }

    /// Calls every registered callback with `payload`, in connection order.
    ///
    /// The registry lock is held across all callback invocations, so a
    /// disconnect racing an emit on another thread either completes before
    /// the emit (the callback is not called) or after it (the callback runs
    /// one last time); a callback is never torn down mid-call.
    pub fn emit(&self, payload: &T) {
        let mut registry = recover(self.registry.lock());
        for (_, slot) in registry.slots.iter_mut() {
            slot(payload);
        }
    }

    /// True when no callbacks are registered. Producers can use this to
    /// skip building expensive payloads nobody will see.
    pub fn is_empty(&self) -> bool {
        recover(self.registry.lock()).slots.is_empty()
    }

    pub fn len(&self) -> usize {
        recover(self.registry.lock()).slots.len()
    }
}

impl<T: 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

/// Handle owning one callback registration.
///
/// The callback stays registered for as long as the `Connection` lives.
/// Dropping it (or calling [`Connection::disconnect`]) removes the callback;
/// [`Connection::detach`] gives up the handle while leaving the callback
/// registered.
#[must_use = "dropping a Connection disconnects its callback immediately"]
pub struct Connection {
    registry: Weak<dyn Disconnect>,
    id: u64,
    detached: bool,
}

impl Connection {
    /// Removes the callback now. Equivalent to dropping the connection.
    pub fn disconnect(self) {}

    /// Consumes the handle, leaving the callback registered until the event
    /// itself is dropped.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if !self.detached {
            if let Some(registry) = self.registry.upgrade() {
                registry.remove(self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_reaches_callback() {
        let event = Event::<i32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _connection = event.connect(move |value| {
            seen_clone.lock().unwrap().push(*value);
        });

        event.emit(&1);
        event.emit(&2);
        event.emit(&3);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_callbacks_run_in_connection_order() {
        let event = Event::<()>::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_a = order.clone();
        let _a = event.connect(move |_| order_a.lock().unwrap().push("a"));
        let order_b = order.clone();
        let _b = event.connect(move |_| order_b.lock().unwrap().push("b"));

        event.emit(&());
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_dropping_connection_disconnects() {
        let event = Event::<()>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = calls.clone();
        let connection = event.connect(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        event.emit(&());
        drop(connection);
        event.emit(&());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(event.is_empty());
    }

    #[test]
    fn test_disconnect_is_eager() {
        let event = Event::<()>::new();
        let connection = event.connect(|_| {});
        assert_eq!(event.len(), 1);
        connection.disconnect();
        assert_eq!(event.len(), 0);
    }

    #[test]
    fn test_detach_keeps_callback_alive() {
        let event = Event::<()>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = calls.clone();
        let connection = event.connect(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        connection.detach();

        event.emit(&());
        event.emit(&());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_emit_with_no_listeners_is_noop() {
        let event = Event::<String>::new();
        event.emit(&"nobody home".to_string());
        assert!(event.is_empty());
    }

    #[test]
    fn test_connection_outliving_event_is_safe() {
        let event = Event::<()>::new();
        let connection = event.connect(|_| {});
        drop(event);
        drop(connection);
    }

    #[test]
    fn test_clone_shares_registry() {
        let event = Event::<i32>::new();
        let clone = event.clone();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = calls.clone();
        let _connection = event.connect(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        clone.emit(&7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_from_another_thread() {
        let event = Event::<usize>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = calls.clone();
        let _connection = event.connect(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let emitter = event.clone();
        let handle = std::thread::spawn(move || {
            for i in 0..100 {
                emitter.emit(&i);
            }
        });
        handle.join().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 100);
    }
}
