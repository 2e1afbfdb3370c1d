//! Generic fire-and-forget event emitter (spec.md §4.F, §9): handlers for the
//! same event run in registration order, a throwing handler is logged and
//! skipped without blocking its siblings, and `off` snapshots a local copy of
//! the listener list before invoking so removing a handler mid-emission is
//! sound.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

/// Opaque handle returned by [`EventEmitter::on`], used to unsubscribe later.
pub type HandlerId = u64;

type Handler = Arc<dyn Fn(Value) + Send + Sync>;

/// A named event bus. One instance is shared per workspace (local events) and
/// one globally (channel bridging).
#[derive(Default)]
pub struct EventEmitter {
    listeners: Mutex<HashMap<String, Vec<(HandlerId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event`, returning an id usable with [`Self::off`].
    pub fn on(&self, event: &str, handler: impl Fn(Value) + Send + Sync + 'static) -> HandlerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .unwrap()
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Removes a previously registered handler. Unknown ids are a no-op.
    pub fn off(&self, event: &str, id: HandlerId) {
        if let Some(handlers) = self.listeners.lock().unwrap().get_mut(event) {
            handlers.retain(|(hid, _)| *hid != id);
        }
    }

    /// Invokes every handler registered for `event` with a copy of `payload`,
    /// in registration order. A handler that panics is caught and logged;
    /// later handlers still run.
    pub fn emit(&self, event: &str, payload: Value) {
        let handlers = {
            let guard = self.listeners.lock().unwrap();
            guard.get(event).cloned().unwrap_or_default()
        };
        for (_, handler) in handlers {
            let payload = payload.clone();
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(payload)));
            if outcome.is_err() {
                tracing::warn!(event, "workspace event handler panicked, skipping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// **Scenario**: two handlers on the same event run in registration order.
    #[test]
    fn handlers_run_in_registration_order() {
        let emitter = EventEmitter::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        emitter.on("e", move |_| o1.lock().unwrap().push(1));
        let o2 = order.clone();
        emitter.on("e", move |_| o2.lock().unwrap().push(2));
        emitter.emit("e", Value::Null);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    /// **Scenario**: a panicking handler does not stop later handlers from running.
    #[test]
    fn panicking_handler_is_skipped_not_fatal() {
        let emitter = EventEmitter::new();
        let ran = Arc::new(AtomicUsize::new(0));
        emitter.on("e", |_| panic!("boom"));
        let r = ran.clone();
        emitter.on("e", move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });
        emitter.emit("e", Value::Null);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    /// **Scenario**: `off` with an unknown id is a no-op, and a removed handler doesn't fire again.
    #[test]
    fn off_removes_handler_and_is_idempotent_for_unknown_ids() {
        let emitter = EventEmitter::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let id = emitter.on("e", move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });
        emitter.off("e", id);
        emitter.off("e", 9999);
        emitter.emit("e", Value::Null);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
