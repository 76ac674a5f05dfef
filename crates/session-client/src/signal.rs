//! Session invalidation signal
//!
//! Emitted once per failed renewal, after the credential store has been
//! cleared. The application shell subscribes and sends the user back to a
//! login surface; this crate never does anything beyond notifying.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

/// Payload delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInvalidated {
    /// Why the session could not be renewed
    pub reason: String,
}

type Handler = Arc<dyn Fn(&SessionInvalidated) + Send + Sync>;

/// Fan-out of invalidation events to registered handlers.
#[derive(Default)]
pub struct InvalidationSignal {
    handlers: Mutex<Vec<Handler>>,
}

impl InvalidationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Handlers run synchronously on the task that
    /// observed the failure, so they should hand off anything slow.
    pub fn subscribe(&self, handler: impl Fn(&SessionInvalidated) + Send + Sync + 'static) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(handler));
    }

    /// Deliver `event` to every handler registered so far.
    pub fn emit(&self, event: SessionInvalidated) {
        // Snapshot so a handler can subscribe without deadlocking
        let handlers: Vec<Handler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        info!(
            reason = %event.reason,
            handlers = handlers.len(),
            "session invalidated"
        );
        for handler in handlers {
            handler(&event);
        }
    }
}

impl fmt::Debug for InvalidationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("InvalidationSignal")
            .field("handlers", &count)
            .finish()
    }
}
