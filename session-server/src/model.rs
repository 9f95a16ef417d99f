//! Service global state

use std::sync::Arc;

pub mod clock;
pub mod session;

use clock::{Clock, SystemClock};
use session::SessionStore;

/// State shared by all request handlers
///
/// Created once per process; cloning shares the same underlying store.
#[derive(Debug, Clone)]
pub struct Model {
    /// The single session slot
    sessions: Arc<SessionStore>,
}

impl Model {
    /// Model driven by the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Model driven by the given clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new(clock)),
        }
    }

    /// Model for testing purposes - returns the manual clock driving it
    #[cfg(test)]
    pub fn test() -> (Self, Arc<clock::ManualClock>) {
        let clock = Arc::new(clock::ManualClock::default());
        (Self::with_clock(clock.clone()), clock)
    }

    /// Access to the session store
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}
