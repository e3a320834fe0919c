//! Commit notification fan-out.

use super::ContextOrigin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Published after a commit that carried changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotice {
    /// Monotonic commit counter for this container.
    pub generation: u64,
    pub origin: ContextOrigin,
}

/// Listener callback. Returning `false` unsubscribes it.
pub type ChangeListener = Box<dyn Fn(&ChangeNotice) -> bool + Send>;

/// Container-wide list of change listeners.
#[derive(Default)]
pub struct ChangeFeed {
    generation: AtomicU64,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: ChangeListener) {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.push(listener);
    }

    /// Calls every listener on the committing thread before returning.
    pub fn publish(&self, origin: ContextOrigin) -> ChangeNotice {
        let notice = ChangeNotice {
            generation: self.generation.fetch_add(1, Ordering::AcqRel) + 1,
            origin,
        };
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.retain(|listener| listener(&notice));
        notice
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
