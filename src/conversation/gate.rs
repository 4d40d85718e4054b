//! Availability gate — process-wide switch for accepting conversations.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shared on/off flag, flipped by the admin commands.
///
/// Read on every inbound event, written rarely; last write wins.
#[derive(Debug)]
pub struct AvailabilityGate {
    enabled: AtomicBool,
}

impl AvailabilityGate {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl Default for AvailabilityGate {
    fn default() -> Self {
        Self::new(true)
    }
}
