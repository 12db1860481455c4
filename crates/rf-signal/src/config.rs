//! Signal and registry configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration of one signal subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Protocol signature of the shared channel
    pub signature: String,
    /// Debounce window in milliseconds (0 disables deduplication)
    #[serde(default)]
    pub debounce_ms: u64,
}

impl SignalConfig {
    /// Create a configuration
    pub fn new(signature: impl Into<String>, debounce_ms: u64) -> Self {
        Self {
            signature: signature.into(),
            debounce_ms,
        }
    }

    /// Debounce window as a duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Capacity of the per-signature frame bus
    pub bus_capacity: usize,
    /// Capacity of each subscriber's event channel
    pub event_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bus_capacity: 256,
            event_capacity: 256,
        }
    }
}
