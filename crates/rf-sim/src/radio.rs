//! Virtual radio with one channel per signature

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::channel::{VirtualChannelConfig, VirtualRadioChannel};

/// A simulated transceiver handing out virtual channels by signature
///
/// `channel` and the closure returned by `factory` share the same channels,
/// so a test can configure or drive a channel the registry created.
#[derive(Debug, Clone, Default)]
pub struct VirtualRadio {
    channels: Arc<Mutex<HashMap<String, VirtualRadioChannel>>>,
    defaults: VirtualChannelConfig,
}

impl VirtualRadio {
    /// Create a radio whose channels use default behaviour
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a radio whose new channels start from `defaults`
    pub fn with_defaults(defaults: VirtualChannelConfig) -> Self {
        Self {
            channels: Arc::default(),
            defaults,
        }
    }

    /// Get the channel for `signature`, creating it on first use
    pub fn channel(&self, signature: &str) -> VirtualRadioChannel {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(signature.to_string())
            .or_insert_with(|| VirtualRadioChannel::with_config(signature, self.defaults.clone()))
            .clone()
    }

    /// Channel factory for a signal registry
    pub fn factory(&self) -> impl Fn(&str) -> VirtualRadioChannel + Send + Sync + 'static {
        let radio = self.clone();
        move |signature| radio.channel(signature)
    }

    /// Signatures that have a channel, sorted
    pub fn signatures(&self) -> Vec<String> {
        let channels = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut signatures: Vec<_> = channels.keys().cloned().collect();
        signatures.sort();
        signatures
    }
}
