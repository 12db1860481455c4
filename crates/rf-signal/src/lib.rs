//! 433MHz Signal Manager
//!
//! This crate multiplexes shared radio channels across the drivers of
//! RF-controlled consumer devices (remotes, sockets, ...). Each protocol
//! signature maps to one hardware channel; any number of logical
//! subscribers share it, each decoding frames with its own parser.
//!
//! # Architecture
//!
//! - [`SignalRegistry`] owns one shared channel per signature. It reference
//!   counts bindings so the hardware is registered once while any
//!   subscriber is bound, and unregistered when the last one leaves.
//! - [`Signal`] is a subscriber. It receives every frame of its signature,
//!   debounces repeats, parses, and publishes [`SignalEvent`]s on its own
//!   event channel. It also transmits frames on the shared channel.
//!
//! Registration and transmission wait on the hardware; everything else is
//! synchronous from the caller's point of view. Frame processing runs on
//! one task per signal, fed in arrival order by one task per signature.
//!
//! # Events
//!
//! | Event | When |
//! |-------|------|
//! | `payload` | every frame that is not manually debounced |
//! | `data` | a frame this signal's parser decoded into device data |
//! | `payload_send` | any signal of the signature transmitted a frame |
//! | `error` | register, unregister or send failed for this signal |

pub mod config;
pub mod debounce;
pub mod error;
pub mod events;
pub mod registry;
pub mod signal;

pub use config::{RegistryConfig, SignalConfig};
pub use debounce::{DebounceFilter, DebounceScope, ManualDebounce};
pub use error::SignalError;
pub use events::SignalEvent;
pub use registry::{SignalRegistry, SubscriberId};
pub use signal::Signal;
