//! 433MHz Radio Simulation Library
//!
//! This crate provides a simulation layer for exercising the signal manager
//! without a physical transceiver. It includes:
//!
//! - **VirtualRadioChannel**: a channel handle for one signature that
//!   records hardware calls and lets tests inject received frames
//! - **VirtualRadio**: a set of virtual channels keyed by signature, usable
//!   as the channel factory of a signal registry
//!
//! # Example
//!
//! ```rust
//! use rf_sim::VirtualRadio;
//!
//! let radio = VirtualRadio::new();
//! let channel = radio.channel("eurodomest");
//!
//! // Nobody is listening yet
//! assert_eq!(channel.emit_bits("1011").unwrap(), 0);
//! assert_eq!(channel.register_calls(), 0);
//! ```

pub mod channel;
pub mod radio;

pub use channel::{TxReport, VirtualChannelConfig, VirtualRadioChannel};
pub use radio::VirtualRadio;
