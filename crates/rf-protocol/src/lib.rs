//! 433MHz Frame Protocol Library
//!
//! This crate provides the shared vocabulary for 433MHz device drivers:
//!
//! - **BitFrame**: an ordered sequence of demodulated bit values, as emitted
//!   by the radio abstraction and accepted for transmission
//! - **PayloadParser**: the decoding strategy a driver injects to turn a
//!   frame into a structured record
//! - **DeviceData**: a decoded record that carries a device identity
//! - **RadioChannel**: the contract of the shared radio channel handle,
//!   one per protocol signature
//! - **Stamp**: the arrival stamp the radio puts on every received frame
//!
//! # Architecture
//!
//! Parsers return loosely typed JSON values. A frame only becomes a device
//! event once the value has been validated into `DeviceData`, which requires
//! an object with a truthy `id` field. Anything else means "not my protocol"
//! and is dropped silently by the signal manager.
//!
//! # Example
//!
//! ```rust
//! use rf_protocol::{decode, BitFrame, FieldLayoutParser, FieldSpec, IdentityField};
//!
//! let layout = FieldLayoutParser::new(vec![
//!     FieldSpec::new("address", 4),
//!     FieldSpec::new("state", 1),
//! ]);
//! let parser = IdentityField::new(layout, "address");
//!
//! let frame: BitFrame = "10110".parse().unwrap();
//! let data = decode(&parser, &frame).unwrap();
//! assert_eq!(data.id(), "1011");
//! ```

pub mod channel;
pub mod error;
pub mod frame;
pub mod parser;
pub mod record;
pub mod stamp;

pub use channel::RadioChannel;
pub use error::{ParseError, RadioError};
pub use frame::BitFrame;
pub use parser::{decode, BitStringParser, FieldLayoutParser, FieldSpec, IdentityField, PayloadParser};
pub use record::DeviceData;
pub use stamp::{ReceivedFrame, Stamp};
