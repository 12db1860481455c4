//! Radio channel handle contract
//!
//! The radio abstraction provides one channel handle per protocol
//! signature. It demodulates incoming transmissions into bit frames and
//! transmits buffers on request. Everything below this trait (timing,
//! modulation, the transceiver itself) is outside this workspace.

use std::fmt;
use std::future::Future;

use tokio::sync::broadcast;

use crate::error::RadioError;
use crate::stamp::ReceivedFrame;

/// A shared hardware channel for one protocol signature
///
/// Implementations must answer every `register`, `unregister` and `tx`
/// call exactly once.
pub trait RadioChannel: Send + Sync + 'static {
    /// Hardware result of a successful transmission
    type Receipt: Clone + fmt::Debug + Send + Sync + 'static;

    /// Protocol signature this channel serves
    fn signature(&self) -> &str;

    /// Subscribe to raw frames received on this channel
    ///
    /// Frames must be stamped when they are demodulated, not when a
    /// subscriber reads them.
    fn payloads(&self) -> broadcast::Receiver<ReceivedFrame>;

    /// Ask the hardware to start listening for this signature
    fn register(&self) -> impl Future<Output = Result<(), RadioError>> + Send;

    /// Ask the hardware to stop listening for this signature
    fn unregister(&self) -> impl Future<Output = Result<(), RadioError>> + Send;

    /// Transmit a serialized frame
    fn tx(&self, buffer: Vec<u8>)
        -> impl Future<Output = Result<Self::Receipt, RadioError>> + Send;
}
