//! Virtual radio channel
//!
//! Implements the radio channel handle contract in memory. Hardware calls
//! are counted so tests can check how often the signal manager reached the
//! radio, and failures or latency can be injected per channel.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rf_protocol::{BitFrame, ParseError, RadioChannel, RadioError, ReceivedFrame};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the received-frame broadcast
const PAYLOAD_CAPACITY: usize = 256;

/// Behaviour knobs for a virtual channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualChannelConfig {
    /// Time the hardware takes to answer `register`
    #[serde(default)]
    pub register_delay_ms: u64,
    /// Time the hardware takes to answer `unregister`
    #[serde(default)]
    pub unregister_delay_ms: u64,
    /// Time the hardware takes to answer `tx`
    #[serde(default)]
    pub tx_delay_ms: u64,
    /// When set, `register` fails with this reason
    #[serde(default)]
    pub register_failure: Option<String>,
    /// When set, `tx` fails with this reason
    #[serde(default)]
    pub tx_failure: Option<String>,
    /// Echo transmitted frames back as received frames
    #[serde(default)]
    pub loopback: bool,
}

/// Hardware result of a virtual transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReport {
    /// 1-based index of this transmission on the channel
    pub sequence: usize,
    /// Number of bits sent
    pub bits: usize,
}

struct ChannelInner {
    signature: String,
    payload_tx: broadcast::Sender<ReceivedFrame>,
    config: Mutex<VirtualChannelConfig>,
    register_calls: AtomicUsize,
    unregister_calls: AtomicUsize,
    tx_calls: AtomicUsize,
    listening: AtomicBool,
    transmitted: Mutex<Vec<BitFrame>>,
}

/// In-memory channel handle for one signature
///
/// Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct VirtualRadioChannel {
    inner: Arc<ChannelInner>,
}

impl std::fmt::Debug for VirtualRadioChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualRadioChannel")
            .field("signature", &self.inner.signature)
            .field("listening", &self.is_listening())
            .field("register_calls", &self.register_calls())
            .field("tx_calls", &self.tx_calls())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl VirtualRadioChannel {
    /// Create a channel with default behaviour
    pub fn new(signature: impl Into<String>) -> Self {
        Self::with_config(signature, VirtualChannelConfig::default())
    }

    /// Create a channel with the given behaviour
    pub fn with_config(signature: impl Into<String>, config: VirtualChannelConfig) -> Self {
        let (payload_tx, _) = broadcast::channel(PAYLOAD_CAPACITY);
        Self {
            inner: Arc::new(ChannelInner {
                signature: signature.into(),
                payload_tx,
                config: Mutex::new(config),
                register_calls: AtomicUsize::new(0),
                unregister_calls: AtomicUsize::new(0),
                tx_calls: AtomicUsize::new(0),
                listening: AtomicBool::new(false),
                transmitted: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Deliver a received frame to every payload subscriber
    ///
    /// The frame is stamped here, as a real receiver would on demodulation.
    /// Returns the number of subscribers that saw it.
    pub fn emit(&self, frame: BitFrame) -> usize {
        debug!(
            "Virtual channel {} received {}",
            self.inner.signature, frame
        );
        self.inner
            .payload_tx
            .send(ReceivedFrame::now(frame))
            .unwrap_or(0)
    }

    /// Parse a bit-string and deliver it
    pub fn emit_bits(&self, bits: &str) -> Result<usize, ParseError> {
        Ok(self.emit(bits.parse()?))
    }

    /// Current behaviour
    pub fn config(&self) -> VirtualChannelConfig {
        lock(&self.inner.config).clone()
    }

    /// Replace the behaviour
    pub fn set_config(&self, config: VirtualChannelConfig) {
        *lock(&self.inner.config) = config;
    }

    /// Make `register` fail with `reason`, or succeed again with `None`
    pub fn fail_register(&self, reason: Option<&str>) {
        lock(&self.inner.config).register_failure = reason.map(str::to_string);
    }

    /// Make `tx` fail with `reason`, or succeed again with `None`
    pub fn fail_tx(&self, reason: Option<&str>) {
        lock(&self.inner.config).tx_failure = reason.map(str::to_string);
    }

    /// Number of `register` calls received
    pub fn register_calls(&self) -> usize {
        self.inner.register_calls.load(Ordering::SeqCst)
    }

    /// Number of `unregister` calls received
    pub fn unregister_calls(&self) -> usize {
        self.inner.unregister_calls.load(Ordering::SeqCst)
    }

    /// Number of `tx` calls received
    pub fn tx_calls(&self) -> usize {
        self.inner.tx_calls.load(Ordering::SeqCst)
    }

    /// Whether the hardware is currently registered for this signature
    pub fn is_listening(&self) -> bool {
        self.inner.listening.load(Ordering::SeqCst)
    }

    /// Frames transmitted successfully, in order
    pub fn transmitted(&self) -> Vec<BitFrame> {
        lock(&self.inner.transmitted).clone()
    }
}

async fn hardware_delay(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

impl RadioChannel for VirtualRadioChannel {
    type Receipt = TxReport;

    fn signature(&self) -> &str {
        &self.inner.signature
    }

    fn payloads(&self) -> broadcast::Receiver<ReceivedFrame> {
        self.inner.payload_tx.subscribe()
    }

    fn register(&self) -> impl Future<Output = Result<(), RadioError>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            inner.register_calls.fetch_add(1, Ordering::SeqCst);
            let (delay, failure) = {
                let config = lock(&inner.config);
                (config.register_delay_ms, config.register_failure.clone())
            };
            hardware_delay(delay).await;

            if let Some(reason) = failure {
                debug!("Virtual channel {} refused register", inner.signature);
                return Err(RadioError::Rejected(reason));
            }
            inner.listening.store(true, Ordering::SeqCst);
            debug!("Virtual channel {} listening", inner.signature);
            Ok(())
        }
    }

    fn unregister(&self) -> impl Future<Output = Result<(), RadioError>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            inner.unregister_calls.fetch_add(1, Ordering::SeqCst);
            let delay = lock(&inner.config).unregister_delay_ms;
            hardware_delay(delay).await;

            inner.listening.store(false, Ordering::SeqCst);
            debug!("Virtual channel {} stopped listening", inner.signature);
            Ok(())
        }
    }

    fn tx(&self, buffer: Vec<u8>) -> impl Future<Output = Result<TxReport, RadioError>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            let sequence = inner.tx_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let (delay, failure, loopback) = {
                let config = lock(&inner.config);
                (config.tx_delay_ms, config.tx_failure.clone(), config.loopback)
            };
            hardware_delay(delay).await;

            if let Some(reason) = failure {
                return Err(RadioError::Rejected(reason));
            }

            let frame = BitFrame::new(buffer);
            let bits = frame.len();
            lock(&inner.transmitted).push(frame.clone());
            if loopback {
                let _ = inner.payload_tx.send(ReceivedFrame::now(frame));
            }
            Ok(TxReport { sequence, bits })
        }
    }
}
