//! Signal multiplexer
//!
//! A `Signal` is one logical subscriber on a shared radio channel. Many
//! signals (one per driver or device protocol dialect) can share the same
//! signature; each applies its own parser and debounce window to the same
//! stream of frames.
//!
//! # Frame pipeline
//!
//! Every frame received on the shared channel is handled by every signal of
//! that signature, in arrival order:
//!
//! 1. If a manual debounce (this signal's, or the shared one) was armed
//!    before the frame arrived and is still open, the frame is logged and
//!    dropped. Frames already in flight when it is armed are not affected.
//! 2. A `Payload` event is emitted with a copy of the frame.
//! 3. With a non-zero debounce window, a repeat of a recently seen
//!    bit-string stops here.
//! 4. The parser runs. Results that do not validate as device data are
//!    dropped silently.
//! 5. A `Data` event is emitted.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use rf_protocol::{FieldLayoutParser, FieldSpec, IdentityField};
//! use rf_signal::{Signal, SignalEvent, SignalRegistry};
//! use rf_sim::VirtualRadio;
//!
//! # async fn demo() -> Result<(), rf_signal::SignalError> {
//! let radio = VirtualRadio::new();
//! let registry = SignalRegistry::new(radio.factory());
//!
//! let parser = IdentityField::new(
//!     FieldLayoutParser::new(vec![FieldSpec::new("address", 20), FieldSpec::new("state", 4)]),
//!     "address",
//! );
//! let (signal, mut events) =
//!     Signal::new(&registry, "eurodomest", parser, Duration::from_millis(500));
//! signal.register().await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let SignalEvent::Data(data) = event {
//!         println!("device {} says {}", data.id(), data);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rf_protocol::{
    BitFrame, BitStringParser, DeviceData, PayloadParser, RadioChannel, RadioError, ReceivedFrame,
    Stamp,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SignalConfig;
use crate::debounce::{DebounceFilter, DebounceScope, ManualDebounce};
use crate::error::SignalError;
use crate::events::{ChannelEvent, SignalEvent};
use crate::registry::{lock, SharedChannel, SignalRegistry, SubscriberId};

/// What the pipeline decided about one frame
#[derive(Debug, Clone, PartialEq)]
enum FrameVerdict {
    /// Dropped before anything was emitted
    ManuallyDebounced,
    /// Repeat within the debounce window; payload only
    Debounced,
    /// Parser declined or result was not device data; payload only
    Rejected,
    /// Payload and data
    Accepted(DeviceData),
}

/// Per-signal frame processing, run on its own task
struct FramePipeline<C: RadioChannel> {
    signature: String,
    parser: Arc<dyn PayloadParser>,
    debounce: DebounceFilter,
    manual_debounce: Arc<Mutex<ManualDebounce>>,
    channel: Arc<SharedChannel<C>>,
    events: mpsc::Sender<SignalEvent>,
}

impl<C: RadioChannel> FramePipeline<C> {
    fn inspect(&mut self, frame: &BitFrame, stamp: &Stamp) -> FrameVerdict {
        if lock(&self.manual_debounce).is_active_at(stamp)
            || self.channel.manually_debounced_at(stamp)
        {
            return FrameVerdict::ManuallyDebounced;
        }

        if !self.debounce.admit(&frame.bit_string(), stamp.instant()) {
            return FrameVerdict::Debounced;
        }

        match DeviceData::from_value(self.parser.parse(frame)) {
            Some(data) => FrameVerdict::Accepted(data),
            None => FrameVerdict::Rejected,
        }
    }

    fn handle_payload(&mut self, received: ReceivedFrame) {
        let ReceivedFrame { frame, stamp } = received;
        let verdict = self.inspect(&frame, &stamp);
        if verdict == FrameVerdict::ManuallyDebounced {
            debug!(
                "[Signal {}] Manually debounced payload: {}",
                self.signature, frame
            );
            return;
        }

        self.emit(SignalEvent::Payload(frame));
        match verdict {
            FrameVerdict::Accepted(data) => self.emit(SignalEvent::Data(data)),
            FrameVerdict::Debounced => {
                debug!("[Signal {}] debounced repeated payload", self.signature)
            }
            FrameVerdict::Rejected | FrameVerdict::ManuallyDebounced => {}
        }
    }

    fn emit(&self, event: SignalEvent) {
        emit_event(&self.signature, &self.events, event);
    }

    async fn run(mut self, mut bus: broadcast::Receiver<ChannelEvent>) {
        loop {
            match bus.recv().await {
                Ok(ChannelEvent::Payload(received)) => self.handle_payload(received),
                Ok(ChannelEvent::PayloadSend(frame)) => {
                    self.emit(SignalEvent::PayloadSend(frame));
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(
                        "[Signal {}] subscriber fell behind, skipped {} frames",
                        self.signature, missed
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

/// One logical subscriber on a shared radio channel
///
/// Dropping a `Signal` stops its frame processing but does not release its
/// binding; call [`Signal::unregister`] first for that.
pub struct Signal<C: RadioChannel> {
    id: SubscriberId,
    channel: Arc<SharedChannel<C>>,
    debounce_window: Duration,
    manual_debounce: Arc<Mutex<ManualDebounce>>,
    events: mpsc::Sender<SignalEvent>,
    task: JoinHandle<()>,
}

impl<C: RadioChannel> Signal<C> {
    /// Create a signal on `signature` with its own parser
    ///
    /// Opens the shared channel if needed and starts receiving frames right
    /// away; frames are delivered whether or not the signal is registered.
    /// Returns the signal and its event stream.
    pub fn new<P>(
        registry: &SignalRegistry<C>,
        signature: impl Into<String>,
        parser: P,
        debounce_window: Duration,
    ) -> (Self, mpsc::Receiver<SignalEvent>)
    where
        P: PayloadParser + 'static,
    {
        Self::with_parser(registry, signature.into(), Arc::new(parser), debounce_window)
    }

    /// Create a signal that decodes frames as plain bit-strings
    ///
    /// Such a signal emits `Payload` events but never `Data`.
    pub fn raw(
        registry: &SignalRegistry<C>,
        signature: impl Into<String>,
        debounce_window: Duration,
    ) -> (Self, mpsc::Receiver<SignalEvent>) {
        Self::new(registry, signature, BitStringParser, debounce_window)
    }

    /// Create a signal from configuration
    pub fn from_config(
        registry: &SignalRegistry<C>,
        config: &SignalConfig,
        parser: Arc<dyn PayloadParser>,
    ) -> (Self, mpsc::Receiver<SignalEvent>) {
        Self::with_parser(registry, config.signature.clone(), parser, config.debounce())
    }

    fn with_parser(
        registry: &SignalRegistry<C>,
        signature: String,
        parser: Arc<dyn PayloadParser>,
        debounce_window: Duration,
    ) -> (Self, mpsc::Receiver<SignalEvent>) {
        let channel = registry.channel(&signature);
        let (events, event_rx) = mpsc::channel(registry.config().event_capacity.max(1));
        let manual_debounce = Arc::new(Mutex::new(ManualDebounce::default()));

        let pipeline = FramePipeline {
            signature,
            parser,
            debounce: DebounceFilter::new(debounce_window),
            manual_debounce: Arc::clone(&manual_debounce),
            channel: Arc::clone(&channel),
            events: events.clone(),
        };
        let task = tokio::spawn(pipeline.run(channel.subscribe()));

        let signal = Self {
            id: registry.next_subscriber_id(),
            channel,
            debounce_window,
            manual_debounce,
            events,
            task,
        };
        (signal, event_rx)
    }

    /// Subscriber id within the registry
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Protocol signature
    pub fn signature(&self) -> &str {
        self.channel.signature()
    }

    /// Configured debounce window
    pub fn debounce_window(&self) -> Duration {
        self.debounce_window
    }

    /// Shared channel handle
    pub fn handle(&self) -> Arc<C> {
        Arc::clone(self.channel.handle())
    }

    /// Bind to the shared channel, registering the hardware if needed
    ///
    /// Safe to call repeatedly. Concurrent calls from any number of signals
    /// of the same signature share a single hardware registration. On
    /// failure an `Error` event is emitted as well.
    pub async fn register(&self) -> Result<(), SignalError> {
        debug!("[Signal {}] register subscriber {}", self.signature(), self.id.0);
        let result = self.channel.bind(self.id).await;
        if let Err(e) = &result {
            self.emit_error(e.clone());
        }
        result
    }

    /// [`register`](Self::register), also reporting the outcome to `callback`
    ///
    /// The callback receives `Ok(true)` on success.
    pub async fn register_with<F>(&self, callback: F) -> Result<(), SignalError>
    where
        F: FnOnce(Result<bool, SignalError>),
    {
        let result = self.register().await;
        callback(result.clone().map(|()| true));
        result
    }

    /// Release the binding, unregistering the hardware if this was the last
    ///
    /// Does nothing if the signal is not bound.
    pub async fn unregister(&self) -> Result<(), SignalError> {
        let result = self.channel.unbind(self.id).await;
        if let Err(e) = &result {
            self.emit_error(e.clone());
        }
        result
    }

    /// Suppress all frame processing for `duration`
    ///
    /// With [`DebounceScope::AllSubscribers`] every signal on this signature
    /// is silenced. Frames the radio delivered before this call are not
    /// affected, even if they have not been processed yet. Calling again
    /// before expiry restarts the timer.
    pub fn manual_debounce(&self, duration: Duration, scope: DebounceScope) {
        let now = Stamp::now();
        match scope {
            DebounceScope::Instance => lock(&self.manual_debounce).arm(now, duration),
            DebounceScope::AllSubscribers => self.channel.arm_manual_debounce(now, duration),
        }
        info!(
            "[Signal {}] manual debounce for {}ms ({:?})",
            self.signature(),
            duration.as_millis(),
            scope
        );
    }

    /// Transmit a frame on the shared channel
    ///
    /// On success every signal of this signature receives a `PayloadSend`
    /// event and the hardware result is returned. On failure this signal
    /// receives an `Error` event and the error is returned; the signal stays
    /// usable.
    pub async fn send(&self, frame: &BitFrame) -> Result<C::Receipt, SignalError> {
        match self.channel.transmit(frame.to_tx_buffer()).await {
            Ok(receipt) => {
                info!("[Signal {}] send payload: {}", self.signature(), frame);
                self.channel.publish_sent(frame.clone());
                Ok(receipt)
            }
            Err(source) => {
                error!("[Signal {}] tx error: {}", self.signature(), source);
                let err = SignalError::Transmit {
                    signature: self.signature().to_string(),
                    source,
                };
                self.emit_error(err.clone());
                Err(err)
            }
        }
    }

    /// Fire-and-forget transmission
    ///
    /// Runs on a spawned task and emits no events. A hardware failure is
    /// only logged.
    pub fn tx(&self, frame: &BitFrame) {
        let signature = self.signature().to_string();
        self.tx_with(frame, move |result| {
            if let Err(e) = result {
                warn!("[Signal {}] tx error: {}", signature, e);
            }
        });
    }

    /// [`tx`](Self::tx), handing the raw hardware result to `on_complete`
    pub fn tx_with<F>(&self, frame: &BitFrame, on_complete: F)
    where
        F: FnOnce(Result<C::Receipt, RadioError>) + Send + 'static,
    {
        let channel = Arc::clone(&self.channel);
        let buffer = frame.to_tx_buffer();
        tokio::spawn(async move {
            on_complete(channel.transmit(buffer).await);
        });
    }

    fn emit_error(&self, err: SignalError) {
        emit_event(self.signature(), &self.events, SignalEvent::Error(err));
    }
}

/// Queue an event without waiting
///
/// A full queue drops the event with a warning so a slow consumer never
/// stalls frame processing or hardware calls. A closed queue means nobody
/// is listening any more.
fn emit_event(signature: &str, events: &mpsc::Sender<SignalEvent>, event: SignalEvent) {
    if let Err(TrySendError::Full(event)) = events.try_send(event) {
        warn!(
            "[Signal {}] event queue full, dropping {} event",
            signature,
            event.name()
        );
    }
}

impl<C: RadioChannel> Drop for Signal<C> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
