//! Channel registry
//!
//! The registry owns one shared channel per protocol signature. A shared
//! channel bundles the radio channel handle with the bookkeeping every
//! subscriber of that signature relies on:
//!
//! - the binding set, which decides when the hardware is registered and
//!   unregistered
//! - the in-flight registration, shared by every subscriber that binds
//!   while it is pending
//! - the frame bus, which fans received frames (with the arrival stamps the
//!   radio gave them) and transmit notifications out to all subscribers in
//!   order
//! - the manual debounce window that applies to all subscribers
//!
//! Hardware operations on a signature are serialized by an async lock that
//! also guards the `registered` flag. Registration skips the hardware call
//! when the handle is already registered, and unregistration re-checks the
//! binding set under the lock, so a bind racing an unbind never leaves the
//! hardware in the wrong state.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rf_protocol::{BitFrame, RadioChannel, RadioError, ReceivedFrame, Stamp};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::debounce::ManualDebounce;
use crate::error::SignalError;
use crate::events::ChannelEvent;

/// Unique identifier for a subscriber bound through the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

impl SubscriberId {
    /// Get the raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Outcome of a hardware registration; `None` while in flight
type RegistrationState = Option<Result<(), RadioError>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Bindings {
    members: HashSet<SubscriberId>,
    registration: Option<watch::Receiver<RegistrationState>>,
}

/// The shared channel of one signature
pub(crate) struct SharedChannel<C: RadioChannel> {
    signature: String,
    handle: Arc<C>,
    bus: broadcast::Sender<ChannelEvent>,
    bindings: Mutex<Bindings>,
    /// Serializes register/unregister; guards `registered`
    hardware: tokio::sync::Mutex<()>,
    registered: AtomicBool,
    /// Serializes transmissions
    tx_lock: tokio::sync::Mutex<()>,
    manual_debounce: Mutex<ManualDebounce>,
    pump: JoinHandle<()>,
}

impl<C: RadioChannel> SharedChannel<C> {
    fn open(signature: &str, handle: C, config: &RegistryConfig) -> Self {
        let (bus, _) = broadcast::channel(config.bus_capacity.max(1));
        // Subscribe before returning so no frame emitted after creation is lost
        let payloads = handle.payloads();
        let pump = tokio::spawn(run_pump(signature.to_string(), payloads, bus.clone()));

        Self {
            signature: signature.to_string(),
            handle: Arc::new(handle),
            bus,
            bindings: Mutex::new(Bindings::default()),
            hardware: tokio::sync::Mutex::new(()),
            registered: AtomicBool::new(false),
            tx_lock: tokio::sync::Mutex::new(()),
            manual_debounce: Mutex::new(ManualDebounce::default()),
            pump,
        }
    }

    pub(crate) fn signature(&self) -> &str {
        &self.signature
    }

    pub(crate) fn handle(&self) -> &Arc<C> {
        &self.handle
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.bus.subscribe()
    }

    pub(crate) fn binding_count(&self) -> usize {
        lock(&self.bindings).members.len()
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// Announce a successful transmission to every subscriber
    pub(crate) fn publish_sent(&self, frame: BitFrame) {
        let _ = self.bus.send(ChannelEvent::PayloadSend(frame));
    }

    pub(crate) fn arm_manual_debounce(&self, now: Stamp, duration: std::time::Duration) {
        lock(&self.manual_debounce).arm(now, duration);
    }

    pub(crate) fn manually_debounced_at(&self, at: &Stamp) -> bool {
        lock(&self.manual_debounce).is_active_at(at)
    }

    /// Transmit a buffer, one transmission at a time per signature
    pub(crate) async fn transmit(&self, buffer: Vec<u8>) -> Result<C::Receipt, RadioError> {
        let _guard = self.tx_lock.lock().await;
        self.handle.tx(buffer).await
    }

    /// Add a subscriber and wait for the shared registration outcome
    pub(crate) async fn bind(self: &Arc<Self>, subscriber: SubscriberId) -> Result<(), SignalError> {
        let mut outcome = self.join(subscriber);

        let result = match outcome.wait_for(Option::is_some).await {
            Ok(state) => (*state).clone().unwrap_or(Err(RadioError::ChannelClosed)),
            Err(_) => Err(RadioError::ChannelClosed),
        };

        result.map_err(|source| SignalError::Registration {
            signature: self.signature.clone(),
            source,
        })
    }

    /// Insert into the binding set, starting a registration if needed
    fn join(self: &Arc<Self>, subscriber: SubscriberId) -> watch::Receiver<RegistrationState> {
        let mut bindings = lock(&self.bindings);
        let was_empty = bindings.members.is_empty();
        bindings.members.insert(subscriber);

        let reusable = match &bindings.registration {
            Some(outcome) if !was_empty && !matches!(*outcome.borrow(), Some(Err(_))) => {
                Some(outcome.clone())
            }
            _ => None,
        };
        if let Some(outcome) = reusable {
            debug!(
                "[Signal {}] subscriber {} joins existing registration",
                self.signature, subscriber.0
            );
            return outcome;
        }

        info!("[Signal {}] registering signal", self.signature);
        let (tx, rx) = watch::channel(None);
        bindings.registration = Some(rx.clone());
        tokio::spawn(Arc::clone(self).register_hardware(tx));
        rx
    }

    async fn register_hardware(self: Arc<Self>, outcome: watch::Sender<RegistrationState>) {
        let result = {
            let _guard = self.hardware.lock().await;
            if self.is_registered() {
                debug!("[Signal {}] hardware already registered", self.signature);
                Ok(())
            } else if self.binding_count() == 0 {
                debug!(
                    "[Signal {}] all subscribers left before registration",
                    self.signature
                );
                Ok(())
            } else {
                let result = self.handle.register().await;
                if result.is_ok() {
                    self.registered.store(true, Ordering::SeqCst);
                }
                result
            }
        };

        match &result {
            Ok(()) => info!("[Signal {}] signal registered", self.signature),
            Err(e) => warn!("[Signal {}] signal register error: {}", self.signature, e),
        }
        outcome.send_replace(Some(result));
    }

    /// Remove a subscriber, unregistering the hardware when none remain
    pub(crate) async fn unbind(&self, subscriber: SubscriberId) -> Result<(), SignalError> {
        let now_empty = {
            let mut bindings = lock(&self.bindings);
            if !bindings.members.remove(&subscriber) {
                return Ok(());
            }
            bindings.members.is_empty()
        };
        if !now_empty {
            return Ok(());
        }

        let _guard = self.hardware.lock().await;
        if self.binding_count() > 0 {
            debug!(
                "[Signal {}] subscriber joined during unbind, keeping registration",
                self.signature
            );
            return Ok(());
        }
        if !self.is_registered() {
            return Ok(());
        }

        match self.handle.unregister().await {
            Ok(()) => {
                self.registered.store(false, Ordering::SeqCst);
                info!("[Signal {}] unregistered signal", self.signature);
                Ok(())
            }
            Err(source) => {
                warn!("[Signal {}] signal unregister error: {}", self.signature, source);
                Err(SignalError::Unregistration {
                    signature: self.signature.clone(),
                    source,
                })
            }
        }
    }
}

impl<C: RadioChannel> Drop for SharedChannel<C> {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Forward stamped frames from the handle onto the shared bus
async fn run_pump(
    signature: String,
    mut payloads: broadcast::Receiver<ReceivedFrame>,
    bus: broadcast::Sender<ChannelEvent>,
) {
    loop {
        match payloads.recv().await {
            Ok(received) => {
                debug!("[Signal {}] payload: {}", signature, received.frame);
                let _ = bus.send(ChannelEvent::Payload(received));
            }
            Err(RecvError::Lagged(missed)) => {
                warn!("[Signal {}] dropped {} frames from radio", signature, missed);
            }
            Err(RecvError::Closed) => {
                debug!("[Signal {}] radio payload stream closed", signature);
                break;
            }
        }
    }
}

type ChannelFactory<C> = Box<dyn Fn(&str) -> C + Send + Sync>;

struct RegistryInner<C: RadioChannel> {
    factory: ChannelFactory<C>,
    config: RegistryConfig,
    channels: Mutex<HashMap<String, Arc<SharedChannel<C>>>>,
    next_subscriber: AtomicU64,
}

/// Registry of shared radio channels, one per signature
///
/// Create one per application (or per test) and pass it to every
/// [`Signal`](crate::Signal). Cloning yields another reference to the same
/// registry. Channels are created lazily and live as long as the registry
/// or any signal bound to them.
///
/// Must be used from within a tokio runtime: creating a channel spawns the
/// task that forwards its frames.
pub struct SignalRegistry<C: RadioChannel> {
    inner: Arc<RegistryInner<C>>,
}

impl<C: RadioChannel> Clone for SignalRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: RadioChannel> SignalRegistry<C> {
    /// Create a registry that opens channels with `factory`
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> C + Send + Sync + 'static,
    {
        Self::with_config(factory, RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config<F>(factory: F, config: RegistryConfig) -> Self
    where
        F: Fn(&str) -> C + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(RegistryInner {
                factory: Box::new(factory),
                config,
                channels: Mutex::new(HashMap::new()),
                next_subscriber: AtomicU64::new(1),
            }),
        }
    }

    /// Registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Get the channel handle for `signature`, creating it on first use
    pub fn get_or_create(&self, signature: &str) -> Arc<C> {
        Arc::clone(self.channel(signature).handle())
    }

    pub(crate) fn channel(&self, signature: &str) -> Arc<SharedChannel<C>> {
        let mut channels = lock(&self.inner.channels);
        let channel = channels.entry(signature.to_string()).or_insert_with(|| {
            debug!("[Signal {}] opening shared channel", signature);
            let handle = (self.inner.factory)(signature);
            Arc::new(SharedChannel::open(signature, handle, &self.inner.config))
        });
        Arc::clone(channel)
    }

    fn existing(&self, signature: &str) -> Option<Arc<SharedChannel<C>>> {
        lock(&self.inner.channels).get(signature).cloned()
    }

    pub(crate) fn next_subscriber_id(&self) -> SubscriberId {
        SubscriberId(self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed))
    }

    /// Bind `subscriber` to `signature`
    ///
    /// The first binding (or the first after a failed registration) issues
    /// the hardware registration; later bindings share its outcome.
    pub async fn bind(&self, signature: &str, subscriber: SubscriberId) -> Result<(), SignalError> {
        self.channel(signature).bind(subscriber).await
    }

    /// Release `subscriber`'s binding to `signature`
    ///
    /// Unbinding a subscriber that is not bound does nothing.
    pub async fn unbind(&self, signature: &str, subscriber: SubscriberId) -> Result<(), SignalError> {
        let channel = self
            .existing(signature)
            .ok_or_else(|| SignalError::UnknownSignature(signature.to_string()))?;
        channel.unbind(subscriber).await
    }

    /// Signatures with an open channel, sorted
    pub fn signatures(&self) -> Vec<String> {
        let mut signatures: Vec<_> = lock(&self.inner.channels).keys().cloned().collect();
        signatures.sort();
        signatures
    }

    /// Number of subscribers bound to `signature`
    pub fn binding_count(&self, signature: &str) -> usize {
        self.existing(signature)
            .map_or(0, |channel| channel.binding_count())
    }

    /// Whether the hardware is registered for `signature`
    pub fn is_registered(&self, signature: &str) -> bool {
        self.existing(signature)
            .is_some_and(|channel| channel.is_registered())
    }
}
