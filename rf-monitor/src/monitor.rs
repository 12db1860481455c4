//! Subscriber host
//!
//! Builds one signal per configured subscriber on a virtual radio, logs
//! every event they produce, and executes replay steps against them.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use rf_signal::{Signal, SignalEvent, SignalRegistry};
use rf_sim::{VirtualRadio, VirtualRadioChannel};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::MonitorConfig;
use crate::replay::{Script, Step};

/// Events seen by one subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    pub payload: usize,
    pub data: usize,
    pub payload_send: usize,
    pub error: usize,
}

impl EventCounts {
    fn record(&mut self, event: &SignalEvent) {
        match event {
            SignalEvent::Payload(_) => self.payload += 1,
            SignalEvent::Data(_) => self.data += 1,
            SignalEvent::PayloadSend(_) => self.payload_send += 1,
            SignalEvent::Error(_) => self.error += 1,
        }
    }
}

struct Subscriber {
    signal: Signal<VirtualRadioChannel>,
    log: JoinHandle<EventCounts>,
}

/// Monitor session over a virtual radio
pub struct Monitor {
    radio: VirtualRadio,
    registry: SignalRegistry<VirtualRadioChannel>,
    subscribers: BTreeMap<String, Subscriber>,
    linger: Duration,
}

async fn log_events(name: String, mut events: mpsc::Receiver<SignalEvent>) -> EventCounts {
    let mut counts = EventCounts::default();
    while let Some(event) = events.recv().await {
        counts.record(&event);
        match &event {
            SignalEvent::Payload(frame) => info!("[{}] payload {}", name, frame),
            SignalEvent::Data(data) => info!("[{}] data {}", name, data),
            SignalEvent::PayloadSend(frame) => info!("[{}] payload_send {}", name, frame),
            SignalEvent::Error(err) => warn!("[{}] error: {}", name, err),
        }
    }
    counts
}

impl Monitor {
    /// Create every configured subscriber
    ///
    /// Subscribers start receiving immediately but are not registered yet.
    pub fn new(config: &MonitorConfig) -> Self {
        let radio = VirtualRadio::with_defaults(config.channels.clone());
        let registry = SignalRegistry::with_config(radio.factory(), config.registry.clone());

        let subscribers = config
            .subscribers
            .iter()
            .map(|sub| {
                let (signal, events) =
                    Signal::from_config(&registry, &sub.signal, sub.parser.build());
                let log = tokio::spawn(log_events(sub.name.clone(), events));
                (sub.name.clone(), Subscriber { signal, log })
            })
            .collect();

        Self {
            radio,
            registry,
            subscribers,
            linger: Duration::from_millis(config.linger_ms),
        }
    }

    pub fn radio(&self) -> &VirtualRadio {
        &self.radio
    }

    fn signal(&self, name: &str) -> Result<&Signal<VirtualRadioChannel>> {
        self.subscribers
            .get(name)
            .map(|sub| &sub.signal)
            .ok_or_else(|| anyhow!("unknown subscriber '{}'", name))
    }

    /// Register every subscriber
    ///
    /// Failures are logged by the event log and do not stop the others.
    /// Returns the number of subscribers that registered.
    pub async fn register_all(&self) -> usize {
        let mut registered = 0;
        for sub in self.subscribers.values() {
            if sub.signal.register().await.is_ok() {
                registered += 1;
            }
        }
        info!(
            "Registered {}/{} subscribers on {:?}",
            registered,
            self.subscribers.len(),
            self.registry.signatures()
        );
        registered
    }

    /// Execute one replay step
    pub async fn apply(&self, step: &Step) -> Result<()> {
        match step {
            Step::Wait(duration) => tokio::time::sleep(*duration).await,
            Step::Receive { signature, frame } => {
                let heard = self.radio.channel(signature).emit(frame.clone());
                if heard == 0 {
                    warn!("No subscriber on {} for {}", signature, frame);
                }
            }
            Step::Transmit { subscriber, frame } => {
                // Failures already surface as error events
                let _ = self.signal(subscriber)?.send(frame).await;
            }
            Step::Debounce {
                subscriber,
                duration,
                scope,
            } => self.signal(subscriber)?.manual_debounce(*duration, *scope),
        }
        Ok(())
    }

    /// Execute a whole script
    pub async fn replay(&self, script: &Script) -> Result<()> {
        for step in script.steps() {
            self.apply(step).await?;
        }
        Ok(())
    }

    /// Unregister everyone and collect event counts per subscriber
    pub async fn shutdown(self) -> BTreeMap<String, EventCounts> {
        tokio::time::sleep(self.linger).await;

        for sub in self.subscribers.values() {
            let _ = sub.signal.unregister().await;
        }

        let mut summary = BTreeMap::new();
        for (name, sub) in self.subscribers {
            let Subscriber { signal, log } = sub;
            drop(signal);
            match log.await {
                Ok(counts) => {
                    summary.insert(name, counts);
                }
                Err(e) => warn!("[{}] event log task failed: {}", name, e),
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "linger_ms": 10,
        "subscribers": [
            {
                "name": "remote",
                "signature": "eurodomest",
                "debounce_ms": 500,
                "parser": {
                    "kind": "fields",
                    "fields": [
                        {"name": "address", "width": 3},
                        {"name": "state", "width": 1}
                    ],
                    "identity": "address"
                }
            },
            {"name": "sniffer", "signature": "eurodomest"},
            {"name": "socket", "signature": "kaku"}
        ]
    }"#;

    #[tokio::test(start_paused = true)]
    async fn test_replay_session() {
        let monitor = Monitor::new(&MonitorConfig::from_json(CONFIG).unwrap());
        assert_eq!(monitor.register_all().await, 3);
        assert_eq!(monitor.radio().channel("eurodomest").register_calls(), 1);

        let script: Script = "\
            rx eurodomest 1011\n\
            wait 100\n\
            rx eurodomest 1011\n\
            tx socket 01\n\
            debounce sniffer 50\n\
            rx eurodomest 0001\n"
            .parse()
            .unwrap();
        monitor.replay(&script).await.unwrap();

        let summary = monitor.shutdown().await;
        assert_eq!(
            summary["remote"],
            EventCounts {
                payload: 3,
                data: 2,
                ..Default::default()
            }
        );
        assert_eq!(
            summary["sniffer"],
            EventCounts {
                payload: 2,
                ..Default::default()
            }
        );
        assert_eq!(
            summary["socket"],
            EventCounts {
                payload_send: 1,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_shutdown_unregisters_hardware() {
        let monitor = Monitor::new(&MonitorConfig::from_json(CONFIG).unwrap());
        monitor.register_all().await;
        let radio = monitor.radio().clone();

        monitor.shutdown().await;
        assert!(!radio.channel("eurodomest").is_listening());
        assert!(!radio.channel("kaku").is_listening());
        assert_eq!(radio.channel("kaku").unregister_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_subscriber() {
        let monitor = Monitor::new(&MonitorConfig::from_json(CONFIG).unwrap());
        let step = Step::Transmit {
            subscriber: "ghost".to_string(),
            frame: "1".parse().unwrap(),
        };

        let err = monitor.apply(&step).await.unwrap_err();
        assert_eq!(err.to_string(), "unknown subscriber 'ghost'");
    }

    #[tokio::test]
    async fn test_registration_failures_are_counted() {
        let mut config = MonitorConfig::from_json(CONFIG).unwrap();
        config.channels.register_failure = Some("busy".to_string());
        let monitor = Monitor::new(&config);

        assert_eq!(monitor.register_all().await, 0);
        let summary = monitor.shutdown().await;
        assert!(summary.values().all(|counts| counts.error == 1));
    }
}
