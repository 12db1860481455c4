//! Event stream for signal subscribers
//!
//! Each `Signal` owns an event channel. Frames, decoded device data,
//! transmit notifications and errors all arrive through it in the order
//! they happened.

use rf_protocol::{BitFrame, DeviceData, ReceivedFrame};

use crate::error::SignalError;

/// Events delivered to a signal subscriber
#[derive(Debug, Clone)]
pub enum SignalEvent {
    /// A raw frame arrived (before debouncing and parsing)
    Payload(BitFrame),

    /// A frame decoded into device data for this subscriber's protocol
    Data(DeviceData),

    /// A frame was transmitted on the shared channel by any subscriber
    PayloadSend(BitFrame),

    /// Registration, unregistration or transmission failed
    Error(SignalError),
}

impl SignalEvent {
    /// Event name: `payload`, `data`, `payload_send` or `error`
    pub fn name(&self) -> &'static str {
        match self {
            SignalEvent::Payload(_) => "payload",
            SignalEvent::Data(_) => "data",
            SignalEvent::PayloadSend(_) => "payload_send",
            SignalEvent::Error(_) => "error",
        }
    }

    /// Decoded device data, if this is a data event
    pub fn data(&self) -> Option<&DeviceData> {
        match self {
            SignalEvent::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Frame carried by payload and payload_send events
    pub fn frame(&self) -> Option<&BitFrame> {
        match self {
            SignalEvent::Payload(frame) | SignalEvent::PayloadSend(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Traffic on the shared channel of one signature
#[derive(Debug, Clone)]
pub(crate) enum ChannelEvent {
    /// A frame received by the hardware, stamped on arrival
    Payload(ReceivedFrame),

    /// A frame one of the subscribers transmitted
    PayloadSend(BitFrame),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_protocol::RadioError;
    use serde_json::json;

    #[test]
    fn test_event_names() {
        let frame = BitFrame::new(vec![1, 0]);
        assert_eq!(SignalEvent::Payload(frame.clone()).name(), "payload");
        assert_eq!(SignalEvent::PayloadSend(frame).name(), "payload_send");

        let data = DeviceData::from_value(json!({"id": "X1"})).unwrap();
        assert_eq!(SignalEvent::Data(data).name(), "data");

        let err = SignalError::Registration {
            signature: "elro".to_string(),
            source: RadioError::Unavailable,
        };
        assert_eq!(SignalEvent::Error(err).name(), "error");
    }

    #[test]
    fn test_accessors() {
        let frame = BitFrame::new(vec![1, 1]);
        let event = SignalEvent::PayloadSend(frame.clone());
        assert_eq!(event.frame(), Some(&frame));
        assert!(event.data().is_none());

        let data = DeviceData::from_value(json!({"id": 7})).unwrap();
        let event = SignalEvent::Data(data);
        assert_eq!(event.data().map(|d| d.id()), Some("7"));
        assert!(event.frame().is_none());
    }
}
