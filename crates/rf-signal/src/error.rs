//! Error types for the signal manager

use rf_protocol::RadioError;
use thiserror::Error;

/// Errors that can occur in the signal manager
///
/// A parser declining a frame is not an error and never shows up here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// Hardware refused to register the signature
    #[error("signal {signature}: register failed: {source}")]
    Registration {
        /// Protocol signature
        signature: String,
        /// Hardware error
        #[source]
        source: RadioError,
    },

    /// Hardware refused to unregister the signature
    #[error("signal {signature}: unregister failed: {source}")]
    Unregistration {
        /// Protocol signature
        signature: String,
        /// Hardware error
        #[source]
        source: RadioError,
    },

    /// Hardware refused a transmission
    #[error("signal {signature}: tx failed: {source}")]
    Transmit {
        /// Protocol signature
        signature: String,
        /// Hardware error
        #[source]
        source: RadioError,
    },

    /// No channel exists for the signature
    #[error("unknown signal: {0}")]
    UnknownSignature(String),
}

impl SignalError {
    /// Signature the error relates to
    pub fn signature(&self) -> &str {
        match self {
            SignalError::Registration { signature, .. }
            | SignalError::Unregistration { signature, .. }
            | SignalError::Transmit { signature, .. } => signature,
            SignalError::UnknownSignature(signature) => signature,
        }
    }

    /// Underlying hardware error, if any
    pub fn radio_error(&self) -> Option<&RadioError> {
        match self {
            SignalError::Registration { source, .. }
            | SignalError::Unregistration { source, .. }
            | SignalError::Transmit { source, .. } => Some(source),
            SignalError::UnknownSignature(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SignalError::Transmit {
            signature: "eurodomest".to_string(),
            source: RadioError::Rejected("busy".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "signal eurodomest: tx failed: radio rejected request: busy"
        );
        assert_eq!(err.signature(), "eurodomest");
        assert!(err.radio_error().is_some());
    }

    #[test]
    fn test_unknown_signature_has_no_radio_error() {
        let err = SignalError::UnknownSignature("kaku".to_string());
        assert_eq!(err.signature(), "kaku");
        assert!(err.radio_error().is_none());
    }
}
