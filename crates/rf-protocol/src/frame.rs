//! Demodulated bit frames

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// An ordered sequence of bit values demodulated from a radio transmission
///
/// The same shape is used in both directions: the radio abstraction emits
/// frames it received, and drivers hand frames back for transmission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitFrame(Vec<u8>);

impl BitFrame {
    /// Create a frame from raw bit values
    pub fn new(bits: Vec<u8>) -> Self {
        Self(bits)
    }

    /// Borrow the bit values
    pub fn bits(&self) -> &[u8] {
        &self.0
    }

    /// Number of bits in the frame
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the frame carries no bits
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Printable bit-string, e.g. `"1011"`
    ///
    /// This is the key used for debouncing identical payloads.
    pub fn bit_string(&self) -> String {
        self.0.iter().map(|bit| bit.to_string()).collect()
    }

    /// Serialize into the buffer shape the radio transmits
    ///
    /// One byte per bit, in frame order.
    pub fn to_tx_buffer(&self) -> Vec<u8> {
        self.0.clone()
    }

    /// Consume the frame and return its bit values
    pub fn into_bits(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for BitFrame {
    fn from(bits: Vec<u8>) -> Self {
        Self(bits)
    }
}

impl From<&[u8]> for BitFrame {
    fn from(bits: &[u8]) -> Self {
        Self(bits.to_vec())
    }
}

impl FromStr for BitFrame {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .enumerate()
            .map(|(position, found)| match found {
                '0' => Ok(0),
                '1' => Ok(1),
                _ => Err(ParseError::InvalidBit { position, found }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for BitFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in &self.0 {
            write!(f, "{}", bit)?;
        }
        Ok(())
    }
}
