//! Payload parsers
//!
//! A parser turns a demodulated frame into a JSON value. Returning anything
//! that does not validate as [`DeviceData`] (for example `Value::Null`)
//! tells the signal manager the frame belongs to some other protocol.

use serde_json::{json, Map, Value};

use crate::frame::BitFrame;
use crate::record::DeviceData;

/// Decoding strategy injected into a signal subscriber
pub trait PayloadParser: Send + Sync {
    /// Decode a frame, or return a falsy value to reject it
    fn parse(&self, frame: &BitFrame) -> Value;
}

impl<F> PayloadParser for F
where
    F: Fn(&BitFrame) -> Value + Send + Sync,
{
    fn parse(&self, frame: &BitFrame) -> Value {
        self(frame)
    }
}

/// Run a parser and validate its result
pub fn decode(parser: &dyn PayloadParser, frame: &BitFrame) -> Option<DeviceData> {
    DeviceData::from_value(parser.parse(frame))
}

/// Default parser: wraps the frame as `{"payload": "<bits>"}`
///
/// The result carries no identity, so it never produces device data on its
/// own. Subscribers that only care about raw frames use it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitStringParser;

impl PayloadParser for BitStringParser {
    fn parse(&self, frame: &BitFrame) -> Value {
        json!({ "payload": frame.bit_string() })
    }
}

/// Copies one decoded field into `id`
///
/// Remote drivers address devices by the transmitter address, so the
/// address doubles as the identity. Non-object results pass through.
#[derive(Debug, Clone)]
pub struct IdentityField<P> {
    inner: P,
    field: String,
}

impl<P> IdentityField<P> {
    /// Wrap `inner`, taking the identity from `field`
    pub fn new(inner: P, field: impl Into<String>) -> Self {
        Self {
            inner,
            field: field.into(),
        }
    }

    /// Name of the source field
    pub fn field(&self) -> &str {
        &self.field
    }
}

impl<P: PayloadParser> PayloadParser for IdentityField<P> {
    fn parse(&self, frame: &BitFrame) -> Value {
        let mut value = self.inner.parse(frame);
        if let Value::Object(map) = &mut value {
            let identity = map.get(&self.field).cloned().unwrap_or(Value::Null);
            map.insert(DeviceData::ID_FIELD.to_string(), identity);
        }
        value
    }
}

/// A named run of bits within a frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldSpec {
    /// Field name in the decoded record
    pub name: String,
    /// Number of bits
    pub width: usize,
}

impl FieldSpec {
    /// Create a field spec
    pub fn new(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }
}

/// Splits fixed-length frames into consecutive named fields
///
/// Frames whose length differs from the sum of field widths are rejected.
/// Each field is decoded as its bit-string; single-bit fields decode as a
/// number so state bits read naturally.
#[derive(Debug, Clone)]
pub struct FieldLayoutParser {
    fields: Vec<FieldSpec>,
    frame_len: usize,
}

impl FieldLayoutParser {
    /// Create a parser for the given layout
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        let frame_len = fields.iter().map(|f| f.width).sum();
        Self { fields, frame_len }
    }

    /// Expected frame length in bits
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }
}

impl PayloadParser for FieldLayoutParser {
    fn parse(&self, frame: &BitFrame) -> Value {
        if frame.len() != self.frame_len {
            return Value::Null;
        }

        let mut map = Map::new();
        let mut offset = 0;
        for field in &self.fields {
            let bits = BitFrame::from(&frame.bits()[offset..offset + field.width]);
            let value = if field.width == 1 {
                json!(bits.bits()[0])
            } else {
                json!(bits.bit_string())
            };
            map.insert(field.name.clone(), value);
            offset += field.width;
        }
        Value::Object(map)
    }
}
