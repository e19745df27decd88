// JSON message codec

use conduit_core::port::{MessageCodec, RawMessage};
use conduit_core::ProcessingError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

pub const CONTENT_TYPE: &str = "content-type";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Encodes values as JSON message bodies
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> MessageCodec<T> for JsonCodec<T> {
    fn encode(&self, value: &T) -> Result<RawMessage, ProcessingError> {
        let body = serde_json::to_vec(value)?;
        Ok(RawMessage::new(body).with_property(CONTENT_TYPE, JSON_CONTENT_TYPE))
    }

    fn decode(&self, message: &RawMessage) -> Result<T, ProcessingError> {
        serde_json::from_slice(&message.body).map_err(|e| {
            ProcessingError::from(e).with_context(format!(
                "decoding {} byte message",
                message.body.len()
            ))
        })
    }
}
