//! The `{type, data}` wrapper every outbound message travels in.

use bytes::Bytes;
use serde::Serialize;

use crate::error::HubError;

/// Outbound message envelope.
///
/// Serialized once per dispatch call; the resulting bytes are shared by
/// every recipient.
///
/// ```json
/// { "type": "order_updated", "data": { "id": 42 } }
/// ```
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: ?Sized> {
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub message_type: &'a str,
    /// Caller-supplied payload.
    pub data: &'a T,
}

impl<'a, T: Serialize + ?Sized> Envelope<'a, T> {
    /// Wraps `data` under `message_type`.
    #[must_use]
    pub const fn new(message_type: &'a str, data: &'a T) -> Self {
        Self { message_type, data }
    }

    /// Encodes the envelope as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Serialization`] if `data` cannot be represented
    /// as JSON (for example a map with non-string keys).
    pub fn encode(&self) -> Result<Bytes, HubError> {
        let json = serde_json::to_vec(self)?;
        Ok(Bytes::from(json))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn encodes_type_and_data_fields() {
        let data = serde_json::json!({ "id": 7, "name": "alpha" });
        let Ok(bytes) = Envelope::new("item_created", &data).encode() else {
            panic!("encoding failed");
        };
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
            panic!("not json");
        };
        assert_eq!(value.get("type"), Some(&serde_json::json!("item_created")));
        assert_eq!(value.get("data"), Some(&data));
    }

    #[test]
    fn unit_data_encodes_as_null() {
        let Ok(bytes) = Envelope::new("ping", &()).encode() else {
            panic!("encoding failed");
        };
        assert_eq!(bytes.as_ref(), br#"{"type":"ping","data":null}"#);
    }

    #[test]
    fn non_string_map_keys_fail() {
        let mut data = HashMap::new();
        data.insert((1, 2), "tuple key");
        let result = Envelope::new("bad", &data).encode();
        assert!(matches!(result, Err(HubError::Serialization(_))));
    }
}
