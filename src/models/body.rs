//! Wire envelope exchanged on both session legs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::deserialize_null_default;
use crate::models::request::Request;
use crate::models::response::Response;
use crate::{AppError, Result};

/// Envelope carrying one JSON-encoded [`Request`] or [`Response`].
///
/// `data` travels as a base64 string, `req_id` correlates a response with
/// the request that produced it. Both fields are omitted from the JSON when
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    /// Embedded JSON payload.
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_base64",
        deserialize_with = "deserialize_base64"
    )]
    pub data: Vec<u8>,
    /// Control-plane request identifier.
    #[serde(
        default,
        skip_serializing_if = "String::is_empty",
        deserialize_with = "deserialize_null_default"
    )]
    pub req_id: String,
}

impl Body {
    /// Wrap a request for delivery to a node.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if the request cannot be encoded.
    pub fn from_request(req_id: impl Into<String>, request: &Request) -> Result<Self> {
        Ok(Self {
            data: serde_json::to_vec(request)?,
            req_id: req_id.into(),
        })
    }

    /// Wrap a response tagged with the originating request identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if the response cannot be encoded.
    pub fn from_response(req_id: impl Into<String>, response: &Response) -> Result<Self> {
        Ok(Self {
            data: serde_json::to_vec(response)?,
            req_id: req_id.into(),
        })
    }

    /// Decode the embedded payload as a [`Request`].
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`]`("malformed request: …")` when the
    /// payload is not a valid request document.
    pub fn decode_request(&self) -> Result<Request> {
        serde_json::from_slice(&self.data)
            .map_err(|e| AppError::Protocol(format!("malformed request: {e}")))
    }

    /// Decode the embedded payload as a [`Response`].
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`]`("malformed response: …")` when the
    /// payload is not a valid response document.
    pub fn decode_response(&self) -> Result<Response> {
        serde_json::from_slice(&self.data)
            .map_err(|e| AppError::Protocol(format!("malformed response: {e}")))
    }
}

fn serialize_base64<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&STANDARD.encode(data))
}

fn deserialize_base64<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(encoded) = Option::<String>::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}
