//! Streaming JSON codec for session legs.
//!
//! The control plane streams [`Body`] values back to back with no framing
//! beyond JSON itself (optional whitespace between values). [`BodyCodec`]
//! buffers until one complete JSON value is available and then yields it.
//!
//! # Usage
//!
//! Use [`BodyCodec`] as the codec parameter for
//! [`tokio_util::codec::FramedRead`] on the reader leg. The writer leg calls
//! [`Encoder::encode`] directly so that marshal failures and pipe failures
//! stay distinguishable.
//!
//! # Errors and recovery
//!
//! A syntactically valid JSON value that is not a valid [`Body`] is yielded
//! as [`Frame::Invalid`] so the caller can drop that single message and keep
//! reading. Broken JSON syntax cannot be resynchronised and is returned as an
//! error, which ends the stream.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::models::body::Body;
use crate::{AppError, Result};

/// Maximum size of one buffered JSON value: 16 MiB.
///
/// A value still incomplete past this size makes [`BodyCodec::decode`]
/// return [`AppError::Protocol`] with `"frame too long"`.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// One decoded item of the inbound stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A well-formed envelope.
    Body(Body),
    /// Valid JSON that does not describe an envelope; carries the reason.
    Invalid(String),
}

/// Codec for concatenated JSON [`Body`] values.
///
/// Object, array and string values are framed by a structural scan that
/// resumes where the previous call stopped, so each buffered byte is
/// examined once no matter how many chunks the value arrives in. Only the
/// complete value is handed to `serde_json`.
#[derive(Debug, Clone, Default)]
pub struct BodyCodec {
    scan: Scan,
}

/// Progress through the value at the front of the buffer.
#[derive(Debug, Clone, Copy, Default)]
struct Scan {
    /// Bytes of the current value already examined; zero before it starts.
    offset: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Scan {
    /// Advance over `src`, returning the length of the value once it ends.
    fn advance(&mut self, src: &[u8]) -> Option<usize> {
        let start = self.offset;
        for (i, &b) in src[start..].iter().enumerate() {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
            } else {
                match b {
                    b'"' => self.in_string = true,
                    b'{' | b'[' => self.depth += 1,
                    b'}' | b']' => self.depth = self.depth.saturating_sub(1),
                    _ => {}
                }
            }

            if self.depth == 0 && !self.in_string {
                *self = Self::default();
                return Some(start + i + 1);
            }
        }
        self.offset = src.len();
        None
    }
}

impl BodyCodec {
    /// Create a new `BodyCodec`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame one complete JSON value as a [`Frame`].
    fn frame(raw: &[u8]) -> Result<Frame> {
        let value: serde_json::Value = serde_json::from_slice(raw)
            .map_err(|e| AppError::Protocol(format!("malformed json: {e}")))?;
        Ok(match serde_json::from_value::<Body>(value) {
            Ok(body) => Frame::Body(body),
            Err(e) => Frame::Invalid(e.to_string()),
        })
    }

    /// Scalars cannot be delimited structurally; `serde_json` finds their end.
    fn decode_scalar(src: &mut BytesMut) -> Result<Option<Frame>> {
        let (next, consumed) = {
            let mut values =
                serde_json::Deserializer::from_slice(&src[..]).into_iter::<serde_json::Value>();
            let next = values.next();
            (next, values.byte_offset())
        };

        match next {
            None => Ok(None),
            Some(Ok(_)) => {
                let raw = src.split_to(consumed);
                Self::frame(&raw).map(Some)
            }
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => Err(AppError::Protocol(format!("malformed json: {e}"))),
        }
    }

    fn too_long() -> AppError {
        AppError::Protocol(format!(
            "frame too long: exceeded {MAX_FRAME_BYTES} bytes"
        ))
    }
}

impl Decoder for BodyCodec {
    type Item = Frame;
    type Error = AppError;

    /// Decode the next JSON value from `src`.
    ///
    /// Returns `Ok(None)` while the buffered value is incomplete.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if self.scan.offset == 0 {
            let leading = src
                .iter()
                .position(|b| !b.is_ascii_whitespace())
                .unwrap_or(src.len());
            src.advance(leading);
            if src.is_empty() {
                return Ok(None);
            }
        }

        if !matches!(src[0], b'{' | b'[' | b'"') {
            let decoded = Self::decode_scalar(src)?;
            if decoded.is_none() && src.len() > MAX_FRAME_BYTES {
                return Err(Self::too_long());
            }
            return Ok(decoded);
        }

        match self.scan.advance(src) {
            Some(len) => {
                let raw = src.split_to(len);
                Self::frame(&raw).map(Some)
            }
            None if src.len() > MAX_FRAME_BYTES => {
                self.scan = Scan::default();
                Err(Self::too_long())
            }
            None => Ok(None),
        }
    }

    /// Decode what remains when the stream reaches EOF.
    ///
    /// Trailing whitespace is ignored; a truncated value is an error.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(AppError::Protocol(format!(
                "stream ended inside a value ({} bytes buffered)",
                src.len()
            ))),
        }
    }
}

impl Encoder<Body> for BodyCodec {
    type Error = AppError;

    /// Append the JSON encoding of `item` to `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if `item` cannot be marshaled.
    fn encode(&mut self, item: Body, dst: &mut BytesMut) -> Result<()> {
        let encoded = serde_json::to_vec(&item)
            .map_err(|e| AppError::Protocol(format!("failed to marshal body: {e}")))?;
        dst.extend_from_slice(&encoded);
        Ok(())
    }
}
