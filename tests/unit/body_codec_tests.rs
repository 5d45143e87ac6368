//! Unit tests for the streaming `Body` codec.
//!
//! Covers:
//! - a single value, back-to-back values and whitespace-separated values
//! - partial delivery buffered until the value completes, including
//!   byte-at-a-time and chunked delivery of large values
//! - a valid JSON value that is not an envelope yields `Frame::Invalid`
//! - broken syntax and oversized frames are errors
//! - EOF handling for trailing whitespace and truncated values
//! - encoder output: base64 `data`, empty fields omitted, no separator

use bytes::BytesMut;
use futures_util::StreamExt;
use tokio_util::codec::{Decoder, Encoder, FramedRead};

use node_session::models::body::Body;
use node_session::session::codec::{BodyCodec, Frame, MAX_FRAME_BYTES};
use node_session::AppError;

fn body(data: &[u8], req_id: &str) -> Body {
    Body {
        data: data.to_vec(),
        req_id: req_id.to_owned(),
    }
}

// ── Decoding ────────────────────────────────────────────────

#[test]
fn single_value_decodes_to_body() {
    let mut codec = BodyCodec::new();
    let mut buf = BytesMut::from(r#"{"data":"aGVsbG8=","req_id":"r1"}"#);

    let frame = codec.decode(&mut buf).expect("decode must succeed");

    assert_eq!(frame, Some(Frame::Body(body(b"hello", "r1"))));
    assert!(buf.is_empty(), "decoded bytes must be consumed");
}

#[test]
fn back_to_back_values_decode_in_order() {
    let mut codec = BodyCodec::new();
    let mut buf = BytesMut::from(r#"{"req_id":"a"}{"req_id":"b"}  {"req_id":"c"}"#);

    let mut ids = Vec::new();
    while let Some(frame) = codec.decode(&mut buf).expect("decode must succeed") {
        match frame {
            Frame::Body(b) => ids.push(b.req_id),
            Frame::Invalid(reason) => panic!("unexpected invalid frame: {reason}"),
        }
    }

    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn partial_value_is_buffered_until_complete() {
    let mut codec = BodyCodec::new();
    let mut buf = BytesMut::from(r#"{"req_id":"par"#);

    assert_eq!(codec.decode(&mut buf).expect("partial decode"), None);
    assert!(!buf.is_empty(), "partial bytes must stay buffered");

    buf.extend_from_slice(br#"tial"}"#);
    let frame = codec.decode(&mut buf).expect("complete decode");
    assert_eq!(frame, Some(Frame::Body(body(b"", "partial"))));
}

#[test]
fn value_fed_one_byte_at_a_time_decodes_once_complete() {
    let raw = br#"{"data":"aGVsbG8=","req_id":"a}\"b{["} {"req_id":"next"}"#;
    let mut codec = BodyCodec::new();
    let mut buf = BytesMut::new();
    let mut frames = Vec::new();

    for &byte in raw {
        buf.extend_from_slice(&[byte]);
        while let Some(frame) = codec.decode(&mut buf).expect("decode must succeed") {
            frames.push(frame);
        }
    }

    assert_eq!(
        frames,
        vec![
            Frame::Body(body(b"hello", r#"a}"b{["#)),
            Frame::Body(body(b"", "next")),
        ],
        "brackets and escaped quotes inside strings must not end the value"
    );
    assert!(buf.is_empty());
}

#[test]
fn large_value_in_small_chunks_is_framed_exactly() {
    let payload = "x".repeat(256 * 1024);
    let raw = format!(r#"{{"req_id":"{payload}"}}{{"req_id":"tail"}}"#);
    let mut codec = BodyCodec::new();
    let mut buf = BytesMut::new();
    let mut ids = Vec::new();

    for chunk in raw.as_bytes().chunks(8 * 1024) {
        buf.extend_from_slice(chunk);
        while let Some(frame) = codec.decode(&mut buf).expect("decode must succeed") {
            match frame {
                Frame::Body(b) => ids.push(b.req_id.len()),
                Frame::Invalid(reason) => panic!("unexpected invalid frame: {reason}"),
            }
        }
    }

    assert_eq!(ids, vec![payload.len(), 4]);
}

#[test]
fn bare_scalar_is_invalid_and_stream_continues() {
    let mut codec = BodyCodec::new();
    let mut buf = BytesMut::from(r#"true {"req_id":"ok"}"#);

    let first = codec.decode(&mut buf).expect("valid json must not error");
    assert!(matches!(first, Some(Frame::Invalid(_))), "got {first:?}");

    let second = codec.decode(&mut buf).expect("second decode");
    assert_eq!(second, Some(Frame::Body(body(b"", "ok"))));
}

#[test]
fn non_envelope_value_is_invalid_and_stream_continues() {
    let mut codec = BodyCodec::new();
    let mut buf = BytesMut::from(r#"{"data":"%%%not-base64"}{"req_id":"ok"}"#);

    let first = codec.decode(&mut buf).expect("valid json must not error");
    assert!(
        matches!(first, Some(Frame::Invalid(_))),
        "bad base64 must yield an invalid frame, got {first:?}"
    );

    let second = codec.decode(&mut buf).expect("second decode");
    assert_eq!(second, Some(Frame::Body(body(b"", "ok"))));
}

#[test]
fn broken_syntax_is_an_error() {
    let mut codec = BodyCodec::new();
    let mut buf = BytesMut::from(r#"{"req_id": nope}"#);

    let err = codec.decode(&mut buf).expect_err("broken json must fail");
    assert!(
        matches!(err, AppError::Protocol(ref msg) if msg.contains("malformed json")),
        "unexpected error: {err}"
    );
}

#[test]
fn oversized_incomplete_frame_is_rejected() {
    let mut codec = BodyCodec::new();
    let mut buf = BytesMut::with_capacity(MAX_FRAME_BYTES + 32);
    buf.extend_from_slice(br#"{"req_id":""#);
    buf.extend_from_slice(&vec![b'x'; MAX_FRAME_BYTES]);

    let err = codec.decode(&mut buf).expect_err("oversized frame must fail");
    assert!(
        matches!(err, AppError::Protocol(ref msg) if msg.contains("frame too long")),
        "unexpected error: {err}"
    );
}

#[test]
fn eof_ignores_trailing_whitespace() {
    let mut codec = BodyCodec::new();
    let mut buf = BytesMut::from("  \n\t ");

    assert_eq!(codec.decode_eof(&mut buf).expect("whitespace only"), None);
}

#[test]
fn eof_inside_value_is_an_error() {
    let mut codec = BodyCodec::new();
    let mut buf = BytesMut::from(r#"{"req_id":"cut"#);

    let err = codec.decode_eof(&mut buf).expect_err("truncated value must fail");
    assert!(matches!(err, AppError::Protocol(_)));
}

#[tokio::test]
async fn framed_read_yields_bodies_from_a_byte_stream() {
    let raw: &[u8] = b"{\"req_id\":\"1\"}\n{\"req_id\":\"2\"}\n";
    let frames: Vec<_> = FramedRead::new(raw, BodyCodec::new())
        .map(|item| item.expect("frame"))
        .collect()
        .await;

    assert_eq!(
        frames,
        vec![
            Frame::Body(body(b"", "1")),
            Frame::Body(body(b"", "2")),
        ]
    );
}

// ── Encoding ────────────────────────────────────────────────

#[test]
fn encoder_writes_base64_data_without_separator() {
    let mut codec = BodyCodec::new();
    let mut dst = BytesMut::new();

    codec.encode(body(b"hello", "r9"), &mut dst).expect("encode");
    codec.encode(Body::default(), &mut dst).expect("encode empty");

    assert_eq!(&dst[..], br#"{"data":"aGVsbG8=","req_id":"r9"}{}"#);
}
