//! Writer leg.
//!
//! Opens one long-lived `POST` marked `session_type: write` whose body is the
//! read half of an in-process pipe. A companion future drains the outbound
//! mailbox, marshals each [`Body`] to JSON and writes it into the pipe.
//!
//! When the HTTP round trip returns (peer close, network error) or the
//! generation closer fires, the leg fires the closer itself, waits for the
//! pipe feeder to finish and then reports exit. Failures are never retried
//! here; the keepalive supervisor starts the next generation.

use bytes::BytesMut;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio_util::codec::Encoder;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::codec::BodyCodec;
use super::generation::Generation;
use super::transport::{ControlPlaneClient, SessionType};
use crate::models::body::Body;

/// In-process pipe buffer between the feeder and the request body.
const PIPE_BUFFER_BYTES: usize = 64 * 1024;

/// Run one writer leg for `generation`, draining `outbound`.
///
/// `outbound` is borrowed so the mailbox outlives the generation.
pub(crate) async fn run_writer(
    client: &ControlPlaneClient,
    generation: &Generation<'_>,
    outbound: &mut mpsc::Receiver<Body>,
) {
    let id = generation.id();
    let closer = generation.closer();
    let (pipe_writer, pipe_reader) = tokio::io::duplex(PIPE_BUFFER_BYTES);
    let body = reqwest::Body::wrap_stream(ReaderStream::new(pipe_reader));

    let request = async {
        tokio::select! {
            biased;

            () = closer.cancelled() => {
                debug!(generation = id, "session writer: generation closed, aborting request");
            }

            result = client.open(SessionType::Write, body) => match result {
                Ok(response) => debug!(
                    generation = id,
                    status = %response.status(),
                    "session writer: http closed"
                ),
                Err(err) => debug!(generation = id, error = %err, "session writer: error making request"),
            }
        }
        generation.close("writer");
    };

    tokio::join!(request, feed_pipe(id, outbound, pipe_writer, closer));
    debug!(generation = id, "session writer: exited");
}

/// Move outbound messages into the pipe until the closer fires, the pipe
/// breaks or the mailbox closes.
async fn feed_pipe(
    generation: u64,
    outbound: &mut mpsc::Receiver<Body>,
    mut pipe: DuplexStream,
    closer: &CancellationToken,
) {
    debug!(generation, "session writer: pipe handler started");
    let mut codec = BodyCodec::new();
    let mut buf = BytesMut::new();

    loop {
        let body = tokio::select! {
            biased;

            () = closer.cancelled() => {
                debug!(generation, "session writer: generation closed, closing pipe handler");
                break;
            }

            msg = outbound.recv() => match msg {
                Some(body) => body,
                None => {
                    debug!(generation, "session writer: outbound mailbox closed, closing pipe handler");
                    break;
                }
            },
        };

        let req_id = body.req_id.clone();
        buf.clear();
        if let Err(err) = codec.encode(body, &mut buf) {
            error!(generation, req_id, error = %err, "session writer: failed to marshal body");
            continue;
        }

        let written = tokio::select! {
            biased;
            () = closer.cancelled() => None,
            result = pipe.write_all(&buf) => Some(result),
        };

        match written {
            Some(Ok(())) => debug!(generation, req_id, "session writer: body written to pipe"),
            Some(Err(err)) => {
                warn!(generation, req_id, error = %err, "session writer: failed to write to pipe");
                break;
            }
            None => {
                debug!(generation, req_id, "session writer: generation closed mid-write, message lost");
                break;
            }
        }
    }

    // EOF for the request body; fails harmlessly when the request is gone.
    let _ = pipe.shutdown().await;
}
