//! Reader leg.
//!
//! Opens one long-lived `POST` marked `session_type: read` with an empty
//! body, then decodes the response body as a stream of [`Body`] values and
//! forwards each one to the inbound mailbox without waiting. A staleness
//! [`Watchdog`] runs alongside the decode loop.
//!
//! The leg ends on any of:
//! - request failure or a non-200 status,
//! - end of stream or broken JSON syntax,
//! - the watchdog reporting the stream stale,
//! - the generation closer firing (writer exited or session stopped).
//!
//! On exit it fires the generation closer so the paired writer tears down
//! too, and the response body is dropped before the leg reports exit.
//!
//! [`Body`]: crate::models::body::Body

use std::time::Duration;

use futures_util::{StreamExt, TryStreamExt};
use reqwest::StatusCode;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::codec::{BodyCodec, Frame};
use super::generation::Generation;
use super::mailbox::{Delivery, MailboxSender};
use super::transport::{ControlPlaneClient, SessionType};
use super::watchdog::{Activity, Watchdog, WatchdogExit};

/// Run one reader leg for `generation`.
pub(crate) async fn run_reader(
    client: &ControlPlaneClient,
    generation: &Generation<'_>,
    inbound: &MailboxSender,
    read_idle_timeout: Duration,
) {
    let id = generation.id();
    let closer = generation.closer();

    let opened = tokio::select! {
        biased;

        () = closer.cancelled() => {
            debug!(generation = id, "session reader: generation closed before stream opened");
            generation.close("reader");
            return;
        }

        result = client.open(SessionType::Read, reqwest::Body::from(Vec::new())) => result,
    };

    let response = match opened {
        Ok(response) => response,
        Err(err) => {
            debug!(generation = id, error = %err, "session reader: error making request, retrying");
            generation.close("reader");
            return;
        }
    };

    if response.status() != StatusCode::OK {
        debug!(
            generation = id,
            status = %response.status(),
            "session reader: request resp not ok, retrying"
        );
        generation.close("reader");
        return;
    }

    generation.mark_streaming();
    debug!(generation = id, "session reader: stream opened");

    let stale = closer.child_token();
    let (activity, activity_watch) = Activity::channel();
    let watchdog = Watchdog::new(read_idle_timeout);

    let decode = async {
        decode_stream(id, response, inbound, &activity, &stale).await;
        generation.close("reader");
    };
    let guard = async {
        if watchdog.run(activity_watch, &stale).await == WatchdogExit::Stale {
            stale.cancel();
        }
    };

    tokio::join!(decode, guard);
    debug!(generation = id, "session reader: exited");
}

/// Decode `response` into the inbound mailbox until the stream ends or
/// `stop` fires. The response body is dropped on return.
async fn decode_stream(
    generation: u64,
    response: reqwest::Response,
    inbound: &MailboxSender,
    activity: &Activity,
    stop: &CancellationToken,
) {
    let bytes = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
    let mut framed = FramedRead::new(StreamReader::new(bytes), BodyCodec::new());

    loop {
        tokio::select! {
            biased;

            () = stop.cancelled() => {
                debug!(generation, "session reader: closing stream");
                break;
            }

            item = framed.next() => {
                match item {
                    None => {
                        debug!(generation, "session reader: stream closed by control plane");
                        break;
                    }

                    Some(Err(err)) => {
                        warn!(generation, error = %err, "session reader: error decoding response");
                        break;
                    }

                    Some(Ok(Frame::Invalid(reason))) => {
                        activity.touch();
                        warn!(
                            generation,
                            error = reason.as_str(),
                            "session reader: invalid envelope, dropping message"
                        );
                    }

                    Some(Ok(Frame::Body(body))) => {
                        activity.touch();
                        let req_id = body.req_id.clone();
                        match inbound.try_deliver(body) {
                            Delivery::Delivered => {
                                debug!(generation, req_id, "session reader: request received");
                            }
                            // Already logged and counted by the mailbox.
                            Delivery::Dropped => {}
                            Delivery::Closed => {
                                debug!(generation, "session reader: inbound mailbox closed, stopping");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }
}
