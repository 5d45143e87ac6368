//! Request dispatcher.
//!
//! Consumes the inbound mailbox one [`Body`] at a time, decodes the embedded
//! [`Request`], runs the matching handler and queues the [`Response`] on the
//! outbound mailbox tagged with the same `req_id`. Requests are handled
//! strictly in arrival order; every handler shares one per-request deadline.

pub mod delete;
pub mod query;
mod update;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::components::ComponentRegistry;
use crate::config::SessionOptions;
use crate::host::{ProcessExit, Rebooter, SystemdProbe};
use crate::models::body::Body;
use crate::models::request::{Method, Request};
use crate::models::response::Response;
use crate::session::mailbox::{Delivery, MailboxSender};
use crate::update::Updater;

use query::with_deadline;

/// External collaborators the dispatcher drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Component lookup for `states`, `events` and `metrics`.
    pub registry: Arc<dyn ComponentRegistry>,
    /// Package and agent updater.
    pub updater: Arc<dyn Updater>,
    /// Detects whether the agent runs under systemd.
    pub systemd: Arc<dyn SystemdProbe>,
    /// Machine reboot.
    pub rebooter: Arc<dyn Rebooter>,
    /// Process termination after a binary-only update.
    pub exit: Arc<dyn ProcessExit>,
}

/// What to do once a handler returns.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// No response is sent.
    Silent,
    /// Queue the response.
    Reply(Response),
    /// Queue the response, then exit the process with the code.
    ReplyThenExit(Response, i32),
}

/// Handles decoded requests and queues their responses.
pub struct Dispatcher {
    deps: Collaborators,
    components: Vec<String>,
    options: SessionOptions,
    outbound: MailboxSender,
}

impl Dispatcher {
    /// Build a dispatcher answering through `outbound`.
    ///
    /// The registry's component names are captured now and used whenever a
    /// request names no components.
    #[must_use]
    pub fn new(deps: Collaborators, options: SessionOptions, outbound: MailboxSender) -> Self {
        let components = deps.registry.names();
        Self {
            deps,
            components,
            options,
            outbound,
        }
    }

    /// Component names captured at construction.
    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Drain `inbound` until it closes or `cancel` fires.
    ///
    /// A request still being handled when `cancel` fires is abandoned.
    pub async fn run(self, mut inbound: mpsc::Receiver<Body>, cancel: CancellationToken) {
        debug!("session dispatch: started");
        loop {
            let body = tokio::select! {
                biased;

                () = cancel.cancelled() => break,

                msg = inbound.recv() => match msg {
                    Some(body) => body,
                    None => break,
                },
            };

            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!("session dispatch: stopped while handling a request");
                    break;
                }

                () = self.handle(body) => {}
            }
        }
        inbound.close();
        debug!("session dispatch: stopped");
    }

    /// Handle one inbound message.
    ///
    /// A message whose payload is not a valid request is logged and dropped
    /// without a response.
    pub async fn handle(&self, body: Body) {
        let request = match body.decode_request() {
            Ok(request) => request,
            Err(err) => {
                warn!(req_id = %body.req_id, %err, "failed to decode request, dropping");
                return;
            }
        };

        let method = request.method;
        let span = info_span!("request", req_id = %body.req_id, method = method.as_str());
        let deadline = Instant::now() + self.options.request_timeout;

        match self.process(&request, deadline).instrument(span).await {
            Outcome::Silent => {}
            Outcome::Reply(response) => {
                self.reply(&body.req_id, method, &response);
            }
            Outcome::ReplyThenExit(response, code) => {
                self.reply_then_exit(&body.req_id, method, &response, code)
                    .await;
            }
        }
    }

    async fn process(&self, request: &Request, deadline: Instant) -> Outcome {
        match request.method {
            Method::Reboot => {
                self.reboot(deadline).await;
                Outcome::Silent
            }
            Method::States => Outcome::Reply(Response {
                states: query::states(self.deps.registry.as_ref(), self.targets(request), deadline)
                    .await,
                ..Response::default()
            }),
            Method::Events => Outcome::Reply(Response {
                events: query::events(
                    self.deps.registry.as_ref(),
                    self.targets(request),
                    request,
                    deadline,
                )
                .await,
                ..Response::default()
            }),
            Method::Metrics => Outcome::Reply(Response {
                metrics: query::metrics(
                    self.deps.registry.as_ref(),
                    self.targets(request),
                    request,
                    deadline,
                )
                .await,
                ..Response::default()
            }),
            Method::Delete => {
                delete::spawn_mark(self.options.package_root.clone());
                Outcome::Reply(Response::ack())
            }
            Method::Update => self.update(request, deadline).await,
            Method::Unknown => {
                warn!("unknown method, sending empty response");
                Outcome::Reply(Response::ack())
            }
        }
    }

    async fn reboot(&self, deadline: Instant) {
        match with_deadline(deadline, self.deps.rebooter.reboot(Duration::ZERO)).await {
            Ok(()) => info!("reboot triggered"),
            Err(err) => error!(%err, "failed to trigger reboot machine"),
        }
    }

    fn targets<'a>(&'a self, request: &'a Request) -> &'a [String] {
        if request.components.is_empty() {
            &self.components
        } else {
            &request.components
        }
    }

    /// Queue `response`, waiting up to the request timeout for room, and exit
    /// only once it is queued.
    async fn reply_then_exit(&self, req_id: &str, method: Method, response: &Response, code: i32) {
        let body = match Body::from_response(req_id, response) {
            Ok(body) => body,
            Err(err) => {
                error!(req_id, method = method.as_str(), %err, "failed to marshal response, not exiting");
                return;
            }
        };

        match self
            .outbound
            .deliver_within(body, self.options.request_timeout)
            .await
        {
            Delivery::Delivered => {
                info!(req_id, exit_code = code, "exiting for auto update");
                self.deps.exit.exit(code);
            }
            delivery => error!(
                req_id,
                ?delivery,
                "update response not queued, skipping exit"
            ),
        }
    }

    fn reply(&self, req_id: &str, method: Method, response: &Response) -> Delivery {
        let body = match Body::from_response(req_id, response) {
            Ok(body) => body,
            Err(err) => {
                error!(req_id, method = method.as_str(), %err, "failed to marshal response");
                return Delivery::Dropped;
            }
        };

        let delivery = self.outbound.try_deliver(body);
        if delivery == Delivery::Delivered {
            debug!(req_id, method = method.as_str(), "response queued");
        }
        delivery
    }
}
