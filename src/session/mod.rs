//! Outbound persistent command session.
//!
//! A [`Session`] keeps a bidirectional message channel open to the control
//! plane over two long-lived HTTP `POST` requests:
//!
//! - the **reader** leg (`session_type: read`) streams requests from the
//!   control plane into the inbound mailbox,
//! - the **writer** leg (`session_type: write`) streams responses from the
//!   outbound mailbox to the control plane.
//!
//! The two legs of one connection form a *generation*. The keepalive
//! supervisor runs exactly one generation at a time and starts a fresh one
//! every time both legs have exited. The dispatcher consumes the inbound
//! mailbox and answers each request through the outbound mailbox.
//!
//! # Shutdown
//!
//! [`Session::stop`] cancels the session root token. The live generation's
//! closer is a child of that token, so both legs, the supervisor and the
//! dispatcher all wind down; the mailbox owners then close their receivers.

pub mod codec;
pub mod generation;
mod keepalive;
pub mod mailbox;
mod reader;
pub mod transport;
pub mod watchdog;
mod writer;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::config::SessionOptions;
use crate::dispatch::{Collaborators, Dispatcher};
use crate::{AppError, Result};

pub use generation::GenerationState;
use keepalive::Keepalive;
use mailbox::{mailbox, MAILBOX_CAPACITY};
use transport::ControlPlaneClient;

/// Handle to a running session.
///
/// Dropping the handle stops the session.
pub struct Session {
    root: CancellationToken,
    state: watch::Receiver<GenerationState>,
    generations: Arc<AtomicU64>,
    inbound_dropped: Arc<AtomicU64>,
    outbound_dropped: Arc<AtomicU64>,
    keepalive: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Session {
    /// Validate `options`, then start the keepalive supervisor and the
    /// dispatcher in the background. Never blocks on the network: the first
    /// connection attempt happens on the supervisor task.
    ///
    /// The session stops when `parent` is cancelled or [`Session::stop`] is
    /// called.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the options are inconsistent, the
    /// endpoint is not a valid URL, or no Tokio runtime is running. No task
    /// is started in that case.
    pub fn start(
        parent: &CancellationToken,
        endpoint: &str,
        options: SessionOptions,
        collaborators: Collaborators,
    ) -> Result<Self> {
        options.validate()?;
        let client = ControlPlaneClient::new(endpoint, &options)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| AppError::Config(format!("session requires a tokio runtime: {err}")))?;

        let root = parent.child_token();
        let (inbound_tx, inbound_rx) = mailbox("inbound", MAILBOX_CAPACITY);
        let (outbound_tx, outbound_rx) = mailbox("outbound", MAILBOX_CAPACITY);
        let inbound_dropped = inbound_tx.drop_counter();
        let outbound_dropped = outbound_tx.drop_counter();
        let (state_tx, state_rx) = watch::channel(GenerationState::Idle);
        let generations = Arc::new(AtomicU64::new(0));

        let dispatcher = Dispatcher::new(collaborators, options.clone(), outbound_tx);

        let supervisor = Keepalive {
            client,
            inbound: inbound_tx,
            outbound: outbound_rx,
            reconnect_interval: options.reconnect_interval,
            read_idle_timeout: options.read_idle_timeout,
            state: state_tx,
            generations: Arc::clone(&generations),
            root: root.clone(),
        };

        let keepalive = runtime.spawn(supervisor.run().instrument(info_span!(
            "session_keepalive",
            machine_id = %options.machine_id,
            endpoint = %endpoint,
        )));
        let dispatcher = runtime.spawn(
            dispatcher
                .run(inbound_rx, root.clone())
                .instrument(info_span!("session_dispatch", machine_id = %options.machine_id)),
        );

        info!(machine_id = %options.machine_id, endpoint, "session started");

        Ok(Self {
            root,
            state: state_rx,
            generations,
            inbound_dropped,
            outbound_dropped,
            keepalive: Some(keepalive),
            dispatcher: Some(dispatcher),
        })
    }

    /// Stop the session. Safe to call more than once.
    pub fn stop(&self) {
        if self.root.is_cancelled() {
            return;
        }
        debug!("closing session");
        self.root.cancel();
    }

    /// Whether the session has been stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Stop the session and wait for its background tasks to exit.
    pub async fn join(mut self) {
        self.stop();
        for (task, handle) in [
            ("keepalive", self.keepalive.take()),
            ("dispatcher", self.dispatcher.take()),
        ] {
            if let Some(handle) = handle {
                if let Err(err) = handle.await {
                    error!(task, %err, "session task failed");
                }
            }
        }
        debug!("session joined");
    }

    /// Number of generations started so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generations.load(Ordering::SeqCst)
    }

    /// Current generation phase.
    #[must_use]
    pub fn state(&self) -> GenerationState {
        *self.state.borrow()
    }

    /// Receiver notified on every generation phase change.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<GenerationState> {
        self.state.clone()
    }

    /// Requests dropped because the inbound mailbox was full.
    #[must_use]
    pub fn inbound_dropped(&self) -> u64 {
        self.inbound_dropped.load(Ordering::Relaxed)
    }

    /// Responses dropped because the outbound mailbox was full.
    #[must_use]
    pub fn outbound_dropped(&self) -> u64 {
        self.outbound_dropped.load(Ordering::Relaxed)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
