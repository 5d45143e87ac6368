//! Keepalive supervisor.
//!
//! Runs one generation at a time: start a reader leg and a writer leg, wait
//! until both have exited, then wait for the next reconnect tick and start a
//! fresh pair. Exits once the session root token is cancelled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::generation::{Generation, GenerationState};
use super::mailbox::MailboxSender;
use super::reader::run_reader;
use super::transport::ControlPlaneClient;
use super::writer::run_writer;
use crate::models::body::Body;

/// Supervisor owning everything a generation needs.
///
/// The outbound receiver lives here rather than in the writer leg so that
/// queued responses survive a reconnect.
pub(crate) struct Keepalive {
    pub(crate) client: ControlPlaneClient,
    pub(crate) inbound: MailboxSender,
    pub(crate) outbound: mpsc::Receiver<Body>,
    pub(crate) reconnect_interval: Duration,
    pub(crate) read_idle_timeout: Duration,
    pub(crate) state: watch::Sender<GenerationState>,
    pub(crate) generations: Arc<AtomicU64>,
    pub(crate) root: CancellationToken,
}

impl Keepalive {
    /// Supervise generations until the root token is cancelled.
    pub(crate) async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.reconnect_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = self.root.cancelled() => {
                    debug!("session keepalive: closing keep alive");
                    break;
                }

                _ = ticker.tick() => {}
            }

            let id = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
            let generation = Generation::begin(id, &self.root, &self.state);
            info!(generation = id, "session keepalive: starting new session generation");

            tokio::join!(
                run_reader(
                    &self.client,
                    &generation,
                    &self.inbound,
                    self.read_idle_timeout
                ),
                run_writer(&self.client, &generation, &mut self.outbound),
            );

            generation.finish();
            debug!(generation = id, "session keepalive: reader and writer exited");
        }

        self.outbound.close();
        self.state.send_replace(GenerationState::Idle);
        info!(
            generations = self.generations.load(Ordering::SeqCst),
            "session keepalive: stopped"
        );
    }
}
