//! Generation state machine.
//!
//! A generation is one reader leg plus one writer leg sharing a closer. The
//! keepalive supervisor drives it through
//! `Idle → Connecting → Streaming → Closing → Idle`; either leg may move it to
//! `Closing`, only the supervisor returns it to `Idle` once both legs exited.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Observable phase of the current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    /// No legs running; waiting for the next reconnect tick.
    Idle,
    /// Legs started; inbound stream not yet accepted by the control plane.
    Connecting,
    /// Inbound stream accepted; messages flowing.
    Streaming,
    /// Closer fired; waiting for both legs to exit.
    Closing,
}

/// One live reader/writer pair.
pub(crate) struct Generation<'a> {
    id: u64,
    closer: CancellationToken,
    state: &'a watch::Sender<GenerationState>,
}

impl<'a> Generation<'a> {
    /// Start generation `id` with a fresh closer derived from `root`.
    ///
    /// The closer is a child of `root`, so cancelling the session also closes
    /// the live generation.
    pub(crate) fn begin(
        id: u64,
        root: &CancellationToken,
        state: &'a watch::Sender<GenerationState>,
    ) -> Self {
        state.send_replace(GenerationState::Connecting);
        Self {
            id,
            closer: root.child_token(),
            state,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Shared stop signal of this generation.
    pub(crate) fn closer(&self) -> &CancellationToken {
        &self.closer
    }

    /// Record that the inbound stream was accepted.
    pub(crate) fn mark_streaming(&self) {
        self.state.send_if_modified(|s| {
            if *s == GenerationState::Connecting {
                *s = GenerationState::Streaming;
                true
            } else {
                false
            }
        });
    }

    /// Fire the closer; idempotent.
    pub(crate) fn close(&self, leg: &'static str) {
        if !self.closer.is_cancelled() {
            debug!(generation = self.id, leg, "session generation: closing");
        }
        self.closer.cancel();
        self.state.send_if_modified(|s| {
            if matches!(*s, GenerationState::Connecting | GenerationState::Streaming) {
                *s = GenerationState::Closing;
                true
            } else {
                false
            }
        });
    }

    /// Mark the generation finished after both legs exited.
    pub(crate) fn finish(self) {
        self.closer.cancel();
        self.state.send_replace(GenerationState::Idle);
    }
}
