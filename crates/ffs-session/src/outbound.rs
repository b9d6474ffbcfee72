//! Outbound: one queued payload transmission and its completion handle.
//!
//! The writer pump holds the [`PendingOutbound`]; the caller holds the
//! [`Outbound`]. State lives in a watch cell so any number of callers can
//! snapshot it or wait for the terminal state. The first terminal state wins;
//! a pending outbound dropped before resolution resolves `LocalFail`.

use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use ffs_core::wire::MAX_PAYLOAD;

use crate::session::SessionError;

/// Lifecycle of a queued transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundState {
    /// Waiting in the outbound queue.
    InQueue,
    /// Picked up by the writer, being framed and written.
    InDelivery,
    /// Written, waiting for the device's verdict.
    SentWaiting,
    /// Acknowledged by the device.
    SentAck,
    /// Rejected by the device.
    SentFailErr,
    /// The device asked for a resend; the writer will send it again.
    SentFailRetry,
    /// Failed for a local reason (shutdown mid-delivery, channel I/O error).
    LocalFail,
}

impl OutboundState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OutboundState::SentAck | OutboundState::SentFailErr | OutboundState::LocalFail
        )
    }
}

/// Caller-side handle for a queued transmission.
#[derive(Debug, Clone)]
pub struct Outbound {
    session_id: u16,
    state: watch::Receiver<OutboundState>,
}

impl Outbound {
    pub fn session_id(&self) -> u16 {
        self.session_id
    }

    /// Current state, without waiting.
    pub fn state(&self) -> OutboundState {
        *self.state.borrow()
    }

    /// Wait until the writer has processed this transmission and return the
    /// terminal state.
    pub async fn block_until(&self) -> OutboundState {
        let mut rx = self.state.clone();
        let state = match rx.wait_for(|s| s.is_terminal()).await {
            Ok(s) => *s,
            Err(_) => OutboundState::LocalFail,
        };
        state
    }

    /// Wait until the state is `target` or terminal, whichever comes first.
    pub async fn wait_for_state(&self, target: OutboundState) -> OutboundState {
        let mut rx = self.state.clone();
        let state = match rx.wait_for(|s| *s == target || s.is_terminal()).await {
            Ok(s) => *s,
            Err(_) => OutboundState::LocalFail,
        };
        state
    }
}

/// Writer-side half of a queued transmission.
#[derive(Debug)]
pub(crate) struct PendingOutbound {
    pub(crate) session_id: u16,
    pub(crate) payload: Bytes,
    state: watch::Sender<OutboundState>,
}

impl PendingOutbound {
    pub(crate) fn new(session_id: u16, payload: Bytes) -> Result<(Self, Outbound), SessionError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(SessionError::TooMuchData(payload.len()));
        }
        let (tx, rx) = watch::channel(OutboundState::InQueue);
        let handle = Outbound {
            session_id,
            state: rx,
        };
        Ok((
            Self {
                session_id,
                payload,
                state: tx,
            },
            handle,
        ))
    }

    pub(crate) fn state(&self) -> OutboundState {
        *self.state.borrow()
    }

    /// Move through a non-terminal state. Ignored once resolved.
    pub(crate) fn set_state(&self, next: OutboundState) {
        debug_assert!(!next.is_terminal());
        self.state.send_if_modified(|s| {
            if s.is_terminal() || *s == next {
                return false;
            }
            *s = next;
            true
        });
    }

    /// Settle on a terminal state. Returns false if already resolved.
    pub(crate) fn resolve(&self, terminal: OutboundState) -> bool {
        debug_assert!(terminal.is_terminal());
        self.state.send_if_modified(|s| {
            if s.is_terminal() {
                return false;
            }
            *s = terminal;
            true
        })
    }
}

impl Drop for PendingOutbound {
    fn drop(&mut self) {
        self.resolve(OutboundState::LocalFail);
    }
}

/// The shared outbound queue. Every session writes into it; only the writer
/// pump reads from it.
#[derive(Debug, Clone)]
pub(crate) struct OutboundQueue {
    tx: mpsc::UnboundedSender<PendingOutbound>,
}

impl OutboundQueue {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<PendingOutbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue `payload` for `session_id`. If the writer is gone the returned
    /// handle is already `LocalFail`.
    pub(crate) fn queue(&self, session_id: u16, payload: Bytes) -> Result<Outbound, SessionError> {
        let (pending, handle) = PendingOutbound::new(session_id, payload)?;
        if self.tx.send(pending).is_err() {
            tracing::debug!(session_id, "outbound queue closed, transmission rejected");
        }
        Ok(handle)
    }
}
