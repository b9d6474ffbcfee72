//! PreSession: an in-flight request to open a session with an endpoint.
//!
//! Resolved exactly once by the control worker. Same watch-cell shape as
//! [`Outbound`](crate::Outbound): first terminal state wins, and a request
//! dropped before resolution resolves `LocalFail`.

use tokio::sync::watch;

use ffs_core::Endpoint;

use crate::session::Session;

/// Lifecycle of a session-open request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreSessionState {
    InQueue,
    InNegotiation,
    /// The device opened the session.
    Ok,
    /// The device did not accept the request.
    Fail,
    /// The request failed locally (malformed reply, shutdown).
    LocalFail,
}

impl PreSessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PreSessionState::Ok | PreSessionState::Fail | PreSessionState::LocalFail
        )
    }
}

#[derive(Debug, Clone)]
struct Slot {
    state: PreSessionState,
    session: Option<Session>,
}

/// Caller-side handle for a session-open request.
#[derive(Debug, Clone)]
pub struct PreSession {
    endpoint: Endpoint,
    slot: watch::Receiver<Slot>,
}

impl PreSession {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> PreSessionState {
        self.slot.borrow().state
    }

    /// Wait for the request to be serviced. `Some` only when the state is
    /// `Ok`; check [`state`](Self::state) for why it failed otherwise.
    pub async fn get_session(&self) -> Option<Session> {
        let mut rx = self.slot.clone();
        let session = match rx.wait_for(|slot| slot.state.is_terminal()).await {
            Ok(slot) => slot.session.clone(),
            Err(_) => None,
        };
        session
    }
}

/// Control-worker half of a session-open request.
#[derive(Debug)]
pub(crate) struct PendingPreSession {
    pub(crate) endpoint: Endpoint,
    slot: watch::Sender<Slot>,
}

impl PendingPreSession {
    pub(crate) fn new(endpoint: Endpoint) -> (Self, PreSession) {
        let (tx, rx) = watch::channel(Slot {
            state: PreSessionState::InQueue,
            session: None,
        });
        (
            Self { endpoint, slot: tx },
            PreSession { endpoint, slot: rx },
        )
    }

    pub(crate) fn begin_negotiation(&self) {
        self.slot.send_if_modified(|slot| {
            if slot.state != PreSessionState::InQueue {
                return false;
            }
            slot.state = PreSessionState::InNegotiation;
            true
        });
    }

    pub(crate) fn succeed(&self, session: Session) -> bool {
        self.settle(PreSessionState::Ok, Some(session))
    }

    pub(crate) fn fail(&self, state: PreSessionState) -> bool {
        debug_assert!(matches!(state, PreSessionState::Fail | PreSessionState::LocalFail));
        self.settle(state, None)
    }

    fn settle(&self, state: PreSessionState, session: Option<Session>) -> bool {
        self.slot.send_if_modified(|slot| {
            if slot.state.is_terminal() {
                return false;
            }
            *slot = Slot { state, session };
            true
        })
    }
}

impl Drop for PendingPreSession {
    fn drop(&mut self) {
        self.fail(PreSessionState::LocalFail);
    }
}
