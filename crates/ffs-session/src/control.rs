//! Control session: negotiates new sessions over session 0.
//!
//! Requests are serviced strictly one at a time: the connect request is
//! written and acknowledged, then the device's reply is read from session 0's
//! inbox. Replies are matched to requests by order alone, so a second
//! request is never on the wire before the first has its answer.

use tokio::sync::{broadcast, mpsc};

use ffs_core::codec::{from_bytes, to_bytes, CodecError};
use ffs_core::wire::{ConnectRequest, ConnectResponse};
use ffs_core::Endpoint;

use crate::outbound::{OutboundQueue, OutboundState};
use crate::presession::{PendingPreSession, PreSession, PreSessionState};
use crate::session::{Session, SessionError, SessionTable};

/// Handle for queueing session-open requests.
///
/// Session 0 itself stays private to the control worker: replies are matched
/// to requests by order, so any other reader would steal one.
#[derive(Debug, Clone)]
pub struct ControlSession {
    requests: mpsc::UnboundedSender<PendingPreSession>,
}

impl ControlSession {
    pub(crate) fn new(requests: mpsc::UnboundedSender<PendingPreSession>) -> Self {
        Self { requests }
    }

    /// Queue a request to open a session with `endpoint`. Returns at once;
    /// wait on the [`PreSession`] for the outcome.
    pub fn request_session(&self, endpoint: Endpoint) -> PreSession {
        let (pending, handle) = PendingPreSession::new(endpoint);
        if self.requests.send(pending).is_err() {
            tracing::debug!(%endpoint, "control worker gone, session request rejected");
        }
        handle
    }
}

#[derive(Debug, thiserror::Error)]
enum NegotiateError {
    #[error("connect request not acknowledged ({0:?})")]
    NotAcknowledged(OutboundState),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("malformed control message: {0}")]
    Codec(#[from] CodecError),
}

impl NegotiateError {
    fn outcome(&self) -> PreSessionState {
        match self {
            NegotiateError::NotAcknowledged(_) => PreSessionState::Fail,
            NegotiateError::Session(SessionError::IdInUse(_)) => PreSessionState::Fail,
            NegotiateError::Session(_) | NegotiateError::Codec(_) => PreSessionState::LocalFail,
        }
    }
}

pub(crate) struct ControlWorker {
    session: Session,
    requests: mpsc::UnboundedReceiver<PendingPreSession>,
    sessions: SessionTable,
    outbound: OutboundQueue,
    shutdown: broadcast::Receiver<()>,
}

impl ControlWorker {
    pub(crate) fn new(
        session: Session,
        requests: mpsc::UnboundedReceiver<PendingPreSession>,
        sessions: SessionTable,
        outbound: OutboundQueue,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            session,
            requests,
            sessions,
            outbound,
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let request = tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("control worker shutting down");
                    return;
                }
                next = self.requests.recv() => match next {
                    Some(request) => request,
                    None => {
                        tracing::info!("request queue closed, control worker exiting");
                        return;
                    }
                },
            };

            let endpoint = request.endpoint;
            request.begin_negotiation();

            // Dropping the request on shutdown resolves it LocalFail. Shutdown
            // is checked first: the writer fails the in-flight connect write on
            // the same signal, which must not read as a refusal.
            let result = tokio::select! {
                biased;
                _ = self.shutdown.recv() => {
                    tracing::info!(%endpoint, "control worker shutting down mid-negotiation");
                    return;
                }
                result = negotiate(&self.session, &self.sessions, &self.outbound, endpoint) => result,
            };

            match result {
                Ok(session) => {
                    tracing::info!(%endpoint, session_id = session.id(), "session opened");
                    request.succeed(session);
                }
                Err(e) => {
                    tracing::warn!(%endpoint, "session negotiation failed: {e}");
                    request.fail(e.outcome());
                }
            }
        }
    }
}

async fn negotiate(
    control: &Session,
    sessions: &SessionTable,
    outbound: &OutboundQueue,
    endpoint: Endpoint,
) -> Result<Session, NegotiateError> {
    let request = to_bytes(&ConnectRequest { endpoint })?;
    let state = control.write_blocking(request).await?;
    if state != OutboundState::SentAck {
        return Err(NegotiateError::NotAcknowledged(state));
    }

    let reply = control.read().await?;
    let ConnectResponse { session_id } = from_bytes(&reply)?;
    tracing::debug!(%endpoint, session_id, "device assigned session");

    let session = Session::new(session_id, outbound.clone());
    sessions.insert(session_id, session.clone())?;
    Ok(session)
}
