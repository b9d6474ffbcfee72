//! Session manager: owns the session table, the outbound queue, and the
//! three tasks bound to one channel pair.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use ffs_core::config::TimingConfig;
use ffs_core::wire::CONTROL_SESSION_ID;
use ffs_core::Endpoint;

use crate::channel::{ReadChannel, WriteChannel};
use crate::control::{ControlSession, ControlWorker};
use crate::outbound::{Outbound, OutboundQueue};
use crate::presession::PreSession;
use crate::reader::Reader;
use crate::session::{Session, SessionError, SessionTable};
use crate::writer::Writer;

/// Back-off and retry knobs shared by the pumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpTiming {
    /// Pause between polls of an idle read channel and between status polls.
    pub poll_interval: Duration,
    /// Pause before resending a frame the device asked to retry.
    pub retry_backoff: Duration,
    /// Consecutive "wait" statuses before a frame is resent.
    pub max_status_waits: u32,
    /// The first nonce used is the one after this.
    pub nonce_seed: u8,
}

impl Default for PumpTiming {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for PumpTiming {
    fn from(config: &TimingConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            retry_backoff: config.retry_backoff(),
            max_status_waits: config.max_status_waits.max(1),
            nonce_seed: config.nonce_seed,
        }
    }
}

/// Entry point for opening and using sessions over one channel pair.
///
/// Must be created inside a tokio runtime. The pumps stop when the manager
/// is shut down or dropped; queued writes and pending session requests then
/// resolve `LocalFail` and session reads return [`SessionError::Closed`] once
/// drained.
pub struct SessionManager {
    sessions: SessionTable,
    outbound: OutboundQueue,
    control: ControlSession,
    shutdown: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionManager {
    pub fn new<R: ReadChannel, W: WriteChannel>(read: R, write: W) -> Self {
        Self::with_timing(read, write, PumpTiming::default())
    }

    pub fn with_timing<R: ReadChannel, W: WriteChannel>(
        read: R,
        write: W,
        timing: PumpTiming,
    ) -> Self {
        let (outbound, outbound_rx) = OutboundQueue::new();
        let control_session = Session::new(CONTROL_SESSION_ID, outbound.clone());
        let sessions = SessionTable::with_control(control_session.clone());
        let (shutdown, _) = broadcast::channel(1);
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();

        let writer_task = tokio::spawn(
            Writer::new(write, outbound_rx, timing, shutdown.subscribe()).run(),
        );
        let reader_task = tokio::spawn(
            Reader::new(read, sessions.clone(), timing, shutdown.subscribe()).run(),
        );
        let control_task = tokio::spawn(
            ControlWorker::new(
                control_session,
                requests_rx,
                sessions.clone(),
                outbound.clone(),
                shutdown.subscribe(),
            )
            .run(),
        );

        tracing::info!(
            poll_interval_ms = timing.poll_interval.as_millis() as u64,
            retry_backoff_ms = timing.retry_backoff.as_millis() as u64,
            "session manager started"
        );

        Self {
            sessions,
            outbound,
            control: ControlSession::new(requests_tx),
            shutdown,
            tasks: vec![writer_task, reader_task, control_task],
        }
    }

    /// Ask the device to open a session with `endpoint`.
    pub fn new_session(&self, endpoint: Endpoint) -> PreSession {
        self.control.request_session(endpoint)
    }

    pub fn control(&self) -> &ControlSession {
        &self.control
    }

    /// Queue a raw payload for `session_id`.
    pub fn queue_outbound(
        &self,
        session_id: u16,
        payload: impl Into<Bytes>,
    ) -> Result<Outbound, SessionError> {
        self.outbound.queue(session_id, payload.into())
    }

    /// Register a session under an id the device has already assigned.
    pub fn add_session(&self, id: u16) -> Result<Session, SessionError> {
        let session = Session::new(id, self.outbound.clone());
        self.sessions.insert(id, session.clone())?;
        tracing::debug!(session_id = id, "session registered");
        Ok(session)
    }

    /// An open session by id. Session 0 belongs to the control worker and is
    /// never handed out.
    pub fn session(&self, id: u16) -> Option<Session> {
        if id == CONTROL_SESSION_ID {
            return None;
        }
        self.sessions.get(id)
    }

    /// Ids of all open sessions, 0 included.
    pub fn session_ids(&self) -> Vec<u16> {
        self.sessions.ids()
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Stop the pumps and wait for them to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!("session task failed: {e}");
            }
        }
        self.sessions.close_all();
        tracing::info!("session manager stopped");
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            let _ = self.shutdown.send(());
            self.sessions.close_all();
        }
    }
}
