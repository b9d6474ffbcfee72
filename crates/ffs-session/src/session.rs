//! Sessions: logical message streams multiplexed over the channel pair.
//!
//! [`Inbox`] is the primitive every session shares: a FIFO of inbound
//! payloads fed by the reader pump and drained by application code.
//! [`Session`] adds the write side, which goes through the shared outbound
//! queue and the writer pump.

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;

use ffs_core::wire::MAX_PAYLOAD;

use crate::outbound::{Outbound, OutboundQueue, OutboundState};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("payload of {0} bytes exceeds the {MAX_PAYLOAD}-byte packet payload")]
    TooMuchData(usize),

    #[error("session is closed")]
    Closed,

    #[error("session id {0} is already in use")]
    IdInUse(u16),
}

// ── Inbox ─────────────────────────────────────────────────────────────────────

/// Inbound payload queue for one session.
#[derive(Debug)]
pub struct Inbox {
    tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Bytes>>,
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Inbox {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Enqueue a payload. Never blocks; returns false only once closed.
    pub(crate) fn incoming_data(&self, payload: Bytes) -> bool {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match tx.as_ref() {
            Some(tx) => tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Next payload in arrival order, waiting until one is available.
    /// Payloads queued before [`close`](Self::close) are still returned.
    pub async fn read(&self) -> Result<Bytes, SessionError> {
        self.rx.lock().await.recv().await.ok_or(SessionError::Closed)
    }

    pub(crate) fn close(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// An open session. Cheap to clone; clones share the same inbox.
#[derive(Debug, Clone)]
pub struct Session {
    id: u16,
    inbox: Arc<Inbox>,
    outbound: OutboundQueue,
}

impl Session {
    pub(crate) fn new(id: u16, outbound: OutboundQueue) -> Self {
        Self {
            id,
            inbox: Arc::new(Inbox::new()),
            outbound,
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// Queue `payload` for delivery and return its handle immediately.
    pub fn write(&self, payload: impl Into<Bytes>) -> Result<Outbound, SessionError> {
        self.outbound.queue(self.id, payload.into())
    }

    /// Queue `payload` and wait for its terminal state.
    pub async fn write_blocking(
        &self,
        payload: impl Into<Bytes>,
    ) -> Result<OutboundState, SessionError> {
        let outbound = self.write(payload)?;
        Ok(outbound.block_until().await)
    }

    /// Next inbound payload (full packet payload, zero-padded).
    pub async fn read(&self) -> Result<Bytes, SessionError> {
        self.inbox.read().await
    }

    pub(crate) fn incoming_data(&self, payload: Bytes) -> bool {
        self.inbox.incoming_data(payload)
    }

    pub(crate) fn close(&self) {
        self.inbox.close();
    }
}

// ── Session table ─────────────────────────────────────────────────────────────

/// Session id → session, shared by the reader pump, the control worker and
/// the manager.
#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    inner: Arc<DashMap<u16, Session>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding only `control` under its own id.
    pub(crate) fn with_control(control: Session) -> Self {
        let table = Self::new();
        table.inner.insert(control.id(), control);
        table
    }

    /// Register `session` under `id`. An id maps to at most one session.
    pub(crate) fn insert(&self, id: u16, session: Session) -> Result<(), SessionError> {
        match self.inner.entry(id) {
            Entry::Occupied(_) => Err(SessionError::IdInUse(id)),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    pub(crate) fn get(&self, id: u16) -> Option<Session> {
        self.inner.get(&id).map(|s| s.value().clone())
    }

    pub fn contains(&self, id: u16) -> bool {
        self.inner.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Sorted ids of every registered session, control session included.
    pub fn ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.inner.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn close_all(&self) {
        for entry in self.inner.iter() {
            entry.value().close();
        }
    }
}
