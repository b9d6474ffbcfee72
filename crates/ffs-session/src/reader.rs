//! Reader pump: polls the read channel and routes inbound frames.

use bytes::Bytes;
use tokio::sync::broadcast;

use ffs_core::wire::{decode_packet, AckStatus, PacketHeader, PACKET_HEADER_LENGTH, PACKET_LENGTH};

use crate::channel::ReadChannel;
use crate::manager::PumpTiming;
use crate::session::SessionTable;

pub(crate) struct Reader<R> {
    inbound: Inbound<R>,
    shutdown: broadcast::Receiver<()>,
}

struct Inbound<R> {
    channel: R,
    sessions: SessionTable,
    timing: PumpTiming,
    /// Nonce of the last frame routed. 0 until the first frame arrives.
    last_nonce: u8,
}

impl<R: ReadChannel> Reader<R> {
    pub(crate) fn new(
        channel: R,
        sessions: SessionTable,
        timing: PumpTiming,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            inbound: Inbound {
                channel,
                sessions,
                timing,
                last_nonce: 0,
            },
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("reader pump shutting down");
                    return;
                }
                result = self.inbound.poll_once() => {
                    if let Err(e) = result {
                        tracing::warn!("read channel failed: {e}");
                        tokio::time::sleep(self.inbound.timing.poll_interval).await;
                    }
                }
            }
        }
    }
}

impl<R: ReadChannel> Inbound<R> {
    /// Wait for the next real frame and deal with it.
    async fn poll_once(&mut self) -> std::io::Result<()> {
        let (header, frame) = loop {
            let buf = self.channel.read(PACKET_LENGTH).await?;
            match decode_packet(&buf) {
                Some((header, _)) if !header.is_void() => break (header, buf),
                _ => tokio::time::sleep(self.timing.poll_interval).await,
            }
        };
        let payload = &frame[PACKET_HEADER_LENGTH..];

        if header.nonce == self.last_nonce {
            tracing::debug!(nonce = header.nonce, "duplicate frame, acknowledging again");
            self.channel.acknowledge(AckStatus::Acknowledge).await?;
            tokio::time::sleep(self.timing.poll_interval).await;
            return Ok(());
        }
        self.last_nonce = header.nonce;

        let status = self.route(&header, payload);
        self.channel.acknowledge(status).await?;
        tracing::debug!(session_id = header.session_id(), nonce = header.nonce, ?status, "frame acknowledged");
        Ok(())
    }

    fn route(&self, header: &PacketHeader, payload: &[u8]) -> AckStatus {
        let session_id = header.session_id();
        tracing::trace!(session_id, payload = %hex::encode(payload), "inbound frame");

        match self.sessions.get(session_id) {
            Some(session) if session.incoming_data(Bytes::copy_from_slice(payload)) => {
                AckStatus::Acknowledge
            }
            Some(_) => {
                tracing::debug!(session_id, "session closed, frame dropped");
                AckStatus::Error
            }
            None => {
                tracing::debug!(session_id, "no such session, frame dropped");
                AckStatus::Error
            }
        }
    }
}
