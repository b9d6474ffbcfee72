//! Writer pump: drains the shared outbound queue onto the write channel.
//!
//! One frame is on the wire at a time. After each write the pump polls the
//! channel status for the frame's nonce until the device accepts it, rejects
//! it, or asks for a resend.

use std::io;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use ffs_core::wire::{encode_packet, ChannelStatus, PACKET_HEADER_LENGTH};

use crate::channel::WriteChannel;
use crate::manager::PumpTiming;
use crate::outbound::{OutboundState, PendingOutbound};

/// Outbound nonce sequence. Never yields 0, which means "no pending op".
#[derive(Debug, Clone, Copy)]
pub(crate) struct NonceCounter(u8);

impl NonceCounter {
    pub(crate) fn new(seed: u8) -> Self {
        Self(seed)
    }

    pub(crate) fn advance(&mut self) -> u8 {
        self.0 = match self.0.wrapping_add(1) {
            0 => 1,
            n => n,
        };
        self.0
    }
}

/// How a single delivery attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Resolved(OutboundState),
    /// Send the same payload again after the given pause.
    Resend(Duration),
}

pub(crate) struct Writer<W> {
    channel: W,
    outbounds: mpsc::UnboundedReceiver<PendingOutbound>,
    timing: PumpTiming,
    nonce: NonceCounter,
    shutdown: broadcast::Receiver<()>,
}

impl<W: WriteChannel> Writer<W> {
    pub(crate) fn new(
        channel: W,
        outbounds: mpsc::UnboundedReceiver<PendingOutbound>,
        timing: PumpTiming,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            channel,
            outbounds,
            nonce: NonceCounter::new(timing.nonce_seed),
            timing,
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut resend: Option<PendingOutbound> = None;

        loop {
            // A fresh nonce every iteration, resends included.
            let nonce = self.nonce.advance();

            let outbound = match resend.take() {
                Some(outbound) => {
                    tracing::debug!(session_id = outbound.session_id, nonce, "resending");
                    outbound
                }
                None => tokio::select! {
                    _ = self.shutdown.recv() => {
                        tracing::info!("writer pump shutting down");
                        return;
                    }
                    next = self.outbounds.recv() => match next {
                        Some(outbound) => outbound,
                        None => {
                            tracing::info!("outbound queue closed, writer pump exiting");
                            return;
                        }
                    },
                },
            };

            let delivery = tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!(
                        session_id = outbound.session_id,
                        "writer pump shutting down mid-delivery"
                    );
                    outbound.resolve(OutboundState::LocalFail);
                    return;
                }
                result = deliver(&mut self.channel, &self.timing, &outbound, nonce) => result,
            };

            match delivery {
                Ok(Delivery::Resolved(state)) => {
                    tracing::debug!(session_id = outbound.session_id, nonce, ?state, "delivery finished");
                    outbound.resolve(state);
                }
                Ok(Delivery::Resend(pause)) => {
                    outbound.set_state(OutboundState::SentFailRetry);
                    if !pause.is_zero() {
                        tokio::select! {
                            _ = self.shutdown.recv() => {
                                tracing::info!("writer pump shutting down");
                                outbound.resolve(OutboundState::LocalFail);
                                return;
                            }
                            _ = tokio::time::sleep(pause) => {}
                        }
                    }
                    resend = Some(outbound);
                }
                Err(e) => {
                    tracing::warn!(session_id = outbound.session_id, nonce, "write channel failed: {e}");
                    outbound.resolve(OutboundState::LocalFail);
                }
            }
        }
    }
}

async fn deliver<W: WriteChannel>(
    channel: &mut W,
    timing: &PumpTiming,
    outbound: &PendingOutbound,
    nonce: u8,
) -> io::Result<Delivery> {
    outbound.set_state(OutboundState::InDelivery);

    let packet = encode_packet(outbound.session_id, nonce, &outbound.payload)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    tracing::trace!(
        header = %hex::encode(&packet[..PACKET_HEADER_LENGTH]),
        payload_len = outbound.payload.len(),
        "writing packet"
    );
    channel.write(&packet).await?;
    outbound.set_state(OutboundState::SentWaiting);

    let mut waits = 0u32;
    loop {
        match channel.status(nonce).await? {
            ChannelStatus::Ok => return Ok(Delivery::Resolved(OutboundState::SentAck)),
            ChannelStatus::Error => return Ok(Delivery::Resolved(OutboundState::SentFailErr)),
            ChannelStatus::Retry => return Ok(Delivery::Resend(timing.retry_backoff)),
            ChannelStatus::Wait => {
                waits += 1;
                if waits >= timing.max_status_waits {
                    tracing::debug!(nonce, waits, "no verdict, giving up on this attempt");
                    return Ok(Delivery::Resend(timing.poll_interval));
                }
                tokio::time::sleep(timing.poll_interval).await;
            }
        }
    }
}
