//! Byte-channel abstraction consumed by the pumps.
//!
//! A device exposes two half-duplex channels. The reader pump owns the read
//! side and the writer pump owns the write side; neither is ever shared.

use std::future::Future;
use std::io;

use ffs_core::wire::{AckStatus, ChannelStatus};

/// Device → host direction.
pub trait ReadChannel: Send + 'static {
    /// Read exactly `length` bytes. When the device has nothing ready the
    /// buffer comes back zero-filled (a void packet) rather than blocking.
    fn read(&mut self, length: usize) -> impl Future<Output = io::Result<Vec<u8>>> + Send;

    /// Report the verdict for the frame just read.
    fn acknowledge(&mut self, status: AckStatus) -> impl Future<Output = io::Result<()>> + Send;
}

/// Host → device direction.
pub trait WriteChannel: Send + 'static {
    /// Hand a packet to the device. Implementations pad or truncate to
    /// `PACKET_LENGTH`.
    fn write(&mut self, packet: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Poll the device's verdict on the frame sent under `nonce`.
    fn status(&mut self, nonce: u8) -> impl Future<Output = io::Result<ChannelStatus>> + Send;
}
