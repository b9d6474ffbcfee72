//! Concrete byte channels: TCP sockets and device files.
//!
//! [`connect`] picks one from a [`TransportConfig`] and hands back both
//! halves ready for [`SessionManager::new`](crate::SessionManager::new).

pub mod file;
pub mod socket;

use std::io;
use std::path::PathBuf;

use ffs_core::config::{TransportConfig, TransportKind};
use ffs_core::wire::{AckStatus, ChannelStatus};

use crate::channel::{ReadChannel, WriteChannel};

pub use file::{FileReadChannel, FileWriteChannel};
pub use socket::{SocketReadChannel, SocketWriteChannel};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Read half of whichever transport the config selected.
#[derive(Debug)]
pub enum TransportReader {
    Socket(SocketReadChannel),
    File(FileReadChannel),
}

/// Write half of whichever transport the config selected.
#[derive(Debug)]
pub enum TransportWriter {
    Socket(SocketWriteChannel),
    File(FileWriteChannel),
}

impl ReadChannel for TransportReader {
    async fn read(&mut self, length: usize) -> io::Result<Vec<u8>> {
        match self {
            TransportReader::Socket(c) => c.read(length).await,
            TransportReader::File(c) => c.read(length).await,
        }
    }

    async fn acknowledge(&mut self, status: AckStatus) -> io::Result<()> {
        match self {
            TransportReader::Socket(c) => c.acknowledge(status).await,
            TransportReader::File(c) => c.acknowledge(status).await,
        }
    }
}

impl WriteChannel for TransportWriter {
    async fn write(&mut self, packet: &[u8]) -> io::Result<()> {
        match self {
            TransportWriter::Socket(c) => c.write(packet).await,
            TransportWriter::File(c) => c.write(packet).await,
        }
    }

    async fn status(&mut self, nonce: u8) -> io::Result<ChannelStatus> {
        match self {
            TransportWriter::Socket(c) => c.status(nonce).await,
            TransportWriter::File(c) => c.status(nonce).await,
        }
    }
}

/// Open both channels described by `config`.
pub async fn connect(
    config: &TransportConfig,
) -> Result<(TransportReader, TransportWriter), TransportError> {
    match config.kind {
        TransportKind::Socket => {
            let read = SocketReadChannel::connect(&config.host, config.read_port).await?;
            let write = SocketWriteChannel::connect(&config.host, config.write_port).await?;
            tracing::info!(
                host = %config.host,
                read_port = config.read_port,
                write_port = config.write_port,
                "socket transport connected"
            );
            Ok((TransportReader::Socket(read), TransportWriter::Socket(write)))
        }
        TransportKind::File => {
            let read = FileReadChannel::open(&config.read_path).await?;
            let write = FileWriteChannel::open(&config.write_path).await?;
            tracing::info!(
                read_path = %config.read_path.display(),
                write_path = %config.write_path.display(),
                "file transport opened"
            );
            Ok((TransportReader::File(read), TransportWriter::File(write)))
        }
    }
}

/// Copy `buf` into a buffer of exactly `length` bytes, zero-padded or cut.
pub(crate) fn fit_to(buf: &[u8], length: usize) -> Vec<u8> {
    let mut out = vec![0u8; length];
    let n = buf.len().min(length);
    out[..n].copy_from_slice(&buf[..n]);
    out
}
