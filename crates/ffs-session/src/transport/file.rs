//! File transport: a pair of device files, one per direction.
//!
//! Every operation rewinds to offset 0 first; the device exposes a single
//! 2048-byte window per file rather than a stream. Writes always cover the
//! full window and go out in 512-byte blocks.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use zerocopy::AsBytes;

use ffs_core::wire::{AckStatus, ChannelStatus, StatusBlock, PACKET_LENGTH};

use super::{fit_to, TransportError};
use crate::channel::{ReadChannel, WriteChannel};

/// Device block size; writes are issued in chunks of this many bytes.
pub const BLOCK_SIZE: usize = 512;

#[derive(Debug)]
struct DeviceFile {
    path: PathBuf,
    file: File,
}

impl DeviceFile {
    async fn open(path: &Path) -> Result<Self, TransportError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
            .await
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), "device file opened");
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Read the window. Short reads are zero-filled to `PACKET_LENGTH`.
    async fn read_window(&mut self) -> io::Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(0)).await?;
        let mut buf = vec![0u8; PACKET_LENGTH];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(buf)
    }

    /// Overwrite the window with `data`, zero-padded to `PACKET_LENGTH`.
    async fn write_window(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).await?;
        for block in fit_to(data, PACKET_LENGTH).chunks(BLOCK_SIZE) {
            self.file.write_all(block).await?;
        }
        self.file.flush().await
    }
}

#[derive(Debug)]
pub struct FileReadChannel {
    inner: DeviceFile,
}

impl FileReadChannel {
    pub async fn open(path: &Path) -> Result<Self, TransportError> {
        Ok(Self {
            inner: DeviceFile::open(path).await?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }
}

impl ReadChannel for FileReadChannel {
    async fn read(&mut self, length: usize) -> io::Result<Vec<u8>> {
        let window = self.inner.read_window().await?;
        Ok(fit_to(&window, length))
    }

    async fn acknowledge(&mut self, status: AckStatus) -> io::Result<()> {
        self.inner
            .write_window(StatusBlock::acknowledgment(status).as_bytes())
            .await
    }
}

#[derive(Debug)]
pub struct FileWriteChannel {
    inner: DeviceFile,
}

impl FileWriteChannel {
    pub async fn open(path: &Path) -> Result<Self, TransportError> {
        Ok(Self {
            inner: DeviceFile::open(path).await?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }
}

impl WriteChannel for FileWriteChannel {
    async fn write(&mut self, packet: &[u8]) -> io::Result<()> {
        self.inner.write_window(packet).await
    }

    async fn status(&mut self, nonce: u8) -> io::Result<ChannelStatus> {
        let window = self.inner.read_window().await?;
        Ok(StatusBlock::parse(&window).map_or(ChannelStatus::Wait, |block| block.interpret(nonce)))
    }
}
