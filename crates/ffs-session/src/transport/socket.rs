//! Socket transport: one TCP connection per direction.
//!
//! Every request to the device starts with a one-byte command:
//!   0x01  read request (read side) or send-data (write side)
//!   0x02  status request (write side)
//! Acknowledgments on the read side are a bare 16-byte status block.

use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use zerocopy::AsBytes;

use ffs_core::wire::{
    AckStatus, ChannelStatus, StatusBlock, PACKET_LENGTH, SOCKET_CMD_DATA, SOCKET_CMD_STATUS,
    STATUS_LENGTH,
};

use super::{fit_to, TransportError};
use crate::channel::{ReadChannel, WriteChannel};

async fn dial(host: &str, port: u16) -> Result<TcpStream, TransportError> {
    let addr = format!("{host}:{port}");
    let stream = TcpStream::connect(&addr)
        .await
        .map_err(|source| TransportError::Connect {
            addr: addr.clone(),
            source,
        })?;
    stream
        .set_nodelay(true)
        .map_err(|source| TransportError::Connect { addr, source })?;
    Ok(stream)
}

#[derive(Debug)]
pub struct SocketReadChannel {
    stream: TcpStream,
}

impl SocketReadChannel {
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        Ok(Self::from_stream(dial(host, port).await?))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl ReadChannel for SocketReadChannel {
    async fn read(&mut self, length: usize) -> io::Result<Vec<u8>> {
        self.stream.write_all(&[SOCKET_CMD_DATA]).await?;
        let mut buf = vec![0u8; length];
        self.stream.read_exact(&mut buf).await?;
        Ok(buf)
    }

    async fn acknowledge(&mut self, status: AckStatus) -> io::Result<()> {
        self.stream
            .write_all(StatusBlock::acknowledgment(status).as_bytes())
            .await
    }
}

#[derive(Debug)]
pub struct SocketWriteChannel {
    stream: TcpStream,
}

impl SocketWriteChannel {
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        Ok(Self::from_stream(dial(host, port).await?))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl WriteChannel for SocketWriteChannel {
    async fn write(&mut self, packet: &[u8]) -> io::Result<()> {
        let mut frame = Vec::with_capacity(1 + PACKET_LENGTH);
        frame.push(SOCKET_CMD_DATA);
        frame.extend_from_slice(&fit_to(packet, PACKET_LENGTH));
        self.stream.write_all(&frame).await
    }

    async fn status(&mut self, nonce: u8) -> io::Result<ChannelStatus> {
        self.stream.write_all(&[SOCKET_CMD_STATUS]).await?;
        let mut buf = [0u8; STATUS_LENGTH];
        self.stream.read_exact(&mut buf).await?;
        Ok(StatusBlock::parse(&buf).map_or(ChannelStatus::Wait, |block| block.interpret(nonce)))
    }
}
