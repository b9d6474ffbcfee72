//! FFS wire format: packets, status blocks, and control-session messages.
//!
//! These types ARE the protocol. The remote device reads and writes exactly
//! these layouts; changing a size or a code here breaks interoperability.
//!
//! Packet (2048 bytes):
//!   session_id u16 BE | nonce u8 | reserved u8 (0) | payload, zero-padded
//!
//! Status block (16 bytes):
//!   code u8 | echoed nonce u8 | 14 reserved bytes
//!
//! Header types use zerocopy derives over unaligned big-endian fields, so
//! parsing is allocation-free and there is no unsafe code in this module.

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U16};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::codec::{CodecError, Decode, Decoder, Encode, Encoder};
use crate::endpoint::Endpoint;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Total size of every packet on the channel, header included.
pub const PACKET_LENGTH: usize = 2048;

/// session id (2) + nonce (1) + reserved (1).
pub const PACKET_HEADER_LENGTH: usize = 4;

/// Largest payload a single packet can carry.
pub const MAX_PAYLOAD: usize = PACKET_LENGTH - PACKET_HEADER_LENGTH;

/// Size of the status block returned by the write channel.
pub const STATUS_LENGTH: usize = 16;

/// Session id reserved for the control session.
pub const CONTROL_SESSION_ID: u16 = 0;

/// Nonce value meaning "no pending operation". Never used for a real frame.
pub const NO_NONCE: u8 = 0;

/// First value of the writer's nonce counter (incremented before first use).
pub const DEFAULT_NONCE_SEED: u8 = 0xc1;

/// Socket transport: send-data (write side) / read-request (read side).
pub const SOCKET_CMD_DATA: u8 = 0x01;

/// Socket transport: status-request.
pub const SOCKET_CMD_STATUS: u8 = 0x02;

// ── Packet header ─────────────────────────────────────────────────────────────

/// Header at the front of every packet.
///
/// Wire size: 4 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct PacketHeader {
    /// Destination session. 0 is the control session.
    pub session_id: U16<BigEndian>,
    /// Frame tag used for duplicate detection and status correlation.
    pub nonce: u8,
    /// Always zero on send, ignored on receive.
    pub reserved: u8,
}

assert_eq_size!(PacketHeader, [u8; PACKET_HEADER_LENGTH]);

impl PacketHeader {
    pub fn new(session_id: u16, nonce: u8) -> Self {
        Self {
            session_id: U16::new(session_id),
            nonce,
            reserved: 0,
        }
    }

    pub fn session_id(&self) -> u16 {
        self.session_id.get()
    }

    /// An all-zero header means the device has nothing for us yet.
    pub fn is_void(&self) -> bool {
        self.as_bytes().iter().all(|b| *b == 0)
    }
}

/// Frame `payload` for `session_id` under `nonce`, zero-padded to
/// [`PACKET_LENGTH`].
pub fn encode_packet(session_id: u16, nonce: u8, payload: &[u8]) -> Result<Vec<u8>, WireError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(WireError::PayloadTooLarge(payload.len()));
    }
    let mut packet = vec![0u8; PACKET_LENGTH];
    packet[..PACKET_HEADER_LENGTH].copy_from_slice(PacketHeader::new(session_id, nonce).as_bytes());
    packet[PACKET_HEADER_LENGTH..PACKET_HEADER_LENGTH + payload.len()].copy_from_slice(payload);
    Ok(packet)
}

/// Split a received buffer into header and payload. `None` for buffers too
/// short to hold a header.
pub fn decode_packet(buf: &[u8]) -> Option<(PacketHeader, &[u8])> {
    let header = PacketHeader::read_from_prefix(buf)?;
    Some((header, &buf[PACKET_HEADER_LENGTH..]))
}

/// True when `buf` carries no frame yet: short, or an all-zero header.
pub fn is_void_packet(buf: &[u8]) -> bool {
    decode_packet(buf).map_or(true, |(header, _)| header.is_void())
}

// ── Status block ──────────────────────────────────────────────────────────────

/// Status codes reported by the device in byte 0 of a status block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusCode {
    Ready = 0x10,
    Error = 0x11,
    Success = 0x12,
    Retry = 0x13,
    /// The device rejected the frame contents.
    EInput = 0x14,
}

impl TryFrom<u8> for StatusCode {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, CodecError> {
        match value {
            0x10 => Ok(StatusCode::Ready),
            0x11 => Ok(StatusCode::Error),
            0x12 => Ok(StatusCode::Success),
            0x13 => Ok(StatusCode::Retry),
            0x14 => Ok(StatusCode::EInput),
            other => Err(CodecError::UnrecognizedEnum(other as i32)),
        }
    }
}

impl From<StatusCode> for u8 {
    fn from(c: StatusCode) -> u8 {
        c as u8
    }
}

/// Outcome of a write-channel status poll, as seen by the writer pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// The frame was accepted.
    Ok,
    /// The frame was rejected.
    Error,
    /// The device asks for the frame to be sent again.
    Retry,
    /// No verdict yet; poll again.
    Wait,
}

/// Verdict the reader pump sends back for an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Acknowledge,
    Error,
}

/// Status block as exchanged with the device.
///
/// Wire size: 16 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct StatusBlock {
    pub code: u8,
    /// Nonce of the frame this status concerns. 0 = none pending.
    pub nonce: u8,
    pub reserved: [u8; 14],
}

assert_eq_size!(StatusBlock, [u8; STATUS_LENGTH]);

impl StatusBlock {
    pub fn new(code: StatusCode, nonce: u8) -> Self {
        Self {
            code: code.into(),
            nonce,
            reserved: [0u8; 14],
        }
    }

    /// The block the read side writes back after consuming a frame.
    pub fn acknowledgment(status: AckStatus) -> Self {
        let code = match status {
            AckStatus::Acknowledge => StatusCode::Ready,
            AckStatus::Error => StatusCode::Error,
        };
        Self::new(code, NO_NONCE)
    }

    /// Parse from the front of `buf`; `None` if shorter than a status block.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        Self::read_from_prefix(buf)
    }

    /// Map this block to a channel status for a poll on `requested` nonce.
    ///
    /// READY while nothing is pending counts as accepted. Otherwise only a
    /// block echoing the requested nonce carries a verdict; anything else,
    /// including unknown codes, means "not yet".
    pub fn interpret(&self, requested: u8) -> ChannelStatus {
        let code = StatusCode::try_from(self.code).ok();
        if code == Some(StatusCode::Ready) && requested == NO_NONCE {
            return ChannelStatus::Ok;
        }
        if self.nonce != requested {
            return ChannelStatus::Wait;
        }
        match code {
            Some(StatusCode::Success) => ChannelStatus::Ok,
            Some(StatusCode::Error) | Some(StatusCode::EInput) => ChannelStatus::Error,
            Some(StatusCode::Retry) => ChannelStatus::Retry,
            Some(StatusCode::Ready) | None => ChannelStatus::Wait,
        }
    }
}

// ── Control session messages ──────────────────────────────────────────────────

/// Command byte at the front of a control-session request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlCommand {
    OpenSession = 0x01,
}

impl TryFrom<u8> for ControlCommand {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, CodecError> {
        match value {
            0x01 => Ok(ControlCommand::OpenSession),
            other => Err(CodecError::UnrecognizedEnum(other as i32)),
        }
    }
}

/// Ask the device to open a session with `endpoint`.
///
/// Wire: 0x01 | endpoint (34 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub endpoint: Endpoint,
}

impl Encode for ConnectRequest {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CodecError> {
        enc.nested(|enc| {
            enc.put_u8(ControlCommand::OpenSession as u8);
            enc.put(&self.endpoint)
        })
    }
}

impl Decode for ConnectRequest {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        dec.nested(|dec| {
            let ControlCommand::OpenSession = ControlCommand::try_from(dec.get_u8()?)?;
            Ok(Self {
                endpoint: dec.get()?,
            })
        })
    }
}

/// Device reply to a successful [`ConnectRequest`].
///
/// Wire: new session id u16 (rest of the payload is padding)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectResponse {
    pub session_id: u16,
}

impl Encode for ConnectResponse {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CodecError> {
        enc.put_u16(self.session_id);
        Ok(())
    }
}

impl Decode for ConnectResponse {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            session_id: dec.get_u16()?,
        })
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("payload length {0} exceeds maximum {}", MAX_PAYLOAD)]
    PayloadTooLarge(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
