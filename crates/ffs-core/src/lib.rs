//! Shared types for the Faux Filesystem transport: the binary
//! codec, endpoint identifiers, the on-wire packet and status layouts, and
//! configuration. All other FFS crates depend on this one.

pub mod codec;
pub mod config;
pub mod endpoint;
pub mod wire;

pub use codec::{CodecError, Decode, Decoder, Encode, Encoder, WireEnum};
pub use endpoint::{Endpoint, EndpointError};
pub use wire::{AckStatus, ChannelStatus, MAX_PAYLOAD, PACKET_LENGTH, STATUS_LENGTH};
