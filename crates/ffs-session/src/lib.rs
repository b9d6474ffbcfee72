//! ffs-session: the Faux Filesystem session engine.
//!
//! A [`SessionManager`] owns one read/write channel pair and multiplexes any
//! number of logical [`Session`]s over it. Three tasks run per manager:
//!
//!   - the writer pump drains the shared outbound queue, one frame on the
//!     wire at a time, retrying until the device gives a verdict
//!   - the reader pump polls for inbound frames, drops duplicates by nonce,
//!     and routes payloads to the addressed session
//!   - the control worker negotiates new sessions over session 0
//!
//! Concrete byte channels live in [`transport`].

pub mod channel;
pub mod control;
pub mod manager;
pub mod outbound;
pub mod presession;
mod reader;
pub mod session;
#[cfg(test)]
mod testing;
pub mod transport;
mod writer;

pub use channel::{ReadChannel, WriteChannel};
pub use control::ControlSession;
pub use manager::{PumpTiming, SessionManager};
pub use outbound::{Outbound, OutboundState};
pub use presession::{PreSession, PreSessionState};
pub use session::{Inbox, Session, SessionError, SessionTable};
