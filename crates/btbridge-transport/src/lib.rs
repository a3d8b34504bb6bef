//! Byte-stream transport used by btbridge.
//!
//! Two links run over this layer: the connection to the Bluetooth daemon and
//! the link between a sandboxed process and the privileged bridge host. Both
//! are plain Unix domain socket streams; framing lives one layer up in
//! `btbridge-pdu`.

pub mod error;
#[cfg(unix)]
pub mod stream;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
#[cfg(unix)]
pub use stream::SocketStream;

#[cfg(unix)]
pub use uds::{connect, UnixSocketListener};
