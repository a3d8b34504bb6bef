//! Bridge between applications and the system Bluetooth daemon.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain socket transport
//! - [`pdu`]: PDU codec and framing for the daemon protocol
//! - [`daemon`]: daemon connection, profile modules and backend selection
//! - [`ipc`]: forwarding service calls from sandboxed processes (behind the `ipc` feature)

/// Re-export transport types.
pub mod transport {
    pub use btbridge_transport::*;
}

/// Re-export PDU codec types.
pub mod pdu {
    pub use btbridge_pdu::*;
}

/// Re-export daemon types.
pub mod daemon {
    pub use btbridge_daemon::*;
}

/// Re-export cross-process types (requires `ipc` feature).
#[cfg(feature = "ipc")]
pub mod ipc {
    pub use btbridge_ipc::*;
}
