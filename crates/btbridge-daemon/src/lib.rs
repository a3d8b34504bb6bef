//! Client side of the Bluetooth daemon protocol.
//!
//! A [`DaemonConnection`] owns the daemon socket and an I/O thread. Profile
//! modules (AVRCP here) turn application calls into PDUs, and turn the
//! daemon's responses and notifications back into handler callbacks. Every
//! callback runs on the control thread, drained by a [`ControlLoop`].

pub mod address;
pub mod avrcp;
#[cfg(unix)]
pub mod backend;
#[cfg(unix)]
pub mod connection;
pub mod control;
pub mod dispatch;
pub mod error;
#[cfg(unix)]
pub mod interface;
pub mod module;
pub mod pending;
pub mod status;

pub use address::{Address, ParseAddressError};
#[cfg(unix)]
pub use backend::{
    open_backend, select_backend, BackendConfig, BackendKind, BACKEND_ENV, DAEMON_SOCKET_ENV,
};
#[cfg(unix)]
pub use connection::{DaemonConfig, DaemonConnection, DaemonSender, DEFAULT_DAEMON_SOCKET};
pub use control::{ControlHandle, ControlLoop};
pub use dispatch::{Decoder, DispatchTable, OpcodeKind, OpcodeLayout};
pub use error::{BackendError, CommandError, Result};
#[cfg(unix)]
pub use interface::{BluetoothBackend, DaemonInterface};
pub use module::{demux, DaemonModule, Inbound, NotificationSlot, PduTransport};
pub use pending::{dispatch_error, PendingRequests, PendingResult, ResultHandler};
pub use status::BluetoothStatus;
