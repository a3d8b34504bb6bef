//! Cross-process access to the Bluetooth service.
//!
//! Only the privileged process talks to the daemon. Sandboxed processes use
//! a [`Forwarder`], which sends each call over a Unix socket link to the
//! [`BridgeHost`] in the privileged process and delivers the reply to the
//! original handler. If the link goes away first, the handler still gets
//! exactly one callback: a generic failure.

#[cfg(unix)]
pub mod daemon_service;
pub mod error;
#[cfg(unix)]
pub mod forwarder;
pub mod handshake;
#[cfg(unix)]
pub mod host;
pub mod link;
pub mod request;
#[cfg(unix)]
pub mod select;
pub mod service;

#[cfg(unix)]
pub use daemon_service::DaemonService;
pub use error::{IpcError, Result};
#[cfg(unix)]
pub use forwarder::{Forwarder, RequestActor, RequestState};
pub use handshake::{
    handshake_client, handshake_server, HandshakeRequest, HandshakeResponse, HandshakeResult,
    LinkConfig,
};
#[cfg(unix)]
pub use host::{BridgeHost, HostSession};
pub use link::LINK_SERVICE;
pub use request::{
    AdapterInfo, Reply, ReplyEnvelope, ReplyError, ReplyValue, Request, RequestEnvelope,
};
#[cfg(unix)]
pub use select::{select_service, ProcessRole, ServiceConfig, DEFAULT_HOST_SOCKET};
pub use service::{BluetoothService, ReplyHandler};
