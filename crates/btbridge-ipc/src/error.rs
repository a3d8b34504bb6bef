use btbridge_daemon::BackendError;
use btbridge_pdu::{DecodeError, FramingError};
use btbridge_transport::TransportError;

/// Errors on the link between a sandboxed process and the privileged host.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// PDU framing error.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Malformed PDU payload.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Handshake failed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The other side went away.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// A PDU that does not belong on the link.
    #[error("unexpected PDU (service {service:#04x}, opcode {opcode:#04x})")]
    UnexpectedPdu { service: u8, opcode: u8 },

    /// Operation timed out.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Starting the backing Bluetooth backend failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, IpcError>;
