use btbridge_pdu::{EncodeError, FramingError};
use btbridge_transport::TransportError;

use crate::status::BluetoothStatus;

/// Errors returned synchronously by module command methods.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Building the PDU failed; nothing was sent.
    #[error("failed to encode command: {0}")]
    Encode(#[from] EncodeError),

    /// No live connection to the daemon.
    #[error("daemon connection is not established")]
    NotConnected,

    /// No module is registered for the command's service.
    #[error("service {service:#04x} is not initialized")]
    NotRegistered { service: u8 },

    /// Writing the PDU to the daemon socket failed.
    #[error("failed to send command: {0}")]
    Framing(#[from] FramingError),

    /// Socket-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, CommandError>;

impl CommandError {
    /// The status a result handler receives when this error is turned into
    /// a synthesized failure callback.
    pub fn status(&self) -> BluetoothStatus {
        match self {
            CommandError::NotConnected | CommandError::NotRegistered { .. } => {
                BluetoothStatus::NotReady
            }
            _ => BluetoothStatus::Fail,
        }
    }
}

impl From<&CommandError> for BluetoothStatus {
    fn from(err: &CommandError) -> Self {
        err.status()
    }
}

/// Errors raised while selecting and starting a backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// An override named a backend that does not exist.
    #[error("unknown bluetooth backend: {0}")]
    Unknown(String),

    /// No backend from the preference list is available.
    #[error("no bluetooth backend available")]
    Unavailable,

    /// Connecting to the selected backend failed.
    #[error("failed to connect to backend: {0}")]
    Connect(#[from] TransportError),

    /// Starting the connection after connecting failed.
    #[error("failed to start backend: {0}")]
    Start(#[from] FramingError),
}
