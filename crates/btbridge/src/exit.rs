use std::fmt;
use std::io;

use btbridge_daemon::{BackendError, BluetoothStatus};
use btbridge_ipc::IpcError;
use btbridge_pdu::FramingError;
use btbridge_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn framing_error(context: &str, err: FramingError) -> CliError {
    match err {
        FramingError::Io(source) => io_error(context, source),
        FramingError::Transport(err) => transport_error(context, err),
        FramingError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FramingError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn backend_error(context: &str, err: BackendError) -> CliError {
    match err {
        BackendError::Unknown(_) => CliError::new(USAGE, format!("{context}: {err}")),
        BackendError::Unavailable => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        BackendError::Connect(err) => transport_error(context, err),
        BackendError::Start(err) => framing_error(context, err),
    }
}

pub fn ipc_error(context: &str, err: IpcError) -> CliError {
    match err {
        IpcError::Transport(err) => transport_error(context, err),
        IpcError::Framing(err) => framing_error(context, err),
        IpcError::Backend(err) => backend_error(context, err),
        IpcError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        IpcError::Json(_) | IpcError::Decode(_) | IpcError::UnexpectedPdu { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        IpcError::HandshakeFailed(_) | IpcError::Disconnected(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn status_error(context: &str, status: BluetoothStatus) -> CliError {
    CliError::new(FAILURE, format!("{context}: {status}"))
}
