//! Backend selection.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::connection::DaemonConfig;
use crate::control::ControlHandle;
use crate::error::BackendError;
use crate::interface::{BluetoothBackend, DaemonInterface};

/// Environment variable naming the backend to use.
pub const BACKEND_ENV: &str = "BTBRIDGE_BACKEND";

/// Environment variable overriding the daemon socket path.
pub const DAEMON_SOCKET_ENV: &str = "BTBRIDGE_DAEMON_SOCKET";

/// Built-in backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// The system Bluetooth daemon reached over its command socket.
    Daemon,
}

impl BackendKind {
    /// Backends tried in order when no override is given.
    pub const PREFERENCE: &'static [BackendKind] = &[BackendKind::Daemon];

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Daemon => "bluetoothd",
        }
    }

    fn is_available(self, config: &BackendConfig) -> bool {
        match self {
            BackendKind::Daemon => config.daemon.socket_path.exists(),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bluetoothd" | "daemon" => Ok(BackendKind::Daemon),
            _ => Err(BackendError::Unknown(s.to_string())),
        }
    }
}

/// Backend selection inputs.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    /// Explicit backend name; `None` means pick from the preference list.
    pub backend: Option<String>,
    pub daemon: DaemonConfig,
}

impl BackendConfig {
    /// Read the override and socket path from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = std::env::var(BACKEND_ENV) {
            if !name.trim().is_empty() {
                config.backend = Some(name);
            }
        }
        if let Ok(path) = std::env::var(DAEMON_SOCKET_ENV) {
            if !path.is_empty() {
                config.daemon.socket_path = PathBuf::from(path);
            }
        }
        config
    }
}

/// Resolve which backend to start.
pub fn select_backend(config: &BackendConfig) -> Result<BackendKind, BackendError> {
    if let Some(name) = config.backend.as_deref() {
        let kind = name.parse::<BackendKind>()?;
        debug!(backend = %kind, "backend chosen by override");
        return Ok(kind);
    }

    BackendKind::PREFERENCE
        .iter()
        .copied()
        .find(|kind| kind.is_available(config))
        .ok_or(BackendError::Unavailable)
}

/// Select and start a backend.
pub fn open_backend(
    config: &BackendConfig,
    control: ControlHandle,
) -> Result<Arc<dyn BluetoothBackend>, BackendError> {
    let kind = select_backend(config)?;
    info!(backend = %kind, "starting bluetooth backend");
    match kind {
        BackendKind::Daemon => Ok(Arc::new(DaemonInterface::connect(&config.daemon, control)?)),
    }
}
