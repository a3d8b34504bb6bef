use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use btbridge_daemon::{open_backend, BackendConfig, ControlHandle};
use tracing::info;

use crate::daemon_service::DaemonService;
use crate::error::{IpcError, Result};
use crate::forwarder::Forwarder;
use crate::handshake::LinkConfig;
use crate::service::BluetoothService;

/// Default path of the host socket.
pub const DEFAULT_HOST_SOCKET: &str = "/run/btbridge/host.sock";

/// Which side of the link this process is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    /// Talks to the daemon directly.
    Privileged,
    /// Forwards everything to the privileged host.
    Sandboxed,
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcessRole::Privileged => "privileged",
            ProcessRole::Sandboxed => "sandboxed",
        })
    }
}

impl FromStr for ProcessRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "privileged" => Ok(ProcessRole::Privileged),
            "sandboxed" => Ok(ProcessRole::Sandboxed),
            other => Err(format!("unknown process role: {other}")),
        }
    }
}

/// Everything either role needs to build its service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub backend: BackendConfig,
    pub host_socket: PathBuf,
    pub link: LinkConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            host_socket: PathBuf::from(DEFAULT_HOST_SOCKET),
            link: LinkConfig::default(),
        }
    }
}

/// Build the [`BluetoothService`] for `role`: the daemon-backed service in
/// the privileged process, a [`Forwarder`] everywhere else.
pub fn select_service(
    role: ProcessRole,
    config: &ServiceConfig,
    control: ControlHandle,
) -> Result<Arc<dyn BluetoothService>> {
    info!(%role, "selecting bluetooth service");
    match role {
        ProcessRole::Privileged => {
            let backend =
                open_backend(&config.backend, control.clone()).map_err(IpcError::Backend)?;
            Ok(Arc::new(DaemonService::new(backend, control)))
        }
        ProcessRole::Sandboxed => Ok(Arc::new(Forwarder::connect(
            &config.host_socket,
            &config.link,
            control,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use btbridge_daemon::{BackendError, ControlLoop, DaemonConfig};

    use super::*;

    #[test]
    fn role_names_round_trip() {
        for role in [ProcessRole::Privileged, ProcessRole::Sandboxed] {
            assert_eq!(role.to_string().parse::<ProcessRole>().unwrap(), role);
        }
        assert!("root".parse::<ProcessRole>().is_err());
    }

    #[test]
    fn privileged_without_daemon_fails() {
        let control = ControlLoop::new();
        let config = ServiceConfig {
            backend: BackendConfig {
                backend: None,
                daemon: DaemonConfig::with_socket("/nonexistent/btbridge/bt.sock"),
            },
            ..ServiceConfig::default()
        };
        let result = select_service(ProcessRole::Privileged, &config, control.handle());
        assert!(matches!(
            result,
            Err(IpcError::Backend(BackendError::Unavailable))
        ));
    }

    #[test]
    fn sandboxed_without_host_fails() {
        let control = ControlLoop::new();
        let config = ServiceConfig {
            host_socket: PathBuf::from("/nonexistent/btbridge/host.sock"),
            ..ServiceConfig::default()
        };
        let result = select_service(ProcessRole::Sandboxed, &config, control.handle());
        assert!(matches!(result, Err(IpcError::Transport(_))));
    }
}
