use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use btbridge_daemon::avrcp::PlayStatus;
use btbridge_daemon::{
    BackendConfig, DaemonConfig, BACKEND_ENV, DAEMON_SOCKET_ENV, DEFAULT_DAEMON_SOCKET,
};
use clap::{Args, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod avrcp;
pub mod forward;
pub mod monitor;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send an AVRCP command to the daemon.
    Avrcp(AvrcpArgs),
    /// Print AVRCP notifications from the daemon.
    Monitor(MonitorArgs),
    /// Host the Bluetooth service for sandboxed processes.
    Serve(ServeArgs),
    /// Forward a request to a running host.
    Forward(ForwardArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Avrcp(args) => avrcp::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Serve(args) => serve::run(args),
        Command::Forward(args) => forward::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Backend selection shared by every command that talks to the daemon.
#[derive(Args, Debug)]
pub struct BackendArgs {
    /// Backend to start (default: first available).
    #[arg(long, value_name = "NAME", env = BACKEND_ENV)]
    pub backend: Option<String>,
    /// Daemon command socket.
    #[arg(
        long,
        value_name = "PATH",
        env = DAEMON_SOCKET_ENV,
        default_value = DEFAULT_DAEMON_SOCKET
    )]
    pub daemon: PathBuf,
}

impl BackendArgs {
    pub fn config(&self) -> BackendConfig {
        BackendConfig {
            backend: self.backend.clone(),
            daemon: DaemonConfig::with_socket(&self.daemon),
        }
    }
}

#[derive(Args, Debug)]
pub struct AvrcpArgs {
    #[command(subcommand)]
    pub command: AvrcpCommand,
}

#[derive(Subcommand, Debug)]
pub enum AvrcpCommand {
    /// Set the absolute volume on the remote controller.
    SetVolume(SetVolumeArgs),
    /// Answer the remote's play status query.
    PlayStatus(PlayStatusArgs),
}

#[derive(Args, Debug)]
pub struct SetVolumeArgs {
    /// Absolute volume (0-127).
    #[arg(value_parser = clap::value_parser!(u8).range(0..=127))]
    pub volume: u8,
    #[command(flatten)]
    pub backend: BackendArgs,
    /// Maximum time to wait for the daemon (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct PlayStatusArgs {
    /// Playback state.
    #[arg(long, value_enum, default_value = "playing")]
    pub status: PlayStatusArg,
    /// Track length in milliseconds.
    #[arg(long, default_value = "0")]
    pub duration: u32,
    /// Playback position in milliseconds.
    #[arg(long, default_value = "0")]
    pub position: u32,
    #[command(flatten)]
    pub backend: BackendArgs,
    /// Maximum time to wait for the daemon (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum PlayStatusArg {
    Stopped,
    Playing,
    Paused,
    FwdSeek,
    RevSeek,
    Error,
}

impl From<PlayStatusArg> for PlayStatus {
    fn from(arg: PlayStatusArg) -> Self {
        match arg {
            PlayStatusArg::Stopped => PlayStatus::Stopped,
            PlayStatusArg::Playing => PlayStatus::Playing,
            PlayStatusArg::Paused => PlayStatus::Paused,
            PlayStatusArg::FwdSeek => PlayStatus::FwdSeek,
            PlayStatusArg::RevSeek => PlayStatus::RevSeek,
            PlayStatusArg::Error => PlayStatus::Error,
        }
    }
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub backend: BackendArgs,
    /// Exit after printing N notifications.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host socket path to bind.
    pub path: PathBuf,
    #[command(flatten)]
    pub backend: BackendArgs,
    /// Exit after N sandboxed processes have connected and disconnected.
    #[arg(long, value_name = "N")]
    pub max_clients: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ForwardArgs {
    #[command(subcommand)]
    pub command: ForwardCommand,
}

#[derive(Subcommand, Debug)]
pub enum ForwardCommand {
    /// Start an LE scan through the host.
    LeScan(LeScanArgs),
    /// Report play status through the host.
    PlayStatus(ForwardPlayStatusArgs),
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Host socket path to connect to.
    pub path: PathBuf,
    /// Maximum time to wait for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct LeScanArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Service UUID filter (repeatable).
    #[arg(long = "uuid", value_name = "UUID")]
    pub uuids: Vec<Uuid>,
}

#[derive(Args, Debug)]
pub struct ForwardPlayStatusArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Playback state.
    #[arg(long, value_enum, default_value = "playing")]
    pub status: PlayStatusArg,
    /// Track length in milliseconds.
    #[arg(long, default_value = "0")]
    pub duration: i64,
    /// Playback position in milliseconds.
    #[arg(long, default_value = "0")]
    pub position: i64,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show build and feature details.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Clear `running` on SIGINT/SIGTERM and run `on_stop`.
pub fn install_ctrlc_handler(
    running: Arc<AtomicBool>,
    on_stop: impl Fn() + Send + 'static,
) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        on_stop();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn backend_args_build_config() {
        let args = BackendArgs {
            backend: Some("bluetoothd".into()),
            daemon: PathBuf::from("/tmp/bt.sock"),
        };
        let config = args.config();
        assert_eq!(config.backend.as_deref(), Some("bluetoothd"));
        assert_eq!(config.daemon.socket_path, PathBuf::from("/tmp/bt.sock"));
    }
}
