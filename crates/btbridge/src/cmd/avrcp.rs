use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use btbridge_daemon::avrcp::{AvrcpInterface, AvrcpResultHandler};
use btbridge_daemon::{open_backend, BluetoothStatus, ControlLoop, ResultHandler};
use tracing::debug;

use crate::cmd::{
    parse_duration, AvrcpArgs, AvrcpCommand, BackendArgs, PlayStatusArgs, SetVolumeArgs,
};
use crate::exit::{backend_error, status_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{print_outcome, CommandOutput, OutputFormat};

pub fn run(args: AvrcpArgs, format: OutputFormat) -> CliResult<i32> {
    match args.command {
        AvrcpCommand::SetVolume(args) => set_volume(args, format),
        AvrcpCommand::PlayStatus(args) => play_status(args, format),
    }
}

fn set_volume(args: SetVolumeArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let volume = args.volume;
    execute("set_volume", &args.backend, timeout, format, move |avrcp, handler| {
        avrcp.set_volume(volume, handler)
    })
}

fn play_status(args: PlayStatusArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let status = args.status.into();
    let (duration, position) = (args.duration, args.position);
    execute("get_play_status_rsp", &args.backend, timeout, format, move |avrcp, handler| {
        avrcp.get_play_status_rsp(status, duration, position, handler)
    })
}

/// Open the backend, issue one command and wait on the control loop for its
/// completion.
fn execute(
    command: &str,
    backend: &BackendArgs,
    timeout: Duration,
    format: OutputFormat,
    issue: impl FnOnce(&dyn AvrcpInterface, Arc<dyn AvrcpResultHandler>),
) -> CliResult<i32> {
    let control = ControlLoop::new();
    let backend = open_backend(&backend.config(), control.handle())
        .map_err(|err| backend_error("backend unavailable", err))?;

    let completion = Arc::new(Completion::default());
    let handler: Arc<dyn AvrcpResultHandler> = completion.clone();
    issue(backend.avrcp().as_ref(), handler);

    let finished = control.run_until(|| completion.is_finished(), timeout);
    backend.close();
    if !finished {
        return Err(CliError::new(
            TIMEOUT,
            format!("{command} timed out after {timeout:?}"),
        ));
    }

    match completion.take() {
        Some(Ok(())) => {
            print_outcome(
                &CommandOutput {
                    command,
                    status: BluetoothStatus::Success.as_str(),
                    value: None,
                },
                format,
            );
            Ok(SUCCESS)
        }
        Some(Err(status)) => Err(status_error(&format!("{command} failed"), status)),
        None => Err(CliError::new(INTERNAL, format!("{command} finished without a result"))),
    }
}

/// Records the first completion of a single command.
#[derive(Default)]
struct Completion {
    result: Mutex<Option<Result<(), BluetoothStatus>>>,
}

impl Completion {
    fn finish(&self, result: Result<(), BluetoothStatus>) {
        let mut slot = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(result);
        } else {
            debug!("ignoring second completion");
        }
    }

    fn is_finished(&self) -> bool {
        self.result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn take(&self) -> Option<Result<(), BluetoothStatus>> {
        self.result.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl ResultHandler for Completion {
    fn on_error(&self, status: BluetoothStatus) {
        self.finish(Err(status));
    }
}

impl AvrcpResultHandler for Completion {
    fn get_play_status_rsp(&self) {
        self.finish(Ok(()));
    }

    fn set_volume(&self) {
        self.finish(Ok(()));
    }
}
