use std::sync::{Arc, Mutex, PoisonError};

use btbridge_daemon::ControlLoop;
use btbridge_ipc::{
    BluetoothService, Forwarder, LinkConfig, ReplyError, ReplyHandler, ReplyValue, Request,
};

use crate::cmd::{parse_duration, ForwardArgs, ForwardCommand, LinkArgs};
use crate::exit::{ipc_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{print_outcome, CommandOutput, OutputFormat};

pub fn run(args: ForwardArgs, format: OutputFormat) -> CliResult<i32> {
    match args.command {
        ForwardCommand::LeScan(args) => forward(
            &args.link,
            Request::StartLeScan {
                service_uuids: args.uuids,
            },
            format,
        ),
        ForwardCommand::PlayStatus(args) => forward(
            &args.link,
            Request::SendPlayStatus {
                duration: args.duration,
                position: args.position,
                play_status: args.status.into(),
            },
            format,
        ),
    }
}

fn forward(link: &LinkArgs, request: Request, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&link.timeout)?;
    let config = LinkConfig {
        timeout,
        ..LinkConfig::default()
    };

    let control = ControlLoop::new();
    let forwarder = Forwarder::connect(&link.path, &config, control.handle())
        .map_err(|err| ipc_error("connect failed", err))?;

    let command = request.name();
    let capture = Arc::new(ReplyCapture::default());
    forwarder.request(request, capture.clone());

    let finished = control.run_until(|| capture.is_finished(), timeout);
    forwarder.shutdown();
    control.run_pending();
    if !finished {
        return Err(CliError::new(
            TIMEOUT,
            format!("{command} timed out after {timeout:?}"),
        ));
    }

    match capture.take() {
        Some(Ok(value)) => {
            let value = match value {
                ReplyValue::None => None,
                other => serde_json::to_value(other).ok(),
            };
            print_outcome(
                &CommandOutput {
                    command,
                    status: "success",
                    value,
                },
                format,
            );
            Ok(SUCCESS)
        }
        Some(Err(err)) => Err(CliError::new(FAILURE, format!("{command} failed: {err}"))),
        None => Err(CliError::new(INTERNAL, format!("{command} finished without a reply"))),
    }
}

#[derive(Default)]
struct ReplyCapture {
    reply: Mutex<Option<Result<ReplyValue, ReplyError>>>,
}

impl ReplyCapture {
    fn finish(&self, reply: Result<ReplyValue, ReplyError>) {
        let mut slot = self.reply.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(reply);
        }
    }

    fn is_finished(&self) -> bool {
        self.reply
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn take(&self) -> Option<Result<ReplyValue, ReplyError>> {
        self.reply.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl ReplyHandler for ReplyCapture {
    fn on_success(&self, value: ReplyValue) {
        self.finish(Ok(value));
    }

    fn on_error(&self, error: ReplyError) {
        self.finish(Err(error));
    }
}
