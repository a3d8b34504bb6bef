use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use btbridge_daemon::ControlLoop;
use btbridge_ipc::{select_service, BridgeHost, ProcessRole, ServiceConfig};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, ServeArgs};
use crate::exit::{io_error, ipc_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let control = ControlLoop::new();
    let config = ServiceConfig {
        backend: args.backend.config(),
        ..ServiceConfig::default()
    };
    let service = select_service(ProcessRole::Privileged, &config, control.handle())
        .map_err(|err| ipc_error("service unavailable", err))?;
    let host = BridgeHost::bind(&args.path, service, control.handle())
        .map_err(|err| ipc_error("bind failed", err))?;
    info!(path = %host.path().display(), "serving sandboxed processes");

    let running = Arc::new(AtomicBool::new(true));
    let stopper = control.handle();
    install_ctrlc_handler(running.clone(), move || stopper.quit())?;

    let done = control.handle();
    let limit = args.max_clients;
    let server = thread::Builder::new()
        .name("btbridge-serve".to_string())
        .spawn(move || {
            let result = host.serve(limit);
            done.quit();
            result
        })
        .map_err(|err| io_error("spawn failed", err))?;

    // Requests from every session run here.
    control.run();

    if !running.load(Ordering::SeqCst) {
        // The accept thread is still blocked; the listener is never dropped.
        let _ = std::fs::remove_file(&args.path);
        return Ok(SUCCESS);
    }

    match server.join() {
        Ok(Ok(())) => Ok(SUCCESS),
        Ok(Err(err)) => Err(ipc_error("serve failed", err)),
        Err(_) => Err(CliError::new(INTERNAL, "serve thread panicked")),
    }
}
