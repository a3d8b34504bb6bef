use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use btbridge_daemon::avrcp::{
    AvrcpEvent, AvrcpNotification, AvrcpNotificationHandler, AvrcpResultHandler, MediaAttribute,
    PlayerAttribute, PlayerSettings, RemoteFeatures,
};
use btbridge_daemon::{open_backend, Address, ControlLoop, ResultHandler};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, MonitorArgs};
use crate::exit::{backend_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_notification, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let control = ControlLoop::new();
    let backend = open_backend(&args.backend.config(), control.handle())
        .map_err(|err| backend_error("backend unavailable", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), || {})?;

    let printer = Arc::new(Printer {
        format,
        printed: AtomicUsize::new(0),
    });
    let avrcp = backend.avrcp();
    avrcp.init(Some(printer.clone()), Arc::new(Lifecycle));
    info!(backend = %backend.kind(), "monitoring avrcp notifications");

    let limit_reached = || args.count.is_some_and(|count| printer.printed() >= count);
    while running.load(Ordering::SeqCst) && !limit_reached() {
        if !backend.is_connected() {
            control.run_pending();
            if limit_reached() {
                break;
            }
            return Err(CliError::new(TRANSPORT_ERROR, "daemon disconnected"));
        }
        control.run_one(POLL_INTERVAL);
    }

    avrcp.cleanup(Arc::new(Lifecycle));
    control.run_pending();
    backend.close();
    Ok(SUCCESS)
}

/// Init and cleanup need no reporting beyond the default warning on error.
struct Lifecycle;

impl ResultHandler for Lifecycle {}

impl AvrcpResultHandler for Lifecycle {}

struct Printer {
    format: OutputFormat,
    printed: AtomicUsize,
}

impl Printer {
    fn print(&self, notification: AvrcpNotification) {
        print_notification(&notification, self.format);
        self.printed.fetch_add(1, Ordering::SeqCst);
    }

    fn printed(&self) -> usize {
        self.printed.load(Ordering::SeqCst)
    }
}

impl AvrcpNotificationHandler for Printer {
    fn remote_feature_notification(&self, address: Address, features: RemoteFeatures) {
        self.print(AvrcpNotification::RemoteFeatures { address, features });
    }

    fn get_play_status_notification(&self) {
        self.print(AvrcpNotification::GetPlayStatus);
    }

    fn list_player_app_attr_notification(&self) {
        self.print(AvrcpNotification::ListPlayerAppAttr);
    }

    fn list_player_app_values_notification(&self, attribute: PlayerAttribute) {
        self.print(AvrcpNotification::ListPlayerAppValues { attribute });
    }

    fn get_player_app_value_notification(&self, attributes: &[PlayerAttribute]) {
        self.print(AvrcpNotification::GetPlayerAppValue {
            attributes: attributes.to_vec(),
        });
    }

    fn get_player_app_attrs_text_notification(&self, attributes: &[PlayerAttribute]) {
        self.print(AvrcpNotification::GetPlayerAppAttrsText {
            attributes: attributes.to_vec(),
        });
    }

    fn get_player_app_values_text_notification(&self, attribute: u8, values: &[u8]) {
        self.print(AvrcpNotification::GetPlayerAppValuesText {
            attribute,
            values: values.to_vec(),
        });
    }

    fn set_player_app_value_notification(&self, settings: &PlayerSettings) {
        self.print(AvrcpNotification::SetPlayerAppValue {
            settings: settings.clone(),
        });
    }

    fn get_element_attr_notification(&self, attributes: &[MediaAttribute]) {
        self.print(AvrcpNotification::GetElementAttr {
            attributes: attributes.to_vec(),
        });
    }

    fn register_notification_notification(&self, event: AvrcpEvent, param: u32) {
        self.print(AvrcpNotification::RegisterNotification { event, param });
    }

    fn volume_change_notification(&self, volume: u8, ctype: u8) {
        self.print(AvrcpNotification::VolumeChange { volume, ctype });
    }

    fn passthrough_cmd_notification(&self, id: u8, key_state: u8) {
        self.print(AvrcpNotification::Passthrough { id, key_state });
    }
}
