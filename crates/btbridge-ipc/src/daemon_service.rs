//! The privileged [`BluetoothService`], backed by the daemon.

use std::sync::Arc;

use btbridge_daemon::avrcp::{
    AvrcpInterface, AvrcpResultHandler, ElementAttribute, MediaAttribute, NotificationParam,
    NotificationType, PlayStatus,
};
use btbridge_daemon::{Address, BluetoothBackend, BluetoothStatus, ControlHandle, ResultHandler};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::request::{ReplyError, ReplyValue, Request};
use crate::service::{BluetoothService, ReplyHandler};

/// Serves media requests through the daemon's AVRCP interface. Requests the
/// daemon backend does not carry are answered with
/// [`BluetoothStatus::Unsupported`].
pub struct DaemonService {
    backend: Arc<dyn BluetoothBackend>,
    avrcp: Arc<dyn AvrcpInterface>,
    control: ControlHandle,
}

impl DaemonService {
    pub fn new(backend: Arc<dyn BluetoothBackend>, control: ControlHandle) -> Self {
        let avrcp = backend.avrcp();
        Self {
            backend,
            avrcp,
            control,
        }
    }

    pub fn backend(&self) -> &Arc<dyn BluetoothBackend> {
        &self.backend
    }

    fn reject(&self, request: &Request, handler: Arc<dyn ReplyHandler>) {
        debug!(request = request.name(), "request not supported by daemon backend");
        let error = ReplyError::with_message(
            BluetoothStatus::Unsupported,
            format!("{} is not supported", request.name()),
        );
        self.control.dispatch(move || handler.on_error(error));
    }
}

impl BluetoothService for DaemonService {
    fn request(&self, request: Request, handler: Arc<dyn ReplyHandler>) {
        match request {
            Request::SendPlayStatus {
                duration,
                position,
                play_status,
            } => {
                self.avrcp.get_play_status_rsp(
                    play_status,
                    clamp_u32(duration),
                    clamp_u32(position),
                    Arc::new(AvrcpReply(handler)),
                );
            }
            Request::SendMetaData {
                title,
                artist,
                album,
                media_number,
                total_media_count,
                duration,
            } => {
                let attributes = [
                    ElementAttribute::new(MediaAttribute::Title, title),
                    ElementAttribute::new(MediaAttribute::Artist, artist),
                    ElementAttribute::new(MediaAttribute::Album, album),
                    ElementAttribute::new(MediaAttribute::TrackNum, media_number.to_string()),
                    ElementAttribute::new(MediaAttribute::NumTracks, total_media_count.to_string()),
                    ElementAttribute::new(MediaAttribute::PlayingTime, duration.to_string()),
                ];
                self.avrcp
                    .get_element_attr_rsp(&attributes, Arc::new(AvrcpReply(handler)));
            }
            other => self.reject(&other, handler),
        }
    }

    fn get_service_channel(
        &self,
        address: Address,
        service_uuid: Uuid,
        handler: Arc<dyn ReplyHandler>,
    ) {
        debug!(
            %address,
            %service_uuid,
            "service channel lookup not supported by daemon backend"
        );
        let error = ReplyError::new(BluetoothStatus::Unsupported);
        self.control.dispatch(move || handler.on_error(error));
    }

    fn update_sdp_records(&self, address: Address) -> bool {
        debug!(%address, "SDP records are managed by the daemon");
        false
    }

    fn update_play_status(&self, duration: u32, position: u32, status: PlayStatus) {
        debug!(duration, position, ?status, "updating play status");
        self.avrcp.register_notification_rsp(
            NotificationType::Changed,
            &NotificationParam::PlayStatusChanged(status),
            Arc::new(StatusUpdate),
        );
        self.avrcp.register_notification_rsp(
            NotificationType::Changed,
            &NotificationParam::PlayPosChanged(position),
            Arc::new(StatusUpdate),
        );
    }
}

fn clamp_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Completes a service reply from an AVRCP command's outcome.
struct AvrcpReply(Arc<dyn ReplyHandler>);

impl ResultHandler for AvrcpReply {
    fn on_error(&self, status: BluetoothStatus) {
        self.0.on_error(ReplyError::new(status));
    }
}

impl AvrcpResultHandler for AvrcpReply {
    fn get_play_status_rsp(&self) {
        self.0.on_success(ReplyValue::None);
    }

    fn get_element_attr_rsp(&self) {
        self.0.on_success(ReplyValue::None);
    }
}

/// Result sink for unsolicited status updates; nobody waits on these.
struct StatusUpdate;

impl ResultHandler for StatusUpdate {
    fn on_error(&self, status: BluetoothStatus) {
        warn!(%status, "play status update rejected by daemon");
    }
}

impl AvrcpResultHandler for StatusUpdate {}
