//! The Bluetooth service façade shared by both sides of the link.

use std::sync::Arc;

use btbridge_daemon::avrcp::PlayStatus;
use btbridge_daemon::Address;
use tracing::warn;
use uuid::Uuid;

use crate::request::{ReplyError, ReplyValue, Request};

/// Completion of one service call: exactly one of the two methods fires,
/// once, on the control thread.
pub trait ReplyHandler: Send + Sync + 'static {
    fn on_success(&self, value: ReplyValue);

    fn on_error(&self, error: ReplyError) {
        warn!(%error, "bluetooth request failed");
    }
}

/// Bluetooth operations available to application code.
///
/// Every call is expressed as a [`Request`]; the named methods are shorthand
/// for building one. The last three methods need direct daemon access and
/// exist only in the privileged process.
pub trait BluetoothService: Send + Sync {
    fn request(&self, request: Request, handler: Arc<dyn ReplyHandler>);

    fn get_service_channel(
        &self,
        address: Address,
        service_uuid: Uuid,
        handler: Arc<dyn ReplyHandler>,
    );

    fn update_sdp_records(&self, address: Address) -> bool;

    fn update_play_status(&self, duration: u32, position: u32, status: PlayStatus);

    fn start(&self, handler: Arc<dyn ReplyHandler>) {
        self.request(Request::Start, handler);
    }

    fn stop(&self, handler: Arc<dyn ReplyHandler>) {
        self.request(Request::Stop, handler);
    }

    fn get_adapters(&self, handler: Arc<dyn ReplyHandler>) {
        self.request(Request::GetAdapters, handler);
    }

    fn start_discovery(&self, handler: Arc<dyn ReplyHandler>) {
        self.request(Request::StartDiscovery, handler);
    }

    fn stop_discovery(&self, handler: Arc<dyn ReplyHandler>) {
        self.request(Request::StopDiscovery, handler);
    }

    fn start_le_scan(&self, service_uuids: Vec<Uuid>, handler: Arc<dyn ReplyHandler>) {
        self.request(Request::StartLeScan { service_uuids }, handler);
    }

    fn stop_le_scan(&self, scan_uuid: Uuid, handler: Arc<dyn ReplyHandler>) {
        self.request(Request::StopLeScan { scan_uuid }, handler);
    }

    fn pair(&self, address: Address, timeout_ms: u32, handler: Arc<dyn ReplyHandler>) {
        self.request(
            Request::Pair {
                address,
                timeout_ms,
            },
            handler,
        );
    }

    fn unpair(&self, address: Address, handler: Arc<dyn ReplyHandler>) {
        self.request(Request::Unpair { address }, handler);
    }

    fn fetch_uuids(&self, address: Address, handler: Arc<dyn ReplyHandler>) {
        self.request(Request::FetchUuids { address }, handler);
    }

    fn connect(
        &self,
        address: Address,
        cod: u32,
        service_uuid: u16,
        handler: Arc<dyn ReplyHandler>,
    ) {
        self.request(
            Request::Connect {
                address,
                cod,
                service_uuid,
            },
            handler,
        );
    }

    fn disconnect(&self, address: Address, service_uuid: u16, handler: Arc<dyn ReplyHandler>) {
        self.request(
            Request::Disconnect {
                address,
                service_uuid,
            },
            handler,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn send_meta_data(
        &self,
        title: &str,
        artist: &str,
        album: &str,
        media_number: i64,
        total_media_count: i64,
        duration: i64,
        handler: Arc<dyn ReplyHandler>,
    ) {
        self.request(
            Request::SendMetaData {
                title: title.to_string(),
                artist: artist.to_string(),
                album: album.to_string(),
                media_number,
                total_media_count,
                duration,
            },
            handler,
        );
    }

    fn send_play_status(
        &self,
        duration: i64,
        position: i64,
        play_status: PlayStatus,
        handler: Arc<dyn ReplyHandler>,
    ) {
        self.request(
            Request::SendPlayStatus {
                duration,
                position,
                play_status,
            },
            handler,
        );
    }
}
