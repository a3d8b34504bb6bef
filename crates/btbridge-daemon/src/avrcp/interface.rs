use std::sync::Arc;

use crate::avrcp::handler::{AvrcpNotificationHandler, AvrcpResultHandler};
use crate::avrcp::module::AvrcpModule;
use crate::avrcp::types::{
    AvrcpStatus, ElementAttribute, NotificationParam, NotificationType, PlayStatus,
    PlayerAttribute,
};
use crate::avrcp::SERVICE_ID;
use crate::connection::DaemonSender;
use crate::control::ControlHandle;
use crate::error::Result;
use crate::pending::dispatch_error;

/// Application-facing AVRCP commands.
///
/// Every call completes its handler exactly once, on the control thread,
/// whether the command fails before reaching the daemon or afterwards.
pub trait AvrcpInterface: Send + Sync {
    /// Register the module and the notification handler.
    fn init(
        &self,
        notifications: Option<Arc<dyn AvrcpNotificationHandler>>,
        handler: Arc<dyn AvrcpResultHandler>,
    );

    /// Unregister the module and drop the notification handler.
    fn cleanup(&self, handler: Arc<dyn AvrcpResultHandler>);

    fn set_notification_handler(&self, handler: Option<Arc<dyn AvrcpNotificationHandler>>);

    fn get_play_status_rsp(
        &self,
        status: PlayStatus,
        song_len: u32,
        song_pos: u32,
        handler: Arc<dyn AvrcpResultHandler>,
    );

    fn list_player_app_attr_rsp(
        &self,
        attributes: &[PlayerAttribute],
        handler: Arc<dyn AvrcpResultHandler>,
    );

    fn list_player_app_value_rsp(&self, values: &[u8], handler: Arc<dyn AvrcpResultHandler>);

    fn get_player_app_value_rsp(
        &self,
        attributes: &[u8],
        values: &[u8],
        handler: Arc<dyn AvrcpResultHandler>,
    );

    fn get_player_app_attr_text_rsp(
        &self,
        ids: &[u8],
        texts: &[&str],
        handler: Arc<dyn AvrcpResultHandler>,
    );

    fn get_player_app_value_text_rsp(
        &self,
        ids: &[u8],
        texts: &[&str],
        handler: Arc<dyn AvrcpResultHandler>,
    );

    fn get_element_attr_rsp(
        &self,
        attributes: &[ElementAttribute],
        handler: Arc<dyn AvrcpResultHandler>,
    );

    fn set_player_app_value_rsp(&self, status: AvrcpStatus, handler: Arc<dyn AvrcpResultHandler>);

    fn register_notification_rsp(
        &self,
        kind: NotificationType,
        param: &NotificationParam,
        handler: Arc<dyn AvrcpResultHandler>,
    );

    fn set_volume(&self, volume: u8, handler: Arc<dyn AvrcpResultHandler>);
}

/// [`AvrcpInterface`] backed by the daemon's AVRCP module.
pub struct DaemonAvrcpInterface {
    module: Arc<AvrcpModule>,
    connection: DaemonSender,
    control: ControlHandle,
}

impl DaemonAvrcpInterface {
    pub fn new(
        module: Arc<AvrcpModule>,
        connection: DaemonSender,
        control: ControlHandle,
    ) -> Self {
        Self {
            module,
            connection,
            control,
        }
    }

    pub fn module(&self) -> &Arc<AvrcpModule> {
        &self.module
    }

    fn complete(&self, handler: Arc<dyn AvrcpResultHandler>, outcome: Result<()>) {
        if let Err(err) = outcome {
            dispatch_error(&self.control, handler, &err);
        }
    }
}

impl AvrcpInterface for DaemonAvrcpInterface {
    fn init(
        &self,
        notifications: Option<Arc<dyn AvrcpNotificationHandler>>,
        handler: Arc<dyn AvrcpResultHandler>,
    ) {
        self.module.set_notification_handler(notifications);
        self.connection.register(self.module.clone());
        self.control.dispatch(move || handler.init());
    }

    fn cleanup(&self, handler: Arc<dyn AvrcpResultHandler>) {
        self.connection.unregister(SERVICE_ID);
        self.module.set_notification_handler(None);
        self.control.dispatch(move || handler.cleanup());
    }

    fn set_notification_handler(&self, handler: Option<Arc<dyn AvrcpNotificationHandler>>) {
        self.module.set_notification_handler(handler);
    }

    fn get_play_status_rsp(
        &self,
        status: PlayStatus,
        song_len: u32,
        song_pos: u32,
        handler: Arc<dyn AvrcpResultHandler>,
    ) {
        let outcome =
            self.module
                .get_play_status_rsp(status, song_len, song_pos, Some(Arc::clone(&handler)));
        self.complete(handler, outcome);
    }

    fn list_player_app_attr_rsp(
        &self,
        attributes: &[PlayerAttribute],
        handler: Arc<dyn AvrcpResultHandler>,
    ) {
        let outcome = self
            .module
            .list_player_app_attr_rsp(attributes, Some(Arc::clone(&handler)));
        self.complete(handler, outcome);
    }

    fn list_player_app_value_rsp(&self, values: &[u8], handler: Arc<dyn AvrcpResultHandler>) {
        let outcome = self
            .module
            .list_player_app_value_rsp(values, Some(Arc::clone(&handler)));
        self.complete(handler, outcome);
    }

    fn get_player_app_value_rsp(
        &self,
        attributes: &[u8],
        values: &[u8],
        handler: Arc<dyn AvrcpResultHandler>,
    ) {
        let outcome =
            self.module
                .get_player_app_value_rsp(attributes, values, Some(Arc::clone(&handler)));
        self.complete(handler, outcome);
    }

    fn get_player_app_attr_text_rsp(
        &self,
        ids: &[u8],
        texts: &[&str],
        handler: Arc<dyn AvrcpResultHandler>,
    ) {
        let outcome = self
            .module
            .get_player_app_attr_text_rsp(ids, texts, Some(Arc::clone(&handler)));
        self.complete(handler, outcome);
    }

    fn get_player_app_value_text_rsp(
        &self,
        ids: &[u8],
        texts: &[&str],
        handler: Arc<dyn AvrcpResultHandler>,
    ) {
        let outcome = self
            .module
            .get_player_app_value_text_rsp(ids, texts, Some(Arc::clone(&handler)));
        self.complete(handler, outcome);
    }

    fn get_element_attr_rsp(
        &self,
        attributes: &[ElementAttribute],
        handler: Arc<dyn AvrcpResultHandler>,
    ) {
        let outcome = self
            .module
            .get_element_attr_rsp(attributes, Some(Arc::clone(&handler)));
        self.complete(handler, outcome);
    }

    fn set_player_app_value_rsp(&self, status: AvrcpStatus, handler: Arc<dyn AvrcpResultHandler>) {
        let outcome = self
            .module
            .set_player_app_value_rsp(status, Some(Arc::clone(&handler)));
        self.complete(handler, outcome);
    }

    fn register_notification_rsp(
        &self,
        kind: NotificationType,
        param: &NotificationParam,
        handler: Arc<dyn AvrcpResultHandler>,
    ) {
        let outcome = self
            .module
            .register_notification_rsp(kind, param, Some(Arc::clone(&handler)));
        self.complete(handler, outcome);
    }

    fn set_volume(&self, volume: u8, handler: Arc<dyn AvrcpResultHandler>) {
        let outcome = self.module.set_volume(volume, Some(Arc::clone(&handler)));
        self.complete(handler, outcome);
    }
}
