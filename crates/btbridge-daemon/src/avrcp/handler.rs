use serde::Serialize;

use crate::address::Address;
use crate::avrcp::types::{
    AvrcpEvent, MediaAttribute, PlayerAttribute, PlayerSettings, RemoteFeatures,
};
use crate::pending::ResultHandler;

/// Completion callbacks for AVRCP commands.
///
/// Every method defaults to a no-op, `on_error` (from [`ResultHandler`])
/// defaults to logging a warning. Implement only what the caller needs.
pub trait AvrcpResultHandler: ResultHandler {
    fn init(&self) {}
    fn cleanup(&self) {}
    fn get_play_status_rsp(&self) {}
    fn list_player_app_attr_rsp(&self) {}
    fn list_player_app_value_rsp(&self) {}
    fn get_player_app_value_rsp(&self) {}
    fn get_player_app_attr_text_rsp(&self) {}
    fn get_player_app_value_text_rsp(&self) {}
    fn get_element_attr_rsp(&self) {}
    fn set_player_app_value_rsp(&self) {}
    fn register_notification_rsp(&self) {}
    fn set_volume(&self) {}
}

/// Unsolicited AVRCP events from the daemon. All methods default to no-ops.
#[allow(unused_variables)]
pub trait AvrcpNotificationHandler: Send + Sync + 'static {
    fn remote_feature_notification(&self, address: Address, features: RemoteFeatures) {}
    fn get_play_status_notification(&self) {}
    fn list_player_app_attr_notification(&self) {}
    fn list_player_app_values_notification(&self, attribute: PlayerAttribute) {}
    fn get_player_app_value_notification(&self, attributes: &[PlayerAttribute]) {}
    fn get_player_app_attrs_text_notification(&self, attributes: &[PlayerAttribute]) {}
    fn get_player_app_values_text_notification(&self, attribute: u8, values: &[u8]) {}
    fn set_player_app_value_notification(&self, settings: &PlayerSettings) {}
    fn get_element_attr_notification(&self, attributes: &[MediaAttribute]) {}
    fn register_notification_notification(&self, event: AvrcpEvent, param: u32) {}
    fn volume_change_notification(&self, volume: u8, ctype: u8) {}
    fn passthrough_cmd_notification(&self, id: u8, key_state: u8) {}
}

/// A decoded AVRCP response. Only the error response carries data, and it is
/// handled before this type is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvrcpResponse {
    GetPlayStatus,
    ListPlayerAppAttr,
    ListPlayerAppValue,
    GetPlayerAppValue,
    GetPlayerAppAttrText,
    GetPlayerAppValueText,
    GetElementAttr,
    SetPlayerAppValue,
    RegisterNotification,
    SetVolume,
}

impl AvrcpResponse {
    pub fn deliver(self, handler: &dyn AvrcpResultHandler) {
        match self {
            AvrcpResponse::GetPlayStatus => handler.get_play_status_rsp(),
            AvrcpResponse::ListPlayerAppAttr => handler.list_player_app_attr_rsp(),
            AvrcpResponse::ListPlayerAppValue => handler.list_player_app_value_rsp(),
            AvrcpResponse::GetPlayerAppValue => handler.get_player_app_value_rsp(),
            AvrcpResponse::GetPlayerAppAttrText => handler.get_player_app_attr_text_rsp(),
            AvrcpResponse::GetPlayerAppValueText => handler.get_player_app_value_text_rsp(),
            AvrcpResponse::GetElementAttr => handler.get_element_attr_rsp(),
            AvrcpResponse::SetPlayerAppValue => handler.set_player_app_value_rsp(),
            AvrcpResponse::RegisterNotification => handler.register_notification_rsp(),
            AvrcpResponse::SetVolume => handler.set_volume(),
        }
    }
}

/// A decoded AVRCP notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notification", rename_all = "snake_case")]
pub enum AvrcpNotification {
    RemoteFeatures {
        address: Address,
        features: RemoteFeatures,
    },
    GetPlayStatus,
    ListPlayerAppAttr,
    ListPlayerAppValues {
        attribute: PlayerAttribute,
    },
    GetPlayerAppValue {
        attributes: Vec<PlayerAttribute>,
    },
    GetPlayerAppAttrsText {
        attributes: Vec<PlayerAttribute>,
    },
    GetPlayerAppValuesText {
        attribute: u8,
        values: Vec<u8>,
    },
    SetPlayerAppValue {
        settings: PlayerSettings,
    },
    GetElementAttr {
        attributes: Vec<MediaAttribute>,
    },
    RegisterNotification {
        event: AvrcpEvent,
        param: u32,
    },
    VolumeChange {
        volume: u8,
        ctype: u8,
    },
    Passthrough {
        id: u8,
        key_state: u8,
    },
}

impl AvrcpNotification {
    pub fn deliver(&self, handler: &dyn AvrcpNotificationHandler) {
        match self {
            AvrcpNotification::RemoteFeatures { address, features } => {
                handler.remote_feature_notification(*address, *features)
            }
            AvrcpNotification::GetPlayStatus => handler.get_play_status_notification(),
            AvrcpNotification::ListPlayerAppAttr => handler.list_player_app_attr_notification(),
            AvrcpNotification::ListPlayerAppValues { attribute } => {
                handler.list_player_app_values_notification(*attribute)
            }
            AvrcpNotification::GetPlayerAppValue { attributes } => {
                handler.get_player_app_value_notification(attributes)
            }
            AvrcpNotification::GetPlayerAppAttrsText { attributes } => {
                handler.get_player_app_attrs_text_notification(attributes)
            }
            AvrcpNotification::GetPlayerAppValuesText { attribute, values } => {
                handler.get_player_app_values_text_notification(*attribute, values)
            }
            AvrcpNotification::SetPlayerAppValue { settings } => {
                handler.set_player_app_value_notification(settings)
            }
            AvrcpNotification::GetElementAttr { attributes } => {
                handler.get_element_attr_notification(attributes)
            }
            AvrcpNotification::RegisterNotification { event, param } => {
                handler.register_notification_notification(*event, *param)
            }
            AvrcpNotification::VolumeChange { volume, ctype } => {
                handler.volume_change_notification(*volume, *ctype)
            }
            AvrcpNotification::Passthrough { id, key_state } => {
                handler.passthrough_cmd_notification(*id, *key_state)
            }
        }
    }
}
