//! AVRCP target profile: remote control and media metadata.

pub mod handler;
#[cfg(unix)]
pub mod interface;
pub mod module;
pub mod types;

pub use handler::{AvrcpNotification, AvrcpNotificationHandler, AvrcpResponse, AvrcpResultHandler};
#[cfg(unix)]
pub use interface::{AvrcpInterface, DaemonAvrcpInterface};
pub use module::AvrcpModule;
pub use types::{
    AvrcpEvent, AvrcpStatus, ElementAttribute, MediaAttribute, NotificationParam,
    NotificationType, PlayStatus, PlayerAttribute, PlayerSettings, RemoteFeatures,
};

use crate::dispatch::OpcodeLayout;

/// Service id of the AVRCP module on the daemon socket.
pub const SERVICE_ID: u8 = 0x08;

/// Opcode partitioning of the AVRCP service.
pub const LAYOUT: OpcodeLayout = OpcodeLayout {
    error_opcode: Some(opcode::ERROR),
    notification_bit: 0x80,
    notification_base: 0x81,
};

/// AVRCP opcodes. Commands and their responses share a number.
pub mod opcode {
    pub const ERROR: u8 = 0x00;
    pub const GET_PLAY_STATUS_RSP: u8 = 0x01;
    pub const LIST_PLAYER_APP_ATTR_RSP: u8 = 0x02;
    pub const LIST_PLAYER_APP_VALUE_RSP: u8 = 0x03;
    pub const GET_PLAYER_APP_VALUE_RSP: u8 = 0x04;
    pub const GET_PLAYER_APP_ATTR_TEXT_RSP: u8 = 0x05;
    pub const GET_PLAYER_APP_VALUE_TEXT_RSP: u8 = 0x06;
    pub const GET_ELEMENT_ATTR_RSP: u8 = 0x07;
    pub const SET_PLAYER_APP_VALUE_RSP: u8 = 0x08;
    pub const REGISTER_NOTIFICATION_RSP: u8 = 0x09;
    pub const SET_VOLUME: u8 = 0x0a;

    pub const REMOTE_FEATURES_NTF: u8 = 0x81;
    pub const GET_PLAY_STATUS_NTF: u8 = 0x82;
    pub const LIST_PLAYER_APP_ATTR_NTF: u8 = 0x83;
    pub const LIST_PLAYER_APP_VALUES_NTF: u8 = 0x84;
    pub const GET_PLAYER_APP_VALUE_NTF: u8 = 0x85;
    pub const GET_PLAYER_APP_ATTRS_TEXT_NTF: u8 = 0x86;
    pub const GET_PLAYER_APP_VALUES_TEXT_NTF: u8 = 0x87;
    pub const SET_PLAYER_APP_VALUE_NTF: u8 = 0x88;
    pub const GET_ELEMENT_ATTR_NTF: u8 = 0x89;
    pub const REGISTER_NOTIFICATION_NTF: u8 = 0x8a;
    pub const VOLUME_CHANGE_NTF: u8 = 0x8b;
    pub const PASSTHROUGH_CMD_NTF: u8 = 0x8c;

    pub const RESPONSES: &[u8] = &[
        GET_PLAY_STATUS_RSP,
        LIST_PLAYER_APP_ATTR_RSP,
        LIST_PLAYER_APP_VALUE_RSP,
        GET_PLAYER_APP_VALUE_RSP,
        GET_PLAYER_APP_ATTR_TEXT_RSP,
        GET_PLAYER_APP_VALUE_TEXT_RSP,
        GET_ELEMENT_ATTR_RSP,
        SET_PLAYER_APP_VALUE_RSP,
        REGISTER_NOTIFICATION_RSP,
        SET_VOLUME,
    ];

    pub const NOTIFICATIONS: &[u8] = &[
        REMOTE_FEATURES_NTF,
        GET_PLAY_STATUS_NTF,
        LIST_PLAYER_APP_ATTR_NTF,
        LIST_PLAYER_APP_VALUES_NTF,
        GET_PLAYER_APP_VALUE_NTF,
        GET_PLAYER_APP_ATTRS_TEXT_NTF,
        GET_PLAYER_APP_VALUES_TEXT_NTF,
        SET_PLAYER_APP_VALUE_NTF,
        GET_ELEMENT_ATTR_NTF,
        REGISTER_NOTIFICATION_NTF,
        VOLUME_CHANGE_NTF,
        PASSTHROUGH_CMD_NTF,
    ];
}
