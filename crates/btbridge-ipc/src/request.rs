//! Request and reply envelopes exchanged over the link.

use btbridge_daemon::avrcp::PlayStatus;
use btbridge_daemon::{Address, BluetoothStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One forwarded service call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Request {
    Start,
    Stop,
    GetAdapters,
    StartDiscovery,
    StopDiscovery,
    StartLeScan {
        service_uuids: Vec<Uuid>,
    },
    StopLeScan {
        scan_uuid: Uuid,
    },
    Pair {
        address: Address,
        timeout_ms: u32,
    },
    Unpair {
        address: Address,
    },
    FetchUuids {
        address: Address,
    },
    Connect {
        address: Address,
        cod: u32,
        service_uuid: u16,
    },
    Disconnect {
        address: Address,
        service_uuid: u16,
    },
    SendMetaData {
        title: String,
        artist: String,
        album: String,
        media_number: i64,
        total_media_count: i64,
        duration: i64,
    },
    SendPlayStatus {
        duration: i64,
        position: i64,
        play_status: PlayStatus,
    },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Start => "start",
            Request::Stop => "stop",
            Request::GetAdapters => "get_adapters",
            Request::StartDiscovery => "start_discovery",
            Request::StopDiscovery => "stop_discovery",
            Request::StartLeScan { .. } => "start_le_scan",
            Request::StopLeScan { .. } => "stop_le_scan",
            Request::Pair { .. } => "pair",
            Request::Unpair { .. } => "unpair",
            Request::FetchUuids { .. } => "fetch_uuids",
            Request::Connect { .. } => "connect",
            Request::Disconnect { .. } => "disconnect",
            Request::SendMetaData { .. } => "send_meta_data",
            Request::SendPlayStatus { .. } => "send_play_status",
        }
    }
}

/// An adapter as reported by `GetAdapters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterInfo {
    pub address: Address,
    pub name: String,
    pub enabled: bool,
}

/// Payload of a successful reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ReplyValue {
    None,
    Bool(bool),
    Uuid(Uuid),
    Uuids(Vec<Uuid>),
    Adapters(Vec<AdapterInfo>),
}

/// Payload of a failed reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyError {
    pub status: BluetoothStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl ReplyError {
    pub fn new(status: BluetoothStatus) -> Self {
        Self {
            status,
            message: String::new(),
        }
    }

    pub fn with_message(status: BluetoothStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The error a handler receives when its request never got a reply.
    pub fn abandoned() -> Self {
        Self::with_message(BluetoothStatus::Fail, "request abandoned")
    }
}

impl std::fmt::Display for ReplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.status)
        } else {
            write!(f, "{}: {}", self.status, self.message)
        }
    }
}

impl From<BluetoothStatus> for ReplyError {
    fn from(status: BluetoothStatus) -> Self {
        Self::new(status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    Success(ReplyValue),
    Error(ReplyError),
}

/// A request tagged with the id its reply will carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: u64,
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub id: u64,
    pub reply: Reply,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_json_shape() {
        let envelope = RequestEnvelope {
            id: 7,
            request: Request::Pair {
                address: "00:11:22:33:44:55".parse().unwrap(),
                timeout_ms: 3000,
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "request": {
                    "kind": "pair",
                    "address": "00:11:22:33:44:55",
                    "timeout_ms": 3000
                }
            })
        );
        let back: RequestEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn reply_json_shape() {
        let ok = Reply::Success(ReplyValue::Bool(true));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"success": {"type": "bool", "value": true}})
        );

        let err = Reply::Error(ReplyError::new(BluetoothStatus::Unsupported));
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({"error": {"status": "unsupported"}})
        );
    }

    #[test]
    fn le_scan_carries_uuids() {
        let uuid = Uuid::from_u128(0x0000_180d_0000_1000_8000_0080_5f9b_34fb);
        let request = Request::StartLeScan {
            service_uuids: vec![uuid],
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("0000180d-0000-1000-8000-00805f9b34fb"));
        assert_eq!(request.name(), "start_le_scan");
    }

    #[test]
    fn abandoned_error_is_generic_failure() {
        let err = ReplyError::abandoned();
        assert_eq!(err.status, BluetoothStatus::Fail);
        assert_eq!(err.to_string(), "fail: request abandoned");
    }
}
