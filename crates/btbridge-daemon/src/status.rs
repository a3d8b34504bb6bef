use std::fmt;

use btbridge_pdu::wire_enum;
use serde::{Deserialize, Serialize};

wire_enum! {
    /// Status vocabulary shared by the daemon and every result handler.
    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum BluetoothStatus: u8 {
        Success = 0x00,
        Fail = 0x01,
        NotReady = 0x02,
        NoMemory = 0x03,
        Busy = 0x04,
        Done = 0x05,
        Unsupported = 0x06,
        ParmInvalid = 0x07,
        Unhandled = 0x08,
        AuthFailure = 0x09,
        RemoteDeviceDown = 0x0a,
        AuthRejected = 0x0b,
    }
}

impl BluetoothStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BluetoothStatus::Success => "success",
            BluetoothStatus::Fail => "fail",
            BluetoothStatus::NotReady => "not_ready",
            BluetoothStatus::NoMemory => "no_memory",
            BluetoothStatus::Busy => "busy",
            BluetoothStatus::Done => "done",
            BluetoothStatus::Unsupported => "unsupported",
            BluetoothStatus::ParmInvalid => "parm_invalid",
            BluetoothStatus::Unhandled => "unhandled",
            BluetoothStatus::AuthFailure => "auth_failure",
            BluetoothStatus::RemoteDeviceDown => "remote_device_down",
            BluetoothStatus::AuthRejected => "auth_rejected",
        }
    }
}

impl fmt::Display for BluetoothStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_are_contiguous() {
        for (index, status) in BluetoothStatus::ALL.iter().enumerate() {
            assert_eq!(u8::from(*status) as usize, index);
        }
        assert!(BluetoothStatus::try_from(0x0cu8).is_err());
    }

    #[test]
    fn serde_name_matches_display() {
        for status in BluetoothStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }
}
