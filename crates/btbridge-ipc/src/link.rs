//! Framing of link messages as PDUs on a dedicated service id.
//!
//! Each message is one PDU whose payload is a JSON document:
//! - [`opcode::HANDSHAKE`]: handshake request or response
//! - [`opcode::REQUEST`]: a [`RequestEnvelope`]
//! - [`opcode::REPLY`]: a [`ReplyEnvelope`]

use std::io::{Read, Write};

use btbridge_pdu::{PduReader, PduWriter, ReceivedPdu};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{IpcError, Result};
use crate::request::{ReplyEnvelope, RequestEnvelope};

/// Service id of link PDUs. Outside the range the daemon assigns to profiles.
pub const LINK_SERVICE: u8 = 0x7f;

pub mod opcode {
    pub const HANDSHAKE: u8 = 0x00;
    pub const REQUEST: u8 = 0x01;
    pub const REPLY: u8 = 0x02;
}

/// Serialize `value` and send it as one link PDU.
pub fn send_json<T: Serialize, W: Write>(
    writer: &mut PduWriter<W>,
    opcode: u8,
    value: &T,
) -> Result<()> {
    let payload = serde_json::to_vec(value)?;
    writer.send(LINK_SERVICE, opcode, &payload)?;
    Ok(())
}

/// Check that `pdu` is a link PDU with `opcode` and parse its payload.
pub fn parse_json<T: DeserializeOwned>(mut pdu: ReceivedPdu, opcode: u8) -> Result<T> {
    if pdu.service() != LINK_SERVICE || pdu.opcode() != opcode {
        return Err(IpcError::UnexpectedPdu {
            service: pdu.service(),
            opcode: pdu.opcode(),
        });
    }
    let remaining = pdu.remaining();
    let payload = pdu.take(remaining)?;
    Ok(serde_json::from_slice(&payload)?)
}

pub fn write_request<W: Write>(
    writer: &mut PduWriter<W>,
    envelope: &RequestEnvelope,
) -> Result<()> {
    send_json(writer, opcode::REQUEST, envelope)
}

pub fn write_reply<W: Write>(writer: &mut PduWriter<W>, envelope: &ReplyEnvelope) -> Result<()> {
    send_json(writer, opcode::REPLY, envelope)
}

pub fn read_request<R: Read>(reader: &mut PduReader<R>) -> Result<RequestEnvelope> {
    parse_json(reader.read_pdu()?, opcode::REQUEST)
}

pub fn read_reply<R: Read>(reader: &mut PduReader<R>) -> Result<ReplyEnvelope> {
    parse_json(reader.read_pdu()?, opcode::REPLY)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use btbridge_daemon::BluetoothStatus;

    use super::*;
    use crate::request::{Reply, ReplyError, Request};

    #[test]
    fn request_roundtrip_through_pdu() {
        let mut writer = PduWriter::new(Vec::new());
        let envelope = RequestEnvelope {
            id: 3,
            request: Request::StartDiscovery,
        };
        write_request(&mut writer, &envelope).unwrap();

        let bytes = writer.into_inner();
        assert_eq!(bytes[0], LINK_SERVICE);
        assert_eq!(bytes[1], opcode::REQUEST);

        let mut reader = PduReader::new(Cursor::new(bytes));
        assert_eq!(read_request(&mut reader).unwrap(), envelope);
    }

    #[test]
    fn wrong_opcode_rejected() {
        let mut writer = PduWriter::new(Vec::new());
        write_reply(
            &mut writer,
            &ReplyEnvelope {
                id: 1,
                reply: Reply::Error(ReplyError::new(BluetoothStatus::Busy)),
            },
        )
        .unwrap();

        let mut reader = PduReader::new(Cursor::new(writer.into_inner()));
        assert!(matches!(
            read_request(&mut reader),
            Err(IpcError::UnexpectedPdu {
                service: LINK_SERVICE,
                opcode: opcode::REPLY
            })
        ));
    }

    #[test]
    fn foreign_service_rejected() {
        let mut writer = PduWriter::new(Vec::new());
        writer.send(0x08, opcode::REPLY, b"{}").unwrap();

        let mut reader = PduReader::new(Cursor::new(writer.into_inner()));
        assert!(matches!(
            read_reply(&mut reader),
            Err(IpcError::UnexpectedPdu { service: 0x08, .. })
        ));
    }

    #[test]
    fn invalid_json_rejected() {
        let mut writer = PduWriter::new(Vec::new());
        writer.send(LINK_SERVICE, opcode::REPLY, b"{not-json").unwrap();

        let mut reader = PduReader::new(Cursor::new(writer.into_inner()));
        assert!(matches!(read_reply(&mut reader), Err(IpcError::Json(_))));
    }
}
