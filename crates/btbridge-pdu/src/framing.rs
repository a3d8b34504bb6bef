use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FramingError, Result};
use crate::pdu::{PduHeader, ReceivedPdu, HEADER_SIZE, MAX_PAYLOAD};

/// Encode one PDU into the wire format.
///
/// ```text
/// ┌───────────┬──────────┬──────────┬──────────────────┐
/// │ Service   │ Opcode   │ Length   │ Payload          │
/// │ (1B)      │ (1B)     │ (2B LE)  │ (Length bytes)   │
/// └───────────┴──────────┴──────────┴──────────────────┘
/// ```
pub fn encode_pdu(service: u8, opcode: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let length = u16::try_from(payload.len()).map_err(|_| FramingError::PayloadTooLarge {
        size: payload.len(),
        max: MAX_PAYLOAD,
    })?;
    let header = PduHeader {
        service,
        opcode,
        length,
    };
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&header.to_bytes());
    dst.put_slice(payload);
    Ok(())
}

/// Decode one PDU from the front of `src`.
///
/// Returns `Ok(None)` until the header and its whole payload are buffered,
/// then consumes exactly those bytes.
pub fn decode_pdu(src: &mut BytesMut, max_payload: usize) -> Result<Option<ReceivedPdu>> {
    let Some(header) = peek_header(src) else {
        return Ok(None);
    };

    let payload_len = usize::from(header.length);
    if payload_len > max_payload {
        return Err(FramingError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() < HEADER_SIZE + payload_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    Ok(Some(ReceivedPdu::new(header.service, header.opcode, payload)))
}

pub(crate) fn peek_header(src: &[u8]) -> Option<PduHeader> {
    let bytes: [u8; HEADER_SIZE] = src.get(..HEADER_SIZE)?.try_into().ok()?;
    Some(PduHeader::from_bytes(bytes))
}

/// Configuration for PDU readers and writers.
#[derive(Debug, Clone)]
pub struct PduConfig {
    /// Largest accepted payload. Default: the 16-bit protocol limit.
    pub max_payload_size: usize,
    /// Read timeout applied to socket streams.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied to socket streams.
    pub write_timeout: Option<Duration>,
}

impl Default for PduConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
