use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::error::{DecodeError, EncodeError};

/// PDU header: service (1) + opcode (1) + length (2) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// The fixed header that precedes every payload on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    pub service: u8,
    pub opcode: u8,
    pub length: u16,
}

impl PduHeader {
    /// Parse a header from its wire bytes.
    pub fn from_bytes(bytes: [u8; HEADER_SIZE]) -> Self {
        Self {
            service: bytes[0],
            opcode: bytes[1],
            length: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }

    /// Wire bytes of this header.
    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let [lo, hi] = self.length.to_le_bytes();
        [self.service, self.opcode, lo, hi]
    }
}

/// An outbound PDU under construction.
///
/// Created with a capacity hint, filled in wire order through
/// [`Pack`](crate::Pack), then handed to the transport. A non-zero hint is a
/// hard upper bound: writes past it fail with [`EncodeError::BufferTooSmall`].
/// A hint of `0` lets the payload grow up to [`MAX_PAYLOAD`].
#[derive(Debug, Clone)]
pub struct Pdu {
    service: u8,
    opcode: u8,
    payload: BytesMut,
    limit: usize,
}

impl Pdu {
    pub fn new(service: u8, opcode: u8, capacity_hint: usize) -> Self {
        let limit = if capacity_hint == 0 {
            MAX_PAYLOAD
        } else {
            capacity_hint.min(MAX_PAYLOAD)
        };
        Self {
            service,
            opcode,
            payload: BytesMut::with_capacity(capacity_hint.min(MAX_PAYLOAD)),
            limit,
        }
    }

    pub fn service(&self) -> u8 {
        self.service
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Number of payload bytes packed so far.
    pub fn payload_length(&self) -> u16 {
        // `limit` never exceeds MAX_PAYLOAD.
        self.payload.len() as u16
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Upper bound on the payload size.
    pub fn capacity(&self) -> usize {
        self.limit
    }

    pub fn header(&self) -> PduHeader {
        PduHeader {
            service: self.service,
            opcode: self.opcode,
            length: self.payload_length(),
        }
    }

    /// Append raw bytes to the payload.
    pub fn put_slice(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let needed = self.payload.len() + bytes.len();
        if needed > self.limit {
            return Err(EncodeError::BufferTooSmall {
                needed,
                capacity: self.limit,
            });
        }
        self.payload.put_slice(bytes);
        Ok(())
    }

    /// Finish construction and view the PDU as the receiving side would.
    pub fn into_received(self) -> ReceivedPdu {
        ReceivedPdu::new(self.service, self.opcode, self.payload.freeze())
    }

    pub fn into_parts(self) -> (u8, u8, Bytes) {
        (self.service, self.opcode, self.payload.freeze())
    }
}

/// An inbound PDU, consumed front to back by [`Unpack`](crate::Unpack).
#[derive(Debug, Clone)]
pub struct ReceivedPdu {
    service: u8,
    opcode: u8,
    length: u16,
    payload: Bytes,
}

impl ReceivedPdu {
    /// Wrap a complete payload. Payloads beyond [`MAX_PAYLOAD`] are cut off
    /// by the framing layer before they ever reach here.
    pub fn new(service: u8, opcode: u8, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let length = u16::try_from(payload.len()).unwrap_or(u16::MAX);
        Self {
            service,
            opcode,
            length,
            payload,
        }
    }

    pub fn service(&self) -> u8 {
        self.service
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Payload length declared in the header.
    pub fn payload_length(&self) -> u16 {
        self.length
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.payload.remaining()
    }

    /// Consume `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<Bytes, DecodeError> {
        self.ensure(n)?;
        Ok(self.payload.split_to(n))
    }

    /// Consume exactly `N` bytes into an array.
    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        self.payload.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Log unread payload bytes left over after a successful decode.
    ///
    /// Newer daemons may append fields; those are skipped, not rejected.
    pub fn finish(&self) {
        let remaining = self.remaining();
        if remaining > 0 {
            warn!(
                service = self.service,
                opcode = self.opcode,
                remaining,
                "ignoring trailing bytes after PDU decode"
            );
        }
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(DecodeError::Truncated { needed, remaining });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_bytes_are_little_endian() {
        let header = PduHeader {
            service: 0x08,
            opcode: 0x0a,
            length: 0x0102,
        };
        assert_eq!(header.to_bytes(), [0x08, 0x0a, 0x02, 0x01]);
        assert_eq!(PduHeader::from_bytes(header.to_bytes()), header);
    }

    #[test]
    fn capacity_hint_is_enforced() {
        let mut pdu = Pdu::new(0x08, 0x0a, 2);
        pdu.put_slice(&[1, 2]).unwrap();
        let err = pdu.put_slice(&[3]).unwrap_err();
        assert_eq!(
            err,
            EncodeError::BufferTooSmall {
                needed: 3,
                capacity: 2
            }
        );
        assert_eq!(pdu.payload(), &[1, 2]);
    }

    #[test]
    fn zero_hint_grows_to_protocol_limit() {
        let mut pdu = Pdu::new(0x01, 0x02, 0);
        assert_eq!(pdu.capacity(), MAX_PAYLOAD);
        pdu.put_slice(&vec![0u8; 1024]).unwrap();
        assert_eq!(pdu.payload_length(), 1024);

        let mut full = Pdu::new(0x01, 0x02, 0);
        full.put_slice(&vec![0u8; MAX_PAYLOAD]).unwrap();
        assert!(full.put_slice(&[0]).is_err());
    }

    #[test]
    fn received_take_is_bounds_checked() {
        let mut pdu = ReceivedPdu::new(0x08, 0x81, vec![1, 2, 3]);
        assert_eq!(pdu.payload_length(), 3);
        assert_eq!(pdu.take_array::<2>().unwrap(), [1, 2]);
        assert_eq!(
            pdu.take(2).unwrap_err(),
            DecodeError::Truncated {
                needed: 2,
                remaining: 1
            }
        );
        assert_eq!(pdu.remaining(), 1);
        assert_eq!(pdu.payload_length(), 3);
    }

    #[test]
    fn into_received_keeps_header() {
        let mut pdu = Pdu::new(0x08, 0x0a, 1);
        pdu.put_slice(&[50]).unwrap();
        let received = pdu.into_received();
        assert_eq!(received.service(), 0x08);
        assert_eq!(received.opcode(), 0x0a);
        assert_eq!(received.payload_length(), 1);
    }
}
