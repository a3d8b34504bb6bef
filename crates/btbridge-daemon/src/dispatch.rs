//! Opcode classification and dense decoder tables.

use btbridge_pdu::{DecodeError, ReceivedPdu};
use tracing::warn;

/// Decodes one payload into a module's tagged result type.
pub type Decoder<T> = fn(&mut ReceivedPdu) -> Result<T, DecodeError>;

/// How a module partitions its opcode space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeLayout {
    /// Opcode of the generic error response, if the module reserves one.
    pub error_opcode: Option<u8>,
    /// Bit that marks unsolicited notifications.
    pub notification_bit: u8,
    /// First notification opcode; slot 0 of the notification table.
    pub notification_base: u8,
}

/// Where an opcode goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcodeKind {
    /// The reserved generic error response.
    Error,
    /// Index into the response table.
    Response(usize),
    /// Index into the notification table.
    Notification(usize),
    /// Has the notification bit but sits below the base.
    Unroutable,
}

impl OpcodeLayout {
    pub fn is_notification(&self, opcode: u8) -> bool {
        opcode & self.notification_bit != 0
    }

    pub fn classify(&self, opcode: u8) -> OpcodeKind {
        if self.is_notification(opcode) {
            return match opcode.checked_sub(self.notification_base) {
                Some(index) => OpcodeKind::Notification(usize::from(index)),
                None => OpcodeKind::Unroutable,
            };
        }
        if self.error_opcode == Some(opcode) {
            return OpcodeKind::Error;
        }
        OpcodeKind::Response(usize::from(opcode))
    }
}

/// A dense, immutable opcode table.
///
/// Slots are indexed from zero; a `None` slot is a known gap. Lookups past
/// the end or into a gap are dispatch misses: logged and dropped.
pub struct DispatchTable<T: 'static> {
    name: &'static str,
    slots: &'static [Option<Decoder<T>>],
}

impl<T: 'static> DispatchTable<T> {
    pub const fn new(name: &'static str, slots: &'static [Option<Decoder<T>>]) -> Self {
        Self { name, slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn has_slot(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    /// Decode `pdu` with the decoder in slot `index`.
    ///
    /// Returns `None` on a dispatch miss or a decode error; both are logged
    /// and neither affects later PDUs. Trailing bytes after a successful
    /// decode are logged only.
    pub fn decode(&self, index: usize, pdu: &mut ReceivedPdu) -> Option<T> {
        let Some(Some(decoder)) = self.slots.get(index) else {
            warn!(
                table = self.name,
                service = pdu.service(),
                opcode = pdu.opcode(),
                index,
                "no handler for opcode; dropping PDU"
            );
            return None;
        };

        match decoder(pdu) {
            Ok(value) => {
                pdu.finish();
                Some(value)
            }
            Err(err) => {
                warn!(
                    table = self.name,
                    service = pdu.service(),
                    opcode = pdu.opcode(),
                    error = %err,
                    "failed to decode PDU; dropping it"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use btbridge_pdu::Unpack;

    use super::*;

    const LAYOUT: OpcodeLayout = OpcodeLayout {
        error_opcode: Some(0x00),
        notification_bit: 0x80,
        notification_base: 0x81,
    };

    fn byte(pdu: &mut ReceivedPdu) -> Result<u8, DecodeError> {
        u8::unpack(pdu)
    }

    fn word(pdu: &mut ReceivedPdu) -> Result<u8, DecodeError> {
        Ok(u16::unpack(pdu)? as u8)
    }

    static TABLE: DispatchTable<u8> = DispatchTable::new(
        "test",
        &[Some(byte as Decoder<u8>), None, Some(word as Decoder<u8>)],
    );

    #[test]
    fn classify_partitions_opcode_space() {
        assert_eq!(LAYOUT.classify(0x00), OpcodeKind::Error);
        assert_eq!(LAYOUT.classify(0x0a), OpcodeKind::Response(10));
        assert_eq!(LAYOUT.classify(0x81), OpcodeKind::Notification(0));
        assert_eq!(LAYOUT.classify(0x8c), OpcodeKind::Notification(11));
        assert_eq!(LAYOUT.classify(0x80), OpcodeKind::Unroutable);
    }

    #[test]
    fn error_opcode_is_configurable() {
        let no_error = OpcodeLayout {
            error_opcode: None,
            ..LAYOUT
        };
        assert_eq!(no_error.classify(0x00), OpcodeKind::Response(0));

        let high_error = OpcodeLayout {
            error_opcode: Some(0x7f),
            ..LAYOUT
        };
        assert_eq!(high_error.classify(0x7f), OpcodeKind::Error);
        assert_eq!(high_error.classify(0x00), OpcodeKind::Response(0));
    }

    #[test]
    fn decode_hits_and_misses() {
        let mut pdu = ReceivedPdu::new(1, 0, vec![7]);
        assert_eq!(TABLE.decode(0, &mut pdu), Some(7));

        let mut gap = ReceivedPdu::new(1, 1, vec![7]);
        assert_eq!(TABLE.decode(1, &mut gap), None);

        let mut past_end = ReceivedPdu::new(1, 3, vec![7]);
        assert_eq!(TABLE.decode(TABLE.len(), &mut past_end), None);
    }

    #[test]
    fn decode_error_drops_pdu() {
        let mut short = ReceivedPdu::new(1, 2, vec![7]);
        assert_eq!(TABLE.decode(2, &mut short), None);
    }

    #[test]
    fn trailing_bytes_still_decode() {
        let mut long = ReceivedPdu::new(1, 0, vec![7, 8, 9]);
        assert_eq!(TABLE.decode(0, &mut long), Some(7));
    }
}
