//! Binary PDU codec and framing for the Bluetooth daemon protocol.
//!
//! Every daemon message is a PDU:
//! - 1-byte service id (which profile module the PDU belongs to)
//! - 1-byte opcode
//! - 2-byte little-endian payload length
//!
//! Payload fields are written with [`Pack`] and read back with [`Unpack`].
//! Outbound and inbound PDUs are separate types, so a PDU under construction
//! can never be decoded and a received PDU can never be appended to.

pub mod codec;
pub mod error;
pub mod framing;
pub mod pdu;
pub mod reader;
pub mod writer;

pub use codec::{
    pack_array, pack_as, pack_counted, pack_parallel, pack_text, unpack_array, unpack_as,
    unpack_counted, unpack_pdu, unpack_text, CountField, Pack, Unpack,
};
pub use error::{ConversionError, DecodeError, EncodeError, FramingError, Result};
pub use framing::{decode_pdu, encode_pdu, PduConfig};
pub use pdu::{Pdu, PduHeader, ReceivedPdu, HEADER_SIZE, MAX_PAYLOAD};
pub use reader::{PduReader, ReadState};
pub use writer::PduWriter;
