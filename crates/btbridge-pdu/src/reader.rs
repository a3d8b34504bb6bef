use std::io::{ErrorKind, Read};

#[cfg(unix)]
use btbridge_transport::SocketStream;
use bytes::BytesMut;

use crate::error::{FramingError, Result};
use crate::framing::{decode_pdu, peek_header, PduConfig};
use crate::pdu::{ReceivedPdu, HEADER_SIZE};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Where the reader is within the next PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// Fewer than [`HEADER_SIZE`] bytes are buffered.
    AwaitingHeader { buffered: usize },
    /// The header is known; `missing` payload bytes are still outstanding.
    AwaitingPayload { opcode: u8, missing: usize },
}

/// Reads complete PDUs from any `Read` stream.
///
/// Partial reads are absorbed internally; callers only ever see whole PDUs.
pub struct PduReader<T> {
    inner: T,
    buf: BytesMut,
    config: PduConfig,
}

impl<T: Read> PduReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, PduConfig::default())
    }

    pub fn with_config(inner: T, config: PduConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete PDU (blocking).
    ///
    /// Returns `Err(FramingError::ConnectionClosed)` at EOF.
    pub fn read_pdu(&mut self) -> Result<ReceivedPdu> {
        loop {
            if let Some(pdu) = decode_pdu(&mut self.buf, self.config.max_payload_size)? {
                return Ok(pdu);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FramingError::Io(err)),
            };

            if read == 0 {
                return Err(FramingError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Progress on the PDU currently being assembled.
    pub fn state(&self) -> ReadState {
        match peek_header(&self.buf) {
            None => ReadState::AwaitingHeader {
                buffered: self.buf.len(),
            },
            Some(header) => ReadState::AwaitingPayload {
                opcode: header.opcode,
                missing: (HEADER_SIZE + usize::from(header.length))
                    .saturating_sub(self.buf.len()),
            },
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &PduConfig {
        &self.config
    }
}

#[cfg(unix)]
impl PduReader<SocketStream> {
    /// Create a reader for a socket and apply the configured read timeout.
    pub fn for_socket(inner: SocketStream, config: PduConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
