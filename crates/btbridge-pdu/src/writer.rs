use std::io::{ErrorKind, Write};

#[cfg(unix)]
use btbridge_transport::SocketStream;
use bytes::BytesMut;

use crate::error::{FramingError, Result};
use crate::framing::{encode_pdu, PduConfig};
use crate::pdu::Pdu;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete PDUs to any `Write` stream.
pub struct PduWriter<T> {
    inner: T,
    buf: BytesMut,
    config: PduConfig,
}

impl<T: Write> PduWriter<T> {
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

    /// Write a fully packed PDU (blocking).
    pub fn write_pdu(&mut self, pdu: &Pdu) -> Result<()> {
        self.send(pdu.service(), pdu.opcode(), pdu.payload())
    }

    /// Frame `payload` and write it out.
    pub fn send(&mut self, service: u8, opcode: u8, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FramingError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_pdu(service, opcode, payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FramingError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FramingError::Io(err)),
            }
        }

        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FramingError::Io(err)),
            }
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
}

#[cfg(unix)]
impl PduWriter<SocketStream> {
    /// Create a writer for a socket and apply the configured write timeout.
    pub fn for_socket(inner: SocketStream, config: PduConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::Pack;
    use crate::reader::PduReader;

    #[test]
    fn writes_packed_pdu() {
        let mut pdu = Pdu::new(0x08, 0x0a, 1);
        50u8.pack(&mut pdu).unwrap();

        let mut writer = PduWriter::new(Cursor::new(Vec::new()));
        writer.write_pdu(&pdu).unwrap();

        let bytes = writer.into_inner().into_inner();
        assert_eq!(bytes, vec![0x08, 0x0a, 0x01, 0x00, 50]);
    }

    #[test]
    fn written_pdus_read_back() {
        let mut writer = PduWriter::new(Cursor::new(Vec::new()));
        writer.send(0x08, 0x01, &[]).unwrap();
        writer.send(0x08, 0x8c, &[0x44, 0x00]).unwrap();

        let mut reader = PduReader::new(Cursor::new(writer.into_inner().into_inner()));
        assert_eq!(reader.read_pdu().unwrap().opcode(), 0x01);
        let second = reader.read_pdu().unwrap();
        assert_eq!((second.opcode(), second.remaining()), (0x8c, 2));
    }

    #[test]
    fn configured_limit_rejects_before_writing() {
        let config = PduConfig {
            max_payload_size: 2,
            ..PduConfig::default()
        };
        let mut writer = PduWriter::with_config(Cursor::new(Vec::new()), config);
        assert!(matches!(
            writer.send(1, 1, &[0; 3]),
            Err(FramingError::PayloadTooLarge { size: 3, max: 2 })
        ));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn zero_length_write_means_closed() {
        let mut writer = PduWriter::new(ZeroWriter);
        assert!(matches!(
            writer.send(1, 1, &[1]),
            Err(FramingError::ConnectionClosed)
        ));
    }

    #[test]
    fn interrupted_write_and_flush_retry() {
        let mut writer = PduWriter::new(InterruptOnce::default());
        writer.send(0x08, 0x0a, &[]).unwrap();
        assert_eq!(writer.get_ref().data, vec![0x08, 0x0a, 0, 0]);
    }

    #[test]
    fn write_to_shut_down_socket_fails() {
        let (left, right) = SocketStream::pair().unwrap();
        drop(right);
        let mut writer = PduWriter::for_socket(left, PduConfig::default()).unwrap();
        assert!(matches!(
            writer.send(0x08, 0x0a, &[50]),
            Err(FramingError::Io(_))
        ));
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct InterruptOnce {
        write_interrupted: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.write_interrupted {
                self.write_interrupted = true;
                return Err(ErrorKind::Interrupted.into());
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(ErrorKind::Interrupted.into());
            }
            Ok(())
        }
    }
}
