//! Link handshake: the sandboxed side names its protocol and version, the
//! host answers with the negotiated version and an assigned peer id.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use btbridge_pdu::{FramingError, PduReader, PduWriter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IpcError, Result};
use crate::link::{opcode, parse_json, send_json};

const MAX_PROTOCOL_LEN: usize = 32;
const MAX_VERSION_LEN: usize = 16;
const MAX_PEER_ID_LEN: usize = 128;

/// Sent by the connecting (sandboxed) side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub protocol: String,
    pub version: String,
}

/// Sent back by the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub protocol: String,
    /// Negotiated protocol version.
    pub version: String,
    /// Host-assigned identifier of the connecting process.
    pub peer_id: String,
}

/// Result of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResult {
    pub peer_id: String,
    pub protocol_version: String,
}

/// Link settings shared by both sides.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Timeout for each blocking handshake operation.
    pub timeout: Duration,
    pub protocol_name: String,
    pub protocol_version: String,
    /// Maximum handshake payload size in bytes.
    pub max_handshake_payload: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            protocol_name: "btbridge".to_string(),
            protocol_version: "1.0".to_string(),
            max_handshake_payload: 4 * 1024,
        }
    }
}

/// Perform the connecting side of the handshake.
pub fn handshake_client<R: Read, W: Write>(
    reader: &mut PduReader<R>,
    writer: &mut PduWriter<W>,
    config: &LinkConfig,
) -> Result<HandshakeResult> {
    validate_protocol_name(&config.protocol_name)?;
    validate_version(&config.protocol_version)?;

    let req = HandshakeRequest {
        protocol: config.protocol_name.clone(),
        version: config.protocol_version.clone(),
    };
    send_json(writer, opcode::HANDSHAKE, &req)?;

    let resp: HandshakeResponse = recv_handshake(reader, config)?;

    validate_protocol_name(&resp.protocol)?;
    validate_version(&resp.version)?;
    validate_peer_id(&resp.peer_id)?;

    if resp.protocol != config.protocol_name {
        return Err(IpcError::HandshakeFailed(format!(
            "unknown protocol '{}' (expected '{}')",
            resp.protocol, config.protocol_name
        )));
    }

    if !is_version_compatible(&config.protocol_version, &resp.version)? {
        return Err(IpcError::HandshakeFailed(format!(
            "incompatible version '{}' (local '{}')",
            resp.version, config.protocol_version
        )));
    }

    debug!(peer_id = %resp.peer_id, version = %resp.version, "link handshake complete");
    Ok(HandshakeResult {
        peer_id: resp.peer_id,
        protocol_version: resp.version,
    })
}

/// Perform the host side of the handshake, assigning `peer_id`.
pub fn handshake_server<R: Read, W: Write>(
    reader: &mut PduReader<R>,
    writer: &mut PduWriter<W>,
    peer_id: &str,
    config: &LinkConfig,
) -> Result<HandshakeResult> {
    validate_protocol_name(&config.protocol_name)?;
    validate_version(&config.protocol_version)?;
    validate_peer_id(peer_id)?;

    let req: HandshakeRequest = recv_handshake(reader, config)?;

    validate_protocol_name(&req.protocol)?;
    validate_version(&req.version)?;

    if req.protocol != config.protocol_name {
        return Err(IpcError::HandshakeFailed(format!(
            "unknown protocol '{}' (expected '{}')",
            req.protocol, config.protocol_name
        )));
    }

    if !is_version_compatible(&req.version, &config.protocol_version)? {
        return Err(IpcError::HandshakeFailed(format!(
            "incompatible version '{}' (host '{}')",
            req.version, config.protocol_version
        )));
    }

    let resp = HandshakeResponse {
        protocol: config.protocol_name.clone(),
        version: config.protocol_version.clone(),
        peer_id: peer_id.to_string(),
    };
    send_json(writer, opcode::HANDSHAKE, &resp)?;

    Ok(HandshakeResult {
        peer_id: peer_id.to_string(),
        protocol_version: config.protocol_version.clone(),
    })
}

fn recv_handshake<T: serde::de::DeserializeOwned, R: Read>(
    reader: &mut PduReader<R>,
    config: &LinkConfig,
) -> Result<T> {
    let deadline = Instant::now() + config.timeout;
    loop {
        if Instant::now() >= deadline {
            return Err(IpcError::Timeout(config.timeout));
        }

        match reader.read_pdu() {
            Ok(pdu) => {
                let size = usize::from(pdu.payload_length());
                if size > config.max_handshake_payload {
                    return Err(IpcError::HandshakeFailed(format!(
                        "handshake payload too large: {} (max {})",
                        size, config.max_handshake_payload
                    )));
                }
                return match parse_json(pdu, opcode::HANDSHAKE) {
                    Err(IpcError::UnexpectedPdu { service, opcode }) => {
                        Err(IpcError::HandshakeFailed(format!(
                            "expected handshake, got service {service:#04x} opcode {opcode:#04x}"
                        )))
                    }
                    other => other,
                };
            }
            Err(FramingError::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(FramingError::ConnectionClosed) => {
                return Err(IpcError::Disconnected(
                    "connection closed during handshake".to_string(),
                ));
            }
            Err(err) => return Err(IpcError::Framing(err)),
        }
    }
}

fn validate_protocol_name(protocol: &str) -> Result<()> {
    if protocol.is_empty() || protocol.len() > MAX_PROTOCOL_LEN {
        return Err(IpcError::HandshakeFailed(format!(
            "invalid protocol name length: {}",
            protocol.len()
        )));
    }
    Ok(())
}

fn validate_version(version: &str) -> Result<()> {
    if version.is_empty() || version.len() > MAX_VERSION_LEN {
        return Err(IpcError::HandshakeFailed(format!(
            "invalid protocol version length: {}",
            version.len()
        )));
    }
    parse_version(version).map(|_| ())
}

fn validate_peer_id(peer_id: &str) -> Result<()> {
    if peer_id.is_empty() || peer_id.len() > MAX_PEER_ID_LEN {
        return Err(IpcError::HandshakeFailed(format!(
            "invalid peer_id length: {}",
            peer_id.len()
        )));
    }
    Ok(())
}

/// Same major, and the client at least as new as the host's minor.
fn is_version_compatible(client_version: &str, host_version: &str) -> Result<bool> {
    let (client_major, client_minor) = parse_version(client_version)?;
    let (host_major, host_minor) = parse_version(host_version)?;

    Ok(client_major == host_major && client_minor >= host_minor)
}

fn parse_version(version: &str) -> Result<(u16, u16)> {
    let invalid =
        |what: &str| IpcError::HandshakeFailed(format!("invalid version '{version}': {what}"));

    let mut parts = version.split('.');
    let major = parts.next().ok_or_else(|| invalid("missing major"))?;
    let minor = parts.next().ok_or_else(|| invalid("missing minor"))?;
    if parts.next().is_some() {
        return Err(invalid("expected '<major>.<minor>'"));
    }

    let major = major.parse::<u16>().map_err(|_| invalid("non-numeric major"))?;
    let minor = minor.parse::<u16>().map_err(|_| invalid("non-numeric minor"))?;
    Ok((major, minor))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};
    use std::os::unix::net::UnixStream;
    use std::thread;

    use super::*;
    use crate::link::LINK_SERVICE;

    fn split(stream: UnixStream) -> (PduReader<UnixStream>, PduWriter<UnixStream>) {
        (
            PduReader::new(stream.try_clone().unwrap()),
            PduWriter::new(stream),
        )
    }

    #[test]
    fn successful_handshake() {
        let (left, right) = UnixStream::pair().unwrap();

        let host = thread::spawn(move || {
            let (mut reader, mut writer) = split(left);
            handshake_server(&mut reader, &mut writer, "peer-1", &LinkConfig::default()).unwrap()
        });

        let (mut reader, mut writer) = split(right);
        let client = handshake_client(&mut reader, &mut writer, &LinkConfig::default()).unwrap();
        let server = host.join().unwrap();

        assert_eq!(client.peer_id, "peer-1");
        assert_eq!(client.protocol_version, "1.0");
        assert_eq!(server, client);
    }

    #[test]
    fn newer_minor_client_accepted() {
        let (left, right) = UnixStream::pair().unwrap();

        let host = thread::spawn(move || {
            let (mut reader, mut writer) = split(left);
            handshake_server(&mut reader, &mut writer, "peer-2", &LinkConfig::default())
        });

        let (mut reader, mut writer) = split(right);
        let config = LinkConfig {
            protocol_version: "1.3".to_string(),
            ..LinkConfig::default()
        };
        let client = handshake_client(&mut reader, &mut writer, &config).unwrap();
        assert_eq!(client.protocol_version, "1.0");
        assert!(host.join().unwrap().is_ok());
    }

    #[test]
    fn major_version_mismatch_rejected() {
        let (left, right) = UnixStream::pair().unwrap();

        let host = thread::spawn(move || {
            let (mut reader, mut writer) = split(left);
            let config = LinkConfig {
                protocol_version: "2.0".to_string(),
                ..LinkConfig::default()
            };
            handshake_server(&mut reader, &mut writer, "peer-3", &config)
        });

        let (mut reader, mut writer) = split(right);
        let result = handshake_client(&mut reader, &mut writer, &LinkConfig::default());

        assert!(matches!(result, Err(IpcError::Disconnected(_))));
        assert!(matches!(
            host.join().unwrap(),
            Err(IpcError::HandshakeFailed(_))
        ));
    }

    #[test]
    fn wrong_protocol_name_rejected() {
        let (left, right) = UnixStream::pair().unwrap();

        let host = thread::spawn(move || {
            let (mut reader, mut writer) = split(left);
            handshake_server(&mut reader, &mut writer, "peer-4", &LinkConfig::default())
        });

        let (mut reader, mut writer) = split(right);
        let config = LinkConfig {
            protocol_name: "foobar".to_string(),
            ..LinkConfig::default()
        };
        let result = handshake_client(&mut reader, &mut writer, &config);

        assert!(matches!(result, Err(IpcError::Disconnected(_))));
        assert!(matches!(
            host.join().unwrap(),
            Err(IpcError::HandshakeFailed(_))
        ));
    }

    #[test]
    fn non_handshake_pdu_rejected() {
        let (left, right) = UnixStream::pair().unwrap();
        let mut raw = PduWriter::new(left);
        raw.send(LINK_SERVICE, opcode::REQUEST, b"{}").unwrap();

        let (mut reader, mut writer) = split(right);
        let result = handshake_server(&mut reader, &mut writer, "peer-5", &LinkConfig::default());
        assert!(matches!(result, Err(IpcError::HandshakeFailed(_))));
    }

    #[test]
    fn invalid_json_rejected() {
        let (left, right) = UnixStream::pair().unwrap();
        let mut raw = PduWriter::new(left);
        raw.send(LINK_SERVICE, opcode::HANDSHAKE, b"{not-json").unwrap();

        let (mut reader, mut writer) = split(right);
        let result = handshake_server(&mut reader, &mut writer, "peer-6", &LinkConfig::default());
        assert!(matches!(result, Err(IpcError::Json(_))));
    }

    #[test]
    fn oversized_payload_rejected() {
        let (left, right) = UnixStream::pair().unwrap();
        let mut raw = PduWriter::new(left);
        raw.send(LINK_SERVICE, opcode::HANDSHAKE, &[b' '; 128]).unwrap();

        let (mut reader, mut writer) = split(right);
        let config = LinkConfig {
            max_handshake_payload: 64,
            ..LinkConfig::default()
        };
        let result = handshake_server(&mut reader, &mut writer, "peer-7", &config);
        assert!(matches!(result, Err(IpcError::HandshakeFailed(_))));
    }

    #[test]
    fn handshake_timeout() {
        let mut reader = PduReader::new(AlwaysTimedOutReader);
        let mut writer = PduWriter::new(Cursor::new(Vec::<u8>::new()));
        let config = LinkConfig {
            timeout: Duration::from_millis(25),
            ..LinkConfig::default()
        };

        let result = handshake_client(&mut reader, &mut writer, &config);
        assert!(matches!(result, Err(IpcError::Timeout(_))));
    }

    #[test]
    fn malformed_versions_rejected() {
        for version in ["", "1", "1.2.3", "a.0", "1.b"] {
            assert!(validate_version(version).is_err(), "{version:?}");
        }
        assert!(is_version_compatible("1.1", "1.0").unwrap());
        assert!(!is_version_compatible("1.0", "1.1").unwrap());
    }

    struct AlwaysTimedOutReader;

    impl Read for AlwaysTimedOutReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::TimedOut))
        }
    }
}
