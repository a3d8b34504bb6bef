//! The privileged side of the link.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use btbridge_daemon::ControlHandle;
use btbridge_pdu::{FramingError, PduConfig, PduReader, PduWriter};
use btbridge_transport::{SocketStream, UnixSocketListener};
use tracing::{debug, info, warn};

use crate::error::{IpcError, Result};
use crate::handshake::{handshake_server, LinkConfig};
use crate::link::{read_request, write_reply};
use crate::request::{Reply, ReplyEnvelope, ReplyError, ReplyValue};
use crate::service::{BluetoothService, ReplyHandler};

type SharedWriter = Arc<Mutex<PduWriter<SocketStream>>>;

/// Accepts sandboxed processes and runs their requests against a backing
/// [`BluetoothService`] on the control thread.
pub struct BridgeHost {
    listener: UnixSocketListener,
    config: LinkConfig,
    service: Arc<dyn BluetoothService>,
    control: ControlHandle,
    next_peer_id: AtomicU64,
}

impl BridgeHost {
    /// Bind the host socket at `path`.
    pub fn bind(
        path: impl AsRef<Path>,
        service: Arc<dyn BluetoothService>,
        control: ControlHandle,
    ) -> Result<Self> {
        let listener = UnixSocketListener::bind(path)?;
        Ok(Self::from_listener(listener, service, control))
    }

    pub fn from_listener(
        listener: UnixSocketListener,
        service: Arc<dyn BluetoothService>,
        control: ControlHandle,
    ) -> Self {
        Self {
            listener,
            config: LinkConfig::default(),
            service,
            control,
            next_peer_id: AtomicU64::new(1),
        }
    }

    pub fn with_link_config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound socket path.
    pub fn path(&self) -> &Path {
        self.listener.path()
    }

    /// Accept one process, handshake, and start serving its requests on a
    /// background thread.
    pub fn accept(&self) -> Result<HostSession> {
        let stream = self.listener.accept()?;
        let id = self.next_peer_id.fetch_add(1, Ordering::Relaxed);
        let peer_id = format!("peer-{id}");

        stream.set_read_timeout(Some(self.config.timeout))?;
        stream.set_write_timeout(Some(self.config.timeout))?;
        let mut reader = PduReader::with_config(stream.try_clone()?, PduConfig::default());
        let mut writer = PduWriter::with_config(stream.try_clone()?, PduConfig::default());
        handshake_server(&mut reader, &mut writer, &peer_id, &self.config)?;
        stream.set_read_timeout(None)?;

        if let Some((uid, _gid, pid)) = stream.peer_credentials() {
            info!(%peer_id, uid, pid, "accepted sandboxed process");
        } else {
            info!(%peer_id, "accepted sandboxed process");
        }

        let writer: SharedWriter = Arc::new(Mutex::new(writer));
        let thread = {
            let peer_id = peer_id.clone();
            let service = Arc::clone(&self.service);
            let control = self.control.clone();
            std::thread::Builder::new()
                .name(format!("btbridge-host-{peer_id}"))
                .spawn(move || run_session(reader, writer, peer_id, service, control))
                .map_err(FramingError::Io)?
        };

        Ok(HostSession { peer_id, thread })
    }

    /// Accept processes until `limit` sessions have been served (forever if
    /// `None`), then wait for those sessions to end.
    pub fn serve(&self, limit: Option<usize>) -> Result<()> {
        let mut sessions = Vec::new();
        while limit.map_or(true, |limit| sessions.len() < limit) {
            match self.accept() {
                Ok(session) => sessions.push(session),
                Err(err @ (IpcError::HandshakeFailed(_)
                | IpcError::Disconnected(_)
                | IpcError::Json(_)
                | IpcError::Timeout(_))) => {
                    warn!(error = %err, "rejected connection");
                }
                Err(err) => return Err(err),
            }
        }
        for session in sessions {
            session.join();
        }
        Ok(())
    }
}

/// One connected sandboxed process.
pub struct HostSession {
    peer_id: String,
    thread: JoinHandle<()>,
}

impl HostSession {
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Wait for the process to disconnect.
    pub fn join(self) {
        if self.thread.join().is_err() {
            warn!(peer_id = %self.peer_id, "host session thread panicked");
        }
    }
}

/// Writes the reply for one request back to the process that sent it.
struct RemoteReply {
    id: u64,
    peer_id: String,
    writer: SharedWriter,
}

impl RemoteReply {
    fn send(&self, reply: Reply) {
        let envelope = ReplyEnvelope { id: self.id, reply };
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = write_reply(&mut writer, &envelope) {
            warn!(
                peer_id = %self.peer_id,
                request_id = self.id,
                error = %err,
                "failed to send reply"
            );
        }
    }
}

impl ReplyHandler for RemoteReply {
    fn on_success(&self, value: ReplyValue) {
        self.send(Reply::Success(value));
    }

    fn on_error(&self, error: ReplyError) {
        self.send(Reply::Error(error));
    }
}

fn run_session(
    mut reader: PduReader<SocketStream>,
    writer: SharedWriter,
    peer_id: String,
    service: Arc<dyn BluetoothService>,
    control: ControlHandle,
) {
    loop {
        match read_request(&mut reader) {
            Ok(envelope) => {
                debug!(
                    %peer_id,
                    request_id = envelope.id,
                    request = envelope.request.name(),
                    "request received"
                );
                let reply = Arc::new(RemoteReply {
                    id: envelope.id,
                    peer_id: peer_id.clone(),
                    writer: Arc::clone(&writer),
                });
                let service = Arc::clone(&service);
                control.dispatch(move || service.request(envelope.request, reply));
            }
            Err(IpcError::Framing(FramingError::ConnectionClosed)) => {
                info!(%peer_id, "sandboxed process disconnected");
                break;
            }
            Err(
                err @ (IpcError::Json(_) | IpcError::UnexpectedPdu { .. } | IpcError::Decode(_)),
            ) => {
                warn!(%peer_id, error = %err, "dropping malformed request");
            }
            Err(err) => {
                warn!(%peer_id, error = %err, "session failed");
                break;
            }
        }
    }
}
