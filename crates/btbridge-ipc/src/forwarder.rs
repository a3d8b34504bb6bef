//! The sandboxed side of the link: a [`BluetoothService`] that forwards
//! every call to the privileged host.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use btbridge_daemon::avrcp::PlayStatus;
use btbridge_daemon::{Address, ControlHandle};
use btbridge_pdu::{FramingError, PduConfig, PduReader, PduWriter};
use btbridge_transport::SocketStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{IpcError, Result};
use crate::handshake::{handshake_client, HandshakeResult, LinkConfig};
use crate::link::{read_reply, write_request};
use crate::request::{Reply, ReplyEnvelope, ReplyError, Request, RequestEnvelope};
use crate::service::{BluetoothService, ReplyHandler};

/// Lifecycle of one forwarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Created, not yet written to the link.
    Dispatched,
    /// Written; waiting for the host's reply.
    AwaitingReply,
    /// The reply arrived and was delivered.
    Resolved,
    /// The link went away first; the handler got a generic failure.
    Abandoned,
}

/// Owns the caller's handler for one forwarded call.
///
/// Dropping an actor that never saw its reply abandons it, so the handler
/// is called exactly once either way.
pub struct RequestActor {
    id: u64,
    name: &'static str,
    state: RequestState,
    handler: Option<Arc<dyn ReplyHandler>>,
    control: ControlHandle,
}

impl RequestActor {
    fn new(
        id: u64,
        name: &'static str,
        handler: Arc<dyn ReplyHandler>,
        control: ControlHandle,
    ) -> Self {
        Self {
            id,
            name,
            state: RequestState::Dispatched,
            handler: Some(handler),
            control,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    fn resolve(mut self, reply: Reply) {
        self.state = RequestState::Resolved;
        let Some(handler) = self.handler.take() else {
            return;
        };
        debug!(request_id = self.id, request = self.name, "request resolved");
        self.control.dispatch(move || match reply {
            Reply::Success(value) => handler.on_success(value),
            Reply::Error(error) => handler.on_error(error),
        });
    }
}

impl Drop for RequestActor {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            warn!(
                request_id = self.id,
                request = self.name,
                state = ?self.state,
                "forwarded request abandoned"
            );
            self.state = RequestState::Abandoned;
            self.control
                .dispatch(move || handler.on_error(ReplyError::abandoned()));
        }
    }
}

struct Shared {
    /// `None` once the link is gone; later calls are abandoned immediately.
    writer: Mutex<Option<PduWriter<SocketStream>>>,
    socket: SocketStream,
    actors: Mutex<HashMap<u64, RequestActor>>,
    next_id: AtomicU64,
    control: ControlHandle,
}

impl Shared {
    fn lock_writer(&self) -> MutexGuard<'_, Option<PduWriter<SocketStream>>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_actors(&self) -> MutexGuard<'_, HashMap<u64, RequestActor>> {
        self.actors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the link and abandon every outstanding request.
    fn sever(&self) -> usize {
        let mut writer = self.lock_writer();
        let actors = self.sever_locked(&mut writer);
        drop(writer);
        let count = actors.len();
        drop(actors);
        count
    }

    /// Take the writer, shut the socket down and hand back every actor.
    ///
    /// The caller drops the actors once it has released the writer lock.
    fn sever_locked(&self, writer: &mut Option<PduWriter<SocketStream>>) -> Vec<RequestActor> {
        if writer.take().is_some() {
            info!("forwarder link closed");
        }
        if let Err(err) = self.socket.shutdown() {
            debug!(error = %err, "socket shutdown failed");
        }
        self.lock_actors().drain().map(|(_, actor)| actor).collect()
    }

    fn send(&self, request: Request, handler: Arc<dyn ReplyHandler>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let actor = RequestActor::new(id, request.name(), handler, self.control.clone());

        let mut writer = self.lock_writer();
        let Some(link) = writer.as_mut() else {
            warn!(request = request.name(), "called during shutdown");
            drop(writer);
            drop(actor);
            return;
        };

        self.lock_actors().insert(id, actor);
        let envelope = RequestEnvelope { id, request };
        match write_request(link, &envelope) {
            Ok(()) => {
                if let Some(actor) = self.lock_actors().get_mut(&id) {
                    actor.state = RequestState::AwaitingReply;
                }
                debug!(
                    request_id = id,
                    request = envelope.request.name(),
                    "request forwarded"
                );
            }
            Err(err) if rejected_before_writing(&err) => {
                warn!(request_id = id, error = %err, "failed to forward request");
                let actor = self.lock_actors().remove(&id);
                drop(writer);
                drop(actor);
            }
            Err(err) => {
                // A partial write leaves the link misframed.
                warn!(
                    request_id = id,
                    error = %err,
                    "failed to forward request; closing link"
                );
                let actors = self.sever_locked(&mut writer);
                drop(writer);
                drop(actors);
            }
        }
    }

    fn deliver(&self, envelope: ReplyEnvelope) {
        let actor = self.lock_actors().remove(&envelope.id);
        match actor {
            Some(actor) => actor.resolve(envelope.reply),
            None => warn!(request_id = envelope.id, "reply for unknown request"),
        }
    }
}

/// Forwards [`BluetoothService`] calls to the privileged host.
///
/// Replies are read on a background thread and delivered on the control
/// thread. When the link closes, is declared dead, or the forwarder is
/// dropped, every outstanding handler receives [`ReplyError::abandoned`].
pub struct Forwarder {
    shared: Arc<Shared>,
    handshake: HandshakeResult,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Forwarder {
    /// Connect to the host socket at `path` and perform the handshake.
    pub fn connect(
        path: impl AsRef<Path>,
        config: &LinkConfig,
        control: ControlHandle,
    ) -> Result<Self> {
        let stream = btbridge_transport::connect(path.as_ref())?;
        Self::from_stream(stream, config, control)
    }

    /// Perform the handshake over an established stream and start reading
    /// replies.
    pub fn from_stream(
        stream: SocketStream,
        config: &LinkConfig,
        control: ControlHandle,
    ) -> Result<Self> {
        stream.set_read_timeout(Some(config.timeout))?;
        stream.set_write_timeout(Some(config.timeout))?;

        let mut reader = PduReader::with_config(stream.try_clone()?, PduConfig::default());
        let mut writer = PduWriter::with_config(stream.try_clone()?, PduConfig::default());
        let handshake = handshake_client(&mut reader, &mut writer, config)?;
        info!(peer_id = %handshake.peer_id, "connected to bluetooth host");

        stream.set_read_timeout(None)?;

        let shared = Arc::new(Shared {
            writer: Mutex::new(Some(writer)),
            socket: stream,
            actors: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            control,
        });

        let thread = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("btbridge-forwarder-io".into())
                .spawn(move || run_replies(reader, shared))
                .map_err(FramingError::Io)?
        };

        Ok(Self {
            shared,
            handshake,
            reader: Mutex::new(Some(thread)),
        })
    }

    /// Identifier the host assigned to this process.
    pub fn peer_id(&self) -> &str {
        &self.handshake.peer_id
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock_writer().is_some()
    }

    /// Number of requests still waiting for a reply.
    pub fn outstanding(&self) -> usize {
        self.shared.lock_actors().len()
    }

    /// The host-side actor is gone: abandon everything outstanding and
    /// refuse further sends.
    pub fn note_dead_actor(&self) {
        let abandoned = self.shared.sever();
        debug!(abandoned, "host actor gone");
    }

    /// Close the link and wait for the reply thread.
    pub fn shutdown(&self) {
        self.note_dead_actor();
        let handle = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() != std::thread::current().id() && handle.join().is_err() {
                warn!("forwarder reply thread panicked");
            }
        }
    }
}

impl Drop for Forwarder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl BluetoothService for Forwarder {
    fn request(&self, request: Request, handler: Arc<dyn ReplyHandler>) {
        self.shared.send(request, handler);
    }

    fn get_service_channel(
        &self,
        address: Address,
        service_uuid: Uuid,
        _handler: Arc<dyn ReplyHandler>,
    ) {
        error!(
            %address,
            %service_uuid,
            "get_service_channel called outside the privileged process"
        );
        panic!("get_service_channel must only be called in the privileged process");
    }

    fn update_sdp_records(&self, address: Address) -> bool {
        error!(%address, "update_sdp_records called outside the privileged process");
        panic!("update_sdp_records must only be called in the privileged process");
    }

    fn update_play_status(&self, _duration: u32, _position: u32, status: PlayStatus) {
        error!(?status, "update_play_status called outside the privileged process");
        panic!("update_play_status must only be called in the privileged process");
    }
}

/// Errors raised before any byte reached the socket.
fn rejected_before_writing(err: &IpcError) -> bool {
    matches!(
        err,
        IpcError::Json(_) | IpcError::Framing(FramingError::PayloadTooLarge { .. })
    )
}

fn run_replies(mut reader: PduReader<SocketStream>, shared: Arc<Shared>) {
    loop {
        match read_reply(&mut reader) {
            Ok(envelope) => shared.deliver(envelope),
            Err(IpcError::Framing(FramingError::ConnectionClosed)) => {
                debug!("host closed the link");
                break;
            }
            Err(
                err @ (IpcError::Json(_) | IpcError::UnexpectedPdu { .. } | IpcError::Decode(_)),
            ) => {
                warn!(error = %err, "dropping malformed reply");
            }
            Err(err) => {
                if shared.lock_writer().is_some() {
                    warn!(error = %err, "forwarder link failed");
                }
                break;
            }
        }
    }
    let abandoned = shared.sever();
    if abandoned > 0 {
        warn!(abandoned, "link lost with requests outstanding");
    }
}
