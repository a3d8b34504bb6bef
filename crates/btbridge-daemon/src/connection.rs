//! The socket to the Bluetooth daemon and its I/O thread.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::JoinHandle;

use btbridge_pdu::{FramingError, Pdu, PduConfig, PduReader, PduWriter, ReceivedPdu};
use btbridge_transport::SocketStream;
use tracing::{debug, info, warn};

use crate::control::ControlHandle;
use crate::error::{BackendError, CommandError, Result};
use crate::module::{DaemonModule, PduTransport};
use crate::pending::{PendingRequests, PendingResult};
use crate::status::BluetoothStatus;

/// Default location of the daemon's command socket.
pub const DEFAULT_DAEMON_SOCKET: &str = "/run/bluetooth/bluetoothd.sock";

/// Configuration for the daemon connection.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub pdu: PduConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_DAEMON_SOCKET),
            pdu: PduConfig::default(),
        }
    }
}

impl DaemonConfig {
    pub fn with_socket(path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: path.into(),
            ..Self::default()
        }
    }
}

type ModuleMap = HashMap<u8, Arc<dyn DaemonModule>>;

/// Routing table from service id to module, shared with the I/O thread.
#[derive(Default)]
struct ModuleRegistry {
    modules: Arc<RwLock<ModuleMap>>,
}

impl ModuleRegistry {
    fn register(&self, module: Arc<dyn DaemonModule>) {
        let service = module.service_id();
        let previous = self
            .modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(service, module);
        if previous.is_some() {
            warn!(service, "replacing registered module");
        } else {
            debug!(service, "registered module");
        }
    }

    fn unregister(&self, service: u8) -> bool {
        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&service)
            .is_some()
    }

    fn get(&self, service: u8) -> Option<Arc<dyn DaemonModule>> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&service)
            .cloned()
    }
}

struct Shared {
    writer: Mutex<PduWriter<SocketStream>>,
    socket: SocketStream,
    registry: ModuleRegistry,
    pending: PendingRequests,
    closed: AtomicBool,
    next_seq: AtomicU64,
    control: ControlHandle,
}

impl Shared {
    fn lock_writer(&self) -> MutexGuard<'_, PduWriter<SocketStream>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the connection dead and fail every outstanding handler.
    ///
    /// Runs under the writer lock so no send can slip a new entry in between.
    fn teardown(&self) {
        let _writer = self.lock_writer();
        self.teardown_locked();
    }

    /// [`Shared::teardown`] for a caller already holding the writer lock.
    fn teardown_locked(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("daemon connection closed");
        }
        self.pending.abandon_all(BluetoothStatus::Fail, &self.control);
    }
}

/// Sending side of a [`DaemonConnection`], handed to modules.
#[derive(Clone)]
pub struct DaemonSender {
    shared: Arc<Shared>,
}

impl DaemonSender {
    /// Route the module's service to it and accept commands for it.
    pub fn register(&self, module: Arc<dyn DaemonModule>) {
        let _writer = self.shared.lock_writer();
        self.shared.registry.register(module);
    }

    /// Stop routing `service`. Commands still waiting on it fail with
    /// [`BluetoothStatus::Fail`], and later sends are refused.
    pub fn unregister(&self, service: u8) -> bool {
        let shared = &self.shared;
        let _writer = shared.lock_writer();
        let removed = shared.registry.unregister(service);
        shared
            .pending
            .abandon_service(service, BluetoothStatus::Fail, &shared.control);
        removed
    }
}

impl PduTransport for DaemonSender {
    fn send(&self, pdu: Pdu, result: Option<PendingResult>) -> Result<()> {
        let shared = &self.shared;
        let mut writer = shared.lock_writer();
        if shared.closed.load(Ordering::Acquire) {
            return Err(CommandError::NotConnected);
        }

        let service = pdu.service();
        if shared.registry.get(service).is_none() {
            return Err(CommandError::NotRegistered { service });
        }
        let seq = shared.next_seq.fetch_add(1, Ordering::Relaxed);
        shared.pending.push(service, seq, result);

        if let Err(err) = writer.write_pdu(&pdu) {
            // The caller reports this failure itself.
            drop(shared.pending.remove(service, seq));
            warn!(service, opcode = pdu.opcode(), error = %err, "failed to send PDU");
            // A partial write leaves the stream misframed.
            if let Err(shutdown) = shared.socket.shutdown() {
                debug!(error = %shutdown, "socket shutdown failed");
            }
            shared.teardown_locked();
            return Err(err.into());
        }

        debug!(
            service,
            opcode = pdu.opcode(),
            length = pdu.payload_length(),
            seq,
            "sent PDU"
        );
        Ok(())
    }
}

/// An established connection to the daemon.
///
/// Owns the socket and the I/O thread that reads PDUs, pairs responses with
/// pending handlers and hands every PDU to the module registered for its
/// service id. When the socket closes, every outstanding handler fails with
/// [`BluetoothStatus::Fail`].
pub struct DaemonConnection {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl DaemonConnection {
    /// Connect to the daemon socket named in `config`.
    pub fn connect(
        config: &DaemonConfig,
        control: ControlHandle,
    ) -> std::result::Result<Self, BackendError> {
        let stream = btbridge_transport::connect(&config.socket_path)?;
        info!(path = ?config.socket_path, "connected to bluetooth daemon");
        Ok(Self::from_stream(stream, config.pdu.clone(), control)?)
    }

    /// Start the I/O thread over an already connected stream.
    pub fn from_stream(
        stream: SocketStream,
        config: PduConfig,
        control: ControlHandle,
    ) -> std::result::Result<Self, FramingError> {
        let read_half = stream.try_clone()?;
        let socket = stream.try_clone()?;
        let writer = PduWriter::for_socket(stream, config.clone())?;
        // The I/O thread blocks until the daemon speaks; no read timeout.
        let reader = PduReader::with_config(read_half, config);

        let shared = Arc::new(Shared {
            writer: Mutex::new(writer),
            socket,
            registry: ModuleRegistry::default(),
            pending: PendingRequests::new(),
            closed: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
            control,
        });

        let thread = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("btbridge-daemon-io".into())
                .spawn(move || run_io(reader, shared))?
        };

        Ok(Self {
            shared,
            reader: Mutex::new(Some(thread)),
        })
    }

    pub fn sender(&self) -> DaemonSender {
        DaemonSender {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn register_module(&self, module: Arc<dyn DaemonModule>) {
        self.sender().register(module);
    }

    pub fn is_connected(&self) -> bool {
        !self.shared.closed.load(Ordering::Acquire)
    }

    /// Number of commands still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    /// Shut the socket down and wait for the I/O thread to finish.
    pub fn close(&self) {
        if let Err(err) = self.shared.socket.shutdown() {
            debug!(error = %err, "socket shutdown failed");
        }
        let handle = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() != std::thread::current().id() && handle.join().is_err() {
                warn!("daemon I/O thread panicked");
            }
        }
        self.shared.teardown();
    }
}

impl PduTransport for DaemonConnection {
    fn send(&self, pdu: Pdu, result: Option<PendingResult>) -> Result<()> {
        self.sender().send(pdu, result)
    }
}

impl Drop for DaemonConnection {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_io(mut reader: PduReader<SocketStream>, shared: Arc<Shared>) {
    loop {
        match reader.read_pdu() {
            Ok(pdu) => route(&shared, pdu),
            Err(FramingError::ConnectionClosed) => {
                debug!("daemon closed the connection");
                break;
            }
            Err(err) => {
                if !shared.closed.load(Ordering::Acquire) {
                    warn!(error = %err, "daemon connection failed");
                }
                break;
            }
        }
    }
    shared.teardown();
}

fn route(shared: &Shared, pdu: ReceivedPdu) {
    let service = pdu.service();
    let opcode = pdu.opcode();
    debug!(service, opcode, length = pdu.payload_length(), "received PDU");

    let Some(module) = shared.registry.get(service) else {
        warn!(service, opcode, "no module registered for service; dropping PDU");
        return;
    };

    let result = if module.layout().is_notification(opcode) {
        None
    } else {
        match shared.pending.pop_front(service) {
            Some(entry) => entry,
            None => {
                warn!(service, opcode, "response without outstanding command");
                None
            }
        }
    };

    module.handle_pdu(pdu, result);
}
