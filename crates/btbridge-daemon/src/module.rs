//! The contract between a profile module and the daemon connection.

use std::sync::{Arc, PoisonError, RwLock};

use btbridge_pdu::{unpack_pdu, Pdu, ReceivedPdu};
use tracing::{debug, warn};

use crate::control::ControlHandle;
use crate::dispatch::{DispatchTable, OpcodeKind, OpcodeLayout};
use crate::error::Result;
use crate::pending::PendingResult;
use crate::status::BluetoothStatus;

/// Outbound half of a daemon connection.
pub trait PduTransport: Send + Sync {
    /// Send `pdu`. `result` waits for the matching response; on error it has
    /// already been dropped without a callback.
    fn send(&self, pdu: Pdu, result: Option<PendingResult>) -> Result<()>;
}

/// One hardware profile multiplexed over the daemon connection.
pub trait DaemonModule: Send + Sync {
    fn service_id(&self) -> u8;

    fn layout(&self) -> OpcodeLayout;

    /// Handle one inbound PDU. Runs on the I/O thread and must not block.
    ///
    /// `result` is the oldest pending entry for this service when the PDU is
    /// a response, and `None` for notifications.
    fn handle_pdu(&self, pdu: ReceivedPdu, result: Option<PendingResult>);
}

/// The registered notification handler of a module.
pub struct NotificationSlot<T: ?Sized> {
    handler: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> NotificationSlot<T> {
    pub fn new() -> Self {
        Self {
            handler: RwLock::new(None),
        }
    }

    pub fn set(&self, handler: Option<Arc<T>>) {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = handler;
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_set(&self) -> bool {
        self.get().is_some()
    }
}

impl<T: ?Sized> Default for NotificationSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The outcome of [`demux`].
#[derive(Debug)]
pub enum Inbound<R, N> {
    Response(R, Option<PendingResult>),
    Notification(N),
}

/// Classify and decode one inbound PDU against a module's tables.
///
/// The generic error response is decoded here and delivered straight to the
/// pending handler's `on_error`. A response that cannot be dispatched fails
/// its pending handler with [`BluetoothStatus::Fail`], so the handler is
/// still called once. Everything else that misses is logged and dropped.
pub fn demux<R, N>(
    layout: &OpcodeLayout,
    responses: &DispatchTable<R>,
    notifications: &DispatchTable<N>,
    mut pdu: ReceivedPdu,
    result: Option<PendingResult>,
    control: &ControlHandle,
) -> Option<Inbound<R, N>> {
    match layout.classify(pdu.opcode()) {
        OpcodeKind::Error => {
            let status = match unpack_pdu::<BluetoothStatus>(&mut pdu) {
                Ok(status) => status,
                Err(err) => {
                    warn!(
                        service = pdu.service(),
                        error = %err,
                        "malformed error response"
                    );
                    BluetoothStatus::Fail
                }
            };
            match result {
                Some(result) => result.abandon(status, control),
                None => debug!(
                    service = pdu.service(),
                    %status,
                    "error response without handler"
                ),
            }
            None
        }
        OpcodeKind::Response(index) => match responses.decode(index, &mut pdu) {
            Some(response) => Some(Inbound::Response(response, result)),
            None => {
                if let Some(result) = result {
                    result.abandon(BluetoothStatus::Fail, control);
                }
                None
            }
        },
        OpcodeKind::Notification(index) => {
            notifications.decode(index, &mut pdu).map(Inbound::Notification)
        }
        OpcodeKind::Unroutable => {
            warn!(
                service = pdu.service(),
                opcode = pdu.opcode(),
                "opcode below notification base; dropping PDU"
            );
            None
        }
    }
}
