//! The backend façade handed to application code.

use std::sync::Arc;

use crate::avrcp::{AvrcpInterface, AvrcpModule, DaemonAvrcpInterface};
use crate::backend::BackendKind;
use crate::connection::{DaemonConfig, DaemonConnection};
use crate::control::ControlHandle;
use crate::error::BackendError;
use crate::module::PduTransport;

/// A running Bluetooth backend.
pub trait BluetoothBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn avrcp(&self) -> Arc<dyn AvrcpInterface>;

    fn is_connected(&self) -> bool;

    fn close(&self);
}

/// The backend that talks to the Bluetooth daemon over its socket.
pub struct DaemonInterface {
    connection: DaemonConnection,
    avrcp: Arc<DaemonAvrcpInterface>,
}

impl DaemonInterface {
    pub fn connect(config: &DaemonConfig, control: ControlHandle) -> Result<Self, BackendError> {
        let connection = DaemonConnection::connect(config, control.clone())?;
        Ok(Self::from_connection(connection, control))
    }

    /// Wire the profile modules onto an established connection. The AVRCP
    /// module is registered right away; [`AvrcpInterface::init`] may be used
    /// to attach a notification handler.
    pub fn from_connection(connection: DaemonConnection, control: ControlHandle) -> Self {
        let transport: Arc<dyn PduTransport> = Arc::new(connection.sender());
        let module = Arc::new(AvrcpModule::new(transport, control.clone()));
        connection.register_module(module.clone());
        let avrcp = Arc::new(DaemonAvrcpInterface::new(
            module,
            connection.sender(),
            control,
        ));
        Self { connection, avrcp }
    }

    pub fn connection(&self) -> &DaemonConnection {
        &self.connection
    }

    pub fn daemon_avrcp(&self) -> Arc<DaemonAvrcpInterface> {
        Arc::clone(&self.avrcp)
    }
}

impl BluetoothBackend for DaemonInterface {
    fn kind(&self) -> BackendKind {
        BackendKind::Daemon
    }

    fn avrcp(&self) -> Arc<dyn AvrcpInterface> {
        self.avrcp.clone()
    }

    fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    fn close(&self) {
        self.connection.close();
    }
}
