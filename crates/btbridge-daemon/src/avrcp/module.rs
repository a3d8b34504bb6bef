use std::sync::Arc;

use btbridge_pdu::{
    pack_counted, pack_parallel, unpack_array, unpack_as, unpack_counted, DecodeError, Pack, Pdu,
    ReceivedPdu, Unpack,
};
use tracing::{debug, warn};

use crate::address::Address;
use crate::avrcp::handler::{
    AvrcpNotification, AvrcpNotificationHandler, AvrcpResponse, AvrcpResultHandler,
};
use crate::avrcp::types::{
    AvrcpStatus, ElementAttribute, NotificationParam, NotificationType, PlayStatus,
    PlayerAttribute, RemoteFeatures,
};
use crate::avrcp::{opcode, LAYOUT, SERVICE_ID};
use crate::control::ControlHandle;
use crate::dispatch::{Decoder, DispatchTable, OpcodeLayout};
use crate::error::{CommandError, Result};
use crate::module::{demux, DaemonModule, Inbound, NotificationSlot, PduTransport};
use crate::pending::PendingResult;
use crate::status::BluetoothStatus;

macro_rules! response {
    ($variant:ident) => {
        Some({
            fn decode(_: &mut ReceivedPdu) -> std::result::Result<AvrcpResponse, DecodeError> {
                Ok(AvrcpResponse::$variant)
            }
            decode as Decoder<AvrcpResponse>
        })
    };
}

macro_rules! notification {
    ($decode:ident) => {
        Some($decode as Decoder<AvrcpNotification>)
    };
}

/// Responses, indexed by opcode. Slot 0 is the generic error response,
/// handled by the opcode layout before table lookup.
pub(crate) static RESPONSES: DispatchTable<AvrcpResponse> = DispatchTable::new(
    "avrcp-responses",
    &[
        None,
        response!(GetPlayStatus),
        response!(ListPlayerAppAttr),
        response!(ListPlayerAppValue),
        response!(GetPlayerAppValue),
        response!(GetPlayerAppAttrText),
        response!(GetPlayerAppValueText),
        response!(GetElementAttr),
        response!(SetPlayerAppValue),
        response!(RegisterNotification),
        response!(SetVolume),
    ],
);

/// Notifications, indexed by `opcode - 0x81`.
pub(crate) static NOTIFICATIONS: DispatchTable<AvrcpNotification> = DispatchTable::new(
    "avrcp-notifications",
    &[
        notification!(remote_features),
        notification!(get_play_status),
        notification!(list_player_app_attr),
        notification!(list_player_app_values),
        notification!(get_player_app_value),
        notification!(get_player_app_attrs_text),
        notification!(get_player_app_values_text),
        notification!(set_player_app_value),
        notification!(get_element_attr),
        notification!(register_notification),
        notification!(volume_change),
        notification!(passthrough),
    ],
);

fn remote_features(pdu: &mut ReceivedPdu) -> std::result::Result<AvrcpNotification, DecodeError> {
    Ok(AvrcpNotification::RemoteFeatures {
        address: Address::unpack(pdu)?,
        features: unpack_as::<u8, RemoteFeatures>(pdu)?,
    })
}

fn get_play_status(_: &mut ReceivedPdu) -> std::result::Result<AvrcpNotification, DecodeError> {
    Ok(AvrcpNotification::GetPlayStatus)
}

fn list_player_app_attr(
    _: &mut ReceivedPdu,
) -> std::result::Result<AvrcpNotification, DecodeError> {
    Ok(AvrcpNotification::ListPlayerAppAttr)
}

fn list_player_app_values(
    pdu: &mut ReceivedPdu,
) -> std::result::Result<AvrcpNotification, DecodeError> {
    Ok(AvrcpNotification::ListPlayerAppValues {
        attribute: PlayerAttribute::unpack(pdu)?,
    })
}

fn get_player_app_value(
    pdu: &mut ReceivedPdu,
) -> std::result::Result<AvrcpNotification, DecodeError> {
    Ok(AvrcpNotification::GetPlayerAppValue {
        attributes: unpack_counted::<u8, _>(pdu)?,
    })
}

fn get_player_app_attrs_text(
    pdu: &mut ReceivedPdu,
) -> std::result::Result<AvrcpNotification, DecodeError> {
    Ok(AvrcpNotification::GetPlayerAppAttrsText {
        attributes: unpack_counted::<u8, _>(pdu)?,
    })
}

fn get_player_app_values_text(
    pdu: &mut ReceivedPdu,
) -> std::result::Result<AvrcpNotification, DecodeError> {
    let attribute = u8::unpack(pdu)?;
    let count = u8::unpack(pdu)?;
    Ok(AvrcpNotification::GetPlayerAppValuesText {
        attribute,
        values: unpack_array(pdu, usize::from(count))?,
    })
}

fn set_player_app_value(
    pdu: &mut ReceivedPdu,
) -> std::result::Result<AvrcpNotification, DecodeError> {
    Ok(AvrcpNotification::SetPlayerAppValue {
        settings: Unpack::unpack(pdu)?,
    })
}

fn get_element_attr(pdu: &mut ReceivedPdu) -> std::result::Result<AvrcpNotification, DecodeError> {
    Ok(AvrcpNotification::GetElementAttr {
        attributes: unpack_counted::<u8, _>(pdu)?,
    })
}

fn register_notification(
    pdu: &mut ReceivedPdu,
) -> std::result::Result<AvrcpNotification, DecodeError> {
    Ok(AvrcpNotification::RegisterNotification {
        event: Unpack::unpack(pdu)?,
        param: u32::unpack(pdu)?,
    })
}

fn volume_change(pdu: &mut ReceivedPdu) -> std::result::Result<AvrcpNotification, DecodeError> {
    Ok(AvrcpNotification::VolumeChange {
        volume: u8::unpack(pdu)?,
        ctype: u8::unpack(pdu)?,
    })
}

fn passthrough(pdu: &mut ReceivedPdu) -> std::result::Result<AvrcpNotification, DecodeError> {
    Ok(AvrcpNotification::Passthrough {
        id: u8::unpack(pdu)?,
        key_state: u8::unpack(pdu)?,
    })
}

/// The AVRCP profile module.
///
/// Command methods build and send one PDU each and must be called on the
/// control thread. An `Err` return means nothing reached the daemon and the
/// handler was not and will not be called.
pub struct AvrcpModule {
    transport: Arc<dyn PduTransport>,
    control: ControlHandle,
    notifications: Arc<NotificationSlot<dyn AvrcpNotificationHandler>>,
}

type Handler = Option<Arc<dyn AvrcpResultHandler>>;

impl AvrcpModule {
    pub fn new(transport: Arc<dyn PduTransport>, control: ControlHandle) -> Self {
        Self {
            transport,
            control,
            notifications: Arc::new(NotificationSlot::new()),
        }
    }

    pub fn set_notification_handler(&self, handler: Option<Arc<dyn AvrcpNotificationHandler>>) {
        debug_assert!(self.control.is_control_thread());
        self.notifications.set(handler);
    }

    pub fn has_notification_handler(&self) -> bool {
        self.notifications.is_set()
    }

    pub fn get_play_status_rsp(
        &self,
        status: PlayStatus,
        song_len: u32,
        song_pos: u32,
        handler: Handler,
    ) -> Result<()> {
        let mut pdu = self.pdu(opcode::GET_PLAY_STATUS_RSP, 1 + 4 + 4);
        status.pack(&mut pdu)?;
        song_len.pack(&mut pdu)?;
        song_pos.pack(&mut pdu)?;
        self.send(pdu, handler)
    }

    pub fn list_player_app_attr_rsp(
        &self,
        attributes: &[PlayerAttribute],
        handler: Handler,
    ) -> Result<()> {
        let mut pdu = self.pdu(opcode::LIST_PLAYER_APP_ATTR_RSP, 1 + attributes.len());
        pack_counted::<u8, _>(attributes, &mut pdu)?;
        self.send(pdu, handler)
    }

    pub fn list_player_app_value_rsp(&self, values: &[u8], handler: Handler) -> Result<()> {
        let mut pdu = self.pdu(opcode::LIST_PLAYER_APP_VALUE_RSP, 1 + values.len());
        pack_counted::<u8, _>(values, &mut pdu)?;
        self.send(pdu, handler)
    }

    /// `attributes[i]` is set to `values[i]`; both slices must be equally long.
    pub fn get_player_app_value_rsp(
        &self,
        attributes: &[u8],
        values: &[u8],
        handler: Handler,
    ) -> Result<()> {
        let mut pdu = self.pdu(opcode::GET_PLAYER_APP_VALUE_RSP, 1 + 2 * attributes.len());
        pack_parallel::<u8, _, _>(attributes, values, &mut pdu)?;
        self.send(pdu, handler)
    }

    pub fn get_player_app_attr_text_rsp(
        &self,
        ids: &[u8],
        texts: &[&str],
        handler: Handler,
    ) -> Result<()> {
        let mut pdu = self.pdu(opcode::GET_PLAYER_APP_ATTR_TEXT_RSP, 0);
        pack_parallel::<u8, _, _>(ids, texts, &mut pdu)?;
        self.send(pdu, handler)
    }

    pub fn get_player_app_value_text_rsp(
        &self,
        ids: &[u8],
        texts: &[&str],
        handler: Handler,
    ) -> Result<()> {
        let mut pdu = self.pdu(opcode::GET_PLAYER_APP_VALUE_TEXT_RSP, 0);
        pack_parallel::<u8, _, _>(ids, texts, &mut pdu)?;
        self.send(pdu, handler)
    }

    pub fn get_element_attr_rsp(
        &self,
        attributes: &[ElementAttribute],
        handler: Handler,
    ) -> Result<()> {
        let mut pdu = self.pdu(opcode::GET_ELEMENT_ATTR_RSP, 0);
        pack_counted::<u8, _>(attributes, &mut pdu)?;
        self.send(pdu, handler)
    }

    pub fn set_player_app_value_rsp(&self, status: AvrcpStatus, handler: Handler) -> Result<()> {
        let mut pdu = self.pdu(opcode::SET_PLAYER_APP_VALUE_RSP, 1);
        status.pack(&mut pdu)?;
        self.send(pdu, handler)
    }

    pub fn register_notification_rsp(
        &self,
        kind: NotificationType,
        param: &NotificationParam,
        handler: Handler,
    ) -> Result<()> {
        let mut pdu = self.pdu(opcode::REGISTER_NOTIFICATION_RSP, 1 + 1 + 1 + 256);
        param.event().pack(&mut pdu)?;
        kind.pack(&mut pdu)?;
        let length = param.encoded_len();
        let length = u8::try_from(length).map_err(|_| btbridge_pdu::EncodeError::CountOverflow {
            count: length,
            max: usize::from(u8::MAX),
        })?;
        length.pack(&mut pdu)?;
        param.pack(&mut pdu)?;
        self.send(pdu, handler)
    }

    pub fn set_volume(&self, volume: u8, handler: Handler) -> Result<()> {
        let mut pdu = self.pdu(opcode::SET_VOLUME, 1);
        volume.pack(&mut pdu)?;
        self.send(pdu, handler)
    }

    fn pdu(&self, opcode: u8, capacity: usize) -> Pdu {
        debug_assert!(self.control.is_control_thread());
        Pdu::new(SERVICE_ID, opcode, capacity)
    }

    fn send(&self, pdu: Pdu, handler: Handler) -> std::result::Result<(), CommandError> {
        self.transport.send(pdu, handler.map(PendingResult::new))
    }

    fn deliver_response(&self, response: AvrcpResponse, result: Option<PendingResult>) {
        let Some(result) = result else {
            debug!(?response, "AVRCP response without handler");
            return;
        };
        match result.downcast::<dyn AvrcpResultHandler>() {
            Ok(handler) => self.control.dispatch(move || response.deliver(&*handler)),
            Err(result) => {
                warn!(?response, "pending handler is not an AVRCP handler");
                result.abandon(BluetoothStatus::Fail, &self.control);
            }
        }
    }

    fn deliver_notification(&self, notification: AvrcpNotification) {
        let slot = Arc::clone(&self.notifications);
        self.control.dispatch(move || match slot.get() {
            Some(handler) => notification.deliver(&*handler),
            None => debug!(?notification, "no AVRCP notification handler; dropping"),
        });
    }
}

impl DaemonModule for AvrcpModule {
    fn service_id(&self) -> u8 {
        SERVICE_ID
    }

    fn layout(&self) -> OpcodeLayout {
        LAYOUT
    }

    fn handle_pdu(&self, pdu: ReceivedPdu, result: Option<PendingResult>) {
        match demux(&LAYOUT, &RESPONSES, &NOTIFICATIONS, pdu, result, &self.control) {
            Some(Inbound::Response(response, result)) => self.deliver_response(response, result),
            Some(Inbound::Notification(notification)) => self.deliver_notification(notification),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::avrcp::types::MediaAttribute;
    use crate::control::ControlLoop;
    use crate::dispatch::OpcodeKind;
    use crate::pending::ResultHandler;

    #[derive(Default)]
    struct CapturingTransport {
        sent: Mutex<Vec<Pdu>>,
        refuse: bool,
    }

    impl PduTransport for CapturingTransport {
        fn send(&self, pdu: Pdu, _result: Option<PendingResult>) -> Result<()> {
            if self.refuse {
                return Err(CommandError::NotConnected);
            }
            self.sent.lock().unwrap().push(pdu);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ResultHandler for Recorder {
        fn on_error(&self, status: BluetoothStatus) {
            self.record(format!("error:{status}"));
        }
    }

    impl AvrcpResultHandler for Recorder {
        fn set_volume(&self) {
            self.record("set_volume");
        }

        fn get_play_status_rsp(&self) {
            self.record("get_play_status_rsp");
        }
    }

    impl AvrcpNotificationHandler for Recorder {
        fn volume_change_notification(&self, volume: u8, ctype: u8) {
            self.record(format!("volume:{volume}:{ctype}"));
        }

        fn remote_feature_notification(&self, address: Address, features: RemoteFeatures) {
            self.record(format!("features:{address}:{}", u8::from(features)));
        }
    }

    fn setup(refuse: bool) -> (ControlLoop, Arc<CapturingTransport>, AvrcpModule) {
        let control = ControlLoop::new();
        let transport = Arc::new(CapturingTransport {
            sent: Mutex::default(),
            refuse,
        });
        let module = AvrcpModule::new(transport.clone(), control.handle());
        (control, transport, module)
    }

    fn pending(recorder: &Arc<Recorder>) -> Option<PendingResult> {
        let handler: Arc<dyn AvrcpResultHandler> = recorder.clone();
        Some(PendingResult::new(handler))
    }

    #[test]
    fn tables_cover_every_opcode() {
        assert!(!RESPONSES.has_slot(usize::from(opcode::ERROR)));
        for &op in opcode::RESPONSES {
            assert_eq!(LAYOUT.classify(op), OpcodeKind::Response(usize::from(op)));
            assert!(RESPONSES.has_slot(usize::from(op)), "response {op:#04x}");
        }
        for &op in opcode::NOTIFICATIONS {
            let index = usize::from(op - LAYOUT.notification_base);
            assert_eq!(LAYOUT.classify(op), OpcodeKind::Notification(index));
            assert!(NOTIFICATIONS.has_slot(index), "notification {op:#04x}");
        }
        assert_eq!(RESPONSES.len(), opcode::RESPONSES.len() + 1);
        assert_eq!(NOTIFICATIONS.len(), opcode::NOTIFICATIONS.len());
    }

    #[test]
    fn opcode_families_do_not_alias() {
        for &response in opcode::RESPONSES {
            assert!(!opcode::NOTIFICATIONS.contains(&response));
            assert!(!LAYOUT.is_notification(response));
        }
        let mut all: Vec<u8> = opcode::RESPONSES
            .iter()
            .chain(opcode::NOTIFICATIONS)
            .copied()
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), opcode::RESPONSES.len() + opcode::NOTIFICATIONS.len());
    }

    #[test]
    fn set_volume_builds_one_byte_pdu() {
        let (_control, transport, module) = setup(false);
        module.set_volume(50, None).unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].service(), SERVICE_ID);
        assert_eq!(sent[0].opcode(), opcode::SET_VOLUME);
        assert_eq!(sent[0].payload(), &[50]);
    }

    #[test]
    fn play_status_payload_is_little_endian() {
        let (_control, transport, module) = setup(false);
        module
            .get_play_status_rsp(PlayStatus::Playing, 0x0001_0000, 0x0000_0100, None)
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].payload(), &[0x01, 0, 0, 1, 0, 0, 1, 0, 0]);
    }

    #[test]
    fn register_notification_carries_event_and_length() {
        let (_control, transport, module) = setup(false);
        module
            .register_notification_rsp(
                NotificationType::Changed,
                &NotificationParam::PlayPosChanged(0x0403_0201),
                None,
            )
            .unwrap();
        module
            .register_notification_rsp(
                NotificationType::Interim,
                &NotificationParam::TrackReachedEnd,
                None,
            )
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].payload(), &[0x05, 0x01, 4, 1, 2, 3, 4]);
        assert_eq!(sent[1].payload(), &[0x03, 0x00, 0]);
    }

    #[test]
    fn element_attributes_use_text_fields() {
        let (_control, transport, module) = setup(false);
        module
            .get_element_attr_rsp(&[ElementAttribute::new(MediaAttribute::Title, "Hi")], None)
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].payload(), &[1, 0x01, 3, b'H', b'i', 0]);
    }

    #[test]
    fn mismatched_arrays_fail_before_sending() {
        let (_control, transport, module) = setup(false);
        let err = module
            .get_player_app_value_rsp(&[1, 2], &[1], None)
            .unwrap_err();
        assert!(matches!(err, CommandError::Encode(_)));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn send_errors_surface_to_the_caller() {
        let (_control, _transport, module) = setup(true);
        let err = module.set_volume(10, None).unwrap_err();
        assert_eq!(err.status(), BluetoothStatus::NotReady);
    }

    #[test]
    fn response_reaches_its_handler_on_control_thread() {
        let (control, _transport, module) = setup(false);
        let recorder = Arc::new(Recorder::default());

        module.handle_pdu(
            ReceivedPdu::new(SERVICE_ID, opcode::SET_VOLUME, Vec::new()),
            pending(&recorder),
        );
        assert!(recorder.calls().is_empty());

        control.run_pending();
        assert_eq!(recorder.calls(), vec!["set_volume"]);
    }

    #[test]
    fn trailing_bytes_do_not_block_delivery() {
        let (control, _transport, module) = setup(false);
        let recorder = Arc::new(Recorder::default());

        module.handle_pdu(
            ReceivedPdu::new(SERVICE_ID, opcode::GET_PLAY_STATUS_RSP, vec![0xde, 0xad]),
            pending(&recorder),
        );
        control.run_pending();
        assert_eq!(recorder.calls(), vec!["get_play_status_rsp"]);
    }

    #[test]
    fn error_opcode_delivers_status() {
        let (control, _transport, module) = setup(false);
        let recorder = Arc::new(Recorder::default());

        module.handle_pdu(
            ReceivedPdu::new(SERVICE_ID, opcode::ERROR, vec![0x0a]),
            pending(&recorder),
        );
        control.run_pending();
        assert_eq!(recorder.calls(), vec!["error:remote_device_down"]);
    }

    #[test]
    fn unknown_response_fails_pending_handler() {
        let (control, _transport, module) = setup(false);
        let recorder = Arc::new(Recorder::default());

        module.handle_pdu(
            ReceivedPdu::new(SERVICE_ID, 0x0b, Vec::new()),
            pending(&recorder),
        );
        control.run_pending();
        assert_eq!(recorder.calls(), vec!["error:fail"]);
    }

    #[test]
    fn notification_reaches_installed_handler() {
        let (control, _transport, module) = setup(false);
        let recorder = Arc::new(Recorder::default());
        module.set_notification_handler(Some(recorder.clone()));

        module.handle_pdu(
            ReceivedPdu::new(SERVICE_ID, opcode::VOLUME_CHANGE_NTF, vec![30, 0x0d]),
            None,
        );
        module.handle_pdu(
            ReceivedPdu::new(
                SERVICE_ID,
                opcode::REMOTE_FEATURES_NTF,
                vec![1, 2, 3, 4, 5, 6, 0x03],
            ),
            None,
        );
        control.run_pending();
        assert_eq!(
            recorder.calls(),
            vec!["volume:30:13", "features:01:02:03:04:05:06:3"]
        );
    }

    #[test]
    fn malformed_notifications_are_dropped() {
        let (control, _transport, module) = setup(false);
        let recorder = Arc::new(Recorder::default());
        module.set_notification_handler(Some(recorder.clone()));

        // Truncated, unknown feature bit, and past the end of the table.
        module.handle_pdu(
            ReceivedPdu::new(SERVICE_ID, opcode::VOLUME_CHANGE_NTF, vec![30]),
            None,
        );
        module.handle_pdu(
            ReceivedPdu::new(
                SERVICE_ID,
                opcode::REMOTE_FEATURES_NTF,
                vec![0, 0, 0, 0, 0, 0, 0x80],
            ),
            None,
        );
        module.handle_pdu(ReceivedPdu::new(SERVICE_ID, 0x8d, Vec::new()), None);

        assert_eq!(control.run_pending(), 0);
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn notification_without_handler_is_dropped() {
        let (control, _transport, module) = setup(false);
        assert!(!module.has_notification_handler());

        module.handle_pdu(
            ReceivedPdu::new(SERVICE_ID, opcode::PASSTHROUGH_CMD_NTF, vec![0x44, 0]),
            None,
        );
        assert_eq!(control.run_pending(), 1);
    }
}
