use btbridge_pdu::{
    pack_as, pack_counted, unpack_counted, wire_enum, ConversionError, DecodeError, EncodeError,
    Pack, Pdu, ReceivedPdu, Unpack,
};
use serde::{Deserialize, Serialize};

wire_enum! {
    /// Playback state reported to the remote controller.
    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum PlayStatus: u8 {
        Stopped = 0x00,
        Playing = 0x01,
        Paused = 0x02,
        FwdSeek = 0x03,
        RevSeek = 0x04,
        Error = 0xff,
    }
}

wire_enum! {
    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum PlayerAttribute: u8 {
        Equalizer = 0x01,
        Repeat = 0x02,
        Shuffle = 0x03,
        Scan = 0x04,
    }
}

wire_enum! {
    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum MediaAttribute: u8 {
        Title = 0x01,
        Artist = 0x02,
        Album = 0x03,
        TrackNum = 0x04,
        NumTracks = 0x05,
        Genre = 0x06,
        PlayingTime = 0x07,
    }
}

wire_enum! {
    /// Events a controller can register for. 0x06 and 0x07 are not used.
    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AvrcpEvent: u8 {
        PlayStatusChanged = 0x01,
        TrackChange = 0x02,
        TrackReachedEnd = 0x03,
        TrackReachedStart = 0x04,
        PlayPosChanged = 0x05,
        AppSettingsChanged = 0x08,
    }
}

wire_enum! {
    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum NotificationType: u8 {
        Interim = 0x00,
        Changed = 0x01,
    }
}

wire_enum! {
    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AvrcpStatus: u8 {
        BadCommand = 0x00,
        BadParameter = 0x01,
        NotFound = 0x02,
        InternalError = 0x03,
        Success = 0x04,
    }
}

/// Optional capabilities of the remote controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteFeatures {
    pub metadata: bool,
    pub absolute_volume: bool,
    pub browse: bool,
}

impl RemoteFeatures {
    const METADATA: u8 = 0x01;
    const ABSOLUTE_VOLUME: u8 = 0x02;
    const BROWSE: u8 = 0x04;
}

impl TryFrom<u8> for RemoteFeatures {
    type Error = ConversionError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        let known = Self::METADATA | Self::ABSOLUTE_VOLUME | Self::BROWSE;
        if bits & !known != 0 {
            return Err(ConversionError::new("RemoteFeatures", u64::from(bits)));
        }
        Ok(Self {
            metadata: bits & Self::METADATA != 0,
            absolute_volume: bits & Self::ABSOLUTE_VOLUME != 0,
            browse: bits & Self::BROWSE != 0,
        })
    }
}

impl From<RemoteFeatures> for u8 {
    fn from(features: RemoteFeatures) -> u8 {
        let mut bits = 0;
        if features.metadata {
            bits |= RemoteFeatures::METADATA;
        }
        if features.absolute_volume {
            bits |= RemoteFeatures::ABSOLUTE_VOLUME;
        }
        if features.browse {
            bits |= RemoteFeatures::BROWSE;
        }
        bits
    }
}

/// Player application settings as raw `(attribute id, value)` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerSettings {
    pub pairs: Vec<(u8, u8)>,
}

impl PlayerSettings {
    fn encoded_len(&self) -> usize {
        1 + 2 * self.pairs.len()
    }
}

impl Pack for PlayerSettings {
    fn pack(&self, pdu: &mut Pdu) -> Result<(), EncodeError> {
        pack_counted::<u8, _>(&self.pairs, pdu)
    }
}

impl Unpack for PlayerSettings {
    fn unpack(pdu: &mut ReceivedPdu) -> Result<Self, DecodeError> {
        Ok(Self {
            pairs: unpack_counted::<u8, _>(pdu)?,
        })
    }
}

/// One element attribute of the current track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementAttribute {
    /// Attribute id. Wider than the wire field; values above 255 are rejected.
    pub id: u32,
    pub value: String,
}

impl ElementAttribute {
    pub fn new(id: MediaAttribute, value: impl Into<String>) -> Self {
        Self {
            id: u32::from(u8::from(id)),
            value: value.into(),
        }
    }
}

impl Pack for ElementAttribute {
    fn pack(&self, pdu: &mut Pdu) -> Result<(), EncodeError> {
        pack_as::<u8, u32>(self.id, pdu)?;
        self.value.pack(pdu)
    }
}

/// Event-specific data of a register-notification response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum NotificationParam {
    PlayStatusChanged(PlayStatus),
    TrackChange([u8; 8]),
    TrackReachedEnd,
    TrackReachedStart,
    PlayPosChanged(u32),
    AppSettingsChanged(PlayerSettings),
}

impl NotificationParam {
    pub fn event(&self) -> AvrcpEvent {
        match self {
            NotificationParam::PlayStatusChanged(_) => AvrcpEvent::PlayStatusChanged,
            NotificationParam::TrackChange(_) => AvrcpEvent::TrackChange,
            NotificationParam::TrackReachedEnd => AvrcpEvent::TrackReachedEnd,
            NotificationParam::TrackReachedStart => AvrcpEvent::TrackReachedStart,
            NotificationParam::PlayPosChanged(_) => AvrcpEvent::PlayPosChanged,
            NotificationParam::AppSettingsChanged(_) => AvrcpEvent::AppSettingsChanged,
        }
    }

    /// Size of the data that follows the length byte.
    pub fn encoded_len(&self) -> usize {
        match self {
            NotificationParam::PlayStatusChanged(_) => 1,
            NotificationParam::TrackChange(track) => track.len(),
            NotificationParam::TrackReachedEnd | NotificationParam::TrackReachedStart => 0,
            NotificationParam::PlayPosChanged(_) => 4,
            NotificationParam::AppSettingsChanged(settings) => settings.encoded_len(),
        }
    }
}

impl Pack for NotificationParam {
    fn pack(&self, pdu: &mut Pdu) -> Result<(), EncodeError> {
        match self {
            NotificationParam::PlayStatusChanged(status) => status.pack(pdu),
            NotificationParam::TrackChange(track) => track.pack(pdu),
            NotificationParam::TrackReachedEnd | NotificationParam::TrackReachedStart => Ok(()),
            NotificationParam::PlayPosChanged(position) => position.pack(pdu),
            NotificationParam::AppSettingsChanged(settings) => settings.pack(pdu),
        }
    }
}

#[cfg(test)]
mod tests {
    use btbridge_pdu::unpack_as;

    use super::*;

    #[test]
    fn play_status_error_is_0xff() {
        assert_eq!(u8::from(PlayStatus::Error), 0xff);
        assert!(PlayStatus::try_from(0x05u8).is_err());
    }

    #[test]
    fn unused_event_ids_are_rejected() {
        for raw in [0x00u8, 0x06, 0x07, 0x09] {
            assert!(AvrcpEvent::try_from(raw).is_err(), "{raw:#x}");
        }
        assert_eq!(AvrcpEvent::try_from(0x08u8).unwrap(), AvrcpEvent::AppSettingsChanged);
    }

    #[test]
    fn remote_feature_bits() {
        let features = RemoteFeatures::try_from(0x05u8).unwrap();
        assert!(features.metadata && features.browse && !features.absolute_volume);
        assert_eq!(u8::from(features), 0x05);

        let mut rx = ReceivedPdu::new(0x08, 0x81, vec![0x08]);
        let err = unpack_as::<u8, RemoteFeatures>(&mut rx).unwrap_err();
        assert!(matches!(err, DecodeError::Conversion(ConversionError { value: 8, .. })));
    }

    #[test]
    fn element_attribute_id_must_fit_a_byte() {
        let mut pdu = Pdu::new(0x08, 0x07, 0);
        ElementAttribute::new(MediaAttribute::Title, "Song").pack(&mut pdu).unwrap();
        assert_eq!(pdu.payload(), &[0x01, 5, b'S', b'o', b'n', b'g', 0]);

        let wide = ElementAttribute {
            id: 0x100,
            value: String::new(),
        };
        assert!(matches!(
            wide.pack(&mut pdu),
            Err(EncodeError::Conversion(_))
        ));
    }

    #[test]
    fn notification_param_length_matches_encoding() {
        let params = [
            NotificationParam::PlayStatusChanged(PlayStatus::Paused),
            NotificationParam::TrackChange([1; 8]),
            NotificationParam::TrackReachedEnd,
            NotificationParam::TrackReachedStart,
            NotificationParam::PlayPosChanged(1234),
            NotificationParam::AppSettingsChanged(PlayerSettings {
                pairs: vec![(2, 1), (3, 2)],
            }),
        ];
        for param in params {
            let mut pdu = Pdu::new(0x08, 0x09, 0);
            param.pack(&mut pdu).unwrap();
            assert_eq!(usize::from(pdu.payload_length()), param.encoded_len(), "{param:?}");
        }
    }
}
