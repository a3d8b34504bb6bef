/// A wire value that has no counterpart in the target type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("value {value:#x} is not a valid {target}")]
pub struct ConversionError {
    /// Name of the type the value was converted into.
    pub target: &'static str,
    /// The rejected value, widened.
    pub value: u64,
}

impl ConversionError {
    pub fn new(target: &'static str, value: u64) -> Self {
        Self { target, value }
    }
}

/// Errors raised while building an outbound PDU.
///
/// These are always detected before anything reaches the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// The write would exceed the PDU's capacity.
    #[error("PDU buffer too small ({needed} bytes needed, capacity {capacity})")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// Two arrays that must be packed side by side differ in length.
    #[error("array length mismatch (declared {declared}, supplied {actual})")]
    ArrayLength { declared: usize, actual: usize },

    /// An element count does not fit the count field.
    #[error("array of {count} elements does not fit a count field (max {max})")]
    CountOverflow { count: usize, max: usize },

    /// A text field is longer than its length prefix allows.
    #[error("text field of {len} bytes exceeds the limit of {max}")]
    TextTooLong { len: usize, max: usize },

    /// A value could not be represented in its wire type.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Errors raised while decoding a received PDU.
///
/// A decode error aborts the current PDU only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The payload ended before a field was complete.
    #[error("truncated PDU ({needed} bytes needed, {remaining} remaining)")]
    Truncated { needed: usize, remaining: usize },

    /// A wire value was rejected by its conversion.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// A text field was not valid UTF-8.
    #[error("text field is not valid UTF-8")]
    InvalidText,
}

/// Errors raised while reading or writing framed PDUs.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing PDUs.
    #[error("PDU I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying socket reported an error.
    #[error(transparent)]
    Transport(#[from] btbridge_transport::TransportError),

    /// The connection was closed before a complete PDU was received.
    #[error("connection closed (incomplete PDU)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FramingError>;
