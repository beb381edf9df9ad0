use derive_more::Display;

/// Part of the byte stream a [`FormatError`] points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Field {
    #[display("record header")]
    Header,
    #[display("type length")]
    TypeLength,
    #[display("payload length")]
    PayloadLength,
    #[display("id length")]
    IdLength,
    #[display("type")]
    Type,
    #[display("id")]
    Id,
    #[display("payload")]
    Payload,
    #[display("text status byte")]
    TextStatus,
    #[display("language code")]
    LanguageCode,
    #[display("uri prefix")]
    UriPrefix,
    #[display("capability container")]
    CapabilityContainer,
    #[display("tlv tag")]
    TlvTag,
    #[display("tlv length")]
    TlvLength,
    #[display("tlv value")]
    TlvValue,
    #[display("ndef message length")]
    MessageLength,
    #[display("ndef message")]
    Message,
}

/// Malformed byte stream, `offset` is where the offending field starts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed data at byte {offset}: {kind}")]
pub struct FormatError {
    pub offset: usize,
    pub kind: FormatErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatErrorKind {
    #[error("{field} truncated, needs {needed} bytes but only {remaining} remain")]
    Truncated {
        field: Field,
        needed: usize,
        remaining: usize,
    },

    #[error("{field} claims {claimed} bytes but only {remaining} remain")]
    LengthOverrun {
        field: Field,
        claimed: usize,
        remaining: usize,
    },

    #[error("chunked records are not supported")]
    ChunkedRecord,

    #[error("bad capability container magic {0:#04x}")]
    BadMagic(u8),

    #[error("unsupported mapping version {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("no ndef message tlv before the terminator")]
    MissingNdefTlv,

    #[error("tlv {tag:#04x} has length {length}, expected {expected}")]
    BadTlvLength {
        tag: u8,
        length: usize,
        expected: usize,
    },

    #[error("message of {length} bytes exceeds the tag capacity of {capacity}")]
    ExceedsCapacity { length: usize, capacity: usize },

    #[error("unable to parse {0}")]
    Malformed(Field),
}

impl FormatError {
    pub fn new(offset: usize, kind: FormatErrorKind) -> Self {
        Self { offset, kind }
    }
}

/// Encoder misuse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("message already finalized, no more records can be added")]
    Finalized,

    #[error("record type must not be empty")]
    EmptyType,

    #[error("record type is {0} bytes, the limit is 255")]
    TypeTooLong(usize),

    #[error("record id is {0} bytes, the limit is 255")]
    IdTooLong(usize),

    #[error("payload is {length} bytes, the limit is {limit}")]
    PayloadTooLarge { length: usize, limit: usize },

    #[error("invalid language code {0:?}, must be 1 to 63 ascii bytes")]
    InvalidLanguage(String),
}

/// Misuse of a tag image's capabilities
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("tag image is read-only")]
    ReadOnly,

    #[error("message of {length} bytes does not fit, the tag holds {capacity}")]
    TooLarge { length: usize, capacity: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NdefError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),
}
