//! NDEF messages and the tag memory that carries them
//!
//! [`encoder::MessageEncoder`] builds messages, [`parser`] reads them back,
//! and [`cc_file`] finds or places a message behind a Capability Container

pub mod cc_file;
pub mod encoder;
pub mod error;
pub mod header;
pub mod ndef_type;
pub mod parser;
pub mod payload;
pub mod record;

pub use cc_file::{CC_FILE, CC_WR_FILE, CcHeader, CcInfo, ccfile_decode};
pub use encoder::{EncoderOptions, MessageEncoder};
pub use error::{CapabilityError, ConfigurationError, FormatError, FormatErrorKind, NdefError};
pub use header::{HeaderFlags, NdefHeader};
pub use ndef_type::NdefType;
pub use parser::{ParsedRecord, decode_message, message_decoder, record_parser};
pub use payload::{NdefPayload, RecordMeta, TextPayload, TextPayloadFormat, UriPayload};
pub use record::{NdefRecord, Record};

/// Largest record payload the encoder accepts by default, the capacity of an 8 KiB tag
///
/// The cap is per payload, record headers and the message TLV come on top of it, so a
/// record right at the cap is encodable but no longer fits [`cc_file::wrap`]
pub const MAX_PAYLOAD_LENGTH: usize = 8 * 1024;

/// Language code for text records unless configured otherwise
pub const DEFAULT_LANGUAGE: &str = "en";
