use derive_more::Display;
use tracing::warn;

use crate::error::{Field, FormatError, FormatErrorKind};

/// Decoded content of a record, by record category
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NdefPayload {
    Text(TextPayload),
    Uri(UriPayload),
    External,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPayload {
    pub format: TextPayloadFormat,
    pub language: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TextPayloadFormat {
    #[display("UTF-8")]
    Utf8,
    #[display("UTF-16")]
    Utf16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriPayload {
    /// Index into [`URI_PREFIXES`]
    pub prefix: u8,
    /// The full URI, abbreviation expanded
    pub uri: String,
}

/// Lightweight per-category metadata, without materializing the decoded content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordMeta {
    Text {
        language: String,
        encoding: TextPayloadFormat,
    },
    Uri {
        prefix: u8,
    },
    External,
    Unknown,
}

/// URI prefix codes as defined in NFC Forum RTD URI specification
pub const URI_PREFIXES: &[&str] = &[
    "",                           // 0x00 - no prepending
    "http://www.",                // 0x01
    "https://www.",               // 0x02
    "http://",                    // 0x03
    "https://",                   // 0x04
    "tel:",                       // 0x05
    "mailto:",                    // 0x06
    "ftp://anonymous:anonymous@", // 0x07
    "ftp://ftp.",                 // 0x08
    "ftps://",                    // 0x09
    "sftp://",                    // 0x0A
    "smb://",                     // 0x0B
    "nfs://",                     // 0x0C
    "ftp://",                     // 0x0D
    "dav://",                     // 0x0E
    "news:",                      // 0x0F
    "telnet://",                  // 0x10
    "imap:",                      // 0x11
    "rtsp://",                    // 0x12
    "urn:",                       // 0x13
    "pop:",                       // 0x14
    "sip:",                       // 0x15
    "sips:",                      // 0x16
    "tftp:",                      // 0x17
    "btspp://",                   // 0x18
    "btl2cap://",                 // 0x19
    "btgoep://",                  // 0x1A
    "tcpobex://",                 // 0x1B
    "irdaobex://",                // 0x1C
    "file://",                    // 0x1D
    "urn:epc:id:",                // 0x1E
    "urn:epc:tag:",               // 0x1F
    "urn:epc:pat:",               // 0x20
    "urn:epc:raw:",               // 0x21
    "urn:epc:",                   // 0x22
    "urn:nfc:",                   // 0x23
];

/// Index of `https://` in [`URI_PREFIXES`]
pub const HTTPS_PREFIX: u8 = 0x04;

/// Status byte bit selecting UTF-16 text
pub const TEXT_UTF16_FLAG: u8 = 0x80;

/// Status byte bits holding the language code length
pub const TEXT_LANGUAGE_LENGTH_MASK: u8 = 0x3F;

impl TextPayloadFormat {
    /// Decode the text of a record, `offset` is where `text` starts in the message
    pub fn decode(self, text: &[u8], offset: usize) -> Result<String, FormatError> {
        match self {
            Self::Utf8 => String::from_utf8(text.to_vec()).map_err(|_| malformed_text(offset)),
            Self::Utf16 => decode_utf16(text).ok_or_else(|| malformed_text(offset)),
        }
    }

    /// Check that `text` decodes, without keeping the result
    pub fn validate(self, text: &[u8], offset: usize) -> Result<(), FormatError> {
        match self {
            Self::Utf8 => std::str::from_utf8(text).map(drop).map_err(|_| malformed_text(offset)),
            Self::Utf16 => self.decode(text, offset).map(drop),
        }
    }
}

fn malformed_text(offset: usize) -> FormatError {
    FormatError::new(offset, FormatErrorKind::Malformed(Field::Payload))
}

impl TextPayload {
    /// Payload bytes of a UTF-8 text record: status byte, language code, text
    pub fn encode(language: &str, text: &str) -> Vec<u8> {
        let language_length = language.len() as u8 & TEXT_LANGUAGE_LENGTH_MASK;

        let mut payload = Vec::with_capacity(1 + language.len() + text.len());
        payload.push(language_length);
        payload.extend_from_slice(language.as_bytes());
        payload.extend_from_slice(text.as_bytes());
        payload
    }
}

impl UriPayload {
    pub fn new(prefix: u8, rest: &[u8]) -> Self {
        let rest = String::from_utf8_lossy(rest);
        Self {
            prefix,
            uri: format!("{}{rest}", prefix_str(prefix)),
        }
    }

    /// Split a URI into the longest matching abbreviation and the remainder
    ///
    /// Without a match the prefix is `0x00` and the URI is kept verbatim, unless
    /// `bare_https` is set and the URI carries no scheme at all, then `https://` is implied
    pub fn abbreviate(uri: &str, bare_https: bool) -> (u8, &str) {
        let longest = URI_PREFIXES
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, prefix)| uri.starts_with(*prefix))
            .max_by_key(|(_, prefix)| prefix.len());

        match longest {
            Some((index, prefix)) => (index as u8, &uri[prefix.len()..]),
            None if bare_https && !has_scheme(uri) => (HTTPS_PREFIX, uri),
            None => (0x00, uri),
        }
    }

    /// Payload bytes of a URI record: prefix byte followed by the remainder
    pub fn encode(uri: &str, bare_https: bool) -> Vec<u8> {
        let (prefix, rest) = Self::abbreviate(uri, bare_https);

        let mut payload = Vec::with_capacity(1 + rest.len());
        payload.push(prefix);
        payload.extend_from_slice(rest.as_bytes());
        payload
    }
}

/// Abbreviation for a prefix index, reserved indexes expand to nothing
pub fn prefix_str(prefix: u8) -> &'static str {
    match URI_PREFIXES.get(prefix as usize) {
        Some(prefix) => prefix,
        None => {
            warn!("reserved uri prefix {prefix:#04x}, not expanding");
            ""
        }
    }
}

// scheme = ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"
fn has_scheme(uri: &str) -> bool {
    let Some((scheme, _)) = uri.split_once(':') else { return false };
    let mut chars = scheme.chars();

    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

// None on an odd byte count or an unpaired surrogate
fn decode_utf16(text: &[u8]) -> Option<String> {
    let (text, little_endian) = match text {
        [0xFE, 0xFF, rest @ ..] => (rest, false),
        [0xFF, 0xFE, rest @ ..] => (rest, true),
        _ => (text, false),
    };

    if text.len() % 2 != 0 {
        return None;
    }

    let units = text
        .chunks_exact(2)
        .map(|chunk| {
            let pair = [chunk[0], chunk[1]];
            if little_endian { u16::from_le_bytes(pair) } else { u16::from_be_bytes(pair) }
        })
        .collect::<Vec<u16>>();

    String::from_utf16(&units).ok()
}
