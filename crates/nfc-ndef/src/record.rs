use crate::{
    error::ConfigurationError,
    header::NdefHeader,
    ndef_type::NdefType,
    payload::{NdefPayload, TextPayload, TextPayloadFormat, UriPayload},
};

type Result<T, E = ConfigurationError> = std::result::Result<T, E>;

/// A single record, flags are derived when the record is placed in a message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    type_name_format: NdefType,
    type_: Vec<u8>,
    id: Option<Vec<u8>>,
    payload: Vec<u8>,
}

impl Record {
    /// Well-known text record, UTF-8 encoded
    pub fn text(language: &str, text: &str) -> Result<Self> {
        let valid_language = (1..=63).contains(&language.len()) && language.is_ascii();
        if !valid_language {
            return Err(ConfigurationError::InvalidLanguage(language.to_string()));
        }

        Self::new(NdefType::WellKnown, b"T", TextPayload::encode(language, text))
    }

    /// Well-known URI record, strict longest-prefix abbreviation
    pub fn uri(uri: &str) -> Result<Self> {
        Self::uri_with(uri, false)
    }

    /// Well-known URI record, a scheme-less URI is stored as `https://` when `bare_https` is set
    pub fn uri_with(uri: &str, bare_https: bool) -> Result<Self> {
        Self::new(NdefType::WellKnown, b"U", UriPayload::encode(uri, bare_https))
    }

    /// External type record, e.g. `bitcoin.org:psbt`
    pub fn external(type_name: &str, payload: impl Into<Vec<u8>>) -> Result<Self> {
        if type_name.is_empty() {
            return Err(ConfigurationError::EmptyType);
        }

        Self::new(NdefType::External, type_name.as_bytes(), payload.into())
    }

    pub fn with_id(mut self, id: impl Into<Vec<u8>>) -> Result<Self> {
        let id = id.into();
        if id.len() > u8::MAX as usize {
            return Err(ConfigurationError::IdTooLong(id.len()));
        }

        self.id = Some(id);
        Ok(self)
    }

    fn new(type_name_format: NdefType, type_: &[u8], payload: Vec<u8>) -> Result<Self> {
        if type_.len() > u8::MAX as usize {
            return Err(ConfigurationError::TypeTooLong(type_.len()));
        }

        if u32::try_from(payload.len()).is_err() {
            return Err(ConfigurationError::PayloadTooLarge {
                length: payload.len(),
                limit: u32::MAX as usize,
            });
        }

        Ok(Self {
            type_name_format,
            type_: type_.to_vec(),
            id: None,
            payload,
        })
    }

    /// Built from fields already bounded by the wire format
    pub(crate) fn from_parts(
        type_name_format: NdefType,
        type_: &[u8],
        id: Option<&[u8]>,
        payload: &[u8],
    ) -> Self {
        Self {
            type_name_format,
            type_: type_.to_vec(),
            id: id.map(<[u8]>::to_vec),
            payload: payload.to_vec(),
        }
    }

    pub fn type_name_format(&self) -> NdefType {
        self.type_name_format
    }

    pub fn type_(&self) -> &[u8] {
        &self.type_
    }

    pub fn id(&self) -> Option<&[u8]> {
        self.id.as_deref()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn urn(&self) -> String {
        self.type_name_format.urn(&self.type_)
    }

    /// Header for this record at a given position in a message
    pub fn header(&self, message_begin: bool, message_end: bool) -> NdefHeader {
        let payload_length = self.payload.len() as u32;
        let id_length = self.id.as_ref().map(|id| id.len() as u8);

        NdefHeader {
            message_begin,
            message_end,
            chunked: false,
            short_record: payload_length < 256,
            has_id_length: id_length.is_some(),
            type_name_format: self.type_name_format,
            type_length: self.type_.len() as u8,
            payload_length,
            id_length,
        }
    }

    pub fn encoded_len(&self) -> usize {
        let id_len = self.id.as_ref().map_or(0, Vec::len);
        self.header(false, false).encoded_len() + self.type_.len() + id_len + self.payload.len()
    }

    pub fn write_to(&self, out: &mut Vec<u8>, message_begin: bool, message_end: bool) {
        self.header(message_begin, message_end).write_to(out);
        out.extend_from_slice(&self.type_);

        if let Some(id) = &self.id {
            out.extend_from_slice(id);
        }

        out.extend_from_slice(&self.payload);
    }
}

/// A record read back from a message, with its header and interpreted content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    pub header: NdefHeader,
    pub record: Record,
    pub payload: NdefPayload,
}

impl NdefRecord {
    pub fn type_name_format(&self) -> NdefType {
        self.record.type_name_format
    }

    pub fn type_(&self) -> &[u8] {
        self.record.type_()
    }

    pub fn id(&self) -> Option<&[u8]> {
        self.record.id()
    }

    /// `urn:nfc:wkt:T`, `urn:nfc:ext:bitcoin.org:psbt`, ...
    pub fn urn(&self) -> String {
        self.record.urn()
    }

    /// Raw payload bytes, whatever the record category
    pub fn data(&self) -> &[u8] {
        self.record.payload()
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            NdefPayload::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    pub fn language(&self) -> Option<&str> {
        match &self.payload {
            NdefPayload::Text(text) => Some(&text.language),
            _ => None,
        }
    }

    pub fn encoding(&self) -> Option<TextPayloadFormat> {
        match &self.payload {
            NdefPayload::Text(text) => Some(text.format),
            _ => None,
        }
    }

    pub fn uri(&self) -> Option<&str> {
        match &self.payload {
            NdefPayload::Uri(uri) => Some(&uri.uri),
            _ => None,
        }
    }

    /// Same as [`Self::uri`], no IDN conversion is applied
    pub fn iri(&self) -> Option<&str> {
        self.uri()
    }
}
