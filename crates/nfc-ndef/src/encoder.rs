use tracing::debug;

use crate::{
    DEFAULT_LANGUAGE, MAX_PAYLOAD_LENGTH,
    cc_file,
    error::{CapabilityError, ConfigurationError},
    record::Record,
};

pub type Error = ConfigurationError;
type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Language code for [`MessageEncoder::add_text`]
    pub language: String,

    /// Largest payload accepted for a single record
    pub max_payload_length: usize,

    /// Store scheme-less URLs such as `example.com/path` as `https://`
    pub bare_url_https: bool,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            max_payload_length: MAX_PAYLOAD_LENGTH,
            bare_url_https: true,
        }
    }
}

/// Builds one NDEF message out of a list of records
///
/// Records can be added until [`MessageEncoder::bytes`] is first called, after that the
/// message is fixed and every call returns the same bytes
#[derive(Debug, Clone, Default)]
pub struct MessageEncoder {
    options: EncoderOptions,
    records: Vec<Record>,
    message: Option<Vec<u8>>,
}

impl MessageEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EncoderOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.message.is_some()
    }

    /// Add a UTF-8 text record in the configured language
    pub fn add_text(&mut self, text: &str) -> Result<()> {
        self.ensure_open()?;
        let record = Record::text(&self.options.language, text)?;
        self.push(record)
    }

    pub fn add_text_with_language(&mut self, text: &str, language: &str) -> Result<()> {
        self.ensure_open()?;
        let record = Record::text(language, text)?;
        self.push(record)
    }

    /// Add a URI record, abbreviated with the longest matching well-known prefix
    pub fn add_url(&mut self, uri: &str) -> Result<()> {
        self.ensure_open()?;
        let record = Record::uri_with(uri, self.options.bare_url_https)?;
        self.push(record)
    }

    /// Add an external type record, `type_name` is used as is, e.g. `bitcoin.org:psbt`
    pub fn add_custom(&mut self, type_name: &str, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.ensure_open()?;
        let record = Record::external(type_name, payload)?;
        self.push(record)
    }

    pub fn add_record(&mut self, record: Record) -> Result<()> {
        self.ensure_open()?;
        self.push(record)
    }

    /// Finalize and serialize the message, an empty message is zero bytes
    pub fn bytes(&mut self) -> &[u8] {
        let records = &self.records;
        self.message.get_or_insert_with(|| {
            let message = encode_message(records);
            debug!("finalized ndef message, {} records in {} bytes", records.len(), message.len());
            message
        })
    }

    /// Finalize and wrap the message in a read-only tag image
    ///
    /// Fails with [`CapabilityError::TooLarge`] when the whole message, headers included,
    /// exceeds the 8 KiB the image declares
    pub fn tag_image(&mut self) -> Result<Vec<u8>, CapabilityError> {
        cc_file::wrap(self.bytes())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_finalized() {
            return Err(ConfigurationError::Finalized);
        }

        Ok(())
    }

    fn push(&mut self, record: Record) -> Result<()> {
        let length = record.payload().len();
        let limit = self.options.max_payload_length;

        if length > limit {
            return Err(ConfigurationError::PayloadTooLarge { length, limit });
        }

        self.records.push(record);
        Ok(())
    }
}

fn encode_message(records: &[Record]) -> Vec<u8> {
    let size = records.iter().map(Record::encoded_len).sum();
    let mut message = Vec::with_capacity(size);

    let last = records.len().saturating_sub(1);
    for (index, record) in records.iter().enumerate() {
        record.write_to(&mut message, index == 0, index == last);
    }

    message
}
