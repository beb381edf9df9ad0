pub mod stream;

use std::iter::FusedIterator;

use stream::{Reader, Stream};
use tracing::{debug, warn};
use winnow::{
    ModalResult, Parser,
    binary::bits::{bits, bool as take_bool, take as take_bits},
    error::{ContextError, ErrMode},
};

use crate::{
    error::{Field, FormatError, FormatErrorKind},
    header::NdefHeader,
    ndef_type::NdefType,
    payload::{NdefPayload, RecordMeta, TextPayload, TextPayloadFormat, UriPayload},
    record::{NdefRecord, Record},
};

pub type Error = FormatError;
type Result<T, E = Error> = std::result::Result<T, E>;

/// Lazily decode the records of a message
///
/// The sequence ends after the record flagged message-end, when the buffer runs out,
/// or right after the first error
pub fn message_decoder(buffer: &[u8]) -> MessageDecoder<'_> {
    MessageDecoder {
        records: Records::new(buffer),
    }
}

/// Lazily split a message into `(urn, payload, metadata)` without building full records
pub fn record_parser(buffer: &[u8]) -> RecordParser<'_> {
    RecordParser {
        records: Records::new(buffer),
    }
}

/// Decode a whole message, failing on the first malformed record
pub fn decode_message(buffer: &[u8]) -> Result<Vec<NdefRecord>> {
    message_decoder(buffer).collect()
}

#[derive(Debug, Clone)]
pub struct MessageDecoder<'a> {
    records: Records<'a>,
}

#[derive(Debug, Clone)]
pub struct RecordParser<'a> {
    records: Records<'a>,
}

/// A record as split by [`record_parser`], borrowing from the input buffer
///
/// `payload` is the text for text records, the part after the prefix byte for URI
/// records, and the raw payload for everything else
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord<'a> {
    pub urn: String,
    pub payload: &'a [u8],
    pub meta: RecordMeta,
}

impl Iterator for MessageDecoder<'_> {
    type Item = Result<NdefRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.records.next()?.and_then(|raw| raw.decode());
        if let Err(error) = &result {
            self.records.stop(error);
        }

        Some(result)
    }
}

impl FusedIterator for MessageDecoder<'_> {}

impl<'a> Iterator for RecordParser<'a> {
    type Item = Result<ParsedRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.records.next()?.and_then(|raw| raw.split());
        if let Err(error) = &result {
            self.records.stop(error);
        }

        Some(result)
    }
}

impl FusedIterator for RecordParser<'_> {}

/// A record split into its fields, nothing interpreted yet
#[derive(Debug, Clone)]
struct RawRecord<'a> {
    header: NdefHeader,
    type_: &'a [u8],
    id: Option<&'a [u8]>,
    payload: &'a [u8],
    payload_offset: usize,
}

/// Forward-only record stepper shared by both decoders
#[derive(Debug, Clone)]
struct Records<'a> {
    reader: Reader<'a>,
    count: usize,
    finished: bool,
}

impl<'a> Records<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        Self {
            reader: Reader::new(buffer),
            count: 0,
            finished: false,
        }
    }

    fn stop(&mut self, error: &FormatError) {
        if !self.finished {
            debug!("stopping after record {}: {error}", self.count);
            self.finished = true;
        }
    }

    fn step(&mut self) -> Result<RawRecord<'a>> {
        let reader = &mut self.reader;

        let header = parse_header(reader)?;
        let type_ = reader.take(Field::Type, header.type_length as usize)?;
        let id = match header.id_length {
            Some(id_length) => Some(reader.take(Field::Id, id_length as usize)?),
            None => None,
        };

        let payload_offset = reader.offset();
        let payload = reader.take(Field::Payload, header.payload_length as usize)?;

        Ok(RawRecord {
            header,
            type_,
            id,
            payload,
            payload_offset,
        })
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<RawRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if self.reader.is_empty() {
            if self.count > 0 {
                warn!("message ended after {} records without a message-end flag", self.count);
            }

            self.finished = true;
            return None;
        }

        let result = self.step();
        match &result {
            Ok(record) => {
                self.count += 1;
                self.finished = record.header.message_end;
            }
            Err(error) => self.stop(error),
        }

        Some(result)
    }
}

impl<'a> RawRecord<'a> {
    fn decode(self) -> Result<NdefRecord> {
        let payload = match self.kind() {
            RecordKind::Text => {
                let text = split_text(self.payload, self.payload_offset)?;
                NdefPayload::Text(TextPayload {
                    format: text.format,
                    language: text.language.to_string(),
                    text: text.format.decode(text.text, text.text_offset)?,
                })
            }
            RecordKind::Uri => {
                let (prefix, rest) = split_uri(self.payload, self.payload_offset)?;
                NdefPayload::Uri(UriPayload::new(prefix, rest))
            }
            RecordKind::External => NdefPayload::External,
            RecordKind::Unknown => NdefPayload::Unknown,
        };

        let record = Record::from_parts(
            self.header.type_name_format,
            self.type_,
            self.id,
            self.payload,
        );

        Ok(NdefRecord {
            header: self.header,
            record,
            payload,
        })
    }

    fn split(self) -> Result<ParsedRecord<'a>> {
        let urn = self.header.type_name_format.urn(self.type_);

        let (payload, meta) = match self.kind() {
            RecordKind::Text => {
                let text = split_text(self.payload, self.payload_offset)?;
                text.format.validate(text.text, text.text_offset)?;

                let meta = RecordMeta::Text {
                    language: text.language.to_string(),
                    encoding: text.format,
                };
                (text.text, meta)
            }
            RecordKind::Uri => {
                let (prefix, rest) = split_uri(self.payload, self.payload_offset)?;
                (rest, RecordMeta::Uri { prefix })
            }
            RecordKind::External => (self.payload, RecordMeta::External),
            RecordKind::Unknown => (self.payload, RecordMeta::Unknown),
        };

        Ok(ParsedRecord { urn, payload, meta })
    }

    fn kind(&self) -> RecordKind {
        match (self.header.type_name_format, self.type_) {
            (NdefType::WellKnown, [b'T']) => RecordKind::Text,
            (NdefType::WellKnown, [b'U']) => RecordKind::Uri,
            (NdefType::External, _) => RecordKind::External,
            _ => RecordKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind {
    Text,
    Uri,
    External,
    Unknown,
}

// private
fn parse_header_byte(input: &mut Stream<'_>) -> ModalResult<(bool, bool, bool, bool, bool, u8)> {
    bits::<_, _, ErrMode<ContextError>, _, _>((
        take_bool,
        take_bool,
        take_bool,
        take_bool,
        take_bool,
        take_bits(3_u8),
    ))
    .parse_next(input)
}

fn parse_header(reader: &mut Reader<'_>) -> Result<NdefHeader> {
    let header_offset = reader.offset();
    let (message_begin, message_end, chunked, short_record, has_id_length, type_name_format) =
        reader.parse(Field::Header, 1, parse_header_byte)?;

    if chunked {
        return Err(FormatError::new(header_offset, FormatErrorKind::ChunkedRecord));
    }

    let type_name_format = NdefType::from_bits(type_name_format);
    if type_name_format == NdefType::Reserved {
        warn!("record at byte {header_offset} uses the reserved type name format");
    }

    let type_length = reader.u8(Field::TypeLength)?;

    let payload_length = if short_record {
        reader.u8(Field::PayloadLength)? as u32
    } else {
        reader.be_u32(Field::PayloadLength)?
    };

    let id_length = if has_id_length {
        Some(reader.u8(Field::IdLength)?)
    } else {
        None
    };

    Ok(NdefHeader {
        message_begin,
        message_end,
        chunked,
        short_record,
        has_id_length,
        type_name_format,
        type_length,
        payload_length,
        id_length,
    })
}

/// Fields of a text payload, the text itself still encoded
struct TextParts<'a> {
    format: TextPayloadFormat,
    language: &'a str,
    text: &'a [u8],
    text_offset: usize,
}

// bit 7 utf-16, bit 6 reserved, bits 5..0 language code length
fn parse_text_status(input: &mut Stream<'_>) -> ModalResult<(bool, bool, u8)> {
    bits::<_, _, ErrMode<ContextError>, _, _>((take_bool, take_bool, take_bits(6_u8)))
        .parse_next(input)
}

fn split_text(payload: &[u8], offset: usize) -> Result<TextParts<'_>> {
    let mut reader = Reader::at(payload, offset);

    let (is_utf16, _reserved, language_code_length) =
        reader.parse(Field::TextStatus, 1, parse_text_status)?;

    let language_offset = reader.offset();
    let language = reader.take(Field::LanguageCode, language_code_length as usize)?;
    let language = std::str::from_utf8(language)
        .ok()
        .filter(|language| language.is_ascii())
        .ok_or_else(|| {
            FormatError::new(language_offset, FormatErrorKind::Malformed(Field::LanguageCode))
        })?;

    let text_offset = reader.offset();
    let text = reader.rest(Field::Payload)?;

    let format = if is_utf16 {
        TextPayloadFormat::Utf16
    } else {
        TextPayloadFormat::Utf8
    };

    Ok(TextParts {
        format,
        language,
        text,
        text_offset,
    })
}

fn split_uri(payload: &[u8], offset: usize) -> Result<(u8, &[u8])> {
    let mut reader = Reader::at(payload, offset);
    let prefix = reader.u8(Field::UriPrefix)?;
    let rest = reader.rest(Field::Payload)?;

    Ok((prefix, rest))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{encoder::MessageEncoder, payload::TEXT_UTF16_FLAG};

    fn encode(build: impl FnOnce(&mut MessageEncoder)) -> Vec<u8> {
        let mut encoder = MessageEncoder::new();
        build(&mut encoder);
        encoder.bytes().to_vec()
    }

    #[test]
    fn known_header_parse() {
        let bytes = [0xD1, 0x01, 0x0D, 0x55, 0x02];
        let mut reader = Reader::new(&bytes);
        let header: NdefHeader = parse_header(&mut reader).unwrap();

        assert!(header.message_begin);
        assert!(header.message_end);
        assert!(!header.chunked);
        assert!(header.short_record);
        assert!(!header.has_id_length);
        assert_eq!(header.type_name_format, NdefType::WellKnown);
        assert_eq!(header.type_length, 1);
        assert_eq!(header.payload_length, 13);
        assert_eq!(reader.offset(), 3);
    }

    #[test]
    fn hello_world() {
        let bytes = encode(|n| n.add_text("Hello world").unwrap());

        let records = decode_message(&bytes).unwrap();
        assert_eq!(records.len(), 1);

        let got = &records[0];
        assert_eq!(got.urn(), "urn:nfc:wkt:T");
        assert_eq!(got.text(), Some("Hello world"));
        assert_eq!(got.language(), Some("en"));
        assert_eq!(got.encoding().map(|e| e.to_string()).as_deref(), Some("UTF-8"));
        assert!(got.header.message_begin && got.header.message_end);
    }

    #[test]
    fn text_then_url() {
        let bytes = encode(|n| {
            n.add_text("Hello world").unwrap();
            n.add_url("store.coinkite.com/store/coldcard").unwrap();
        });

        let records = decode_message(&bytes).unwrap();
        let [txt, url] = records.as_slice() else { panic!("expected two records") };

        assert_eq!(txt.text(), Some("Hello world"));
        assert!(txt.header.message_begin && !txt.header.message_end);

        assert_eq!(url.urn(), "urn:nfc:wkt:U");
        assert_eq!(url.uri(), Some("https://store.coinkite.com/store/coldcard"));
        assert_eq!(url.iri(), url.uri());
        assert!(!url.header.message_begin && url.header.message_end);
    }

    #[test]
    fn url_round_trips() {
        let uris = [
            "https://www.example.com/a?b=c",
            "http://www.nxp.com/nfc",
            "https://example.com",
            "mailto:support@example.com",
            "bitcoin:bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq?amount=0.1",
            "urn:epc:id:sgtin:0614141.107346.2017",
        ];

        for uri in uris {
            let bytes = encode(|n| n.add_url(uri).unwrap());
            let records = decode_message(&bytes).unwrap();
            assert_eq!(records[0].uri(), Some(uri));
            assert_eq!(records[0].iri(), Some(uri));
        }
    }

    #[test]
    fn custom_records() {
        let hx = hex::encode((0..32_u8).collect::<Vec<u8>>()).into_bytes();
        let bytes = encode(|n| {
            n.add_text("Title").unwrap();
            n.add_custom("bitcoin.org:sha256", hx.clone()).unwrap();
        });

        let records = decode_message(&bytes).unwrap();
        let [txt, sha] = records.as_slice() else { panic!("expected two records") };
        assert_eq!(txt.text(), Some("Title"));
        assert_eq!(sha.data(), hx.as_slice());
        assert_eq!(sha.urn(), "urn:nfc:ext:bitcoin.org:sha256");
        assert_eq!(sha.payload, NdefPayload::External);
    }

    #[test]
    fn large_custom_payload_between_texts() {
        let mut psbt = b"psbt\xff".to_vec();
        psbt.extend_from_slice(&[0; 5000]);

        let bytes = encode(|n| {
            n.add_text("Title").unwrap();
            n.add_custom("bitcoin.org:psbt", psbt.clone()).unwrap();
            n.add_text("Footer").unwrap();
        });

        let records = decode_message(&bytes).unwrap();
        let [txt, p, ft] = records.as_slice() else { panic!("expected three records") };

        assert_eq!(txt.text(), Some("Title"));
        assert_eq!(ft.text(), Some("Footer"));
        assert_eq!(p.data(), psbt.as_slice());
        assert_eq!(p.urn(), "urn:nfc:ext:bitcoin.org:psbt");
        assert!(!p.header.short_record);
    }

    #[test]
    fn single_custom_records() {
        let hx = hex::encode((0..32_u8).collect::<Vec<u8>>()).into_bytes();
        let bytes = encode(|n| n.add_custom("bitcoin.org:txid", hx.clone()).unwrap());
        let records = decode_message(&bytes).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].urn(), "urn:nfc:ext:bitcoin.org:txid");
        assert_eq!(records[0].data(), hx.as_slice());

        let zeros = vec![0; 2000];
        let bytes = encode(|n| n.add_custom("bitcoin.org:txn", zeros.clone()).unwrap());
        let records = decode_message(&bytes).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].urn(), "urn:nfc:ext:bitcoin.org:txn");
        assert_eq!(records[0].data(), zeros.as_slice());
    }

    #[test]
    fn empty_buffer_is_an_empty_message() {
        assert_eq!(message_decoder(&[]).count(), 0);
        assert_eq!(record_parser(&[]).count(), 0);
    }

    #[test]
    fn decoding_is_lazy_and_stops_at_message_end() {
        let mut bytes = encode(|n| n.add_text("only").unwrap());
        bytes.extend_from_slice(&[0xFE, 0x00, 0x00]);

        let mut decoder = message_decoder(&bytes);
        assert_eq!(decoder.next().unwrap().unwrap().text(), Some("only"));
        assert!(decoder.next().is_none());
        assert!(decoder.next().is_none());
    }

    #[test]
    fn record_parser_splits_fields() {
        let bytes = encode(|n| {
            n.add_text("this is a test").unwrap();
            n.add_url("https://www.example.com").unwrap();
            n.add_custom("bitcoin.org:txid", b"abcd".to_vec()).unwrap();
        });

        let parsed = record_parser(&bytes).collect::<Result<Vec<_>>>().unwrap();
        let decoded = decode_message(&bytes).unwrap();
        assert_eq!(parsed.len(), decoded.len());

        for (record, split) in decoded.iter().zip(&parsed) {
            assert_eq!(record.urn(), split.urn);
        }

        assert_eq!(parsed[0].payload, b"this is a test");
        assert_eq!(
            parsed[0].meta,
            RecordMeta::Text { language: "en".into(), encoding: TextPayloadFormat::Utf8 }
        );

        assert_eq!(parsed[1].payload, b"example.com");
        assert_eq!(parsed[1].meta, RecordMeta::Uri { prefix: 0x02 });
        let mut raw = vec![0x02];
        raw.extend_from_slice(parsed[1].payload);
        assert_eq!(decoded[1].data(), raw.as_slice());

        assert_eq!(parsed[2].payload, b"abcd");
        assert_eq!(parsed[2].meta, RecordMeta::External);
    }

    #[test]
    fn unknown_formats_decode_as_raw() {
        // media type record, then a reserved tnf record
        let mut bytes = vec![0x92, 0x0A, 0x02];
        bytes.extend_from_slice(b"text/plain");
        bytes.extend_from_slice(b"hi");
        bytes.extend_from_slice(&[0x57, 0x00, 0x01, 0xAA]);

        let records = decode_message(&bytes).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].type_name_format(), NdefType::Mime);
        assert_eq!(records[0].urn(), "text/plain");
        assert_eq!(records[0].data(), b"hi");
        assert_eq!(records[0].payload, NdefPayload::Unknown);

        assert_eq!(records[1].type_name_format(), NdefType::Reserved);
        assert_eq!(records[1].urn(), "unknown");
        assert_eq!(records[1].data(), &[0xAA_u8]);

        let parsed = record_parser(&bytes).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(parsed[1].meta, RecordMeta::Unknown);
    }

    #[test]
    fn utf16_text_record() {
        let mut payload = vec![TEXT_UTF16_FLAG | 0x02];
        payload.extend_from_slice(b"de");
        payload.extend_from_slice(&[0x00, 0x48, 0x00, 0x69]);

        let mut bytes = vec![0xD1, 0x01, payload.len() as u8, b'T'];
        bytes.extend_from_slice(&payload);

        let records = decode_message(&bytes).unwrap();
        assert_eq!(records[0].text(), Some("Hi"));
        assert_eq!(records[0].language(), Some("de"));
        assert_eq!(records[0].encoding(), Some(TextPayloadFormat::Utf16));
    }

    #[test]
    fn record_with_id() {
        let mut bytes = vec![0xD9, 0x01, 0x02, 0x03, b'U'];
        bytes.extend_from_slice(b"id1");
        bytes.extend_from_slice(&[0x00, b'x']);

        let records = decode_message(&bytes).unwrap();
        assert_eq!(records[0].id(), Some(&b"id1"[..]));
        assert_eq!(records[0].uri(), Some("x"));
    }

    #[test]
    fn payload_length_past_the_end() {
        let bytes = encode(|n| n.add_text("Hello world").unwrap());
        let truncated = &bytes[..bytes.len() - 3];

        let mut decoder = message_decoder(truncated);
        let error = decoder.next().unwrap().unwrap_err();
        assert_eq!(error.offset, 4);
        assert_eq!(
            error.kind,
            FormatErrorKind::LengthOverrun { field: Field::Payload, claimed: 14, remaining: 11 }
        );

        // no partial records after an error
        assert!(decoder.next().is_none());
    }

    #[test]
    fn truncated_header() {
        let error = decode_message(&[0xD1]).unwrap_err();
        assert_eq!(error.offset, 1);
        assert_eq!(
            error.kind,
            FormatErrorKind::Truncated { field: Field::TypeLength, needed: 1, remaining: 0 }
        );

        // long record with only two of the four payload length bytes
        let error = decode_message(&[0xC4, 0x01, 0x00, 0x00]).unwrap_err();
        assert_eq!(error.offset, 2);
        assert_eq!(
            error.kind,
            FormatErrorKind::Truncated { field: Field::PayloadLength, needed: 4, remaining: 2 }
        );
    }

    #[test]
    fn second_record_error_keeps_first() {
        let mut bytes = encode(|n| {
            n.add_text("first").unwrap();
            n.add_text("second").unwrap();
        });
        let len = bytes.len();
        bytes.truncate(len - 2);

        let results = message_decoder(&bytes).collect::<Vec<_>>();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().text(), Some("first"));
        assert!(results[1].is_err());
        assert!(decode_message(&bytes).is_err());
    }

    #[test]
    fn chunked_records_are_rejected() {
        let bytes = [0xB1, 0x01, 0x01, b'T', 0x00];
        let error = decode_message(&bytes).unwrap_err();
        assert_eq!(error, FormatError::new(0, FormatErrorKind::ChunkedRecord));
    }

    #[test]
    fn bad_text_language_length() {
        // status byte claims a 5 byte language code in a 3 byte payload
        let bytes = [0xD1, 0x01, 0x03, b'T', 0x05, b'e', b'n'];
        let error = decode_message(&bytes).unwrap_err();
        assert_eq!(error.offset, 5);
        assert_eq!(
            error.kind,
            FormatErrorKind::LengthOverrun { field: Field::LanguageCode, claimed: 5, remaining: 2 }
        );

        let error = record_parser(&bytes).next().unwrap().unwrap_err();
        assert_eq!(error.offset, 5);
    }

    #[test]
    fn empty_uri_payload() {
        let bytes = [0xD1, 0x01, 0x00, b'U'];
        let error = decode_message(&bytes).unwrap_err();
        assert_eq!(error.offset, 4);
        assert_eq!(
            error.kind,
            FormatErrorKind::Truncated { field: Field::UriPrefix, needed: 1, remaining: 0 }
        );
    }

    #[test]
    fn multi_byte_text_round_trips() {
        let text = "héllo ₿ 🚀";
        let bytes = encode(|n| n.add_text(text).unwrap());

        let records = decode_message(&bytes).unwrap();
        assert_eq!(records[0].text(), Some(text));
        assert_eq!(records[0].header.payload_length as usize, 3 + text.len());
        assert!(text.len() > text.chars().count());

        let parsed = record_parser(&bytes).next().unwrap().unwrap();
        assert_eq!(parsed.payload, text.as_bytes());
    }

    #[test]
    fn invalid_utf8_text_is_rejected_by_both_decoders() {
        let bytes = [0xD1, 0x01, 0x05, b'T', 0x02, b'e', b'n', 0xC3, 0x28];
        let expected = FormatError::new(7, FormatErrorKind::Malformed(Field::Payload));

        assert_eq!(decode_message(&bytes), Err(expected.clone()));
        assert_eq!(record_parser(&bytes).next(), Some(Err(expected)));
    }

    #[test]
    fn odd_length_utf16_text_is_rejected() {
        // three bytes of utf-16 text
        let bytes = [0xD1, 0x01, 0x06, b'T', TEXT_UTF16_FLAG | 0x02, b'e', b'n', 0x00, 0x48, 0x00];
        let expected = FormatError::new(7, FormatErrorKind::Malformed(Field::Payload));

        assert_eq!(decode_message(&bytes), Err(expected.clone()));
        assert_eq!(record_parser(&bytes).next(), Some(Err(expected)));
    }

    #[test]
    fn non_ascii_language_code_is_rejected() {
        let bytes = [0xD1, 0x01, 0x04, b'T', 0x02, 0xC3, 0xA9, b'x'];
        let expected = FormatError::new(5, FormatErrorKind::Malformed(Field::LanguageCode));

        assert_eq!(decode_message(&bytes), Err(expected.clone()));
        assert_eq!(record_parser(&bytes).next(), Some(Err(expected)));
    }
}
