//! Read and write whole tag images
//!
//! ```
//! use nfc_tag::{MessageEncoder, tag};
//!
//! let mut encoder = MessageEncoder::new();
//! encoder.add_url("https://example.com").unwrap();
//!
//! let image = tag::write_records(&tag::blank(1024), &mut encoder).unwrap();
//! let records = tag::read_records(&image).unwrap();
//! assert_eq!(records[0].uri(), Some("https://example.com"));
//! ```

use tracing::debug;

use nfc_ndef::{
    CcHeader, FormatError, MessageEncoder, NdefError, NdefRecord, ParsedRecord, cc_file,
    ccfile_decode, decode_message, record_parser,
};

/// An empty writable image with room for `capacity` bytes of message
pub fn blank(capacity: usize) -> Vec<u8> {
    CcHeader::writable(capacity).empty_image()
}

/// Whether the image holds no message at all
pub fn is_blank(image: &[u8]) -> Result<bool, FormatError> {
    Ok(ccfile_decode(image)?.is_empty())
}

/// Decode every record stored in the image
pub fn read_records(image: &[u8]) -> Result<Vec<NdefRecord>, FormatError> {
    let info = ccfile_decode(image)?;
    let records = decode_message(info.body(image)?)?;
    debug!("read {} records from a {} byte image", records.len(), image.len());

    Ok(records)
}

/// Split the records stored in the image without decoding their content
pub fn parse_records(image: &[u8]) -> Result<Vec<ParsedRecord<'_>>, FormatError> {
    let info = ccfile_decode(image)?;
    record_parser(info.body(image)?).collect()
}

/// Finalize the encoder and write its message into a writable image
pub fn write_records(image: &[u8], encoder: &mut MessageEncoder) -> Result<Vec<u8>, NdefError> {
    let written = cc_file::splice(image, encoder.bytes())?;
    debug!("wrote {} records, image is now {} bytes", encoder.len(), written.len());

    Ok(written)
}
