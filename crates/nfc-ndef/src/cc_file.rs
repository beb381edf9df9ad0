//! Capability Container at the start of tag memory
//!
//! A tag image is the CC header, a run of TLV blocks ending with the NDEF message TLV,
//! the message itself, and a `0xFE` terminator:
//!
//! ```text
//! E2 43 00 01 00 00 04 00 | 03 | len | message ... | FE
//! ```

use tracing::debug;

use crate::{
    MAX_PAYLOAD_LENGTH,
    error::{CapabilityError, Field, FormatError, FormatErrorKind, NdefError},
    parser::stream::Reader,
};

pub type Error = FormatError;
type Result<T, E = Error> = std::result::Result<T, E>;

/// Read-only CC header with 8 KiB of capacity, every image the encoder wraps starts with it
pub const CC_FILE: &[u8] = &[0xE2, 0x43, 0x00, 0x01, 0x00, 0x00, 0x04, 0x00, 0x03];

/// Empty writable image with 8 KiB of capacity
pub const CC_WR_FILE: &[u8] = &[0xE2, 0x40, 0x00, 0x01, 0x00, 0x00, 0x04, 0x00, 0x03, 0x00, 0xFE];

/// Capacity of the tag the fixtures describe
pub const DEFAULT_CAPACITY: usize = MAX_PAYLOAD_LENGTH;

/// Magic of a CC that always has the 4-byte form
pub const MAGIC_4_BYTE: u8 = 0xE1;

/// Magic of a CC that may use the 8-byte form
pub const MAGIC_8_BYTE: u8 = 0xE2;

/// Mapping version 1.0, open read and write access
pub const MAPPING_VERSION: u8 = 0x40;

const MAJOR_VERSION_SHIFT: u8 = 6;
const WRITE_ACCESS_MASK: u8 = 0x03;

/// Multiple block read support, set in the generated headers
const FEATURE_READ_MULTIPLE: u8 = 0x01;

/// Write access byte of an NDEF file control TLV on a read-only tag
const READ_ONLY_ACCESS: u8 = 0xFF;

pub mod tlv {
    pub const NULL: u8 = 0x00;
    pub const LOCK_CONTROL: u8 = 0x01;
    pub const MEMORY_CONTROL: u8 = 0x02;
    pub const NDEF_MESSAGE: u8 = 0x03;
    pub const NDEF_FILE_CONTROL: u8 = 0x04;
    pub const PROPRIETARY: u8 = 0xFD;
    pub const TERMINATOR: u8 = 0xFE;

    /// A length byte of `0xFF` is followed by the real length as 2 bytes big-endian
    pub const LONG_LENGTH: u8 = 0xFF;

    /// Value length of the NDEF file control TLV
    pub const NDEF_FILE_CONTROL_LENGTH: usize = 6;
}

/// Where the NDEF message sits in a tag image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CcInfo {
    /// Offset of the first message byte
    pub start_offset: usize,

    /// Message length, zero when the tag holds no message
    pub length: usize,

    pub is_writable: bool,

    /// Capacity declared by the header, or by an NDEF file control TLV
    pub max_ndef_size: usize,

    /// Offset of the NDEF message TLV length field
    pub length_offset: usize,
}

/// Generates CC headers in the 8-byte form, ending with the NDEF message TLV tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CcHeader {
    pub writable: bool,

    /// In bytes, rounded down to a multiple of 8
    pub capacity: usize,
}

/// Locate the NDEF message from the first bytes of a tag image
///
/// Only the header is needed, usually 16 bytes cover it, the message itself may extend
/// past the end of `header`
pub fn ccfile_decode(header: &[u8]) -> Result<CcInfo> {
    let mut reader = Reader::new(header);

    let magic = reader.u8(Field::CapabilityContainer)?;
    if !matches!(magic, MAGIC_4_BYTE | MAGIC_8_BYTE) {
        return Err(FormatError::new(0, FormatErrorKind::BadMagic(magic)));
    }

    let version_access = reader.u8(Field::CapabilityContainer)?;
    if version_access >> MAJOR_VERSION_SHIFT != MAPPING_VERSION >> MAJOR_VERSION_SHIFT {
        return Err(FormatError::new(1, FormatErrorKind::UnsupportedVersion(version_access)));
    }

    let mut is_writable = version_access & WRITE_ACCESS_MASK == 0;

    let mlen = reader.u8(Field::CapabilityContainer)?;
    let _features = reader.u8(Field::CapabilityContainer)?;

    let mut max_ndef_size = if mlen != 0 {
        mlen as usize * 8
    } else if magic == MAGIC_4_BYTE {
        let kind = FormatErrorKind::Malformed(Field::CapabilityContainer);
        return Err(FormatError::new(2, kind));
    } else {
        let _rfu = reader.be_u16(Field::CapabilityContainer)?;
        reader.be_u16(Field::CapabilityContainer)? as usize * 8
    };

    loop {
        let tag_offset = reader.offset();
        match reader.u8(Field::TlvTag)? {
            tlv::NULL => continue,
            tlv::NDEF_MESSAGE => break,
            tlv::TERMINATOR => {
                return Err(FormatError::new(tag_offset, FormatErrorKind::MissingNdefTlv));
            }
            tlv::NDEF_FILE_CONTROL => {
                let length = read_tlv_length(&mut reader, Field::TlvLength)?;
                if length != tlv::NDEF_FILE_CONTROL_LENGTH {
                    let kind = FormatErrorKind::BadTlvLength {
                        tag: tlv::NDEF_FILE_CONTROL,
                        length,
                        expected: tlv::NDEF_FILE_CONTROL_LENGTH,
                    };
                    return Err(FormatError::new(tag_offset, kind));
                }

                let _file_id = reader.be_u16(Field::TlvValue)?;
                max_ndef_size = reader.be_u16(Field::TlvValue)? as usize;
                let _read_access = reader.u8(Field::TlvValue)?;
                is_writable = reader.u8(Field::TlvValue)? != READ_ONLY_ACCESS;
            }
            tag => {
                let length = read_tlv_length(&mut reader, Field::TlvLength)?;
                reader.take(Field::TlvValue, length)?;
                debug!("skipped tlv {tag:#04x} of {length} bytes at byte {tag_offset}");
            }
        }
    }

    let length_offset = reader.offset();
    let length = read_tlv_length(&mut reader, Field::MessageLength)?;
    let start_offset = reader.offset();

    if length > max_ndef_size {
        let kind = FormatErrorKind::ExceedsCapacity { length, capacity: max_ndef_size };
        return Err(FormatError::new(length_offset, kind));
    }

    debug!(
        "cc {} locates {length} byte message at {start_offset}, writable: {is_writable}",
        hex::encode(&header[..start_offset])
    );

    Ok(CcInfo {
        start_offset,
        length,
        is_writable,
        max_ndef_size,
        length_offset,
    })
}

/// Wrap a message in a read-only image: [`CC_FILE`], length, message, terminator
pub fn wrap(message: &[u8]) -> Result<Vec<u8>, CapabilityError> {
    check_fits(message, DEFAULT_CAPACITY)?;

    let mut image = Vec::with_capacity(CC_FILE.len() + 3 + message.len() + 1);
    image.extend_from_slice(CC_FILE);
    write_tlv_length(&mut image, message.len());
    image.extend_from_slice(message);
    image.push(tlv::TERMINATOR);

    Ok(image)
}

/// Write a message into a writable image, replacing whatever message it held
pub fn splice(image: &[u8], message: &[u8]) -> Result<Vec<u8>, NdefError> {
    let info = ccfile_decode(image)?;
    info.ensure_writable()?;
    check_fits(message, info.max_ndef_size)?;

    let header = &image[..info.length_offset];

    let mut spliced = Vec::with_capacity(header.len() + 3 + message.len() + 1);
    spliced.extend_from_slice(header);
    write_tlv_length(&mut spliced, message.len());
    spliced.extend_from_slice(message);
    spliced.push(tlv::TERMINATOR);

    Ok(spliced)
}

impl CcInfo {
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn end_offset(&self) -> usize {
        self.start_offset + self.length
    }

    /// The message bytes within a full tag image
    pub fn body<'a>(&self, image: &'a [u8]) -> Result<&'a [u8]> {
        let remaining = image.len().saturating_sub(self.start_offset);
        if remaining < self.length {
            let kind = FormatErrorKind::LengthOverrun {
                field: Field::Message,
                claimed: self.length,
                remaining,
            };
            return Err(FormatError::new(self.start_offset, kind));
        }

        Ok(&image[self.start_offset..self.end_offset()])
    }

    pub fn ensure_writable(&self) -> Result<(), CapabilityError> {
        if !self.is_writable {
            return Err(CapabilityError::ReadOnly);
        }

        Ok(())
    }
}

impl CcHeader {
    pub const fn read_only(capacity: usize) -> Self {
        Self { writable: false, capacity }
    }

    pub const fn writable(capacity: usize) -> Self {
        Self { writable: true, capacity }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let access = if self.writable { MAPPING_VERSION } else { MAPPING_VERSION | WRITE_ACCESS_MASK };
        let blocks = u16::try_from(self.capacity / 8).unwrap_or(u16::MAX);
        let [blocks_hi, blocks_lo] = blocks.to_be_bytes();

        vec![
            MAGIC_8_BYTE,
            access,
            0x00,
            FEATURE_READ_MULTIPLE,
            0x00,
            0x00,
            blocks_hi,
            blocks_lo,
            tlv::NDEF_MESSAGE,
        ]
    }

    /// Header followed by an empty message and the terminator
    pub fn empty_image(&self) -> Vec<u8> {
        let mut image = self.to_bytes();
        image.extend_from_slice(&[0x00, tlv::TERMINATOR]);
        image
    }
}

fn check_fits(message: &[u8], capacity: usize) -> Result<(), CapabilityError> {
    let capacity = capacity.min(u16::MAX as usize);
    if message.len() > capacity {
        return Err(CapabilityError::TooLarge { length: message.len(), capacity });
    }

    Ok(())
}

fn read_tlv_length(reader: &mut Reader<'_>, field: Field) -> Result<usize> {
    match reader.u8(field)? {
        tlv::LONG_LENGTH => Ok(reader.be_u16(field)? as usize),
        length => Ok(length as usize),
    }
}

// callers keep length within u16
fn write_tlv_length(out: &mut Vec<u8>, length: usize) {
    match u8::try_from(length) {
        Ok(short) if short != tlv::LONG_LENGTH => out.push(short),
        _ => {
            out.push(tlv::LONG_LENGTH);
            out.extend_from_slice(&(length as u16).to_be_bytes());
        }
    }
}
