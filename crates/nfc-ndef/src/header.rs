use bitflags::bitflags;

use crate::ndef_type::NdefType;

bitflags! {
    /// Flag bits of the first header byte, above the 3-bit type name format
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HeaderFlags: u8 {
        const MESSAGE_BEGIN = 0x80;
        const MESSAGE_END = 0x40;
        const CHUNKED = 0x20;
        const SHORT_RECORD = 0x10;
        const ID_LENGTH = 0x08;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefHeader {
    pub message_begin: bool,
    pub message_end: bool,
    pub chunked: bool,
    pub short_record: bool,
    pub has_id_length: bool,
    pub type_name_format: NdefType,
    pub type_length: u8,
    pub payload_length: u32,
    pub id_length: Option<u8>,
}

impl NdefHeader {
    pub fn flags(&self) -> HeaderFlags {
        let mut flags = HeaderFlags::empty();
        flags.set(HeaderFlags::MESSAGE_BEGIN, self.message_begin);
        flags.set(HeaderFlags::MESSAGE_END, self.message_end);
        flags.set(HeaderFlags::CHUNKED, self.chunked);
        flags.set(HeaderFlags::SHORT_RECORD, self.short_record);
        flags.set(HeaderFlags::ID_LENGTH, self.has_id_length);
        flags
    }

    pub fn to_byte(&self) -> u8 {
        self.flags().bits() | self.type_name_format.bits()
    }

    /// Number of bytes the header occupies on the wire, before the type field
    pub fn encoded_len(&self) -> usize {
        let payload_length_len = if self.short_record { 1 } else { 4 };
        2 + payload_length_len + usize::from(self.has_id_length)
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.to_byte());
        out.push(self.type_length);

        match u8::try_from(self.payload_length) {
            Ok(length) if self.short_record => out.push(length),
            _ => out.extend_from_slice(&self.payload_length.to_be_bytes()),
        }

        if let Some(id_length) = self.id_length {
            out.push(id_length);
        }
    }
}
