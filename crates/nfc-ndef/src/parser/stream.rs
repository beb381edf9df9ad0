use winnow::{
    Bytes, Parser, Partial,
    binary::{be_u8, be_u16, be_u32},
    error::{ContextError, ErrMode},
    token::take,
};

use crate::error::{Field, FormatError, FormatErrorKind};

pub type Stream<'i> = Partial<&'i Bytes>;
pub fn new(b: &[u8]) -> Stream<'_> {
    Partial::new(Bytes::new(b))
}

/// Cursor over a complete buffer
///
/// Every read is checked against the bytes left before the parser runs, so a short buffer
/// surfaces as a [`FormatError`] carrying the absolute offset of the field, never as
/// an incomplete parse or an out of range access
#[derive(Debug, Clone)]
pub struct Reader<'i> {
    input: Stream<'i>,
    len: usize,
    base: usize,
}

type Result<T, E = FormatError> = std::result::Result<T, E>;

impl<'i> Reader<'i> {
    pub fn new(bytes: &'i [u8]) -> Self {
        Self::at(bytes, 0)
    }

    /// Reader over a slice that starts `base` bytes into an enclosing buffer
    pub fn at(bytes: &'i [u8], base: usize) -> Self {
        Self {
            input: new(bytes),
            len: bytes.len(),
            base,
        }
    }

    pub fn offset(&self) -> usize {
        self.base + self.len - self.remaining()
    }

    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Run `parser` over the next `width` bytes
    pub fn parse<O, P>(&mut self, field: Field, width: usize, mut parser: P) -> Result<O>
    where
        P: Parser<Stream<'i>, O, ErrMode<ContextError>>,
    {
        let offset = self.offset();
        let remaining = self.remaining();

        if remaining < width {
            let kind = FormatErrorKind::Truncated { field, needed: width, remaining };
            return Err(FormatError::new(offset, kind));
        }

        parser
            .parse_next(&mut self.input)
            .map_err(|_| FormatError::new(offset, FormatErrorKind::Malformed(field)))
    }

    pub fn u8(&mut self, field: Field) -> Result<u8> {
        self.parse(field, 1, be_u8::<_, ErrMode<ContextError>>)
    }

    pub fn peek_u8(&self, field: Field) -> Result<u8> {
        self.clone().u8(field)
    }

    pub fn be_u16(&mut self, field: Field) -> Result<u16> {
        self.parse(field, 2, be_u16::<_, ErrMode<ContextError>>)
    }

    pub fn be_u32(&mut self, field: Field) -> Result<u32> {
        self.parse(field, 4, be_u32::<_, ErrMode<ContextError>>)
    }

    /// Take `length` bytes declared by a length field
    pub fn take(&mut self, field: Field, length: usize) -> Result<&'i [u8]> {
        let remaining = self.remaining();
        if remaining < length {
            let kind = FormatErrorKind::LengthOverrun { field, claimed: length, remaining };
            return Err(FormatError::new(self.offset(), kind));
        }

        self.parse(field, length, take::<_, _, ErrMode<ContextError>>(length))
    }

    /// Everything left, leaves the reader empty
    pub fn rest(&mut self, field: Field) -> Result<&'i [u8]> {
        let remaining = self.remaining();
        self.take(field, remaining)
    }
}
