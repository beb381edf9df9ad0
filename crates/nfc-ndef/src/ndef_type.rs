use strum::FromRepr;

/// Type Name Format, the low 3 bits of a record header
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromRepr)]
#[repr(u8)]
pub enum NdefType {
    Empty = 0,
    WellKnown = 1,
    Mime = 2,
    AbsoluteUri = 3,
    External = 4,
    Unknown = 5,
    Unchanged = 6,
    Reserved = 7,
}

impl NdefType {
    pub const MASK: u8 = 0x07;

    /// Every 3-bit value maps to a variant, higher bits are ignored
    pub fn from_bits(bits: u8) -> Self {
        Self::from_repr(bits & Self::MASK).unwrap_or(Self::Reserved)
    }

    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// The URN a record of this format and type is reported under
    pub fn urn(self, type_: &[u8]) -> String {
        let name = String::from_utf8_lossy(type_);
        match self {
            Self::WellKnown => format!("urn:nfc:wkt:{name}"),
            Self::External => format!("urn:nfc:ext:{name}"),
            Self::Mime | Self::AbsoluteUri => name.into_owned(),
            Self::Empty => String::new(),
            Self::Unchanged => "unchanged".to_string(),
            Self::Unknown | Self::Reserved => "unknown".to_string(),
        }
    }
}
