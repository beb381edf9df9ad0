//! NFC tag images: NDEF messages behind a Capability Container
//!
//! The codec lives in [`nfc_ndef`] and is re-exported here, [`tag`] joins the two halves

pub use nfc_ndef::*;

pub mod logging;
pub mod tag;
