//! Control tokens carried in edge output labels.
//!
//! Every output label is a single whitespace-free token. Labels that start
//! with `__` are instructions for the path interpreter rather than output
//! words.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{GraphError, Result};

pub const LABEL: &str = "__label__";
pub const BEGIN: &str = "__begin__";
pub const END: &str = "__end__";
pub const CONVERT: &str = "__convert__";
pub const CONVERTED: &str = "__converted__";
pub const SOURCE: &str = "__source__";
pub const UNPACK: &str = "__unpack__";

/// Decoded form of an output label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control<'a> {
    /// Start of an intent branch.
    Label(&'a str),
    /// Entity span opens.
    Begin(&'a str),
    /// Entity span closes.
    End(&'a str),
    /// Converter frame opens; `name[,arg...]`.
    Convert(&'a str),
    /// Converter frame closes.
    Converted(&'a str),
    /// Slot provenance for the open entity.
    Source(&'a str),
}

impl<'a> Control<'a> {
    pub fn parse(olabel: &'a str) -> Option<Self> {
        // CONVERTED shares a prefix with CONVERT, test it first
        if let Some(rest) = olabel.strip_prefix(CONVERTED) {
            return Some(Control::Converted(rest));
        }
        if let Some(rest) = olabel.strip_prefix(CONVERT) {
            return Some(Control::Convert(rest));
        }
        if let Some(rest) = olabel.strip_prefix(LABEL) {
            return Some(Control::Label(rest));
        }
        if let Some(rest) = olabel.strip_prefix(BEGIN) {
            return Some(Control::Begin(rest));
        }
        if let Some(rest) = olabel.strip_prefix(END) {
            return Some(Control::End(rest));
        }
        olabel.strip_prefix(SOURCE).map(Control::Source)
    }
}

/// True for any `__`-prefixed label, known or not.
pub fn is_control(olabel: &str) -> bool {
    olabel.starts_with("__")
}

/// Intent name if `olabel` starts an intent branch.
pub fn intent_name(olabel: &str) -> Option<&str> {
    olabel.strip_prefix(LABEL)
}

/// Packs labels that contain whitespace as `__unpack__<base64>`.
pub fn pack(olabel: &str) -> String {
    if olabel.chars().any(char::is_whitespace) {
        format!("{UNPACK}{}", STANDARD.encode(olabel.as_bytes()))
    } else {
        olabel.to_string()
    }
}

/// Reverses [`pack`]. Labels without the prefix are returned unchanged.
pub fn unpack(olabel: &str) -> Result<String> {
    match olabel.strip_prefix(UNPACK) {
        Some(payload) => {
            let bytes = STANDARD
                .decode(payload.trim())
                .map_err(|e| GraphError::InvalidLabel(format!("{olabel}: {e}")))?;
            String::from_utf8(bytes).map_err(|e| GraphError::InvalidLabel(format!("{olabel}: {e}")))
        }
        None => Ok(olabel.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_only_when_whitespace() {
        assert_eq!(pack("kitchen"), "kitchen");
        let packed = pack("living room");
        assert!(packed.starts_with(UNPACK));
        assert!(!packed.contains(char::is_whitespace));
        assert_eq!(unpack(&packed).unwrap(), "living room");
        assert_eq!(unpack("plain").unwrap(), "plain");
    }

    #[test]
    fn bad_payload_is_invalid_label() {
        assert!(matches!(
            unpack("__unpack__!!!"),
            Err(GraphError::InvalidLabel(_))
        ));
    }

    #[test]
    fn control_parsing() {
        assert_eq!(Control::parse("__label__Greet"), Some(Control::Label("Greet")));
        assert_eq!(Control::parse("__convert__kind,x"), Some(Control::Convert("kind,x")));
        assert_eq!(Control::parse("__converted__int"), Some(Control::Converted("int")));
        assert_eq!(Control::parse("__source__color"), Some(Control::Source("color")));
        assert_eq!(Control::parse("__begin__a"), Some(Control::Begin("a")));
        assert_eq!(Control::parse("__end__a"), Some(Control::End("a")));
        assert_eq!(Control::parse("hello"), None);
        assert!(is_control("__whatever"));
        assert!(!is_control("word"));
    }
}
