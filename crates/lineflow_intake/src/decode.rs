//! Byte-to-text decoding for batch files.
//!
//! Files come from spreadsheet exports on operator machines and are either
//! UTF-8 or a legacy 8-bit code page. Latin-1 maps every byte to the code
//! point of the same value, so it never fails.

use serde::{Deserialize, Serialize};

/// Number of leading characters inspected for replacement characters.
const PROBE_CHARS: usize = 2000;

/// More replacement characters than this in the probe means the file is
/// not UTF-8.
const MAX_REPLACEMENTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
}

/// Decode `bytes` as UTF-8, falling back to Latin-1 when the UTF-8 decode
/// is dense with replacement characters. A leading BOM is removed.
pub fn decode_text(bytes: &[u8]) -> DecodedText {
    let utf8 = String::from_utf8_lossy(bytes);
    let replacements = utf8
        .chars()
        .take(PROBE_CHARS)
        .filter(|&c| c == char::REPLACEMENT_CHARACTER)
        .count();

    let (text, encoding) = if replacements > MAX_REPLACEMENTS {
        tracing::debug!(replacements, "UTF-8 decode looks wrong, using Latin-1");
        (bytes.iter().map(|&b| b as char).collect::<String>(), TextEncoding::Latin1)
    } else {
        (utf8.into_owned(), TextEncoding::Utf8)
    };

    DecodedText {
        text: strip_bom(text),
        encoding,
    }
}

fn strip_bom(text: String) -> String {
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passes_through() {
        let decoded = decode_text("SERIE,FECHA\nABC123456,01-dic-24\n".as_bytes());
        assert_eq!(decoded.encoding, TextEncoding::Utf8);
        assert!(decoded.text.starts_with("SERIE"));
    }

    #[test]
    fn test_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"SN\nABC123456");
        assert_eq!(decode_text(&bytes).text, "SN\nABC123456");
    }

    #[test]
    fn test_latin1_fallback() {
        // "Recepción" repeated, encoded as Latin-1 (0xF3 = ó).
        let mut bytes = Vec::new();
        for _ in 0..10 {
            bytes.extend_from_slice(b"Recepci\xF3n,");
        }
        let decoded = decode_text(&bytes);
        assert_eq!(decoded.encoding, TextEncoding::Latin1);
        assert!(decoded.text.starts_with("Recepción"));
    }

    #[test]
    fn test_few_bad_bytes_stay_utf8() {
        let decoded = decode_text(b"ABC123456\xFF\nDEF654321");
        assert_eq!(decoded.encoding, TextEncoding::Utf8);
    }
}
