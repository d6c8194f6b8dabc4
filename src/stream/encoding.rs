//! Character encodings and newline modes
//!
//! The encoding of a stream decides how bytes map to character codes. The
//! set is closed: single-byte encodings, UTF-8, the two UTF-16 byte orders,
//! native 32-bit units and the locale-dependent `text` encoding.

use hashbrown::HashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Encoded bytes of a single character.
pub type EncodedChar = SmallVec<[u8; 8]>;

/// Encoding of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "octet")]
    Octet,
    #[serde(rename = "ascii")]
    Ascii,
    #[serde(rename = "iso_latin_1")]
    IsoLatin1,
    /// Locale-dependent multibyte text.
    #[serde(rename = "text")]
    Ansi,
    #[serde(rename = "utf8")]
    Utf8,
    #[serde(rename = "unicode_be")]
    UnicodeBe,
    #[serde(rename = "unicode_le")]
    UnicodeLe,
    /// Native-endian 32-bit code units.
    #[serde(rename = "wchar_t")]
    Wchar,
}

static ENCODING_NAMES: Lazy<HashMap<&'static str, Encoding>> = Lazy::new(|| {
    let mut names = HashMap::new();
    for enc in Encoding::ALL {
        names.insert(enc.name(), enc);
    }
    names.insert("utf-8", Encoding::Utf8);
    names.insert("utf16be", Encoding::UnicodeBe);
    names.insert("utf16le", Encoding::UnicodeLe);
    names
});

/// What `text` means in the current locale.
static LOCALE_ENCODING: Lazy<Encoding> = Lazy::new(|| {
    let utf8 = ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty())
        .map(|v| {
            let v = v.to_ascii_lowercase();
            v.contains("utf-8") || v.contains("utf8")
        })
        .unwrap_or(false);
    if utf8 {
        Encoding::Utf8
    } else {
        Encoding::IsoLatin1
    }
});

impl Encoding {
    pub const ALL: [Encoding; 8] = [
        Encoding::Octet,
        Encoding::Ascii,
        Encoding::IsoLatin1,
        Encoding::Ansi,
        Encoding::Utf8,
        Encoding::UnicodeBe,
        Encoding::UnicodeLe,
        Encoding::Wchar,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        ENCODING_NAMES.get(name).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Encoding::Octet => "octet",
            Encoding::Ascii => "ascii",
            Encoding::IsoLatin1 => "iso_latin_1",
            Encoding::Ansi => "text",
            Encoding::Utf8 => "utf8",
            Encoding::UnicodeBe => "unicode_be",
            Encoding::UnicodeLe => "unicode_le",
            Encoding::Wchar => "wchar_t",
        }
    }

    /// The concrete encoding used for I/O. Only `text` differs from `self`.
    pub fn resolved(self) -> Self {
        match self {
            Encoding::Ansi => *LOCALE_ENCODING,
            other => other,
        }
    }

    pub fn is_unicode(self) -> bool {
        matches!(
            self,
            Encoding::Utf8 | Encoding::UnicodeBe | Encoding::UnicodeLe | Encoding::Wchar
        )
    }

    /// Byte order mark written for this encoding, if it has one.
    pub fn bom(self) -> Option<&'static [u8]> {
        match self {
            Encoding::Utf8 => Some(&[0xEF, 0xBB, 0xBF]),
            Encoding::UnicodeBe => Some(&[0xFE, 0xFF]),
            Encoding::UnicodeLe => Some(&[0xFF, 0xFE]),
            _ => None,
        }
    }

    /// Largest code this encoding can represent.
    pub fn max_code(self) -> u32 {
        match self.resolved() {
            Encoding::Ascii => 0x7F,
            Encoding::Octet | Encoding::IsoLatin1 => 0xFF,
            Encoding::Wchar => u32::MAX,
            _ => 0x10FFFF,
        }
    }

    /// Append the encoding of `code` to `out`. Returns `false` and leaves
    /// `out` untouched if the code cannot be represented.
    pub fn encode(
        self,
        code: u32,
        out: &mut EncodedChar,
    ) -> bool {
        match self.resolved() {
            Encoding::Octet | Encoding::IsoLatin1 | Encoding::Ascii => {
                if code > self.max_code() {
                    return false;
                }
                out.push(code as u8);
            }
            Encoding::Utf8 => match char::from_u32(code) {
                Some(c) => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
                None => return false,
            },
            enc @ (Encoding::UnicodeBe | Encoding::UnicodeLe) => {
                let c = match char::from_u32(code) {
                    Some(c) => c,
                    None => return false,
                };
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units).iter() {
                    if enc == Encoding::UnicodeBe {
                        out.extend_from_slice(&unit.to_be_bytes());
                    } else {
                        out.extend_from_slice(&unit.to_le_bytes());
                    }
                }
            }
            Encoding::Wchar => out.extend_from_slice(&code.to_ne_bytes()),
            Encoding::Ansi => return false,
        }
        true
    }
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Utf8
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Detect a byte order mark at the start of `bytes`.
///
/// Returns the encoding it announces and its length in bytes.
pub fn detect_bom(bytes: &[u8]) -> Option<(Encoding, usize)> {
    [Encoding::Utf8, Encoding::UnicodeBe, Encoding::UnicodeLe]
        .into_iter()
        .find_map(|enc| {
            let bom = enc.bom()?;
            bytes.starts_with(bom).then_some((enc, bom.len()))
        })
}

/// Newline handling of a text stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Newline {
    /// `\n` only.
    #[default]
    Posix,
    /// `\r\n` on output; `\r` dropped on input.
    Dos,
    /// Input only: behave as `Posix` until the first `\r`, then as `Dos`.
    Detect,
}

impl Newline {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "posix" => Some(Newline::Posix),
            "dos" => Some(Newline::Dos),
            "detect" => Some(Newline::Detect),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Newline::Posix => "posix",
            Newline::Dos => "dos",
            Newline::Detect => "detect",
        }
    }

    /// Decide whether a `\r` read from a text stream is dropped. The first
    /// `\r` latches `Detect` into `Dos`.
    pub fn skip_cr(
        &mut self,
        text: bool,
    ) -> bool {
        if !text {
            return false;
        }
        match self {
            Newline::Posix => false,
            Newline::Dos => true,
            Newline::Detect => {
                *self = Newline::Dos;
                true
            }
        }
    }
}
