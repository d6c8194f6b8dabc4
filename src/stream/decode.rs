//! Decoding of already-buffered input
//!
//! [`decode_buffered`] turns a run of buffered bytes into character codes
//! without reading from the device. An incomplete multibyte sequence at the
//! end of the run is left for the next call; an illegal sequence aborts the
//! whole call without side effects.

use super::encoding::{Encoding, Newline};
use super::position::Position;

/// Codes decoded from a buffer and the number of bytes they used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    pub codes: Vec<u32>,
    pub consumed: usize,
}

/// An illegal byte sequence at `offset` bytes into the decoded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalSequence {
    pub offset: usize,
}

/// Number of continuation bytes announced by a UTF-8 lead byte, or `None`
/// if `lead` cannot start a sequence.
#[inline]
pub(crate) fn utf8_extra(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(0),
        0xC2..=0xDF => Some(1),
        0xE0..=0xEF => Some(2),
        0xF0..=0xF4 => Some(3),
        _ => None,
    }
}

#[inline]
pub(crate) fn utf8_lead_bits(
    lead: u8,
    extra: usize,
) -> u32 {
    match extra {
        0 => lead as u32,
        1 => (lead & 0x1F) as u32,
        2 => (lead & 0x0F) as u32,
        _ => (lead & 0x07) as u32,
    }
}

/// Decode the complete characters in `bytes`.
///
/// `newline` is updated when a `\r` latches detection into DOS mode and
/// `position`, when given, is advanced for every character kept. Neither is
/// touched if the run contains an illegal sequence.
pub fn decode_buffered(
    bytes: &[u8],
    encoding: Encoding,
    text: bool,
    newline: &mut Newline,
    position: Option<&mut Position>,
) -> Result<Decoded, IllegalSequence> {
    let (raw, consumed) = scan(bytes, encoding.resolved())?;

    let mut nl = *newline;
    let mut codes = Vec::with_capacity(raw.len());
    for code in raw {
        if code == 0x0D && nl.skip_cr(text) {
            continue;
        }
        codes.push(code);
    }
    *newline = nl;

    if let Some(pos) = position {
        for &code in &codes {
            pos.update_char(code);
        }
        pos.byte_no += consumed as u64;
    }

    Ok(Decoded { codes, consumed })
}

fn scan(
    bytes: &[u8],
    encoding: Encoding,
) -> Result<(Vec<u32>, usize), IllegalSequence> {
    let mut codes = Vec::with_capacity(bytes.len());
    let mut at = 0;

    match encoding {
        Encoding::Utf8 => {
            while at < bytes.len() {
                let lead = bytes[at];
                let extra = utf8_extra(lead).ok_or(IllegalSequence { offset: at })?;
                if at + extra >= bytes.len() && extra > 0 {
                    // Trailing continuation bytes may still be illegal.
                    if bytes[at + 1..].iter().any(|b| b & 0xC0 != 0x80) {
                        return Err(IllegalSequence { offset: at });
                    }
                    break;
                }
                let mut code = utf8_lead_bits(lead, extra);
                for i in 1..=extra {
                    let b = bytes[at + i];
                    if b & 0xC0 != 0x80 {
                        return Err(IllegalSequence { offset: at });
                    }
                    code = (code << 6) | (b & 0x3F) as u32;
                }
                codes.push(code);
                at += extra + 1;
            }
        }
        Encoding::UnicodeBe | Encoding::UnicodeLe => {
            let unit = |i: usize| {
                let pair = [bytes[i], bytes[i + 1]];
                if encoding == Encoding::UnicodeBe {
                    u16::from_be_bytes(pair) as u32
                } else {
                    u16::from_le_bytes(pair) as u32
                }
            };
            while at + 2 <= bytes.len() {
                let hi = unit(at);
                if (0xD800..0xDC00).contains(&hi) {
                    if at + 4 > bytes.len() {
                        break;
                    }
                    let lo = unit(at + 2);
                    if !(0xDC00..0xE000).contains(&lo) {
                        return Err(IllegalSequence { offset: at });
                    }
                    codes.push(0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00));
                    at += 4;
                } else {
                    codes.push(hi);
                    at += 2;
                }
            }
        }
        Encoding::Wchar => {
            while at + 4 <= bytes.len() {
                let unit = [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]];
                codes.push(u32::from_ne_bytes(unit));
                at += 4;
            }
        }
        Encoding::Octet | Encoding::Ascii | Encoding::IsoLatin1 | Encoding::Ansi => {
            codes.extend(bytes.iter().map(|&b| b as u32));
            at = bytes.len();
        }
    }

    Ok((codes, at))
}
