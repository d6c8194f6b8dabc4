//! Stream position bookkeeping

use serde::{Deserialize, Serialize};

/// Byte, character, line and line-position counters of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub byte_no: u64,
    pub char_no: u64,
    /// Lines are numbered from 1.
    pub line_no: u64,
    pub line_pos: u64,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            byte_no: 0,
            char_no: 0,
            line_no: 1,
            line_pos: 0,
        }
    }
}

impl Position {
    /// Account for one character read or written. Byte counts are
    /// maintained separately by the caller.
    pub fn update_char(
        &mut self,
        code: u32,
    ) {
        match code {
            0x0A => {
                self.line_no += 1;
                self.line_pos = 0;
            }
            0x0D => self.line_pos = 0,
            0x08 => {
                if self.line_pos > 0 {
                    self.line_pos -= 1;
                }
            }
            0x09 => self.line_pos = (self.line_pos | 7) + 1,
            _ => self.line_pos += 1,
        }
        self.char_no += 1;
    }
}
