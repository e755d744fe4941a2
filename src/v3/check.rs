//! Format gate for v3 result files.
//!
//! A file is accepted only if all three hold:
//!
//! | Check | Location |
//! |-------|----------|
//! | magic | 16 bytes at offset 0 equal [`RES_MAGIC`] |
//! | version | `UNICORN 3.10` first found in `[16, 36)` at offset 24 |
//! | size | little-endian i32 at offset 16 equals the file size on disk |
//!
//! A failing file is an expected outcome, not an error: [`FormatCheck`]
//! records every verdict and the caller decides whether to go on.

use std::fmt;
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;

use super::magic::{RES_MAGIC, RES_VERSION};

pub const SIZE_OFFSET: usize = 16;
pub const VERSION_WINDOW_START: usize = 16;
pub const VERSION_WINDOW_END: usize = 36;
pub const VERSION_OFFSET: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatCheck {
    pub magic_ok:      bool,
    pub version_ok:    bool,
    /// Size field at offset 16; `None` if the buffer is too short to hold it.
    pub declared_size: Option<i32>,
    pub actual_size:   u64,
}

/// First offset of `needle` inside `haystack[start..end]`, as an absolute offset.
pub(crate) fn find_in(haystack: &[u8], needle: &[u8], start: usize, end: usize) -> Option<usize> {
    let end = end.min(haystack.len());
    if start >= end || needle.len() > end - start {
        return None;
    }
    haystack[start..end]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + start)
}

impl FormatCheck {
    pub fn run(raw: &[u8], file_size: u64) -> Self {
        let magic_ok = find_in(raw, &RES_MAGIC, 0, RES_MAGIC.len()) == Some(0);
        let version_ok = find_in(raw, RES_VERSION, VERSION_WINDOW_START, VERSION_WINDOW_END)
            == Some(VERSION_OFFSET);
        let declared_size = raw
            .get(SIZE_OFFSET..SIZE_OFFSET + 4)
            .and_then(|b| Cursor::new(b).read_i32::<LittleEndian>().ok());
        Self { magic_ok, version_ok, declared_size, actual_size: file_size }
    }

    pub fn size_ok(&self) -> bool {
        self.declared_size
            .map(|s| s >= 0 && s as u64 == self.actual_size)
            .unwrap_or(false)
    }

    pub fn is_supported(&self) -> bool {
        self.magic_ok && self.version_ok && self.size_ok()
    }
}

impl fmt::Display for FormatCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.magic_ok && self.version_ok {
            writeln!(f, " Input is a UNICORN 3.10 file")?;
        } else {
            writeln!(f, " Input is not a UNICORN 3.10 file")?;
        }
        match (self.size_ok(), self.declared_size) {
            (true, _) => writeln!(f, " File size check - OK")?,
            (false, Some(d)) => writeln!(
                f,
                " File size mismatch ({d} declared, {} on disk) - file corrupted?",
                self.actual_size
            )?,
            (false, None) => writeln!(f, " File too short to hold a size field")?,
        }
        if self.is_supported() {
            write!(f, " File supported")
        } else {
            write!(f, " File not supported")
        }
    }
}
