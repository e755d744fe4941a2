//! Nested-archive sniffing and repair.
//!
//! # Padded archives
//!
//! The instrument software writes nested zip archives whose end-of-central-
//! directory record is followed by a run of null bytes.  Strict zip readers
//! look for the EOCD record at a fixed distance from the end of the buffer
//! and reject those archives.  Archives written this way start with a
//! recognisable 9-byte local header prefix (zip64 version, no flags,
//! deflate); for those the buffer is cut 22 bytes after the last EOCD
//! signature, which is exactly the size of an EOCD record without comment.
//!
//! # Sniffing
//!
//! [`sniff`] decides up front whether a blob is worth handing to the zip
//! reader at all, so opaque entries (XML, raw streams) never go through a
//! failed archive open.

/// Local file header prefix of the padded archives the instrument writes.
pub const PADDED_ZIP_MAGIC: [u8; 9] = [0x50, 0x4B, 0x03, 0x04, 0x2D, 0x00, 0x00, 0x00, 0x08];
/// End-of-central-directory signature plus the two zero disk numbers.
pub const EOCD_MAGIC: [u8; 8] = [0x50, 0x4B, 0x05, 0x06, 0x00, 0x00, 0x00, 0x00];
/// Fixed size of an EOCD record with an empty comment.
pub const EOCD_LEN: usize = 22;

const LOCAL_HEADER_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// What a blob looks like before any structured decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerSignature {
    /// Instrument-written archive that may carry trailing padding.
    PaddedZip,
    /// Any other zip local header.
    Zip,
}

/// Classify `bytes` by signature.  `None` means "not a container".
pub fn sniff(bytes: &[u8]) -> Option<ContainerSignature> {
    if bytes.starts_with(&PADDED_ZIP_MAGIC) {
        Some(ContainerSignature::PaddedZip)
    } else if bytes.starts_with(&LOCAL_HEADER_MAGIC) {
        Some(ContainerSignature::Zip)
    } else {
        None
    }
}

/// Offset of the last occurrence of `needle` in `haystack`.
pub fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Cut a padded archive back to its last EOCD record.
///
/// Returns `None` when no EOCD signature exists or the record itself is
/// truncated; the caller reports the entry as malformed.
pub fn trim_padding(bytes: &[u8]) -> Option<&[u8]> {
    let eocd = rfind(bytes, &EOCD_MAGIC)?;
    let end = eocd + EOCD_LEN;
    if end > bytes.len() {
        return None;
    }
    Some(&bytes[..end])
}

/// Produce the buffer to open as a nested archive, repairing padding when the
/// signature calls for it.
pub fn prepare(bytes: &[u8], signature: ContainerSignature) -> Option<&[u8]> {
    match signature {
        ContainerSignature::PaddedZip => trim_padding(bytes),
        ContainerSignature::Zip       => Some(bytes),
    }
}
