//! Binary detection and decoding of note bytes.

use memchr::memchr;

use crate::error::IoError;

const SNIFF_LEN: usize = 8192;
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// NULL byte within the first 8 KiB marks a file as binary.
#[must_use]
pub fn is_binary(buffer: &[u8]) -> bool {
    let check_len = buffer.len().min(SNIFF_LEN);
    memchr(0, &buffer[..check_len]).is_some()
}

/// Decode note bytes into text.
///
/// A leading UTF-8 byte-order mark is dropped so frontmatter detection sees
/// `---` at offset zero. Invalid UTF-8 is replaced with U+FFFD.
///
/// # Errors
/// Returns `IoError::BinaryFile` when binary content is detected.
pub fn decode_buffer(mut buffer: Vec<u8>) -> Result<String, IoError> {
    if is_binary(&buffer) {
        return Err(IoError::BinaryFile);
    }
    if buffer.starts_with(UTF8_BOM) {
        buffer.drain(..UTF8_BOM.len());
    }
    match String::from_utf8(buffer) {
        Ok(text) => Ok(text),
        Err(err) => Ok(String::from_utf8_lossy(&err.into_bytes()).into_owned()),
    }
}
