//! Synchronous note reads (disk projector compare and post-failure resync).

use std::fs as std_fs;
use std::io::{ErrorKind, Read};
use std::path::Path;

use crate::detect::decode_buffer;
use crate::error::IoError;

pub(crate) fn not_found_or_system(path: &Path, err: std::io::Error) -> IoError {
    if err.kind() == ErrorKind::NotFound {
        IoError::NotFound(path.to_string_lossy().to_string())
    } else {
        IoError::System(err)
    }
}

/// Read a note with size and binary checks.
///
/// # Errors
/// `NotFound` when the file is missing, `TooLarge` above `max_bytes`,
/// `BinaryFile` for binary content, `System` for other I/O failures
/// (a file locked by another process lands here).
pub fn read_text_safe<P: AsRef<Path>>(path: P, max_bytes: u64) -> Result<String, IoError> {
    let path = path.as_ref();

    let metadata = std_fs::metadata(path).map_err(|err| not_found_or_system(path, err))?;
    if metadata.len() > max_bytes {
        return Err(IoError::TooLarge(metadata.len(), max_bytes));
    }

    let mut file = std_fs::File::open(path).map_err(|err| not_found_or_system(path, err))?;
    let mut buffer = Vec::with_capacity(usize::try_from(metadata.len()).unwrap_or_default());
    file.read_to_end(&mut buffer)?;

    decode_buffer(buffer)
}
