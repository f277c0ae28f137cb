//! Asynchronous note reads on the Tokio runtime.

use std::path::Path;

use tokio::fs as tokio_fs;
use tokio::io::AsyncReadExt;

use crate::detect::decode_buffer;
use crate::error::IoError;
use crate::sync::not_found_or_system;

/// Read a note with size and binary checks without blocking the runtime.
///
/// # Errors
/// Same classification as [`crate::read_text_safe`].
pub async fn read_text_safe_async<P: AsRef<Path>>(
    path: P,
    max_bytes: u64,
) -> Result<String, IoError> {
    let path = path.as_ref();

    let metadata = tokio_fs::metadata(path)
        .await
        .map_err(|err| not_found_or_system(path, err))?;
    if metadata.len() > max_bytes {
        return Err(IoError::TooLarge(metadata.len(), max_bytes));
    }

    let mut file = tokio_fs::File::open(path)
        .await
        .map_err(|err| not_found_or_system(path, err))?;
    let mut buffer = Vec::with_capacity(usize::try_from(metadata.len()).unwrap_or_default());
    file.read_to_end(&mut buffer).await?;

    decode_buffer(buffer)
}
