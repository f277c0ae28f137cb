//! weave-io - Safe note reads and filesystem watching for weave vaults
//!
//! # Features
//!
//! - **Safe reads**: size ceiling, binary detection, lossy UTF-8 fallback
//! - **Retry**: bounded exponential backoff for files that are briefly
//!   unreadable while an editor saves them
//! - **Watcher**: `notify`-backed watcher that settles bursts of writes into
//!   one event per path before delivering it on a bounded channel
//!
//! # Architecture
//!
//! ```text
//! weave-io/src/
//! ├── lib.rs      # Re-exports (this file)
//! ├── error.rs    # IoError enum
//! ├── detect.rs   # Binary detection & decoding
//! ├── sync.rs     # Synchronous read
//! ├── async_io.rs # Asynchronous read (Tokio)
//! ├── retry.rs    # RetryPolicy + retried async read
//! └── watcher.rs  # Settled file watcher
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use weave_io::{RetryPolicy, read_text_with_retry};
//!
//! let text = read_text_with_retry("vault/note.md", 4 * 1024 * 1024, &RetryPolicy::default()).await?;
//! ```

mod async_io;
mod detect;
mod error;
mod retry;
mod sync;
mod watcher;

pub use async_io::read_text_safe_async;
pub use error::IoError;
pub use retry::{RetryPolicy, read_text_with_retry};
pub use sync::read_text_safe;
pub use watcher::{
    FileEvent, FileWatcherHandle, PatternFilter, WatcherConfig, start_file_watcher,
};

pub use detect::{decode_buffer, is_binary};
