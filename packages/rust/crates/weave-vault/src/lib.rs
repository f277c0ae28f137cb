//! weave-vault - Watch session and persistence around the graph engine.
//!
//! Owns the single piece of shared mutable state ([`GraphStore`]), drives the
//! filesystem watch loop ([`WatchSession`]), writes user-originated deltas
//! back to the vault ([`apply_delta_to_disk`]) and persists user settings.
//!
//! ```text
//! weave-io watcher ──► mpsc ──► WatchSession consumer
//!                                   │ read (retry) → parse → diff
//!                                   ▼
//!                              GraphStore ──► sinks (view, printers)
//!                                   │
//!                                   └──► weave-events bus (graph/delta)
//! ```

pub mod disk;
pub mod error;
pub mod session;
pub mod settings;
pub mod sink;
pub mod store;

pub use disk::{DiskApplyReport, apply_delta_to_disk, note_path};
pub use error::VaultError;
pub use session::{StopResponse, WatchResponse, WatchSession, WatchStatus};
pub use settings::{
    EngineSettings, VaultSettings, load_settings, load_settings_from_path, resolve_config_home,
    save_settings, save_settings_to_path, set_config_home_override, settings_path,
};
pub use sink::{DeltaOrigin, DeltaSink, ViewSink};
pub use store::GraphStore;
