//! Data directory layout
//!
//! ```text
//! affinity_data/
//! └── local/           # SQLite database (affinity.sqlite)
//! ```

use std::path::PathBuf;
use tracing::info;

/// Get the AFFINITY_ROOT directory from environment or default
pub fn affinity_root() -> PathBuf {
    match std::env::var("AFFINITY_ROOT") {
        Ok(val) if !val.is_empty() => PathBuf::from(val),
        _ => {
            info!("AFFINITY_ROOT not set, using ./affinity_data");
            PathBuf::from("affinity_data")
        }
    }
}

/// Local data directory (SQLite)
pub fn local_dir() -> PathBuf {
    affinity_root().join("local")
}
