//! Local state: restore job records and run reports.
//!
//! Everything lives under one state directory (a temp directory by
//! default). Records are plain JSON so they can be inspected by hand.

mod manager;

pub use manager::{JobStore, write_atomic};

use std::path::PathBuf;

/// Default state directory: `$TMPDIR/stackpilot`
pub fn default_state_dir() -> PathBuf {
    std::env::temp_dir().join("stackpilot")
}
