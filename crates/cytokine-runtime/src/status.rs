//! Aggregate status reporting and snapshot persistence.
//!
//! The snapshot is a plain mapping with two top-level keys: `"core"`
//! (coordinator state) and `"cells"` (per-cell snapshots keyed by name).
//! `save_status` writes it as indented JSON to a caller-chosen path.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;

use serde::Serialize;
use tracing::{error, info};

use cytokine_core::cell::Cell;
use cytokine_core::types::CellSnapshot;

use crate::coordinator::{AlertRecord, Coordinator};

/// Full system snapshot: the coordinator section plus one entry per
/// registered cell.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub core: CoreStatus,
    pub cells: BTreeMap<String, CellSnapshot>,
}

/// Coordinator-level portion of the status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct CoreStatus {
    pub active: bool,
    /// Seconds since the last completed `start()`.
    pub uptime: f64,
    pub cells_count: usize,
    pub messages_processed: u64,
    pub last_alert: Option<AlertRecord>,
}

impl Coordinator {
    /// Snapshot the coordinator and every registered cell.
    pub fn status(&self) -> SystemStatus {
        let registry = self
            .shared
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner());
        let cells: BTreeMap<String, CellSnapshot> = registry
            .cells
            .iter()
            .map(|(name, cell)| (name.clone(), cell.status()))
            .collect();

        SystemStatus {
            core: CoreStatus {
                active: self.is_active(),
                uptime: self.uptime().as_secs_f64(),
                cells_count: registry.cells.len(),
                messages_processed: self.shared.messages_processed.load(Ordering::Relaxed),
                last_alert: self.last_alert(),
            },
            cells,
        }
    }

    /// Serialize the current status to `path` as indented JSON, creating
    /// parent directories as needed.
    ///
    /// A serialization or write failure is logged and reported as
    /// `false`, never raised.
    pub fn save_status(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let json = match serde_json::to_string_pretty(&self.status()) {
            Ok(json) => json,
            Err(err) => {
                error!(error = %err, "failed to serialize status snapshot");
                return false;
            }
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(err) = fs::create_dir_all(parent) {
                    error!(path = %path.display(), error = %err, "failed to create status directory");
                    return false;
                }
            }
        }

        match fs::write(path, json) {
            Ok(()) => {
                info!(path = %path.display(), "status snapshot saved");
                true
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "failed to write status snapshot");
                false
            }
        }
    }
}
