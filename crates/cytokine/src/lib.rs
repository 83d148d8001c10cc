//! # Cytokine
//!
//! Cell-based coordination runtime for autonomous threat-detection
//! agents, modeled loosely on intercellular signaling.
//!
//! A *cell* is an autonomous worker with its own thread of periodic
//! activity and a table of message handlers. A *coordinator* owns the
//! registry of cells, the priority bus they communicate through, and the
//! single dispatcher thread that routes every message — broadcast, by
//! cell type, or by exact name.
//!
//! ## Quick Start
//!
//! ```rust
//! use cytokine::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct Sentinel {
//!     core: CellCore,
//! }
//!
//! impl Cell for Sentinel {
//!     fn core(&self) -> &CellCore {
//!         &self.core
//!     }
//! }
//!
//! let sentinel = Arc::new(Sentinel { core: CellCore::new("s1", "sentinel") });
//! sentinel.core().register_handler("system_start", |_msg| Ok(()));
//!
//! let coordinator = Coordinator::new();
//! assert!(coordinator.register_cell(sentinel.clone()));
//!
//! coordinator.start();
//! sentinel
//!     .core()
//!     .send_message("alert_scan_started", Target::Broadcast, json!({"path": "/tmp"}), 5);
//! coordinator.stop();
//! assert!(!coordinator.is_active());
//! ```
//!
//! ## Architecture
//!
//! Cytokine is organized into two crates:
//!
//! - [`cytokine_core`] - The message value type, the `Cell` actor base
//!   contract, and shared types
//! - [`cytokine_runtime`] - Priority bus, registry, dispatcher, and the
//!   startup/shutdown protocol
//!
//! ## Key Concepts
//!
//! - **Priority**: messages carry a priority in `[1, 5]`; 5 drains
//!   first. Equal priorities drain in submission order.
//! - **Addressing**: `Target::Broadcast` (everyone but the sender),
//!   `Target::Type` (all cells of a type, but the sender), or
//!   `Target::Cell` (one exact name).
//! - **Lifecycle**: the coordinator broadcasts `system_start` and
//!   `system_stop` from the reserved source `"core"`, and shuts down
//!   with bounded joins — a hung worker is abandoned, never killed.

pub use cytokine_core;
pub use cytokine_runtime;

pub mod prelude;
