//! # Cytokine Core
//!
//! Core contracts for the cell coordination runtime: the message value
//! type, the actor base every cell implements, and the shared types both
//! sides of the bus agree on.
//!
//! A *cell* is an autonomous worker (a threat-detection agent) with its
//! own thread of periodic activity and a handler table for reacting to
//! messages. Cells never talk to each other directly; everything goes
//! through a coordinator's priority bus (see the `cytokine-runtime`
//! crate). This crate only defines the contract the two sides meet at:
//!
//! - [`message::Message`] — one immutable unit of inter-cell
//!   communication
//! - [`cell::Cell`] / [`cell::CellCore`] — the actor base contract and
//!   the shared state every concrete cell embeds
//! - [`cell::MessageSender`] — the seam a coordinator injects at
//!   registration time
//!
//! ## Quick Start
//!
//! ```rust
//! use cytokine_core::prelude::*;
//!
//! struct Macrophage {
//!     core: CellCore,
//! }
//!
//! impl Cell for Macrophage {
//!     fn core(&self) -> &CellCore {
//!         &self.core
//!     }
//! }
//!
//! let cell = Macrophage { core: CellCore::new("m1", "macrophage") };
//! cell.core().register_handler("scan_request", |_msg| Ok(()));
//! assert_eq!(cell.name(), "m1");
//! ```

pub mod cell;
pub mod error;
pub mod message;
pub mod types;
pub mod prelude;
