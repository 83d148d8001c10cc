//! # Cytokine Runtime
//!
//! The coordination runtime: the priority bus, the registry, the single
//! dispatcher thread, and the startup/shutdown protocol that brings a
//! set of cells into and out of a consistent state.
//!
//! One [`coordinator::Coordinator`] owns one [`bus::PriorityBus`] and
//! routes every message a registered cell sends: broadcast, by cell
//! type, or by exact name, in `(priority key, submission order)`. The
//! runtime guarantees bounded shutdown — a hung cell is abandoned after
//! its join timeout, never killed, and never blocks the rest of the
//! system from stopping.

pub mod bus;
pub mod coordinator;
pub mod status;
pub mod prelude;
