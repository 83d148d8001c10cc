//! Cytokine Core Prelude — convenient imports for common usage.
//!
//! ```rust
//! use cytokine_core::prelude::*;
//! ```

pub use crate::cell::{start_cell, Cell, CellCore, Handler, MessageSender, CYCLE_INTERVAL};
pub use crate::error::{CellError, CoreError, Result};
pub use crate::message::{Message, CORE_SOURCE, PRIORITY_MAX, PRIORITY_MIN};
pub use crate::types::{CellSnapshot, CellStats, CellStatus, MessageKind, Target};
