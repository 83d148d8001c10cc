//! Cytokine Runtime Prelude — convenient imports for common usage.
//!
//! ```rust
//! use cytokine_runtime::prelude::*;
//! ```

// Re-export the bus
pub use crate::bus::{ordering_key, PriorityBus, LIFECYCLE_KEY};

// Re-export the coordinator
pub use crate::coordinator::{AlertRecord, Coordinator, CoordinatorConfig};

// Re-export status reporting
pub use crate::status::{CoreStatus, SystemStatus};

// Re-export from core
pub use cytokine_core::prelude::*;
