//! Cytokine Prelude — one import for the whole coordination surface.
//!
//! ```rust
//! use cytokine::prelude::*;
//! ```

// The runtime prelude already re-exports the core prelude.
pub use cytokine_runtime::prelude::*;
