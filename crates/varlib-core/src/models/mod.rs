//! Data models shared by the engine components.
//!
//! Everything here is recomputed from the filesystem on each scan. Nothing
//! is persisted by the engine.

mod instance;
mod operation;
mod status;

pub use instance::*;
pub use operation::*;
pub use status::*;
