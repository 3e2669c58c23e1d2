//! Safe file operator.
//!
//! Every mutation the engine performs goes through here: moves between
//! roots and deletes of duplicate instances. Only `.var` files are ever
//! touched.

mod backend;
mod conflict;
mod operator;
mod retry;

pub use backend::{FileSystem, StdFileSystem};
pub use conflict::{conflict_name, resolve_conflict};
pub use operator::{FileOperations, MoveState, SafeFileOperator};
pub use retry::{is_transient, retry_io, RetryPolicy, RetryStats, Sleeper, TokioSleeper};

#[cfg(test)]
pub(crate) use retry::testing;
