//! Pending operation queue: the operation model, bounded storage,
//! coalescing, and the binary cache codec.

pub mod coalesce;
pub mod codec;
pub mod operation;
pub mod store;

pub use coalesce::{coalesce, coalesce_groups};
pub use operation::{FailureCallback, Operation, SuccessCallback};
pub use store::OperationQueue;
