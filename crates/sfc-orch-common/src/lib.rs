//! Common orchestration abstractions for the SFC agent.
//!
//! This crate provides the building blocks the chain orchestrator is made of,
//! independent of the resources it manages:
//!
//! - [`SyncMap`]: Ordered map that never creates entries implicitly
//! - [`OperationTracker`]: Lifecycle stage tracking for state-changing operations
//! - [`ListQuery`]: Filtering, projection, stable sort and marker pagination
//!
//! # Lifecycle
//!
//! Every state-changing operation follows the same path:
//!
//! 1. `Validating`: the request is checked, nothing is written
//! 2. `Persisting`: a store transaction applies the change atomically
//! 3. `Dispatching`: registered drivers are called in order
//! 4. `Committed`: the operation completed
//!
//! A failure in stage 1 or 2 leaves no trace; a failure in stage 3 is
//! handled by the caller's compensation policy.

mod lifecycle;
mod query;
mod sync_map;

pub use lifecycle::{LifecycleStage, OperationTracker, Rejection};
pub use query::{Listable, ListQuery, QueryError, Row, SortDirection, SortKey};
pub use sync_map::{SyncMap, SyncMapError};
