//! SFC Orchagent - Service Function Chaining orchestration agent
//!
//! Manages the lifecycle of port pairs, port pair groups and port chains and
//! keeps any number of backend drivers in step with the stored state.
//!
//! # Architecture
//!
//! ```text
//! request ──> [SfcOrch] ──> validation ──> [SfcStore] (transaction)
//!                 │
//!                 └──> [SfcDriverManager] ──> driver 1 ──> driver 2 ──> ...
//! ```
//!
//! # Key Components
//!
//! - [`sfc::SfcOrch`]: Lifecycle operations and per-verb driver failure policy
//! - [`sfc::SfcDriverManager`]: Ordered, fail-fast driver dispatch
//! - [`sfc::SfcStore`]: Transactional resource tables with integrity checks
//! - [`config::SfcConfig`]: TOML configuration (quotas, parameters, drivers)
//! - [`audit`]: Structured audit trail and logging setup

#[macro_use]
pub mod audit;
pub mod config;
pub mod inventory;
pub mod sfc;

pub use config::SfcConfig;
pub use inventory::StaticInventory;
pub use sfc::{SfcOrch, SfcOrchError, SfcRequest, SfcResponse};
