//! SfcOrch - Service function chain orchestration.
//!
//! Tenants describe service functions as port pairs, group interchangeable
//! pairs into port pair groups, and chain groups into a port chain bound to
//! flow classifiers. [`SfcOrch`] validates and stores these resources and
//! pushes every change to the registered [`SfcDriver`]s.

mod driver;
mod error;
mod orch;
mod request;
mod store;
mod types;
pub mod validation;

pub use driver::{
    build_drivers, DriverError, DriverResult, LoggingDriver, SfcDriver, SfcDriverContext,
    SfcDriverManager,
};
pub use error::{ErrorKind, SfcOrchError};
pub use orch::{SfcNetworkCallbacks, SfcOrch, SfcOrchConfig, SfcOrchStats};
pub use request::{ResponseStatus, SfcRequest, SfcResponse};
pub use store::{SfcStore, SfcTables};
pub use types::{
    ParameterMap, PortBinding, PortChain, PortChainContext, PortChainRequest, PortChainUpdate,
    PortPair, PortPairContext, PortPairGroup, PortPairGroupContext, PortPairGroupRequest,
    PortPairGroupUpdate, PortPairRequest, PortPairUpdate, ResourceKind, SfcContext,
    SfcOperation,
};
pub use validation::{ParameterPolicy, SupportedParameter};
