//! Backend driver interface and the driver manager.
//!
//! Drivers are called in registration order. The first failure stops the
//! iteration and is returned to the orchestrator, which decides how to
//! compensate.

use super::error::SfcOrchError;
use super::types::{
    PortChainContext, PortPairContext, PortPairGroupContext, ResourceKind, SfcOperation,
};
use crate::config::ConfigError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Error returned by a single driver call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("{0}")]
    Failed(String),

    #[error("call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

pub type DriverResult = Result<(), DriverError>;

/// A backend that realizes SFC resources.
#[async_trait]
pub trait SfcDriver: Send + Sync {
    /// Name used in logs and in `DriverFailure` errors.
    fn name(&self) -> &str;

    async fn create_port_chain(&self, context: &PortChainContext) -> DriverResult;
    async fn update_port_chain(&self, context: &PortChainContext) -> DriverResult;
    async fn delete_port_chain(&self, context: &PortChainContext) -> DriverResult;

    async fn create_port_pair_group(&self, context: &PortPairGroupContext) -> DriverResult;
    async fn update_port_pair_group(&self, context: &PortPairGroupContext) -> DriverResult;
    async fn delete_port_pair_group(&self, context: &PortPairGroupContext) -> DriverResult;

    async fn create_port_pair(&self, context: &PortPairContext) -> DriverResult;
    async fn update_port_pair(&self, context: &PortPairContext) -> DriverResult;
    async fn delete_port_pair(&self, context: &PortPairContext) -> DriverResult;
}

/// Context of one dispatch, tagged by resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SfcDriverContext {
    PortChain(PortChainContext),
    PortPairGroup(PortPairGroupContext),
    PortPair(PortPairContext),
}

impl SfcDriverContext {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::PortChain(_) => ResourceKind::PortChain,
            Self::PortPairGroup(_) => ResourceKind::PortPairGroup,
            Self::PortPair(_) => ResourceKind::PortPair,
        }
    }

    /// Id of the resource the context describes.
    pub fn resource_id(&self) -> uuid::Uuid {
        match self {
            Self::PortChain(ctx) => ctx.current.id,
            Self::PortPairGroup(ctx) => ctx.current.id,
            Self::PortPair(ctx) => ctx.current.id,
        }
    }
}

/// Ordered collection of registered drivers.
#[derive(Default)]
pub struct SfcDriverManager {
    drivers: Vec<Arc<dyn SfcDriver>>,
    call_timeout: Option<Duration>,
}

impl SfcDriverManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds every driver call; an expired call counts as that driver's failure.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = Some(call_timeout);
        self
    }

    /// Appends a driver; registration order is call order.
    pub fn register(&mut self, driver: Arc<dyn SfcDriver>) {
        info!(driver = driver.name(), position = self.drivers.len(), "Registered SFC driver");
        self.drivers.push(driver);
    }

    pub fn driver_names(&self) -> Vec<&str> {
        self.drivers.iter().map(|d| d.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Calls `operation` on every driver in order, stopping at the first failure.
    pub async fn dispatch(
        &self,
        operation: SfcOperation,
        context: &SfcDriverContext,
    ) -> Result<(), SfcOrchError> {
        let method = operation.method_name(context.kind());

        for driver in &self.drivers {
            debug!(driver = driver.name(), method = %method, id = %context.resource_id(), "Calling driver");

            let outcome = match self.call_timeout {
                Some(limit) => match timeout(limit, invoke(driver.as_ref(), operation, context)).await {
                    Ok(result) => result,
                    Err(_) => Err(DriverError::Timeout(limit)),
                },
                None => invoke(driver.as_ref(), operation, context).await,
            };

            if let Err(e) = outcome {
                warn!(
                    driver = driver.name(),
                    method = %method,
                    id = %context.resource_id(),
                    error = %e,
                    "Driver call failed"
                );
                return Err(SfcOrchError::DriverFailure {
                    method,
                    driver: driver.name().to_string(),
                    reason: e.to_string(),
                });
            }
        }

        Ok(())
    }
}

async fn invoke(
    driver: &dyn SfcDriver,
    operation: SfcOperation,
    context: &SfcDriverContext,
) -> DriverResult {
    match (operation, context) {
        (SfcOperation::Create, SfcDriverContext::PortChain(ctx)) => driver.create_port_chain(ctx).await,
        (SfcOperation::Update, SfcDriverContext::PortChain(ctx)) => driver.update_port_chain(ctx).await,
        (SfcOperation::Delete, SfcDriverContext::PortChain(ctx)) => driver.delete_port_chain(ctx).await,
        (SfcOperation::Create, SfcDriverContext::PortPairGroup(ctx)) => {
            driver.create_port_pair_group(ctx).await
        }
        (SfcOperation::Update, SfcDriverContext::PortPairGroup(ctx)) => {
            driver.update_port_pair_group(ctx).await
        }
        (SfcOperation::Delete, SfcDriverContext::PortPairGroup(ctx)) => {
            driver.delete_port_pair_group(ctx).await
        }
        (SfcOperation::Create, SfcDriverContext::PortPair(ctx)) => driver.create_port_pair(ctx).await,
        (SfcOperation::Update, SfcDriverContext::PortPair(ctx)) => driver.update_port_pair(ctx).await,
        (SfcOperation::Delete, SfcDriverContext::PortPair(ctx)) => driver.delete_port_pair(ctx).await,
    }
}

/// Driver that only logs what it is asked to do.
#[derive(Debug, Clone)]
pub struct LoggingDriver {
    name: String,
}

impl LoggingDriver {
    pub const NAME: &'static str = "logging";

    pub fn new() -> Self {
        Self {
            name: Self::NAME.to_string(),
        }
    }

    fn record<T: serde::Serialize>(&self, method: &str, current: &T, original: Option<&T>) -> DriverResult {
        info!(
            driver = %self.name,
            method,
            current = %serde_json::to_string(current).unwrap_or_default(),
            original = %original
                .and_then(|o| serde_json::to_string(o).ok())
                .unwrap_or_default(),
            "SFC driver call"
        );
        Ok(())
    }
}

impl Default for LoggingDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SfcDriver for LoggingDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_port_chain(&self, context: &PortChainContext) -> DriverResult {
        self.record("create_port_chain", &context.current, context.original.as_ref())
    }

    async fn update_port_chain(&self, context: &PortChainContext) -> DriverResult {
        self.record("update_port_chain", &context.current, context.original.as_ref())
    }

    async fn delete_port_chain(&self, context: &PortChainContext) -> DriverResult {
        self.record("delete_port_chain", &context.current, context.original.as_ref())
    }

    async fn create_port_pair_group(&self, context: &PortPairGroupContext) -> DriverResult {
        self.record("create_port_pair_group", &context.current, context.original.as_ref())
    }

    async fn update_port_pair_group(&self, context: &PortPairGroupContext) -> DriverResult {
        self.record("update_port_pair_group", &context.current, context.original.as_ref())
    }

    async fn delete_port_pair_group(&self, context: &PortPairGroupContext) -> DriverResult {
        self.record("delete_port_pair_group", &context.current, context.original.as_ref())
    }

    async fn create_port_pair(&self, context: &PortPairContext) -> DriverResult {
        self.record("create_port_pair", &context.current, context.original.as_ref())
    }

    async fn update_port_pair(&self, context: &PortPairContext) -> DriverResult {
        self.record("update_port_pair", &context.current, context.original.as_ref())
    }

    async fn delete_port_pair(&self, context: &PortPairContext) -> DriverResult {
        self.record("delete_port_pair", &context.current, context.original.as_ref())
    }
}

/// Resolves configured driver names, keeping their order.
pub fn build_drivers(names: &[String]) -> Result<Vec<Arc<dyn SfcDriver>>, ConfigError> {
    names
        .iter()
        .map(|name| match name.as_str() {
            LoggingDriver::NAME => Ok(Arc::new(LoggingDriver::new()) as Arc<dyn SfcDriver>),
            other => Err(ConfigError::UnknownDriver(other.to_string())),
        })
        .collect()
}
