//! SFC orchestration errors.

use super::types::ResourceKind;
use serde::{Deserialize, Serialize};
use sfc_orch_common::QueryError;
use std::fmt;
use uuid::Uuid;

/// Caller-facing classification of an [`SfcOrchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    InUse,
    Conflict,
    OverQuota,
    DriverFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidInput => "invalid_input",
            Self::InUse => "in_use",
            Self::Conflict => "conflict",
            Self::OverQuota => "over_quota",
            Self::DriverFailure => "driver_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SfcOrchError {
    #[error("Port Chain {id} could not be found")]
    PortChainNotFound { id: Uuid },
    #[error("Port Pair Group {id} could not be found")]
    PortPairGroupNotFound { id: Uuid },
    #[error("Port Pair {id} could not be found")]
    PortPairNotFound { id: Uuid },
    #[error("Port Pair port {id} could not be found")]
    PortPairPortNotFound { id: Uuid },
    #[error("Flow Classifier {id} could not be found")]
    FlowClassifierNotFound { id: Uuid },

    #[error("Chain parameter does not support ({key}, {})", display_value(.value))]
    InvalidChainParameter { key: String, value: Option<String> },
    #[error("Service function parameter does not support ({key}, {})", display_value(.value))]
    InvalidServiceFunctionParameter { key: String, value: Option<String> },
    #[error("Port Pair Group is not specified in Port Chain")]
    PortPairGroupNotSpecified,
    #[error("Port Pair ingress port {ingress} and egress port {egress} are not on the same host")]
    PortPairIngressEgressDifferentHost { ingress: Uuid, egress: Uuid },
    #[error("Port Pair ingress port {ingress} does not belong to a host")]
    PortPairIngressNoHost { ingress: Uuid },
    #[error("Port Pair egress port {egress} does not belong to a host")]
    PortPairEgressNoHost { egress: Uuid },
    #[error("Invalid list query: {0}")]
    InvalidListQuery(String),

    #[error("Port Pair {id} in use")]
    PortPairInUse { id: Uuid },
    #[error("Port Pair Group {id} in use")]
    PortPairGroupInUse { id: Uuid },
    #[error("Port Pair Group(s) {} in use by Port Chain {port_chain}", join_ids(.port_pair_groups))]
    PortPairGroupsInUse {
        port_pair_groups: Vec<Uuid>,
        port_chain: Uuid,
    },

    #[error(
        "Port Pair with ingress port {ingress} and egress port {egress} is already used by another Port Pair {id}"
    )]
    PortPairIngressEgressInUse { ingress: Uuid, egress: Uuid, id: Uuid },
    #[error(
        "Flow Classifier {fc_id} requested by Port Chain {chain_id} conflicts with Port Chain {owner_chain_id}"
    )]
    PortChainFlowClassifierInConflict {
        fc_id: Uuid,
        chain_id: Uuid,
        owner_chain_id: Uuid,
    },

    #[error("{resource} {id} has a create or delete in progress")]
    OperationInProgress { resource: ResourceKind, id: Uuid },

    #[error("Quota exceeded for {resource} of tenant {tenant_id}: limit {limit}")]
    QuotaExceeded {
        resource: ResourceKind,
        tenant_id: String,
        limit: usize,
    },

    #[error("{method} failed in driver {driver}: {reason}")]
    DriverFailure {
        method: String,
        driver: String,
        reason: String,
    },
}

impl SfcOrchError {
    /// Typed NotFound for a resource of `kind`.
    pub fn not_found(kind: ResourceKind, id: Uuid) -> Self {
        match kind {
            ResourceKind::PortChain => Self::PortChainNotFound { id },
            ResourceKind::PortPairGroup => Self::PortPairGroupNotFound { id },
            ResourceKind::PortPair => Self::PortPairNotFound { id },
        }
    }

    /// Maps a listing error for `kind`; an unknown marker is that kind's NotFound.
    pub fn from_query(kind: ResourceKind, err: QueryError) -> Self {
        match err {
            QueryError::MarkerNotFound(id) => Self::not_found(kind, id),
            other => Self::InvalidListQuery(other.to_string()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PortChainNotFound { .. }
            | Self::PortPairGroupNotFound { .. }
            | Self::PortPairNotFound { .. }
            | Self::PortPairPortNotFound { .. }
            | Self::FlowClassifierNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidChainParameter { .. }
            | Self::InvalidServiceFunctionParameter { .. }
            | Self::PortPairGroupNotSpecified
            | Self::PortPairIngressEgressDifferentHost { .. }
            | Self::PortPairIngressNoHost { .. }
            | Self::PortPairEgressNoHost { .. }
            | Self::InvalidListQuery(_) => ErrorKind::InvalidInput,
            Self::PortPairInUse { .. }
            | Self::PortPairGroupInUse { .. }
            | Self::PortPairGroupsInUse { .. } => ErrorKind::InUse,
            Self::PortPairIngressEgressInUse { .. }
            | Self::PortChainFlowClassifierInConflict { .. }
            | Self::OperationInProgress { .. } => ErrorKind::Conflict,
            Self::QuotaExceeded { .. } => ErrorKind::OverQuota,
            Self::DriverFailure { .. } => ErrorKind::DriverFailure,
        }
    }
}

fn display_value(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
