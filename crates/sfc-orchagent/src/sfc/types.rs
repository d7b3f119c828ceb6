//! SFC resource records, requests and driver contexts.

use serde::{Deserialize, Serialize};
use sfc_orch_common::Listable;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Key -> optional value parameter map (`None` is a legal value).
pub type ParameterMap = BTreeMap<String, Option<String>>;

/// The three resource kinds managed by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    PortChain,
    PortPairGroup,
    PortPair,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PortChain => "port_chain",
            Self::PortPairGroup => "port_pair_group",
            Self::PortPair => "port_pair",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State-changing lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SfcOperation {
    Create,
    Update,
    Delete,
}

impl SfcOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Driver method name for this operation on `kind`, e.g. `create_port_pair`.
    pub fn method_name(&self, kind: ResourceKind) -> String {
        format!("{}_{}", self.as_str(), kind.as_str())
    }
}

/// Host binding of a network port, as reported by the core network service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub id: Uuid,
    /// Host the port is bound to; `None` or empty when unbound.
    pub host_id: Option<String>,
}

impl PortBinding {
    pub fn new(id: Uuid, host_id: Option<String>) -> Self {
        Self { id, host_id }
    }

    /// Returns the bound host, treating an empty host id as unbound.
    pub fn host(&self) -> Option<&str> {
        self.host_id.as_deref().filter(|h| !h.is_empty())
    }
}

/// A service function's ingress/egress attachment points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortPair {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub description: String,
    pub ingress: Uuid,
    pub egress: Uuid,
    pub service_function_parameters: ParameterMap,
}

impl Listable for PortPair {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "tenant_id",
        "name",
        "description",
        "ingress",
        "egress",
        "service_function_parameters",
    ];

    fn id(&self) -> Uuid {
        self.id
    }
}

/// An ordered stage of interchangeable port pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortPairGroup {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub description: String,
    pub port_pairs: Vec<Uuid>,
}

impl PortPairGroup {
    pub fn contains_port_pair(&self, id: &Uuid) -> bool {
        self.port_pairs.contains(id)
    }
}

impl Listable for PortPairGroup {
    const FIELDS: &'static [&'static str] =
        &["id", "tenant_id", "name", "description", "port_pairs"];

    fn id(&self) -> Uuid {
        self.id
    }
}

/// An ordered sequence of port pair groups plus classifier bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortChain {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub description: String,
    pub port_pair_groups: Vec<Uuid>,
    pub flow_classifiers: Vec<Uuid>,
    pub chain_parameters: ParameterMap,
}

impl PortChain {
    pub fn contains_port_pair_group(&self, id: &Uuid) -> bool {
        self.port_pair_groups.contains(id)
    }

    pub fn contains_flow_classifier(&self, id: &Uuid) -> bool {
        self.flow_classifiers.contains(id)
    }
}

impl Listable for PortChain {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "tenant_id",
        "name",
        "description",
        "port_pair_groups",
        "flow_classifiers",
        "chain_parameters",
    ];

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Port pair creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortPairRequest {
    pub tenant_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub ingress: Uuid,
    pub egress: Uuid,
    #[serde(default)]
    pub service_function_parameters: Option<ParameterMap>,
}

impl PortPairRequest {
    pub fn new(tenant_id: impl Into<String>, ingress: Uuid, egress: Uuid) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            name: None,
            description: None,
            ingress,
            egress,
            service_function_parameters: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parameters(mut self, parameters: ParameterMap) -> Self {
        self.service_function_parameters = Some(parameters);
        self
    }
}

/// Port pair update; ingress, egress and parameters are immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortPairUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PortPairUpdate {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Port pair group creation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortPairGroupRequest {
    pub tenant_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub port_pairs: Option<Vec<Uuid>>,
}

impl PortPairGroupRequest {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_port_pairs(mut self, port_pairs: Vec<Uuid>) -> Self {
        self.port_pairs = Some(port_pairs);
        self
    }
}

/// Port pair group update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortPairGroupUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub port_pairs: Option<Vec<Uuid>>,
}

impl PortPairGroupUpdate {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn port_pairs(port_pairs: Vec<Uuid>) -> Self {
        Self {
            port_pairs: Some(port_pairs),
            ..Self::default()
        }
    }
}

/// Port chain creation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortChainRequest {
    pub tenant_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub port_pair_groups: Option<Vec<Uuid>>,
    #[serde(default)]
    pub flow_classifiers: Option<Vec<Uuid>>,
    #[serde(default)]
    pub chain_parameters: Option<ParameterMap>,
}

impl PortChainRequest {
    pub fn new(tenant_id: impl Into<String>, port_pair_groups: Vec<Uuid>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            port_pair_groups: Some(port_pair_groups),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_flow_classifiers(mut self, flow_classifiers: Vec<Uuid>) -> Self {
        self.flow_classifiers = Some(flow_classifiers);
        self
    }

    pub fn with_parameters(mut self, parameters: ParameterMap) -> Self {
        self.chain_parameters = Some(parameters);
        self
    }
}

/// Port chain update; chain parameters are create-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortChainUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub port_pair_groups: Option<Vec<Uuid>>,
    #[serde(default)]
    pub flow_classifiers: Option<Vec<Uuid>>,
}

impl PortChainUpdate {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn flow_classifiers(flow_classifiers: Vec<Uuid>) -> Self {
        Self {
            flow_classifiers: Some(flow_classifiers),
            ..Self::default()
        }
    }
}

/// Snapshot handed to drivers.
///
/// `original` is only set for updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfcContext<T> {
    pub current: T,
    pub original: Option<T>,
}

impl<T> SfcContext<T> {
    pub fn new(current: T) -> Self {
        Self {
            current,
            original: None,
        }
    }

    pub fn with_original(current: T, original: T) -> Self {
        Self {
            current,
            original: Some(original),
        }
    }
}

pub type PortChainContext = SfcContext<PortChain>;
pub type PortPairGroupContext = SfcContext<PortPairGroup>;
pub type PortPairContext = SfcContext<PortPair>;
