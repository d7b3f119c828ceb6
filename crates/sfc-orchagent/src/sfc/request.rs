//! JSON request boundary.
//!
//! A request is a JSON object tagged by `op`:
//!
//! ```json
//! {"op": "create_port_pair", "port_pair": {"tenant_id": "t1", "ingress": "...", "egress": "..."}}
//! {"op": "list_port_chains", "query": {"filters": {"tenant_id": ["t1"]}, "limit": 10}}
//! ```
//!
//! Every request yields one [`SfcResponse`]; failures carry the error kind as a
//! stable snake_case string.

use super::error::{ErrorKind, SfcOrchError};
use super::orch::{Result, SfcOrch};
use super::types::{
    PortChainRequest, PortChainUpdate, PortPairGroupRequest, PortPairGroupUpdate,
    PortPairRequest, PortPairUpdate, ResourceKind,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sfc_orch_common::{ListQuery, Listable, Row};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SfcRequest {
    CreatePortPair {
        port_pair: PortPairRequest,
    },
    UpdatePortPair {
        id: Uuid,
        port_pair: PortPairUpdate,
    },
    DeletePortPair {
        id: Uuid,
    },
    GetPortPair {
        id: Uuid,
        #[serde(default)]
        fields: Vec<String>,
    },
    ListPortPairs {
        #[serde(default)]
        query: ListQuery,
    },

    CreatePortPairGroup {
        port_pair_group: PortPairGroupRequest,
    },
    UpdatePortPairGroup {
        id: Uuid,
        port_pair_group: PortPairGroupUpdate,
    },
    DeletePortPairGroup {
        id: Uuid,
    },
    GetPortPairGroup {
        id: Uuid,
        #[serde(default)]
        fields: Vec<String>,
    },
    ListPortPairGroups {
        #[serde(default)]
        query: ListQuery,
    },

    CreatePortChain {
        port_chain: PortChainRequest,
    },
    UpdatePortChain {
        id: Uuid,
        port_chain: PortChainUpdate,
    },
    DeletePortChain {
        id: Uuid,
    },
    GetPortChain {
        id: Uuid,
        #[serde(default)]
        fields: Vec<String>,
    },
    ListPortChains {
        #[serde(default)]
        query: ListQuery,
    },
}

impl SfcRequest {
    /// The `op` tag of this request.
    pub fn op(&self) -> &'static str {
        match self {
            Self::CreatePortPair { .. } => "create_port_pair",
            Self::UpdatePortPair { .. } => "update_port_pair",
            Self::DeletePortPair { .. } => "delete_port_pair",
            Self::GetPortPair { .. } => "get_port_pair",
            Self::ListPortPairs { .. } => "list_port_pairs",
            Self::CreatePortPairGroup { .. } => "create_port_pair_group",
            Self::UpdatePortPairGroup { .. } => "update_port_pair_group",
            Self::DeletePortPairGroup { .. } => "delete_port_pair_group",
            Self::GetPortPairGroup { .. } => "get_port_pair_group",
            Self::ListPortPairGroups { .. } => "list_port_pair_groups",
            Self::CreatePortChain { .. } => "create_port_chain",
            Self::UpdatePortChain { .. } => "update_port_chain",
            Self::DeletePortChain { .. } => "delete_port_chain",
            Self::GetPortChain { .. } => "get_port_chain",
            Self::ListPortChains { .. } => "list_port_chains",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SfcResponse {
    pub status: ResponseStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<Row>>,
}

impl SfcResponse {
    pub fn ok() -> Self {
        Self {
            status: ResponseStatus::Ok,
            kind: None,
            message: None,
            resource: None,
            resources: None,
        }
    }

    pub fn error(err: &SfcOrchError) -> Self {
        Self {
            status: ResponseStatus::Error,
            kind: Some(err.kind()),
            message: Some(err.to_string()),
            ..Self::ok()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}

impl SfcOrch {
    /// Executes one request.
    pub async fn handle(&self, request: SfcRequest) -> SfcResponse {
        let op = request.op();
        let response = match request {
            SfcRequest::CreatePortPair { port_pair } => {
                single(self.create_port_pair(port_pair).await, &[], ResourceKind::PortPair)
            }
            SfcRequest::UpdatePortPair { id, port_pair } => single(
                self.update_port_pair(id, port_pair).await,
                &[],
                ResourceKind::PortPair,
            ),
            SfcRequest::DeletePortPair { id } => empty(self.delete_port_pair(id).await),
            SfcRequest::GetPortPair { id, fields } => {
                single(self.get_port_pair(id), &fields, ResourceKind::PortPair)
            }
            SfcRequest::ListPortPairs { query } => many(self.list_port_pairs(&query)),

            SfcRequest::CreatePortPairGroup { port_pair_group } => single(
                self.create_port_pair_group(port_pair_group).await,
                &[],
                ResourceKind::PortPairGroup,
            ),
            SfcRequest::UpdatePortPairGroup {
                id,
                port_pair_group,
            } => single(
                self.update_port_pair_group(id, port_pair_group).await,
                &[],
                ResourceKind::PortPairGroup,
            ),
            SfcRequest::DeletePortPairGroup { id } => empty(self.delete_port_pair_group(id).await),
            SfcRequest::GetPortPairGroup { id, fields } => {
                single(self.get_port_pair_group(id), &fields, ResourceKind::PortPairGroup)
            }
            SfcRequest::ListPortPairGroups { query } => many(self.list_port_pair_groups(&query)),

            SfcRequest::CreatePortChain { port_chain } => single(
                self.create_port_chain(port_chain).await,
                &[],
                ResourceKind::PortChain,
            ),
            SfcRequest::UpdatePortChain { id, port_chain } => single(
                self.update_port_chain(id, port_chain).await,
                &[],
                ResourceKind::PortChain,
            ),
            SfcRequest::DeletePortChain { id } => empty(self.delete_port_chain(id).await),
            SfcRequest::GetPortChain { id, fields } => {
                single(self.get_port_chain(id), &fields, ResourceKind::PortChain)
            }
            SfcRequest::ListPortChains { query } => many(self.list_port_chains(&query)),
        };

        debug!(op, status = ?response.status, kind = ?response.kind, "Handled request");
        response
    }
}

/// One record, projected to `fields` (all fields when empty).
fn single<T: Listable>(result: Result<T>, fields: &[String], kind: ResourceKind) -> SfcResponse {
    let projected = result.and_then(|record| {
        ListQuery::new()
            .with_fields(fields.iter().cloned())
            .apply(std::iter::once(&record))
            .map_err(|e| SfcOrchError::from_query(kind, e))
    });
    match projected {
        Ok(rows) => SfcResponse {
            resource: rows.into_iter().next().map(Value::Object),
            ..SfcResponse::ok()
        },
        Err(e) => SfcResponse::error(&e),
    }
}

fn many(result: Result<Vec<Row>>) -> SfcResponse {
    match result {
        Ok(rows) => SfcResponse {
            resources: Some(rows),
            ..SfcResponse::ok()
        },
        Err(e) => SfcResponse::error(&e),
    }
}

fn empty(result: Result<()>) -> SfcResponse {
    match result {
        Ok(()) => SfcResponse::ok(),
        Err(e) => SfcResponse::error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_requests() {
        let id = Uuid::from_u128(7);
        let request: SfcRequest = serde_json::from_value(json!({
            "op": "update_port_chain",
            "id": id,
            "port_chain": {"name": "pc2"}
        }))
        .unwrap();
        assert_eq!(
            request,
            SfcRequest::UpdatePortChain {
                id,
                port_chain: PortChainUpdate::name("pc2"),
            }
        );
        assert_eq!(request.op(), "update_port_chain");

        let request: SfcRequest = serde_json::from_value(json!({"op": "list_port_pairs"})).unwrap();
        assert_eq!(
            request,
            SfcRequest::ListPortPairs {
                query: ListQuery::default()
            }
        );
    }

    #[test]
    fn test_chain_parameters_are_not_updatable() {
        let parsed: std::result::Result<SfcRequest, _> = serde_json::from_value(json!({
            "op": "update_port_chain",
            "id": Uuid::from_u128(1),
            "port_chain": {"chain_parameters": {"correlation": "mpls"}}
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_error_response_shape() {
        let err = SfcOrchError::PortPairGroupInUse {
            id: Uuid::from_u128(3),
        };
        let response = serde_json::to_value(SfcResponse::error(&err)).unwrap();
        assert_eq!(
            response,
            json!({
                "status": "error",
                "kind": "in_use",
                "message": err.to_string(),
            })
        );
        assert_eq!(serde_json::to_value(SfcResponse::ok()).unwrap(), json!({"status": "ok"}));
    }
}
