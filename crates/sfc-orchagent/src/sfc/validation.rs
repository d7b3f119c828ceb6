//! Validation engine.
//!
//! Pure checks run before anything is written. Functions that look at other
//! records take them as iterators so the store can run them inside its
//! transaction against the staged tables.

use super::error::SfcOrchError;
use super::types::{ParameterMap, PortBinding, PortChain, PortPair, PortPairGroup};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// One whitelisted `(key, value)` parameter combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedParameter {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl SupportedParameter {
    pub fn new(key: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            key: key.into(),
            value: value.map(str::to_string),
        }
    }
}

/// Parameter whitelist plus the map used when a request leaves parameters unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterPolicy {
    supported: Vec<SupportedParameter>,
    defaults: ParameterMap,
}

impl ParameterPolicy {
    pub fn new(supported: Vec<SupportedParameter>, defaults: ParameterMap) -> Self {
        Self {
            supported,
            defaults,
        }
    }

    /// `correlation = mpls` only.
    pub fn chain_default() -> Self {
        Self::new(
            vec![SupportedParameter::new("correlation", Some("mpls"))],
            ParameterMap::from([("correlation".to_string(), Some("mpls".to_string()))]),
        )
    }

    /// `correlation = None` only.
    pub fn service_function_default() -> Self {
        Self::new(
            vec![SupportedParameter::new("correlation", None)],
            ParameterMap::from([("correlation".to_string(), None)]),
        )
    }

    pub fn supported(&self) -> &[SupportedParameter] {
        &self.supported
    }

    pub fn defaults(&self) -> &ParameterMap {
        &self.defaults
    }

    pub fn is_supported(&self, key: &str, value: &Option<String>) -> bool {
        self.supported
            .iter()
            .any(|p| p.key == key && &p.value == value)
    }

    /// Returns the first `(key, value)` outside the whitelist.
    fn first_unsupported<'a>(
        &self,
        params: &'a ParameterMap,
    ) -> Option<(&'a String, &'a Option<String>)> {
        params.iter().find(|(k, v)| !self.is_supported(k, v))
    }

    fn normalize(&self, params: Option<ParameterMap>) -> Result<ParameterMap, (String, Option<String>)> {
        match params {
            Some(params) if !params.is_empty() => match self.first_unsupported(&params) {
                Some((key, value)) => Err((key.clone(), value.clone())),
                None => Ok(params),
            },
            _ => Ok(self.defaults.clone()),
        }
    }
}

/// Absent name or description becomes the empty string.
pub fn normalize_string(value: Option<String>) -> String {
    value.unwrap_or_default()
}

/// Collapses duplicates keeping the first occurrence; absent becomes empty.
pub fn normalize_id_list(ids: Option<Vec<Uuid>>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.unwrap_or_default()
        .into_iter()
        .filter(|id| seen.insert(*id))
        .collect()
}

/// A chain needs at least one port pair group.
pub fn normalize_port_pair_groups(groups: Option<Vec<Uuid>>) -> Result<Vec<Uuid>, SfcOrchError> {
    let groups = normalize_id_list(groups);
    if groups.is_empty() {
        return Err(SfcOrchError::PortPairGroupNotSpecified);
    }
    Ok(groups)
}

pub fn normalize_chain_parameters(
    params: Option<ParameterMap>,
    policy: &ParameterPolicy,
) -> Result<ParameterMap, SfcOrchError> {
    policy
        .normalize(params)
        .map_err(|(key, value)| SfcOrchError::InvalidChainParameter { key, value })
}

pub fn normalize_service_function_parameters(
    params: Option<ParameterMap>,
    policy: &ParameterPolicy,
) -> Result<ParameterMap, SfcOrchError> {
    policy
        .normalize(params)
        .map_err(|(key, value)| SfcOrchError::InvalidServiceFunctionParameter { key, value })
}

/// Ingress and egress must both be bound, to the same host.
pub fn check_ingress_egress_locality(
    ingress: &PortBinding,
    egress: &PortBinding,
) -> Result<(), SfcOrchError> {
    let ingress_host = ingress
        .host()
        .ok_or(SfcOrchError::PortPairIngressNoHost { ingress: ingress.id })?;
    let egress_host = egress
        .host()
        .ok_or(SfcOrchError::PortPairEgressNoHost { egress: egress.id })?;
    if ingress_host != egress_host {
        return Err(SfcOrchError::PortPairIngressEgressDifferentHost {
            ingress: ingress.id,
            egress: egress.id,
        });
    }
    Ok(())
}

pub fn check_ingress_egress_uniqueness<'a>(
    pairs: impl IntoIterator<Item = &'a PortPair>,
    ingress: Uuid,
    egress: Uuid,
) -> Result<(), SfcOrchError> {
    match pairs
        .into_iter()
        .find(|p| p.ingress == ingress && p.egress == egress)
    {
        Some(existing) => Err(SfcOrchError::PortPairIngressEgressInUse {
            ingress,
            egress,
            id: existing.id,
        }),
        None => Ok(()),
    }
}

/// A flow classifier may be bound to one chain only; `chain_id` itself is skipped.
pub fn check_flow_classifier_exclusivity<'a>(
    chains: impl IntoIterator<Item = &'a PortChain>,
    fc_id: Uuid,
    chain_id: Uuid,
) -> Result<(), SfcOrchError> {
    match chains
        .into_iter()
        .find(|c| c.id != chain_id && c.contains_flow_classifier(&fc_id))
    {
        Some(owner) => Err(SfcOrchError::PortChainFlowClassifierInConflict {
            fc_id,
            chain_id,
            owner_chain_id: owner.id,
        }),
        None => Ok(()),
    }
}

/// A port pair may belong to one group only; `group_id` itself is skipped.
pub fn check_port_pair_membership<'a>(
    groups: impl IntoIterator<Item = &'a PortPairGroup>,
    pair_id: Uuid,
    group_id: Uuid,
) -> Result<(), SfcOrchError> {
    if groups
        .into_iter()
        .any(|g| g.id != group_id && g.contains_port_pair(&pair_id))
    {
        return Err(SfcOrchError::PortPairInUse { id: pair_id });
    }
    Ok(())
}

/// A port pair group may belong to one chain only; `chain_id` itself is skipped.
///
/// Reports every requested group owned by the first conflicting chain.
pub fn check_port_pair_group_membership<'a>(
    chains: impl IntoIterator<Item = &'a PortChain>,
    group_ids: &[Uuid],
    chain_id: Uuid,
) -> Result<(), SfcOrchError> {
    for chain in chains.into_iter().filter(|c| c.id != chain_id) {
        let in_use: Vec<Uuid> = group_ids
            .iter()
            .filter(|g| chain.contains_port_pair_group(g))
            .copied()
            .collect();
        if !in_use.is_empty() {
            return Err(SfcOrchError::PortPairGroupsInUse {
                port_pair_groups: in_use,
                port_chain: chain.id,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chain(id: u128, groups: &[u128], fcs: &[u128]) -> PortChain {
        PortChain {
            id: Uuid::from_u128(id),
            tenant_id: "t1".into(),
            name: String::new(),
            description: String::new(),
            port_pair_groups: groups.iter().map(|g| Uuid::from_u128(*g)).collect(),
            flow_classifiers: fcs.iter().map(|f| Uuid::from_u128(*f)).collect(),
            chain_parameters: ParameterMap::new(),
        }
    }

    #[test]
    fn test_chain_parameters_default_and_whitelist() {
        let policy = ParameterPolicy::chain_default();
        let expected = ParameterMap::from([("correlation".to_string(), Some("mpls".to_string()))]);

        assert_eq!(normalize_chain_parameters(None, &policy).unwrap(), expected);
        assert_eq!(
            normalize_chain_parameters(Some(ParameterMap::new()), &policy).unwrap(),
            expected
        );
        assert_eq!(
            normalize_chain_parameters(Some(expected.clone()), &policy).unwrap(),
            expected
        );

        let vxlan = ParameterMap::from([("correlation".to_string(), Some("vxlan".to_string()))]);
        assert_eq!(
            normalize_chain_parameters(Some(vxlan), &policy),
            Err(SfcOrchError::InvalidChainParameter {
                key: "correlation".into(),
                value: Some("vxlan".into()),
            })
        );
    }

    #[test]
    fn test_service_function_parameters() {
        let policy = ParameterPolicy::service_function_default();
        assert_eq!(
            normalize_service_function_parameters(None, &policy).unwrap(),
            ParameterMap::from([("correlation".to_string(), None)])
        );

        let mpls = ParameterMap::from([("correlation".to_string(), Some("mpls".to_string()))]);
        assert_eq!(
            normalize_service_function_parameters(Some(mpls), &policy),
            Err(SfcOrchError::InvalidServiceFunctionParameter {
                key: "correlation".into(),
                value: Some("mpls".into()),
            })
        );
    }

    #[test]
    fn test_id_lists() {
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        assert_eq!(normalize_id_list(Some(vec![b, a, b, a])), vec![b, a]);
        assert_eq!(normalize_id_list(None), Vec::<Uuid>::new());
        assert_eq!(
            normalize_port_pair_groups(Some(vec![])),
            Err(SfcOrchError::PortPairGroupNotSpecified)
        );
        assert_eq!(
            normalize_port_pair_groups(None),
            Err(SfcOrchError::PortPairGroupNotSpecified)
        );
        assert_eq!(normalize_port_pair_groups(Some(vec![a, a])).unwrap(), vec![a]);
        assert_eq!(normalize_string(None), "");
    }

    #[test]
    fn test_locality() {
        let (i, e) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let host = |id, h: Option<&str>| PortBinding::new(id, h.map(str::to_string));

        assert!(check_ingress_egress_locality(&host(i, Some("h1")), &host(e, Some("h1"))).is_ok());
        assert_eq!(
            check_ingress_egress_locality(&host(i, None), &host(e, Some("h1"))),
            Err(SfcOrchError::PortPairIngressNoHost { ingress: i })
        );
        assert_eq!(
            check_ingress_egress_locality(&host(i, Some("h1")), &host(e, Some(""))),
            Err(SfcOrchError::PortPairEgressNoHost { egress: e })
        );
        assert_eq!(
            check_ingress_egress_locality(&host(i, Some("h1")), &host(e, Some("h2"))),
            Err(SfcOrchError::PortPairIngressEgressDifferentHost { ingress: i, egress: e })
        );
    }

    #[test]
    fn test_ingress_egress_uniqueness() {
        let pair = PortPair {
            id: Uuid::from_u128(10),
            tenant_id: "t1".into(),
            name: String::new(),
            description: String::new(),
            ingress: Uuid::from_u128(1),
            egress: Uuid::from_u128(2),
            service_function_parameters: ParameterMap::new(),
        };
        let pairs = [pair];

        assert_eq!(
            check_ingress_egress_uniqueness(&pairs, Uuid::from_u128(1), Uuid::from_u128(2)),
            Err(SfcOrchError::PortPairIngressEgressInUse {
                ingress: Uuid::from_u128(1),
                egress: Uuid::from_u128(2),
                id: Uuid::from_u128(10),
            })
        );
        // Swapped direction is a different pair.
        assert!(check_ingress_egress_uniqueness(&pairs, Uuid::from_u128(2), Uuid::from_u128(1)).is_ok());
    }

    #[test]
    fn test_flow_classifier_exclusivity() {
        let chains = [chain(100, &[1], &[7])];
        let fc = Uuid::from_u128(7);

        assert_eq!(
            check_flow_classifier_exclusivity(&chains, fc, Uuid::from_u128(200)),
            Err(SfcOrchError::PortChainFlowClassifierInConflict {
                fc_id: fc,
                chain_id: Uuid::from_u128(200),
                owner_chain_id: Uuid::from_u128(100),
            })
        );
        assert!(check_flow_classifier_exclusivity(&chains, fc, Uuid::from_u128(100)).is_ok());
    }

    #[test]
    fn test_group_membership() {
        let chains = [chain(100, &[1, 2], &[])];
        let requested = [Uuid::from_u128(3), Uuid::from_u128(2), Uuid::from_u128(1)];

        assert_eq!(
            check_port_pair_group_membership(&chains, &requested, Uuid::from_u128(200)),
            Err(SfcOrchError::PortPairGroupsInUse {
                port_pair_groups: vec![Uuid::from_u128(2), Uuid::from_u128(1)],
                port_chain: Uuid::from_u128(100),
            })
        );
        assert!(check_port_pair_group_membership(&chains, &requested, Uuid::from_u128(100)).is_ok());
    }

    #[test]
    fn test_pair_membership() {
        let group = PortPairGroup {
            id: Uuid::from_u128(50),
            tenant_id: "t1".into(),
            name: String::new(),
            description: String::new(),
            port_pairs: vec![Uuid::from_u128(5)],
        };
        let groups = [group];

        assert_eq!(
            check_port_pair_membership(&groups, Uuid::from_u128(5), Uuid::from_u128(60)),
            Err(SfcOrchError::PortPairInUse { id: Uuid::from_u128(5) })
        );
        assert!(check_port_pair_membership(&groups, Uuid::from_u128(5), Uuid::from_u128(50)).is_ok());
        assert!(check_port_pair_membership(&groups, Uuid::from_u128(6), Uuid::from_u128(60)).is_ok());
    }
}
