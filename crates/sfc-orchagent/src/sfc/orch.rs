//! Chain orchestration logic.

use super::driver::{SfcDriverContext, SfcDriverManager};
use super::error::SfcOrchError;
use super::store::SfcStore;
use super::types::{
    PortBinding, PortChain, PortChainRequest, PortChainUpdate, PortPair, PortPairGroup,
    PortPairGroupRequest, PortPairGroupUpdate, PortPairRequest, PortPairUpdate, ResourceKind,
    SfcContext, SfcOperation,
};
use super::validation::{self, ParameterPolicy};
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::config::QuotaConfig;
use serde::Serialize;
use sfc_orch_common::{ListQuery, OperationTracker, Rejection, Row};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, warn};
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, SfcOrchError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfcOrchConfig {
    pub quotas: QuotaConfig,
    pub chain_parameters: ParameterPolicy,
    pub service_function_parameters: ParameterPolicy,
}

impl Default for SfcOrchConfig {
    fn default() -> Self {
        Self {
            quotas: QuotaConfig::default(),
            chain_parameters: ParameterPolicy::chain_default(),
            service_function_parameters: ParameterPolicy::service_function_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SfcOrchStats {
    pub port_chains_created: u64,
    pub port_chains_updated: u64,
    pub port_chains_deleted: u64,
    pub port_pair_groups_created: u64,
    pub port_pair_groups_updated: u64,
    pub port_pair_groups_deleted: u64,
    pub port_pairs_created: u64,
    pub port_pairs_updated: u64,
    pub port_pairs_deleted: u64,
    pub rejected_validation: u64,
    pub rejected_persistence: u64,
    pub rejected_by_driver: u64,
    /// Creates rolled back after a driver failure.
    pub compensations: u64,
    /// Rollbacks whose compensating driver delete failed as well.
    pub compensation_failures: u64,
}

impl SfcOrchStats {
    fn record_success(&mut self, kind: ResourceKind, operation: SfcOperation) {
        let counter = match (kind, operation) {
            (ResourceKind::PortChain, SfcOperation::Create) => &mut self.port_chains_created,
            (ResourceKind::PortChain, SfcOperation::Update) => &mut self.port_chains_updated,
            (ResourceKind::PortChain, SfcOperation::Delete) => &mut self.port_chains_deleted,
            (ResourceKind::PortPairGroup, SfcOperation::Create) => &mut self.port_pair_groups_created,
            (ResourceKind::PortPairGroup, SfcOperation::Update) => &mut self.port_pair_groups_updated,
            (ResourceKind::PortPairGroup, SfcOperation::Delete) => &mut self.port_pair_groups_deleted,
            (ResourceKind::PortPair, SfcOperation::Create) => &mut self.port_pairs_created,
            (ResourceKind::PortPair, SfcOperation::Update) => &mut self.port_pairs_updated,
            (ResourceKind::PortPair, SfcOperation::Delete) => &mut self.port_pairs_deleted,
        };
        *counter = counter.saturating_add(1);
    }

    fn record_rejection(&mut self, rejection: Rejection) {
        let counter = match rejection {
            Rejection::RejectedValidation => &mut self.rejected_validation,
            Rejection::RejectedPersistence => &mut self.rejected_persistence,
            Rejection::RejectedByDriver => &mut self.rejected_by_driver,
        };
        *counter = counter.saturating_add(1);
    }
}

/// Lookups served by the core network service.
pub trait SfcNetworkCallbacks: Send + Sync {
    /// Port and its host binding, or `None` if the port does not exist.
    fn get_port(&self, id: &Uuid) -> Option<PortBinding>;

    fn flow_classifier_exists(&self, id: &Uuid) -> bool;
}

/// Lifecycle orchestrator for port pairs, port pair groups and port chains.
///
/// Mutating operations run `Validating -> Persisting -> Dispatching ->
/// Committed`. A driver failure is compensated per verb:
///
/// - create: compensating driver delete, then the row is removed;
/// - update: nothing is undone, the new state stays stored;
/// - delete: drivers run before the row is removed, so the row is kept.
///
/// While a create or delete is being dispatched its row is pending, and any
/// operation that would reference, update or delete that row fails with
/// `OperationInProgress`.
pub struct SfcOrch {
    config: SfcOrchConfig,
    store: SfcStore,
    drivers: SfcDriverManager,
    network: Arc<dyn SfcNetworkCallbacks>,
    stats: Mutex<SfcOrchStats>,
}

impl SfcOrch {
    pub fn new(
        config: SfcOrchConfig,
        drivers: SfcDriverManager,
        network: Arc<dyn SfcNetworkCallbacks>,
    ) -> Self {
        Self {
            config,
            store: SfcStore::new(),
            drivers,
            network,
            stats: Mutex::new(SfcOrchStats::default()),
        }
    }

    pub fn stats(&self) -> SfcOrchStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ---- port pairs ----

    pub async fn create_port_pair(&self, request: PortPairRequest) -> Result<PortPair> {
        let mut tracker = OperationTracker::new("create_port_pair");
        let result = self.try_create_port_pair(&mut tracker, request).await;
        self.finish(tracker, ResourceKind::PortPair, SfcOperation::Create, result)
    }

    pub async fn update_port_pair(&self, id: Uuid, update: PortPairUpdate) -> Result<PortPair> {
        let mut tracker = OperationTracker::new("update_port_pair").with_object_id(id.to_string());
        let result = self.try_update_port_pair(&mut tracker, id, update).await;
        self.finish(tracker, ResourceKind::PortPair, SfcOperation::Update, result)
    }

    pub async fn delete_port_pair(&self, id: Uuid) -> Result<()> {
        let mut tracker = OperationTracker::new("delete_port_pair").with_object_id(id.to_string());
        let result = self.try_delete_port_pair(&mut tracker, id).await;
        self.finish(tracker, ResourceKind::PortPair, SfcOperation::Delete, result)
    }

    pub fn get_port_pair(&self, id: Uuid) -> Result<PortPair> {
        self.store.get_port_pair(&id)
    }

    pub fn list_port_pairs(&self, query: &ListQuery) -> Result<Vec<Row>> {
        self.store.list_port_pairs(query)
    }

    async fn try_create_port_pair(
        &self,
        tracker: &mut OperationTracker,
        request: PortPairRequest,
    ) -> Result<PortPair> {
        let pair = self.build_port_pair(request)?;
        tracker.set_object_id(pair.id.to_string());

        tracker.persisting();
        let limit = self.config.quotas.limit(ResourceKind::PortPair);
        self.store.transaction(|t| {
            t.check_quota(ResourceKind::PortPair, &pair.tenant_id, limit)?;
            validation::check_ingress_egress_uniqueness(
                t.port_pairs.values(),
                pair.ingress,
                pair.egress,
            )?;
            t.port_pairs.insert(pair.id, pair.clone());
            t.mark_pending(pair.id, SfcOperation::Create);
            Ok(())
        })?;

        tracker.dispatching();
        self.dispatch_create(SfcDriverContext::PortPair(SfcContext::new(pair.clone())))
            .await?;
        Ok(pair)
    }

    fn build_port_pair(&self, request: PortPairRequest) -> Result<PortPair> {
        let service_function_parameters = validation::normalize_service_function_parameters(
            request.service_function_parameters,
            &self.config.service_function_parameters,
        )?;

        let ingress = self.resolve_port(request.ingress)?;
        let egress = self.resolve_port(request.egress)?;
        validation::check_ingress_egress_locality(&ingress, &egress)?;

        Ok(PortPair {
            id: Uuid::new_v4(),
            tenant_id: request.tenant_id,
            name: validation::normalize_string(request.name),
            description: validation::normalize_string(request.description),
            ingress: request.ingress,
            egress: request.egress,
            service_function_parameters,
        })
    }

    fn resolve_port(&self, id: Uuid) -> Result<PortBinding> {
        self.network
            .get_port(&id)
            .ok_or(SfcOrchError::PortPairPortNotFound { id })
    }

    async fn try_update_port_pair(
        &self,
        tracker: &mut OperationTracker,
        id: Uuid,
        update: PortPairUpdate,
    ) -> Result<PortPair> {
        self.store.get_port_pair(&id)?;

        tracker.persisting();
        let (original, updated) = self.store.transaction(|t| {
            let original = t.port_pair(&id)?.clone();
            t.check_settled(ResourceKind::PortPair, &id)?;
            let mut updated = original.clone();
            if let Some(name) = update.name {
                updated.name = name;
            }
            if let Some(description) = update.description {
                updated.description = description;
            }
            t.port_pairs
                .replace(id, updated.clone())
                .map_err(|_| SfcOrchError::PortPairNotFound { id })?;
            Ok((original, updated))
        })?;

        tracker.dispatching();
        self.dispatch_update(SfcDriverContext::PortPair(SfcContext::with_original(
            updated.clone(),
            original,
        )))
        .await?;
        Ok(updated)
    }

    async fn try_delete_port_pair(&self, tracker: &mut OperationTracker, id: Uuid) -> Result<()> {
        self.store.get_port_pair(&id)?;

        tracker.persisting();
        let pair = self.store.transaction(|t| {
            let pair = t.port_pair(&id)?.clone();
            t.check_settled(ResourceKind::PortPair, &id)?;
            if t.port_pair_owner(&id).is_some() {
                return Err(SfcOrchError::PortPairInUse { id });
            }
            t.mark_pending(id, SfcOperation::Delete);
            Ok(pair)
        })?;

        tracker.dispatching();
        self.dispatch_delete(SfcDriverContext::PortPair(SfcContext::new(pair)))
            .await?;
        self.store
            .delete_port_pair(&id)
            .map_err(|e| self.removal_failed(ResourceKind::PortPair, id, e))?;
        Ok(())
    }

    // ---- port pair groups ----

    pub async fn create_port_pair_group(
        &self,
        request: PortPairGroupRequest,
    ) -> Result<PortPairGroup> {
        let mut tracker = OperationTracker::new("create_port_pair_group");
        let result = self.try_create_port_pair_group(&mut tracker, request).await;
        self.finish(tracker, ResourceKind::PortPairGroup, SfcOperation::Create, result)
    }

    pub async fn update_port_pair_group(
        &self,
        id: Uuid,
        update: PortPairGroupUpdate,
    ) -> Result<PortPairGroup> {
        let mut tracker =
            OperationTracker::new("update_port_pair_group").with_object_id(id.to_string());
        let result = self.try_update_port_pair_group(&mut tracker, id, update).await;
        self.finish(tracker, ResourceKind::PortPairGroup, SfcOperation::Update, result)
    }

    pub async fn delete_port_pair_group(&self, id: Uuid) -> Result<()> {
        let mut tracker =
            OperationTracker::new("delete_port_pair_group").with_object_id(id.to_string());
        let result = self.try_delete_port_pair_group(&mut tracker, id).await;
        self.finish(tracker, ResourceKind::PortPairGroup, SfcOperation::Delete, result)
    }

    pub fn get_port_pair_group(&self, id: Uuid) -> Result<PortPairGroup> {
        self.store.get_port_pair_group(&id)
    }

    pub fn list_port_pair_groups(&self, query: &ListQuery) -> Result<Vec<Row>> {
        self.store.list_port_pair_groups(query)
    }

    async fn try_create_port_pair_group(
        &self,
        tracker: &mut OperationTracker,
        request: PortPairGroupRequest,
    ) -> Result<PortPairGroup> {
        let group = PortPairGroup {
            id: Uuid::new_v4(),
            tenant_id: request.tenant_id,
            name: validation::normalize_string(request.name),
            description: validation::normalize_string(request.description),
            port_pairs: validation::normalize_id_list(request.port_pairs),
        };
        tracker.set_object_id(group.id.to_string());

        tracker.persisting();
        let limit = self.config.quotas.limit(ResourceKind::PortPairGroup);
        self.store.transaction(|t| {
            t.check_quota(ResourceKind::PortPairGroup, &group.tenant_id, limit)?;
            for pair_id in &group.port_pairs {
                t.referenced_port_pair(pair_id)?;
                validation::check_port_pair_membership(
                    t.port_pair_groups.values(),
                    *pair_id,
                    group.id,
                )?;
            }
            t.port_pair_groups.insert(group.id, group.clone());
            t.mark_pending(group.id, SfcOperation::Create);
            Ok(())
        })?;

        tracker.dispatching();
        self.dispatch_create(SfcDriverContext::PortPairGroup(SfcContext::new(group.clone())))
            .await?;
        Ok(group)
    }

    async fn try_update_port_pair_group(
        &self,
        tracker: &mut OperationTracker,
        id: Uuid,
        update: PortPairGroupUpdate,
    ) -> Result<PortPairGroup> {
        self.store.get_port_pair_group(&id)?;
        let port_pairs = update
            .port_pairs
            .map(|pairs| validation::normalize_id_list(Some(pairs)));

        tracker.persisting();
        let (original, updated) = self.store.transaction(|t| {
            let original = t.port_pair_group(&id)?.clone();
            t.check_settled(ResourceKind::PortPairGroup, &id)?;
            let mut updated = original.clone();
            if let Some(name) = update.name {
                updated.name = name;
            }
            if let Some(description) = update.description {
                updated.description = description;
            }
            if let Some(port_pairs) = port_pairs {
                for pair_id in &port_pairs {
                    t.referenced_port_pair(pair_id)?;
                    validation::check_port_pair_membership(
                        t.port_pair_groups.values(),
                        *pair_id,
                        id,
                    )?;
                }
                updated.port_pairs = port_pairs;
            }
            t.port_pair_groups
                .replace(id, updated.clone())
                .map_err(|_| SfcOrchError::PortPairGroupNotFound { id })?;
            Ok((original, updated))
        })?;

        tracker.dispatching();
        self.dispatch_update(SfcDriverContext::PortPairGroup(SfcContext::with_original(
            updated.clone(),
            original,
        )))
        .await?;
        Ok(updated)
    }

    async fn try_delete_port_pair_group(
        &self,
        tracker: &mut OperationTracker,
        id: Uuid,
    ) -> Result<()> {
        self.store.get_port_pair_group(&id)?;

        tracker.persisting();
        let group = self.store.transaction(|t| {
            let group = t.port_pair_group(&id)?.clone();
            t.check_settled(ResourceKind::PortPairGroup, &id)?;
            if t.port_pair_group_owner(&id).is_some() {
                return Err(SfcOrchError::PortPairGroupInUse { id });
            }
            t.mark_pending(id, SfcOperation::Delete);
            Ok(group)
        })?;

        tracker.dispatching();
        self.dispatch_delete(SfcDriverContext::PortPairGroup(SfcContext::new(group)))
            .await?;
        self.store
            .delete_port_pair_group(&id)
            .map_err(|e| self.removal_failed(ResourceKind::PortPairGroup, id, e))?;
        Ok(())
    }

    // ---- port chains ----

    pub async fn create_port_chain(&self, request: PortChainRequest) -> Result<PortChain> {
        let mut tracker = OperationTracker::new("create_port_chain");
        let result = self.try_create_port_chain(&mut tracker, request).await;
        self.finish(tracker, ResourceKind::PortChain, SfcOperation::Create, result)
    }

    pub async fn update_port_chain(&self, id: Uuid, update: PortChainUpdate) -> Result<PortChain> {
        let mut tracker = OperationTracker::new("update_port_chain").with_object_id(id.to_string());
        let result = self.try_update_port_chain(&mut tracker, id, update).await;
        self.finish(tracker, ResourceKind::PortChain, SfcOperation::Update, result)
    }

    pub async fn delete_port_chain(&self, id: Uuid) -> Result<()> {
        let mut tracker = OperationTracker::new("delete_port_chain").with_object_id(id.to_string());
        let result = self.try_delete_port_chain(&mut tracker, id).await;
        self.finish(tracker, ResourceKind::PortChain, SfcOperation::Delete, result)
    }

    pub fn get_port_chain(&self, id: Uuid) -> Result<PortChain> {
        self.store.get_port_chain(&id)
    }

    pub fn list_port_chains(&self, query: &ListQuery) -> Result<Vec<Row>> {
        self.store.list_port_chains(query)
    }

    async fn try_create_port_chain(
        &self,
        tracker: &mut OperationTracker,
        request: PortChainRequest,
    ) -> Result<PortChain> {
        let chain = PortChain {
            id: Uuid::new_v4(),
            tenant_id: request.tenant_id,
            name: validation::normalize_string(request.name),
            description: validation::normalize_string(request.description),
            port_pair_groups: validation::normalize_port_pair_groups(request.port_pair_groups)?,
            flow_classifiers: self.resolve_flow_classifiers(request.flow_classifiers)?,
            chain_parameters: validation::normalize_chain_parameters(
                request.chain_parameters,
                &self.config.chain_parameters,
            )?,
        };
        tracker.set_object_id(chain.id.to_string());

        tracker.persisting();
        let limit = self.config.quotas.limit(ResourceKind::PortChain);
        self.store.transaction(|t| {
            t.check_quota(ResourceKind::PortChain, &chain.tenant_id, limit)?;
            Self::check_chain_references(t, &chain)?;
            t.port_chains.insert(chain.id, chain.clone());
            t.mark_pending(chain.id, SfcOperation::Create);
            Ok(())
        })?;

        tracker.dispatching();
        self.dispatch_create(SfcDriverContext::PortChain(SfcContext::new(chain.clone())))
            .await?;
        Ok(chain)
    }

    async fn try_update_port_chain(
        &self,
        tracker: &mut OperationTracker,
        id: Uuid,
        update: PortChainUpdate,
    ) -> Result<PortChain> {
        self.store.get_port_chain(&id)?;
        let port_pair_groups = match update.port_pair_groups {
            Some(groups) => Some(validation::normalize_port_pair_groups(Some(groups))?),
            None => None,
        };
        let flow_classifiers = match update.flow_classifiers {
            Some(fcs) => Some(self.resolve_flow_classifiers(Some(fcs))?),
            None => None,
        };

        tracker.persisting();
        let (original, updated) = self.store.transaction(|t| {
            let original = t.port_chain(&id)?.clone();
            t.check_settled(ResourceKind::PortChain, &id)?;
            let mut updated = original.clone();
            if let Some(name) = update.name {
                updated.name = name;
            }
            if let Some(description) = update.description {
                updated.description = description;
            }
            if let Some(groups) = port_pair_groups {
                updated.port_pair_groups = groups;
            }
            if let Some(fcs) = flow_classifiers {
                updated.flow_classifiers = fcs;
            }
            Self::check_chain_references(t, &updated)?;
            t.port_chains
                .replace(id, updated.clone())
                .map_err(|_| SfcOrchError::PortChainNotFound { id })?;
            Ok((original, updated))
        })?;

        tracker.dispatching();
        self.dispatch_update(SfcDriverContext::PortChain(SfcContext::with_original(
            updated.clone(),
            original,
        )))
        .await?;
        Ok(updated)
    }

    async fn try_delete_port_chain(&self, tracker: &mut OperationTracker, id: Uuid) -> Result<()> {
        self.store.get_port_chain(&id)?;

        tracker.persisting();
        let chain = self.store.transaction(|t| {
            let chain = t.port_chain(&id)?.clone();
            t.check_settled(ResourceKind::PortChain, &id)?;
            t.mark_pending(id, SfcOperation::Delete);
            Ok(chain)
        })?;

        tracker.dispatching();
        self.dispatch_delete(SfcDriverContext::PortChain(SfcContext::new(chain)))
            .await?;
        self.store
            .delete_port_chain(&id)
            .map_err(|e| self.removal_failed(ResourceKind::PortChain, id, e))?;
        Ok(())
    }

    /// Deduplicates classifier ids and checks each one exists.
    fn resolve_flow_classifiers(&self, ids: Option<Vec<Uuid>>) -> Result<Vec<Uuid>> {
        let ids = validation::normalize_id_list(ids);
        if let Some(missing) = ids.iter().find(|id| !self.network.flow_classifier_exists(id)) {
            return Err(SfcOrchError::FlowClassifierNotFound { id: *missing });
        }
        Ok(ids)
    }

    /// Groups must exist and be free; classifiers must not be bound elsewhere.
    fn check_chain_references(t: &super::store::SfcTables, chain: &PortChain) -> Result<()> {
        for group_id in &chain.port_pair_groups {
            t.referenced_port_pair_group(group_id)?;
        }
        validation::check_port_pair_group_membership(
            t.port_chains.values(),
            &chain.port_pair_groups,
            chain.id,
        )?;
        for fc_id in &chain.flow_classifiers {
            validation::check_flow_classifier_exclusivity(t.port_chains.values(), *fc_id, chain.id)?;
        }
        Ok(())
    }

    // ---- dispatch policies ----

    /// Dispatches a create; on failure rolls the create back and returns the failure.
    async fn dispatch_create(&self, context: SfcDriverContext) -> Result<()> {
        match self.drivers.dispatch(SfcOperation::Create, &context).await {
            Ok(()) => {
                self.store.settle(&context.resource_id());
                Ok(())
            }
            Err(e) => {
                self.compensate_create(&context, &e).await;
                Err(e)
            }
        }
    }

    /// Best-effort undo of a create: driver delete, then the row goes.
    async fn compensate_create(&self, context: &SfcDriverContext, cause: &SfcOrchError) {
        let kind = context.kind();
        let id = context.resource_id();
        let method = SfcOperation::Delete.method_name(kind);

        let outcome = self.drivers.dispatch(SfcOperation::Delete, context).await;
        self.store.discard(kind, &id);

        let record = AuditRecord::new(AuditCategory::DriverOperation, "SfcOrch", method.as_str())
            .with_object_id(id.to_string())
            .with_object_type(kind.as_str())
            .with_correlation_id(id.to_string())
            .with_details(serde_json::json!({
                "compensation": true,
                "cause": cause.to_string(),
            }));

        match outcome {
            Ok(()) => {
                self.with_stats(|s| s.compensations = s.compensations.saturating_add(1));
                audit_log!(record.with_outcome(AuditOutcome::Success));
            }
            Err(e) => {
                error!(
                    kind = %kind,
                    id = %id,
                    error = %e,
                    "Compensating delete failed; backend may hold a stale {}",
                    kind
                );
                self.with_stats(|s| {
                    s.compensations = s.compensations.saturating_add(1);
                    s.compensation_failures = s.compensation_failures.saturating_add(1);
                });
                audit_log!(record.with_error(e.to_string()));
            }
        }
    }

    /// Dispatches an update; a failure leaves the new state stored.
    async fn dispatch_update(&self, context: SfcDriverContext) -> Result<()> {
        self.drivers
            .dispatch(SfcOperation::Update, &context)
            .await
            .map_err(|e| {
                warn!(
                    kind = %context.kind(),
                    id = %context.resource_id(),
                    error = %e,
                    "Update not applied by driver; stored state kept"
                );
                e
            })
    }

    /// Dispatches a delete; a failure keeps the row and releases it again.
    async fn dispatch_delete(&self, context: SfcDriverContext) -> Result<()> {
        let result = self.drivers.dispatch(SfcOperation::Delete, &context).await;
        if let Err(e) = &result {
            self.store.settle(&context.resource_id());
            warn!(
                kind = %context.kind(),
                id = %context.resource_id(),
                error = %e,
                "Delete not applied by driver; record kept"
            );
        }
        result
    }

    fn removal_failed(&self, kind: ResourceKind, id: Uuid, e: SfcOrchError) -> SfcOrchError {
        self.store.settle(&id);
        error!(
            kind = %kind,
            id = %id,
            error = %e,
            "Drivers deleted the resource but the record could not be removed"
        );
        e
    }

    // ---- bookkeeping ----

    fn finish<T: Serialize>(
        &self,
        mut tracker: OperationTracker,
        kind: ResourceKind,
        operation: SfcOperation,
        result: Result<T>,
    ) -> Result<T> {
        let category = match operation {
            SfcOperation::Create => AuditCategory::ResourceCreate,
            SfcOperation::Update => AuditCategory::ResourceModify,
            SfcOperation::Delete => AuditCategory::ResourceDelete,
        };
        let mut record = AuditRecord::new(category, "SfcOrch", tracker.operation())
            .with_object_type(kind.as_str());
        if let Some(id) = tracker.object_id() {
            record = record.with_object_id(id).with_correlation_id(id);
        }

        match result {
            Ok(value) => {
                tracker.commit();
                self.with_stats(|s| s.record_success(kind, operation));
                if let Some(details) = serde_json::to_value(&value).ok().filter(|v| !v.is_null()) {
                    record = record.with_details(details);
                }
                audit_log!(record.with_outcome(AuditOutcome::Success));
                Ok(value)
            }
            Err(e) => {
                let rejection = tracker.reject();
                self.with_stats(|s| s.record_rejection(rejection));
                let outcome = if rejection.is_side_effect_free() {
                    AuditOutcome::Denied
                } else {
                    AuditOutcome::Failure
                };
                audit_log!(record
                    .with_error(e.to_string())
                    .with_outcome(outcome)
                    .with_details(serde_json::json!({
                        "rejection": rejection.as_str(),
                        "kind": e.kind().as_str(),
                    })));
                Err(e)
            }
        }
    }

    fn with_stats(&self, f: impl FnOnce(&mut SfcOrchStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }
}
