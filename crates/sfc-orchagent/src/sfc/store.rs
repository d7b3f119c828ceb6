//! Resource store.
//!
//! One table per resource kind, ordered by id, behind a single mutex. Writes go
//! through [`SfcStore::transaction`], which journals every write and undoes
//! them all when the closure fails.
//!
//! A row whose create or delete is still being dispatched to drivers is
//! marked pending. Pending rows cannot be referenced, updated or deleted
//! until the mark is settled.

use super::error::SfcOrchError;
use super::types::{PortChain, PortPair, PortPairGroup, ResourceKind, SfcOperation};
use sfc_orch_common::{ListQuery, Row, SyncMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct SfcTables {
    pub port_pairs: SyncMap<Uuid, PortPair>,
    pub port_pair_groups: SyncMap<Uuid, PortPairGroup>,
    pub port_chains: SyncMap<Uuid, PortChain>,
    /// Rows with a create or delete in flight.
    pending: SyncMap<Uuid, SfcOperation>,
}

impl SfcTables {
    pub fn port_pair(&self, id: &Uuid) -> Result<&PortPair, SfcOrchError> {
        self.port_pairs
            .get(id)
            .ok_or(SfcOrchError::PortPairNotFound { id: *id })
    }

    pub fn port_pair_group(&self, id: &Uuid) -> Result<&PortPairGroup, SfcOrchError> {
        self.port_pair_groups
            .get(id)
            .ok_or(SfcOrchError::PortPairGroupNotFound { id: *id })
    }

    pub fn port_chain(&self, id: &Uuid) -> Result<&PortChain, SfcOrchError> {
        self.port_chains
            .get(id)
            .ok_or(SfcOrchError::PortChainNotFound { id: *id })
    }

    /// A port pair that a group may reference: stored and not pending.
    pub fn referenced_port_pair(&self, id: &Uuid) -> Result<&PortPair, SfcOrchError> {
        let pair = self.port_pair(id)?;
        self.check_settled(ResourceKind::PortPair, id)?;
        Ok(pair)
    }

    /// A port pair group that a chain may reference: stored and not pending.
    pub fn referenced_port_pair_group(&self, id: &Uuid) -> Result<&PortPairGroup, SfcOrchError> {
        let group = self.port_pair_group(id)?;
        self.check_settled(ResourceKind::PortPairGroup, id)?;
        Ok(group)
    }

    /// Fails with `OperationInProgress` while a create or delete of `id` is in flight.
    pub fn check_settled(&self, kind: ResourceKind, id: &Uuid) -> Result<(), SfcOrchError> {
        match self.pending.get(id) {
            Some(_) => Err(SfcOrchError::OperationInProgress { resource: kind, id: *id }),
            None => Ok(()),
        }
    }

    pub fn pending_operation(&self, id: &Uuid) -> Option<SfcOperation> {
        self.pending.get(id).copied()
    }

    pub fn mark_pending(&mut self, id: Uuid, operation: SfcOperation) {
        self.pending.insert(id, operation);
    }

    pub fn settle(&mut self, id: &Uuid) {
        self.pending.remove(id);
    }

    /// Group that holds the port pair, if any.
    pub fn port_pair_owner(&self, pair_id: &Uuid) -> Option<Uuid> {
        self.port_pair_groups
            .values()
            .find(|g| g.contains_port_pair(pair_id))
            .map(|g| g.id)
    }

    /// Chain that holds the port pair group, if any.
    pub fn port_pair_group_owner(&self, group_id: &Uuid) -> Option<Uuid> {
        self.port_chains
            .values()
            .find(|c| c.contains_port_pair_group(group_id))
            .map(|c| c.id)
    }

    /// Chain the flow classifier is bound to, if any.
    pub fn flow_classifier_owner(&self, fc_id: &Uuid) -> Option<Uuid> {
        self.port_chains
            .values()
            .find(|c| c.contains_flow_classifier(fc_id))
            .map(|c| c.id)
    }

    pub fn tenant_count(&self, kind: ResourceKind, tenant_id: &str) -> usize {
        match kind {
            ResourceKind::PortChain => self
                .port_chains
                .values()
                .filter(|c| c.tenant_id == tenant_id)
                .count(),
            ResourceKind::PortPairGroup => self
                .port_pair_groups
                .values()
                .filter(|g| g.tenant_id == tenant_id)
                .count(),
            ResourceKind::PortPair => self
                .port_pairs
                .values()
                .filter(|p| p.tenant_id == tenant_id)
                .count(),
        }
    }

    /// Fails with `QuotaExceeded` when the tenant already holds `limit` records.
    pub fn check_quota(
        &self,
        kind: ResourceKind,
        tenant_id: &str,
        limit: Option<usize>,
    ) -> Result<(), SfcOrchError> {
        match limit {
            Some(limit) if self.tenant_count(kind, tenant_id) >= limit => {
                Err(SfcOrchError::QuotaExceeded {
                    resource: kind,
                    tenant_id: tenant_id.to_string(),
                    limit,
                })
            }
            _ => Ok(()),
        }
    }

    /// Removes a record of any kind and its pending mark; absent ids are ignored.
    pub fn discard(&mut self, kind: ResourceKind, id: &Uuid) {
        self.pending.remove(id);
        match kind {
            ResourceKind::PortChain => {
                self.port_chains.remove(id);
            }
            ResourceKind::PortPairGroup => {
                self.port_pair_groups.remove(id);
            }
            ResourceKind::PortPair => {
                self.port_pairs.remove(id);
            }
        }
    }

    fn begin(&mut self) {
        self.port_pairs.begin();
        self.port_pair_groups.begin();
        self.port_chains.begin();
        self.pending.begin();
    }

    fn commit(&mut self) {
        self.port_pairs.commit();
        self.port_pair_groups.commit();
        self.port_chains.commit();
        self.pending.commit();
    }

    fn rollback(&mut self) {
        self.port_pairs.rollback();
        self.port_pair_groups.rollback();
        self.port_chains.rollback();
        self.pending.rollback();
    }
}

/// Shared, transactional resource store.
#[derive(Debug, Default)]
pub struct SfcStore {
    tables: Mutex<SfcTables>,
}

impl SfcStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the tables as one all-or-nothing write.
    ///
    /// Writes are journaled and rolled back if `f` returns an error, so a
    /// failed closure leaves nothing behind. The lock is held for the whole
    /// closure, so checks and writes inside it are serialized.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, SfcOrchError>
    where
        F: FnOnce(&mut SfcTables) -> Result<T, SfcOrchError>,
    {
        let mut tables = self.lock();
        tables.begin();
        match f(&mut tables) {
            Ok(value) => {
                tables.commit();
                Ok(value)
            }
            Err(e) => {
                tables.rollback();
                Err(e)
            }
        }
    }

    /// Runs a read-only closure against the live tables.
    pub fn read<T>(&self, f: impl FnOnce(&SfcTables) -> T) -> T {
        f(&self.lock())
    }

    pub fn get_port_pair(&self, id: &Uuid) -> Result<PortPair, SfcOrchError> {
        self.read(|t| t.port_pair(id).cloned())
    }

    pub fn get_port_pair_group(&self, id: &Uuid) -> Result<PortPairGroup, SfcOrchError> {
        self.read(|t| t.port_pair_group(id).cloned())
    }

    pub fn get_port_chain(&self, id: &Uuid) -> Result<PortChain, SfcOrchError> {
        self.read(|t| t.port_chain(id).cloned())
    }

    pub fn list_port_pairs(&self, query: &ListQuery) -> Result<Vec<Row>, SfcOrchError> {
        self.read(|t| query.apply(t.port_pairs.values()))
            .map_err(|e| SfcOrchError::from_query(ResourceKind::PortPair, e))
    }

    pub fn list_port_pair_groups(&self, query: &ListQuery) -> Result<Vec<Row>, SfcOrchError> {
        self.read(|t| query.apply(t.port_pair_groups.values()))
            .map_err(|e| SfcOrchError::from_query(ResourceKind::PortPairGroup, e))
    }

    pub fn list_port_chains(&self, query: &ListQuery) -> Result<Vec<Row>, SfcOrchError> {
        self.read(|t| query.apply(t.port_chains.values()))
            .map_err(|e| SfcOrchError::from_query(ResourceKind::PortChain, e))
    }

    /// Removes a port pair unless a group still references it.
    pub fn delete_port_pair(&self, id: &Uuid) -> Result<PortPair, SfcOrchError> {
        self.transaction(|t| {
            t.port_pair(id)?;
            if t.port_pair_owner(id).is_some() {
                return Err(SfcOrchError::PortPairInUse { id: *id });
            }
            t.settle(id);
            t.port_pairs
                .remove(id)
                .ok_or(SfcOrchError::PortPairNotFound { id: *id })
        })
    }

    /// Removes a port pair group unless a chain still references it.
    pub fn delete_port_pair_group(&self, id: &Uuid) -> Result<PortPairGroup, SfcOrchError> {
        self.transaction(|t| {
            t.port_pair_group(id)?;
            if t.port_pair_group_owner(id).is_some() {
                return Err(SfcOrchError::PortPairGroupInUse { id: *id });
            }
            t.settle(id);
            t.port_pair_groups
                .remove(id)
                .ok_or(SfcOrchError::PortPairGroupNotFound { id: *id })
        })
    }

    pub fn delete_port_chain(&self, id: &Uuid) -> Result<PortChain, SfcOrchError> {
        self.transaction(|t| {
            t.settle(id);
            t.port_chains
                .remove(id)
                .ok_or(SfcOrchError::PortChainNotFound { id: *id })
        })
    }

    /// Drops a record unconditionally; used to undo a create.
    ///
    /// The row is still pending from its create, so nothing can reference it.
    pub fn discard(&self, kind: ResourceKind, id: &Uuid) {
        self.lock().discard(kind, id);
    }

    /// Clears the pending mark of `id` once its driver dispatch is over.
    pub fn settle(&self, id: &Uuid) {
        self.lock().settle(id);
    }

    fn lock(&self) -> MutexGuard<'_, SfcTables> {
        self.tables.lock().unwrap_or_else(|poisoned| {
            // A closure panicked mid-transaction; undo its partial writes.
            let mut tables = poisoned.into_inner();
            tables.rollback();
            tables
        })
    }
}
