//! Static port and flow classifier inventory.
//!
//! Stands in for the core network service when the agent runs standalone:
//! ports and classifiers are declared up front in the `[inventory]` section
//! of the configuration.

use crate::config::InventoryConfig;
use crate::sfc::{PortBinding, SfcNetworkCallbacks};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    ports: HashMap<Uuid, PortBinding>,
    flow_classifiers: HashSet<Uuid>,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &InventoryConfig) -> Self {
        let mut inventory = Self::new();
        for port in &config.ports {
            inventory = inventory.with_port(port.id, port.host.as_deref());
        }
        for fc in &config.flow_classifiers {
            inventory = inventory.with_flow_classifier(*fc);
        }
        inventory
    }

    pub fn with_port(mut self, id: Uuid, host: Option<&str>) -> Self {
        self.ports
            .insert(id, PortBinding::new(id, host.map(str::to_string)));
        self
    }

    pub fn with_flow_classifier(mut self, id: Uuid) -> Self {
        self.flow_classifiers.insert(id);
        self
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn flow_classifier_count(&self) -> usize {
        self.flow_classifiers.len()
    }
}

impl SfcNetworkCallbacks for StaticInventory {
    fn get_port(&self, id: &Uuid) -> Option<PortBinding> {
        self.ports.get(id).cloned()
    }

    fn flow_classifier_exists(&self, id: &Uuid) -> bool {
        self.flow_classifiers.contains(id)
    }
}
