//! Priority routing
//!
//! Resolved once per configuration load and read-only during a cycle.

use super::ChannelId;
use crate::config::{ChannelsConfig, RoutingConfig};
use crate::domain::Priority;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Priority to ordered channel list, filtered by enable flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    routes: BTreeMap<Priority, Vec<ChannelId>>,
}

impl RoutingTable {
    /// Resolve raw routing lists
    ///
    /// Unknown identifiers are dropped and logged; disabled channels are
    /// dropped; duplicates keep their first position.
    pub fn from_config(routing: &RoutingConfig, channels: &ChannelsConfig) -> Self {
        let mut routes = BTreeMap::new();

        for priority in Priority::ALL {
            let mut resolved: Vec<ChannelId> = Vec::new();
            for raw in routing.list(priority) {
                match raw.parse::<ChannelId>() {
                    Ok(id) if !channels.is_enabled(id) => {
                        log::debug!("Routing {} -> {}: channel disabled", priority, id);
                    }
                    Ok(id) if resolved.contains(&id) => {}
                    Ok(id) => resolved.push(id),
                    Err(e) => log::warn!("Routing {}: {}, ignoring", priority, e),
                }
            }
            routes.insert(priority, resolved);
        }

        Self { routes }
    }

    /// Ordered channels for a priority
    pub fn route(&self, priority: Priority) -> &[ChannelId] {
        self.routes
            .get(&priority)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All routes, highest priority first
    pub fn routes(&self) -> &BTreeMap<Priority, Vec<ChannelId>> {
        &self.routes
    }
}
