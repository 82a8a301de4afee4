//! Colony tuning knobs. Everything the coordinators treat as policy
//! rather than mechanism lives here, so scenarios can override it.

use crate::id::ResourceTypeId;
use crate::world::AgentClass;
use serde::{Deserialize, Serialize};

/// Tunable parameters shared by every coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColonyConfig {
    /// The resource producers store and spend on production and renewal.
    pub refuel_resource: ResourceTypeId,

    /// Bound on each room's harvest queue.
    pub harvest_queue_capacity: usize,
    /// Units an agent gathers from an adjacent node per tick.
    pub harvest_rate: u32,

    /// Per-room cap on couriers, counting units still in production.
    pub max_couriers: usize,
    pub courier_capacity: u32,
    /// Refuel cost of producing one courier.
    pub courier_cost: u32,

    /// Refuel cost and carry capacity of one maintenance unit.
    pub maintenance_cost: u32,
    pub maintenance_capacity: u32,

    /// Lifespan granted to produced agents.
    pub agent_ttl: u32,
    /// Hard ceiling renewal can never push a lifespan past.
    pub ttl_cap: u32,
    /// Ticks a producer is occupied per produced unit.
    pub production_ticks: u32,

    /// Lifespan below which agents seek renewal.
    pub renewal_threshold: u32,
    /// Lifespan at which a renewing agent leaves the queue satisfied.
    pub renewal_target: u32,
    /// Lifespan granted per renewal step.
    pub renewal_ttl_gain: u32,
    /// Renewal cost is `max(1, capacity / renewal_cost_divisor)`.
    pub renewal_cost_divisor: u32,
    /// Classes that never renew.
    pub renewal_excluded: Vec<AgentClass>,

    /// Durability ceiling for surface improvements.
    pub improvement_max: u32,
    /// Durability lost by every improvement per tick.
    pub improvement_decay: u32,

    /// Ring-buffer capacity per event kind.
    pub event_capacity: usize,
}

impl Default for ColonyConfig {
    fn default() -> Self {
        Self {
            refuel_resource: ResourceTypeId(0),
            harvest_queue_capacity: 64,
            harvest_rate: 2,
            max_couriers: 3,
            courier_capacity: 50,
            courier_cost: 20,
            maintenance_cost: 15,
            maintenance_capacity: 30,
            agent_ttl: 300,
            ttl_cap: 360,
            production_ticks: 3,
            renewal_threshold: 60,
            renewal_target: 240,
            renewal_ttl_gain: 40,
            renewal_cost_divisor: 8,
            renewal_excluded: vec![AgentClass::Upkeep, AgentClass::Maintenance],
            improvement_max: 100,
            improvement_decay: 1,
            event_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_coherent() {
        let cfg = ColonyConfig::default();
        assert!(cfg.renewal_target <= cfg.ttl_cap);
        assert!(cfg.renewal_threshold < cfg.renewal_target);
        assert!(cfg.harvest_queue_capacity > 0);
        assert!(cfg.production_ticks > 0);
    }

    #[test]
    fn upkeep_and_maintenance_never_renew_by_default() {
        let cfg = ColonyConfig::default();
        assert!(cfg.renewal_excluded.contains(&AgentClass::Upkeep));
        assert!(cfg.renewal_excluded.contains(&AgentClass::Maintenance));
        assert!(!cfg.renewal_excluded.contains(&AgentClass::Worker));
    }
}
