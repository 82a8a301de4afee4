//! Renewal queues: strict per-producer FIFO access to the scarce refuel
//! resource, with a flat membership map for O(1) lookups.
//!
//! Fairness is the whole point here. Only the head of a producer's queue
//! may renew, regardless of how well-stocked the producer is for anyone
//! behind it; there is no preemption and no migration to another producer
//! once bound.

use crate::config::ColonyConfig;
use crate::grid::Position;
use crate::id::{AgentId, RoomId, StructureId};
use crate::world::{Agent, StructureKind, World};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Refuel cost of one renewal step for an agent.
pub fn renewal_cost(agent: &Agent, config: &ColonyConfig) -> u32 {
    (agent.capacity / config.renewal_cost_divisor.max(1)).max(1)
}

/// Per-producer FIFO renewal queues plus the agent-to-producer index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenewalCoordinator {
    queues: BTreeMap<StructureId, VecDeque<AgentId>>,
    membership: BTreeMap<AgentId, StructureId>,
}

impl RenewalCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The nearest producer to `pos` in `room`, by Chebyshev distance with
    /// arena order breaking ties.
    pub fn nearest_producer(world: &World, room: RoomId, pos: Position) -> Option<StructureId> {
        world
            .structures()
            .filter(|(_, s)| s.room == room && matches!(s.kind, StructureKind::Producer { .. }))
            .min_by_key(|(_, s)| pos.chebyshev(s.pos))
            .map(|(id, _)| id)
    }

    /// Join the renewal queue of the nearest same-room producer.
    ///
    /// Idempotent: an agent already waiting gets its current position
    /// back. Returns `None` when the agent is gone or the room has no
    /// producer.
    pub fn queue_for_renewal(&mut self, world: &World, agent: AgentId) -> Option<usize> {
        if let Some(station) = self.membership.get(&agent) {
            return self.position_in(*station, agent);
        }

        let live = world.agent(agent)?;
        let station = Self::nearest_producer(world, live.room, live.pos)?;
        let queue = self.queues.entry(station).or_default();
        queue.push_back(agent);
        self.membership.insert(agent, station);
        Some(queue.len() - 1)
    }

    fn position_in(&self, station: StructureId, agent: AgentId) -> Option<usize> {
        self.queues
            .get(&station)
            .and_then(|q| q.iter().position(|a| *a == agent))
    }

    /// Whether the head of its bound queue may renew right now.
    ///
    /// False for excluded classes, for anyone not at the head, and while
    /// the producer is mid-production or short of the renewal cost.
    pub fn can_renew(&self, world: &World, agent: AgentId, config: &ColonyConfig) -> bool {
        let Some(live) = world.agent(agent) else {
            return false;
        };
        if config.renewal_excluded.contains(&live.class) {
            return false;
        }
        let Some(station) = self.membership.get(&agent) else {
            return false;
        };
        if self.queues.get(station).and_then(|q| q.front()) != Some(&agent) {
            return false;
        }
        if world.producer_busy(*station) {
            return false;
        }
        world.producer_store(*station) >= renewal_cost(live, config)
    }

    /// Called by the agent's driver once the lifespan target is reached.
    ///
    /// Pops the head entry when the agent is indeed at the head; anything
    /// else is a queue anomaly handled by direct removal.
    pub fn renewal_complete(&mut self, agent: AgentId) {
        let Some(station) = self.membership.remove(&agent) else {
            log::debug!("renewal_complete for an agent that was not queued");
            return;
        };
        let Some(queue) = self.queues.get_mut(&station) else {
            return;
        };
        if queue.front() == Some(&agent) {
            queue.pop_front();
        } else {
            log::warn!("renewal queue anomaly: completing agent was not at the head");
            queue.retain(|a| *a != agent);
        }
        if queue.is_empty() {
            self.queues.remove(&station);
        }
    }

    /// Drop entries whose agent or producer no longer resolves, keeping
    /// the relative order of survivors.
    pub fn reconcile(&mut self, world: &World) {
        let dead_stations: Vec<StructureId> = self
            .queues
            .keys()
            .copied()
            .filter(|s| world.structure(*s).is_none())
            .collect();
        for station in dead_stations {
            if let Some(queue) = self.queues.remove(&station) {
                for agent in queue {
                    self.membership.remove(&agent);
                }
            }
        }

        for queue in self.queues.values_mut() {
            queue.retain(|agent| world.agent(*agent).is_some());
        }
        self.membership.retain(|agent, _| world.agent(*agent).is_some());
        self.queues.retain(|_, q| !q.is_empty());
    }

    pub fn is_queued(&self, agent: AgentId) -> bool {
        self.membership.contains_key(&agent)
    }

    /// The producer an agent is bound to, if any.
    pub fn bound_station(&self, agent: AgentId) -> Option<StructureId> {
        self.membership.get(&agent).copied()
    }

    pub fn position(&self, agent: AgentId) -> Option<usize> {
        let station = self.membership.get(&agent)?;
        self.position_in(*station, agent)
    }

    pub fn queue_len(&self, station: StructureId) -> usize {
        self.queues.get(&station).map(|q| q.len()).unwrap_or(0)
    }

    /// All queued agents, for drivers that walk the waiting set.
    pub fn queued_agents(&self) -> Vec<AgentId> {
        self.queues.values().flatten().copied().collect()
    }

    /// Queue contents per producer, for the debug overlay.
    pub fn queues(&self) -> impl Iterator<Item = (StructureId, &VecDeque<AgentId>)> {
        self.queues.iter().map(|(s, q)| (*s, q))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
