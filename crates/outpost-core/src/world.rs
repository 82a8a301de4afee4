//! The live world: agent and structure arenas plus the capability layer
//! the coordinators schedule against.
//!
//! Every coordinator holds ids only; a lookup that returns `None` means the
//! entity ceased to exist and the caller treats that as cancellation. The
//! arenas are the single place live state is mutated.

use crate::grid::Position;
use crate::id::{AgentId, ResourceTypeId, RoomId, StructureId};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// What a mobile unit is for. Drivers and coordinators dispatch on this.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum AgentClass {
    /// General harvest labor.
    Worker,
    /// Hauls resources under delivery contracts.
    Courier,
    /// Station-owned harvest/repair crew.
    Upkeep,
    /// Produced against a personnel backlog, tagged with its requester.
    Maintenance,
}

/// A mobile worker unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub pos: Position,
    pub room: RoomId,
    pub class: AgentClass,
    /// Total carry capacity shared across resource types.
    pub capacity: u32,
    /// Remaining lifespan in ticks. Hits zero, the agent is removed.
    pub ttl: u32,
    /// Owner tag for maintenance units (the structure that requested them).
    #[serde(default)]
    pub tag: Option<StructureId>,
    carry: BTreeMap<ResourceTypeId, u32>,
}

impl Agent {
    pub fn held(&self, resource: ResourceTypeId) -> u32 {
        self.carry.get(&resource).copied().unwrap_or(0)
    }

    pub fn total_carried(&self) -> u32 {
        self.carry.values().sum()
    }

    pub fn free_capacity(&self) -> u32 {
        self.capacity.saturating_sub(self.total_carried())
    }

    pub fn carried_types(&self) -> Vec<ResourceTypeId> {
        self.carry.keys().copied().collect()
    }

    fn add(&mut self, resource: ResourceTypeId, amount: u32) {
        if amount > 0 {
            *self.carry.entry(resource).or_insert(0) += amount;
        }
    }

    fn remove(&mut self, resource: ResourceTypeId, amount: u32) -> u32 {
        let Some(held) = self.carry.get_mut(&resource) else {
            return 0;
        };
        let taken = amount.min(*held);
        *held -= taken;
        if *held == 0 {
            self.carry.remove(&resource);
        }
        taken
    }
}

// ---------------------------------------------------------------------------
// Structures
// ---------------------------------------------------------------------------

/// Specification handed to a producer. The produced agent becomes usable
/// the tick after production completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub class: AgentClass,
    pub capacity: u32,
    pub ttl: u32,
    pub tag: Option<StructureId>,
}

/// An in-flight production job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionJob {
    pub spec: AgentSpec,
    pub remaining: u32,
}

/// Tagged structure kinds. Dispatch is by enum match; there is no
/// inheritance between kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StructureKind {
    /// A harvestable resource node.
    ResourceNode {
        resource: ResourceTypeId,
        level: u32,
        max_level: u32,
        regen_per_tick: u32,
    },
    /// A storage bucket with a shared capacity across resource types.
    Bucket {
        store: BTreeMap<ResourceTypeId, u32>,
        capacity: u32,
    },
    /// A production station. Holds a single refuel resource and at most
    /// one production job at a time.
    Producer {
        resource: ResourceTypeId,
        store: u32,
        capacity: u32,
        production: Option<ProductionJob>,
    },
}

/// A fixed structure in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    pub pos: Position,
    pub room: RoomId,
    pub kind: StructureKind,
}

// ---------------------------------------------------------------------------
// Operation outcomes
// ---------------------------------------------------------------------------

/// Why a transfer or withdrawal moved nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("transfer target no longer exists")]
    TargetMissing,
    #[error("transfer target has no remaining space")]
    TargetFull,
    #[error("target does not accept this resource")]
    Incompatible,
}

/// Why production could not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProduceError {
    #[error("producer no longer exists")]
    Missing,
    #[error("structure is not a producer")]
    NotProducer,
    #[error("producer is already mid-production")]
    Busy,
    #[error("producer store cannot cover the production cost")]
    InsufficientStore,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Agent and structure arenas. Coordinators resolve ids against these every
/// tick; a missing id is cancellation, never an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    agents: SlotMap<AgentId, Agent>,
    structures: SlotMap<StructureId, Structure>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Arena management
    // -----------------------------------------------------------------------

    pub fn spawn_agent(
        &mut self,
        room: RoomId,
        pos: Position,
        class: AgentClass,
        capacity: u32,
        ttl: u32,
    ) -> AgentId {
        self.agents.insert(Agent {
            pos,
            room,
            class,
            capacity,
            ttl,
            tag: None,
            carry: BTreeMap::new(),
        })
    }

    pub fn add_structure(&mut self, room: RoomId, pos: Position, kind: StructureKind) -> StructureId {
        self.structures.insert(Structure { pos, room, kind })
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    pub fn structure(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(id)
    }

    pub fn structure_mut(&mut self, id: StructureId) -> Option<&mut Structure> {
        self.structures.get_mut(id)
    }

    pub fn remove_agent(&mut self, id: AgentId) -> Option<Agent> {
        self.agents.remove(id)
    }

    pub fn remove_structure(&mut self, id: StructureId) -> Option<Structure> {
        self.structures.remove(id)
    }

    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.agents.iter()
    }

    pub fn structures(&self) -> impl Iterator<Item = (StructureId, &Structure)> {
        self.structures.iter()
    }

    /// Agent ids in a room, in arena order. Collected so callers can mutate
    /// the world while walking the result.
    pub fn agents_in_room(&self, room: RoomId) -> Vec<AgentId> {
        self.agents
            .iter()
            .filter(|(_, a)| a.room == room)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn count_class(&self, room: RoomId, class: AgentClass) -> usize {
        self.agents
            .values()
            .filter(|a| a.room == room && a.class == class)
            .count()
    }

    /// Producer ids in a room, in arena order.
    pub fn producers_in_room(&self, room: RoomId) -> Vec<StructureId> {
        self.structures
            .iter()
            .filter(|(_, s)| s.room == room && matches!(s.kind, StructureKind::Producer { .. }))
            .map(|(id, _)| id)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Agent capabilities
    // -----------------------------------------------------------------------

    /// Move one step toward `target`. No-op for missing agents.
    pub fn move_toward(&mut self, agent: AgentId, target: Position) {
        if let Some(a) = self.agents.get_mut(agent) {
            a.pos = a.pos.step_toward(target);
        }
    }

    /// Harvest up to `rate` units from an adjacent resource node into the
    /// agent's carry. Returns the amount actually moved.
    pub fn harvest(&mut self, agent: AgentId, node: StructureId, rate: u32) -> u32 {
        let Some(a) = self.agents.get(agent) else {
            return 0;
        };
        let Some(s) = self.structures.get(node) else {
            return 0;
        };
        if !(a.pos.is_adjacent(s.pos) || a.pos == s.pos) {
            return 0;
        }
        let StructureKind::ResourceNode { resource, level, .. } = s.kind else {
            return 0;
        };
        let amount = rate.min(level).min(a.free_capacity());
        if amount == 0 {
            return 0;
        }

        if let Some(StructureKind::ResourceNode { level, .. }) =
            self.structures.get_mut(node).map(|s| &mut s.kind)
        {
            *level -= amount;
        }
        if let Some(a) = self.agents.get_mut(agent) {
            a.add(resource, amount);
        }
        amount
    }

    /// Transfer up to `amount` of `resource` from the agent into a target
    /// structure. Returns the amount moved; zero-moved outcomes surface the
    /// reason so callers can close contracts appropriately.
    pub fn transfer(
        &mut self,
        agent: AgentId,
        target: StructureId,
        resource: ResourceTypeId,
        amount: u32,
    ) -> Result<u32, TransferError> {
        let held = match self.agents.get(agent) {
            Some(a) => a.held(resource),
            None => return Ok(0),
        };
        let offered = amount.min(held);

        let space = match self.structures.get(target) {
            None => return Err(TransferError::TargetMissing),
            Some(s) => match &s.kind {
                StructureKind::Bucket { store, capacity } => {
                    let total: u32 = store.values().sum();
                    capacity.saturating_sub(total)
                }
                StructureKind::Producer { resource: r, store, capacity, .. } => {
                    if *r != resource {
                        return Err(TransferError::Incompatible);
                    }
                    capacity.saturating_sub(*store)
                }
                StructureKind::ResourceNode { .. } => return Err(TransferError::Incompatible),
            },
        };
        if space == 0 {
            return Err(TransferError::TargetFull);
        }

        let moved = offered.min(space);
        if moved == 0 {
            return Ok(0);
        }
        if let Some(a) = self.agents.get_mut(agent) {
            a.remove(resource, moved);
        }
        match self.structures.get_mut(target).map(|s| &mut s.kind) {
            Some(StructureKind::Bucket { store, .. }) => {
                *store.entry(resource).or_insert(0) += moved;
            }
            Some(StructureKind::Producer { store, .. }) => {
                *store += moved;
            }
            _ => {}
        }
        Ok(moved)
    }

    /// Withdraw up to `amount` of `resource` from a bucket or producer into
    /// the agent's carry. Returns the amount moved.
    pub fn withdraw(
        &mut self,
        agent: AgentId,
        source: StructureId,
        resource: ResourceTypeId,
        amount: u32,
    ) -> Result<u32, TransferError> {
        let free = match self.agents.get(agent) {
            Some(a) => a.free_capacity(),
            None => return Ok(0),
        };

        let available = match self.structures.get(source) {
            None => return Err(TransferError::TargetMissing),
            Some(s) => match &s.kind {
                StructureKind::Bucket { store, .. } => store.get(&resource).copied().unwrap_or(0),
                StructureKind::Producer { resource: r, store, .. } => {
                    if *r != resource {
                        return Err(TransferError::Incompatible);
                    }
                    *store
                }
                StructureKind::ResourceNode { .. } => return Err(TransferError::Incompatible),
            },
        };

        let moved = amount.min(free).min(available);
        if moved == 0 {
            return Ok(0);
        }
        match self.structures.get_mut(source).map(|s| &mut s.kind) {
            Some(StructureKind::Bucket { store, .. }) => {
                if let Some(held) = store.get_mut(&resource) {
                    *held -= moved;
                    if *held == 0 {
                        store.remove(&resource);
                    }
                }
            }
            Some(StructureKind::Producer { store, .. }) => {
                *store -= moved;
            }
            _ => {}
        }
        if let Some(a) = self.agents.get_mut(agent) {
            a.add(resource, moved);
        }
        Ok(moved)
    }

    /// Consume resources from an agent's carry without a transfer target
    /// (repair spending). Returns the amount actually consumed.
    pub fn spend_carry(&mut self, agent: AgentId, resource: ResourceTypeId, amount: u32) -> u32 {
        match self.agents.get_mut(agent) {
            Some(a) => a.remove(resource, amount),
            None => 0,
        }
    }

    /// Put resources directly into an agent's carry, ignoring adjacency.
    /// Scenario setup only; tick-time movement goes through harvest,
    /// transfer, and withdraw.
    pub fn load_carry(&mut self, agent: AgentId, resource: ResourceTypeId, amount: u32) {
        if let Some(a) = self.agents.get_mut(agent) {
            a.add(resource, amount);
        }
    }

    /// Extend an agent's lifespan, capped at `ttl_cap`.
    pub fn renew_agent(&mut self, agent: AgentId, gain: u32, ttl_cap: u32) {
        if let Some(a) = self.agents.get_mut(agent) {
            a.ttl = (a.ttl + gain).min(ttl_cap);
        }
    }

    // -----------------------------------------------------------------------
    // Producer capabilities
    // -----------------------------------------------------------------------

    /// Whether a producer is currently mid-production. Missing or
    /// non-producer structures report `false`.
    pub fn producer_busy(&self, id: StructureId) -> bool {
        matches!(
            self.structures.get(id).map(|s| &s.kind),
            Some(StructureKind::Producer { production: Some(_), .. })
        )
    }

    /// Current refuel store level of a producer.
    pub fn producer_store(&self, id: StructureId) -> u32 {
        match self.structures.get(id).map(|s| &s.kind) {
            Some(StructureKind::Producer { store, .. }) => *store,
            _ => 0,
        }
    }

    /// Begin producing an agent. Deducts `cost` from the producer store and
    /// occupies the producer for `duration` ticks.
    pub fn begin_production(
        &mut self,
        id: StructureId,
        spec: AgentSpec,
        cost: u32,
        duration: u32,
    ) -> Result<(), ProduceError> {
        let Some(s) = self.structures.get_mut(id) else {
            return Err(ProduceError::Missing);
        };
        let StructureKind::Producer { store, production, .. } = &mut s.kind else {
            return Err(ProduceError::NotProducer);
        };
        if production.is_some() {
            return Err(ProduceError::Busy);
        }
        if *store < cost {
            return Err(ProduceError::InsufficientStore);
        }
        *store -= cost;
        *production = Some(ProductionJob {
            spec,
            remaining: duration.max(1),
        });
        Ok(())
    }

    /// Advance every production job one tick. Finished jobs spawn their
    /// agent at the producer's position; the new agent is first seen by
    /// coordinators on the following tick.
    pub fn step_production(&mut self) -> Vec<(StructureId, AgentId)> {
        let mut finished = Vec::new();
        for (id, s) in self.structures.iter_mut() {
            if let StructureKind::Producer { production, .. } = &mut s.kind {
                if let Some(job) = production {
                    job.remaining -= 1;
                    if job.remaining == 0 {
                        finished.push((id, s.pos, s.room, job.spec.clone()));
                        *production = None;
                    }
                }
            }
        }

        finished
            .into_iter()
            .map(|(producer, pos, room, spec)| {
                let agent = self.agents.insert(Agent {
                    pos,
                    room,
                    class: spec.class,
                    capacity: spec.capacity,
                    ttl: spec.ttl,
                    tag: spec.tag,
                    carry: BTreeMap::new(),
                });
                (producer, agent)
            })
            .collect()
    }

    /// Pending production jobs of a class in a room. Used when enforcing
    /// population caps that must count units still being produced.
    pub fn pending_production(&self, room: RoomId, class: AgentClass) -> usize {
        self.structures
            .values()
            .filter(|s| s.room == room)
            .filter_map(|s| match &s.kind {
                StructureKind::Producer { production: Some(job), .. } => Some(&job.spec),
                _ => None,
            })
            .filter(|spec| spec.class == class)
            .count()
    }

    // -----------------------------------------------------------------------
    // Bookkeeping
    // -----------------------------------------------------------------------

    /// Decrement every agent's lifespan; remove and report the expired.
    pub fn tick_lifespans(&mut self) -> Vec<AgentId> {
        let expired: Vec<AgentId> = self
            .agents
            .iter_mut()
            .filter_map(|(id, a)| {
                a.ttl = a.ttl.saturating_sub(1);
                (a.ttl == 0).then_some(id)
            })
            .collect();
        for id in &expired {
            self.agents.remove(*id);
        }
        expired
    }

    /// Regenerate resource nodes toward their maximum level.
    pub fn regenerate_nodes(&mut self) {
        for s in self.structures.values_mut() {
            if let StructureKind::ResourceNode { level, max_level, regen_per_tick, .. } = &mut s.kind
            {
                *level = (*level + *regen_per_tick).min(*max_level);
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn energy() -> ResourceTypeId {
        ResourceTypeId(0)
    }

    fn node_kind(level: u32) -> StructureKind {
        StructureKind::ResourceNode {
            resource: energy(),
            level,
            max_level: level,
            regen_per_tick: 0,
        }
    }

    fn bucket_kind(capacity: u32) -> StructureKind {
        StructureKind::Bucket {
            store: BTreeMap::new(),
            capacity,
        }
    }

    fn producer_kind(store: u32) -> StructureKind {
        StructureKind::Producer {
            resource: energy(),
            store,
            capacity: 100,
            production: None,
        }
    }

    #[test]
    fn harvest_requires_adjacency() {
        let mut w = World::new();
        let node = w.add_structure(RoomId(0), Position::new(5, 5), node_kind(10));
        let far = w.spawn_agent(RoomId(0), Position::new(0, 0), AgentClass::Worker, 50, 100);
        assert_eq!(w.harvest(far, node, 4), 0);

        let near = w.spawn_agent(RoomId(0), Position::new(5, 6), AgentClass::Worker, 50, 100);
        assert_eq!(w.harvest(near, node, 4), 4);
        assert_eq!(w.agent(near).unwrap().held(energy()), 4);
    }

    #[test]
    fn harvest_is_bounded_by_node_level_and_capacity() {
        let mut w = World::new();
        let node = w.add_structure(RoomId(0), Position::new(1, 1), node_kind(3));
        let a = w.spawn_agent(RoomId(0), Position::new(1, 2), AgentClass::Worker, 2, 100);

        assert_eq!(w.harvest(a, node, 10), 2); // capacity bound
        assert_eq!(w.harvest(a, node, 10), 0); // full
    }

    #[test]
    fn transfer_reports_full_and_missing() {
        let mut w = World::new();
        let bucket = w.add_structure(RoomId(0), Position::new(0, 1), bucket_kind(5));
        let a = w.spawn_agent(RoomId(0), Position::new(0, 0), AgentClass::Courier, 50, 100);
        w.agent_mut(a).unwrap().add(energy(), 10);

        assert_eq!(w.transfer(a, bucket, energy(), 10), Ok(5));
        assert_eq!(
            w.transfer(a, bucket, energy(), 5),
            Err(TransferError::TargetFull)
        );

        w.remove_structure(bucket);
        assert_eq!(
            w.transfer(a, bucket, energy(), 5),
            Err(TransferError::TargetMissing)
        );
        assert_eq!(w.agent(a).unwrap().held(energy()), 5);
    }

    #[test]
    fn transfer_to_producer_rejects_wrong_resource() {
        let mut w = World::new();
        let producer = w.add_structure(RoomId(0), Position::new(0, 1), producer_kind(0));
        let a = w.spawn_agent(RoomId(0), Position::new(0, 0), AgentClass::Courier, 50, 100);
        w.agent_mut(a).unwrap().add(ResourceTypeId(9), 10);

        assert_eq!(
            w.transfer(a, producer, ResourceTypeId(9), 10),
            Err(TransferError::Incompatible)
        );
    }

    #[test]
    fn withdraw_moves_from_bucket() {
        let mut w = World::new();
        let bucket = w.add_structure(RoomId(0), Position::new(0, 1), bucket_kind(50));
        let filler = w.spawn_agent(RoomId(0), Position::new(0, 0), AgentClass::Courier, 50, 100);
        w.agent_mut(filler).unwrap().add(energy(), 20);
        assert_eq!(w.transfer(filler, bucket, energy(), 20), Ok(20));

        let taker = w.spawn_agent(RoomId(0), Position::new(0, 2), AgentClass::Worker, 8, 100);
        assert_eq!(w.withdraw(taker, bucket, energy(), 50), Ok(8));
        assert_eq!(w.agent(taker).unwrap().held(energy()), 8);
    }

    #[test]
    fn production_occupies_and_spawns_next_steps() {
        let mut w = World::new();
        let producer = w.add_structure(RoomId(0), Position::new(3, 3), producer_kind(30));
        let spec = AgentSpec {
            class: AgentClass::Courier,
            capacity: 50,
            ttl: 200,
            tag: None,
        };

        w.begin_production(producer, spec.clone(), 20, 2).unwrap();
        assert!(w.producer_busy(producer));
        assert_eq!(w.producer_store(producer), 10);
        assert_eq!(
            w.begin_production(producer, spec, 20, 2),
            Err(ProduceError::Busy)
        );
        assert_eq!(w.pending_production(RoomId(0), AgentClass::Courier), 1);

        assert!(w.step_production().is_empty());
        let spawned = w.step_production();
        assert_eq!(spawned.len(), 1);
        assert!(!w.producer_busy(producer));

        let (_, agent) = spawned[0];
        let a = w.agent(agent).unwrap();
        assert_eq!(a.class, AgentClass::Courier);
        assert_eq!(a.pos, Position::new(3, 3));
    }

    #[test]
    fn production_rejects_insufficient_store() {
        let mut w = World::new();
        let producer = w.add_structure(RoomId(0), Position::new(3, 3), producer_kind(5));
        let spec = AgentSpec {
            class: AgentClass::Worker,
            capacity: 50,
            ttl: 200,
            tag: None,
        };
        assert_eq!(
            w.begin_production(producer, spec, 20, 2),
            Err(ProduceError::InsufficientStore)
        );
    }

    #[test]
    fn lifespans_expire_and_remove() {
        let mut w = World::new();
        let short = w.spawn_agent(RoomId(0), Position::new(0, 0), AgentClass::Worker, 50, 1);
        let long = w.spawn_agent(RoomId(0), Position::new(0, 0), AgentClass::Worker, 50, 5);

        let expired = w.tick_lifespans();
        assert_eq!(expired, vec![short]);
        assert!(w.agent(short).is_none());
        assert_eq!(w.agent(long).unwrap().ttl, 4);
    }

    #[test]
    fn renew_is_capped() {
        let mut w = World::new();
        let a = w.spawn_agent(RoomId(0), Position::new(0, 0), AgentClass::Worker, 50, 90);
        w.renew_agent(a, 40, 100);
        assert_eq!(w.agent(a).unwrap().ttl, 100);
    }

    #[test]
    fn nodes_regenerate_to_cap() {
        let mut w = World::new();
        let node = w.add_structure(
            RoomId(0),
            Position::new(1, 1),
            StructureKind::ResourceNode {
                resource: energy(),
                level: 0,
                max_level: 5,
                regen_per_tick: 3,
            },
        );
        w.regenerate_nodes();
        w.regenerate_nodes();
        match &w.structure(node).unwrap().kind {
            StructureKind::ResourceNode { level, .. } => assert_eq!(*level, 5),
            _ => unreachable!(),
        }
    }
}
