//! The resource coordinator: harvest request intake and the per-tick
//! first-fit assignment of queued agents to freed slots.

use crate::engine::RoomTickError;
use crate::grid::Position;
use crate::id::{AgentId, RoomId, StationId};
use crate::queue::{HarvestQueue, HarvestRequest};
use crate::station::{Occupancy, StationRegistry};
use crate::world::World;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Options for a harvest request submission.
#[derive(Debug, Clone, Copy, Default)]
pub struct HarvestOptions {
    /// Explicit amount to gather. Non-positive or absent falls back to the
    /// agent's free capacity for the station resource.
    pub amount: Option<u32>,
}

/// Outcome of a submission. Callers poll for a slot rather than branching
/// on whether the entry was fresh, so an already-queued agent sees the
/// same `Pending` a new one does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    /// Queued (now or previously); poll again next tick.
    Pending,
    /// The agent already occupies a slot.
    AlreadyHarvesting,
    /// The queue is at capacity; try again later.
    QueueFull,
}

impl SubmitStatus {
    pub fn is_pending(self) -> bool {
        matches!(self, SubmitStatus::Pending)
    }
}

/// Counts from one assignment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentReport {
    /// Requests bound to a slot this tick.
    pub assigned: u32,
    /// Dequeues consumed by agents that no longer resolve.
    pub vanished: u32,
    /// Requests still queued after the pass.
    pub remaining: usize,
    /// The bindings made, in service order.
    pub bindings: Vec<(AgentId, StationId, Position)>,
}

// ---------------------------------------------------------------------------
// ResourceCoordinator
// ---------------------------------------------------------------------------

/// Owns the harvest queue of one room and drains it into freed slots each
/// tick. All other components interact with it only through
/// [`submit_request`](Self::submit_request) and the assignment pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCoordinator {
    queue: HarvestQueue,
}

impl ResourceCoordinator {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            queue: HarvestQueue::with_capacity(queue_capacity),
        }
    }

    pub fn queue(&self) -> &HarvestQueue {
        &self.queue
    }

    /// Submit a harvest request for an agent.
    ///
    /// Occupying a slot reports `AlreadyHarvesting`; an existing queue
    /// entry reports `Pending` without duplicating it. The requested
    /// amount is the explicit positive option or the agent's free
    /// capacity.
    pub fn submit_request(
        &mut self,
        world: &World,
        registry: &StationRegistry,
        agent: AgentId,
        opts: HarvestOptions,
    ) -> SubmitStatus {
        if registry.occupant_station(agent).is_some() {
            return SubmitStatus::AlreadyHarvesting;
        }
        if self.queue.contains_agent(agent) {
            return SubmitStatus::Pending;
        }
        let Some(live) = world.agent(agent) else {
            // A submission from an id that no longer resolves is dropped;
            // the caller is gone and nothing will ever poll for it.
            log::debug!("harvest submission from unresolvable agent ignored");
            return SubmitStatus::Pending;
        };

        let amount = match opts.amount {
            Some(a) if a > 0 => a,
            _ => live.free_capacity(),
        };
        match self.queue.enqueue(HarvestRequest { agent, amount }) {
            Some(_) => SubmitStatus::Pending,
            None => {
                log::debug!("harvest queue at capacity, submission rejected");
                SubmitStatus::QueueFull
            }
        }
    }

    /// Per-tick assignment: process `min(free slots, queue length)`
    /// dequeues, binding each live agent to the first available slot in
    /// station registration order.
    ///
    /// A dequeue whose agent no longer resolves is consumed without
    /// consuming a slot. A live agent that cannot find a slot while free
    /// slots were counted is a consistency failure in the free-slot count
    /// and aborts the room's tick step.
    pub fn assign(
        &mut self,
        world: &World,
        registry: &mut StationRegistry,
        room: RoomId,
    ) -> Result<AssignmentReport, RoomTickError> {
        let free = registry.total_free_slots();
        let rounds = free.min(self.queue.len());
        let mut report = AssignmentReport::default();

        for _ in 0..rounds {
            let Some(request) = self.queue.dequeue() else {
                break;
            };
            let Some(agent) = world.agent(request.agent) else {
                report.vanished += 1;
                continue;
            };

            let Some((station_id, pos)) = registry.first_available() else {
                return Err(RoomTickError::SlotAccountingMismatch {
                    room,
                    expected_free: free,
                });
            };
            let Some(station) = registry.get_mut(station_id) else {
                return Err(RoomTickError::MissingStationRecord { room });
            };
            let Some(resource) = station.resource(world) else {
                return Err(RoomTickError::MissingStationRecord { room });
            };

            let bound = station.bind_slot(
                pos,
                Occupancy {
                    agent: request.agent,
                    requested: request.amount,
                    start_level: agent.held(resource),
                    progress: 0,
                },
            );
            if !bound {
                return Err(RoomTickError::SlotAccountingMismatch {
                    room,
                    expected_free: free,
                });
            }
            report.assigned += 1;
            report.bindings.push((request.agent, station_id, pos));
        }

        report.remaining = self.queue.len();
        Ok(report)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Position, RoomGrid, Tile};
    use crate::id::{ResourceTypeId, StructureId};
    use crate::station::SourceStation;
    use crate::world::{AgentClass, StructureKind};

    fn energy() -> ResourceTypeId {
        ResourceTypeId(0)
    }

    fn room() -> RoomId {
        RoomId(0)
    }

    /// One node surrounded by `free_slots` usable tiles.
    fn setup(free_slots: usize) -> (World, StationRegistry, StructureId) {
        let mut world = World::new();
        let mut grid = RoomGrid::open(7, 7);
        let center = Position::new(3, 3);
        for (i, pos) in center.neighbors().into_iter().enumerate() {
            if i >= free_slots {
                grid.set_tile(pos, Tile::Blocked);
            }
        }
        let node = world.add_structure(
            room(),
            center,
            StructureKind::ResourceNode {
                resource: energy(),
                level: 1000,
                max_level: 1000,
                regen_per_tick: 0,
            },
        );
        let mut registry = StationRegistry::new();
        registry.register(SourceStation::survey(&world, node, &grid).unwrap());
        (world, registry, node)
    }

    fn worker(world: &mut World) -> AgentId {
        world.spawn_agent(room(), Position::new(0, 0), AgentClass::Worker, 50, 100)
    }

    #[test]
    fn submit_defaults_to_free_capacity() {
        let (mut world, registry, _) = setup(3);
        let mut coord = ResourceCoordinator::new(8);
        let a = worker(&mut world);
        world.load_carry(a, energy(), 10);

        let status = coord.submit_request(&world, &registry, a, HarvestOptions::default());
        assert_eq!(status, SubmitStatus::Pending);
        assert_eq!(coord.queue().iter().next().map(|r| r.amount), Some(40));
    }

    #[test]
    fn submit_is_idempotent_while_queued() {
        let (mut world, registry, _) = setup(3);
        let mut coord = ResourceCoordinator::new(8);
        let a = worker(&mut world);

        assert_eq!(
            coord.submit_request(&world, &registry, a, HarvestOptions::default()),
            SubmitStatus::Pending
        );
        assert_eq!(
            coord.submit_request(&world, &registry, a, HarvestOptions { amount: Some(5) }),
            SubmitStatus::Pending
        );
        assert_eq!(coord.queue().len(), 1);
    }

    #[test]
    fn submit_rejects_slot_occupant() {
        let (mut world, mut registry, _) = setup(3);
        let mut coord = ResourceCoordinator::new(8);
        let a = worker(&mut world);

        coord.submit_request(&world, &registry, a, HarvestOptions { amount: Some(10) });
        coord.assign(&world, &mut registry, room()).unwrap();
        assert_eq!(
            coord.submit_request(&world, &registry, a, HarvestOptions::default()),
            SubmitStatus::AlreadyHarvesting
        );
    }

    #[test]
    fn submit_reports_queue_full() {
        let (mut world, registry, _) = setup(3);
        let mut coord = ResourceCoordinator::new(1);
        let a = worker(&mut world);
        let b = worker(&mut world);

        assert_eq!(
            coord.submit_request(&world, &registry, a, HarvestOptions::default()),
            SubmitStatus::Pending
        );
        assert_eq!(
            coord.submit_request(&world, &registry, b, HarvestOptions::default()),
            SubmitStatus::QueueFull
        );
    }

    #[test]
    fn assign_binds_min_of_free_and_queued_in_fifo_order() {
        // 3 free slots, 5 queued agents.
        let (mut world, mut registry, _) = setup(3);
        let mut coord = ResourceCoordinator::new(8);
        let agents: Vec<AgentId> = (0..5).map(|_| worker(&mut world)).collect();
        for a in &agents {
            coord.submit_request(&world, &registry, *a, HarvestOptions { amount: Some(10) });
        }

        let report = coord.assign(&world, &mut registry, room()).unwrap();
        assert_eq!(report.assigned, 3);
        assert_eq!(report.remaining, 2);

        // Exactly the first three submitters hold slots.
        for a in &agents[..3] {
            assert!(registry.occupant_station(*a).is_some());
        }
        for a in &agents[3..] {
            assert!(registry.occupant_station(*a).is_none());
            assert!(coord.queue().contains_agent(*a));
        }
    }

    #[test]
    fn assign_consumes_vanished_agents_without_a_slot() {
        let (mut world, mut registry, _) = setup(2);
        let mut coord = ResourceCoordinator::new(8);
        let dead = worker(&mut world);
        let live = worker(&mut world);
        coord.submit_request(&world, &registry, dead, HarvestOptions { amount: Some(10) });
        coord.submit_request(&world, &registry, live, HarvestOptions { amount: Some(10) });
        world.remove_agent(dead);

        let report = coord.assign(&world, &mut registry, room()).unwrap();
        assert_eq!(report.vanished, 1);
        assert_eq!(report.assigned, 1);
        assert!(registry.occupant_station(live).is_some());
        assert_eq!(registry.total_free_slots(), 1);
    }

    #[test]
    fn assign_records_start_level_from_current_carry() {
        let (mut world, mut registry, _) = setup(3);
        let mut coord = ResourceCoordinator::new(8);
        let a = worker(&mut world);
        world.load_carry(a, energy(), 7);
        coord.submit_request(&world, &registry, a, HarvestOptions { amount: Some(10) });
        coord.assign(&world, &mut registry, room()).unwrap();

        let sid = registry.occupant_station(a).unwrap();
        let station = registry.get(sid).unwrap();
        let occ = station
            .slots()
            .iter()
            .find_map(|s| s.occupancy.as_ref())
            .unwrap();
        assert_eq!(occ.start_level, 7);
        assert_eq!(occ.requested, 10);
    }

    #[test]
    fn assign_with_empty_queue_is_a_no_op() {
        let (world, mut registry, _) = setup(3);
        let mut coord = ResourceCoordinator::new(8);
        let report = coord.assign(&world, &mut registry, room()).unwrap();
        assert_eq!(report, AssignmentReport::default());
    }
}
