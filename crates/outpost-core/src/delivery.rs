//! Delivery contracts: matching storage demand to idle couriers and
//! driving each courier's collect/deliver cycle.
//!
//! A contract binds one courier to one (bucket, resource) obligation until
//! the delivered total reaches the contracted amount or the target stops
//! being able to take more. Partial fulfillment is an accepted outcome,
//! not an error.

use crate::config::ColonyConfig;
use crate::harvest::{HarvestOptions, ResourceCoordinator};
use crate::id::{AgentId, ResourceTypeId, RoomId, StructureId};
use crate::renewal::{renewal_cost, RenewalCoordinator};
use crate::station::StationRegistry;
use crate::world::{AgentClass, AgentSpec, TransferError, World};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

// ---------------------------------------------------------------------------
// Requests and contracts
// ---------------------------------------------------------------------------

/// Demand for `amount` of `resource` at a storage bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub bucket: StructureId,
    pub resource: ResourceTypeId,
    pub amount: u32,
}

/// A request bound to a courier. `delivered` grows monotonically and
/// never exceeds `amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryContract {
    pub bucket: StructureId,
    pub resource: ResourceTypeId,
    pub amount: u32,
    pub delivered: u32,
}

impl DeliveryContract {
    pub fn remaining(&self) -> u32 {
        self.amount.saturating_sub(self.delivered)
    }
}

/// Why a contract left the books.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The full amount arrived.
    Fulfilled,
    /// The bucket stopped resolving; what was delivered stands.
    TargetVanished,
    /// The bucket could not take the rest.
    TargetFull,
    /// The courier stopped resolving.
    CourierLost,
}

/// A contract removal, reported to the caller for observability.
#[derive(Debug, Clone)]
pub struct ClosedContract {
    pub courier: AgentId,
    pub contract: DeliveryContract,
    pub reason: CloseReason,
}

/// Counts from one intake batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptReport {
    pub accepted: usize,
    pub duplicates: usize,
}

/// Result of one assignment pass.
#[derive(Debug, Clone, Default)]
pub struct DeliveryAssignOutcome {
    /// Contracts opened this tick, in binding order.
    pub opened: Vec<(AgentId, DeliveryRequest)>,
    /// Whether a courier production run was started. Starting one ends the
    /// pass; the new unit is only usable on a later tick.
    pub production_started: bool,
}

// ---------------------------------------------------------------------------
// DeliveryCoordinator
// ---------------------------------------------------------------------------

/// Owns one room's delivery queue and active contracts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryCoordinator {
    queue: VecDeque<DeliveryRequest>,
    contracts: BTreeMap<AgentId, DeliveryContract>,
}

impl DeliveryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn contract_for(&self, courier: AgentId) -> Option<&DeliveryContract> {
        self.contracts.get(&courier)
    }

    pub fn contracts(&self) -> impl Iterator<Item = (AgentId, &DeliveryContract)> {
        self.contracts.iter().map(|(a, c)| (*a, c))
    }

    /// Take in a batch of requests, dropping every (bucket, resource) pair
    /// that is already queued or already serviced by an active contract.
    pub fn accept_requests(
        &mut self,
        batch: impl IntoIterator<Item = DeliveryRequest>,
    ) -> AcceptReport {
        let mut report = AcceptReport::default();
        for request in batch {
            let pair = (request.bucket, request.resource);
            let queued = self
                .queue
                .iter()
                .any(|r| (r.bucket, r.resource) == pair);
            let contracted = self
                .contracts
                .values()
                .any(|c| (c.bucket, c.resource) == pair);
            if queued || contracted {
                report.duplicates += 1;
                continue;
            }
            self.queue.push_back(request);
            report.accepted += 1;
        }
        report
    }

    /// Per-tick contract assignment.
    ///
    /// Binds queued requests to idle couriers until either runs out. When
    /// no courier is idle and the room is under its courier cap, starts
    /// producing one and stops; the fresh unit cannot be used this tick.
    pub fn assign(
        &mut self,
        world: &mut World,
        renewal: &RenewalCoordinator,
        room: RoomId,
        config: &ColonyConfig,
    ) -> DeliveryAssignOutcome {
        let mut outcome = DeliveryAssignOutcome::default();

        while !self.queue.is_empty() {
            let idle = world
                .agents()
                .filter(|(id, a)| {
                    a.room == room
                        && a.class == AgentClass::Courier
                        && !self.contracts.contains_key(id)
                        && !renewal.is_queued(*id)
                })
                .map(|(id, _)| id)
                .next();

            let Some(courier) = idle else {
                let population = world.count_class(room, AgentClass::Courier)
                    + world.pending_production(room, AgentClass::Courier);
                if population < config.max_couriers {
                    outcome.production_started = self.try_produce_courier(world, room, config);
                }
                break;
            };

            let Some(request) = self.queue.pop_front() else {
                break;
            };
            self.contracts.insert(
                courier,
                DeliveryContract {
                    bucket: request.bucket,
                    resource: request.resource,
                    amount: request.amount,
                    delivered: 0,
                },
            );
            outcome.opened.push((courier, request));
        }

        outcome
    }

    fn try_produce_courier(&self, world: &mut World, room: RoomId, config: &ColonyConfig) -> bool {
        for producer in world.producers_in_room(room) {
            if world.producer_busy(producer) || world.producer_store(producer) < config.courier_cost
            {
                continue;
            }
            let spec = AgentSpec {
                class: AgentClass::Courier,
                capacity: config.courier_capacity,
                ttl: config.agent_ttl,
                tag: None,
            };
            if world
                .begin_production(producer, spec, config.courier_cost, config.production_ticks)
                .is_ok()
            {
                return true;
            }
        }
        false
    }

    /// Drive every courier in the room one step through its cycle.
    ///
    /// Slot-bound and harvest-queued couriers are left to the harvest
    /// machinery; renewal-queued couriers are left to the renewal phase.
    pub fn run_couriers(
        &mut self,
        world: &mut World,
        registry: &StationRegistry,
        harvest: &mut ResourceCoordinator,
        renewal: &mut RenewalCoordinator,
        depot: Option<StructureId>,
        room: RoomId,
        config: &ColonyConfig,
    ) -> Vec<ClosedContract> {
        let mut closed = Vec::new();

        for courier in world.agents_in_room(room) {
            let is_courier = world
                .agent(courier)
                .is_some_and(|a| a.class == AgentClass::Courier);
            if !is_courier {
                continue;
            }
            if renewal.is_queued(courier) {
                continue;
            }

            let Some(contract) = self.contracts.get(&courier).copied() else {
                self.run_returning(world, courier, depot);
                continue;
            };

            let Some((held, free, ttl, pos, cost)) = world.agent(courier).map(|a| {
                (
                    a.held(contract.resource),
                    a.free_capacity(),
                    a.ttl,
                    a.pos,
                    renewal_cost(a, config),
                )
            }) else {
                continue;
            };
            let remaining = contract.remaining();

            // A hold full of unrelated cargo can make no progress either
            // way; dump it at the depot before resuming the cycle.
            if free == 0 && held == 0 {
                self.run_returning(world, courier, depot);
                continue;
            }

            // Collecting: free capacity remains and the hold cannot yet
            // cover the rest of the contract.
            if free > 0 && held < remaining {
                if registry.occupant_station(courier).is_some()
                    || harvest.queue().contains_agent(courier)
                {
                    continue;
                }
                let want = remaining.min(free);
                let _ = harvest.submit_request(
                    world,
                    registry,
                    courier,
                    HarvestOptions { amount: Some(want) },
                );
                continue;
            }

            // Delivering, with an optional renewal detour when lifespan is
            // short and the nearest producer can actually pay for it.
            if ttl < config.renewal_threshold {
                if let Some(producer) = RenewalCoordinator::nearest_producer(world, room, pos) {
                    if world.producer_store(producer) >= cost
                        && renewal.queue_for_renewal(world, courier).is_some()
                    {
                        continue;
                    }
                }
            }

            let Some(bucket_pos) = world.structure(contract.bucket).map(|s| s.pos) else {
                self.close(courier, CloseReason::TargetVanished, &mut closed);
                continue;
            };
            if !(pos.is_adjacent(bucket_pos) || pos == bucket_pos) {
                world.move_toward(courier, bucket_pos);
                continue;
            }

            let attempt = remaining.min(held);
            match world.transfer(courier, contract.bucket, contract.resource, attempt) {
                Err(TransferError::TargetMissing) => {
                    self.close(courier, CloseReason::TargetVanished, &mut closed);
                }
                Err(TransferError::TargetFull) | Err(TransferError::Incompatible) => {
                    self.close(courier, CloseReason::TargetFull, &mut closed);
                }
                Ok(moved) => {
                    let fulfilled = {
                        let Some(c) = self.contracts.get_mut(&courier) else {
                            continue;
                        };
                        c.delivered = (c.delivered + moved).min(c.amount);
                        c.delivered >= c.amount
                    };
                    if fulfilled {
                        self.close(courier, CloseReason::Fulfilled, &mut closed);
                    } else if moved < attempt {
                        // The bucket took some but not all: destination
                        // full, accepted partial fulfillment.
                        self.close(courier, CloseReason::TargetFull, &mut closed);
                    }
                }
            }
        }

        closed
    }

    fn run_returning(&self, world: &mut World, courier: AgentId, depot: Option<StructureId>) {
        let Some(depot) = depot else {
            return;
        };
        let Some(depot_pos) = world.structure(depot).map(|s| s.pos) else {
            return;
        };
        let Some((pos, carried)) = world
            .agent(courier)
            .map(|a| (a.pos, a.carried_types()))
        else {
            return;
        };

        if pos.is_adjacent(depot_pos) || pos == depot_pos {
            for resource in carried {
                let _ = world.transfer(courier, depot, resource, u32::MAX);
            }
        } else {
            world.move_toward(courier, depot_pos);
        }
    }

    /// Free contracts whose courier no longer resolves.
    pub fn reconcile(&mut self, world: &World) -> Vec<ClosedContract> {
        let dead: Vec<AgentId> = self
            .contracts
            .keys()
            .copied()
            .filter(|courier| world.agent(*courier).is_none())
            .collect();
        let mut closed = Vec::new();
        for courier in dead {
            log::debug!("freeing delivery contract of a courier that stopped resolving");
            self.close(courier, CloseReason::CourierLost, &mut closed);
        }
        closed
    }

    fn close(&mut self, courier: AgentId, reason: CloseReason, closed: &mut Vec<ClosedContract>) {
        if let Some(contract) = self.contracts.remove(&courier) {
            closed.push(ClosedContract {
                courier,
                contract,
                reason,
            });
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
