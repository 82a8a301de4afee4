//! Per-room personnel backlogs, fulfilled one produced unit at a time.
//!
//! The head request is peeked, never popped early: a request for N units
//! stays at the head across however many ticks it takes to produce all N,
//! preserving room-level FIFO order through partial fulfillment.

use crate::config::ColonyConfig;
use crate::id::{AgentId, RoomId, StructureId};
use crate::world::{AgentClass, AgentSpec, World};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A standing request for tagged personnel, keyed by the owner that
/// raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceRequest {
    pub owner: StructureId,
    pub remaining: u32,
}

/// Intake outcome. A duplicate from an owner already in the backlog is a
/// no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonnelStatus {
    Accepted,
    Duplicate,
}

/// What one fulfillment pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceOutcome {
    /// Whether a production run was started for the head request.
    pub production_started: bool,
    /// Whether the head request was fully satisfied and popped.
    pub popped: bool,
}

/// One room's personnel backlog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintenanceCoordinator {
    backlog: VecDeque<MaintenanceRequest>,
}

impl MaintenanceCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backlog(&self) -> impl Iterator<Item = &MaintenanceRequest> {
        self.backlog.iter()
    }

    pub fn len(&self) -> usize {
        self.backlog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }

    /// File a request for `count` tagged units on behalf of `owner`.
    pub fn submit_personnel_request(
        &mut self,
        owner: StructureId,
        count: u32,
    ) -> PersonnelStatus {
        if self.backlog.iter().any(|r| r.owner == owner) {
            return PersonnelStatus::Duplicate;
        }
        if count == 0 {
            return PersonnelStatus::Accepted;
        }
        self.backlog.push_back(MaintenanceRequest {
            owner,
            remaining: count,
        });
        PersonnelStatus::Accepted
    }

    /// One fulfillment attempt: peek the head request and, if an idle
    /// funded producer exists in the room, produce one unit tagged with
    /// the owner. The head is popped only once its count reaches zero.
    pub fn tick(
        &mut self,
        world: &mut World,
        room: RoomId,
        config: &ColonyConfig,
    ) -> MaintenanceOutcome {
        let mut outcome = MaintenanceOutcome::default();
        let Some(head) = self.backlog.front().copied() else {
            return outcome;
        };

        let producer = world.producers_in_room(room).into_iter().find(|p| {
            !world.producer_busy(*p) && world.producer_store(*p) >= config.maintenance_cost
        });
        let Some(producer) = producer else {
            return outcome;
        };

        let spec = AgentSpec {
            class: AgentClass::Maintenance,
            capacity: config.maintenance_capacity,
            ttl: config.agent_ttl,
            tag: Some(head.owner),
        };
        if world
            .begin_production(producer, spec, config.maintenance_cost, config.production_ticks)
            .is_err()
        {
            return outcome;
        }
        outcome.production_started = true;

        if let Some(front) = self.backlog.front_mut() {
            front.remaining -= 1;
            if front.remaining == 0 {
                self.backlog.pop_front();
                outcome.popped = true;
            }
        }
        outcome
    }

    /// Drop requests whose owner no longer resolves.
    pub fn reconcile(&mut self, world: &World) {
        self.backlog.retain(|r| world.structure(r.owner).is_some());
    }
}

// ===========================================================================
// Tests
// ===========================================================================
