//! Read-only query API for the debug overlay.
//!
//! Snapshot types aggregate scheduler state into owned views with no
//! references into engine storage. Reading them has no effect on the
//! simulation.

use crate::engine::ColonyEngine;
use crate::grid::Position;
use crate::id::{AgentId, RoomId, StationId, StructureId};
use crate::station::Occupancy;

// ---------------------------------------------------------------------------
// Slot views
// ---------------------------------------------------------------------------

/// One slot's occupancy state.
#[derive(Debug, Clone)]
pub struct SlotView {
    pub station: StationId,
    pub room: RoomId,
    pub pos: Position,
    pub occupancy: Option<Occupancy>,
}

// ---------------------------------------------------------------------------
// Queue depth view
// ---------------------------------------------------------------------------

/// Backlog depths of one room's coordinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueDepths {
    pub room: RoomId,
    pub harvest: usize,
    pub delivery: usize,
    pub maintenance: usize,
}

// ---------------------------------------------------------------------------
// Contract view
// ---------------------------------------------------------------------------

/// One active delivery contract.
#[derive(Debug, Clone, Copy)]
pub struct ContractView {
    pub courier: AgentId,
    pub bucket: StructureId,
    pub amount: u32,
    pub delivered: u32,
}

impl ColonyEngine {
    /// Every slot of a room, station registration order first, slot scan
    /// order within a station.
    pub fn slot_views(&self, room: RoomId) -> Vec<SlotView> {
        let Some(state) = self.room(room) else {
            return Vec::new();
        };
        let mut views = Vec::new();
        for sid in state.registry.in_order() {
            let Some(station) = state.registry.get(sid) else {
                continue;
            };
            for slot in station.slots() {
                views.push(SlotView {
                    station: sid,
                    room,
                    pos: slot.pos,
                    occupancy: slot.occupancy.clone(),
                });
            }
        }
        views
    }

    /// Current backlog depths of a room.
    pub fn queue_depths(&self, room: RoomId) -> Option<QueueDepths> {
        self.room(room).map(|state| QueueDepths {
            room,
            harvest: state.harvest.queue().len(),
            delivery: state.delivery.queue_len(),
            maintenance: state.maintenance.len(),
        })
    }

    /// Active contracts of a room, courier order.
    pub fn contract_views(&self, room: RoomId) -> Vec<ContractView> {
        let Some(state) = self.room(room) else {
            return Vec::new();
        };
        state
            .delivery
            .contracts()
            .map(|(courier, c)| ContractView {
                courier,
                bucket: c.bucket,
                amount: c.amount,
                delivered: c.delivered,
            })
            .collect()
    }

    /// Renewal queue contents per producer, queue order.
    pub fn renewal_views(&self) -> Vec<(StructureId, Vec<AgentId>)> {
        self.renewal
            .queues()
            .map(|(station, queue)| (station, queue.iter().copied().collect()))
            .collect()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
