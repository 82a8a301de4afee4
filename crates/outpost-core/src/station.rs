//! Source stations: the fixed slot set around each resource node, the
//! occupancy lifecycle, and the registry that drives first-fit assignment.
//!
//! A slot is the unit of mutual exclusion for harvesting. Slots are
//! surveyed once from terrain at station construction and only ever grow
//! (through expansion adoption) or shrink (when a supporting improvement
//! decays away). Occupancies are mutated exclusively by the owning
//! station's `run` pass.

use crate::grid::{Position, RoomGrid, TerrainQuery, Tile};
use crate::id::{AgentId, ResourceTypeId, RoomId, StationId, StructureId};
use crate::world::{StructureKind, World};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while constructing a station. Construction against a
/// backing id that does not resolve is unrecoverable.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    #[error("station backing id does not resolve to a resource node")]
    UnresolvableNode,
    #[error("room is not registered with the engine")]
    UnknownRoom,
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// Binding of a slot to an agent, with progress tracked against the
/// carry level observed at bind time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    pub agent: AgentId,
    pub requested: u32,
    pub start_level: u32,
    pub progress: u32,
}

/// One of a station's bounded occupiable positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub pos: Position,
    pub occupancy: Option<Occupancy>,
}

/// Counts from one slot-reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotReconcile {
    /// Occupancies freed because the requested amount was gathered.
    pub completed: u32,
    /// Occupancies freed because the bound agent stopped resolving, or the
    /// slot itself became unusable.
    pub lost: u32,
}

impl SlotReconcile {
    pub fn absorb(&mut self, other: SlotReconcile) {
        self.completed += other.completed;
        self.lost += other.lost;
    }
}

// ---------------------------------------------------------------------------
// Upkeep crew
// ---------------------------------------------------------------------------

/// The harvest/repair toggle of a station-owned upkeep crew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum UpkeepMode {
    Harvest,
    Repair,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UpkeepCrew {
    agent: AgentId,
    mode: UpkeepMode,
}

// ---------------------------------------------------------------------------
// SourceStation
// ---------------------------------------------------------------------------

/// A station wrapped around one resource node: its fixed slot set and its
/// locally-owned upkeep crew.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStation {
    pub node: StructureId,
    pub room: RoomId,
    pub pos: Position,
    slots: Vec<Slot>,
    upkeep: Option<UpkeepCrew>,
    /// Repair intent recorded by the upkeep pass, applied by the registry
    /// against the mutable room grid.
    #[serde(skip)]
    pending_repair: Option<(AgentId, Position, u32)>,
}

impl SourceStation {
    /// Survey the tiles around a resource node and record each usable one
    /// as a slot, in neighbor scan order. The slot ordering is fixed from
    /// here on; first-fit scans follow it.
    pub fn survey(
        world: &World,
        node: StructureId,
        terrain: &impl TerrainQuery,
    ) -> Result<Self, StationError> {
        let backing = world.structure(node).ok_or(StationError::UnresolvableNode)?;
        if !matches!(backing.kind, StructureKind::ResourceNode { .. }) {
            return Err(StationError::UnresolvableNode);
        }

        let slots = backing
            .pos
            .neighbors()
            .into_iter()
            .filter(|p| terrain.is_usable(*p))
            .map(|pos| Slot { pos, occupancy: None })
            .collect();

        Ok(Self {
            node,
            room: backing.room,
            pos: backing.pos,
            slots,
            upkeep: None,
            pending_repair: None,
        })
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// The resource this station's node yields. `None` once the node has
    /// ceased to exist.
    pub fn resource(&self, world: &World) -> Option<ResourceTypeId> {
        match world.structure(self.node).map(|s| &s.kind) {
            Some(StructureKind::ResourceNode { resource, .. }) => Some(*resource),
            _ => None,
        }
    }

    /// Deterministic first-fit scan over the fixed slot ordering.
    pub fn available_position(&self) -> Option<Position> {
        self.slots
            .iter()
            .find(|s| s.occupancy.is_none())
            .map(|s| s.pos)
    }

    pub fn free_slot_count(&self) -> usize {
        self.slots.iter().filter(|s| s.occupancy.is_none()).count()
    }

    pub fn is_occupant(&self, agent: AgentId) -> bool {
        self.slots
            .iter()
            .any(|s| s.occupancy.as_ref().is_some_and(|o| o.agent == agent))
    }

    /// Position of the slot an agent occupies, if any.
    pub fn occupant_slot(&self, agent: AgentId) -> Option<Position> {
        self.slots
            .iter()
            .find(|s| s.occupancy.as_ref().is_some_and(|o| o.agent == agent))
            .map(|s| s.pos)
    }

    /// Bind an occupancy to the slot at `pos`. Returns false when the slot
    /// is unknown or already held.
    pub fn bind_slot(&mut self, pos: Position, occupancy: Occupancy) -> bool {
        match self.slots.iter_mut().find(|s| s.pos == pos) {
            Some(slot) if slot.occupancy.is_none() => {
                slot.occupancy = Some(occupancy);
                true
            }
            _ => false,
        }
    }

    /// Release an agent's occupancy outside the run pass. Used when an
    /// assignment is abandoned rather than completed.
    pub fn release(&mut self, agent: AgentId) -> bool {
        for slot in &mut self.slots {
            if slot.occupancy.as_ref().is_some_and(|o| o.agent == agent) {
                slot.occupancy = None;
                return true;
            }
        }
        false
    }

    /// Attach an upkeep crew. A station owns at most one; the previous
    /// binding is replaced.
    pub fn assign_upkeep(&mut self, agent: AgentId) {
        self.upkeep = Some(UpkeepCrew {
            agent,
            mode: UpkeepMode::Harvest,
        });
    }

    pub fn upkeep_agent(&self) -> Option<AgentId> {
        self.upkeep.as_ref().map(|c| c.agent)
    }

    /// Per-tick pass: reconcile occupancies against live agents and drive
    /// the upkeep crew. Repairs are recorded as intents and applied by
    /// [`StationRegistry::run_all`], which holds the mutable grid.
    pub fn run(&mut self, world: &mut World, grid: &RoomGrid, harvest_rate: u32) -> SlotReconcile {
        let mut outcome = SlotReconcile::default();
        let resource = self.resource(world);

        for slot in &mut self.slots {
            let Some(occ) = &mut slot.occupancy else {
                continue;
            };
            let Some(agent) = world.agent(occ.agent) else {
                slot.occupancy = None;
                outcome.lost += 1;
                continue;
            };

            // A slot whose supporting improvement decayed away is no longer
            // part of the usable set; its occupant is released.
            if grid.tile(slot.pos) == Tile::Rough && !grid.has_improvement(slot.pos) {
                slot.occupancy = None;
                outcome.lost += 1;
                continue;
            }

            let current = resource.map(|r| agent.held(r)).unwrap_or(0);
            occ.progress = current.saturating_sub(occ.start_level);
            if occ.progress >= occ.requested {
                slot.occupancy = None;
                outcome.completed += 1;
            }
        }
        self.slots
            .retain(|s| !(grid.tile(s.pos) == Tile::Rough && !grid.has_improvement(s.pos)));

        self.run_upkeep(world, grid, harvest_rate);
        outcome
    }

    fn run_upkeep(&mut self, world: &mut World, grid: &RoomGrid, harvest_rate: u32) {
        let Some(crew) = self.upkeep.clone() else {
            return;
        };
        let Some(agent) = world.agent(crew.agent) else {
            // A vanished crew detaches silently; the station keeps running.
            self.upkeep = None;
            return;
        };
        let Some(resource) = self.resource(world) else {
            return;
        };

        let free = agent.free_capacity();
        let held = agent.held(resource);
        let agent_pos = agent.pos;

        // Toggle on the boundary conditions before acting.
        let mut mode = crew.mode;
        match mode {
            UpkeepMode::Harvest if free == 0 => mode = UpkeepMode::Repair,
            UpkeepMode::Repair if held == 0 => mode = UpkeepMode::Harvest,
            _ => {}
        }

        match mode {
            UpkeepMode::Harvest => {
                if agent_pos.is_adjacent(self.pos) || agent_pos == self.pos {
                    world.harvest(crew.agent, self.node, harvest_rate);
                } else {
                    world.move_toward(crew.agent, self.pos);
                }
            }
            UpkeepMode::Repair => {
                let anchors: Vec<Position> = self.slots.iter().map(|s| s.pos).collect();
                match grid.most_worn_near(&anchors) {
                    None => mode = UpkeepMode::Harvest,
                    Some((target, _)) => {
                        if agent_pos.is_adjacent(target) || agent_pos == target {
                            self.pending_repair =
                                Some((crew.agent, target, held.min(harvest_rate)));
                        } else {
                            world.move_toward(crew.agent, target);
                        }
                    }
                }
            }
        }

        if let Some(c) = self.upkeep.as_mut() {
            c.mode = mode;
        }
    }

    /// Expansion scan: revisit the ring of tiles around the node that are
    /// not yet slots. A rough tile already carrying an improvement is
    /// adopted as a slot immediately; bare rough tiles come back as
    /// candidates for a surface improvement. No build request is emitted.
    pub fn find_expansion_positions(&mut self, terrain: &impl TerrainQuery) -> Vec<Position> {
        let mut candidates = Vec::new();
        for pos in self.pos.neighbors() {
            if self.slots.iter().any(|s| s.pos == pos) {
                continue;
            }
            match terrain.tile(pos) {
                Tile::Rough if terrain.has_improvement(pos) => {
                    self.slots.push(Slot { pos, occupancy: None });
                }
                Tile::Rough => candidates.push(pos),
                Tile::Open | Tile::Blocked => {}
            }
        }
        candidates
    }
}

// ---------------------------------------------------------------------------
// StationRegistry
// ---------------------------------------------------------------------------

/// All stations of one room, in registration order. Registration order is
/// the only tie-break first-fit assignment uses; it is deliberately not
/// locality-aware.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationRegistry {
    stations: SlotMap<StationId, SourceStation>,
    order: Vec<StationId>,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, station: SourceStation) -> StationId {
        let id = self.stations.insert(station);
        self.order.push(id);
        id
    }

    pub fn get(&self, id: StationId) -> Option<&SourceStation> {
        self.stations.get(id)
    }

    pub fn get_mut(&mut self, id: StationId) -> Option<&mut SourceStation> {
        self.stations.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Station ids in registration order.
    pub fn in_order(&self) -> impl Iterator<Item = StationId> + '_ {
        self.order.iter().copied()
    }

    /// Total free slots across all stations.
    pub fn total_free_slots(&self) -> usize {
        self.order
            .iter()
            .filter_map(|id| self.stations.get(*id))
            .map(|s| s.free_slot_count())
            .sum()
    }

    /// First available slot across stations in registration order.
    pub fn first_available(&self) -> Option<(StationId, Position)> {
        self.order.iter().find_map(|id| {
            let station = self.stations.get(*id)?;
            station.available_position().map(|pos| (*id, pos))
        })
    }

    /// The station an agent currently occupies a slot at, if any.
    pub fn occupant_station(&self, agent: AgentId) -> Option<StationId> {
        self.order
            .iter()
            .copied()
            .find(|id| self.stations.get(*id).is_some_and(|s| s.is_occupant(agent)))
    }

    /// Drop stations whose backing node no longer resolves, releasing any
    /// occupancies they still held. Returns how many occupancies were lost.
    pub fn drop_dead_stations(&mut self, world: &World) -> u32 {
        let mut lost = 0;
        let dead: Vec<StationId> = self
            .order
            .iter()
            .copied()
            .filter(|id| {
                self.stations
                    .get(*id)
                    .is_some_and(|s| s.resource(world).is_none())
            })
            .collect();
        for id in dead {
            if let Some(station) = self.stations.remove(id) {
                lost += station
                    .slots()
                    .iter()
                    .filter(|s| s.occupancy.is_some())
                    .count() as u32;
            }
            self.order.retain(|o| *o != id);
        }
        lost
    }

    /// Run every station's per-tick pass, applying deferred repairs
    /// against the room grid.
    pub fn run_all(
        &mut self,
        world: &mut World,
        grid: &mut RoomGrid,
        harvest_rate: u32,
        improvement_max: u32,
    ) -> SlotReconcile {
        let mut outcome = SlotReconcile::default();
        let order: Vec<StationId> = self.order.clone();
        for id in order {
            let Some(station) = self.stations.get_mut(id) else {
                continue;
            };
            outcome.absorb(station.run(world, grid, harvest_rate));
            if let Some((crew, target, spend)) = station.pending_repair.take() {
                let Some(resource) = station.resource(world) else {
                    continue;
                };
                let gain = grid.repair_improvement(target, spend, improvement_max);
                if gain > 0 {
                    world.spend_carry(crew, resource, gain);
                }
            }
        }
        outcome
    }
}

// ===========================================================================
// Tests
// ===========================================================================
