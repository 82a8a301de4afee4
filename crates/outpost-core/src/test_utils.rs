//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so the same
//! builders serve unit tests, the `tests/` suites, and criterion benches
//! (via the `test-utils` feature).

use crate::config::ColonyConfig;
use crate::engine::ColonyEngine;
use crate::grid::{Position, RoomGrid};
use crate::id::{AgentId, ResourceTypeId, RoomId, StructureId};
use crate::world::{AgentClass, StructureKind};
use std::collections::BTreeMap;

// ===========================================================================
// Resource constructors
// ===========================================================================

pub fn energy() -> ResourceTypeId {
    ResourceTypeId(0)
}
pub fn ore() -> ResourceTypeId {
    ResourceTypeId(1)
}
pub fn crystal() -> ResourceTypeId {
    ResourceTypeId(2)
}

// ===========================================================================
// Structure kinds
// ===========================================================================

pub fn node_kind(resource: ResourceTypeId, level: u32) -> StructureKind {
    StructureKind::ResourceNode {
        resource,
        level,
        max_level: level,
        regen_per_tick: 0,
    }
}

pub fn regenerating_node_kind(resource: ResourceTypeId, level: u32, regen: u32) -> StructureKind {
    StructureKind::ResourceNode {
        resource,
        level,
        max_level: level,
        regen_per_tick: regen,
    }
}

pub fn bucket_kind(capacity: u32) -> StructureKind {
    StructureKind::Bucket {
        store: BTreeMap::new(),
        capacity,
    }
}

pub fn producer_kind(resource: ResourceTypeId, store: u32) -> StructureKind {
    StructureKind::Producer {
        resource,
        store,
        capacity: 1000,
        production: None,
    }
}

// ===========================================================================
// Engine builders
// ===========================================================================

/// An engine with one open 12x12 room, a well-stocked energy node with a
/// registered station, a depot bucket, and a funded producer.
pub fn basic_colony() -> (ColonyEngine, StructureId, StructureId, StructureId) {
    basic_colony_with(ColonyConfig::default())
}

pub fn basic_colony_with(
    config: ColonyConfig,
) -> (ColonyEngine, StructureId, StructureId, StructureId) {
    let mut engine = ColonyEngine::new(config);
    engine.add_room(RoomId(0), RoomGrid::open(12, 12));

    let node = engine
        .world
        .add_structure(RoomId(0), Position::new(5, 5), regenerating_node_kind(energy(), 10_000, 10));
    engine
        .register_station(RoomId(0), node)
        .expect("node resolves");

    let depot = engine
        .world
        .add_structure(RoomId(0), Position::new(1, 1), bucket_kind(100_000));
    engine.set_depot(RoomId(0), depot);

    let producer = engine
        .world
        .add_structure(RoomId(0), Position::new(9, 9), producer_kind(energy(), 800));

    (engine, node, depot, producer)
}

/// Spawn a worker in room 0.
pub fn spawn_worker(engine: &mut ColonyEngine, pos: Position) -> AgentId {
    engine
        .world
        .spawn_agent(RoomId(0), pos, AgentClass::Worker, 20, 500)
}

/// Spawn a courier in room 0.
pub fn spawn_courier(engine: &mut ColonyEngine, pos: Position, capacity: u32) -> AgentId {
    engine
        .world
        .spawn_agent(RoomId(0), pos, AgentClass::Courier, capacity, 500)
}

/// Stored amount of a resource inside a bucket, zero for anything else.
pub fn bucket_level(engine: &ColonyEngine, bucket: StructureId, resource: ResourceTypeId) -> u32 {
    match engine.world.structure(bucket).map(|s| &s.kind) {
        Some(StructureKind::Bucket { store, .. }) => store.get(&resource).copied().unwrap_or(0),
        _ => 0,
    }
}
