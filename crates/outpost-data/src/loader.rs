//! Resolution pipeline: parse a scenario, resolve name references, build
//! the engine.

use crate::schema::{ScenarioDef, StructureKindDef};
use outpost_core::engine::ColonyEngine;
use outpost_core::grid::{Position, RoomGrid};
use outpost_core::id::{ResourceTypeId, RoomId};
use outpost_core::station::StationError;
use outpost_core::world::StructureKind;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading a scenario.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The RON text failed to parse.
    #[error("scenario parse error: {detail}")]
    Parse { detail: String },

    /// A resource name was declared twice.
    #[error("duplicate resource name '{name}'")]
    DuplicateResource { name: String },

    /// A structure referenced an undeclared resource.
    #[error("unresolved resource reference '{name}' in room {room}")]
    UnresolvedResource { name: String, room: u16 },

    /// The declared refuel resource is not in the resource list.
    #[error("unknown refuel resource '{name}'")]
    UnknownRefuelResource { name: String },

    /// Two rooms share an id.
    #[error("duplicate room id {id}")]
    DuplicateRoom { id: u16 },

    /// Terrain rows failed to parse.
    #[error("bad terrain in room {room}: {detail}")]
    Terrain { room: u16, detail: String },

    /// A station survey failed against the declared world.
    #[error("station survey failed in room {room}")]
    Station { room: u16, source: StationError },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Entry points
// ===========================================================================

/// Load a scenario from a RON file on disk.
pub fn load_scenario(path: &Path) -> Result<ColonyEngine, DataLoadError> {
    let text = std::fs::read_to_string(path)?;
    load_scenario_str(&text)
}

/// Load a scenario from RON text.
pub fn load_scenario_str(text: &str) -> Result<ColonyEngine, DataLoadError> {
    let def: ScenarioDef = ron::from_str(text).map_err(|e| DataLoadError::Parse {
        detail: e.to_string(),
    })?;
    build_engine(&def)
}

// ===========================================================================
// Engine construction
// ===========================================================================

/// Build a ready engine from a parsed scenario.
pub fn build_engine(def: &ScenarioDef) -> Result<ColonyEngine, DataLoadError> {
    let resources = resolve_resources(def)?;

    let mut config = def.config.clone().unwrap_or_default();
    if let Some(name) = &def.refuel_resource {
        config.refuel_resource = *resources.get(name.as_str()).ok_or_else(|| {
            DataLoadError::UnknownRefuelResource { name: name.clone() }
        })?;
    }
    let mut engine = ColonyEngine::new(config);

    let mut seen_rooms = BTreeSet::new();
    for room_def in &def.rooms {
        if !seen_rooms.insert(room_def.id) {
            return Err(DataLoadError::DuplicateRoom { id: room_def.id });
        }
        let room = RoomId(room_def.id);

        let rows: Vec<&str> = room_def.terrain.iter().map(String::as_str).collect();
        let grid = RoomGrid::from_rows(&rows).map_err(|e| DataLoadError::Terrain {
            room: room_def.id,
            detail: e.to_string(),
        })?;
        engine.add_room(room, grid);

        for s in &room_def.structures {
            let pos = Position::new(s.pos.0, s.pos.1);
            let id = match &s.kind {
                StructureKindDef::Node { resource, level, regen } => {
                    let resource = lookup(&resources, resource, room_def.id)?;
                    let node = engine.world.add_structure(
                        room,
                        pos,
                        StructureKind::ResourceNode {
                            resource,
                            level: *level,
                            max_level: *level,
                            regen_per_tick: *regen,
                        },
                    );
                    engine
                        .register_station(room, node)
                        .map_err(|e| DataLoadError::Station { room: room_def.id, source: e })?;
                    node
                }
                StructureKindDef::Bucket { capacity } => engine.world.add_structure(
                    room,
                    pos,
                    StructureKind::Bucket {
                        store: BTreeMap::new(),
                        capacity: *capacity,
                    },
                ),
                StructureKindDef::Producer { resource, store, capacity } => {
                    let resource = lookup(&resources, resource, room_def.id)?;
                    engine.world.add_structure(
                        room,
                        pos,
                        StructureKind::Producer {
                            resource,
                            store: *store,
                            capacity: *capacity,
                            production: None,
                        },
                    )
                }
            };
            if s.depot {
                engine.set_depot(room, id);
            }
        }

        for a in &room_def.agents {
            engine.world.spawn_agent(
                room,
                Position::new(a.pos.0, a.pos.1),
                a.class,
                a.capacity,
                a.ttl,
            );
        }
    }

    Ok(engine)
}

fn resolve_resources(def: &ScenarioDef) -> Result<BTreeMap<&str, ResourceTypeId>, DataLoadError> {
    let mut table = BTreeMap::new();
    for (i, name) in def.resources.iter().enumerate() {
        if table.insert(name.as_str(), ResourceTypeId(i as u32)).is_some() {
            return Err(DataLoadError::DuplicateResource { name: name.clone() });
        }
    }
    Ok(table)
}

fn lookup(
    table: &BTreeMap<&str, ResourceTypeId>,
    name: &str,
    room: u16,
) -> Result<ResourceTypeId, DataLoadError> {
    table
        .get(name)
        .copied()
        .ok_or_else(|| DataLoadError::UnresolvedResource {
            name: name.to_string(),
            room,
        })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_core::harvest::HarvestOptions;
    use outpost_core::world::AgentClass;

    const SCENARIO: &str = r#"(
        name: "twin-nodes",
        resources: ["energy", "ore"],
        refuel_resource: Some("energy"),
        rooms: [(
            id: 0,
            terrain: [
                "............",
                "............",
                "............",
                "............",
                "............",
                "............",
                "............",
                "............",
                "............",
                "............",
                "............",
                "............",
            ],
            structures: [
                (pos: (5, 5), kind: Node(resource: "energy", level: 10000, regen: 10)),
                (pos: (1, 1), kind: Bucket(capacity: 50000), depot: true),
                (pos: (9, 9), kind: Producer(resource: "energy", store: 500, capacity: 1000)),
            ],
            agents: [
                (pos: (2, 2), class: Worker, capacity: 20, ttl: 500),
                (pos: (3, 2), class: Worker, capacity: 20, ttl: 500),
            ],
        )],
    )"#;

    #[test]
    fn golden_scenario_builds_and_runs() {
        let mut engine = load_scenario_str(SCENARIO).unwrap();
        assert_eq!(engine.room_ids(), vec![RoomId(0)]);
        let state = engine.room(RoomId(0)).unwrap();
        assert_eq!(state.registry.len(), 1);
        assert!(state.depot.is_some());
        assert_eq!(engine.world.count_class(RoomId(0), AgentClass::Worker), 2);

        // The loaded colony actually schedules.
        for _ in 0..10 {
            let report = engine.step();
            assert!(report.failures.is_empty());
        }
        let occupied = engine
            .slot_views(RoomId(0))
            .iter()
            .filter(|v| v.occupancy.is_some())
            .count();
        assert_eq!(occupied, 2);
    }

    #[test]
    fn config_overrides_apply() {
        let text = r#"(
            name: "tuned",
            resources: ["energy"],
            config: Some((max_couriers: 7, harvest_rate: 4)),
            rooms: [],
        )"#;
        let engine = load_scenario_str(text).unwrap();
        assert_eq!(engine.config.max_couriers, 7);
        assert_eq!(engine.config.harvest_rate, 4);
        // Untouched fields keep their defaults.
        assert_eq!(engine.config.production_ticks, 3);
    }

    #[test]
    fn duplicate_resource_is_rejected() {
        let text = r#"(
            name: "dup",
            resources: ["energy", "energy"],
            rooms: [],
        )"#;
        assert!(matches!(
            load_scenario_str(text),
            Err(DataLoadError::DuplicateResource { .. })
        ));
    }

    #[test]
    fn unresolved_resource_is_rejected() {
        let text = r#"(
            name: "bad-ref",
            resources: ["energy"],
            rooms: [(
                id: 0,
                terrain: ["....", "....", "....", "...."],
                structures: [
                    (pos: (1, 1), kind: Node(resource: "plutonium", level: 10)),
                ],
            )],
        )"#;
        assert!(matches!(
            load_scenario_str(text),
            Err(DataLoadError::UnresolvedResource { .. })
        ));
    }

    #[test]
    fn duplicate_room_is_rejected() {
        let text = r#"(
            name: "dup-room",
            resources: ["energy"],
            rooms: [
                (id: 3, terrain: ["..", ".."]),
                (id: 3, terrain: ["..", ".."]),
            ],
        )"#;
        assert!(matches!(
            load_scenario_str(text),
            Err(DataLoadError::DuplicateRoom { id: 3 })
        ));
    }

    #[test]
    fn ragged_terrain_is_rejected() {
        let text = r#"(
            name: "ragged",
            resources: ["energy"],
            rooms: [(id: 0, terrain: ["...", ".."])],
        )"#;
        assert!(matches!(
            load_scenario_str(text),
            Err(DataLoadError::Terrain { room: 0, .. })
        ));
    }

    #[test]
    fn garbage_text_is_a_parse_error() {
        assert!(matches!(
            load_scenario_str("not ron at all ["),
            Err(DataLoadError::Parse { .. })
        ));
    }

    #[test]
    fn loaded_colony_accepts_requests() {
        let mut engine = load_scenario_str(SCENARIO).unwrap();
        let worker = engine
            .world
            .agents()
            .find(|(_, a)| a.class == AgentClass::Worker)
            .map(|(id, _)| id)
            .unwrap();
        let status =
            engine.submit_harvest_request(RoomId(0), worker, HarvestOptions { amount: Some(5) });
        assert!(status.is_pending());
    }
}
