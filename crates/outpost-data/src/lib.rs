//! Scenario loading for Outpost colonies.
//!
//! Scenarios are RON files that declare resource names, per-room terrain
//! glyph maps, structures, and starting agents. The loader resolves names
//! to ids, builds the world, surveys stations, and hands back a ready
//! [`outpost_core::engine::ColonyEngine`].
//!
//! ```ron
//! (
//!     name: "twin-nodes",
//!     resources: ["energy"],
//!     rooms: [(
//!         id: 0,
//!         terrain: [
//!             "..........",
//!             ".....~....",
//!             "..........",
//!         ],
//!         structures: [
//!             (pos: (5, 1), kind: Node(resource: "energy", level: 10000)),
//!             (pos: (1, 1), kind: Bucket(capacity: 50000), depot: true),
//!         ],
//!         agents: [
//!             (pos: (2, 2), class: Worker, capacity: 20, ttl: 500),
//!         ],
//!     )],
//! )
//! ```

pub mod loader;
pub mod schema;

pub use loader::{build_engine, load_scenario, load_scenario_str, DataLoadError};
pub use schema::{AgentDef, RoomDef, ScenarioDef, StructureDef, StructureKindDef};
