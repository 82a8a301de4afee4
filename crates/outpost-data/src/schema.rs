//! Serde schema for scenario files.
//!
//! The schema speaks in names and coordinates; the loader resolves names
//! into arena ids. Nothing here touches the engine directly.

use outpost_core::config::ColonyConfig;
use outpost_core::world::AgentClass;
use serde::Deserialize;

/// A whole scenario: resource declarations, optional config overrides,
/// and rooms.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioDef {
    pub name: String,
    /// Resource names in declaration order; index = resource id.
    pub resources: Vec<String>,
    /// Optional engine config. Omitted fields take their defaults.
    #[serde(default)]
    pub config: Option<ColonyConfig>,
    /// Name of the refuel resource producers store. Defaults to the first
    /// declared resource.
    #[serde(default)]
    pub refuel_resource: Option<String>,
    pub rooms: Vec<RoomDef>,
}

/// One room: terrain glyph rows plus its contents.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomDef {
    pub id: u16,
    /// Glyph rows: `.` open, `~` rough, `#` blocked, `=` improved rough.
    pub terrain: Vec<String>,
    #[serde(default)]
    pub structures: Vec<StructureDef>,
    #[serde(default)]
    pub agents: Vec<AgentDef>,
}

/// A structure placement.
#[derive(Debug, Clone, Deserialize)]
pub struct StructureDef {
    pub pos: (i32, i32),
    pub kind: StructureKindDef,
    /// Marks this structure as the room's offload depot.
    #[serde(default)]
    pub depot: bool,
}

/// Structure kinds as they appear in scenario files.
#[derive(Debug, Clone, Deserialize)]
pub enum StructureKindDef {
    /// A harvestable resource node. A station is surveyed around it.
    Node {
        resource: String,
        level: u32,
        #[serde(default)]
        regen: u32,
    },
    /// A storage bucket.
    Bucket { capacity: u32 },
    /// A production station holding the refuel resource.
    Producer {
        resource: String,
        store: u32,
        capacity: u32,
    },
}

/// A starting agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentDef {
    pub pos: (i32, i32),
    pub class: AgentClass,
    pub capacity: u32,
    pub ttl: u32,
}
