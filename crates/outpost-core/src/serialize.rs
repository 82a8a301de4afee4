//! Snapshot support: the durable store the colony rehydrates from.
//!
//! Everything the coordinators persist between ticks — queues, slots,
//! contracts, renewal membership, the world arenas — serializes through
//! `bitcode` behind a versioned header. The event bus is transient
//! observability state and is rebuilt empty on restore; the state hash is
//! recomputed.

use crate::config::ColonyConfig;
use crate::engine::{ColonyEngine, RoomState};
use crate::event::EventBus;
use crate::id::RoomId;
use crate::renewal::RenewalCoordinator;
use crate::sim::SimState;
use crate::world::World;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying an Outpost engine snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x0C01_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during snapshot encoding.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

/// Errors that can occur during snapshot decoding.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

/// Header carried by every snapshot. Enables format detection and version
/// checking before trusting the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick count at the time the snapshot was taken.
    pub tick: u64,
}

impl SnapshotHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Read just the header from snapshot bytes. Decodes the full snapshot
/// because bitcode has no partial deserialization; use it for version
/// probing, not hot paths.
pub fn read_snapshot_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    let snapshot: EngineSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    Ok(snapshot.header)
}

// ---------------------------------------------------------------------------
// Serializable engine state
// ---------------------------------------------------------------------------

/// The persistent portion of the engine. Excludes the event bus (transient)
/// and the cached state hash (recomputed on restore).
#[derive(Debug, Serialize, Deserialize)]
struct EngineSnapshot {
    header: SnapshotHeader,
    world: World,
    rooms: BTreeMap<RoomId, RoomState>,
    renewal: RenewalCoordinator,
    config: ColonyConfig,
    sim_state: SimState,
}

impl ColonyEngine {
    /// Serialize the engine into snapshot bytes.
    pub fn snapshot(&self) -> Result<Vec<u8>, SerializeError> {
        let snapshot = EngineSnapshot {
            header: SnapshotHeader::new(self.sim_state.tick),
            world: self.world.clone(),
            rooms: self.rooms.clone(),
            renewal: self.renewal.clone(),
            config: self.config.clone(),
            sim_state: self.sim_state.clone(),
        };
        bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Rebuild an engine from snapshot bytes. The event bus starts empty
    /// and the state hash is recomputed from the restored state.
    pub fn restore(data: &[u8]) -> Result<Self, DeserializeError> {
        let snapshot: EngineSnapshot =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        snapshot.header.validate()?;

        let event_capacity = snapshot.config.event_capacity;
        let mut engine = ColonyEngine {
            world: snapshot.world,
            rooms: snapshot.rooms,
            renewal: snapshot.renewal,
            config: snapshot.config,
            sim_state: snapshot.sim_state,
            event_bus: EventBus::new(event_capacity),
            last_state_hash: 0,
        };
        engine.last_state_hash = engine.compute_state_hash();
        Ok(engine)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
