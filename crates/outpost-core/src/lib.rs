//! Outpost Core -- the logistics and resource-allocation engine for
//! tick-driven colony simulations.
//!
//! This crate provides the slot/locking model around resource stations,
//! FIFO harvest queues with per-tick first-fit assignment, partially
//! fulfillable delivery contracts, strict-FIFO renewal queues, per-room
//! personnel backlogs, and versioned snapshot persistence.
//!
//! # Seven-Phase Tick Pipeline
//!
//! Each call to [`engine::ColonyEngine::step`] advances the colony by one
//! tick through the following phases (1-6 per room, 7 global):
//!
//! 1. **Reconcile** -- re-resolve persisted ids; missing entities free
//!    their resources instead of raising.
//! 2. **Stations** -- free completed/lost slot occupancies, drive upkeep
//!    crews, adopt improved expansion tiles.
//! 3. **Harvest** -- drain the request queue into freed slots
//!    (`min(free, queued)` dequeues, first-fit by registration order) and
//!    drive occupants and idle workers.
//! 4. **Delivery** -- bind requests to idle couriers, advance the
//!    collect/deliver cycle, close contracts on fulfillment or on targets
//!    that filled up or vanished.
//! 5. **Renewal** -- serve head-of-queue renewal at each producer.
//! 6. **Maintenance** -- peek-until-satisfied personnel fulfillment.
//! 7. **Bookkeeping** -- production, lifespans, regeneration, decay, tick
//!    counter, state hash.
//!
//! # Key Types
//!
//! - [`engine::ColonyEngine`] -- engine and pipeline orchestrator.
//! - [`station::SourceStation`] / [`station::StationRegistry`] -- fixed
//!   slot sets and first-fit scanning.
//! - [`harvest::ResourceCoordinator`] -- request intake and assignment.
//! - [`delivery::DeliveryCoordinator`] -- contracts and couriers.
//! - [`renewal::RenewalCoordinator`] -- per-producer FIFO renewal.
//! - [`maintenance::MaintenanceCoordinator`] -- personnel backlogs.
//! - [`serialize`] -- versioned snapshots via bitcode.
//! - [`event::EventBus`] -- per-kind ring buffers for observability.
//!
//! Execution is single-threaded and cooperative; determinism is part of
//! the contract. Queued collections iterate in fixed orders, ids come from
//! slotmap arenas, and identical snapshots stepped equally produce
//! identical state hashes.

pub mod config;
pub mod delivery;
pub mod engine;
pub mod event;
pub mod grid;
pub mod harvest;
pub mod id;
pub mod maintenance;
pub mod query;
pub mod queue;
pub mod renewal;
pub mod serialize;
pub mod sim;
pub mod station;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
