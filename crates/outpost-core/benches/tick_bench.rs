//! Criterion benchmarks for the colony engine.
//!
//! Two groups:
//! - `small_colony`: 1 room, 4 stations, 24 workers -- the common case.
//! - `wide_colony`: 8 rooms with full worker/courier churn -- stresses the
//!   per-room pipeline and reconcile passes.

use criterion::{criterion_group, criterion_main, Criterion};
use outpost_core::config::ColonyConfig;
use outpost_core::delivery::DeliveryRequest;
use outpost_core::engine::ColonyEngine;
use outpost_core::grid::{Position, RoomGrid};
use outpost_core::harvest::HarvestOptions;
use outpost_core::id::RoomId;
use outpost_core::test_utils::*;
use outpost_core::world::AgentClass;

fn build_room(engine: &mut ColonyEngine, room: RoomId, stations: usize, workers: usize) {
    engine.add_room(room, RoomGrid::open(24, 24));

    for i in 0..stations {
        let node = engine.world.add_structure(
            room,
            Position::new(4 + (i as i32 % 4) * 5, 4 + (i as i32 / 4) * 5),
            regenerating_node_kind(energy(), 100_000, 20),
        );
        engine.register_station(room, node).expect("node resolves");
    }

    let depot = engine
        .world
        .add_structure(room, Position::new(1, 1), bucket_kind(1_000_000));
    engine.set_depot(room, depot);
    let target = engine
        .world
        .add_structure(room, Position::new(20, 20), bucket_kind(1_000_000));
    engine
        .world
        .add_structure(room, Position::new(12, 12), producer_kind(energy(), 100_000));

    for i in 0..workers {
        let worker = engine.world.spawn_agent(
            room,
            Position::new(i as i32 % 20, 2 + i as i32 / 20),
            AgentClass::Worker,
            20,
            1000,
        );
        engine.submit_harvest_request(room, worker, HarvestOptions::default());
    }
    engine.accept_delivery_requests(
        room,
        [DeliveryRequest { bucket: target, resource: energy(), amount: 5000 }],
    );
}

fn build_small_colony() -> ColonyEngine {
    let mut engine = ColonyEngine::new(ColonyConfig::default());
    build_room(&mut engine, RoomId(0), 4, 24);
    engine
}

fn build_wide_colony() -> ColonyEngine {
    let mut engine = ColonyEngine::new(ColonyConfig::default());
    for r in 0..8 {
        build_room(&mut engine, RoomId(r), 3, 16);
    }
    engine
}

fn bench_small_colony(c: &mut Criterion) {
    c.bench_function("small_colony_tick", |b| {
        let mut engine = build_small_colony();
        // Warm the colony into steady state before measuring.
        for _ in 0..50 {
            engine.step();
        }
        b.iter(|| {
            engine.step();
        });
    });
}

fn bench_wide_colony(c: &mut Criterion) {
    c.bench_function("wide_colony_tick", |b| {
        let mut engine = build_wide_colony();
        for _ in 0..50 {
            engine.step();
        }
        b.iter(|| {
            engine.step();
        });
    });
}

fn bench_snapshot_round_trip(c: &mut Criterion) {
    c.bench_function("snapshot_round_trip", |b| {
        let mut engine = build_small_colony();
        for _ in 0..50 {
            engine.step();
        }
        b.iter(|| {
            let bytes = engine.snapshot().expect("snapshot");
            ColonyEngine::restore(&bytes).expect("restore")
        });
    });
}

criterion_group!(
    benches,
    bench_small_colony,
    bench_wide_colony,
    bench_snapshot_round_trip
);
criterion_main!(benches);
