//! Typed observability events with pre-allocated ring buffers.
//!
//! Coordinators report outcomes; the engine turns them into events and
//! records them here. Buffers are per-kind rings with a fixed capacity:
//! when one fills, the oldest entries are dropped. Kinds can be
//! suppressed, at which point recording them costs nothing. Events are
//! transient observability state and are not part of snapshots.

use crate::delivery::CloseReason;
use crate::grid::Position;
use crate::id::{AgentId, RoomId, StationId, StructureId};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Slots --
    SlotAssigned {
        station: StationId,
        agent: AgentId,
        pos: Position,
        tick: u64,
    },
    SlotsCompleted {
        room: RoomId,
        count: u32,
        tick: u64,
    },
    SlotsLost {
        room: RoomId,
        count: u32,
        tick: u64,
    },

    // -- Delivery --
    ContractOpened {
        courier: AgentId,
        bucket: StructureId,
        amount: u32,
        tick: u64,
    },
    ContractClosed {
        courier: AgentId,
        bucket: StructureId,
        delivered: u32,
        reason: CloseReason,
        tick: u64,
    },

    // -- Renewal --
    RenewalStep {
        agent: AgentId,
        producer: StructureId,
        tick: u64,
    },
    RenewalCompleted {
        agent: AgentId,
        tick: u64,
    },

    // -- Population --
    AgentProduced {
        producer: StructureId,
        agent: AgentId,
        tag: Option<StructureId>,
        tick: u64,
    },
    AgentExpired {
        agent: AgentId,
        tick: u64,
    },

    // -- Stations --
    StationExpanded {
        station: StationId,
        pos: Position,
        tick: u64,
    },
}

/// Discriminant tag for event types, used for suppression and draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SlotAssigned,
    SlotsCompleted,
    SlotsLost,
    ContractOpened,
    ContractClosed,
    RenewalStep,
    RenewalCompleted,
    AgentProduced,
    AgentExpired,
    StationExpanded,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 10;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::SlotAssigned { .. } => EventKind::SlotAssigned,
            Event::SlotsCompleted { .. } => EventKind::SlotsCompleted,
            Event::SlotsLost { .. } => EventKind::SlotsLost,
            Event::ContractOpened { .. } => EventKind::ContractOpened,
            Event::ContractClosed { .. } => EventKind::ContractClosed,
            Event::RenewalStep { .. } => EventKind::RenewalStep,
            Event::RenewalCompleted { .. } => EventKind::RenewalCompleted,
            Event::AgentProduced { .. } => EventKind::AgentProduced,
            Event::AgentExpired { .. } => EventKind::AgentExpired,
            Event::StationExpanded { .. } => EventKind::StationExpanded,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer — pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    /// Number of events currently stored.
    len: usize,
    /// Total events ever written, including dropped ones.
    total_written: u64,
}

impl EventBuffer {
    /// Create a new ring buffer. A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            events: vec![None; capacity.max(1)],
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        let capacity = self.events.len();
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % capacity;
        self.len = (self.len + 1).min(capacity);
        self.total_written += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Drain the buffered events oldest-first.
    pub fn drain(&mut self) -> Vec<Event> {
        let capacity = self.events.len();
        let start = (self.head + capacity - self.len) % capacity;
        let mut out = Vec::with_capacity(self.len);
        for i in 0..self.len {
            if let Some(event) = self.events[(start + i) % capacity].take() {
                out.push(event);
            }
        }
        self.len = 0;
        out
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Per-kind ring buffers with suppression.
#[derive(Debug)]
pub struct EventBus {
    buffers: Vec<EventBuffer>,
    suppressed: [bool; EVENT_KIND_COUNT],
}

impl EventBus {
    pub fn new(capacity_per_kind: usize) -> Self {
        Self {
            buffers: (0..EVENT_KIND_COUNT)
                .map(|_| EventBuffer::new(capacity_per_kind))
                .collect(),
            suppressed: [false; EVENT_KIND_COUNT],
        }
    }

    /// Record an event unless its kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let kind = event.kind();
        if self.suppressed[kind.index()] {
            return;
        }
        self.buffers[kind.index()].push(event);
    }

    /// Suppress a kind: recording it becomes free and drops the event.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
    }

    pub fn unsuppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = false;
    }

    /// Drain one kind's buffered events, oldest-first.
    pub fn drain(&mut self, kind: EventKind) -> Vec<Event> {
        self.buffers[kind.index()].drain()
    }

    /// Drain everything, kinds in declaration order, oldest-first within
    /// each kind.
    pub fn drain_all(&mut self) -> Vec<Event> {
        self.buffers.iter_mut().flat_map(|b| b.drain()).collect()
    }

    pub fn pending(&self, kind: EventKind) -> usize {
        self.buffers[kind.index()].len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn agent_id() -> AgentId {
        let mut sm = SlotMap::<AgentId, ()>::with_key();
        sm.insert(())
    }

    fn expired(tick: u64) -> Event {
        Event::AgentExpired { agent: agent_id(), tick }
    }

    #[test]
    fn drain_returns_events_oldest_first() {
        let mut buffer = EventBuffer::new(8);
        for tick in 0..3 {
            buffer.push(expired(tick));
        }

        let drained = buffer.drain();
        assert_eq!(drained.len(), 3);
        for (i, event) in drained.iter().enumerate() {
            assert!(matches!(event, Event::AgentExpired { tick, .. } if *tick == i as u64));
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn full_ring_drops_the_oldest() {
        let mut buffer = EventBuffer::new(2);
        for tick in 0..5 {
            buffer.push(expired(tick));
        }

        assert_eq!(buffer.total_written(), 5);
        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], Event::AgentExpired { tick: 3, .. }));
        assert!(matches!(drained[1], Event::AgentExpired { tick: 4, .. }));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut buffer = EventBuffer::new(0);
        buffer.push(expired(1));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn bus_routes_by_kind() {
        let mut bus = EventBus::new(8);
        bus.emit(expired(1));
        bus.emit(Event::RenewalCompleted { agent: agent_id(), tick: 1 });

        assert_eq!(bus.pending(EventKind::AgentExpired), 1);
        assert_eq!(bus.pending(EventKind::RenewalCompleted), 1);
        assert_eq!(bus.drain(EventKind::AgentExpired).len(), 1);
        assert_eq!(bus.pending(EventKind::AgentExpired), 0);
        assert_eq!(bus.pending(EventKind::RenewalCompleted), 1);
    }

    #[test]
    fn suppressed_kinds_record_nothing() {
        let mut bus = EventBus::new(8);
        bus.suppress(EventKind::AgentExpired);
        bus.emit(expired(1));
        assert_eq!(bus.pending(EventKind::AgentExpired), 0);

        bus.unsuppress(EventKind::AgentExpired);
        bus.emit(expired(2));
        assert_eq!(bus.pending(EventKind::AgentExpired), 1);
    }

    #[test]
    fn drain_all_covers_every_kind() {
        let mut bus = EventBus::new(8);
        bus.emit(expired(1));
        bus.emit(Event::RenewalCompleted { agent: agent_id(), tick: 2 });
        bus.emit(expired(3));

        let all = bus.drain_all();
        assert_eq!(all.len(), 3);
        assert_eq!(bus.drain_all().len(), 0);
    }
}
