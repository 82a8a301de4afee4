//! The bounded FIFO of pending harvest requests.
//!
//! Insertion order is service order; the queue itself never inspects the
//! world. Membership scans are linear and used together with
//! slot-occupancy checks to keep an agent out of two waiting sets at once.

use crate::id::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A pending request: an agent waiting for a harvest slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestRequest {
    pub agent: AgentId,
    pub amount: u32,
}

/// FIFO of harvest requests with a fixed capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestQueue {
    entries: VecDeque<HarvestRequest>,
    capacity: usize,
}

impl HarvestQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a request. Returns the new length, or `None` when the queue
    /// is at capacity.
    pub fn enqueue(&mut self, request: HarvestRequest) -> Option<usize> {
        if self.entries.len() >= self.capacity {
            return None;
        }
        self.entries.push_back(request);
        Some(self.entries.len())
    }

    /// Pop the front request.
    pub fn dequeue(&mut self) -> Option<HarvestRequest> {
        self.entries.pop_front()
    }

    /// Linear membership scan.
    pub fn contains_agent(&self, agent: AgentId) -> bool {
        self.entries.iter().any(|r| r.agent == agent)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HarvestRequest> {
        self.entries.iter()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
