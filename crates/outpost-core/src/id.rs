use serde::{Serialize, Deserialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a mobile worker agent in the world arena.
    pub struct AgentId;

    /// Identifies a fixed structure (resource node, bucket, producer).
    pub struct StructureId;

    /// Identifies a station record in the registry.
    pub struct StationId;
}

/// Identifies a resource type. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceTypeId(pub u32);

/// Identifies a room. Rooms partition the colony; queues never cross rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomId(pub u16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_id_equality() {
        let a = ResourceTypeId(0);
        let b = ResourceTypeId(0);
        let c = ResourceTypeId(1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn room_id_ordering() {
        assert!(RoomId(0) < RoomId(1));
        assert!(RoomId(7) > RoomId(3));
    }

    #[test]
    fn ids_are_usable_as_map_keys() {
        use std::collections::BTreeMap;
        let mut map = BTreeMap::new();
        map.insert(ResourceTypeId(0), "energy");
        map.insert(ResourceTypeId(1), "ore");
        assert_eq!(map[&ResourceTypeId(0)], "energy");
    }
}
