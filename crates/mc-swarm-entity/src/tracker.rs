//! Entity registry of one bot.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::entity::Entity;

/// Shared handle to one tracked entity.
pub type EntityRef = Arc<RwLock<Entity>>;

/// Entities by network id. Plugins may read it from other threads while
/// the bot's worker ticks it.
#[derive(Debug, Default)]
pub struct EntityTracker {
    entities: RwLock<HashMap<i32, EntityRef>>,
}

impl EntityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `entity`, replacing any entity with the same id.
    pub fn add_entity(&self, entity: Entity) -> EntityRef {
        let entity = Arc::new(RwLock::new(entity));
        self.add_entity_ref(entity.clone());
        entity
    }

    pub fn add_entity_ref(&self, entity: EntityRef) {
        let id = entity.read().id();
        self.entities.write().insert(id, entity);
    }

    pub fn remove_entity(&self, id: i32) -> Option<EntityRef> {
        self.entities.write().remove(&id)
    }

    pub fn get_entity(&self, id: i32) -> Option<EntityRef> {
        self.entities.read().get(&id).cloned()
    }

    pub fn get_entity_by_uuid(&self, uuid: Uuid) -> Option<EntityRef> {
        self.entities
            .read()
            .values()
            .find(|e| e.read().uuid() == uuid)
            .cloned()
    }

    /// Copy of the current entity list.
    pub fn get_entities(&self) -> Vec<EntityRef> {
        self.entities.read().values().cloned().collect()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.read().len()
    }

    pub fn clear(&self) {
        self.entities.write().clear();
    }

    /// Tick a snapshot of every entity. The map lock is not held while
    /// entities tick, so tick code may add or remove entities.
    pub fn tick(&self) {
        for entity in self.get_entities() {
            let mut entity = entity.write();
            entity.set_old_pos_and_rot();
            entity.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_swarm_world::geometry::Vec3;

    fn entity(id: i32) -> Entity {
        Entity::new(id, Uuid::from_u128(id as u128), 5)
    }

    #[test]
    fn add_get_remove() {
        let tracker = EntityTracker::new();
        tracker.add_entity(entity(1));
        tracker.add_entity(entity(2));
        assert_eq!(tracker.entity_count(), 2);
        assert_eq!(tracker.get_entity(2).map(|e| e.read().id()), Some(2));
        assert!(tracker.get_entity_by_uuid(Uuid::from_u128(1)).is_some());

        assert!(tracker.remove_entity(1).is_some());
        assert!(tracker.remove_entity(1).is_none());
        assert!(tracker.get_entity(1).is_none());
        assert_eq!(tracker.entity_count(), 1);
    }

    #[test]
    fn same_id_replaces() {
        let tracker = EntityTracker::new();
        tracker.add_entity(entity(7));
        let mut other = Entity::new(7, Uuid::from_u128(99), 10);
        other.set_position(Vec3::new(1.0, 2.0, 3.0));
        tracker.add_entity(other);
        assert_eq!(tracker.entity_count(), 1);
        assert_eq!(tracker.get_entity(7).unwrap().read().entity_type(), 10);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let tracker = EntityTracker::new();
        tracker.add_entity(entity(1));
        let snapshot = tracker.get_entities();
        tracker.clear();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(tracker.entity_count(), 0);
    }

    #[test]
    fn tick_records_previous_position() {
        let tracker = EntityTracker::new();
        let handle = tracker.add_entity(entity(1));
        handle.write().set_position(Vec3::new(5.0, 0.0, 0.0));
        tracker.tick();
        handle.write().set_position(Vec3::new(6.0, 0.0, 0.0));
        let e = handle.read();
        assert_eq!(e.old_position, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(e.ticks_existed, 1);
    }
}
