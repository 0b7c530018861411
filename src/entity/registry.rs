//! Entity registry: the single writer of combat entity lifetime.
//!
//! Maps stable [`EntityId`]s to ECS entities. Every other engine stores
//! bare ids and resolves them here on demand, so destroying an entity is
//! a matter of removing its rows everywhere — which is exactly what the
//! deferred unregistration cascade does at the end of the tick.

use bevy::prelude::*;
use std::collections::HashMap;

use super::EntityId;

#[derive(Resource, Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<EntityId, Entity>,
    pending_removals: Vec<EntityId>,
}

impl EntityRegistry {
    /// Record the ECS entity backing `id`. Re-registering an id replaces
    /// the old mapping.
    pub fn register(&mut self, id: EntityId, entity: Entity) {
        if self.entities.insert(id, entity).is_some() {
            warn!("entity {id} re-registered; previous handle replaced");
        } else {
            debug!("registered combat entity {id}");
        }
    }

    /// The ECS entity behind `id`, if registered. Hot path.
    pub fn lookup(&self, id: EntityId) -> Option<Entity> {
        self.entities.get(&id).copied()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Queue `id` for removal at the end of the current tick sub-phase.
    /// Idempotent; unknown ids are ignored. Deferral keeps iterations
    /// that are in flight this tick valid.
    pub fn unregister(&mut self, id: EntityId) {
        if self.entities.contains_key(&id) && !self.pending_removals.contains(&id) {
            self.pending_removals.push(id);
        }
    }

    /// True once `id` is queued for removal this tick.
    pub fn is_unregistering(&self, id: EntityId) -> bool {
        self.pending_removals.contains(&id)
    }

    /// Drain the queued removals, dropping each mapping. The caller is
    /// responsible for cascading into the per-entity tables and
    /// despawning the returned ECS entities.
    pub fn take_pending(&mut self) -> Vec<(EntityId, Entity)> {
        let pending = std::mem::take(&mut self.pending_removals);
        let mut removed = Vec::with_capacity(pending.len());
        for id in pending {
            if let Some(entity) = self.entities.remove(&id) {
                debug!("unregistered combat entity {id}");
                removed.push((id, entity));
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregister_is_idempotent_and_deferred() {
        let mut registry = EntityRegistry::default();
        let id = EntityId::new(9);
        registry.register(id, Entity::from_raw(1));
        registry.unregister(id);
        registry.unregister(id);
        // Still resolvable until the cascade runs.
        assert!(registry.lookup(id).is_some());
        let removed = registry.take_pending();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].0, id);
        assert!(registry.lookup(id).is_none());
        assert!(registry.take_pending().is_empty());
    }
}
