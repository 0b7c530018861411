//! Threat accounting.
//!
//! Threat edges are relations, never ownership: the table stores bare
//! ids, and removing either endpoint removes every edge that references
//! it. AI target selection reads `highest_threat`.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::entity::EntityId;

/// Threat attributed from one attacker towards one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreatEdge {
    pub value: f32,
    /// Simulation time of the last contribution; breaks ties in
    /// [`ThreatTable::highest_threat`].
    pub last_update: f64,
}

/// Per-target aggro tables, keyed by the entity holding the table, then
/// by attacker.
#[derive(Resource, Debug, Default)]
pub struct ThreatTable {
    edges: HashMap<EntityId, HashMap<EntityId, ThreatEdge>>,
}

impl ThreatTable {
    /// Accumulate threat from `attacker` on `target`'s table. Zero and
    /// negative contributions are ignored.
    pub fn add(&mut self, target: EntityId, attacker: EntityId, amount: f32, now: f64) {
        if amount <= 0.0 {
            return;
        }
        let edge = self
            .edges
            .entry(target)
            .or_default()
            .entry(attacker)
            .or_insert(ThreatEdge {
                value: 0.0,
                last_update: now,
            });
        edge.value += amount;
        edge.last_update = now;
        debug!("threat +{amount:.1} {attacker} -> {target}");
    }

    pub fn get(&self, target: EntityId, attacker: EntityId) -> f32 {
        self.edges
            .get(&target)
            .and_then(|table| table.get(&attacker))
            .map(|edge| edge.value)
            .unwrap_or(0.0)
    }

    /// The attacker with the most threat on `target`'s table, ties broken
    /// by most recent contribution.
    pub fn highest_threat(&self, target: EntityId) -> Option<EntityId> {
        let table = self.edges.get(&target)?;
        table
            .iter()
            .max_by(|(_, a), (_, b)| {
                a.value
                    .partial_cmp(&b.value)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(
                        a.last_update
                            .partial_cmp(&b.last_update)
                            .unwrap_or(std::cmp::Ordering::Equal),
                    )
            })
            .map(|(attacker, _)| *attacker)
    }

    /// Number of attackers currently on `target`'s table.
    pub fn attacker_count(&self, target: EntityId) -> usize {
        self.edges.get(&target).map_or(0, |table| table.len())
    }

    /// True if any edge references `entity` on either end.
    pub fn references(&self, entity: EntityId) -> bool {
        self.edges.contains_key(&entity)
            || self.edges.values().any(|table| table.contains_key(&entity))
    }

    /// Remove every edge referencing `entity`, as table holder and as
    /// attacker.
    pub fn remove_entity(&mut self, entity: EntityId) {
        self.edges.remove(&entity);
        for table in self.edges.values_mut() {
            table.remove(&entity);
        }
        self.edges.retain(|_, table| !table.is_empty());
    }
}
