//! Per-entity combat logs.
//!
//! Every damage resolution is appended to both participants' logs before
//! any death hook fires, so a consumer replaying a log always sees the
//! killing blow. Each log is a bounded ring buffer; old entries fall off
//! the front.

use bevy::prelude::*;
use std::collections::{HashMap, VecDeque};

use crate::entity::EntityId;

use super::damage::DamageRecord;

/// Ring-buffer capacity per entity.
pub const COMBAT_LOG_CAPACITY: usize = 1000;

#[derive(Resource, Debug, Default)]
pub struct CombatLogs {
    logs: HashMap<EntityId, VecDeque<DamageRecord>>,
}

impl CombatLogs {
    /// Append `record` to both participants' logs.
    pub fn record(&mut self, record: &DamageRecord) {
        self.push(record.attacker, record.clone());
        if record.target != record.attacker {
            self.push(record.target, record.clone());
        }
    }

    fn push(&mut self, entity: EntityId, record: DamageRecord) {
        let log = self.logs.entry(entity).or_default();
        if log.len() >= COMBAT_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(record);
    }

    /// The most recent `max_entries` records for `entity`, oldest first.
    pub fn recent(&self, entity: EntityId, max_entries: usize) -> Vec<&DamageRecord> {
        match self.logs.get(&entity) {
            Some(log) => {
                let skip = log.len().saturating_sub(max_entries);
                log.iter().skip(skip).collect()
            }
            None => Vec::new(),
        }
    }

    pub fn len(&self, entity: EntityId) -> usize {
        self.logs.get(&entity).map_or(0, |log| log.len())
    }

    pub fn remove_entity(&mut self, entity: EntityId) {
        self.logs.remove(&entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::damage::{periodic_record, DamageType};

    #[test]
    fn ring_buffer_drops_oldest() {
        let mut logs = CombatLogs::default();
        let a = EntityId::new(1);
        let b = EntityId::new(2);
        for i in 0..(COMBAT_LOG_CAPACITY + 10) {
            logs.record(&periodic_record(a, b, DamageType::Physical, 1.0, i as f64));
        }
        assert_eq!(logs.len(a), COMBAT_LOG_CAPACITY);
        let recent = logs.recent(a, 5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[4].timestamp, (COMBAT_LOG_CAPACITY + 9) as f64);
    }
}
