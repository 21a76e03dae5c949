//! Condition Store - immutable snapshots of alarm conditions per sensor kind
//!
//! Readers grab an `Arc<ConditionSnapshot>` at the start of an evaluation
//! and keep using it even if an administrative write publishes a newer one.
//! Writers validate first, then swap in a fresh snapshot under a short lock.

use std::collections::HashMap;
use std::sync::Arc;

use fieldwatch_model::Condition;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::Result;
use crate::validation::validate_condition_set;

/// Conditions of one sensor kind
#[derive(Debug, Default)]
struct KindConditions {
    /// Everything stored, in submission order
    all: Vec<Arc<Condition>>,
    /// Active conditions only, ordered by display order then id
    active: Vec<Arc<Condition>>,
}

impl KindConditions {
    fn new(conditions: Vec<Condition>) -> Self {
        let all: Vec<Arc<Condition>> = conditions.into_iter().map(Arc::new).collect();
        let mut active: Vec<Arc<Condition>> = all.iter().filter(|c| c.active).cloned().collect();
        active.sort_by_key(|c| (c.display_order, c.id));
        Self { all, active }
    }
}

/// Point-in-time view of all conditions
#[derive(Debug, Default)]
pub struct ConditionSnapshot {
    version: u64,
    by_kind: HashMap<String, Arc<KindConditions>>,
}

impl ConditionSnapshot {
    /// Active conditions of a sensor kind; `None` when the kind is unknown
    pub fn conditions_for(&self, sensor_kind: &str) -> Option<&[Arc<Condition>]> {
        self.by_kind.get(sensor_kind).map(|k| k.active.as_slice())
    }

    /// Every stored condition of a sensor kind, including inactive ones
    pub fn all_for(&self, sensor_kind: &str) -> Option<&[Arc<Condition>]> {
        self.by_kind.get(sensor_kind).map(|k| k.all.as_slice())
    }

    pub fn sensor_kinds(&self) -> impl Iterator<Item = &str> {
        self.by_kind.keys().map(String::as_str)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Total number of stored conditions
    pub fn len(&self) -> usize {
        self.by_kind.values().map(|k| k.all.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Condition cache shared by all producers
#[derive(Debug, Default)]
pub struct ConditionStore {
    current: RwLock<Arc<ConditionSnapshot>>,
}

impl ConditionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot; cheap to call once per evaluation
    pub fn snapshot(&self) -> Arc<ConditionSnapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// Validate and atomically replace every condition of one sensor kind
    ///
    /// Nothing is published when validation fails.
    pub fn replace_sensor_kind(&self, sensor_kind: &str, conditions: Vec<Condition>) -> Result<()> {
        validate_condition_set(sensor_kind, &conditions)?;

        let count = conditions.len();
        let entry = Arc::new(KindConditions::new(conditions));
        let version = self.publish(|by_kind| {
            by_kind.insert(sensor_kind.to_string(), entry);
        });

        info!(
            "Conditions replaced: kind={} count={} version={}",
            sensor_kind, count, version
        );
        Ok(())
    }

    /// Drop a sensor kind entirely; returns whether it existed
    pub fn remove_sensor_kind(&self, sensor_kind: &str) -> bool {
        let mut existed = false;
        let version = self.publish(|by_kind| {
            existed = by_kind.remove(sensor_kind).is_some();
        });
        if existed {
            info!("Conditions removed: kind={} version={}", sensor_kind, version);
        }
        existed
    }

    /// Bulk load a flat condition list, grouped by sensor kind
    ///
    /// Every group is validated before anything is published.
    pub fn load(&self, conditions: Vec<Condition>) -> Result<usize> {
        let mut grouped: HashMap<String, Vec<Condition>> = HashMap::new();
        for condition in conditions {
            grouped
                .entry(condition.sensor_kind.clone())
                .or_default()
                .push(condition);
        }
        for (kind, group) in &grouped {
            validate_condition_set(kind, group)?;
        }

        let total: usize = grouped.values().map(Vec::len).sum();
        let kinds = grouped.len();
        let version = self.publish(|by_kind| {
            for (kind, group) in grouped {
                by_kind.insert(kind, Arc::new(KindConditions::new(group)));
            }
        });

        info!(
            "Conditions loaded: {} across {} sensor kinds (version {})",
            total, kinds, version
        );
        Ok(total)
    }

    /// Copy-on-write publish; writers are serialized by the write lock
    fn publish(&self, mutate: impl FnOnce(&mut HashMap<String, Arc<KindConditions>>)) -> u64 {
        let mut current = self.current.write();
        let mut by_kind = current.by_kind.clone();
        mutate(&mut by_kind);
        let version = current.version + 1;
        *current = Arc::new(ConditionSnapshot { version, by_kind });
        debug!("Condition snapshot published: version={}", version);
        version
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use fieldwatch_model::{Operator, Severity};

    fn th_conditions() -> Vec<Condition> {
        vec![
            Condition::between(1, "TH", Severity::Warning, 25.0, 30.0).with_display_order(2),
            Condition::numeric(2, "TH", Severity::Danger, Operator::GreaterThan, 30.0)
                .with_display_order(1),
            Condition::numeric(3, "TH", Severity::Caution, Operator::LessThan, 0.0)
                .with_active(false),
        ]
    }

    #[test]
    fn test_active_conditions_sorted() {
        let store = ConditionStore::new();
        store.replace_sensor_kind("TH", th_conditions()).unwrap();

        let snapshot = store.snapshot();
        let active = snapshot.conditions_for("TH").unwrap();
        let ids: Vec<i64> = active.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(snapshot.all_for("TH").unwrap().len(), 3);
        assert!(snapshot.conditions_for("TILT").is_none());
    }

    #[test]
    fn test_snapshot_isolated_from_later_writes() {
        let store = ConditionStore::new();
        store.replace_sensor_kind("TH", th_conditions()).unwrap();
        let before = store.snapshot();

        store
            .replace_sensor_kind(
                "TH",
                vec![Condition::numeric(9, "TH", Severity::Danger, Operator::GreaterThan, 50.0)],
            )
            .unwrap();

        assert_eq!(before.conditions_for("TH").unwrap().len(), 2);
        assert_eq!(store.snapshot().conditions_for("TH").unwrap().len(), 1);
        assert!(store.version() > before.version());
    }

    #[test]
    fn test_invalid_batch_not_published() {
        let store = ConditionStore::new();
        store.replace_sensor_kind("TH", th_conditions()).unwrap();
        let version = store.version();

        let overlapping = vec![
            Condition::between(1, "TH", Severity::Warning, 25.0, 30.0),
            Condition::between(2, "TH", Severity::Danger, 28.0, 40.0),
        ];
        assert!(store.replace_sensor_kind("TH", overlapping).is_err());
        assert_eq!(store.version(), version);
        assert_eq!(store.snapshot().conditions_for("TH").unwrap().len(), 2);
    }

    #[test]
    fn test_load_and_remove() {
        let store = ConditionStore::new();
        let mut all = th_conditions();
        all.push(Condition::tolerance(10, "TILT", Severity::Danger, 5.0, 90.0));
        assert_eq!(store.load(all).unwrap(), 4);
        assert_eq!(store.snapshot().len(), 4);

        assert!(store.remove_sensor_kind("TILT"));
        assert!(!store.remove_sensor_kind("TILT"));
        assert!(store.snapshot().conditions_for("TILT").is_none());
    }
}
