// Storage of (state, action) value estimates
// Ephemeral in-memory implementation; the durable one lives in `crate::sql`

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::reinforcement::state::{SearchState, StateKey, ValueKey};

/// Stored value estimate with the last observation that wrote it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueEntry {
    pub key: ValueKey,
    pub value: f64,
    /// Serialized state of the last write (diagnostics only)
    pub last_state: Option<String>,
    pub last_reward: f64,
    pub last_query: String,
    pub updated_at: DateTime<Utc>,
}

/// A value write together with the observation behind it
#[derive(Debug, Clone, Copy)]
pub struct ValueUpdate<'a> {
    pub key: &'a ValueKey,
    pub value: f64,
    pub state: &'a SearchState,
    pub reward: f64,
    pub query: &'a str,
}

impl ValueUpdate<'_> {
    /// Build the row this update leaves behind
    pub fn to_entry(&self) -> EngineResult<ValueEntry> {
        Ok(ValueEntry {
            key: self.key.clone(),
            value: self.value,
            last_state: Some(serde_json::to_string(self.state)?),
            last_reward: self.reward,
            last_query: self.query.to_string(),
            updated_at: Utc::now(),
        })
    }
}

/// Persistent mapping from (state key, action) to a scalar value
///
/// Writes overwrite; there is at most one entry per key.
pub trait ValueStore: Send + Sync {
    /// Stored value, or `None` for pairs never written
    fn get_value(&self, key: &ValueKey) -> EngineResult<Option<f64>>;

    /// Best action recorded for a state; ties go to the first-written action
    fn get_best_value(&self, state: &StateKey) -> EngineResult<Option<(String, f64)>>;

    /// Insert or overwrite the value of a pair
    fn set_value(&self, update: ValueUpdate<'_>) -> EngineResult<()>;

    /// Full stored row for diagnostics
    fn entry(&self, key: &ValueKey) -> EngineResult<Option<ValueEntry>>;

    /// Number of stored pairs
    fn len(&self) -> EngineResult<usize>;

    fn is_empty(&self) -> EngineResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove every stored pair
    fn clear(&self) -> EngineResult<()>;

    /// Remove pairs not written since `cutoff`; returns how many were removed
    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> EngineResult<usize>;
}

/// Values kept in process memory; lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryValueStore {
    /// Entries grouped by state, in first-written order
    entries: RwLock<HashMap<StateKey, Vec<ValueEntry>>>,
}

impl MemoryValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned<E>(_: E) -> EngineError {
        EngineError::persistence("memory value store lock poisoned")
    }
}

impl ValueStore for MemoryValueStore {
    fn get_value(&self, key: &ValueKey) -> EngineResult<Option<f64>> {
        let entries = self.entries.read().map_err(Self::poisoned)?;
        Ok(entries
            .get(&key.state)
            .and_then(|row| row.iter().find(|e| e.key.action == key.action))
            .map(|e| e.value))
    }

    fn get_best_value(&self, state: &StateKey) -> EngineResult<Option<(String, f64)>> {
        let entries = self.entries.read().map_err(Self::poisoned)?;
        let mut best: Option<(&str, f64)> = None;
        for entry in entries.get(state).into_iter().flatten() {
            match best {
                Some((_, value)) if entry.value <= value => {}
                _ => best = Some((&entry.key.action, entry.value)),
            }
        }
        Ok(best.map(|(action, value)| (action.to_string(), value)))
    }

    fn set_value(&self, update: ValueUpdate<'_>) -> EngineResult<()> {
        let entry = update.to_entry()?;
        let mut entries = self.entries.write().map_err(Self::poisoned)?;
        let row = entries.entry(update.key.state.clone()).or_default();
        match row.iter_mut().find(|e| e.key.action == update.key.action) {
            Some(existing) => *existing = entry,
            None => row.push(entry),
        }
        Ok(())
    }

    fn entry(&self, key: &ValueKey) -> EngineResult<Option<ValueEntry>> {
        let entries = self.entries.read().map_err(Self::poisoned)?;
        Ok(entries
            .get(&key.state)
            .and_then(|row| row.iter().find(|e| e.key.action == key.action))
            .cloned())
    }

    fn len(&self) -> EngineResult<usize> {
        let entries = self.entries.read().map_err(Self::poisoned)?;
        Ok(entries.values().map(Vec::len).sum())
    }

    fn clear(&self) -> EngineResult<()> {
        self.entries.write().map_err(Self::poisoned)?.clear();
        Ok(())
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> EngineResult<usize> {
        let mut entries = self.entries.write().map_err(Self::poisoned)?;
        let mut removed = 0;
        for row in entries.values_mut() {
            let before = row.len();
            row.retain(|e| e.updated_at >= cutoff);
            removed += before - row.len();
        }
        entries.retain(|_, row| !row.is_empty());
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reinforcement::state::StateEncoder;

    fn key(state: &StateKey, action: &str) -> ValueKey {
        ValueKey::new(state.clone(), action)
    }

    fn write(store: &dyn ValueStore, key: &ValueKey, value: f64) {
        let state = SearchState::initial("n", "q");
        store
            .set_value(ValueUpdate {
                key,
                value,
                state: &state,
                reward: 0.5,
                query: "q",
            })
            .unwrap();
    }

    #[test]
    fn test_unseen_pairs_are_not_found() {
        let store = MemoryValueStore::new();
        let state = StateEncoder::new().encode_parts("n", "q", 0);
        assert_eq!(store.get_value(&key(&state, "move_to:x")).unwrap(), None);
        assert_eq!(store.get_best_value(&state).unwrap(), None);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_set_value_overwrites() {
        let store = MemoryValueStore::new();
        let state = StateEncoder::new().encode_parts("n", "q", 0);
        let k = key(&state, "move_to:x");
        write(&store, &k, 0.2);
        write(&store, &k, 0.7);

        assert_eq!(store.get_value(&k).unwrap(), Some(0.7));
        assert_eq!(store.len().unwrap(), 1);
        let entry = store.entry(&k).unwrap().unwrap();
        assert_eq!(entry.last_query, "q");
        assert!(entry.last_state.unwrap().contains("\"node_id\":\"n\""));
    }

    #[test]
    fn test_best_value_ties_go_to_first_written() {
        let store = MemoryValueStore::new();
        let state = StateEncoder::new().encode_parts("n", "q", 0);
        write(&store, &key(&state, "move_to:b"), 0.5);
        write(&store, &key(&state, "move_to:a"), 0.5);
        write(&store, &key(&state, "move_to:c"), -1.0);

        assert_eq!(
            store.get_best_value(&state).unwrap(),
            Some(("move_to:b".to_string(), 0.5))
        );

        // Overwriting keeps the original position
        write(&store, &key(&state, "move_to:b"), 0.1);
        write(&store, &key(&state, "move_to:b"), 0.5);
        assert_eq!(store.get_best_value(&state).unwrap().unwrap().0, "move_to:b");
    }

    #[test]
    fn test_best_value_can_be_negative() {
        let store = MemoryValueStore::new();
        let state = StateEncoder::new().encode_parts("n", "q", 0);
        write(&store, &key(&state, "move_to:a"), -0.3);
        write(&store, &key(&state, "move_to:b"), -0.1);
        assert_eq!(
            store.get_best_value(&state).unwrap(),
            Some(("move_to:b".to_string(), -0.1))
        );
    }

    #[test]
    fn test_clear_and_purge() {
        let store = MemoryValueStore::new();
        let state = StateEncoder::new().encode_parts("n", "q", 0);
        write(&store, &key(&state, "move_to:a"), 1.0);
        write(&store, &key(&state, "move_to:b"), 1.0);

        let future = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(store.purge_older_than(Utc::now() - chrono::Duration::hours(1)).unwrap(), 0);
        assert_eq!(store.purge_older_than(future).unwrap(), 2);
        assert!(store.is_empty().unwrap());

        write(&store, &key(&state, "move_to:a"), 1.0);
        store.clear().unwrap();
        assert_eq!(store.len().unwrap(), 0);
    }
}
