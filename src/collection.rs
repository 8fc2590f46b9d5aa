//! In-memory state of one collection and the transitions applied to it.
//!
//! Nothing here locks. Callers hold the collection guard (see
//! [`CollectionRegistry`](crate::registry::CollectionRegistry)) across the whole
//! read-decide-write of each method.

use crate::error::{Error, Result};
use crate::record::{self, Record};
use crate::schema::INTERNAL_ID_FIELD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Records of one collection, keyed by identity key.
///
/// Serializes as a plain JSON object `{identity_key: record}`, which is also
/// the on-disk layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionState {
    records: HashMap<String, Record>,
}

impl CollectionState {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` when there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of every record. Order is unspecified.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.records.values().cloned().collect()
    }

    /// Record stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(key)
    }

    /// Record whose internal id is `id`. Linear scan.
    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&Record> {
        self.key_for_id(id).and_then(|key| self.records.get(key))
    }

    /// Records whose `field` equals `value`. A record without `field` never
    /// matches.
    #[must_use]
    pub fn filter_by_field(&self, field: &str, value: &Value) -> Vec<Record> {
        self.records
            .values()
            .filter(|r| r.get(field) == Some(value))
            .cloned()
            .collect()
    }

    /// Insert or fully replace a record addressed by its identity field.
    ///
    /// A record without an internal id is a creation and gets a fresh one.
    /// Writing over an existing key requires the stored internal id; a
    /// mismatch is a [`Error::Conflict`] and leaves the stored record alone.
    pub fn upsert(&mut self, identity_field: &str, mut incoming: Record) -> Result<Record> {
        let key = record::identity_key(&incoming, identity_field)?;
        let id = match record::internal_id(&incoming)? {
            Some(id) => id.to_string(),
            None => {
                let id = record::generate_internal_id();
                record::set_internal_id(&mut incoming, id.clone());
                id
            }
        };

        match self.records.get(&key) {
            Some(existing) => {
                let existing_id = record::internal_id(existing).ok().flatten();
                if existing_id != Some(id.as_str()) {
                    return Err(Error::Conflict(format!(
                        "'{key}' is already stored with a different {INTERNAL_ID_FIELD}"
                    )));
                }
            }
            None => {
                // Keep internal ids unique: a new key can't borrow another record's id.
                if let Some(owner) = self.key_for_id(&id) {
                    return Err(Error::Conflict(format!(
                        "{INTERNAL_ID_FIELD} '{id}' already belongs to '{owner}'"
                    )));
                }
            }
        }

        self.records.insert(key, incoming.clone());
        Ok(incoming)
    }

    /// Replace the content of the record with internal id `id`.
    ///
    /// The stored internal id wins over whatever `incoming` carries, and the
    /// record stays under its current key even if `incoming` names a
    /// different identity value.
    pub fn update_by_id(&mut self, id: &str, mut incoming: Record) -> Result<Record> {
        let key = self
            .key_for_id(id)
            .map(str::to_string)
            .ok_or_else(|| Error::NotFound(format!("no record with {INTERNAL_ID_FIELD} '{id}'")))?;
        record::set_internal_id(&mut incoming, id);
        self.records.insert(key, incoming.clone());
        Ok(incoming)
    }

    /// Remove the record with internal id `id`.
    pub fn delete_by_id(&mut self, id: &str) -> Result<Record> {
        let key = self
            .key_for_id(id)
            .map(str::to_string)
            .ok_or_else(|| Error::NotFound(format!("no record with {INTERNAL_ID_FIELD} '{id}'")))?;
        self.records
            .remove(&key)
            .ok_or_else(|| Error::NotFound(format!("no record with {INTERNAL_ID_FIELD} '{id}'")))
    }

    /// Give every record lacking a usable internal id, or sharing one with
    /// another record, a fresh one. Returns how many records were touched.
    ///
    /// Keys are visited in sorted order, so among records sharing an id the
    /// one with the smallest key keeps it.
    pub fn backfill_internal_ids(&mut self) -> usize {
        let mut keys: Vec<String> = self.records.keys().cloned().collect();
        keys.sort();
        let mut seen = HashSet::with_capacity(keys.len());
        let mut touched = 0;
        for key in keys {
            let Some(rec) = self.records.get_mut(&key) else {
                continue;
            };
            let keep = match record::internal_id(rec) {
                Ok(Some(id)) => seen.insert(id.to_string()),
                _ => false,
            };
            if !keep {
                let id = record::generate_internal_id();
                seen.insert(id.clone());
                record::set_internal_id(rec, id);
                touched += 1;
            }
        }
        touched
    }

    fn key_for_id(&self, id: &str) -> Option<&str> {
        if id.is_empty() {
            return None;
        }
        self.records
            .iter()
            .find(|(_, r)| matches!(record::internal_id(r), Ok(Some(rid)) if rid == id))
            .map(|(k, _)| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    fn id_of(r: &Record) -> String {
        r[INTERNAL_ID_FIELD].as_str().unwrap().to_string()
    }

    #[test]
    fn upsert_creates_with_generated_id() {
        let mut state = CollectionState::new();
        let stored = state
            .upsert("email", rec(json!({"email": "a@x.com", "name": "A"})))
            .unwrap();
        assert!(!id_of(&stored).is_empty());
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("a@x.com"), Some(&stored));
    }

    #[test]
    fn upsert_without_identity_field_fails() {
        let mut state = CollectionState::new();
        let err = state.upsert("email", rec(json!({"name": "A"}))).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(state.is_empty());
    }

    #[test]
    fn upsert_same_key_without_id_conflicts() {
        let mut state = CollectionState::new();
        let first = state
            .upsert("email", rec(json!({"email": "a@x.com", "name": "A"})))
            .unwrap();
        let err = state
            .upsert("email", rec(json!({"email": "a@x.com", "name": "A2"})))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(state.get("a@x.com"), Some(&first));
    }

    #[test]
    fn upsert_same_key_with_other_id_conflicts() {
        let mut state = CollectionState::new();
        let first = state.upsert("email", rec(json!({"email": "a@x.com"}))).unwrap();
        let err = state
            .upsert("email", rec(json!({"email": "a@x.com", "__id__": "someone-else"})))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(state.get("a@x.com"), Some(&first));
    }

    #[test]
    fn upsert_with_matching_id_replaces_whole_record() {
        let mut state = CollectionState::new();
        let first = state
            .upsert("email", rec(json!({"email": "a@x.com", "name": "A", "age": 3})))
            .unwrap();
        let id = id_of(&first);
        let second = state
            .upsert("email", rec(json!({"email": "a@x.com", "__id__": id, "name": "B"})))
            .unwrap();
        assert_eq!(state.len(), 1);
        let stored = state.get("a@x.com").unwrap();
        assert_eq!(stored, &second);
        assert_eq!(stored["name"], "B");
        assert!(stored.get("age").is_none());
    }

    #[test]
    fn upsert_is_idempotent_for_full_records() {
        let mut state = CollectionState::new();
        let first = state.upsert("email", rec(json!({"email": "a@x.com"}))).unwrap();
        let after_first = state.clone();
        state.upsert("email", first.clone()).unwrap();
        assert_eq!(state, after_first);
    }

    #[test]
    fn upsert_new_key_cannot_reuse_existing_internal_id() {
        let mut state = CollectionState::new();
        let first = state.upsert("email", rec(json!({"email": "a@x.com"}))).unwrap();
        let err = state
            .upsert("email", rec(json!({"email": "b@x.com", "__id__": id_of(&first)})))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn upsert_rejects_non_string_internal_id() {
        let mut state = CollectionState::new();
        let err = state
            .upsert("email", rec(json!({"email": "a@x.com", "__id__": 12})))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn find_by_id_scans_records() {
        let mut state = CollectionState::new();
        let a = state.upsert("email", rec(json!({"email": "a@x.com"}))).unwrap();
        state.upsert("email", rec(json!({"email": "b@x.com"}))).unwrap();
        assert_eq!(state.find_by_id(&id_of(&a)), Some(&a));
        assert_eq!(state.find_by_id("nope"), None);
        assert_eq!(state.find_by_id(""), None);
    }

    #[test]
    fn update_by_id_keeps_original_key_and_id() {
        let mut state = CollectionState::new();
        let a = state
            .upsert("email", rec(json!({"email": "k1@x.com", "name": "A"})))
            .unwrap();
        let id = id_of(&a);
        let updated = state
            .update_by_id(
                &id,
                rec(json!({"email": "k2@x.com", "name": "A3", "__id__": "forged"})),
            )
            .unwrap();
        assert_eq!(id_of(&updated), id);
        assert!(state.get("k2@x.com").is_none());
        let stored = state.get("k1@x.com").unwrap();
        assert_eq!(stored["name"], "A3");
        assert_eq!(stored["email"], "k2@x.com");
    }

    #[test]
    fn update_by_unknown_or_empty_id_is_not_found() {
        let mut state = CollectionState::new();
        state.upsert("email", rec(json!({"email": "a@x.com"}))).unwrap();
        let before = state.clone();
        assert!(matches!(
            state.update_by_id("missing", rec(json!({"email": "a@x.com"}))),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            state.update_by_id("", rec(json!({"email": "a@x.com"}))),
            Err(Error::NotFound(_))
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn delete_by_id() {
        let mut state = CollectionState::new();
        let a = state.upsert("email", rec(json!({"email": "a@x.com"}))).unwrap();
        assert!(matches!(state.delete_by_id("unknown"), Err(Error::NotFound(_))));
        assert!(matches!(state.delete_by_id(""), Err(Error::NotFound(_))));
        assert_eq!(state.delete_by_id(&id_of(&a)).unwrap(), a);
        assert!(state.is_empty());
        assert!(matches!(state.delete_by_id(&id_of(&a)), Err(Error::NotFound(_))));
    }

    #[test]
    fn filter_exact_match_only() {
        let mut state = CollectionState::new();
        state
            .upsert("email", rec(json!({"email": "a@x.com", "team": "red"})))
            .unwrap();
        state
            .upsert("email", rec(json!({"email": "b@x.com", "team": "blue"})))
            .unwrap();
        state.upsert("email", rec(json!({"email": "c@x.com"}))).unwrap();

        let red = state.filter_by_field("team", &json!("red"));
        assert_eq!(red.len(), 1);
        assert_eq!(red[0]["email"], "a@x.com");
        assert!(state.filter_by_field("team", &json!("green")).is_empty());
        assert!(state.filter_by_field("missing", &json!("red")).is_empty());
    }

    #[test]
    fn internal_ids_stay_unique() {
        let mut state = CollectionState::new();
        for i in 0..50 {
            state
                .upsert("n", rec(json!({"n": i})))
                .unwrap();
        }
        let mut ids: Vec<String> = state.records().iter().map(id_of).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn backfill_assigns_missing_ids() {
        let mut state: CollectionState = serde_json::from_value(json!({
            "a@x.com": {"email": "a@x.com"},
            "b@x.com": {"email": "b@x.com", "__id__": "kept"},
        }))
        .unwrap();
        assert_eq!(state.backfill_internal_ids(), 1);
        assert_eq!(state.get("b@x.com").unwrap()["__id__"], "kept");
        assert!(state.get("a@x.com").unwrap()["__id__"].is_string());
        assert_eq!(state.backfill_internal_ids(), 0);
    }

    #[test]
    fn backfill_splits_shared_ids() {
        let mut state: CollectionState = serde_json::from_value(json!({
            "a@x.com": {"email": "a@x.com", "__id__": "dup"},
            "b@x.com": {"email": "b@x.com", "__id__": "dup"},
            "c@x.com": {"email": "c@x.com", "__id__": "dup"},
        }))
        .unwrap();
        assert_eq!(state.backfill_internal_ids(), 2);
        assert_eq!(state.get("a@x.com").unwrap()["__id__"], "dup");

        let mut ids: Vec<String> = state.records().iter().map(id_of).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
        assert_eq!(state.find_by_id("dup").unwrap()["email"], "a@x.com");
        assert_eq!(state.backfill_internal_ids(), 0);
    }
}
