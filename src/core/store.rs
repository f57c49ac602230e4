//! In-process reference store implementing both submission collaborators
//!
//! Records are kept as JSON objects keyed by kind and identifier. The store
//! enforces the `unique` flags declared in the schemas and can be persisted as
//! a YAML document so the CLI can use it between runs.

use miette::Diagnostic;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::core::identity::{EntityId, EntityKind};
use crate::core::submission::{Payload, Persistence, RelationSource, SubmissionError};
use crate::core::value::{FileHandle, RawValue};
use crate::schema::registry::SchemaRegistry;
use crate::yaml::YamlSyntaxError;

type Records = BTreeMap<EntityKind, BTreeMap<String, Map<String, Value>>>;

/// Errors reading or writing a store document
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("failed to read store {path}")]
    #[diagnostic(code(sform::store::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] YamlSyntaxError),

    #[error("invalid store document {path}: {message}")]
    #[diagnostic(
        code(sform::store::format),
        help("a store maps kind -> id -> fields, e.g. `teacher: {{TCH-...: {{username: jd}}}}`")
    )]
    Format { path: String, message: String },

    #[error("failed to serialize store: {0}")]
    #[diagnostic(code(sform::store::serialize))]
    Serialize(String),
}

/// Reference persistence collaborator
#[derive(Debug)]
pub struct MemoryStore {
    records: Mutex<Records>,
    unique: BTreeMap<EntityKind, Vec<String>>,
    available: AtomicBool,
}

impl MemoryStore {
    /// Empty store enforcing the registry's unique fields
    pub fn new(registry: &SchemaRegistry) -> Self {
        let unique = registry
            .iter()
            .map(|schema| (schema.entity, schema.unique_fields()))
            .filter(|(_, fields)| !fields.is_empty())
            .collect();
        Self {
            records: Mutex::new(Records::new()),
            unique,
            available: AtomicBool::new(true),
        }
    }

    /// Load a store document; a missing file yields an empty store
    pub fn load(path: &Path, registry: &SchemaRegistry) -> Result<Self, StoreError> {
        let store = Self::new(registry);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "store file absent, starting empty");
            return Ok(store);
        }

        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(store);
        }

        let filename = path.display().to_string();
        let records: Records = serde_yml::from_str(&content).map_err(|e| {
            if e.location().is_some() {
                StoreError::Syntax(YamlSyntaxError::from_serde_error(&e, &content, &filename))
            } else {
                StoreError::Format {
                    path: filename.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        for (kind, entries) in &records {
            for id in entries.keys() {
                let parsed: EntityId = id.parse().map_err(|e| StoreError::Format {
                    path: filename.clone(),
                    message: format!("{}: {}", id, e),
                })?;
                if parsed.kind() != *kind {
                    return Err(StoreError::Format {
                        path: filename.clone(),
                        message: format!("{} is listed under {}", id, kind),
                    });
                }
            }
        }

        tracing::debug!(path = %path.display(), kinds = records.len(), "loaded store");
        *store.lock() = records;
        Ok(store)
    }

    /// Write the store as YAML, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let yaml = {
            let records = self.lock();
            serde_yml::to_string(&*records).map_err(|e| StoreError::Serialize(e.to_string()))?
        };
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, yaml).map_err(io_err)?;
        tracing::debug!(path = %path.display(), "saved store");
        Ok(())
    }

    /// Toggle simulated outages; while unavailable every write fails
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Seed a record without any checks
    pub fn insert(&self, kind: EntityKind, fields: Map<String, Value>) -> EntityId {
        let id = EntityId::new(kind);
        self.lock()
            .entry(kind)
            .or_default()
            .insert(id.to_string(), fields);
        id
    }

    pub fn get(&self, id: &EntityId) -> Option<Map<String, Value>> {
        self.lock()
            .get(&id.kind())
            .and_then(|entries| entries.get(&id.to_string()))
            .cloned()
    }

    pub fn ids(&self, kind: EntityKind) -> Vec<String> {
        self.lock()
            .get(&kind)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.lock().get(&kind).map_or(0, BTreeMap::len)
    }

    /// Stored fields as raw form values, for pre-populating an update form
    pub fn raw_values(&self, id: &EntityId) -> Result<Vec<(String, RawValue)>, SubmissionError> {
        let fields = self.get(id).ok_or_else(|| SubmissionError::NotFound {
            kind: id.kind(),
            id: id.to_string(),
        })?;
        Ok(fields
            .into_iter()
            .filter_map(|(name, value)| json_to_raw(value).map(|raw| (name, raw)))
            .collect())
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_available(&self) -> Result<(), SubmissionError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(SubmissionError::PersistenceUnavailable(
                "store is offline".to_string(),
            ))
        }
    }

    fn check_unique(
        &self,
        records: &Records,
        kind: EntityKind,
        skip: Option<&str>,
        fields: &Map<String, Value>,
    ) -> Result<(), SubmissionError> {
        let Some(unique) = self.unique.get(&kind) else {
            return Ok(());
        };
        let Some(entries) = records.get(&kind) else {
            return Ok(());
        };

        for name in unique {
            let Some(value) = fields.get(name) else {
                continue;
            };
            let clash = entries
                .iter()
                .filter(|(id, _)| Some(id.as_str()) != skip)
                .any(|(_, other)| other.get(name).is_some_and(|v| same_value(v, value)));
            if clash {
                return Err(SubmissionError::ConflictingIdentifier {
                    field: name.clone(),
                    value: value
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| value.to_string()),
                });
            }
        }
        Ok(())
    }
}

impl Persistence for MemoryStore {
    fn create(&self, kind: EntityKind, payload: &Payload) -> Result<EntityId, SubmissionError> {
        self.ensure_available()?;
        let mut records = self.lock();
        self.check_unique(&records, kind, None, payload.fields())?;

        let id = EntityId::new(kind);
        records
            .entry(kind)
            .or_default()
            .insert(id.to_string(), payload.fields().clone());
        Ok(id)
    }

    fn update(
        &self,
        kind: EntityKind,
        id: &EntityId,
        payload: &Payload,
    ) -> Result<(), SubmissionError> {
        self.ensure_available()?;
        let key = id.to_string();
        let mut records = self.lock();
        if id.kind() != kind || !records.get(&kind).is_some_and(|e| e.contains_key(&key)) {
            return Err(SubmissionError::NotFound { kind, id: key });
        }
        self.check_unique(&records, kind, Some(&key), payload.fields())?;

        if let Some(existing) = records.get_mut(&kind).and_then(|e| e.get_mut(&key)) {
            for (name, value) in payload.fields() {
                existing.insert(name.clone(), value.clone());
            }
        }
        Ok(())
    }
}

impl RelationSource for MemoryStore {
    fn list_valid_ids(&self, kind: EntityKind) -> BTreeSet<String> {
        self.lock()
            .get(&kind)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => a == b,
    }
}

fn json_to_raw(value: Value) -> Option<RawValue> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(RawValue::Text(s)),
        Value::Number(n) => Some(RawValue::Text(n.to_string())),
        Value::Bool(b) => Some(RawValue::Text(b.to_string())),
        Value::Object(_) => serde_json::from_value::<FileHandle>(value)
            .ok()
            .map(RawValue::File),
        Value::Array(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builtin().unwrap()
    }

    fn payload(kind: EntityKind, value: Value) -> Payload {
        let Value::Object(fields) = value else {
            panic!("payload must be an object");
        };
        Payload::from_fields(kind, fields)
    }

    #[test]
    fn test_create_and_list() {
        let store = MemoryStore::new(&registry());
        let id = store
            .create(
                EntityKind::Subject,
                &payload(EntityKind::Subject, json!({"name": "Math"})),
            )
            .unwrap();
        assert_eq!(id.kind(), EntityKind::Subject);
        assert_eq!(
            store.list_valid_ids(EntityKind::Subject),
            BTreeSet::from([id.to_string()])
        );
        assert!(store.list_valid_ids(EntityKind::Teacher).is_empty());
    }

    #[test]
    fn test_unique_fields_conflict() {
        let store = MemoryStore::new(&registry());
        let first = payload(
            EntityKind::Teacher,
            json!({"username": "johndoe", "email": "john@example.com"}),
        );
        store.create(EntityKind::Teacher, &first).unwrap();

        let second = payload(
            EntityKind::Teacher,
            json!({"username": "JohnDoe", "email": "other@example.com"}),
        );
        let err = store.create(EntityKind::Teacher, &second).unwrap_err();
        assert_eq!(
            err,
            SubmissionError::ConflictingIdentifier {
                field: "username".to_string(),
                value: "JohnDoe".to_string()
            }
        );
        assert_eq!(store.count(EntityKind::Teacher), 1);
    }

    #[test]
    fn test_update_merges_and_may_keep_own_unique_value() {
        let store = MemoryStore::new(&registry());
        let id = store
            .create(
                EntityKind::Teacher,
                &payload(
                    EntityKind::Teacher,
                    json!({
                        "username": "johndoe",
                        "img": {"name": "a.png", "content_type": "image/png"}
                    }),
                ),
            )
            .unwrap();
        store
            .update(
                EntityKind::Teacher,
                &id,
                &payload(EntityKind::Teacher, json!({"username": "johndoe", "address": "5 Elm"})),
            )
            .unwrap();

        let stored = store.get(&id).unwrap();
        assert_eq!(stored["address"], json!("5 Elm"));
        assert_eq!(stored["img"]["name"], json!("a.png"));
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let store = MemoryStore::new(&registry());
        let id = EntityId::new(EntityKind::Teacher);
        let err = store
            .update(EntityKind::Teacher, &id, &payload(EntityKind::Teacher, json!({})))
            .unwrap_err();
        assert!(matches!(err, SubmissionError::NotFound { .. }));
    }

    #[test]
    fn test_unavailable_store_rejects_writes() {
        let store = MemoryStore::new(&registry());
        store.set_available(false);
        let err = store
            .create(
                EntityKind::Subject,
                &payload(EntityKind::Subject, json!({"name": "Art"})),
            )
            .unwrap_err();
        assert!(matches!(err, SubmissionError::PersistenceUnavailable(_)));
        assert_eq!(store.count(EntityKind::Subject), 0);

        store.set_available(true);
        assert!(store
            .create(
                EntityKind::Subject,
                &payload(EntityKind::Subject, json!({"name": "Art"})),
            )
            .is_ok());
    }

    #[test]
    fn test_raw_values_for_update_form() {
        let store = MemoryStore::new(&registry());
        let Value::Object(fields) = json!({
            "capacity": 30,
            "name": "1A",
        }) else {
            unreachable!()
        };
        let id = store.insert(EntityKind::Class, fields);
        let raw: BTreeMap<_, _> = store.raw_values(&id).unwrap().into_iter().collect();
        assert_eq!(raw["capacity"], RawValue::text("30"));
        assert_eq!(raw["name"], RawValue::text("1A"));

        let missing = EntityId::new(EntityKind::Class);
        assert!(store.raw_values(&missing).is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("data").join("store.yaml");
        let registry = registry();

        let store = MemoryStore::new(&registry);
        let id = store
            .create(
                EntityKind::Grade,
                &payload(EntityKind::Grade, json!({"level": 3})),
            )
            .unwrap();
        store.save(&path).unwrap();

        let loaded = MemoryStore::load(&path, &registry).unwrap();
        assert_eq!(loaded.get(&id).unwrap()["level"], json!(3));

        // unique constraints survive reload
        let err = loaded
            .create(
                EntityKind::Grade,
                &payload(EntityKind::Grade, json!({"level": 3})),
            )
            .unwrap_err();
        assert!(matches!(err, SubmissionError::ConflictingIdentifier { .. }));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let tmp = tempdir().unwrap();
        let store = MemoryStore::load(&tmp.path().join("none.yaml"), &registry()).unwrap();
        assert_eq!(store.count(EntityKind::Teacher), 0);
    }

    #[test]
    fn test_load_rejects_misfiled_ids() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("store.yaml");
        let id = EntityId::new(EntityKind::Student);
        std::fs::write(&path, format!("teacher:\n  {}:\n    username: jd\n", id)).unwrap();
        assert!(matches!(
            MemoryStore::load(&path, &registry()),
            Err(StoreError::Format { .. })
        ));
    }
}
