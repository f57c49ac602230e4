//! Submission adapter and the persistence collaborators it calls
//!
//! The adapter turns a [`ValidatedRecord`] into an outbound [`Payload`] and
//! hands it to a [`Persistence`] implementation. Retries and timeouts belong
//! to the persistence side; failures are passed back to the caller unchanged.

use miette::Diagnostic;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::core::identity::{EntityId, EntityKind};
use crate::core::value::{FormMode, ValidatedRecord};

/// Errors that can occur while submitting a validated record
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum SubmissionError {
    #[error("Persistence unavailable: {0}")]
    #[diagnostic(code(sform::submit::unavailable))]
    PersistenceUnavailable(String),

    #[error("{field} '{value}' is already in use")]
    #[diagnostic(code(sform::submit::conflict))]
    ConflictingIdentifier { field: String, value: String },

    #[error("{kind} {id} not found")]
    #[diagnostic(code(sform::submit::not_found))]
    NotFound { kind: EntityKind, id: String },

    #[error("Invalid submission: {0}")]
    #[diagnostic(code(sform::submit::invalid_request))]
    InvalidRequest(String),
}

/// Supplies identifiers of existing entities for relation fields
pub trait RelationSource {
    fn list_valid_ids(&self, kind: EntityKind) -> BTreeSet<String>;
}

/// Storage collaborator behind the submission contract
pub trait Persistence {
    /// Store a new entity and return its allocated identifier
    fn create(&self, kind: EntityKind, payload: &Payload) -> Result<EntityId, SubmissionError>;

    /// Apply the payload's fields to an existing entity
    fn update(
        &self,
        kind: EntityKind,
        id: &EntityId,
        payload: &Payload,
    ) -> Result<(), SubmissionError>;
}

impl<T: Persistence + ?Sized> Persistence for &T {
    fn create(&self, kind: EntityKind, payload: &Payload) -> Result<EntityId, SubmissionError> {
        (**self).create(kind, payload)
    }

    fn update(
        &self,
        kind: EntityKind,
        id: &EntityId,
        payload: &Payload,
    ) -> Result<(), SubmissionError> {
        (**self).update(kind, id, payload)
    }
}

impl<T: RelationSource + ?Sized> RelationSource for &T {
    fn list_valid_ids(&self, kind: EntityKind) -> BTreeSet<String> {
        (**self).list_valid_ids(kind)
    }
}

/// Outbound field set: a JSON object with dates as `YYYY-MM-DD` and files as
/// `{name, content_type, size}`. Only validated fields appear.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    entity: EntityKind,
    fields: Map<String, Value>,
}

impl Payload {
    pub fn from_record(record: &ValidatedRecord) -> Result<Self, SubmissionError> {
        let mut fields = Map::new();
        for (name, value) in record.fields() {
            let json = serde_json::to_value(value)
                .map_err(|e| SubmissionError::InvalidRequest(format!("field '{}': {}", name, e)))?;
            fields.insert(name.clone(), json);
        }
        Ok(Self {
            entity: record.entity_kind(),
            fields,
        })
    }

    /// Payload from already-rendered fields
    pub fn from_fields(entity: EntityKind, fields: Map<String, Value>) -> Self {
        Self { entity, fields }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Outcome of a successful submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    pub mode: FormMode,
    pub entity_id: EntityId,
}

/// Adapter between validated records and the persistence collaborator
pub struct SubmissionAdapter<P> {
    persistence: P,
}

impl<P: Persistence> SubmissionAdapter<P> {
    pub fn new(persistence: P) -> Self {
        Self { persistence }
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Submit a record. `entity_id` must be absent for create and present for update.
    pub fn submit(
        &self,
        mode: FormMode,
        kind: EntityKind,
        entity_id: Option<&EntityId>,
        record: &ValidatedRecord,
    ) -> Result<SubmitReceipt, SubmissionError> {
        if record.entity_kind() != kind {
            return Err(SubmissionError::InvalidRequest(format!(
                "record is a {} but the submission targets {}",
                record.entity_kind(),
                kind
            )));
        }

        let payload = Payload::from_record(record)?;

        let entity_id = match (mode, entity_id) {
            (FormMode::Create, None) => self.persistence.create(kind, &payload)?,
            (FormMode::Create, Some(id)) => {
                return Err(SubmissionError::InvalidRequest(format!(
                    "create must not carry an entity id (got {})",
                    id
                )));
            }
            (FormMode::Update, None) => {
                return Err(SubmissionError::InvalidRequest(
                    "update requires an entity id".to_string(),
                ));
            }
            (FormMode::Update, Some(id)) => {
                if id.kind() != kind {
                    return Err(SubmissionError::NotFound {
                        kind,
                        id: id.to_string(),
                    });
                }
                self.persistence.update(kind, id, &payload)?;
                id.clone()
            }
        };

        tracing::debug!(%kind, %mode, id = %entity_id, "submitted record");

        Ok(SubmitReceipt { mode, entity_id })
    }
}
