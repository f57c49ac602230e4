//! Form session controller
//!
//! Holds the in-progress values of one create/update form and drives it
//! through an explicit state machine:
//!
//! ```text
//! Editing -> Validating -> Invalid -> Editing
//!                       -> Submitting -> Submitted
//!                                     -> SubmitFailed -> Editing
//! ```
//!
//! Submission is split in two so the persistence call can happen elsewhere:
//! [`FormSession::begin_submit`] validates and hands out a
//! [`PendingSubmission`]; [`FormSession::complete_submit`] applies the
//! outcome. A second submit while one is in flight is ignored, and outcomes
//! arriving for a stale ticket or after [`FormSession::abort`] are dropped.

use miette::Diagnostic;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use ulid::Ulid;

use crate::core::identity::EntityId;
use crate::core::submission::{Persistence, SubmissionAdapter, SubmissionError, SubmitReceipt};
use crate::core::value::{FormMode, RawValue, ValidatedRecord};
use crate::schema::registry::{EntitySchema, SchemaError};
use crate::schema::validator::{self, FieldErrors, RelationCandidates};

/// Lifecycle state of a form session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Editing,
    Validating,
    Invalid,
    Submitting,
    Submitted,
    SubmitFailed,
    /// Hard abort; the form was discarded
    Aborted,
}

impl SessionState {
    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Submitted | SessionState::Aborted)
    }

    /// A submission attempt is underway
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SessionState::Validating | SessionState::Submitting)
    }

    pub fn is_valid_transition(&self, to: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, to),
            (Editing, Validating)
                | (Validating, Invalid)
                | (Validating, Submitting)
                | (Invalid, Editing)
                | (Invalid, Validating)
                | (Submitting, Submitted)
                | (Submitting, SubmitFailed)
                | (SubmitFailed, Editing)
                | (SubmitFailed, Validating)
                // Any non-terminal state can be aborted
                | (Editing, Aborted)
                | (Validating, Aborted)
                | (Invalid, Aborted)
                | (Submitting, Aborted)
                | (SubmitFailed, Aborted)
        )
    }

    pub fn allowed_transitions(&self) -> Vec<SessionState> {
        use SessionState::*;
        match self {
            Editing => vec![Validating, Aborted],
            Validating => vec![Invalid, Submitting, Aborted],
            Invalid => vec![Editing, Validating, Aborted],
            Submitting => vec![Submitted, SubmitFailed, Aborted],
            SubmitFailed => vec![Editing, Validating, Aborted],
            Submitted | Aborted => vec![],
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Editing => write!(f, "editing"),
            SessionState::Validating => write!(f, "validating"),
            SessionState::Invalid => write!(f, "invalid"),
            SessionState::Submitting => write!(f, "submitting"),
            SessionState::Submitted => write!(f, "submitted"),
            SessionState::SubmitFailed => write!(f, "submit failed"),
            SessionState::Aborted => write!(f, "aborted"),
        }
    }
}

/// Errors that can occur while driving a session
#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error("form is not editable while {state}")]
    #[diagnostic(code(sform::session::not_editable))]
    NotEditable { state: SessionState },

    #[error("invalid session transition: {from} → {to}")]
    #[diagnostic(code(sform::session::transition))]
    InvalidTransition { from: SessionState, to: SessionState },
}

/// Behaviour knobs for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Re-check the edited field (only that field) on every `set_field`
    pub revalidate_on_edit: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            revalidate_on_edit: true,
        }
    }
}

/// Identifies one submission attempt of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionTicket {
    session: Ulid,
    attempt: u32,
}

/// A validated record waiting to be handed to the submission adapter
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    ticket: SubmissionTicket,
    pub mode: FormMode,
    pub entity_id: Option<EntityId>,
    pub record: ValidatedRecord,
}

impl PendingSubmission {
    pub fn ticket(&self) -> SubmissionTicket {
        self.ticket
    }

    /// Run this submission through an adapter
    pub fn send<P: Persistence>(
        &self,
        adapter: &SubmissionAdapter<P>,
    ) -> Result<SubmitReceipt, SubmissionError> {
        adapter.submit(
            self.mode,
            self.record.entity_kind(),
            self.entity_id.as_ref(),
            &self.record,
        )
    }
}

/// Result of asking a session to submit
#[derive(Debug)]
pub enum SubmitStep {
    /// A submission is already in flight, or the session is finished
    Ignored,
    /// Validation failed; the error map has been replaced
    Rejected,
    /// Validation passed; the session is now `Submitting`
    Ready(PendingSubmission),
}

/// Mutable state of one open create/update form
#[derive(Debug)]
pub struct FormSession {
    id: Ulid,
    schema: Arc<EntitySchema>,
    mode: FormMode,
    entity_id: Option<EntityId>,
    values: BTreeMap<String, RawValue>,
    touched: BTreeSet<String>,
    errors: FieldErrors,
    submit_error: Option<String>,
    receipt: Option<SubmitReceipt>,
    state: SessionState,
    attempt: u32,
    candidates: RelationCandidates,
    options: SessionOptions,
}

impl FormSession {
    fn open(schema: Arc<EntitySchema>, mode: FormMode, entity_id: Option<EntityId>) -> Self {
        let session = Self {
            id: Ulid::new(),
            schema,
            mode,
            entity_id,
            values: BTreeMap::new(),
            touched: BTreeSet::new(),
            errors: FieldErrors::new(),
            submit_error: None,
            receipt: None,
            state: SessionState::Editing,
            attempt: 0,
            candidates: RelationCandidates::new(),
            options: SessionOptions::default(),
        };
        tracing::debug!(
            session = %session.id,
            entity = %session.schema.entity,
            %mode,
            "opened form session"
        );
        session
    }

    /// Open an empty form for a new entity
    pub fn create(schema: Arc<EntitySchema>) -> Self {
        Self::open(schema, FormMode::Create, None)
    }

    /// Open a form for an existing entity, pre-populated from its stored values.
    ///
    /// File fields are not pre-populated: the stored asset stays unless a new
    /// file is set.
    pub fn update<I>(
        schema: Arc<EntitySchema>,
        entity_id: EntityId,
        existing: I,
    ) -> Result<Self, SessionError>
    where
        I: IntoIterator<Item = (String, RawValue)>,
    {
        if entity_id.kind() != schema.entity {
            return Err(SchemaError::mismatch(
                schema.entity,
                format!("cannot update {} with the {} schema", entity_id, schema.entity),
            )
            .into());
        }

        let mut session = Self::open(schema, FormMode::Update, Some(entity_id));
        for (name, value) in existing {
            let field = session.schema.field(&name).ok_or_else(|| {
                SchemaError::mismatch(
                    session.schema.entity,
                    format!("existing record has unknown field '{}'", name),
                )
            })?;
            if field.is_file() || value.is_blank() {
                continue;
            }
            session.values.insert(name, value);
        }
        Ok(session)
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Candidate identifiers for relation fields
    pub fn with_candidates(mut self, candidates: RelationCandidates) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn candidates(&self) -> &RelationCandidates {
        &self.candidates
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn entity_id(&self) -> Option<&EntityId> {
        self.entity_id.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn values(&self) -> &BTreeMap<String, RawValue> {
        &self.values
    }

    pub fn value(&self, name: &str) -> Option<&RawValue> {
        self.values.get(name)
    }

    pub fn touched(&self) -> &BTreeSet<String> {
        &self.touched
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Top-level message from the last failed submission
    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    pub fn receipt(&self) -> Option<&SubmitReceipt> {
        self.receipt.as_ref()
    }

    /// Record an edit. Only the edited field is re-checked.
    pub fn set_field(
        &mut self,
        name: &str,
        value: impl Into<RawValue>,
    ) -> Result<(), SessionError> {
        self.ensure_editable(name)?;
        let value = value.into();

        if self.options.revalidate_on_edit {
            if let Some(field) = self.schema.field(name) {
                match validator::check_field(field, Some(&value), self.mode, &self.candidates) {
                    Ok(_) => self.errors.remove(name),
                    Err(messages) => self.errors.set(name, messages),
                }
            }
        }

        self.values.insert(name.to_string(), value);
        self.touched.insert(name.to_string());
        self.resume_editing()
    }

    /// Remove a value, leaving the field empty
    pub fn clear_field(&mut self, name: &str) -> Result<(), SessionError> {
        self.ensure_editable(name)?;
        self.values.remove(name);
        self.touched.insert(name.to_string());

        if self.options.revalidate_on_edit {
            if let Some(field) = self.schema.field(name) {
                match validator::check_field(field, None, self.mode, &self.candidates) {
                    Ok(_) => self.errors.remove(name),
                    Err(messages) => self.errors.set(name, messages),
                }
            }
        }

        self.resume_editing()
    }

    /// Validate everything and, if valid, move to `Submitting`
    pub fn begin_submit(&mut self) -> Result<SubmitStep, SessionError> {
        if self.state.is_in_flight() || self.state.is_terminal() {
            tracing::debug!(session = %self.id, state = %self.state, "submit ignored");
            return Ok(SubmitStep::Ignored);
        }

        self.transition(SessionState::Validating)?;
        self.submit_error = None;

        match validator::validate(&self.schema, &self.values, self.mode, &self.candidates) {
            Err(errors) => {
                self.errors = errors;
                self.transition(SessionState::Invalid)?;
                Ok(SubmitStep::Rejected)
            }
            Ok(record) => {
                self.errors = FieldErrors::new();
                self.attempt += 1;
                self.transition(SessionState::Submitting)?;
                Ok(SubmitStep::Ready(PendingSubmission {
                    ticket: self.current_ticket(),
                    mode: self.mode,
                    entity_id: self.entity_id.clone(),
                    record,
                }))
            }
        }
    }

    /// Apply a submission outcome. Returns false when the outcome was stale and ignored.
    pub fn complete_submit(
        &mut self,
        ticket: SubmissionTicket,
        outcome: Result<SubmitReceipt, SubmissionError>,
    ) -> bool {
        if self.state != SessionState::Submitting || ticket != self.current_ticket() {
            tracing::warn!(
                session = %self.id,
                state = %self.state,
                "ignoring late submission result"
            );
            return false;
        }

        let next = match outcome {
            Ok(receipt) => {
                self.receipt = Some(receipt);
                SessionState::Submitted
            }
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "submission failed");
                self.submit_error = Some(e.to_string());
                SessionState::SubmitFailed
            }
        };
        // Submitting -> Submitted | SubmitFailed is always valid
        self.state = next;
        tracing::debug!(session = %self.id, state = %self.state, "submission settled");
        true
    }

    /// Validate and submit synchronously through an adapter
    pub fn submit<P: Persistence>(
        &mut self,
        adapter: &SubmissionAdapter<P>,
    ) -> Result<SessionState, SessionError> {
        if let SubmitStep::Ready(pending) = self.begin_submit()? {
            let outcome = pending.send(adapter);
            self.complete_submit(pending.ticket(), outcome);
        }
        Ok(self.state)
    }

    /// Discard the form. Any in-flight outcome arriving later is ignored.
    pub fn abort(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Aborted)
    }

    fn current_ticket(&self) -> SubmissionTicket {
        SubmissionTicket {
            session: self.id,
            attempt: self.attempt,
        }
    }

    fn ensure_editable(&self, name: &str) -> Result<(), SessionError> {
        if !self.schema.has_field(name) {
            return Err(SchemaError::mismatch(
                self.schema.entity,
                format!("unknown field '{}'", name),
            )
            .into());
        }
        match self.state {
            SessionState::Editing | SessionState::Invalid | SessionState::SubmitFailed => Ok(()),
            state => Err(SessionError::NotEditable { state }),
        }
    }

    fn resume_editing(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Editing {
            self.transition(SessionState::Editing)?;
        }
        Ok(())
    }

    fn transition(&mut self, to: SessionState) -> Result<(), SessionError> {
        if !self.state.is_valid_transition(to) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::debug!(session = %self.id, from = %self.state, %to, "session transition");
        self.state = to;
        Ok(())
    }
}
