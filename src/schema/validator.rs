//! Validation engine: raw form values in, typed record or complete error map out

use chrono::NaiveDate;
use miette::Diagnostic;
use regex::Regex;
use serde::ser::SerializeMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, LazyLock};
use thiserror::Error;

use crate::core::submission::RelationSource;
use crate::core::value::{FormMode, RawValue, TypedValue, ValidatedRecord};
use crate::schema::field::{FieldDescriptor, FieldKind};
use crate::schema::registry::EntitySchema;

/// Error-map key for messages from cross-field rules
pub const FORM_KEY: &str = "_form";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("email pattern compiles")
});

const PHONE_PUNCTUATION: &[char] = &[' ', '+', '-', '(', ')', '.'];
const PHONE_MIN_DIGITS: usize = 7;

/// Field name -> ordered messages, kept in schema order
#[derive(Debug, Clone, Default, PartialEq, Eq, Error, Diagnostic)]
#[error("{} field(s) failed validation", .entries.len())]
#[diagnostic(
    code(sform::validation::invalid),
    help("correct the listed fields and submit again")
)]
pub struct FieldErrors {
    entries: Vec<(String, Vec<String>)>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to a field's entry
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        let message = message.into();
        match self.entries.iter_mut().find(|(name, _)| name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.entries.push((field.to_string(), vec![message])),
        }
    }

    /// Replace a field's messages; an empty list removes the entry
    pub fn set(&mut self, field: &str, messages: Vec<String>) {
        if messages.is_empty() {
            self.remove(field);
            return;
        }
        match self.entries.iter_mut().find(|(name, _)| name == field) {
            Some((_, existing)) => *existing = messages,
            None => self.entries.push((field.to_string(), messages)),
        }
    }

    pub fn remove(&mut self, field: &str) {
        self.entries.retain(|(name, _)| name != field);
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Messages from cross-field rules
    pub fn form_errors(&self) -> &[String] {
        self.get(FORM_KEY).unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, messages)| (name.as_str(), messages.as_slice()))
    }

    /// Number of fields with errors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FieldErrors {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, messages) in &self.entries {
            map.serialize_entry(name, messages)?;
        }
        map.end()
    }
}

/// Currently-valid identifiers for each relation field, supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationCandidates {
    by_field: BTreeMap<String, BTreeSet<String>>,
}

impl RelationCandidates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I, S>(mut self, field: &str, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(field, ids);
        self
    }

    pub fn insert<I, S>(&mut self, field: &str, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by_field
            .entry(field.to_string())
            .or_default()
            .extend(ids.into_iter().map(Into::into));
    }

    /// Query the source for every relation field of a schema
    pub fn collect(schema: &EntitySchema, source: &dyn RelationSource) -> Self {
        let mut candidates = Self::new();
        for (field, target) in schema.relation_fields() {
            candidates.insert(&field.name, source.list_valid_ids(target));
        }
        candidates
    }

    pub fn for_field(&self, field: &str) -> Option<&BTreeSet<String>> {
        self.by_field.get(field)
    }

    pub fn contains(&self, field: &str, id: &str) -> bool {
        self.by_field.get(field).is_some_and(|ids| ids.contains(id))
    }
}

/// Validate raw values against a schema.
///
/// Every field is checked in schema order and all problems are collected;
/// cross-field rules run only when every field passed. Keys in `raw` that the
/// schema does not declare are ignored.
pub fn validate(
    schema: &EntitySchema,
    raw: &BTreeMap<String, RawValue>,
    mode: FormMode,
    candidates: &RelationCandidates,
) -> Result<ValidatedRecord, FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut fields = BTreeMap::new();

    for field in &schema.fields {
        match check_field(field, raw.get(&field.name), mode, candidates) {
            Ok(Some(value)) => {
                fields.insert(field.name.clone(), value);
            }
            Ok(None) => {}
            Err(messages) => errors.set(&field.name, messages),
        }
    }

    if errors.is_empty() {
        for rule in &schema.rules {
            if !rule.holds(&fields) {
                errors.push(FORM_KEY, rule.message.clone());
            }
        }
    }

    tracing::debug!(
        entity = %schema.entity,
        %mode,
        invalid_fields = errors.len(),
        "validated form input"
    );

    if errors.is_empty() {
        Ok(ValidatedRecord::new(schema.entity, fields))
    } else {
        Err(errors)
    }
}

/// Check a single field. `Ok(None)` means an optional field left empty.
pub fn check_field(
    field: &FieldDescriptor,
    value: Option<&RawValue>,
    mode: FormMode,
    candidates: &RelationCandidates,
) -> Result<Option<TypedValue>, Vec<String>> {
    let Some(value) = value.filter(|v| !v.is_blank()) else {
        let required = match field.kind {
            // Updates keep the stored asset when no new file is given
            FieldKind::File { .. } => field.required && mode == FormMode::Create,
            _ => field.required,
        };
        return if required {
            Err(vec![field.required_message()])
        } else {
            Ok(None)
        };
    };

    let mut problems = Vec::new();
    let typed = match (&field.kind, value) {
        (FieldKind::Password, RawValue::Text(s)) => {
            check_length(field, s, &mut problems);
            TypedValue::Secret(s.clone())
        }
        (FieldKind::Text, RawValue::Text(s)) => {
            let s = s.trim();
            check_length(field, s, &mut problems);
            TypedValue::Text(s.to_string())
        }
        (FieldKind::Email, RawValue::Text(s)) => {
            let s = s.trim();
            check_length(field, s, &mut problems);
            if !EMAIL_RE.is_match(s) {
                problems.push(field.invalid_message());
            }
            TypedValue::Text(s.to_string())
        }
        (FieldKind::Phone, RawValue::Text(s)) => {
            let s = s.trim();
            if !is_phone(s) {
                problems.push(field.invalid_message());
            }
            TypedValue::Text(s.to_string())
        }
        (FieldKind::Date, RawValue::Date(d)) => TypedValue::Date(*d),
        (FieldKind::Date, RawValue::Text(s)) => {
            match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
                Ok(d) => TypedValue::Date(d),
                Err(_) => return Err(vec![field.invalid_message()]),
            }
        }
        (FieldKind::Number { min, max }, RawValue::Text(s)) => {
            let Ok(n) = s.trim().parse::<i64>() else {
                return Err(vec![field.invalid_message()]);
            };
            if let Some(min) = min.filter(|min| n < *min) {
                problems.push(field.min_message(min));
            }
            if let Some(max) = max.filter(|max| n > *max) {
                problems.push(field.max_message(max));
            }
            TypedValue::Number(n)
        }
        (FieldKind::Enum { values }, RawValue::Text(s)) => {
            let s = s.trim();
            if !values.iter().any(|v| v == s) {
                problems.push(field.invalid_message());
            }
            TypedValue::Enum(s.to_string())
        }
        (FieldKind::Relation { .. }, RawValue::Text(s)) => {
            let s = s.trim();
            if !candidates.contains(&field.name, s) {
                problems.push(field.invalid_message());
            }
            TypedValue::Relation(s.to_string())
        }
        (FieldKind::File { accept }, RawValue::File(handle)) => {
            if !accept.is_empty() && !accept.iter().any(|p| handle.matches_type(p)) {
                problems.push(field.invalid_message());
            }
            TypedValue::File(handle.clone())
        }
        // Value of the wrong shape for this kind (e.g. text given for a file)
        _ => return Err(vec![field.invalid_message()]),
    };

    if problems.is_empty() {
        Ok(Some(typed))
    } else {
        Err(problems)
    }
}

fn check_length(field: &FieldDescriptor, s: &str, problems: &mut Vec<String>) {
    let len = s.chars().count();
    if let Some(min) = field.min_length.filter(|min| len < *min) {
        problems.push(field.min_message(min));
    }
    if let Some(max) = field.max_length.filter(|max| len > *max) {
        problems.push(field.max_message(max));
    }
}

fn is_phone(s: &str) -> bool {
    let digits = s.chars().filter(char::is_ascii_digit).count();
    digits >= PHONE_MIN_DIGITS
        && s
            .chars()
            .all(|c| c.is_ascii_digit() || PHONE_PUNCTUATION.contains(&c))
}

/// Validation bound to one schema and its relation candidates
#[derive(Debug, Clone)]
pub struct Validator {
    schema: Arc<EntitySchema>,
    candidates: RelationCandidates,
}

impl Validator {
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self {
            schema,
            candidates: RelationCandidates::new(),
        }
    }

    /// Load candidates for every relation field from a source
    pub fn with_source(mut self, source: &dyn RelationSource) -> Self {
        self.candidates = RelationCandidates::collect(&self.schema, source);
        self
    }

    pub fn with_candidates(mut self, candidates: RelationCandidates) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    pub fn candidates(&self) -> &RelationCandidates {
        &self.candidates
    }

    pub fn validate(
        &self,
        raw: &BTreeMap<String, RawValue>,
        mode: FormMode,
    ) -> Result<ValidatedRecord, FieldErrors> {
        validate(&self.schema, raw, mode, &self.candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::{EntityId, EntityKind};
    use crate::core::value::FileHandle;
    use crate::schema::field::FieldMessages;
    use crate::schema::registry::SchemaRegistry;

    const TEACHER_FIELDS: &[&str] = &[
        "username",
        "email",
        "password",
        "firstName",
        "lastName",
        "phone",
        "address",
        "birthday",
        "sex",
        "img",
        "bloodType",
    ];

    fn teacher_schema() -> std::sync::Arc<EntitySchema> {
        SchemaRegistry::builtin()
            .unwrap()
            .get(EntityKind::Teacher)
            .unwrap()
    }

    fn valid_teacher() -> BTreeMap<String, RawValue> {
        let mut raw = BTreeMap::new();
        raw.insert("username".to_string(), RawValue::text("johndoe"));
        raw.insert("email".to_string(), RawValue::text("johndoe@gmail.com"));
        raw.insert("password".to_string(), RawValue::text("s3cret-pass"));
        raw.insert("firstName".to_string(), RawValue::text("John"));
        raw.insert("lastName".to_string(), RawValue::text("Doe"));
        raw.insert("phone".to_string(), RawValue::text("+1 234 567 89"));
        raw.insert(
            "address".to_string(),
            RawValue::text("1234 Main St, Anytown, USA"),
        );
        raw.insert("birthday".to_string(), RawValue::text("2000-01-01"));
        raw.insert("sex".to_string(), RawValue::text("male"));
        raw.insert(
            "img".to_string(),
            RawValue::File(FileHandle::new("john.png", "image/png")),
        );
        raw.insert("bloodType".to_string(), RawValue::text("O+"));
        raw
    }

    fn no_candidates() -> RelationCandidates {
        RelationCandidates::new()
    }

    #[test]
    fn test_valid_teacher_produces_typed_record() {
        let schema = teacher_schema();
        let record = validate(&schema, &valid_teacher(), FormMode::Create, &no_candidates())
            .unwrap();
        assert_eq!(record.entity_kind(), EntityKind::Teacher);
        assert_eq!(
            record.get("birthday"),
            Some(&TypedValue::Date(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()))
        );
        assert_eq!(record.get("bloodType"), Some(&TypedValue::Enum("O+".to_string())));
        assert!(matches!(record.get("password"), Some(TypedValue::Secret(_))));
        assert!(matches!(record.get("img"), Some(TypedValue::File(_))));
    }

    #[test]
    fn test_short_username_reports_only_username() {
        let schema = teacher_schema();
        let mut raw = valid_teacher();
        raw.insert("username".to_string(), RawValue::text("jd"));
        raw.insert("email".to_string(), RawValue::text("x@y.com"));

        let errors = validate(&schema, &raw, FormMode::Create, &no_candidates()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.get("username").unwrap(),
            ["Username must be at least 3 characters"]
        );
    }

    #[test]
    fn test_each_required_field_fails_independently() {
        let schema = teacher_schema();
        for name in TEACHER_FIELDS {
            let mut raw = valid_teacher();
            raw.remove(*name);
            let errors = validate(&schema, &raw, FormMode::Create, &no_candidates())
                .unwrap_err();
            assert_eq!(errors.fields().collect::<Vec<_>>(), vec![*name], "field {}", name);
        }
    }

    /// A constraint-satisfying value for every field, plus candidates for relations
    fn fully_populated(schema: &EntitySchema) -> (BTreeMap<String, RawValue>, RelationCandidates) {
        let mut raw = BTreeMap::new();
        let mut candidates = RelationCandidates::new();
        for field in &schema.fields {
            let value = match &field.kind {
                FieldKind::Text => {
                    let len = field.min_length.unwrap_or(1).max(3);
                    RawValue::text("x".repeat(len.min(field.max_length.unwrap_or(len))))
                }
                FieldKind::Email => RawValue::text("someone@example.com"),
                FieldKind::Password => RawValue::text("s3cret-pass"),
                FieldKind::Phone => RawValue::text("+1 234 567 89"),
                FieldKind::Date => RawValue::text("2024-09-01"),
                FieldKind::Number { min, .. } => RawValue::text(min.unwrap_or(1).to_string()),
                FieldKind::Enum { values } => RawValue::text(values[0].clone()),
                FieldKind::Relation { target } => {
                    let id = EntityId::new(*target).to_string();
                    candidates.insert(&field.name, [id.clone()]);
                    RawValue::text(id)
                }
                FieldKind::File { .. } => RawValue::File(FileHandle::new("photo.png", "image/png")),
            };
            raw.insert(field.name.clone(), value);
        }
        (raw, candidates)
    }

    #[test]
    fn test_every_schema_accepts_a_complete_record() {
        let registry = SchemaRegistry::builtin().unwrap();
        for kind in EntityKind::all() {
            let schema = registry.get(*kind).unwrap();
            let (raw, candidates) = fully_populated(&schema);
            let result = validate(&schema, &raw, FormMode::Create, &candidates);
            assert!(result.is_ok(), "{} rejected a complete record: {:?}", kind, result);
        }
    }

    #[test]
    fn test_every_required_field_fails_alone_in_every_schema() {
        let registry = SchemaRegistry::builtin().unwrap();
        for kind in EntityKind::all() {
            let schema = registry.get(*kind).unwrap();
            let (complete, candidates) = fully_populated(&schema);
            for field in schema.fields.iter().filter(|f| f.required) {
                let mut raw = complete.clone();
                raw.remove(&field.name);
                let errors = validate(&schema, &raw, FormMode::Create, &candidates).unwrap_err();
                assert_eq!(
                    errors.fields().collect::<Vec<_>>(),
                    [field.name.as_str()],
                    "{}: dropping {}",
                    kind,
                    field.name
                );
                assert_eq!(errors.get(&field.name).unwrap(), [field.required_message()]);
            }
        }
    }

    #[test]
    fn test_image_required_on_create_only() {
        let schema = teacher_schema();
        let mut raw = valid_teacher();
        raw.remove("img");

        let errors = validate(&schema, &raw, FormMode::Create, &no_candidates()).unwrap_err();
        assert_eq!(errors.get("img").unwrap(), ["Image is required"]);

        let record = validate(&schema, &raw, FormMode::Update, &no_candidates()).unwrap();
        assert!(!record.contains("img"));
    }

    #[test]
    fn test_all_errors_reported_together() {
        let schema = teacher_schema();
        let mut raw = valid_teacher();
        raw.insert("email".to_string(), RawValue::text("not-an-email"));
        raw.insert("bloodType".to_string(), RawValue::text("o+"));
        raw.insert("birthday".to_string(), RawValue::text("2023-02-30"));
        raw.remove("address");

        let errors = validate(&schema, &raw, FormMode::Create, &no_candidates()).unwrap_err();
        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec!["email", "address", "birthday", "bloodType"]
        );
        assert_eq!(errors.get("email").unwrap(), ["Invalid email address"]);
        assert_eq!(errors.get("bloodType").unwrap(), ["Blood type has an invalid value"]);
        assert_eq!(errors.get("birthday").unwrap(), ["Birth date must be a valid date"]);
        assert_eq!(errors.get("address").unwrap(), ["Address is required"]);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let schema = teacher_schema();
        let mut raw = valid_teacher();
        raw.insert("username".to_string(), RawValue::text("jd"));
        let first = validate(&schema, &raw, FormMode::Create, &no_candidates());
        let second = validate(&schema, &raw, FormMode::Create, &no_candidates());
        assert_eq!(first, second);

        let raw = valid_teacher();
        let first = validate(&schema, &raw, FormMode::Create, &no_candidates());
        let second = validate(&schema, &raw, FormMode::Create, &no_candidates());
        assert_eq!(first, second);
    }

    #[test]
    fn test_multiple_messages_on_one_field() {
        let field = FieldDescriptor::email("email").with_length(Some(8), None);
        let messages = check_field(
            &field,
            Some(&RawValue::text("a@b")),
            FormMode::Create,
            &no_candidates(),
        )
        .unwrap_err();
        assert_eq!(
            messages,
            vec!["Email must be at least 8 characters", "Invalid email address"]
        );
    }

    #[test]
    fn test_cross_field_rule_reports_under_form_key() {
        let schema = teacher_schema();
        let mut raw = valid_teacher();
        raw.insert("password".to_string(), RawValue::text("JohnDoe1"));
        raw.insert("username".to_string(), RawValue::text("johndoe1"));

        let errors = validate(&schema, &raw, FormMode::Create, &no_candidates()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.form_errors(), ["Password must not match the username"]);
    }

    #[test]
    fn test_cross_field_rules_skipped_when_fields_fail() {
        let schema = teacher_schema();
        let mut raw = valid_teacher();
        raw.insert("password".to_string(), RawValue::text("johndoe"));
        raw.insert("username".to_string(), RawValue::text("johndoe"));

        let errors = validate(&schema, &raw, FormMode::Create, &no_candidates()).unwrap_err();
        assert!(errors.contains("password"));
        assert!(!errors.contains(FORM_KEY));
    }

    #[test]
    fn test_relation_requires_candidate() {
        let registry = SchemaRegistry::builtin().unwrap();
        let class = registry.get(EntityKind::Class).unwrap();
        let mut raw = BTreeMap::new();
        raw.insert("name".to_string(), RawValue::text("4A"));
        raw.insert("capacity".to_string(), RawValue::text("28"));
        raw.insert("grade".to_string(), RawValue::text("GRD-01HX0000000000000000000004"));
        raw.insert("supervisor".to_string(), RawValue::text("TCH-01HX0000000000000000000001"));

        let errors = validate(&class, &raw, FormMode::Create, &no_candidates()).unwrap_err();
        assert_eq!(errors.get("grade").unwrap(), ["Referenced grade does not exist"]);
        assert_eq!(errors.get("supervisor").unwrap(), ["Referenced teacher does not exist"]);

        let candidates = RelationCandidates::new()
            .with("grade", ["GRD-01HX0000000000000000000004"])
            .with("supervisor", ["TCH-01HX0000000000000000000001"]);
        let record = validate(&class, &raw, FormMode::Create, &candidates).unwrap();
        assert_eq!(record.get("capacity"), Some(&TypedValue::Number(28)));
    }

    #[test]
    fn test_number_bounds() {
        let field = FieldDescriptor::number("capacity", Some(1), Some(60));
        let check = |s: &str| {
            check_field(&field, Some(&RawValue::text(s)), FormMode::Create, &no_candidates())
        };
        assert_eq!(check("0").unwrap_err(), vec!["Capacity must be at least 1"]);
        assert_eq!(check("61").unwrap_err(), vec!["Capacity must be at most 60"]);
        assert_eq!(check("2.5").unwrap_err(), vec!["Capacity must be a whole number"]);
        assert_eq!(check("30").unwrap(), Some(TypedValue::Number(30)));
    }

    #[test]
    fn test_message_overrides() {
        let field = FieldDescriptor::text("title")
            .with_length(Some(5), None)
            .with_messages(FieldMessages {
                required: Some("Title is mandatory!".to_string()),
                min: Some("Title is too short".to_string()),
                ..Default::default()
            });
        let check = |v: Option<RawValue>| {
            check_field(&field, v.as_ref(), FormMode::Create, &no_candidates())
        };
        assert_eq!(check(None).unwrap_err(), vec!["Title is mandatory!"]);
        assert_eq!(check(Some(RawValue::text("Hi"))).unwrap_err(), vec!["Title is too short"]);
    }

    #[test]
    fn test_file_content_type_checked() {
        let schema = teacher_schema();
        let mut raw = valid_teacher();
        raw.insert(
            "img".to_string(),
            RawValue::File(FileHandle::new("cv.pdf", "application/pdf")),
        );
        let errors = validate(&schema, &raw, FormMode::Update, &no_candidates()).unwrap_err();
        assert_eq!(errors.get("img").unwrap(), ["Image must be one of: image/*"]);
    }

    #[test]
    fn test_text_for_file_field_is_rejected() {
        let field = FieldDescriptor::file("img").with_label("Image");
        let err = check_field(
            &field,
            Some(&RawValue::text("https://example.com/me.png")),
            FormMode::Create,
            &no_candidates(),
        )
        .unwrap_err();
        assert_eq!(err, vec!["Image must be a file"]);
    }

    #[test]
    fn test_optional_blank_field_is_omitted() {
        let field = FieldDescriptor::text("description").optional();
        let blank = RawValue::text("  ");
        let result = check_field(&field, Some(&blank), FormMode::Create, &no_candidates());
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn test_phone_format() {
        assert!(is_phone("+1 234 567 89"));
        assert!(is_phone("0700 000 000"));
        assert!(is_phone("(555) 123-4567"));
        assert!(!is_phone("12345"));
        assert!(!is_phone("call me maybe 1234567"));
    }

    #[test]
    fn test_email_grammar() {
        assert!(EMAIL_RE.is_match("x@y.com"));
        assert!(EMAIL_RE.is_match("first.last+tag@school.example.org"));
        assert!(!EMAIL_RE.is_match("x@y"));
        assert!(!EMAIL_RE.is_match("x y@z.com"));
        assert!(!EMAIL_RE.is_match("@z.com"));
    }

    #[test]
    fn test_error_map_serializes_in_order() {
        let mut errors = FieldErrors::new();
        errors.push("username", "Username is required");
        errors.push(FORM_KEY, "bad");
        let json = serde_json::to_string(&errors).unwrap();
        assert_eq!(json, r#"{"username":["Username is required"],"_form":["bad"]}"#);
    }
}
