//! Entity schema registry
//!
//! One [`EntitySchema`] per [`EntityKind`], defined once at startup and frozen.
//! Built-in schemas are embedded from `schemas/*.schema.yaml`; additional
//! schema files (e.g. from configured directories) override built-ins of the
//! same kind. All consistency checks run when the registry is built, so a
//! broken schema fails fast instead of surfacing at submit time.

use miette::Diagnostic;
use rust_embed::Embed;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

use crate::core::identity::EntityKind;
use crate::core::value::TypedValue;
use crate::schema::field::FieldDescriptor;

#[derive(Embed)]
#[folder = "schemas/"]
struct EmbeddedSchemas;

const SCHEMA_SUFFIX: &str = ".schema.yaml";

/// Errors raised while defining or looking up schemas.
///
/// These are programmer errors: they are reported when the registry is built
/// or a session is opened, never as user-facing validation messages.
#[derive(Debug, Error, Diagnostic)]
pub enum SchemaError {
    #[error("unknown entity kind: '{0}'")]
    #[diagnostic(
        code(sform::schema::unknown_kind),
        help("run 'sform schema list' to see registered entity kinds")
    )]
    UnknownEntityKind(String),

    #[error("schema mismatch for {entity}: {message}")]
    #[diagnostic(code(sform::schema::mismatch))]
    SchemaMismatch { entity: String, message: String },

    #[error("failed to parse schema {origin}: {message}")]
    #[diagnostic(code(sform::schema::parse))]
    Parse { origin: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchemaError {
    pub fn mismatch(entity: impl fmt::Display, message: impl Into<String>) -> Self {
        SchemaError::SchemaMismatch {
            entity: entity.to_string(),
            message: message.into(),
        }
    }
}

/// Predicate over a whole record, used by [`CustomRule`]
pub type RulePredicate = dyn Fn(&BTreeMap<String, TypedValue>) -> bool + Send + Sync;

/// A cross-field rule implemented in code
#[derive(Clone)]
pub struct CustomRule {
    pub name: String,
    pub fields: Vec<String>,
    predicate: Arc<RulePredicate>,
}

impl CustomRule {
    pub fn new<F>(name: impl Into<String>, fields: &[&str], predicate: F) -> Self
    where
        F: Fn(&BTreeMap<String, TypedValue>) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRule")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// The check a cross-field rule performs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleCheck {
    /// `later` must not precede `earlier`
    DateOrder { earlier: String, later: String },
    /// The two fields must not hold the same value
    FieldsDiffer { first: String, second: String },
    /// At least one of the fields must be present
    OneOf { fields: Vec<String> },
    #[serde(skip)]
    Custom(CustomRule),
}

/// A predicate over the full record plus the message reported when it fails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossFieldRule {
    pub message: String,
    #[serde(flatten)]
    pub check: RuleCheck,
}

impl CrossFieldRule {
    pub fn new(check: RuleCheck, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            check,
        }
    }

    /// Fields the rule reads
    pub fn referenced_fields(&self) -> Vec<&str> {
        match &self.check {
            RuleCheck::DateOrder { earlier, later } => vec![earlier.as_str(), later.as_str()],
            RuleCheck::FieldsDiffer { first, second } => vec![first.as_str(), second.as_str()],
            RuleCheck::OneOf { fields } => fields.iter().map(String::as_str).collect(),
            RuleCheck::Custom(rule) => rule.fields.iter().map(String::as_str).collect(),
        }
    }

    /// Evaluate against typed fields. Rules over absent optional fields pass.
    pub fn holds(&self, fields: &BTreeMap<String, TypedValue>) -> bool {
        match &self.check {
            RuleCheck::DateOrder { earlier, later } => {
                match (
                    fields.get(earlier).and_then(TypedValue::as_date),
                    fields.get(later).and_then(TypedValue::as_date),
                ) {
                    (Some(a), Some(b)) => b >= a,
                    _ => true,
                }
            }
            RuleCheck::FieldsDiffer { first, second } => {
                match (fields.get(first), fields.get(second)) {
                    (Some(a), Some(b)) => match (a.as_str(), b.as_str()) {
                        (Some(a), Some(b)) => !a.eq_ignore_ascii_case(b),
                        _ => a != b,
                    },
                    _ => true,
                }
            }
            RuleCheck::OneOf { fields: names } => names.iter().any(|n| fields.contains_key(n)),
            RuleCheck::Custom(rule) => (rule.predicate.as_ref())(fields),
        }
    }
}

/// Validation schema for one entity kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySchema {
    pub entity: EntityKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub fields: Vec<FieldDescriptor>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<CrossFieldRule>,
}

impl EntitySchema {
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            title: None,
            description: None,
            fields: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_rule(mut self, rule: CrossFieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Parse a schema document
    pub fn from_yaml(content: &str, origin: &str) -> Result<Self, SchemaError> {
        serde_yml::from_str(content).map_err(|e| SchemaError::Parse {
            origin: origin.to_string(),
            message: e.to_string(),
        })
    }

    pub fn title(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            let name = self.entity.as_str();
            let mut chars = name.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Relation fields with their target kinds
    pub fn relation_fields(&self) -> impl Iterator<Item = (&FieldDescriptor, EntityKind)> {
        self.fields
            .iter()
            .filter_map(|f| f.relation_target().map(|t| (f, t)))
    }

    /// Names of fields persistence must keep unique
    pub fn unique_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.unique)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Check internal consistency: unique names, well-formed descriptors, rule references
    pub fn check(&self) -> Result<(), SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::mismatch(self.entity, "schema declares no fields"));
        }

        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::mismatch(
                    self.entity,
                    format!("duplicate field '{}'", field.name),
                ));
            }
            field
                .check_definition()
                .map_err(|msg| SchemaError::mismatch(self.entity, msg))?;
        }

        for rule in &self.rules {
            for name in rule.referenced_fields() {
                if !seen.contains(name) {
                    return Err(SchemaError::mismatch(
                        self.entity,
                        format!("rule '{}' references unknown field '{}'", rule.message, name),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Frozen mapping from entity kind to schema
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<EntityKind, Arc<EntitySchema>>,
    sources: BTreeMap<EntityKind, String>,
}

impl SchemaRegistry {
    /// Registry holding every embedded schema
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::builder().with_builtin()?.build()
    }

    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Look up the schema for a kind
    pub fn get(&self, kind: EntityKind) -> Result<Arc<EntitySchema>, SchemaError> {
        self.schemas
            .get(&kind)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownEntityKind(kind.to_string()))
    }

    /// Look up a schema by kind name ("teacher", "classes", ...)
    pub fn get_by_name(&self, name: &str) -> Result<Arc<EntitySchema>, SchemaError> {
        let kind: EntityKind = name
            .parse()
            .map_err(|_| SchemaError::UnknownEntityKind(name.to_string()))?;
        self.get(kind)
    }

    pub fn has_schema(&self, kind: EntityKind) -> bool {
        self.schemas.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.schemas.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntitySchema>> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Original YAML text for schemas loaded from documents
    pub fn source(&self, kind: EntityKind) -> Option<&str> {
        self.sources.get(&kind).map(String::as_str)
    }
}

/// Mutable stage of registry construction; `build` freezes it
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    schemas: BTreeMap<EntityKind, EntitySchema>,
    sources: BTreeMap<EntityKind, String>,
}

impl SchemaRegistryBuilder {
    /// Load every embedded `*.schema.yaml`
    pub fn with_builtin(mut self) -> Result<Self, SchemaError> {
        for file in EmbeddedSchemas::iter() {
            let filename = file.as_ref();
            if !filename.ends_with(SCHEMA_SUFFIX) {
                continue;
            }
            let Some(content) = EmbeddedSchemas::get(filename) else {
                continue;
            };
            let text = std::str::from_utf8(&content.data).map_err(|e| SchemaError::Parse {
                origin: filename.to_string(),
                message: e.to_string(),
            })?;
            self = self.with_yaml(text, filename)?;
        }
        Ok(self)
    }

    /// Register a schema document; the file stem, when it names a kind, must match `entity`
    pub fn with_yaml(mut self, content: &str, origin: &str) -> Result<Self, SchemaError> {
        let schema = EntitySchema::from_yaml(content, origin)?;

        let stem = Path::new(origin)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .and_then(|n| n.strip_suffix(SCHEMA_SUFFIX).map(str::to_string));
        if let Some(stem) = stem {
            if let Ok(kind) = stem.parse::<EntityKind>() {
                if kind != schema.entity {
                    return Err(SchemaError::mismatch(
                        schema.entity,
                        format!("file '{}' declares entity '{}'", origin, schema.entity),
                    ));
                }
            }
        }

        self.sources.insert(schema.entity, content.to_string());
        self.schemas.insert(schema.entity, schema);
        Ok(self)
    }

    /// Register every `*.schema.yaml` below a directory
    pub fn with_dir(mut self, dir: &Path) -> Result<Self, SchemaError> {
        for entry in WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if !path.to_string_lossy().ends_with(SCHEMA_SUFFIX) {
                continue;
            }
            let content = std::fs::read_to_string(path)?;
            tracing::debug!(path = %path.display(), "loading schema file");
            self = self.with_yaml(&content, &path.to_string_lossy())?;
        }
        Ok(self)
    }

    /// Register a schema built in code, replacing any previous one of the same kind
    pub fn with_schema(mut self, schema: EntitySchema) -> Self {
        self.sources.remove(&schema.entity);
        self.schemas.insert(schema.entity, schema);
        self
    }

    /// Run all consistency checks and freeze the registry
    pub fn build(self) -> Result<SchemaRegistry, SchemaError> {
        for schema in self.schemas.values() {
            schema.check()?;
            for (field, target) in schema.relation_fields() {
                if !self.schemas.contains_key(&target) {
                    return Err(SchemaError::mismatch(
                        schema.entity,
                        format!(
                            "relation field '{}' targets '{}', which has no schema",
                            field.name, target
                        ),
                    ));
                }
            }
        }

        tracing::debug!(count = self.schemas.len(), "schema registry built");

        Ok(SchemaRegistry {
            schemas: self
                .schemas
                .into_iter()
                .map(|(kind, schema)| (kind, Arc::new(schema)))
                .collect(),
            sources: self.sources,
        })
    }
}
