//! Field descriptors - declarative metadata for one form input

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::identity::EntityKind;

/// Semantic type of a field, carrying the constraints that only make sense for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    Password,
    Phone,
    Date,
    /// Whole number with optional inclusive bounds
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    /// One of a fixed, ordered set of literals (case-sensitive)
    Enum { values: Vec<String> },
    /// Foreign key to an existing entity of `target` kind
    Relation { target: EntityKind },
    /// Binary upload; `accept` holds content-type patterns such as `image/*`
    File {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        accept: Vec<String>,
    },
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Email => "email",
            FieldKind::Password => "password",
            FieldKind::Phone => "phone",
            FieldKind::Date => "date",
            FieldKind::Number { .. } => "number",
            FieldKind::Enum { .. } => "enum",
            FieldKind::Relation { .. } => "relation",
            FieldKind::File { .. } => "file",
        }
    }

    /// Kinds subject to `min_length` / `max_length`
    pub fn is_string(&self) -> bool {
        matches!(self, FieldKind::Text | FieldKind::Email | FieldKind::Password)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-field message overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMessages {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid: Option<String>,
}

/// Declarative description of a single form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,

    /// Label used in messages; derived from `name` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(flatten)]
    pub kind: FieldKind,

    #[serde(default = "default_required")]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Value must be unique across entities of this kind (enforced by persistence)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "is_default_messages")]
    pub messages: FieldMessages,
}

fn default_required() -> bool {
    true
}

fn is_default_messages(m: &FieldMessages) -> bool {
    *m == FieldMessages::default()
}

impl FieldDescriptor {
    /// Create a required field of the given kind
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: None,
            kind,
            required: true,
            min_length: None,
            max_length: None,
            unique: false,
            description: None,
            messages: FieldMessages::default(),
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn email(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Email)
    }

    pub fn password(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Password)
    }

    pub fn phone(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Phone)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn number(name: impl Into<String>, min: Option<i64>, max: Option<i64>) -> Self {
        Self::new(name, FieldKind::Number { min, max })
    }

    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            FieldKind::Enum {
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn relation(name: impl Into<String>, target: EntityKind) -> Self {
        Self::new(name, FieldKind::Relation { target })
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::File { accept: Vec::new() })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_messages(mut self, messages: FieldMessages) -> Self {
        self.messages = messages;
        self
    }

    /// Label for messages, e.g. `firstName` -> `First name`
    pub fn label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| humanize(&self.name))
    }

    /// Allowed literals for `enum` fields
    pub fn enum_values(&self) -> Option<&[String]> {
        match &self.kind {
            FieldKind::Enum { values } => Some(values),
            _ => None,
        }
    }

    /// Target kind for `relation` fields
    pub fn relation_target(&self) -> Option<EntityKind> {
        match self.kind {
            FieldKind::Relation { target } => Some(target),
            _ => None,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, FieldKind::File { .. })
    }

    /// Short description of what the field accepts, for prompts and templates
    pub fn hint(&self) -> String {
        let length = match (self.min_length, self.max_length) {
            (Some(min), Some(max)) => Some(format!("{}-{} characters", min, max)),
            (Some(min), None) => Some(format!("at least {} characters", min)),
            (None, Some(max)) => Some(format!("at most {} characters", max)),
            (None, None) => None,
        };
        let shape = match &self.kind {
            FieldKind::Text | FieldKind::Password => None,
            FieldKind::Email => Some("email address".to_string()),
            FieldKind::Phone => Some("phone number".to_string()),
            FieldKind::Date => Some("YYYY-MM-DD".to_string()),
            FieldKind::Number { min, max } => Some(match (min, max) {
                (Some(min), Some(max)) => format!("whole number {}..{}", min, max),
                (Some(min), None) => format!("whole number >= {}", min),
                (None, Some(max)) => format!("whole number <= {}", max),
                (None, None) => "whole number".to_string(),
            }),
            FieldKind::Enum { values } => Some(format!("one of: {}", values.join(", "))),
            FieldKind::Relation { target } => {
                Some(format!("{} id ({}-...)", target, target.prefix()))
            }
            FieldKind::File { accept } if accept.is_empty() => Some("file path".to_string()),
            FieldKind::File { accept } => Some(format!("file path ({})", accept.join(", "))),
        };
        match (shape, length) {
            (Some(shape), Some(length)) => format!("{}, {}", shape, length),
            (Some(hint), None) | (None, Some(hint)) => hint,
            (None, None) => String::new(),
        }
    }

    /// Check the descriptor's own consistency; returns a problem description
    pub fn check_definition(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("field name must not be empty".to_string());
        }
        match &self.kind {
            FieldKind::Enum { values } => {
                if values.is_empty() {
                    return Err(format!("enum field '{}' has no values", self.name));
                }
                for (i, v) in values.iter().enumerate() {
                    if values[..i].contains(v) {
                        return Err(format!(
                            "enum field '{}' lists '{}' more than once",
                            self.name, v
                        ));
                    }
                }
            }
            FieldKind::Number {
                min: Some(min),
                max: Some(max),
            } if min > max => {
                return Err(format!("number field '{}' has min > max", self.name));
            }
            _ => {}
        }
        if self.min_length.is_some() || self.max_length.is_some() {
            if !self.kind.is_string() {
                return Err(format!(
                    "length bounds are only valid on text, email, and password fields ('{}' is {})",
                    self.name, self.kind
                ));
            }
            if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
                if min > max {
                    return Err(format!(
                        "field '{}' has min_length {} > max_length {}",
                        self.name, min, max
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn required_message(&self) -> String {
        self.messages
            .required
            .clone()
            .unwrap_or_else(|| format!("{} is required", self.label()))
    }

    pub fn min_message(&self, bound: impl fmt::Display) -> String {
        self.messages.min.clone().unwrap_or_else(|| match self.kind {
            FieldKind::Number { .. } => format!("{} must be at least {}", self.label(), bound),
            _ => format!("{} must be at least {} characters", self.label(), bound),
        })
    }

    pub fn max_message(&self, bound: impl fmt::Display) -> String {
        self.messages.max.clone().unwrap_or_else(|| match self.kind {
            FieldKind::Number { .. } => format!("{} must be at most {}", self.label(), bound),
            _ => format!("{} must be at most {} characters", self.label(), bound),
        })
    }

    /// Message for a value that is present but malformed for this kind
    pub fn invalid_message(&self) -> String {
        if let Some(ref msg) = self.messages.invalid {
            return msg.clone();
        }
        match &self.kind {
            FieldKind::Email => "Invalid email address".to_string(),
            FieldKind::Phone => "Invalid phone number".to_string(),
            FieldKind::Date => format!("{} must be a valid date", self.label()),
            FieldKind::Number { .. } => format!("{} must be a whole number", self.label()),
            FieldKind::Enum { .. } => format!("{} has an invalid value", self.label()),
            FieldKind::Relation { target } => format!("Referenced {} does not exist", target),
            FieldKind::File { accept } if !accept.is_empty() => {
                format!("{} must be one of: {}", self.label(), accept.join(", "))
            }
            FieldKind::File { .. } => format!("{} must be a file", self.label()),
            FieldKind::Text | FieldKind::Password => {
                format!("{} has an invalid value", self.label())
            }
        }
    }
}

/// Turn a camelCase or snake_case identifier into a sentence-case label
fn humanize(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in name.chars() {
        if c == '_' || c == '-' || c == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if c.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.extend(c.to_lowercase());
        } else {
            current.extend(c.to_lowercase());
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    let joined = words.join(" ");
    let mut chars = joined.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_uppercase().chain(chars).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanize_labels() {
        assert_eq!(humanize("firstName"), "First name");
        assert_eq!(humanize("bloodType"), "Blood type");
        assert_eq!(humanize("username"), "Username");
        assert_eq!(humanize("due_date"), "Due date");
    }

    #[test]
    fn test_explicit_label_wins() {
        let field = FieldDescriptor::file("img").with_label("Image");
        assert_eq!(field.label(), "Image");
        assert_eq!(field.required_message(), "Image is required");
    }

    #[test]
    fn test_hints() {
        let username = FieldDescriptor::text("username").with_length(Some(3), Some(20));
        assert_eq!(username.hint(), "3-20 characters");
        assert_eq!(
            FieldDescriptor::number("capacity", Some(1), Some(60)).hint(),
            "whole number 1..60"
        );
        assert_eq!(
            FieldDescriptor::relation("grade", EntityKind::Grade).hint(),
            "grade id (GRD-...)"
        );
        assert_eq!(FieldDescriptor::text("address").hint(), "");
    }

    #[test]
    fn test_deserialize_tagged_kinds() {
        let yaml = r#"
- name: bloodType
  kind: enum
  values: ["A+", "O-"]
- name: supervisor
  kind: relation
  target: teacher
- name: username
  kind: text
  min_length: 3
  max_length: 20
  unique: true
- name: img
  kind: file
  required: false
  accept: ["image/*"]
"#;
        let fields: Vec<FieldDescriptor> = serde_yml::from_str(yaml).unwrap();
        assert_eq!(fields[0].enum_values().unwrap(), ["A+", "O-"]);
        assert_eq!(fields[1].relation_target(), Some(EntityKind::Teacher));
        assert_eq!(fields[2].min_length, Some(3));
        assert!(fields[2].unique);
        assert!(fields[2].required);
        assert!(!fields[3].required);
        assert!(fields[3].is_file());
    }

    #[test]
    fn test_enum_without_values_rejected() {
        let field = FieldDescriptor::enumeration("sex", Vec::<String>::new());
        assert!(field.check_definition().is_err());
    }

    #[test]
    fn test_length_on_non_string_rejected() {
        let field = FieldDescriptor::date("birthday").with_length(Some(1), None);
        assert!(field.check_definition().is_err());
    }

    #[test]
    fn test_default_messages() {
        let username = FieldDescriptor::text("username").with_length(Some(3), Some(20));
        assert_eq!(username.min_message(3), "Username must be at least 3 characters");
        assert_eq!(username.max_message(20), "Username must be at most 20 characters");

        let grade = FieldDescriptor::relation("grade", EntityKind::Grade);
        assert_eq!(grade.invalid_message(), "Referenced grade does not exist");

        let email = FieldDescriptor::email("email");
        assert_eq!(email.invalid_message(), "Invalid email address");
    }
}
