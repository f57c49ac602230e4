//! Raw form input, typed field values, and validated records

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::core::identity::EntityKind;

/// Whether a form creates a new entity or updates an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FormMode {
    Create,
    Update,
}

impl fmt::Display for FormMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormMode::Create => write!(f, "create"),
            FormMode::Update => write!(f, "update"),
        }
    }
}

/// Handle to an uploaded binary asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    /// File name as chosen by the user
    pub name: String,
    /// MIME type, e.g. `image/png`
    pub content_type: String,
    /// Size in bytes, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            size: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Describe an existing file on disk, guessing its content type from the extension
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(std::io::Error::other("not a regular file"));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            content_type: guess_content_type(&name).to_string(),
            name,
            size: Some(metadata.len()),
        })
    }

    /// Check the content type against a pattern such as `image/*` or `image/png`
    pub fn matches_type(&self, pattern: &str) -> bool {
        match pattern.strip_suffix("/*") {
            Some(major) => self
                .content_type
                .split_once('/')
                .is_some_and(|(m, _)| m.eq_ignore_ascii_case(major)),
            None => self.content_type.eq_ignore_ascii_case(pattern),
        }
    }
}

fn guess_content_type(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// A raw, unvalidated value as entered in a form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Text(String),
    Date(NaiveDate),
    File(FileHandle),
}

impl RawValue {
    pub fn text(s: impl Into<String>) -> Self {
        RawValue::Text(s.into())
    }

    /// True for absent-equivalent input (blank text)
    pub fn is_blank(&self) -> bool {
        matches!(self, RawValue::Text(s) if s.trim().is_empty())
    }

    /// Display form used when pre-filling prompts
    pub fn display_text(&self) -> String {
        match self {
            RawValue::Text(s) => s.clone(),
            RawValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            RawValue::File(f) => f.name.clone(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<NaiveDate> for RawValue {
    fn from(d: NaiveDate) -> Self {
        RawValue::Date(d)
    }
}

impl From<FileHandle> for RawValue {
    fn from(f: FileHandle) -> Self {
        RawValue::File(f)
    }
}

/// A normalized, typed field value
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Text(String),
    /// Password-like value; never printed by `Debug`
    Secret(String),
    Number(i64),
    Date(NaiveDate),
    Enum(String),
    /// Identifier of a referenced entity
    Relation(String),
    File(FileHandle),
}

impl TypedValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::Text(s)
            | TypedValue::Secret(s)
            | TypedValue::Enum(s)
            | TypedValue::Relation(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            TypedValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Debug for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Text(s) => f.debug_tuple("Text").field(s).finish(),
            TypedValue::Secret(_) => f.write_str("Secret(***)"),
            TypedValue::Number(n) => f.debug_tuple("Number").field(n).finish(),
            TypedValue::Date(d) => f.debug_tuple("Date").field(d).finish(),
            TypedValue::Enum(s) => f.debug_tuple("Enum").field(s).finish(),
            TypedValue::Relation(s) => f.debug_tuple("Relation").field(s).finish(),
            TypedValue::File(h) => f.debug_tuple("File").field(h).finish(),
        }
    }
}

/// Typed output of a successful validation, ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRecord {
    entity_kind: EntityKind,
    fields: BTreeMap<String, TypedValue>,
}

impl ValidatedRecord {
    pub fn new(entity_kind: EntityKind, fields: BTreeMap<String, TypedValue>) -> Self {
        Self {
            entity_kind,
            fields,
        }
    }

    pub fn entity_kind(&self) -> EntityKind {
        self.entity_kind
    }

    pub fn fields(&self) -> &BTreeMap<String, TypedValue> {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_patterns() {
        let png = FileHandle::new("me.png", "image/png");
        assert!(png.matches_type("image/*"));
        assert!(png.matches_type("image/png"));
        assert!(!png.matches_type("image/jpeg"));
        assert!(!png.matches_type("application/*"));
    }

    #[test]
    fn test_file_from_path_guesses_type() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("photo.JPG");
        std::fs::write(&path, [0u8; 8]).unwrap();

        let handle = FileHandle::from_path(&path).unwrap();
        assert_eq!(handle.name, "photo.JPG");
        assert_eq!(handle.content_type, "image/jpeg");
        assert_eq!(handle.size, Some(8));
    }

    #[test]
    fn test_file_from_path_requires_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(FileHandle::from_path(&tmp.path().join("missing.png")).is_err());
        assert!(FileHandle::from_path(tmp.path()).is_err());
    }

    #[test]
    fn test_secret_not_in_debug() {
        let v = TypedValue::Secret("hunter22".to_string());
        assert_eq!(format!("{:?}", v), "Secret(***)");
    }

    #[test]
    fn test_typed_value_serializes_plain() {
        let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let json = serde_json::to_value(TypedValue::Date(date)).unwrap();
        assert_eq!(json, serde_json::json!("2000-01-01"));
        let json = serde_json::to_value(TypedValue::Number(30)).unwrap();
        assert_eq!(json, serde_json::json!(30));
    }

    #[test]
    fn test_blank_detection() {
        assert!(RawValue::text("   ").is_blank());
        assert!(!RawValue::text("x").is_blank());
        assert!(!RawValue::File(FileHandle::new("a.png", "image/png")).is_blank());
    }
}
