//! Decoding of YAML form documents into raw form values
//!
//! A form document is a flat mapping of field name to value. Scalars become
//! text; file fields take either a path (relative to the document) or an
//! explicit `{name, content_type, size}` mapping. `null` means "left empty".

use miette::Diagnostic;
use serde_yml::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::core::value::{FileHandle, RawValue};
use crate::schema::field::FieldKind;
use crate::schema::registry::{EntitySchema, SchemaError};
use crate::yaml::YamlSyntaxError;

/// Raw values keyed by field name
pub type RawValues = BTreeMap<String, RawValue>;

/// Errors decoding a form document
#[derive(Debug, Error, Diagnostic)]
pub enum InputError {
    #[error("failed to read {path}")]
    #[diagnostic(code(sform::input::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] YamlSyntaxError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error("{origin}: a form document must be a mapping of field names to values")]
    #[diagnostic(
        code(sform::input::shape),
        help("run `sform template <kind>` for a starting point")
    )]
    NotAMapping { origin: String },

    #[error("field '{field}': cannot attach {path}")]
    #[diagnostic(
        code(sform::input::file),
        help("file paths are resolved relative to the form document")
    )]
    MissingFile {
        field: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("field '{field}' has an unsupported value")]
    #[diagnostic(code(sform::input::value), help("{hint}"))]
    UnsupportedValue { field: String, hint: String },
}

/// Read and decode a form document from disk
pub fn read_input(path: &Path, schema: &EntitySchema) -> Result<RawValues, InputError> {
    let content = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_input(&content, &path.display().to_string(), schema, base_dir)
}

/// Decode a form document. Relative file paths resolve against `base_dir`.
pub fn parse_input(
    content: &str,
    origin: &str,
    schema: &EntitySchema,
    base_dir: &Path,
) -> Result<RawValues, InputError> {
    let document: Value = if content.trim().is_empty() {
        Value::Mapping(Default::default())
    } else {
        serde_yml::from_str(content)
            .map_err(|e| YamlSyntaxError::from_serde_error(&e, content, origin))?
    };

    let mapping: BTreeMap<String, Value> = match document {
        Value::Null => BTreeMap::new(),
        Value::Mapping(_) => {
            serde_yml::from_value(document).map_err(|_| InputError::NotAMapping {
                origin: origin.to_string(),
            })?
        }
        _ => {
            return Err(InputError::NotAMapping {
                origin: origin.to_string(),
            })
        }
    };

    let mut values = RawValues::new();
    for (name, value) in mapping {
        let field = schema.field(&name).ok_or_else(|| {
            SchemaError::mismatch(schema.entity, format!("unknown field '{}'", name))
        })?;

        let is_file = matches!(field.kind, FieldKind::File { .. });
        let raw = match value {
            Value::Null => continue,
            Value::String(s) if is_file => {
                if s.trim().is_empty() {
                    continue;
                }
                attach_file(&name, &base_dir.join(s.trim()))?
            }
            Value::String(s) => RawValue::Text(s),
            Value::Number(n) => RawValue::Text(n.to_string()),
            Value::Bool(b) => RawValue::Text(b.to_string()),
            Value::Mapping(_) if is_file => {
                let handle: FileHandle =
                    serde_yml::from_value(value).map_err(|e| InputError::UnsupportedValue {
                        field: name.clone(),
                        hint: format!("file mappings need `name` and `content_type` ({})", e),
                    })?;
                RawValue::File(handle)
            }
            _ => {
                return Err(InputError::UnsupportedValue {
                    hint: if is_file {
                        "give a file path or a {name, content_type} mapping".to_string()
                    } else {
                        "use a plain scalar value".to_string()
                    },
                    field: name,
                })
            }
        };
        values.insert(name, raw);
    }

    tracing::debug!(%origin, fields = values.len(), "decoded form document");
    Ok(values)
}

/// File value for an upload path; the file must exist
pub fn attach_file(field: &str, path: &Path) -> Result<RawValue, InputError> {
    FileHandle::from_path(path)
        .map(RawValue::File)
        .map_err(|source| InputError::MissingFile {
            field: field.to_string(),
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::EntityKind;
    use crate::schema::registry::SchemaRegistry;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn schema(kind: EntityKind) -> Arc<EntitySchema> {
        SchemaRegistry::builtin().unwrap().get(kind).unwrap()
    }

    #[test]
    fn test_scalars_become_text() {
        let doc = "name: 1A\ncapacity: 30\ngrade: null\n";
        let values = parse_input(doc, "class.yaml", &schema(EntityKind::Class), Path::new("."))
            .unwrap();
        assert_eq!(values["name"], RawValue::text("1A"));
        assert_eq!(values["capacity"], RawValue::text("30"));
        assert!(!values.contains_key("grade"));
    }

    #[test]
    fn test_file_path_resolves_against_base_dir() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("john.png"), [0u8; 16]).unwrap();
        let values = parse_input(
            "img: john.png\n",
            "teacher.yaml",
            &schema(EntityKind::Teacher),
            tmp.path(),
        )
        .unwrap();
        let RawValue::File(handle) = &values["img"] else {
            panic!("expected a file value");
        };
        assert_eq!(handle.name, "john.png");
        assert_eq!(handle.content_type, "image/png");
        assert_eq!(handle.size, Some(16));
    }

    #[test]
    fn test_missing_upload_is_rejected() {
        let tmp = tempdir().unwrap();
        let err = parse_input(
            "img: does-not-exist.png\n",
            "teacher.yaml",
            &schema(EntityKind::Teacher),
            tmp.path(),
        )
        .unwrap_err();
        assert!(matches!(err, InputError::MissingFile { ref field, .. } if field == "img"));

        std::fs::create_dir(tmp.path().join("photos")).unwrap();
        assert!(matches!(
            parse_input("img: photos\n", "t.yaml", &schema(EntityKind::Teacher), tmp.path()),
            Err(InputError::MissingFile { .. })
        ));
    }

    #[test]
    fn test_file_mapping() {
        let doc = "img:\n  name: a.jpg\n  content_type: image/jpeg\n";
        let values = parse_input(doc, "t.yaml", &schema(EntityKind::Teacher), Path::new("."))
            .unwrap();
        assert_eq!(
            values["img"],
            RawValue::File(FileHandle::new("a.jpg", "image/jpeg"))
        );
    }

    #[test]
    fn test_unknown_field_is_schema_mismatch() {
        let err = parse_input(
            "nickname: jd\n",
            "t.yaml",
            &schema(EntityKind::Teacher),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            InputError::Schema(SchemaError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_non_mapping_and_nested_values() {
        let teacher = schema(EntityKind::Teacher);
        assert!(matches!(
            parse_input("- a\n- b\n", "t.yaml", &teacher, Path::new(".")),
            Err(InputError::NotAMapping { .. })
        ));
        assert!(matches!(
            parse_input("username: [a, b]\n", "t.yaml", &teacher, Path::new(".")),
            Err(InputError::UnsupportedValue { .. })
        ));
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_input(
            "username: [jd\n",
            "t.yaml",
            &schema(EntityKind::Teacher),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, InputError::Syntax(_)));
    }

    #[test]
    fn test_keys_are_field_names() {
        let class = schema(EntityKind::Class);
        let values = parse_input("name: 1A\n\"capacity\": 30\n", "c.yaml", &class, Path::new("."))
            .unwrap();
        assert_eq!(values.len(), 2);
        assert!(parse_input("1: 1A\n", "c.yaml", &class, Path::new(".")).is_err());
    }

    #[test]
    fn test_empty_document() {
        let values =
            parse_input("", "t.yaml", &schema(EntityKind::Teacher), Path::new(".")).unwrap();
        assert!(values.is_empty());
    }
}
