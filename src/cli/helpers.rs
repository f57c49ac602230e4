//! Shared helper functions for CLI commands

use console::style;
use miette::{IntoDiagnostic, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::Config;
use crate::core::store::MemoryStore;
use crate::core::value::{TypedValue, ValidatedRecord};
use crate::schema::registry::{EntitySchema, SchemaRegistry};
use crate::schema::validator::{FieldErrors, FORM_KEY};

/// Built-in schemas plus any configured schema directories
pub fn load_registry(global: &GlobalOpts, config: &Config) -> Result<SchemaRegistry> {
    let mut builder = SchemaRegistry::builder().with_builtin()?;
    let dirs = config.schema_dirs.iter().chain(global.schema_dir.as_ref());
    for dir in dirs {
        if dir.is_dir() {
            builder = builder.with_dir(dir)?;
        } else {
            tracing::warn!(dir = %dir.display(), "schema directory not found, skipping");
        }
    }
    Ok(builder.build()?)
}

/// Look up a schema by kind name, listing the known kinds on failure
pub fn schema_for(registry: &SchemaRegistry, kind: &str) -> Result<Arc<EntitySchema>> {
    registry.get_by_name(kind).map_err(|_| {
        let known: Vec<&str> = registry.kinds().map(|k| k.as_str()).collect();
        miette::miette!(
            help = format!("known kinds: {}", known.join(", ")),
            "Unknown entity kind: {}",
            kind
        )
    })
}

/// Store path from the command line, falling back to configuration
pub fn resolve_store_path(explicit: Option<&Path>, config: &Config) -> Result<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| config.store.clone())
        .ok_or_else(|| {
            miette::miette!(
                help = "pass --store <FILE>, set SFORM_STORE, or add `store:` to .sform/config.yaml",
                "No store configured"
            )
        })
}

pub fn open_store(path: &Path, registry: &SchemaRegistry) -> Result<MemoryStore> {
    Ok(MemoryStore::load(path, registry)?)
}

/// Print a field error map, labels first, form-level messages last
pub fn print_field_errors(schema: &EntitySchema, errors: &FieldErrors) {
    for (field, messages) in errors.iter() {
        let label = if field == FORM_KEY {
            "Form".to_string()
        } else {
            schema
                .field(field)
                .map(|f| f.label())
                .unwrap_or_else(|| field.to_string())
        };
        for message in messages {
            println!(
                "  {} {} {}",
                style("✗").red(),
                style(format!("{}:", label)).bold(),
                message
            );
        }
    }
}

/// Emit a serializable value in the requested machine format
pub fn print_structured<T: serde::Serialize>(format: OutputFormat, value: &T) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
        }
        OutputFormat::Yaml | OutputFormat::Text => {
            print!("{}", serde_yml::to_string(value).into_diagnostic()?);
        }
    }
    Ok(())
}

/// Record as JSON with secrets masked, for display only
pub fn redacted(record: &ValidatedRecord) -> Result<Value> {
    let mut fields = Map::new();
    for (name, value) in record.fields() {
        let json = match value {
            TypedValue::Secret(_) => Value::String("********".to_string()),
            other => serde_json::to_value(other).into_diagnostic()?,
        };
        fields.insert(name.clone(), json);
    }
    Ok(Value::Object(fields))
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
