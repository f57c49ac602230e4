//! `sform validate` command - check a form document without submitting it

use console::style;
use miette::Result;
use serde_json::json;
use std::path::PathBuf;

use crate::cli::helpers::{
    load_registry, open_store, print_field_errors, print_structured, redacted, schema_for,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::Config;
use crate::core::input::read_input;
use crate::core::value::FormMode;
use crate::schema::validator::Validator;

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Entity kind (teacher, student, class, ...)
    pub entity: String,

    /// Form document (YAML)
    pub file: PathBuf,

    /// Validate as a create or an update form
    #[arg(long, value_enum, default_value_t = FormMode::Create)]
    pub mode: FormMode,

    /// Store supplying valid ids for relation fields
    #[arg(long, env = "SFORM_STORE")]
    pub store: Option<PathBuf>,
}

pub fn run(args: ValidateArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let registry = load_registry(global, &config)?;
    let schema = schema_for(&registry, &args.entity)?;
    let values = read_input(&args.file, &schema)?;

    let validator = match args.store.as_ref().or(config.store.as_ref()) {
        Some(path) => {
            let store = open_store(path, &registry)?;
            Validator::new(schema.clone()).with_source(&store)
        }
        None => {
            if schema.relation_fields().next().is_some() {
                tracing::warn!("no store configured; relation fields cannot be resolved");
            }
            Validator::new(schema.clone())
        }
    };

    match validator.validate(&values, args.mode) {
        Ok(record) => {
            match global.format {
                OutputFormat::Text => {
                    if !global.quiet {
                        println!(
                            "{} {} is a valid {} {} form ({} field(s))",
                            style("✓").green().bold(),
                            args.file.display(),
                            schema.entity,
                            args.mode,
                            record.fields().len()
                        );
                    }
                }
                format => {
                    let record = redacted(&record)?;
                    print_structured(format, &json!({"valid": true, "record": record}))?;
                }
            }
            Ok(())
        }
        Err(errors) => {
            match global.format {
                OutputFormat::Text => {
                    println!(
                        "{} {} failed validation",
                        style("✗").red().bold(),
                        args.file.display()
                    );
                    print_field_errors(&schema, &errors);
                }
                format => {
                    print_structured(format, &json!({"valid": false, "errors": errors}))?;
                }
            }
            Err(miette::miette!(
                "Validation failed: {} field(s) have errors",
                errors.len()
            ))
        }
    }
}
