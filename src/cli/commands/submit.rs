//! `sform create` / `sform update` commands - validate and submit a form document

use console::style;
use miette::Result;
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::cli::helpers::{
    load_registry, open_store, print_field_errors, print_structured, resolve_store_path, schema_for,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::Config;
use crate::core::identity::EntityId;
use crate::core::input::{read_input, RawValues};
use crate::core::session::{FormSession, SessionState};
use crate::core::store::MemoryStore;
use crate::core::submission::SubmissionAdapter;
use crate::core::value::FormMode;
use crate::schema::validator::RelationCandidates;

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    /// Entity kind (teacher, student, class, ...)
    pub entity: String,

    /// Form document (YAML)
    pub file: PathBuf,

    /// Store document to write to
    #[arg(long, env = "SFORM_STORE")]
    pub store: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Entity kind (teacher, student, class, ...)
    pub entity: String,

    /// Identifier of the record to update (e.g. TCH-01H...)
    pub id: String,

    /// Form document (YAML); fields left out keep their stored values
    pub file: PathBuf,

    /// Store document to write to
    #[arg(long, env = "SFORM_STORE")]
    pub store: Option<PathBuf>,
}

pub fn run_create(args: CreateArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let registry = load_registry(global, &config)?;
    let schema = schema_for(&registry, &args.entity)?;
    let store_path = resolve_store_path(args.store.as_deref(), &config)?;
    let store = open_store(&store_path, &registry)?;
    let values = read_input(&args.file, &schema)?;

    let session = FormSession::create(schema.clone())
        .with_options(config.session_options())
        .with_candidates(RelationCandidates::collect(&schema, &store));

    submit(session, values, store, &store_path, global)
}

pub fn run_update(args: UpdateArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let registry = load_registry(global, &config)?;
    let schema = schema_for(&registry, &args.entity)?;
    let id: EntityId = args.id.parse().map_err(|e| miette::miette!("{}", e))?;
    let store_path = resolve_store_path(args.store.as_deref(), &config)?;
    let store = open_store(&store_path, &registry)?;
    let values = read_input(&args.file, &schema)?;

    let existing = store.raw_values(&id)?;
    let session = FormSession::update(schema.clone(), id, existing)?
        .with_options(config.session_options())
        .with_candidates(RelationCandidates::collect(&schema, &store));

    submit(session, values, store, &store_path, global)
}

fn submit(
    mut session: FormSession,
    values: RawValues,
    store: MemoryStore,
    store_path: &Path,
    global: &GlobalOpts,
) -> Result<()> {
    for (name, value) in values {
        session.set_field(&name, value)?;
    }

    let adapter = SubmissionAdapter::new(store);
    match session.submit(&adapter)? {
        SessionState::Submitted => {
            adapter.persistence().save(store_path)?;
            let receipt = session
                .receipt()
                .ok_or_else(|| miette::miette!("submission finished without a receipt"))?;
            match global.format {
                OutputFormat::Text => {
                    if global.quiet {
                        println!("{}", receipt.entity_id);
                    } else {
                        println!(
                            "{} {} {}",
                            style("✓").green().bold(),
                            match receipt.mode {
                                FormMode::Create => "Created",
                                FormMode::Update => "Updated",
                            },
                            style(&receipt.entity_id).cyan()
                        );
                    }
                }
                format => print_structured(format, receipt)?,
            }
            Ok(())
        }
        SessionState::Invalid => {
            let schema = session.schema();
            match global.format {
                OutputFormat::Text => {
                    println!("{} {} form is invalid", style("✗").red().bold(), schema.entity);
                    print_field_errors(schema, session.errors());
                }
                format => print_structured(format, &json!({"errors": session.errors()}))?,
            }
            Err(miette::miette!(
                "Validation failed: {} field(s) have errors",
                session.errors().len()
            ))
        }
        SessionState::SubmitFailed => Err(miette::miette!(
            "Submission failed: {}",
            session.submit_error().unwrap_or("unknown error")
        )),
        state => Err(miette::miette!("unexpected form state: {}", state)),
    }
}
