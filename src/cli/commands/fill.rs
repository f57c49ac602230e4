//! `sform fill` command - fill in a form interactively

use miette::Result;
use std::path::PathBuf;

use crate::cli::helpers::{load_registry, open_store, resolve_store_path, schema_for};
use crate::cli::GlobalOpts;
use crate::core::config::Config;
use crate::core::identity::EntityId;
use crate::core::session::FormSession;
use crate::core::submission::SubmissionAdapter;
use crate::schema::validator::RelationCandidates;
use crate::schema::wizard::{FormWizard, WizardOutcome};

#[derive(clap::Args, Debug)]
pub struct FillArgs {
    /// Entity kind (teacher, student, class, ...)
    pub entity: String,

    /// Edit an existing record instead of creating one
    #[arg(long)]
    pub id: Option<String>,

    /// Store document to write to
    #[arg(long, env = "SFORM_STORE")]
    pub store: Option<PathBuf>,
}

pub fn run(args: FillArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let registry = load_registry(global, &config)?;
    let schema = schema_for(&registry, &args.entity)?;
    let store_path = resolve_store_path(args.store.as_deref(), &config)?;
    let store = open_store(&store_path, &registry)?;
    let candidates = RelationCandidates::collect(&schema, &store);

    let session = match &args.id {
        None => FormSession::create(schema),
        Some(id) => {
            let id: EntityId = id.parse().map_err(|e| miette::miette!("{}", e))?;
            let existing = store.raw_values(&id)?;
            FormSession::update(schema, id, existing)?
        }
    };
    let mut session = session
        .with_options(config.session_options())
        .with_candidates(candidates);

    let adapter = SubmissionAdapter::new(store);
    match FormWizard::new().run(&mut session, &adapter)? {
        WizardOutcome::Submitted(_) => {
            adapter.persistence().save(&store_path)?;
            Ok(())
        }
        WizardOutcome::Aborted => {
            if !global.quiet {
                eprintln!("Form discarded; nothing was saved.");
            }
            Ok(())
        }
    }
}
