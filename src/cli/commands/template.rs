//! `sform template` command - print a form document skeleton

use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::{load_registry, open_store, resolve_store_path, schema_for};
use crate::cli::GlobalOpts;
use crate::core::config::Config;
use crate::core::identity::EntityId;
use crate::schema::template::{TemplateContext, TemplateGenerator};

#[derive(clap::Args, Debug)]
pub struct TemplateArgs {
    /// Entity kind (teacher, student, class, ...)
    pub entity: String,

    /// Pre-fill from an existing record for an update form
    #[arg(long)]
    pub id: Option<String>,

    /// Store holding the record named by --id
    #[arg(long, env = "SFORM_STORE")]
    pub store: Option<PathBuf>,

    /// Write to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

pub fn run(args: TemplateArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let registry = load_registry(global, &config)?;
    let schema = schema_for(&registry, &args.entity)?;

    let ctx = match &args.id {
        None => TemplateContext::create(),
        Some(id) => {
            let id: EntityId = id.parse().map_err(|e| miette::miette!("{}", e))?;
            if id.kind() != schema.entity {
                return Err(miette::miette!("{} is not a {}", id, schema.entity));
            }
            let store_path = resolve_store_path(args.store.as_deref(), &config)?;
            let store = open_store(&store_path, &registry)?;
            let existing = store.raw_values(&id)?;
            TemplateContext::update(id).with_values(existing)
        }
    };

    let generator = TemplateGenerator::new().into_diagnostic()?;
    let rendered = generator.render(&schema, &ctx).into_diagnostic()?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered).into_diagnostic()?;
            if !global.quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
        None => print!("{}", rendered),
    }
    Ok(())
}
