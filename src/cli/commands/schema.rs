//! `sform schema` command - inspect entity schemas

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{load_registry, print_structured, schema_for, truncate_str};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::Config;

#[derive(Subcommand, Debug)]
pub enum SchemaCommands {
    /// List all entity schemas
    List,

    /// Show the fields and rules of one schema
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Entity kind (teacher, student, class, ...)
    pub entity: String,

    /// Print the schema document instead of a summary
    #[arg(long)]
    pub raw: bool,
}

pub fn run(cmd: SchemaCommands, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let registry = load_registry(global, &config)?;

    match cmd {
        SchemaCommands::List => {
            if global.format != OutputFormat::Text {
                let kinds: Vec<&str> = registry.kinds().map(|k| k.as_str()).collect();
                return print_structured(global.format, &kinds);
            }

            let mut builder = Builder::default();
            builder.push_record(["KIND", "PREFIX", "FIELDS", "TITLE"]);
            for schema in registry.iter() {
                builder.push_record([
                    schema.entity.to_string(),
                    schema.entity.prefix().to_string(),
                    schema.fields.len().to_string(),
                    truncate_str(&schema.title(), 40),
                ]);
            }
            println!("{}", builder.build().with(Style::rounded()));
            if !global.quiet {
                println!(
                    "\nUse '{}' for field details",
                    style("sform schema show <kind>").cyan()
                );
            }
            Ok(())
        }
        SchemaCommands::Show(args) => {
            let schema = schema_for(&registry, &args.entity)?;

            if args.raw {
                match registry.source(schema.entity) {
                    Some(source) => print!("{}", source),
                    None => print!("{}", serde_yml::to_string(&*schema).into_diagnostic()?),
                }
                return Ok(());
            }
            if global.format != OutputFormat::Text {
                return print_structured(global.format, &*schema);
            }

            let title = schema.title();
            println!("{}", style(&title).bold());
            println!("{}", "=".repeat(title.chars().count()));
            if let Some(desc) = &schema.description {
                println!("{}\n", desc);
            }

            let mut builder = Builder::default();
            builder.push_record(["FIELD", "KIND", "REQ", "UNIQUE", "ACCEPTS"]);
            for field in &schema.fields {
                builder.push_record([
                    field.name.clone(),
                    field.kind.to_string(),
                    if field.required { "yes" } else { "" }.to_string(),
                    if field.unique { "yes" } else { "" }.to_string(),
                    field.hint(),
                ]);
            }
            println!("{}", builder.build().with(Style::rounded()));

            if !schema.rules.is_empty() {
                println!("\n{}", style("Rules:").bold());
                for rule in &schema.rules {
                    println!(
                        "  - {} ({})",
                        rule.message,
                        style(rule.referenced_fields().join(", ")).dim()
                    );
                }
            }
            Ok(())
        }
    }
}
