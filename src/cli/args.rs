//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs,
    fill::FillArgs,
    schema::SchemaCommands,
    submit::{CreateArgs, UpdateArgs},
    template::TemplateArgs,
    validate::ValidateArgs,
};

#[derive(Parser)]
#[command(name = "sform")]
#[command(author, version, about = "School management forms")]
#[command(long_about = "School management forms: schema-driven validation and create/update submission for school management records (teachers, students, classes, lessons, ...).")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Additional directory of *.schema.yaml files
    #[arg(long, global = true, value_name = "DIR")]
    pub schema_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect entity schemas
    #[command(subcommand)]
    Schema(SchemaCommands),

    /// Print a form document skeleton for an entity kind
    Template(TemplateArgs),

    /// Validate a form document without submitting it
    Validate(ValidateArgs),

    /// Validate a form document and create a new record
    Create(CreateArgs),

    /// Validate a form document and update an existing record
    Update(UpdateArgs),

    /// Fill in a form interactively
    Fill(FillArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Text,
    /// YAML (errors map or record)
    Yaml,
    /// JSON (errors map or record)
    Json,
}
