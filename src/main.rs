use clap::Parser;
use miette::Result;
use sform::cli::commands::{completions, fill, schema, submit, template, validate};
use sform::cli::{Cli, Commands, GlobalOpts};
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior so piping into `head` does not panic.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_tracing(&global);

    match cli.command {
        Commands::Schema(cmd) => schema::run(cmd, &global),
        Commands::Template(args) => template::run(args, &global),
        Commands::Validate(args) => validate::run(args, &global),
        Commands::Create(args) => submit::run_create(args, &global),
        Commands::Update(args) => submit::run_update(args, &global),
        Commands::Fill(args) => fill::run(args, &global),
        Commands::Completions(args) => completions::run(args),
    }
}

/// Log to stderr; `SFORM_LOG` overrides the level chosen by -v / -q
fn init_tracing(global: &GlobalOpts) {
    let level = if global.verbose {
        Level::DEBUG
    } else if global.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };
    let filter = EnvFilter::try_from_env("SFORM_LOG")
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
