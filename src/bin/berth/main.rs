//! Berth CLI - builds third-party numerical libraries

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use berth::GlobalContext;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color;

    if let Err(e) = run(cli) {
        commands::report_error(&e, color);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("berth=debug")
    } else {
        EnvFilter::new("berth=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(cli.verbose);
    ctx.set_color(!cli.no_color);

    match cli.command {
        Commands::Install(args) => commands::install::execute(&ctx, args),
        Commands::Config(args) => commands::config::execute(&ctx, args),
        Commands::Status(args) => commands::status::execute(&ctx, args),
        Commands::Probe(args) => commands::probe::execute(&ctx, args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
