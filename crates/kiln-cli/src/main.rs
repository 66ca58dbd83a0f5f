//! kiln CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kiln_cli::cmd;
use kiln_cli::{Cli, Commands, GlobalOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Run {
            recipe,
            prefix,
            skip_smoke,
            keep_source,
            json,
        } => {
            let mut options = global.harness(prefix);
            options.skip_smoke = skip_smoke;
            options.keep_source = keep_source;
            cmd::run::run(&recipe, &options, &global, json).await
        }
        Commands::Fetch { recipe, dest } => cmd::fetch::fetch(&recipe, &dest, &global).await,
        Commands::Build {
            recipe,
            source,
            prefix,
        } => cmd::build::build(&recipe, &source, prefix, &global),
        Commands::Smoke { recipe, prefix } => cmd::smoke::smoke(&recipe, prefix, &global),
        Commands::Check { recipe } => cmd::check::check(&recipe),
        Commands::Hash { files } => cmd::hash::hash(&files),
    }
}
