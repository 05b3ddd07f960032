//! devtools-edge - edge-style content override injection for static HTML.

#![allow(dead_code)]

mod cli;
mod config;
mod engine;
mod logger;
mod mutate;
mod overrides;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::EngineConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    logger::set_verbose(cli.verbose);

    let config = EngineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Rewrite {
            input,
            overrides,
            output,
            page,
            backend,
        } => cli::rewrite::run_rewrite(
            &config,
            &input,
            &overrides,
            output.as_deref(),
            &page,
            backend.into(),
        ),
        Commands::Serve {
            interface,
            port,
            root,
            overrides,
            backend,
        } => cli::serve::run_serve(
            &config,
            cli::serve::ServeArgs {
                interface,
                port,
                root,
                overrides,
                backend: backend.into(),
            },
        ),
    }
}
