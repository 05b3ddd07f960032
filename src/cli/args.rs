//! Command-line interface definitions.

use crate::engine::Backend;
use clap::{ColorChoice, Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Edge override rewriting CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (searches upward for devtools.toml when omitted)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Rewrite one HTML document with overrides from a JSON file
    #[command(visible_alias = "r")]
    Rewrite {
        /// HTML file to rewrite, or `-` for stdin
        #[arg(value_hint = clap::ValueHint::FilePath)]
        input: PathBuf,

        /// JSON file holding the overrides
        #[arg(short = 'O', long, value_hint = clap::ValueHint::FilePath)]
        overrides: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,

        /// Page path selecting the override set from a page-keyed file
        #[arg(short, long, default_value = "/")]
        page: String,

        /// Mutation backend
        #[arg(short, long, value_enum, default_value_t = BackendArg::Stream)]
        backend: BackendArg,
    },

    /// Serve a static directory with overrides applied to HTML responses
    #[command(visible_alias = "s")]
    Serve {
        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory of static files to serve
        #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
        root: Option<PathBuf>,

        /// JSON file holding the override sets
        #[arg(short = 'O', long, value_hint = clap::ValueHint::FilePath)]
        overrides: Option<PathBuf>,

        /// Mutation backend
        #[arg(short, long, value_enum, default_value_t = BackendArg::Stream)]
        backend: BackendArg,
    },
}

/// Mutation backend selector.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    /// Tree-aware streaming rewrite
    Stream,
    /// Whole-document string rewrite
    Text,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Stream => Backend::Stream,
            BackendArg::Text => Backend::Text,
        }
    }
}
