//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Clean LaTeX document trees for DocBook output: math to MathML, paragraph repair, label fixes
#[derive(Parser, Debug)]
#[command(name = "texclean")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Turn debugging information on (-d info, -dd debug, -ddd trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub debug: u8,

    /// Project directory holding a local .texclean.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clean a document tree
    Clean {
        /// Document tree (XML)
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        /// Output file (default: stdout)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
        /// Write texclean.before / texclean.after into this directory
        #[arg(long, value_hint = ValueHint::DirPath)]
        dump_dir: Option<PathBuf>,
    },

    /// Show the structure of a document tree
    Tree {
        /// Document tree (XML)
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
    },

    /// Translate one LaTeX math fragment to MathML
    Translate {
        /// LaTeX source, e.g. '\frac{1}{2}'
        latex: String,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Print a config template
    Template,

    /// Show config paths
    Path,
}
