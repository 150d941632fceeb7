use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gforms")]
#[command(about = "Declaratively manage Google Forms")]
pub struct Cli {
    /// Provider configuration file (defaults to ~/.config/gforms/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct StateArgs {
    /// State file recording the managed form
    #[arg(long, default_value = "gforms.state.json")]
    pub state: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a form definition without contacting Google
    Validate {
        /// Form definition (TOML, or JSON with a .json extension)
        form: PathBuf,
    },
    /// Show the requests apply would submit
    Plan {
        form: PathBuf,
        #[command(flatten)]
        state: StateArgs,
    },
    /// Create or update the form to match its definition
    Apply {
        form: PathBuf,
        #[command(flatten)]
        state: StateArgs,
        /// Skip navigation targets that cannot be resolved
        #[arg(long)]
        allow_missing_navigation: bool,
    },
    /// Re-read the form and record drift in state
    Refresh {
        #[command(flatten)]
        state: StateArgs,
    },
    /// Start tracking an existing form
    Import {
        /// Form ID
        form_id: String,
        #[command(flatten)]
        state: StateArgs,
    },
    /// Delete the tracked form
    Destroy {
        #[command(flatten)]
        state: StateArgs,
    },
    /// Submit raw Forms API requests from a JSON file
    BatchUpdate {
        form_id: String,
        /// File holding a JSON array of Forms requests
        requests: PathBuf,
        /// Fail unless the form is still at this revision
        #[arg(long)]
        required_revision_id: Option<String>,
    },
}
