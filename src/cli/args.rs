//! CLI argument definitions and parsing structures
//!
//! This module defines the command-line interface structure using clap,
//! including the main `Cli` struct and all subcommand enums.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use ideaforge_utils::types::{DocumentType, ExecutionMode, FeatureFlags, TechStack};

/// ideaforge - turn a product idea into a bundle of planning documents
#[derive(Parser, Debug)]
#[command(name = "ideaforge")]
#[command(about = "Turn a product idea and a tech stack into LLM-generated planning documents")]
#[command(long_about = r#"
ideaforge plans which documents a product idea needs, generates each one with a
specialized prompt, and assembles the results into a bundle of markdown files.

EXAMPLES:
  # Generate a brief, a schema and an API design for a todo app
  ideaforge generate --idea "A simple todo app" --framework React --backend Convex \
      --doc brief --doc schema --doc api

  # Read the idea from stdin and print the bundle as JSON
  cat idea.txt | ideaforge generate --idea - --framework Next.js --backend Supabase \
      --doc brief --json

  # Show the plan without generating anything
  ideaforge plan --idea "A habit tracker" --framework React --backend Firebase --doc roadmap

  # List document types and the units that produce them
  ideaforge units

  # Disable a unit and store a custom reference doc
  ideaforge settings set unit.RoadmapAgent.enabled false
  ideaforge settings set refdoc.convex.SchemaAgent "$(cat convex-schema.md)"

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > environment > config file > defaults
  Config file is discovered in $IDEAFORGE_HOME or by searching upward from CWD for .ideaforge/config.toml
  Use --config to specify an explicit config file path
  API keys are read from ANTHROPIC_API_KEY / OPENROUTER_API_KEY (see 'ideaforge config')

EXIT CODES:
  0 success, 1 internal error, 2 invalid input or configuration,
  3 bundle missing some documents, 4 provider or assembly failure,
  5 provider circuit open
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Primary LLM provider (anthropic or openrouter)
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Secondary LLM provider tried once when the primary fails
    #[arg(long, global = true)]
    pub fallback_provider: Option<String>,

    /// Model to use for the primary provider
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Per-request timeout in seconds (default: 30)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Number of tasks run concurrently in parallel mode (default: 3)
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Attempts per provider call, including the first (default: 3)
    #[arg(long, global = true)]
    pub retry_attempts: Option<u32>,

    /// Settings store file (default: ~/.config/ideaforge/settings.json)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate the requested documents and write the bundle
    Generate {
        #[command(flatten)]
        request: RequestArgs,

        /// Directory the bundle files are written to
        #[arg(long, default_value = "ideaforge-output")]
        out: PathBuf,

        /// Print the run outcome as JSON instead of writing files
        #[arg(long)]
        json: bool,
    },

    /// Print the task plan for a request without generating anything
    Plan {
        #[command(flatten)]
        request: RequestArgs,

        /// Output plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// List document types, the units that produce them and their filenames
    Units {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration and where each value came from
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage stored settings (prompt overrides, unit toggles, reference docs)
    #[command(subcommand)]
    Settings(SettingsCommands),
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// List every stored setting
    List,

    /// Print one setting
    Get {
        /// Setting key (e.g. unit.RoadmapAgent.enabled)
        key: String,
    },

    /// Store one setting
    Set {
        /// Setting key (prompt.<Unit>, unit.<Unit>.enabled, refdoc.<backend>.<Unit>)
        key: String,

        /// Value; use '-' to read it from stdin
        value: String,
    },

    /// Remove one setting
    Delete {
        /// Setting key
        key: String,
    },
}

/// Optional capability flags for `--feature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Feature {
    Auth,
    Crud,
    Realtime,
}

/// Arguments shared by `generate` and `plan`.
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Product idea; use '-' to read it from stdin
    #[arg(long)]
    pub idea: String,

    /// Frontend framework (e.g. React, Next.js)
    #[arg(long)]
    pub framework: String,

    /// Backend platform (e.g. Convex, Supabase, Firebase, Express)
    #[arg(long)]
    pub backend: String,

    /// Styling approach (e.g. Tailwind)
    #[arg(long, default_value = "")]
    pub styling: String,

    /// UI component library (e.g. shadcn/ui)
    #[arg(long, default_value = "")]
    pub ui_library: String,

    /// State management approach
    #[arg(long = "state", default_value = "")]
    pub state_management: String,

    /// Authentication provider
    #[arg(long, default_value = "")]
    pub auth_provider: String,

    /// Capabilities the app must cover (repeatable)
    #[arg(long = "feature", value_enum)]
    pub features: Vec<Feature>,

    /// Documents to produce (repeatable; e.g. brief, schema, apiDesign)
    #[arg(long = "doc", required = true, value_parser = parse_document)]
    pub documents: Vec<DocumentType>,

    /// Execution mode: sequential or parallel
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<ExecutionMode>,
}

impl RequestArgs {
    /// The tech stack described by the flags.
    #[must_use]
    pub fn tech_stack(&self) -> TechStack {
        let mut features = FeatureFlags::default();
        for feature in &self.features {
            match feature {
                Feature::Auth => features.auth = true,
                Feature::Crud => features.crud = true,
                Feature::Realtime => features.realtime = true,
            }
        }
        TechStack::new(self.framework.trim(), self.backend.trim())
            .with_styling(self.styling.trim())
            .with_ui_library(self.ui_library.trim())
            .with_state_management(self.state_management.trim())
            .with_auth_provider(self.auth_provider.trim())
            .with_features(features)
    }
}

fn parse_document(value: &str) -> Result<DocumentType, String> {
    value.parse::<DocumentType>().map_err(|err| err.to_string())
}

fn parse_mode(value: &str) -> Result<ExecutionMode, String> {
    value.parse::<ExecutionMode>().map_err(|err| err.to_string())
}
