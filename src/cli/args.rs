//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::core::prediction::ProjectBrief;
use crate::error::{BimcostError, Result};

/// BIM cost estimation - upload, translate, extract, and price models.
#[derive(Parser, Debug)]
#[command(name = "bimcost")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    // === Global flags ===
    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Config file (overrides BIMCOST_CONFIG and the default location)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format (human, compact, json)
    #[arg(long, value_name = "FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API
    Serve(ServeArgs),

    /// Upload a model, wait for translation, and price its elements
    Estimate(EstimateArgs),

    /// Predict project cost from a brief using an AI provider
    Predict(PredictArgs),

    /// Show which services have credentials configured
    Status,

    /// Print a read-only viewer access token
    Token,
}

/// Arguments for the `serve` command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides BIMCOST_BIND and the config file)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Arguments for the `estimate` command.
#[derive(Parser, Debug)]
pub struct EstimateArgs {
    /// Model file (.rvt, .ifc, .dwg, .dxf)
    #[arg(required_unless_present = "urn")]
    pub file: Option<PathBuf>,

    /// Resume tracking an already submitted URN instead of uploading
    #[arg(long, value_name = "URN", conflicts_with = "file")]
    pub urn: Option<String>,

    /// Seconds between status polls (overrides config)
    #[arg(long, value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Poll attempts before giving up (overrides config)
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,
}

impl EstimateArgs {
    /// Validate argument combinations.
    ///
    /// # Errors
    ///
    /// Returns `Config` for a zero interval or attempt count.
    pub fn validate(&self) -> Result<()> {
        if self.interval == Some(0) {
            return Err(BimcostError::Config(
                "Poll interval must be greater than 0 seconds".to_string(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(BimcostError::Config(
                "Max attempts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Arguments for the `predict` command.
#[derive(Parser, Debug)]
pub struct PredictArgs {
    /// Project type (residential, commercial, ...)
    #[arg(long = "type", value_name = "TYPE")]
    pub project_type: String,

    /// Gross floor area in square metres
    #[arg(long, value_name = "M2")]
    pub area: f64,

    /// Project location
    #[arg(long, default_value = "")]
    pub location: String,

    /// Complexity (low, medium, high)
    #[arg(long, default_value = "medium")]
    pub complexity: String,

    /// Expected timeline
    #[arg(long, default_value = "")]
    pub timeline: String,
}

impl PredictArgs {
    #[must_use]
    pub fn brief(&self) -> ProjectBrief {
        ProjectBrief {
            project_type: self.project_type.clone(),
            area: self.area,
            location: self.location.clone(),
            complexity: self.complexity.clone(),
            timeline: self.timeline.clone(),
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
}
