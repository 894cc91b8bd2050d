use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "schemix",
    about = "Merge JSON Schema and OpenAPI documents with typed conflict resolution",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML merge configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check whether documents can be merged
    Check(CheckArgs),
    /// List conflicts between two documents
    Diff(DiffArgs),
    /// Merge documents in order
    Merge(MergeArgs),
    /// Merge and apply the decisions recorded in a conflict report
    Apply(ApplyArgs),
    /// Print the value at a path
    Get(GetArgs),
    /// Set the value at a path
    Set(SetArgs),
}

#[derive(Args)]
pub struct CheckArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args)]
pub struct DiffArgs {
    pub base: PathBuf,
    pub incoming: PathBuf,
}

#[derive(Args)]
pub struct MergeArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    #[arg(short, long, default_value = "merged")]
    pub name: String,
    /// Where to write the merged document
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Where to write the conflict report
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Conflict report carrying the decisions
    #[arg(long)]
    pub report: PathBuf,
    #[arg(short, long, default_value = "merged")]
    pub name: String,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct GetArgs {
    pub file: PathBuf,
    pub path: String,
}

#[derive(Args)]
pub struct SetArgs {
    pub file: PathBuf,
    pub path: String,
    /// JSON value
    pub value: String,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
