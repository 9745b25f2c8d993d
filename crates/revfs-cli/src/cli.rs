use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use revfs_merge::PolicyKind;

#[derive(Parser)]
#[command(
    name = "revfs",
    about = "revfs: a versioned filesystem archive with N-way merge",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// More output; repeat for debug and trace logging.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, global = true, default_value = "revfs.json")]
    pub archive: PathBuf,

    /// Defaults to `revfs.toml` next to the archive, if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an archive holding one empty revision
    Init,
    /// Create or overwrite a file
    Write(WriteArgs),
    /// Create a directory
    Mkdir(PathArgs),
    /// Remove a file or an empty directory
    Rm(PathArgs),
    /// Rename a file or directory
    Mv(MoveArgs),
    /// List revisions without children
    Tips,
    /// Show revision history, newest first
    Log(LogArgs),
    /// List every path in a revision
    Ls(LsArgs),
    /// Print a file
    Cat(CatArgs),
    /// Show the conflicts between revisions
    Diff(DiffArgs),
    /// Merge revisions, or every tip when none are given
    Merge(MergeArgs),
}

/// The revision a change is made on top of. Defaults to the only tip.
#[derive(Args)]
pub struct OnRevision {
    #[arg(long = "on", value_name = "REV")]
    pub on: Option<String>,
}

#[derive(Args)]
pub struct WriteArgs {
    pub path: String,
    pub content: String,
    #[command(flatten)]
    pub on: OnRevision,
}

#[derive(Args)]
pub struct PathArgs {
    pub path: String,
    #[command(flatten)]
    pub on: OnRevision,
}

#[derive(Args)]
pub struct MoveArgs {
    pub from: String,
    pub to: String,
    #[command(flatten)]
    pub on: OnRevision,
}

#[derive(Args)]
pub struct LogArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args)]
pub struct LsArgs {
    pub revision: Option<String>,
}

#[derive(Args)]
pub struct CatArgs {
    pub path: String,
    pub revision: Option<String>,
}

#[derive(Args)]
pub struct DiffArgs {
    #[arg(num_args = 2.., required = true)]
    pub revisions: Vec<String>,
}

#[derive(Args)]
pub struct MergeArgs {
    pub revisions: Vec<String>,
    /// Overrides the configured policy.
    #[arg(long)]
    pub policy: Option<PolicyKind>,
}
