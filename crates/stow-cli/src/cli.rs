use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "stow",
    about = "stow: typed values in an S3-style object store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use the filesystem backend rooted here, overriding the config
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a bucket (no-op if it exists)
    Mb(MbArgs),
    /// Remove a bucket
    Rb(RbArgs),
    /// Store a value
    Put(PutArgs),
    /// Fetch a value
    Get(GetArgs),
    /// Remove objects from a bucket
    Rm(RmArgs),
    /// List objects in a bucket
    Ls(LsArgs),
}

#[derive(Args)]
pub struct MbArgs {
    pub bucket: String,
}

#[derive(Args)]
pub struct RbArgs {
    pub bucket: String,
    /// Remove every object in the bucket first
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct PutArgs {
    pub bucket: String,
    pub key: String,
    #[command(flatten)]
    pub source: ValueSource,
    /// Metadata entry as key=value (repeatable)
    #[arg(long = "meta", value_parser = parse_key_val)]
    pub meta: Vec<(String, String)>,
    /// Text encoding for --text and --json values
    #[arg(long)]
    pub encoding: Option<String>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct ValueSource {
    /// Store a text value
    #[arg(long)]
    pub text: Option<String>,
    /// Store a JSON object as a record
    #[arg(long)]
    pub json: Option<String>,
    /// Store the raw bytes of a file
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct GetArgs {
    pub bucket: String,
    pub key: String,
    /// Return the stored payload without decoding it
    #[arg(long)]
    pub raw: bool,
    /// Write the value to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct RmArgs {
    pub bucket: String,
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Args)]
pub struct LsArgs {
    pub bucket: String,
    #[arg(short, long)]
    pub recursive: bool,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {s:?}"))
}
