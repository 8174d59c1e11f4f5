//! tag-nag cli interface

use clap::{Parser, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; tag-nag ... }
    /// and affects where the config file is looked up.
    #[clap(short = 'C', long = "directory")]
    pub directory: Vec<PathBuf>,

    /// Directory to scan
    pub path: PathBuf,

    /// Required tags, e.g. 'Owner,Environment[Dev,Prod]'
    ///
    /// Without this option `.tag-nag.yml` (or `.tag-nag.yaml`) is loaded
    /// from the work directory.
    #[clap(long = "tags")]
    pub tags: Option<String>,

    /// Compare tag keys and values case insensitively
    #[clap(short = 'c', long = "case-insensitive")]
    pub case_insensitive: bool,

    /// Report violations without failing
    #[clap(short = 'd', long = "dry-run")]
    pub dry_run: bool,

    /// Comma-separated files or directories to skip
    #[clap(short = 's', long = "skip", value_delimiter = ',')]
    pub skip: Vec<PathBuf>,

    /// Do not query terraform for the provider schema
    ///
    /// All resources of the provider are then assumed to support tags.
    #[clap(long = "no-schema")]
    pub no_schema: bool,

    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => f.write_str("text"),
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}
