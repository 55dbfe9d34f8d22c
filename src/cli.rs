use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{FilterConfig, RipConfig};
use crate::metadata::{ArchiveNaming, CategoryTable, NamingPolicy, Schema};

#[derive(Parser, Debug)]
#[command(name = "tarpick")]
#[command(version)]
#[command(about = "Pick selected members out of remote tar.gz archives, driven by metadata CSV files", long_about = None)]
#[command(after_help = "Examples:\n  \
  tarpick filter metadata/ cleaned/ \"Word1 word2\" -r\n  \
  tarpick rip cleaned/ -d audio --base-url https://huggingface.co/datasets/speechcolab/gigaspeech/resolve/main/data/audio\n  \
  tarpick rip cleaned/ -d audio --archive-root /mnt/archives --schema paths")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose logging (RUST_LOG overrides)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', long, global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract the members named by metadata files from their archives
    Rip(RipArgs),
    /// Keep only the metadata lines containing a phrase
    Filter(FilterArgs),
}

/// Metadata row layouts.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// 8+ column rows: segment id in column 0, source path in column 7
    Segments,
    /// Free rows whose first field is the source path
    Paths,
}

#[derive(Args, Debug)]
pub struct RipArgs {
    /// Metadata directory, one subdirectory per category
    #[arg(value_name = "METADATA_DIR")]
    pub metadata_dir: PathBuf,

    /// Extract files into DIR
    #[arg(short = 'd', long = "output", value_name = "DIR", default_value = "downloaded_audio")]
    pub output_dir: PathBuf,

    /// Remote base URL; archives are fetched from {URL}/{folder}/{archive}
    #[arg(long, value_name = "URL", required_unless_present = "archive_root", conflicts_with = "archive_root")]
    pub base_url: Option<String>,

    /// Bearer token for the remote host
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Read archives from {DIR}/{folder}/{archive} instead of a remote host
    #[arg(long, value_name = "DIR")]
    pub archive_root: Option<PathBuf>,

    /// Metadata row layout
    #[arg(long, value_enum, default_value_t = SchemaKind::Segments)]
    pub schema: SchemaKind,

    /// Only rows whose source path ends with EXT are used
    #[arg(long, value_name = "EXT")]
    pub source_ext: Option<String>,

    /// Extension of reconstructed member names (segments schema)
    #[arg(long, value_name = "EXT")]
    pub target_ext: Option<String>,

    /// Separator between archive stem and segment id (segments schema)
    #[arg(long, value_name = "SEP")]
    pub separator: Option<String>,

    /// Metadata file name suffix replaced by the archive suffix
    #[arg(long, default_value = "_metadata.csv")]
    pub metadata_suffix: String,

    /// Archive file name suffix
    #[arg(long, default_value = ".tar.gz")]
    pub archive_suffix: String,

    /// Map a category directory to a remote folder (repeatable)
    #[arg(long = "category", value_name = "NAME=FOLDER", value_parser = CategoryTable::parse_entry)]
    pub categories: Vec<(String, String)>,

    /// Use one remote folder for every metadata file
    #[arg(long, value_name = "FOLDER")]
    pub remote_folder: Option<String>,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o', long)]
    pub overwrite: bool,

    /// Resolve archives and count targets without downloading
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Directory of metadata CSV files
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Directory receiving the filtered files
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Text a line must contain to be kept
    #[arg(value_name = "PHRASE")]
    pub phrase: String,

    /// Descend into subdirectories
    #[arg(short = 'r', long)]
    pub recursive: bool,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }
}

impl RipArgs {
    pub fn schema(&self) -> Schema {
        let mut schema = match self.schema {
            SchemaKind::Segments => Schema::segments(),
            SchemaKind::Paths => Schema::paths(),
        };
        if let Some(ext) = &self.source_ext {
            schema.source_extension = ext.clone();
        }
        if let NamingPolicy::Reconstructed {
            separator,
            target_extension,
        } = &mut schema.policy
        {
            if let Some(sep) = &self.separator {
                *separator = sep.clone();
            }
            if let Some(ext) = &self.target_ext {
                *target_extension = ext.clone();
            }
        }
        schema
    }

    pub fn config(&self) -> RipConfig {
        let mut categories = CategoryTable::default();
        for (name, folder) in &self.categories {
            categories.insert(name.as_str(), folder.as_str());
        }

        RipConfig {
            metadata_dir: self.metadata_dir.clone(),
            output_dir: self.output_dir.clone(),
            schema: self.schema(),
            naming: ArchiveNaming {
                metadata_suffix: self.metadata_suffix.clone(),
                archive_suffix: self.archive_suffix.clone(),
            },
            categories,
            remote_folder: self.remote_folder.clone(),
            overwrite: self.overwrite,
            dry_run: self.dry_run,
        }
    }
}

impl FilterArgs {
    pub fn config(&self) -> FilterConfig {
        FilterConfig {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            phrase: self.phrase.clone(),
            recursive: self.recursive,
        }
    }
}
