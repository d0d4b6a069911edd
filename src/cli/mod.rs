use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod metadata;

/// nxsfileinfo - catalog metadata from NeXus files
#[derive(Parser)]
#[command(name = "nxsfileinfo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate catalog metadata from a NeXus file
    Metadata(MetadataArgs),
}

/// Arguments of the metadata command
#[derive(Args, Debug, Default)]
pub struct MetadataArgs {
    /// Input NeXus file or JSON node dump (sidecars only when omitted)
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Beamtime metadata file
    #[arg(short = 'b', long, value_name = "FILE")]
    pub beamtime_meta: Option<PathBuf>,

    /// Scientific metadata file
    #[arg(short = 's', long, value_name = "FILE")]
    pub scientific_meta: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// File mode of the output file, e.g. 0o662
    #[arg(short = 'x', long, value_name = "MODE")]
    pub chmod: Option<String>,

    /// Replace an existing output file
    #[arg(short = 'u', long = "override")]
    pub override_output: bool,

    /// Append a fresh UUID to the generated pid
    #[arg(long)]
    pub pid_with_uuid: bool,

    /// Leave the file name out of the generated pid
    #[arg(long)]
    pub pid_without_filename: bool,

    /// Dataset pid
    #[arg(short = 'p', long)]
    pub pid: Option<String>,

    /// Beamtime id used for the pid
    #[arg(short = 'i', long = "beamtimeid", value_name = "ID")]
    pub beamtime_id: Option<String>,

    /// Comma separated technique names, codes or PaNET ids
    #[arg(short = 'q', long, value_name = "LIST")]
    pub techniques: Option<String>,

    /// Sample id
    #[arg(short = 'j', long)]
    pub sample_id: Option<String>,

    /// Take the sample id from the sample name
    #[arg(long)]
    pub sample_id_from_name: bool,

    /// Instrument id
    #[arg(short = 'y', long)]
    pub instrument_id: Option<String>,

    /// Keep the instrument id built from the beamtime file as is
    #[arg(long)]
    pub raw_instrument_id: bool,

    /// Comma separated attributes to show (all but the hidden ones by default)
    #[arg(short = 'a', long, value_name = "LIST")]
    pub attributes: Option<String>,

    /// Comma separated attributes to hide
    #[arg(short = 'n', long, value_name = "LIST")]
    pub hidden_attributes: Option<String>,

    /// Postfix appended to group names
    #[arg(short = 'g', long, value_name = "POSTFIX")]
    pub group_postfix: Option<String>,

    /// Store values of one-dimensional fields
    #[arg(long)]
    pub oned: bool,

    /// Comma separated fields whose values are stored regardless of rank
    #[arg(long, value_name = "LIST")]
    pub values: Option<String>,

    /// Comma separated NX_class names of the entries to read
    #[arg(short = 't', long, value_name = "LIST")]
    pub entry_classes: Option<String>,

    /// Comma separated names of the entries to read
    #[arg(short = 'e', long, value_name = "LIST")]
    pub entry_names: Option<String>,

    /// Path appended to the beamtime source folder
    #[arg(short = 'r', long, value_name = "PATH")]
    pub relative_path: Option<String>,

    /// Owner group
    #[arg(short = 'w', long)]
    pub owner_group: Option<String>,

    /// Comma separated access groups
    #[arg(short = 'c', long, value_name = "LIST")]
    pub access_groups: Option<String>,

    /// Take proposalId from the beamtime proposal id
    #[arg(long)]
    pub proposal_as_proposal: bool,

    /// Keep the entry at the record root without catalog fields
    #[arg(short = 'm', long)]
    pub raw_metadata: bool,

    /// Add an empty unit to fields without units
    #[arg(long)]
    pub add_empty_units: bool,

    /// Copy-map script (JSON, YAML or text)
    #[arg(long, value_name = "SCRIPT")]
    pub copy_map: Option<String>,

    /// Copy-map script file
    #[arg(long, value_name = "FILE")]
    pub copy_map_file: Option<PathBuf>,

    /// Dotted path of a copy-map embedded in the file
    #[arg(long, value_name = "PATH")]
    pub copy_map_field: Option<String>,
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Metadata(args) => metadata::run(args),
    }
}
