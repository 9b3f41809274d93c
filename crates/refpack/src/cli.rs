use std::path::PathBuf;

use clap::Parser;
use clap::builder::FalseyValueParser;

#[derive(Parser, Debug, Default)]
#[command(name = "refpack")]
#[command(version)]
#[command(about = "Repackage a REFramework nightly without the VR/XR payload", long_about = None)]
#[command(after_help = "Environment:\n  \
  MAX_LIST=5          show at most five releases\n  \
  DEV_PREFIX=11       only offer nightlies whose number starts with 11\n  \
  SKIP_DOWNLOAD=1     pick a release and report the artifact name only\n  \
  SILENT=1            never prompt; take the newest release and rebuild")]
pub struct Cli {
    /// Maximum number of releases to offer
    #[arg(long, env = "MAX_LIST", value_name = "N")]
    pub max_list: Option<usize>,

    /// Only offer nightlies whose number starts with this prefix
    #[arg(long, env = "DEV_PREFIX", value_name = "PREFIX")]
    pub dev_prefix: Option<String>,

    /// Select a release but skip download and repackaging
    #[arg(long, env = "SKIP_DOWNLOAD", value_parser = FalseyValueParser::new())]
    pub skip_download: bool,

    /// Never prompt
    #[arg(long, env = "SILENT", value_parser = FalseyValueParser::new())]
    pub silent: bool,

    /// Directory the archive is written to (default: current directory)
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Do not offer to copy the archive to the Downloads folder
    #[arg(long)]
    pub no_delivery: bool,

    /// Log debug output to the terminal as well as the log file
    #[arg(long)]
    pub debug: bool,

    /// Write the effective settings file and exit
    #[arg(long)]
    pub write_settings: bool,
}
