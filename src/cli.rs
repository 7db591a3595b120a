use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for overstock
#[derive(Parser, Debug)]
#[command(version, about = "overstock - AI overstock liquidation dashboard")]
pub struct Args {
    /// Backend server URL (overrides the configured backend.base_url)
    #[arg(long = "server")]
    pub server: Option<String>,

    /// Load configuration from an explicit file instead of the platform
    /// config directory
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Enable debug mode to show operational information
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Write the default configuration file and exit
    #[arg(long = "write-config", action)]
    pub write_config: bool,

    /// Overwrite an existing config file when used with --write-config
    #[arg(long = "force", action)]
    pub force: bool,

    /// Clear all cache data (search history) and exit
    #[arg(long = "clear-cache", action)]
    pub clear_cache: bool,
}
