use clap::Parser;
use envconfig::Envconfig;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::store::RetryPolicy;

#[derive(Debug, Envconfig, Clone)]
pub struct Config {
    /// Server bind address
    #[envconfig(from = "BIND_ADDR", default = "127.0.0.1:3001")]
    pub bind_addr: SocketAddr,

    /// Path of the verse table
    #[envconfig(from = "DATA_PATH", default = "attached_assets/Bhagwad_Gita.csv")]
    pub data_path: PathBuf,

    /// Redis connection URL; empty keeps rate windows in memory
    #[envconfig(from = "REDIS_URL", default = "")]
    pub redis_url: String,

    /// Seconds between sweeps of expired rate windows, 0 disables
    #[envconfig(from = "CLEANUP_INTERVAL", default = "300")]
    pub cleanup_interval_secs: u64,

    /// Seconds before an unreadable verse table is read again, 0 never
    #[envconfig(from = "SOURCE_RETRY_SECS", default = "0")]
    pub source_retry_secs: u64,

    /// Parse the verse table at startup instead of on first request
    #[envconfig(from = "PRELOAD", default = "false")]
    pub preload: bool,

    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,
}

/// Command line overrides for [`Config`].
#[derive(Debug, Default, Parser)]
#[command(name = "shloka", version, about = "Serve verses from a CSV table over HTTP")]
pub struct Cli {
    /// Address to listen on
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Path of the verse table
    #[arg(long)]
    pub data_path: Option<PathBuf>,

    /// Redis URL for shared rate windows
    #[arg(long)]
    pub redis_url: Option<String>,

    /// Parse the verse table at startup
    #[arg(long)]
    pub preload: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    /// Apply command line flags on top of the environment.
    pub fn with_cli(mut self, cli: Cli) -> Self {
        if let Some(bind) = cli.bind {
            self.bind_addr = bind;
        }
        if let Some(path) = cli.data_path {
            self.data_path = path;
        }
        if let Some(url) = cli.redis_url {
            self.redis_url = url;
        }
        self.preload |= cli.preload;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(self.source_retry_secs)
    }

    pub fn uses_redis(&self) -> bool {
        !self.redis_url.trim().is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            data_path: PathBuf::from("attached_assets/Bhagwad_Gita.csv"),
            redis_url: String::new(),
            cleanup_interval_secs: 300,
            source_retry_secs: 0,
            preload: false,
            log_level: "info".to_string(),
        }
    }
}
