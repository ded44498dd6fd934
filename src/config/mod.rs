use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::domain::amount::{self, AmountError, Wei};

/// Surety node configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "surety")]
#[command(about = "Flight-insurance governance and escrow engine")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:8080", env = "SURETY_LISTEN_ADDR")]
    pub listen_addr: String,

    /// Path to genesis YAML file (development genesis if not set)
    #[arg(long, env = "SURETY_GENESIS_PATH")]
    pub genesis_path: Option<PathBuf>,

    /// Flat fee charged per call, in wei
    #[arg(long, default_value = "0", env = "SURETY_FEE_PER_CALL_WEI")]
    pub fee_per_call_wei: String,

    /// Maximum events returned per feed page
    #[arg(long, default_value = "100", env = "SURETY_EVENT_PAGE_SIZE")]
    pub event_page_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false", env = "SURETY_LOG_JSON")]
    pub log_json: bool,

    /// Enable graceful shutdown
    #[arg(long, default_value = "true", env = "SURETY_GRACEFUL_SHUTDOWN")]
    pub graceful_shutdown: bool,

    /// Graceful shutdown timeout in seconds
    #[arg(long, default_value = "30", env = "SURETY_SHUTDOWN_TIMEOUT_SECS")]
    pub shutdown_timeout_secs: u64,
}

impl Config {
    /// Get shutdown timeout as Duration.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Per-call fee parsed as wei.
    pub fn fee_per_call(&self) -> Result<Wei, AmountError> {
        amount::parse_wei(&self.fee_per_call_wei)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:8080".to_string(),
            genesis_path: None,
            fee_per_call_wei: "0".to_string(),
            event_page_size: 100,
            log_level: "info".to_string(),
            log_json: false,
            graceful_shutdown: true,
            shutdown_timeout_secs: 30,
        }
    }
}
