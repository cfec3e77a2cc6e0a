use crate::constants::TICK_RATE;
use crate::error::{ServerError, ServerResult};
use clap::Parser;
use shared::{DEFAULT_PORT, MAX_CLIENTS};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings for the galaxy server.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Authoritative multiplayer galaxy server")]
pub struct ServerConfig {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum concurrent captains
    #[arg(short, long, default_value_t = MAX_CLIENTS)]
    pub max_clients: usize,

    /// World snapshot location
    #[arg(long, default_value = "galaxy.sav")]
    pub save_file: PathBuf,

    /// Ticks between world snapshots
    #[arg(long, default_value_t = 1800)]
    pub save_interval: u64,

    /// Generate a new galaxy even if a snapshot exists
    #[arg(long)]
    pub fresh: bool,

    /// Seed for galaxy generation and combat rolls
    #[arg(long)]
    pub seed: Option<u64>,

    /// Outbound packets buffered per connection before updates are dropped
    #[arg(long, default_value_t = 64)]
    pub outbound_queue: usize,

    /// Commands buffered per captain awaiting the next tick
    #[arg(long, default_value_t = 16)]
    pub command_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_clients: MAX_CLIENTS,
            save_file: PathBuf::from("galaxy.sav"),
            save_interval: 1800,
            fresh: false,
            seed: None,
            outbound_queue: 64,
            command_queue: 16,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> ServerResult<()> {
        if self.max_clients == 0 || self.max_clients > MAX_CLIENTS {
            return Err(ServerError::Config(format!(
                "max clients {} outside 1-{}",
                self.max_clients, MAX_CLIENTS
            )));
        }
        if self.outbound_queue == 0 || self.command_queue == 0 {
            return Err(ServerError::Config("queue capacities must be positive".to_string()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Every timer in the rules is counted in ticks, so the rate is fixed.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / TICK_RATE as f64)
    }
}
