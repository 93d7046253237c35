use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

/// Relay settings. Every flag can also come from the environment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "manhunt-server",
    version,
    about = "Relay player positions between manhunt clients",
    long_about = "Keeps the latest position of every player per game code in memory. \
                  Records expire after a retention window, and requests are rate limited \
                  per client address."
)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "MANHUNT_BIND", default_value = "0.0.0.0:8787")]
    pub bind: SocketAddr,

    /// Seconds a position is kept after it was last updated
    #[arg(long, env = "MANHUNT_MAX_POSITION_AGE", default_value_t = 900)]
    pub max_position_age: u64,

    /// Requests allowed per client within one rate window
    #[arg(long, env = "MANHUNT_RATE_LIMIT", default_value_t = 60)]
    pub rate_limit: u32,

    /// Length of a rate window in seconds
    #[arg(long, env = "MANHUNT_RATE_WINDOW", default_value_t = 60)]
    pub rate_window: u64,

    /// Seconds between background eviction sweeps
    #[arg(long, env = "MANHUNT_EVICTION_INTERVAL", default_value_t = 60)]
    pub eviction_interval: u64,

    /// Origins allowed to call the relay from a browser, comma separated
    #[arg(
        long,
        env = "MANHUNT_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:8080"
    )]
    pub allowed_origins: Vec<String>,

    /// Origin named in responses to requests from unlisted origins
    #[arg(long, env = "MANHUNT_DEFAULT_ORIGIN", default_value = "http://localhost:8080")]
    pub default_origin: String,

    /// Rate limit by `cf-connecting-ip` / `x-forwarded-for` instead of the
    /// socket peer. Only safe behind a proxy that overwrites those headers.
    #[arg(long, env = "MANHUNT_TRUST_PROXY")]
    pub trust_proxy_headers: bool,

    /// Verbose output (show debug messages)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    pub fn max_position_age_ms(&self) -> i64 {
        secs_to_ms(self.max_position_age)
    }

    pub fn rate_window_ms(&self) -> i64 {
        secs_to_ms(self.rate_window)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval.max(1))
    }
}

fn secs_to_ms(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
}
