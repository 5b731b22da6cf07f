//! Environment-driven configuration.

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Root directory of the filesystem blob store backing variant images.
    pub media_root: String,
    pub nats_url: Option<String>,
    /// Shared secret used to verify hosted-checkout webhook signatures.
    pub webhook_secret: String,
    /// Maximum accepted age of a webhook signature timestamp, in seconds.
    pub webhook_tolerance_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8083".to_string())
                .parse()
                .context("PORT is not a valid port number")?,
            media_root: std::env::var("MEDIA_ROOT").unwrap_or_else(|_| "./media".to_string()),
            nats_url: std::env::var("NATS_URL").ok(),
            webhook_secret: std::env::var("WEBHOOK_SECRET")
                .context("WEBHOOK_SECRET is not set")?,
            webhook_tolerance_secs: std::env::var("WEBHOOK_TOLERANCE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        })
    }
}
