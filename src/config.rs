// ===============================
// src/config.rs
// ===============================
use std::env;

use chrono::{DateTime, Utc};
use clap::Parser;
use dotenvy::dotenv;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no {0} set")]
    MissingVar(&'static str),
    #[error("invalid {var} :: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid --since value :: {0}")]
    InvalidSince(#[source] chrono::ParseError),
}

#[derive(Debug, Parser)]
#[command(
    name = "channel-bridge",
    about = "Reconciles catalog and order state between seller and buyer commerce accounts"
)]
struct Cli {
    /// Only process entities updated after this RFC3339 timestamp
    /// (best-effort server-side filter).
    #[arg(long)]
    since: Option<String>,
    /// Run the product pass only.
    #[arg(long, conflicts_with = "orders_only")]
    products_only: bool,
    /// Run the order passes only.
    #[arg(long)]
    orders_only: bool,
}

/// Read-only overrides applied to outgoing payloads after the create/update
/// decision is made.
#[derive(Debug, Clone)]
pub struct SyncPolicy {
    pub new_product_to_inactive: bool,
    pub product_updates_to_inactive: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub seller_api_key: String,
    pub buyer_api_key: String,
    pub base_url: Url,
    pub alert_webhook_url: Option<Url>,
    pub record_file: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub policy: SyncPolicy,
    pub products_only: bool,
    pub orders_only: bool,
}

pub fn load() -> Result<Config, ConfigError> {
    // Make sure .env is read so keys and knobs are available.
    let _ = dotenv();
    let cli = Cli::parse();

    let seller_api_key = require("SELLER_API_KEY")?;
    let buyer_api_key = require("BUYER_API_KEY")?;
    let base_url = Url::parse(&require("BRIDGE_API_URL")?).map_err(|source| {
        ConfigError::InvalidUrl {
            var: "BRIDGE_API_URL",
            source,
        }
    })?;

    let alert_webhook_url = match env::var("ALERT_WEBHOOK_URL") {
        Ok(raw) if !raw.is_empty() => {
            Some(
                Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl {
                    var: "ALERT_WEBHOOK_URL",
                    source,
                })?,
            )
        }
        _ => None,
    };
    let record_file = env::var("RECORD_FILE").ok().filter(|v| !v.is_empty());

    let since = match &cli.since {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map_err(ConfigError::InvalidSince)?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    let policy = SyncPolicy {
        new_product_to_inactive: env_bool("NEW_PRODUCT_TO_INACTIVE", true),
        product_updates_to_inactive: env_bool("PRODUCT_UPDATES_TO_INACTIVE", false),
    };

    Ok(Config {
        seller_api_key,
        buyer_api_key,
        base_url,
        alert_webhook_url,
        record_file,
        since,
        policy,
        products_only: cli.products_only,
        orders_only: cli.orders_only,
    })
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(key)),
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => parse_bool(&raw, default),
        Err(_) => default,
    }
}

/// Empty keeps the default; only a literal "false" (any case) turns a knob
/// off, anything else turns it on.
fn parse_bool(raw: &str, default: bool) -> bool {
    if raw.is_empty() {
        return default;
    }
    !raw.eq_ignore_ascii_case("false")
}
