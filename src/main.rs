// ===============================
// src/main.rs
// ===============================
//
// channel-bridge: one-shot reconciliation of catalog and order state between
// a seller account and a buyer account on the same commerce platform. Each
// run re-derives everything by re-querying both sides; nothing is cached
// between runs.
//
mod alerts;
mod client;
mod compare;
mod config;
mod domain;
mod error;
mod orders;
mod products;
mod ratelimit;
mod recorder;

use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::alerts::Alerter;
use crate::client::ApiClient;
use crate::domain::Event;
use crate::ratelimit::RateGate;

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ---- Load config ----
    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "required configuration is missing");
            std::process::exit(1);
        }
    };

    let job_id = new_job_id();
    info!(
        job = %job_id,
        base_url = %cfg.base_url,
        since = ?cfg.since,
        new_product_to_inactive = cfg.policy.new_product_to_inactive,
        product_updates_to_inactive = cfg.policy.product_updates_to_inactive,
        "starting channel bridge"
    );

    // ---- Shared plumbing: one rate budget and one client for both sides ----
    let gate = Arc::new(RateGate::new(ratelimit::CALLS_PER_SECOND));
    let client = ApiClient::new(&cfg.base_url, gate);
    let alerter = Alerter::new(cfg.alert_webhook_url.clone());

    // ---- Recorder (optional) ----
    let (events, recorder_handle) = match cfg.record_file.clone() {
        Some(path) => {
            let (tx, rx) = mpsc::channel::<Event>(8192);
            let handle = tokio::spawn(recorder::run(rx, path));
            (Some(tx), Some(handle))
        }
        None => (None, None),
    };

    {
        // ---- Sync products ----
        let product_job = products::Job {
            id: job_id.clone(),
            since: cfg.since,
            client: client.clone(),
            seller_api_key: cfg.seller_api_key.clone(),
            buyer_api_key: cfg.buyer_api_key.clone(),
            policy: cfg.policy.clone(),
            alerter,
            events: events.clone(),
        };
        if !cfg.orders_only {
            product_job.sync_products().await;
        }

        // ---- Sync orders ----
        if !cfg.products_only {
            let order_job = orders::Job {
                id: job_id.clone(),
                since: cfg.since,
                client,
                seller_api_key: cfg.seller_api_key.clone(),
                buyer_api_key: cfg.buyer_api_key.clone(),
                products: &product_job,
                events: events.clone(),
            };
            order_job.sync_orders().await;
        }
    }

    // Closing the channel lets the recorder flush and stop.
    drop(events);
    if let Some(handle) = recorder_handle {
        let _ = handle.await;
    }

    info!(job = %job_id, "channel bridge run complete");
}

fn new_job_id() -> String {
    format!(
        "JOB-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        rand::thread_rng().gen::<u32>()
    )
}
