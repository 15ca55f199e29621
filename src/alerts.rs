// ===============================
// src/alerts.rs
// ===============================
use serde_json::json;
use tracing::{error, warn};
use url::Url;

/// Pushes validation failures to an operator webhook. Delivery is
/// best-effort: with no webhook configured, or on delivery failure, the alert
/// only reaches the log.
#[derive(Debug, Clone)]
pub struct Alerter {
    http: reqwest::Client,
    webhook: Option<Url>,
}

impl Alerter {
    pub fn new(webhook: Option<Url>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook,
        }
    }

    pub async fn send(&self, job: &str, message: &str) {
        warn!(job = %job, alert = %message, "validation alert");
        let Some(webhook) = &self.webhook else {
            return;
        };
        let payload = json!({ "text": message });
        match self.http.post(webhook.clone()).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                error!(job = %job, status = %resp.status(), "alert webhook rejected the alert")
            }
            Err(e) => error!(job = %job, error = %e, "failed to deliver alert"),
        }
    }
}
