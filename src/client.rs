// ===============================
// src/client.rs
// ===============================
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header;
use reqwest::Method;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::ratelimit::RateGate;

/// Fixed page size for every list endpoint.
pub const PAGE_SIZE: u32 = 250;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("api error :: {status} :: {body:?}")]
    Status { status: u16, body: String },
    #[error("request failed :: {0}")]
    Http(#[from] reqwest::Error),
}

/// Thin verb-level client for the platform API. Both accounts share one base
/// URL and are told apart purely by the `Authorization` header, so the key is
/// a per-call argument rather than client state. Every call goes through the
/// rate gate first.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    gate: Arc<RateGate>,
}

impl ApiClient {
    pub fn new(base_url: &Url, gate: Arc<RateGate>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("http client");
        Self {
            http,
            base: base_url.as_str().trim_end_matches('/').to_string(),
            gate,
        }
    }

    /// GET with pagination and the optional best-effort `updated` filter.
    /// `path` may already carry query parameters of its own.
    pub async fn get(
        &self,
        path: &str,
        page: u32,
        api_key: &str,
        since: Option<&DateTime<Utc>>,
    ) -> Result<Vec<u8>, ApiError> {
        self.gate.acquire().await;

        let sep = if path.contains('?') { '&' } else { '?' };
        let mut url = format!(
            "{}{}{}page={}&limit={}",
            self.base, path, sep, page, PAGE_SIZE
        );
        if let Some(since) = since {
            url.push_str(&format!("&updated={}", since.format("%Y-%m-%dT%H:%M:%SZ")));
        }
        debug!(%url, "GET");

        let resp = self
            .http
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, api_key)
            .send()
            .await?;
        Self::read_body(resp).await
    }

    pub async fn post(
        &self,
        path: &str,
        api_key: &str,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, ApiError> {
        self.request_with_body(Method::POST, path, api_key, payload)
            .await
    }

    pub async fn patch(
        &self,
        path: &str,
        api_key: &str,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, ApiError> {
        self.request_with_body(Method::PATCH, path, api_key, payload)
            .await
    }

    pub async fn delete(&self, path: &str, api_key: &str) -> Result<Vec<u8>, ApiError> {
        self.gate.acquire().await;

        let url = format!("{}{}", self.base, path);
        debug!(%url, "DELETE");

        let resp = self
            .http
            .delete(&url)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, api_key)
            .send()
            .await?;
        Self::read_body(resp).await
    }

    async fn request_with_body(
        &self,
        method: Method,
        path: &str,
        api_key: &str,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, ApiError> {
        self.gate.acquire().await;

        let url = format!("{}{}", self.base, path);
        debug!(%url, %method, "request with body");

        let resp = self
            .http
            .request(method, &url)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, api_key)
            .body(payload)
            .send()
            .await?;
        Self::read_body(resp).await
    }

    async fn read_body(resp: reqwest::Response) -> Result<Vec<u8>, ApiError> {
        let status = resp.status();
        let body = resp.bytes().await?;
        if status.as_u16() >= 400 {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str) -> ApiClient {
        let base = Url::parse(uri).unwrap();
        ApiClient::new(&base, Arc::new(RateGate::new(1_000)))
    }

    #[tokio::test]
    async fn get_sends_page_limit_and_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("page", "3"))
            .and(query_param("limit", "250"))
            .and(header("Authorization", "key-a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<u8>::new()))
            .expect(1)
            .mount(&server)
            .await;

        let resp = client(&server.uri())
            .get("/products", 3, "key-a", None)
            .await
            .unwrap();
        assert_eq!(resp, b"[]");
    }

    #[tokio::test]
    async fn get_appends_updated_filter_when_since_is_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("updated", "2021-09-17T00:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<u8>::new()))
            .expect(1)
            .mount(&server)
            .await;

        let since = Utc.with_ymd_and_hms(2021, 9, 17, 0, 0, 0).unwrap();
        client(&server.uri())
            .get("/products", 0, "key-a", Some(&since))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn status_over_400_becomes_an_api_error_with_the_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(422).set_body_string("no such account"))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .get("/products", 0, "key-a", None)
            .await
            .unwrap_err();
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "no such account");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }
}
