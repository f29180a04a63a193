//! HTTP cursor client for Elasticsearch-compatible clusters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::ClusterConfig;
use crate::error::{ClusterError, ConfigError, EsdumpError, Result};
use crate::query::{QueryDescriptor, QueryKind, format_keepalive};

use super::{CursorClient, CursorToken, Page};

/// Whether a request may be resent after its response was lost.
///
/// Scroll requests change server state as soon as they are processed: a
/// continuation advances the cursor and the opening search allocates a
/// context. Both are only retried on failures that prove the request never
/// ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    Safe,
    UnsentOnly,
}

impl Replay {
    fn retries_status(self, status: StatusCode) -> bool {
        let code = status.as_u16();
        ClusterError::is_transient_status(code)
            && (self == Replay::Safe || matches!(code, 429 | 503))
    }

    fn retries_error(self, err: &reqwest::Error) -> bool {
        err.is_connect() || (self == Replay::Safe && err.is_timeout())
    }
}

/// Scroll client over the cluster REST API.
///
/// Requests rotate round-robin across the configured node addresses.
pub struct EsClient {
    client: Client,
    addresses: Vec<String>,
    next: AtomicUsize,
    username: Option<String>,
    password: Option<String>,
    retry_attempts: u32,
}

impl EsClient {
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        let addresses: Vec<String> = config
            .addresses
            .iter()
            .map(|a| a.trim().trim_end_matches('/').to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if addresses.is_empty() {
            return Err(ConfigError::MissingField("cluster.addresses".to_string()).into());
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("esdump/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            addresses,
            next: AtomicUsize::new(0),
            username: config.username.clone().filter(|u| !u.is_empty()),
            password: config.password.clone(),
            retry_attempts: config.retry_attempts,
        })
    }

    /// Ask the cluster for its version number.
    pub async fn server_version(&self) -> Result<String> {
        let (status, body) = self
            .send(Replay::Safe, || self.request(Method::GET, "/"))
            .await?;
        if !status.is_success() {
            return Err(cluster_error(status, &body).into());
        }

        let info: Value =
            serde_json::from_slice(&body).map_err(|e| EsdumpError::Protocol(e.to_string()))?;
        info.pointer("/version/number")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| EsdumpError::Protocol("no version.number in cluster info".to_string()))
    }

    /// Fail unless every requested index exists.
    pub async fn check_indices(&self, indices: &[String]) -> Result<()> {
        if indices.is_empty() {
            return Err(ConfigError::MissingField("indices".to_string()).into());
        }
        let expression = indices.join(",");
        let path = format!("/{expression}");

        let (status, _) = self
            .send(Replay::Safe, || self.request(Method::HEAD, &path))
            .await?;
        if status != StatusCode::OK {
            return Err(EsdumpError::IndexNotFound {
                indices: expression,
                addresses: self.addresses.join(","),
            });
        }
        debug!("Index check passed for {}", expression);
        Ok(())
    }

    fn next_address(&self) -> &str {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.addresses.len();
        &self.addresses[i]
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.next_address(), path);
        let builder = self.client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }

    fn search_request(&self, query: &QueryDescriptor) -> RequestBuilder {
        let mut path = format!("/{}", query.index_expression());
        if let Some(doc_type) = &query.doc_type {
            path.push('/');
            path.push_str(doc_type);
        }
        path.push_str("/_search");

        let mut params: Vec<(&str, String)> = vec![
            ("scroll", format_keepalive(query.scroll)),
            ("size", query.page_size.to_string()),
            ("_source", query.fields.join(",")),
        ];
        if !query.sort.is_empty() {
            params.push(("sort", query.sort.join(",")));
        }
        // Applied per shard by the cluster, so it only trims the work.
        if let Some(limit) = query.terminate_after() {
            params.push(("terminate_after", limit.to_string()));
        }
        if let QueryKind::Lucene(q) = &query.query {
            params.push(("q", q.clone()));
        }

        let builder = self.request(Method::POST, &path).query(&params);
        match &query.query {
            QueryKind::Dsl(body) => builder.json(body),
            _ => builder,
        }
    }

    fn scroll_request(&self, token: &CursorToken, keepalive: Duration) -> RequestBuilder {
        self.request(Method::POST, "/_search/scroll").json(&json!({
            "scroll": format_keepalive(keepalive),
            "scroll_id": token.as_str(),
        }))
    }

    fn clear_scroll_request(&self, tokens: &[CursorToken]) -> RequestBuilder {
        let ids: Vec<&str> = tokens.iter().map(CursorToken::as_str).collect();
        self.request(Method::DELETE, "/_search/scroll")
            .json(&json!({ "scroll_id": ids }))
    }

    async fn send<F>(&self, replay: Replay, build: F) -> Result<(StatusCode, Vec<u8>)>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            match build().send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if replay.retries_status(status) && attempt < self.retry_attempts {
                        attempt += 1;
                        warn!("Cluster answered {}, retrying (attempt {})", status, attempt);
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    let body = resp.bytes().await?;
                    return Ok((status, body.to_vec()));
                }
                Err(err) => {
                    if replay.retries_error(&err) && attempt < self.retry_attempts {
                        attempt += 1;
                        warn!("Request failed ({}), retrying (attempt {})", err, attempt);
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }
}

#[async_trait]
impl CursorClient for EsClient {
    async fn initial_fetch(&self, query: &QueryDescriptor) -> Result<Page> {
        debug!(
            "Opening scroll on {} (size {}, keep-alive {})",
            query.index_expression(),
            query.page_size,
            format_keepalive(query.scroll)
        );
        let (status, body) = self
            .send(Replay::UnsentOnly, || self.search_request(query))
            .await?;
        decode_page(status, &body)
    }

    async fn continuation_fetch(&self, token: &CursorToken, keepalive: Duration) -> Result<Page> {
        let (status, body) = self
            .send(Replay::UnsentOnly, || self.scroll_request(token, keepalive))
            .await?;
        decode_page(status, &body)
    }

    async fn release(&self, tokens: &[CursorToken]) -> Result<()> {
        if tokens.is_empty() {
            return Ok(());
        }

        let (status, body) = self
            .send(Replay::Safe, || self.clear_scroll_request(tokens))
            .await?;

        if status.is_success() {
            let freed = serde_json::from_slice::<Value>(&body)
                .ok()
                .and_then(|v| v.get("num_freed").and_then(Value::as_u64))
                .unwrap_or(0);
            info!("Released {} scroll context(s)", freed);
            return Ok(());
        }

        let err = cluster_error(status, &body);
        if err.is_missing_context() {
            debug!("Scroll context(s) already released");
            return Ok(());
        }
        Err(err.into())
    }
}

fn cluster_error(status: StatusCode, body: &[u8]) -> ClusterError {
    let err = ClusterError::from_body(Some(status.as_u16()), &String::from_utf8_lossy(body));
    if let Ok(json) = err.to_json_compact() {
        debug!("Cluster error: {}", json);
    }
    err
}

fn decode_page(status: StatusCode, body: &[u8]) -> Result<Page> {
    if !status.is_success() {
        return Err(cluster_error(status, body).into());
    }
    Page::decode(body)
}

fn retry_backoff(attempt: u32) -> Duration {
    let millis = 200u64.saturating_mul(1 << attempt.saturating_sub(1).min(5));
    Duration::from_millis(millis.min(5_000))
}
