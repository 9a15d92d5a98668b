// src/checker/http.rs
// =============================================================================
// This module checks if URLs are alive by making HTTP requests.
//
// Key functionality:
// - One HEAD request per URL, no redirect following, no retries
// - 200 is OK, 3xx is reported as a redirect (with its Location), anything
//   else is a failure
// - Each probe has its own timeout; a slow URL only fails itself
// - Many probes run concurrently with a cap on how many are in flight
//
// Rust concepts:
// - async/await: For concurrent network I/O
// - Enums: To represent the three possible outcomes
// - Streams: For processing many items concurrently
// =============================================================================

use anyhow::Result;
use futures::stream::{self, StreamExt}; // StreamExt gives us .buffer_unordered()
use reqwest::{header::LOCATION, Client};
use serde::{Serialize, Serializer};
use std::time::Duration;
use url::Url;

use super::extract::extract_urls;

/// Why a probe failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeFailure {
    /// Not http or https; no request was made
    #[error("unsupported scheme")]
    UnsupportedScheme,
    #[error("timeout")]
    Timeout,
    /// Got a response, but not 200 or 3xx
    #[error("HTTP {0}")]
    Status(u16),
    /// DNS, connection, TLS or URL syntax problems
    #[error("{0}")]
    Transport(String),
}

// Failures show up in JSON as their message ("timeout", "HTTP 404", ...)
impl Serialize for ProbeFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Outcome of probing one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ProbeResult {
    /// 200 OK
    Ok,
    /// 3xx; holds the Location header value
    Redirected(String),
    Failed(ProbeFailure),
}

/// One URL from the scanned text and what probing it gave.
#[derive(Debug, Clone, Serialize)]
pub struct LinkCheckResult {
    pub url: String,
    /// Byte offset of the URL in the scanned text
    pub position: usize,
    #[serde(flatten)]
    pub outcome: ProbeResult,
}

impl LinkCheckResult {
    /// Only a plain 200 counts; redirects should be fixed in the data
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, ProbeResult::Ok)
    }
}

/// Probes URLs with a shared HTTP client.
#[derive(Clone)]
pub struct LinkChecker {
    client: Client,
    timeout: Duration,
    concurrency: usize,
}

impl LinkChecker {
    // Creates a checker
    //
    // Parameters:
    //   timeout: limit for one probe, connection included
    //   concurrency: maximum probes in flight during check_all
    pub fn new(timeout: Duration, concurrency: usize) -> Result<Self> {
        // We reuse this client for all requests (connection pooling)
        let client = Client::builder()
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::none()) // redirects are reported, not followed
            .user_agent(concat!("lomad/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            timeout,
            concurrency: concurrency.max(1),
        })
    }

    // Checks a single URL
    //
    // Never returns an error: every problem becomes ProbeResult::Failed
    pub async fn probe(&self, url: &str) -> ProbeResult {
        if !has_http_scheme(url) {
            return ProbeResult::Failed(ProbeFailure::UnsupportedScheme);
        }

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return ProbeResult::Failed(ProbeFailure::Transport(format!("invalid URL: {}", e))),
        };

        tracing::debug!(url, "probing");
        let request = self.client.head(parsed).send();

        match tokio::time::timeout(self.timeout, request).await {
            Err(_elapsed) => ProbeResult::Failed(ProbeFailure::Timeout),
            Ok(Err(e)) => ProbeResult::Failed(categorize_error(e)),
            Ok(Ok(response)) => analyze_response(&response),
        }
    }

    // Extracts every URL from `text` and probes them all
    //
    // Returns one entry per occurrence, in the order the URLs appear in the
    // text, whatever order the probes finished in.
    pub async fn check_all(&self, text: &str) -> Vec<LinkCheckResult> {
        // Create a stream of futures; each future checks one URL
        let futures = extract_urls(text).map(|found| {
            let url = found.url.to_string();
            let position = found.start;
            async move {
                let outcome = self.probe(&url).await;
                LinkCheckResult { url, position, outcome }
            }
        });

        // Run up to `concurrency` probes at once, collecting as they finish
        let mut results: Vec<LinkCheckResult> = stream::iter(futures)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        results.sort_by_key(|r| r.position);
        results
    }
}

fn has_http_scheme(url: &str) -> bool {
    match url.split_once("://") {
        Some((scheme, _)) => scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https"),
        None => false,
    }
}

// Classifies a response by status code
//
// - 200: OK
// - 300-399: redirect, reported with its target
// - everything else (including other 2xx): failure
fn analyze_response(response: &reqwest::Response) -> ProbeResult {
    let status = response.status();

    if status == reqwest::StatusCode::OK {
        ProbeResult::Ok
    } else if status.is_redirection() {
        // Servers do send raw UTF-8 in Location; keep it readable
        let target = response
            .headers()
            .get(LOCATION)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();
        ProbeResult::Redirected(target)
    } else {
        ProbeResult::Failed(ProbeFailure::Status(status.as_u16()))
    }
}

// Turns a reqwest error into a short description
fn categorize_error(error: reqwest::Error) -> ProbeFailure {
    if error.is_timeout() {
        return ProbeFailure::Timeout;
    }

    let detail = error.to_string();
    if error.is_connect() {
        ProbeFailure::Transport(format!("connection failed: {}", detail))
    } else {
        ProbeFailure::Transport(detail)
    }
}
