//! HTTP fetcher implementation
//!
//! Blocking requests issued from worker threads. Every failure to obtain a
//! successful response is reported as a crawl error for the task.

use crate::config::UserAgentConfig;
use crate::task::{PageRaw, TaskError};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Formats the user agent string: `Name/Version (+ContactURL)`
pub fn user_agent(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{})",
        config.crawler_name, config.crawler_version, config.contact_url
    )
}

/// Builds a blocking HTTP client with proper configuration
///
/// Must not be called from inside an async runtime.
///
/// # Arguments
///
/// * `config` - Identity sent in the `User-Agent` header
/// * `timeout` - Whole-request timeout; the connect timeout is capped at 10s
///
/// # Returns
///
/// * `Ok(Client)` - Client ready to be shared by every worker
/// * `Err(reqwest::Error)` - The TLS backend or client could not be set up
///
/// # Example
///
/// ```no_run
/// use fastgets::config::UserAgentConfig;
/// use fastgets::http::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "FastGets".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/bot".to_string(),
/// };
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent(config))
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and returns its body
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx | `PageRaw` with the final URL after redirects |
/// | Other status | `TaskError::Crawl` "HTTP <code>" |
/// | Timeout | `TaskError::Crawl` "request timed out" |
/// | Connection failure | `TaskError::Crawl` "connection failed" |
///
/// # Arguments
///
/// * `client` - Client from [`build_http_client`]
/// * `url` - Absolute http(s) URL to GET
///
/// # Returns
///
/// The raw page, or a crawl error naming `url`. This never returns
/// `TaskError::Fatal`.
pub fn fetch_page(client: &Client, url: &str) -> Result<PageRaw, TaskError> {
    let response = client.get(url).send().map_err(|e| classify(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(TaskError::crawl(url, format!("HTTP {}", status.as_u16())));
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = response.text().map_err(|e| classify(url, e))?;

    Ok(PageRaw {
        url: final_url,
        status_code: Some(status.as_u16()),
        content_type,
        body,
    })
}

fn classify(url: &str, error: reqwest::Error) -> TaskError {
    if error.is_timeout() {
        TaskError::crawl(url, "request timed out")
    } else if error.is_connect() {
        TaskError::crawl(url, format!("connection failed: {}", error))
    } else {
        TaskError::crawl(url, error)
    }
}
