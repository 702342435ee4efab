//! HTTP link-following task
//!
//! A `LinkTask` fetches one URL, records the page, and with the `links`
//! handler enqueues every link it has not seen yet in this run.

use crate::config::HttpConfig;
use crate::http::fetcher::fetch_page;
use crate::http::parser::parse_html;
use crate::output::{PageRecord, ResultBuffer};
use crate::task::{PageRaw, RateLimit, Task, TaskContext, TaskError};
use chrono::Utc;
use reqwest::blocking::Client;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// What a task does with a fetched page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Record the page and follow its links
    Links,

    /// Record the page only
    Page,
}

impl Handler {
    /// Looks up a handler by its configured `func-name`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "links" => Some(Self::Links),
            "page" => Some(Self::Page),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Links => "links",
            Self::Page => "page",
        }
    }
}

/// State shared by every HTTP task of one run
#[derive(Debug)]
pub struct HttpShared {
    client: Client,
    results: ResultBuffer,
    visited: Mutex<HashSet<String>>,
    max_depth: u32,
    same_domain_only: bool,
}

impl HttpShared {
    pub fn new(client: Client, results: ResultBuffer, config: &HttpConfig) -> Self {
        Self {
            client,
            results,
            visited: Mutex::new(HashSet::new()),
            max_depth: config.max_depth,
            same_domain_only: config.same_domain_only,
        }
    }

    pub fn results(&self) -> &ResultBuffer {
        &self.results
    }

    /// Records `url` as scheduled; false if it already was
    ///
    /// URLs are compared in parsed form without their fragment, so
    /// `https://example.com` and `https://example.com/#top` are the same page.
    pub fn mark_visited(&self, url: &str) -> bool {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize_url(url))
    }

    pub fn visited_count(&self) -> usize {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Canonical form used for dedup: parsed, fragment dropped
///
/// Strings that do not parse as URLs are kept as written.
fn normalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

/// Fetches one page over HTTP
#[derive(Debug)]
pub struct LinkTask {
    instance_id: String,
    url: String,
    handler: Handler,
    depth: u32,
    rate_limit: Option<RateLimit>,
    shared: Arc<HttpShared>,
}

impl LinkTask {
    /// Creates a depth-0 task and marks its URL visited
    pub fn seed(
        instance_id: impl Into<String>,
        url: impl Into<String>,
        handler: Handler,
        rate_limit: Option<RateLimit>,
        shared: Arc<HttpShared>,
    ) -> Self {
        let url = normalize_url(&url.into());
        shared.mark_visited(&url);
        Self {
            instance_id: instance_id.into(),
            url,
            handler,
            depth: 0,
            rate_limit,
            shared,
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    fn child(&self, url: String) -> Self {
        Self {
            instance_id: self.instance_id.clone(),
            url,
            handler: self.handler,
            depth: self.depth + 1,
            rate_limit: self.rate_limit.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Links that pass the depth and domain filters and were not seen before
    fn follow(&self, page_url: &Url, links: &[String]) -> Vec<String> {
        if self.handler != Handler::Links || self.depth >= self.shared.max_depth {
            return Vec::new();
        }

        links
            .iter()
            .filter(|link| {
                !self.shared.same_domain_only
                    || Url::parse(link)
                        .map(|u| u.host_str() == page_url.host_str())
                        .unwrap_or(false)
            })
            .filter(|link| self.shared.mark_visited(link))
            .cloned()
            .collect()
    }
}

impl Task for LinkTask {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn func_name(&self) -> &str {
        self.handler.as_str()
    }

    fn second_rate_limit(&self) -> Option<&RateLimit> {
        self.rate_limit.as_ref()
    }

    fn crawl(&mut self) -> Result<PageRaw, TaskError> {
        fetch_page(&self.shared.client, &self.url)
    }

    fn process(&mut self, page_raw: PageRaw, ctx: &TaskContext<'_>) -> Result<(), TaskError> {
        let page_url = Url::parse(&page_raw.url).map_err(|e| TaskError::process(&self.url, e))?;
        // after a redirect the final URL counts as seen too
        self.shared.mark_visited(page_url.as_str());

        let is_html = page_raw
            .content_type
            .as_deref()
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);
        let parsed = if is_html {
            parse_html(&page_raw.body, &page_url)
        } else {
            Default::default()
        };

        self.shared.results.push(PageRecord {
            url: self.url.clone(),
            title: parsed.title.clone(),
            status_code: page_raw.status_code,
            content_type: page_raw.content_type.clone(),
            depth: self.depth,
            links_found: parsed.links.len(),
            func_name: self.handler.as_str().to_string(),
            fetched_at: Utc::now(),
        });

        let follow = self.follow(&page_url, &parsed.links);
        tracing::debug!(
            url = %self.url,
            depth = self.depth,
            found = parsed.links.len(),
            following = follow.len(),
            "links extracted"
        );

        for link in follow {
            ctx.spawn(Box::new(self.child(link)));
        }

        Ok(())
    }
}
