use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for FastGets
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub output: Option<OutputConfig>,
    #[serde(default)]
    pub seed: Vec<SeedEntry>,
}

/// Worker pool and run lifecycle configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of worker threads
    #[serde(rename = "thread-num")]
    pub thread_num: usize,

    /// Single worker; any task error halts the run and is returned
    pub testing: bool,

    /// How long a worker sleeps when the pending pool is empty (milliseconds)
    #[serde(rename = "idle-sleep-ms")]
    pub idle_sleep_ms: u64,

    /// How often the engine checks whether the run went idle (milliseconds)
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Grace period between halting and joining the workers (milliseconds)
    #[serde(rename = "drain-delay-ms")]
    pub drain_delay_ms: u64,

    /// Longest wait for the seed loader's ready signal (milliseconds)
    #[serde(rename = "seed-wait-ms")]
    pub seed_wait_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_num: 5,
            testing: false,
            idle_sleep_ms: 1000,
            poll_interval_ms: 100,
            drain_delay_ms: 2000,
            seed_wait_ms: 1000,
        }
    }
}

impl EngineConfig {
    /// Worker count actually used: testing mode always runs one worker
    pub fn effective_thread_num(&self) -> usize {
        if self.testing {
            1
        } else {
            self.thread_num
        }
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn drain_delay(&self) -> Duration {
        Duration::from_millis(self.drain_delay_ms)
    }

    pub fn seed_wait(&self) -> Duration {
        Duration::from_millis(self.seed_wait_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

/// HTTP task configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// How many link hops to follow from a seed; 0 fetches only the seeds
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Only follow links whose host matches the page they were found on
    #[serde(rename = "same-domain-only")]
    pub same_domain_only: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_depth: 1,
            same_domain_only: true,
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: Option<String>,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: Option<String>,
}

/// One seed URL and how to handle it
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    pub url: String,

    /// Handler name: "links" follows links, "page" only records the page
    #[serde(rename = "func-name", default = "default_func_name")]
    pub func_name: String,

    #[serde(rename = "rate-limit")]
    pub rate_limit: Option<RateLimitEntry>,
}

/// Per-second quota shared by every task in the category
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitEntry {
    pub category: String,

    #[serde(rename = "per-second")]
    pub per_second: u32,
}

fn default_func_name() -> String {
    "links".to_string()
}
