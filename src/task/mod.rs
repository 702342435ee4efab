//! Task contract consumed by the engine
//!
//! A task is one unit of crawl work belonging to an instance. The engine never
//! looks inside a task: it reads the identifying fields, asks the rate limiter
//! about `second_rate_limit`, and drives `crawl` followed by `process`.

use crate::crawler::PendingPool;
use crate::state::Instance;
use std::fmt;
use thiserror::Error;

/// Per-second quota for one rate-limit category
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimit {
    /// Category shared by all tasks that count against the same quota
    pub category: String,

    /// Maximum executions per second for the category
    pub per_second: u32,
}

impl RateLimit {
    pub fn new(category: impl Into<String>, per_second: u32) -> Self {
        Self {
            category: category.into(),
            per_second,
        }
    }
}

/// Why a task was put into the pending pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// Loaded by the seed template
    Seed,

    /// Found while processing another task
    Discovered,

    /// Deferred because its category was over quota
    RateLimit,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::Discovered => "discovered",
            Self::RateLimit => "rate_limit",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw output of a crawl phase, handed to the process phase
#[derive(Debug, Clone, Default)]
pub struct PageRaw {
    /// Final URL the content came from
    pub url: String,

    /// HTTP status, when the crawl went over HTTP
    pub status_code: Option<u16>,

    /// Content-Type header value, if any
    pub content_type: Option<String>,

    pub body: String,
}

/// Errors a task can report from its crawl or process phase
///
/// `Crawl` and `Process` are expected, per-task failures: they are logged and
/// the worker moves on. `Fatal` marks a broken framework state and halts the
/// whole run.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("crawl failed for {url}: {message}")]
    Crawl { url: String, message: String },

    #[error("process failed for {url}: {message}")]
    Process { url: String, message: String },

    #[error("{0}")]
    Fatal(String),
}

impl TaskError {
    pub fn crawl(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Crawl {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn process(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Process {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Returns true for errors that must halt the run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// A unit of crawl work
///
/// Implementations carry their own state; the identifying fields must not
/// change once the task exists.
pub trait Task: Send + fmt::Debug {
    /// Id of the run this task belongs to
    fn instance_id(&self) -> &str;

    fn url(&self) -> &str;

    /// Name of the handler that processes this task
    fn func_name(&self) -> &str;

    /// Quota this task counts against, if any
    fn second_rate_limit(&self) -> Option<&RateLimit> {
        None
    }

    /// Fetches the raw content
    fn crawl(&mut self) -> Result<PageRaw, TaskError>;

    /// Consumes the crawl output; may enqueue further tasks through `ctx`
    fn process(&mut self, page_raw: PageRaw, ctx: &TaskContext<'_>) -> Result<(), TaskError>;
}

/// What a task may touch while processing
pub struct TaskContext<'a> {
    instance: &'a Instance,
    pool: &'a PendingPool,
}

impl<'a> TaskContext<'a> {
    pub fn new(instance: &'a Instance, pool: &'a PendingPool) -> Self {
        Self { instance, pool }
    }

    pub fn instance(&self) -> &Instance {
        self.instance
    }

    pub fn instance_id(&self) -> &str {
        self.instance.id()
    }

    /// Enqueues a task discovered while processing
    pub fn spawn(&self, task: Box<dyn Task>) {
        self.pool.add(task, Reason::Discovered);
    }

    /// Pending depth of the current instance
    pub fn pending(&self) -> usize {
        self.pool.get_current_task_num(self.instance.id())
    }
}
