//! Scripted tasks, templates and writers for driving the engine in tests

use fastgets::output::{OutputError, OutputResult};
use fastgets::{
    EngineConfig, FastGetsError, PageRaw, RateLimit, RunReport, SeedContext, Task, TaskContext,
    TaskError, Template, Writer,
};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Engine settings with short sleeps so runs finish quickly
pub fn fast_config(threads: usize) -> EngineConfig {
    EngineConfig {
        thread_num: threads,
        testing: false,
        idle_sleep_ms: 5,
        poll_interval_ms: 5,
        drain_delay_ms: 20,
        seed_wait_ms: 500,
    }
}

/// What a scripted task does when executed
#[derive(Debug, Clone)]
pub enum Behaviour {
    Succeed,
    Sleep(Duration),
    FailCrawl,
    FailProcess,
    Fatal,
    Panic,
    /// Succeeds and spawns this many succeeding children
    Spawn(usize),
}

/// Shared record of executed task URLs and when their crawl phase ran
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<(String, Instant)>>>,
}

impl ExecutionLog {
    pub fn record(&self, url: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));
    }

    pub fn urls(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn times(&self) -> Vec<Instant> {
        self.entries.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[derive(Debug)]
pub struct ScriptedTask {
    instance_id: String,
    url: String,
    behaviour: Behaviour,
    rate_limit: Option<RateLimit>,
    log: ExecutionLog,
}

impl Task for ScriptedTask {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn func_name(&self) -> &str {
        "scripted"
    }

    fn second_rate_limit(&self) -> Option<&RateLimit> {
        self.rate_limit.as_ref()
    }

    fn crawl(&mut self) -> Result<PageRaw, TaskError> {
        self.log.record(&self.url);
        match self.behaviour {
            Behaviour::Sleep(duration) => thread::sleep(duration),
            Behaviour::FailCrawl => return Err(TaskError::crawl(&self.url, "HTTP 500")),
            Behaviour::Fatal => return Err(TaskError::Fatal("pool handle lost".to_string())),
            Behaviour::Panic => panic!("scripted panic in {}", self.url),
            _ => {}
        }
        Ok(PageRaw {
            url: self.url.clone(),
            body: "<html></html>".to_string(),
            ..PageRaw::default()
        })
    }

    fn process(&mut self, _page_raw: PageRaw, ctx: &TaskContext<'_>) -> Result<(), TaskError> {
        match self.behaviour {
            Behaviour::FailProcess => Err(TaskError::process(&self.url, "unexpected markup")),
            Behaviour::Spawn(children) => {
                for i in 0..children {
                    ctx.spawn(Box::new(ScriptedTask {
                        instance_id: self.instance_id.clone(),
                        url: format!("{}/child-{}", self.url, i),
                        behaviour: Behaviour::Succeed,
                        rate_limit: self.rate_limit.clone(),
                        log: self.log.clone(),
                    }));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// One planned seed
#[derive(Debug, Clone)]
pub struct SeedPlan {
    pub url: String,
    pub behaviour: Behaviour,
    pub rate_limit: Option<RateLimit>,
}

pub fn seed(url: &str, behaviour: Behaviour) -> SeedPlan {
    SeedPlan {
        url: url.to_string(),
        behaviour,
        rate_limit: None,
    }
}

pub fn limited_seed(url: &str, category: &str, per_second: u32) -> SeedPlan {
    SeedPlan {
        url: url.to_string(),
        behaviour: Behaviour::Succeed,
        rate_limit: Some(RateLimit::new(category, per_second)),
    }
}

/// How the scripted template ends its load
#[derive(Debug, Clone)]
pub enum LoadEnd {
    Ok,
    Fail,
    Panic,
}

/// Seeds planned tasks, optionally in two batches separated by a pause
pub struct ScriptedTemplate {
    pub batches: Vec<Vec<SeedPlan>>,
    pub pause: Duration,
    pub end: LoadEnd,
    pub log: ExecutionLog,
}

impl ScriptedTemplate {
    pub fn new(seeds: Vec<SeedPlan>, log: ExecutionLog) -> Self {
        Self {
            batches: vec![seeds],
            pause: Duration::ZERO,
            end: LoadEnd::Ok,
            log,
        }
    }
}

impl Template for ScriptedTemplate {
    fn name(&self) -> &str {
        "scripted"
    }

    fn load(&self, ctx: &SeedContext<'_>) -> Result<(), FastGetsError> {
        for (n, batch) in self.batches.iter().enumerate() {
            if n > 0 {
                ctx.ready();
                thread::sleep(self.pause);
            }
            for plan in batch {
                ctx.add(Box::new(ScriptedTask {
                    instance_id: ctx.instance_id().to_string(),
                    url: plan.url.clone(),
                    behaviour: plan.behaviour.clone(),
                    rate_limit: plan.rate_limit.clone(),
                    log: self.log.clone(),
                }));
            }
        }

        match self.end {
            LoadEnd::Ok => Ok(()),
            LoadEnd::Fail => Err(FastGetsError::SeedLoad("seed source unavailable".to_string())),
            LoadEnd::Panic => panic!("seed source exploded"),
        }
    }
}

/// Records its name and the report it was given
pub struct RecordingWriter {
    pub name: String,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub reports: Arc<Mutex<Vec<RunReport>>>,
}

impl RecordingWriter {
    pub fn new(name: &str, calls: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            calls: Arc::clone(calls),
            reports: Arc::default(),
        }
    }
}

impl Writer for RecordingWriter {
    fn name(&self) -> &str {
        &self.name
    }

    fn save(&self, report: &RunReport) -> OutputResult<()> {
        self.calls.lock().unwrap().push(self.name.clone());
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

/// Always fails, after recording that it was called
pub struct FailingWriter {
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl Writer for FailingWriter {
    fn name(&self) -> &str {
        "failing"
    }

    fn save(&self, _report: &RunReport) -> OutputResult<()> {
        self.calls.lock().unwrap().push("failing".to_string());
        Err(OutputError::Write("disk full".to_string()))
    }
}
