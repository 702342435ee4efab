//! End-to-end engine runs with scripted tasks

use crate::support::{
    fast_config, limited_seed, seed, Behaviour, ExecutionLog, FailingWriter, LoadEnd,
    RecordingWriter, ScriptedTemplate,
};
use fastgets::{FastGetsError, HaltReason, LocalEngine, Reason, TaskError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn seeds(prefix: &str, n: usize, behaviour: Behaviour) -> Vec<crate::support::SeedPlan> {
    (0..n)
        .map(|i| seed(&format!("https://example.com/{}/{}", prefix, i), behaviour.clone()))
        .collect()
}

#[test]
fn test_all_tasks_succeed() {
    let log = ExecutionLog::default();
    let template = ScriptedTemplate::new(seeds("ok", 5, Behaviour::Succeed), log.clone());
    let engine = LocalEngine::new(fast_config(3), Arc::new(template));
    let instance = engine.instance();

    let report = engine.run().unwrap();

    assert_eq!(report.halt_reason, Some(HaltReason::Completed));
    assert_eq!(instance.halt_reason(), Some(HaltReason::Completed));
    assert!(report.stopped_at.is_some());
    assert_eq!(report.threads, 3);
    assert_eq!(report.seeded, 5);
    assert_eq!(report.stats.succeeded, 5);
    assert_eq!(report.stats.executed(), 5);
    assert_eq!(report.unprocessed, 0);

    let mut urls = log.urls();
    urls.sort();
    urls.dedup();
    assert_eq!(urls.len(), 5);
}

#[test]
fn test_empty_seed_list_completes() {
    let template = ScriptedTemplate::new(Vec::new(), ExecutionLog::default());
    let report = LocalEngine::new(fast_config(2), Arc::new(template))
        .run()
        .unwrap();

    assert_eq!(report.halt_reason, Some(HaltReason::Completed));
    assert_eq!(report.stats.executed(), 0);
}

#[test]
fn test_task_errors_are_contained() {
    let log = ExecutionLog::default();
    let template = ScriptedTemplate::new(
        vec![
            seed("https://example.com/a", Behaviour::Succeed),
            seed("https://example.com/b", Behaviour::FailCrawl),
            seed("https://example.com/c", Behaviour::FailProcess),
            seed("https://example.com/d", Behaviour::Succeed),
        ],
        log.clone(),
    );

    let report = LocalEngine::new(fast_config(2), Arc::new(template))
        .run()
        .unwrap();

    assert_eq!(report.halt_reason, Some(HaltReason::Completed));
    assert_eq!(report.stats.succeeded, 2);
    assert_eq!(report.stats.crawl_errors, 1);
    assert_eq!(report.stats.process_errors, 1);
    assert_eq!(log.urls().len(), 4);
}

#[test]
fn test_testing_mode_stops_at_first_task_error() {
    let mut config = fast_config(4);
    config.testing = true;

    let mut plans = vec![seed("https://example.com/broken", Behaviour::FailCrawl)];
    plans.extend(seeds("after", 3, Behaviour::Succeed));
    let log = ExecutionLog::default();
    let template = ScriptedTemplate::new(plans, log.clone());

    let calls = Arc::new(Mutex::new(Vec::new()));
    let writer = RecordingWriter::new("recorder", &calls);
    let reports = Arc::clone(&writer.reports);

    let mut engine = LocalEngine::new(config, Arc::new(template));
    engine.add_writer(Box::new(writer));
    let instance = engine.instance();

    let result = engine.run();

    assert!(matches!(
        result,
        Err(FastGetsError::Task(TaskError::Crawl { ref url, .. })) if url == "https://example.com/broken"
    ));
    assert_eq!(instance.halt_reason(), Some(HaltReason::TaskFailed));
    assert_eq!(log.urls(), vec!["https://example.com/broken".to_string()]);

    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].threads, 1);
    assert_eq!(reports[0].stats.crawl_errors, 1);
    assert_eq!(reports[0].unprocessed, 3);
}

#[test]
fn test_fatal_task_error_halts_run() {
    let mut plans = vec![seed("https://example.com/fatal", Behaviour::Fatal)];
    plans.extend(seeds("after", 5, Behaviour::Succeed));
    let log = ExecutionLog::default();
    let template = ScriptedTemplate::new(plans, log.clone());

    let engine = LocalEngine::new(fast_config(1), Arc::new(template));
    let instance = engine.instance();

    let result = engine.run();

    match result {
        Err(FastGetsError::Fatal { worker, message }) => {
            assert_eq!(worker, 0);
            assert_eq!(message, "pool handle lost");
        }
        other => panic!("expected fatal error, got {:?}", other.map(|r| r.halt_reason)),
    }
    assert_eq!(instance.halt_reason(), Some(HaltReason::WorkerFailed));
    assert_eq!(log.urls().len(), 1);
}

#[test]
fn test_fatal_error_stops_other_workers_promptly() {
    let mut plans = vec![seed("https://example.com/fatal", Behaviour::Fatal)];
    plans.extend(seeds("slow", 20, Behaviour::Sleep(Duration::from_millis(50))));
    let log = ExecutionLog::default();
    let template = ScriptedTemplate::new(plans, log.clone());

    let started = Instant::now();
    let result = LocalEngine::new(fast_config(2), Arc::new(template)).run();

    assert!(matches!(result, Err(FastGetsError::Fatal { .. })));
    // Draining all 20 slow tasks on one worker would take a full second
    assert!(started.elapsed() < Duration::from_millis(600));
    assert!(log.urls().len() < 21);
}

#[test]
fn test_task_panic_halts_run() {
    let mut plans = vec![seed("https://example.com/panic", Behaviour::Panic)];
    plans.extend(seeds("after", 5, Behaviour::Succeed));
    let template = ScriptedTemplate::new(plans, ExecutionLog::default());

    let engine = LocalEngine::new(fast_config(1), Arc::new(template));
    let instance = engine.instance();

    match engine.run() {
        Err(FastGetsError::Fatal { message, .. }) => {
            assert!(message.contains("scripted panic"), "message: {}", message);
        }
        other => panic!("expected fatal error, got {:?}", other.map(|r| r.halt_reason)),
    }
    assert_eq!(instance.halt_reason(), Some(HaltReason::WorkerFailed));
}

#[test]
fn test_seed_failure_halts_before_any_task_runs() {
    let log = ExecutionLog::default();
    let mut template = ScriptedTemplate::new(seeds("seeded", 2, Behaviour::Succeed), log.clone());
    template.end = LoadEnd::Fail;

    let calls = Arc::new(Mutex::new(Vec::new()));
    let writer = RecordingWriter::new("recorder", &calls);
    let reports = Arc::clone(&writer.reports);

    let mut engine = LocalEngine::new(fast_config(2), Arc::new(template));
    engine.add_writer(Box::new(writer));
    let instance = engine.instance();

    let result = engine.run();

    assert!(matches!(result, Err(FastGetsError::SeedLoad(_))));
    assert_eq!(instance.halt_reason(), Some(HaltReason::SeedFailed));
    assert!(log.urls().is_empty());

    let reports = reports.lock().unwrap();
    assert_eq!(reports[0].stats.executed(), 0);
    assert_eq!(reports[0].unprocessed, 0);
}

#[test]
fn test_seed_panic_is_a_seed_failure() {
    let mut template = ScriptedTemplate::new(Vec::new(), ExecutionLog::default());
    template.end = LoadEnd::Panic;

    let engine = LocalEngine::new(fast_config(1), Arc::new(template));
    let instance = engine.instance();

    match engine.run() {
        Err(FastGetsError::SeedLoad(message)) => assert!(message.contains("exploded")),
        other => panic!("expected seed failure, got {:?}", other.map(|r| r.halt_reason)),
    }
    assert_eq!(instance.halt_reason(), Some(HaltReason::SeedFailed));
}

#[test]
fn test_slow_seeding_keeps_run_alive() {
    let log = ExecutionLog::default();
    let mut template = ScriptedTemplate::new(seeds("first", 1, Behaviour::Succeed), log.clone());
    template
        .batches
        .push(seeds("second", 2, Behaviour::Succeed));
    template.pause = Duration::from_millis(200);

    let report = LocalEngine::new(fast_config(2), Arc::new(template))
        .run()
        .unwrap();

    assert_eq!(report.halt_reason, Some(HaltReason::Completed));
    assert_eq!(report.stats.succeeded, 3);
    assert_eq!(report.seeded, 3);
}

#[test]
fn test_discovered_tasks_are_executed() {
    let log = ExecutionLog::default();
    let template = ScriptedTemplate::new(
        vec![seed("https://example.com/parent", Behaviour::Spawn(3))],
        log.clone(),
    );

    let engine = LocalEngine::new(fast_config(2), Arc::new(template));
    let pool = engine.pool();
    let instance = engine.instance();
    let report = engine.run().unwrap();

    assert_eq!(report.stats.succeeded, 4);
    assert_eq!(report.seeded, 1);
    assert_eq!(report.discovered, 3);
    assert_eq!(pool.reason_count(instance.id(), Reason::Discovered), 3);
    assert!(log
        .urls()
        .contains(&"https://example.com/parent/child-2".to_string()));
}

#[test]
fn test_rate_limited_tasks_are_deferred_not_dropped() {
    let log = ExecutionLog::default();
    let template = ScriptedTemplate::new(
        vec![
            limited_seed("https://example.com/1", "example", 1),
            limited_seed("https://example.com/2", "example", 1),
            limited_seed("https://example.com/3", "example", 1),
        ],
        log.clone(),
    );

    let engine = LocalEngine::new(fast_config(3), Arc::new(template));
    let pool = engine.pool();
    let instance = engine.instance();
    let report = engine.run().unwrap();

    assert_eq!(report.halt_reason, Some(HaltReason::Completed));
    assert_eq!(report.stats.succeeded, 3);
    assert!(report.stats.rate_limited > 0);
    assert!(pool.reason_count(instance.id(), Reason::RateLimit) > 0);

    let mut times = log.times();
    times.sort();
    let span = times[2].duration_since(times[0]);
    assert!(span >= Duration::from_millis(1800), "span was {:?}", span);
}

#[test]
fn test_throttled_workers_wait_instead_of_spinning() {
    let log = ExecutionLog::default();
    let template = ScriptedTemplate::new(
        vec![
            limited_seed("https://example.com/1", "example", 1),
            limited_seed("https://example.com/2", "example", 1),
            limited_seed("https://example.com/3", "example", 1),
        ],
        log.clone(),
    );

    let engine = LocalEngine::new(fast_config(3), Arc::new(template));
    let pool = engine.pool();
    let instance = engine.instance();
    let report = engine.run().unwrap();

    assert_eq!(report.stats.succeeded, 3);
    assert!(
        report.stats.rate_limited < 100,
        "rate_limited was {}",
        report.stats.rate_limited
    );
    assert!(pool.reason_count(instance.id(), Reason::RateLimit) < 100);
}

#[test]
fn test_separate_categories_do_not_throttle_each_other() {
    let log = ExecutionLog::default();
    let template = ScriptedTemplate::new(
        vec![
            limited_seed("https://a.example/", "a", 1),
            limited_seed("https://b.example/", "b", 1),
        ],
        log.clone(),
    );

    let started = Instant::now();
    let report = LocalEngine::new(fast_config(2), Arc::new(template))
        .run()
        .unwrap();

    assert_eq!(report.stats.succeeded, 2);
    assert_eq!(report.stats.rate_limited, 0);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_interrupt_stops_run() {
    let plans = seeds("slow", 20, Behaviour::Sleep(Duration::from_millis(50)));
    let template = ScriptedTemplate::new(plans, ExecutionLog::default());

    let engine = LocalEngine::new(fast_config(1), Arc::new(template));
    let instance = engine.instance();

    let halter = {
        let instance = Arc::clone(&instance);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            instance.halt(HaltReason::Interrupted);
        })
    };

    let report = engine.run().unwrap();
    halter.join().unwrap();

    assert_eq!(report.halt_reason, Some(HaltReason::Interrupted));
    assert!(report.stats.succeeded < 20);
    assert_eq!(
        report.stats.succeeded as usize + report.unprocessed,
        20,
        "every task either ran or was left pending"
    );
}

#[test]
fn test_writers_called_in_order_even_after_failure() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let template = ScriptedTemplate::new(seeds("ok", 2, Behaviour::Succeed), ExecutionLog::default());

    let mut engine = LocalEngine::new(fast_config(2), Arc::new(template));
    engine
        .add_writer(Box::new(RecordingWriter::new("first", &calls)))
        .add_writer(Box::new(FailingWriter {
            calls: Arc::clone(&calls),
        }))
        .add_writer(Box::new(RecordingWriter::new("last", &calls)));

    let result = engine.run();

    assert!(matches!(result, Err(FastGetsError::Output(_))));
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["first".to_string(), "failing".to_string(), "last".to_string()]
    );
}
