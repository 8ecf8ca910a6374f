use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use dagrun::dag::ScheduledTask;
use dagrun::engine::ExecutionResult;
use dagrun::exec::{BoxFuture, TaskExecutor};
use dagrun::errors::Result;

/// What the fake executor does for one task.
#[derive(Debug, Clone)]
pub enum Script {
    Succeed,
    /// Fail with the given exit code.
    Fail(i32),
    /// Fail the first `n` attempts, then succeed.
    FailTimes(u32),
    /// Return an executor error instead of a result.
    Error(String),
    Panic,
    /// Wait until [`ScriptedExecutor::release`] is called, then succeed.
    Block,
}

/// Something the fake executor observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Started(String),
    Finished(String),
    /// `TaskExecutor::cancel` was called for the task.
    Cancelled(String),
}

/// A fake executor that:
/// - records when each task starts and finishes
/// - returns scripted results per task (default: success)
/// - optionally sleeps before completing, to create overlap
/// - tracks the peak number of concurrent executions
#[derive(Default)]
pub struct ScriptedExecutor {
    scripts: HashMap<String, Script>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    log: Mutex<Vec<Observed>>,
    attempts: Mutex<HashMap<String, u32>>,
    running: AtomicUsize,
    peak: AtomicUsize,
    release: Notify,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, task: &str, script: Script) -> Self {
        self.scripts.insert(task.to_string(), script);
        self
    }

    pub fn delay(mut self, task: &str, delay: Duration) -> Self {
        self.delays.insert(task.to_string(), delay);
        self
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Wake every task scripted with [`Script::Block`].
    pub fn release(&self) {
        self.release.notify_waiters();
    }

    pub fn log(&self) -> Vec<Observed> {
        self.log.lock().unwrap().clone()
    }

    /// Task names in the order they were started.
    pub fn started(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|o| match o {
                Observed::Started(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Task names passed to `cancel`, sorted.
    pub fn cancelled(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .log()
            .into_iter()
            .filter_map(|o| match o {
                Observed::Cancelled(name) => Some(name),
                _ => None,
            })
            .collect();
        names.sort();
        names
    }

    pub fn attempts_of(&self, task: &str) -> u32 {
        self.attempts.lock().unwrap().get(task).copied().unwrap_or(0)
    }

    /// Largest number of executions that were in flight at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Index of the first matching log entry.
    pub fn position(&self, entry: &Observed) -> Option<usize> {
        self.log().iter().position(|o| o == entry)
    }

    fn record(&self, entry: Observed) {
        self.log.lock().unwrap().push(entry);
    }
}

/// Decrements the running counter even if the call is aborted or panics.
struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TaskExecutor for ScriptedExecutor {
    fn execute<'a>(&'a self, task: &'a ScheduledTask) -> BoxFuture<'a, Result<ExecutionResult>> {
        Box::pin(async move {
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                let n = attempts.entry(task.name.clone()).or_insert(0);
                *n += 1;
                *n
            };

            // Register for `release` before anyone can observe the start.
            let notified = self.release.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            self.record(Observed::Started(task.name.clone()));
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let _guard = RunningGuard(&self.running);

            let script = self
                .scripts
                .get(&task.name)
                .cloned()
                .unwrap_or(Script::Succeed);

            if matches!(script, Script::Block) {
                notified.await;
            }

            let delay = self
                .delays
                .get(&task.name)
                .copied()
                .unwrap_or(self.default_delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let result: Result<ExecutionResult> = match script {
                Script::Succeed | Script::Block => Ok(ExecutionResult::succeeded(task.name.clone())),
                Script::Fail(code) => Ok(ExecutionResult::failed(Some(code), "scripted failure")),
                Script::FailTimes(n) if attempt <= n => {
                    Ok(ExecutionResult::failed(Some(1), "scripted flaky failure"))
                }
                Script::FailTimes(_) => Ok(ExecutionResult::succeeded("recovered")),
                Script::Error(msg) => Err(anyhow::anyhow!(msg).into()),
                Script::Panic => panic!("scripted panic in task {}", task.name),
            };

            self.record(Observed::Finished(task.name.clone()));
            result
        })
    }

    fn cancel<'a>(&'a self, task: &'a ScheduledTask) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(Observed::Cancelled(task.name.clone()));
            Ok(())
        })
    }
}
