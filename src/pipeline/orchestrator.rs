//! Bounded worker pool over process-isolated scrape tasks.
//!
//! Each task runs as its own OS process (`pricewatch run-task <json>`)
//! because it owns an exclusive browser session; state must not leak
//! between tasks. The pool caps concurrency at `min(task_count, cap)`,
//! contains every per-task failure (crash, timeout, unparsable output)
//! as a `Failed` report, and returns reports in submission order even
//! though workers complete in arbitrary order.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::outcome::{TaskOutcome, TaskReport};
use super::ScrapeTask;

pub struct Orchestrator {
    cap: usize,
    task_deadline: Duration,
    /// Config file forwarded to each subprocess, when one was given.
    config_path: Option<PathBuf>,
    /// Database path forwarded through the environment.
    database_path: PathBuf,
}

impl Orchestrator {
    pub fn new(
        cap: usize,
        task_deadline: Duration,
        config_path: Option<PathBuf>,
        database_path: PathBuf,
    ) -> Self {
        Self {
            cap: cap.max(1),
            task_deadline,
            config_path,
            database_path,
        }
    }

    /// Run all tasks to a terminal state through subprocess workers.
    pub async fn run(&self, tasks: Vec<ScrapeTask>) -> Vec<TaskReport> {
        let deadline = self.task_deadline;
        let config_path = self.config_path.clone();
        let database_path = self.database_path.clone();

        self.run_with(tasks, move |task| {
            let config_path = config_path.clone();
            let database_path = database_path.clone();
            async move { run_subprocess(task, deadline, config_path, database_path).await }
        })
        .await
    }

    /// Pool driver with an injectable task runner.
    ///
    /// `runner` produces the terminal outcome for one task; the pool owns
    /// scheduling, the concurrency bound and submission-order reassembly.
    pub async fn run_with<F, Fut>(&self, tasks: Vec<ScrapeTask>, runner: F) -> Vec<TaskReport>
    where
        F: Fn(ScrapeTask) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = TaskOutcome> + Send,
    {
        if tasks.is_empty() {
            return Vec::new();
        }

        let slots = self.cap.min(tasks.len());
        info!("Dispatching {} tasks across {} slots", tasks.len(), slots);
        let semaphore = Arc::new(Semaphore::new(slots));

        let mut handles = Vec::with_capacity(tasks.len());
        for (idx, task) in tasks.iter().cloned().enumerate() {
            let semaphore = semaphore.clone();
            let runner = runner.clone();
            handles.push((
                idx,
                tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return TaskOutcome::Failed {
                                error: "worker pool shut down before task started".to_string(),
                            }
                        }
                    };
                    runner(task).await
                }),
            ));
        }

        // Reassemble in submission order; a panicked worker is contained
        // as a failed report for its own slot only.
        let mut reports: Vec<Option<TaskReport>> = (0..tasks.len()).map(|_| None).collect();
        for (idx, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Task {} worker panicked: {}", idx, e);
                    TaskOutcome::Failed {
                        error: format!("worker crashed: {}", e),
                    }
                }
            };
            reports[idx] = Some(TaskReport {
                task: tasks[idx].clone(),
                outcome,
            });
        }

        reports.into_iter().flatten().collect()
    }
}

/// Run one task in a fresh `pricewatch run-task` process, bounded by the
/// per-task deadline. The child is killed when the deadline passes.
async fn run_subprocess(
    task: ScrapeTask,
    deadline: Duration,
    config_path: Option<PathBuf>,
    database_path: PathBuf,
) -> TaskOutcome {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            return TaskOutcome::Failed {
                error: format!("cannot locate own executable: {}", e),
            }
        }
    };
    let payload = match serde_json::to_string(&task) {
        Ok(json) => json,
        Err(e) => {
            return TaskOutcome::Failed {
                error: format!("task serialization failed: {}", e),
            }
        }
    };

    let mut cmd = Command::new(exe);
    cmd.arg("run-task")
        .arg(&payload)
        .env("PRICEWATCH_DB", &database_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if let Some(config) = &config_path {
        cmd.arg("--config").arg(config);
    }

    info!(
        "Starting {} -> {}",
        task.product_name, task.target_site
    );

    match tokio::time::timeout(deadline, cmd.output()).await {
        Ok(Ok(output)) => TaskOutcome::parse_stdout(&String::from_utf8_lossy(&output.stdout)),
        Ok(Err(e)) => TaskOutcome::Failed {
            error: format!("subprocess could not start: {}", e),
        },
        Err(_) => TaskOutcome::Failed {
            error: format!(
                "task exceeded its {}s deadline and was killed",
                deadline.as_secs()
            ),
        },
    }
}
