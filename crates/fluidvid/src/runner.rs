use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use log::{debug, error, warn};
use tokio::process::Command;
use crate::event_log::{EventLog, LogEvent};
use crate::job::Job;
use crate::progress::ProgressState;

/// How one tool invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Success,
    Failed { diagnostic: String },
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success)
    }
}

/// Runs the external tool. Implementations never return errors: anything that
/// goes wrong is a failed outcome for that job.
pub trait ToolExecutor {
    fn execute(&self, program: &Path, args: &[String]) -> impl Future<Output = ToolOutcome> + Send;
}

/// Spawns the real binary and waits for it
#[derive(Debug, Clone, Default)]
pub struct FfmpegExecutor {
    timeout: Option<Duration>,
}

impl FfmpegExecutor {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl ToolExecutor for FfmpegExecutor {
    async fn execute(&self, program: &Path, args: &[String]) -> ToolOutcome {
        debug!("Executing: {} {}", program.display(), args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // dropping the future on timeout kills the child
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(result) => result,
                Err(_) => {
                    return ToolOutcome::Failed {
                        diagnostic: format!("timed out after {}s, process killed", limit.as_secs()),
                    }
                }
            },
            None => cmd.output().await,
        };

        match output {
            Ok(out) if out.status.success() => ToolOutcome::Success,
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                let diagnostic = condense_stderr(&stderr)
                    .unwrap_or_else(|| format!("exited with {}", out.status));
                ToolOutcome::Failed { diagnostic }
            }
            Err(e) => ToolOutcome::Failed {
                diagnostic: format!("failed to start {}: {}", program.display(), e),
            },
        }
    }
}

/// Keep the log line-oriented: ffmpeg puts the actual error on its last line
pub fn condense_stderr(stderr: &str) -> Option<String> {
    stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(str::to_string)
}

/// Result of a drained queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: Vec<String>,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Executes a queue strictly one job at a time
pub struct JobRunner<E> {
    executor: E,
    program: PathBuf,
    thumbnail_at: String,
    progress: Arc<ProgressState>,
    log: EventLog,
}

impl<E: ToolExecutor> JobRunner<E> {
    pub fn new(
        executor: E,
        program: PathBuf,
        thumbnail_at: String,
        progress: Arc<ProgressState>,
        log: EventLog,
    ) -> Self {
        Self {
            executor,
            program,
            thumbnail_at,
            progress,
            log,
        }
    }

    /// Run every job in order. A failure is recorded and the queue moves on;
    /// nothing is retried.
    pub async fn run(&self, queue: &[Job]) -> RunReport {
        if queue.len() != self.progress.total() {
            warn!(
                "Queue has {} jobs but progress expects {}",
                queue.len(),
                self.progress.total()
            );
        }

        let mut report = RunReport::default();
        for job in queue {
            self.progress.set_current(&job.label);

            let args = job.tool_args(&self.thumbnail_at);
            let outcome = self.executor.execute(&self.program, &args).await;

            let event = match &outcome {
                ToolOutcome::Success => {
                    report.succeeded += 1;
                    LogEvent::info(format!("Completed: {}", job.label))
                }
                ToolOutcome::Failed { diagnostic } => {
                    report.failed.push(job.label.clone());
                    LogEvent::error(format!("Failed: {} - {}", job.label, diagnostic))
                }
            };

            // the event must be durable before the counter says the job is done
            if let Err(e) = self.log.append(&event) {
                error!("{:#}", e);
            }
            self.progress.record_completion(outcome.is_success());
        }

        self.progress.set_current("");
        report
    }
}
