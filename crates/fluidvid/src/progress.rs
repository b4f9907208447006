use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

/// Shared progress of a run.
///
/// Written only by the job runner, read by the monitor. `total` is fixed at
/// construction; `completed` only moves forward and never passes `total`.
#[derive(Debug)]
pub struct ProgressState {
    total: usize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    current: RwLock<String>,
}

/// Point-in-time copy for rendering
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub current: String,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

impl ProgressState {
    pub fn new(total: usize) -> Arc<Self> {
        Arc::new(Self {
            total,
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            current: RwLock::new(String::new()),
        })
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Acquire)
    }

    pub fn set_current(&self, label: &str) {
        if let Ok(mut current) = self.current.write() {
            current.clear();
            current.push_str(label);
        }
    }

    /// Count one resolved job, successful or not. Returns the new completed count.
    pub fn record_completion(&self, success: bool) -> usize {
        let total = self.total;
        // single writer, so this check cannot race another completion
        if !success && self.completed() < total {
            self.failed.fetch_add(1, Ordering::AcqRel);
        }
        match self
            .completed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| (c < total).then_some(c + 1))
        {
            Ok(previous) => previous + 1,
            Err(saturated) => {
                log::warn!("Progress already at {}/{}, extra completion ignored", saturated, total);
                saturated
            }
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            completed: self.completed(),
            failed: self.failed(),
            current: self.current.read().map(|c| c.clone()).unwrap_or_default(),
        }
    }
}

/// Raising side of the shutdown signal
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

/// Observing side; cheap to clone
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> (Self, ShutdownListener) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, ShutdownListener { rx })
    }

    /// Raise the signal. Idempotent.
    pub fn signal(&self) {
        self.tx.send_replace(true);
    }
}

impl ShutdownListener {
    pub fn is_signalled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal is raised, or the `Shutdown` was dropped
    pub async fn wait(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
