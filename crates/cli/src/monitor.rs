use std::sync::Arc;
use std::time::Duration;
use anyhow::{Context, Result};
use fluidvid::{DisplayedMessages, LogTail, ProgressState, ShutdownListener};
use log::debug;
use ratatui::{backend::Backend, Terminal};
use tokio::time::MissedTickBehavior;
use crate::dashboard::{self, Header};

/// Live dashboard. Reads progress and the event log, never writes either.
pub struct Monitor<B: Backend> {
    terminal: Terminal<B>,
    header: Header,
    progress: Arc<ProgressState>,
    tail: LogTail,
    displayed: DisplayedMessages,
    interval: Duration,
    frames: usize,
}

/// What is left when the monitor stops
pub struct MonitorExit<B: Backend> {
    pub terminal: Terminal<B>,
    pub frames: usize,
    pub messages: usize,
}

impl<B: Backend> Monitor<B> {
    pub fn new(
        terminal: Terminal<B>,
        header: Header,
        progress: Arc<ProgressState>,
        tail: LogTail,
        refresh_hz: u32,
    ) -> Self {
        Self {
            terminal,
            header,
            progress,
            tail,
            displayed: DisplayedMessages::new(),
            interval: Duration::from_millis(1000 / u64::from(refresh_hz.max(1))),
            frames: 0,
        }
    }

    /// Pull new log lines and repaint
    fn render(&mut self) -> Result<()> {
        // a log we cannot read this cycle is retried on the next one
        if let Err(e) = self.tail.poll_into(&mut self.displayed) {
            debug!("Log poll failed: {:#}", e);
        }

        let snapshot = self.progress.snapshot();
        let header = &self.header;
        let displayed = &self.displayed;
        self.terminal
            .draw(|f| dashboard::draw(f, header, displayed, &snapshot))
            .context("Failed to draw dashboard")?;
        self.frames += 1;
        Ok(())
    }

    /// Repaint on every tick until shutdown is signalled, then paint the final
    /// state exactly once and hand the terminal back.
    pub async fn run(mut self, mut shutdown: ShutdownListener) -> Result<MonitorExit<B>> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.render() {
                        debug!("Dashboard frame dropped: {:#}", e);
                    }
                }
            }
        }

        self.render()?;

        Ok(MonitorExit {
            terminal: self.terminal,
            frames: self.frames,
            messages: self.displayed.len(),
        })
    }
}
