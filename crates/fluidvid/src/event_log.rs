use std::collections::HashSet;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};

/// Timestamp layout of every log line
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Separator between the line prefix and the message body
const BODY_SEPARATOR: &str = "]: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "INFO",
            Severity::Error => "ERROR",
        })
    }
}

/// A single recorded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub message: String,
}

impl LogEvent {
    pub fn now(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::now(Severity::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::now(Severity::Error, message)
    }

    /// `2024-05-01 12:00:00 [INFO]: Completed: 480p (x264 (CPU))`
    pub fn to_line(&self) -> String {
        format_line(&self.timestamp, &self.severity.to_string(), &self.message)
    }
}

/// Shared by the job events and the `env_logger` pipe so both look the same
pub fn format_line(timestamp: &DateTime<Local>, level: &str, message: &str) -> String {
    format!("{} [{}{}{}", timestamp.format(TIMESTAMP_FORMAT), level, BODY_SEPARATOR, message)
}

/// Extract the message body from a log line; unprefixed lines are returned whole
pub fn message_body(line: &str) -> &str {
    match line.rfind(BODY_SEPARATOR) {
        Some(pos) => line[pos + BODY_SEPARATOR.len()..].trim(),
        None => line.trim(),
    }
}

/// Append-only durable event sink.
///
/// Clones share the same file handle. Every write is flushed before the lock is
/// released, so a reader that sees the file grow sees whole records.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
    file: Arc<Mutex<File>>,
    start_offset: u64,
}

impl EventLog {
    /// Open (or create) the log for appending
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open event log: {}", path.display()))?;
        let start_offset = file
            .metadata()
            .with_context(|| format!("Failed to stat event log: {}", path.display()))?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Arc::new(Mutex::new(file)),
            start_offset,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File length when this run opened the log; earlier runs live before it
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// Append one event as a single line
    pub fn append(&self, event: &LogEvent) -> Result<()> {
        let line = event.to_line();
        self.write_record(line.as_bytes())
            .with_context(|| format!("Failed to append to event log: {}", self.path.display()))
    }

    fn write_record(&self, bytes: &[u8]) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "event log lock poisoned"))?;
        file.write_all(bytes)?;
        if !bytes.ends_with(b"\n") {
            file.write_all(b"\n")?;
        }
        file.flush()
    }
}

/// Lets the sink be handed to `env_logger::Target::Pipe`
impl Write for EventLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_record(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Insertion-ordered set of message bodies already shown
#[derive(Debug, Default)]
pub struct DisplayedMessages {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl DisplayedMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the message was new
    pub fn insert(&mut self, message: &str) -> bool {
        if message.is_empty() || self.seen.contains(message) {
            return false;
        }
        self.seen.insert(message.to_string());
        self.ordered.push(message.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// The `n` most recent messages, oldest first
    pub fn latest(&self, n: usize) -> &[String] {
        let start = self.ordered.len().saturating_sub(n);
        &self.ordered[start..]
    }
}

/// Incremental reader over a growing log file
#[derive(Debug)]
pub struct LogTail {
    path: PathBuf,
    cursor: u64,
}

impl LogTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::from_offset(path, 0)
    }

    /// Skip everything before `offset`, e.g. lines left by a previous run
    pub fn from_offset(path: impl Into<PathBuf>, offset: u64) -> Self {
        Self {
            path: path.into(),
            cursor: offset,
        }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Read complete lines appended since the last call.
    ///
    /// A missing file yields nothing. A trailing line without its newline is
    /// left for the next poll. A file that shrank is re-read from the start.
    pub fn poll(&mut self) -> Result<Vec<String>> {
        let len = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to stat log: {}", self.path.display()))
            }
        };

        if len < self.cursor {
            self.cursor = 0;
        }
        if len == self.cursor {
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open log: {}", self.path.display()))?;
        file.seek(SeekFrom::Start(self.cursor))?;
        let mut chunk = Vec::with_capacity((len - self.cursor) as usize);
        file.take(len - self.cursor).read_to_end(&mut chunk)?;

        let Some(last_newline) = chunk.iter().rposition(|&b| b == b'\n') else {
            return Ok(Vec::new());
        };
        let complete = &chunk[..=last_newline];
        self.cursor += complete.len() as u64;

        Ok(String::from_utf8_lossy(complete)
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect())
    }

    /// Poll and fold new message bodies into `displayed`; returns how many were new
    pub fn poll_into(&mut self, displayed: &mut DisplayedMessages) -> Result<usize> {
        let mut added = 0;
        for line in self.poll()? {
            if displayed.insert(message_body(&line)) {
                added += 1;
            }
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn line_format_matches_logging_layout() {
        let ts = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap();
        let event = LogEvent {
            timestamp: ts,
            severity: Severity::Error,
            message: "Failed: 480p (x264 (CPU)) - Invalid argument".to_string(),
        };
        assert_eq!(
            event.to_line(),
            "2024-05-01 12:30:05 [ERROR]: Failed: 480p (x264 (CPU)) - Invalid argument"
        );
    }

    #[test]
    fn body_is_text_after_last_separator() {
        assert_eq!(
            message_body("2024-05-01 12:30:05 [INFO]: Completed: 720p (VP9 (CPU))\n"),
            "Completed: 720p (VP9 (CPU))"
        );
        assert_eq!(message_body("  raw stderr line  "), "raw stderr line");
    }

    #[test]
    fn appended_events_land_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fluidvid.log");
        let log = EventLog::open(&path).unwrap();
        log.append(&LogEvent::info("Completed: a")).unwrap();
        log.clone().append(&LogEvent::error("Failed: b - boom")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[INFO]: Completed: a"));
        assert!(lines[1].ends_with("[ERROR]: Failed: b - boom"));
    }

    #[test]
    fn reopening_appends_instead_of_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fluidvid.log");
        EventLog::open(&path).unwrap().append(&LogEvent::info("first")).unwrap();
        EventLog::open(&path).unwrap().append(&LogEvent::info("second")).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn writer_impl_terminates_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fluidvid.log");
        let mut log = EventLog::open(&path).unwrap();
        log.write_all(b"2024-05-01 12:00:00 [WARN]: no newline").unwrap();
        log.write_all(b"2024-05-01 12:00:01 [INFO]: with newline\n").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn tail_reads_only_new_complete_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fluidvid.log");
        let mut tail = LogTail::new(&path);

        // not created yet
        assert!(tail.poll().unwrap().is_empty());

        std::fs::write(&path, "x [INFO]: one\nx [INFO]: tw").unwrap();
        assert_eq!(tail.poll().unwrap(), vec!["x [INFO]: one"]);

        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"o\nx [INFO]: three\n").unwrap();
        assert_eq!(tail.poll().unwrap(), vec!["x [INFO]: two", "x [INFO]: three"]);
        assert!(tail.poll().unwrap().is_empty());
    }

    #[test]
    fn previous_run_is_skipped_from_start_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fluidvid.log");
        std::fs::write(
            &path,
            "2024-01-01 00:00:00 [ERROR]: Failed: 480p (VP9 (CPU)) - Unknown encoder\n\
             2024-01-01 00:00:01 [INFO]: Completed: old job\n",
        )
        .unwrap();

        let log = EventLog::open(&path).unwrap();
        assert_eq!(log.start_offset(), std::fs::metadata(&path).unwrap().len());

        let mut tail = LogTail::from_offset(log.path(), log.start_offset());
        let mut displayed = DisplayedMessages::new();
        assert_eq!(tail.poll_into(&mut displayed).unwrap(), 0);

        log.append(&LogEvent::error("Failed: 480p (VP9 (CPU)) - Unknown encoder")).unwrap();
        assert_eq!(tail.poll_into(&mut displayed).unwrap(), 1);
        assert_eq!(displayed.latest(10), ["Failed: 480p (VP9 (CPU)) - Unknown encoder"]);
    }

    #[test]
    fn tail_restarts_after_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fluidvid.log");
        std::fs::write(&path, "x [INFO]: long first line\n").unwrap();
        let mut tail = LogTail::new(&path);
        assert_eq!(tail.poll().unwrap().len(), 1);

        std::fs::write(&path, "x [INFO]: new\n").unwrap();
        assert_eq!(tail.poll().unwrap(), vec!["x [INFO]: new"]);
    }

    #[test]
    fn replaying_unchanged_log_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fluidvid.log");
        std::fs::write(
            &path,
            "t [INFO]: Completed: a\nt [ERROR]: Failed: b - x\nt [INFO]: Completed: a\n",
        )
        .unwrap();

        let mut displayed = DisplayedMessages::new();
        let mut tail = LogTail::new(&path);
        assert_eq!(tail.poll_into(&mut displayed).unwrap(), 2);
        for _ in 0..5 {
            assert_eq!(tail.poll_into(&mut displayed).unwrap(), 0);
        }
        assert_eq!(displayed.len(), 2);

        // a fresh tail over the same file still dedups against the set
        let mut replay = LogTail::new(&path);
        assert_eq!(replay.poll_into(&mut displayed).unwrap(), 0);
        assert_eq!(displayed.latest(10), ["Completed: a", "Failed: b - x"]);
    }

    #[test]
    fn latest_window_keeps_most_recent() {
        let mut displayed = DisplayedMessages::new();
        for m in ["a", "b", "c", "d"] {
            displayed.insert(m);
        }
        assert!(!displayed.insert(""));
        assert_eq!(displayed.latest(2), ["c", "d"]);
        assert_eq!(displayed.latest(0).len(), 0);
        assert_eq!(displayed.latest(99).len(), 4);
    }
}
