//! Wire-traffic logging.
//!
//! Optional append-only record of every protocol line exchanged with the
//! engine, one file per session. Disabled unless the session config names
//! a log directory.

use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Thread-safe handle to a session's wire log. Cloning shares the file.
#[derive(Clone)]
pub struct WireLog {
    file: Arc<Mutex<Option<File>>>,
}

impl WireLog {
    /// Open (or create) `{dir}/{session_id}.log`. A `None` directory, or
    /// any failure to open the file, yields a disabled log - wire logging
    /// is an observability aid and never blocks the session.
    pub fn open(dir: Option<&str>, session_id: &str) -> Self {
        let file = dir.and_then(|dir| {
            std::fs::create_dir_all(dir).ok()?;
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(Path::new(dir).join(format!("{}.log", session_id)))
                .ok()
        });
        if dir.is_some() && file.is_none() {
            log::warn!("could not open wire log for session {}", session_id);
        }
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }

    /// A log that drops everything.
    pub fn disabled() -> Self {
        Self {
            file: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.lock().map(|f| f.is_some()).unwrap_or(false)
    }

    /// Record a line sent to the engine.
    pub fn sent(&self, line: &str) {
        self.write(">>", line);
    }

    /// Record a line received from the engine.
    pub fn received(&self, line: &str) {
        self.write("<<", line);
    }

    /// Record a lifecycle note (spawn, exit, termination).
    pub fn note(&self, text: &str) {
        self.write("--", text);
    }

    fn write(&self, direction: &str, data: &str) {
        if let Ok(mut guard) = self.file.lock() {
            if let Some(ref mut file) = *guard {
                let ts = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
                let _ = writeln!(file, "[{}] {} {}", ts, direction, data);
                let _ = file.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn open_creates_log_file() {
        let dir = tempdir().unwrap();
        let log = WireLog::open(dir.path().to_str(), "abc");
        assert!(log.is_enabled());
        assert!(dir.path().join("abc.log").exists());
    }

    #[test]
    fn none_dir_disables_logging() {
        let log = WireLog::open(None, "abc");
        assert!(!log.is_enabled());
        // Writes must be silent no-ops.
        log.sent("uai");
        log.received("uaiok");
        log.note("nothing happened");
    }

    #[test]
    fn disabled_log_is_disabled() {
        assert!(!WireLog::disabled().is_enabled());
    }

    #[test]
    fn records_direction_and_timestamp() {
        let dir = tempdir().unwrap();
        let log = WireLog::open(dir.path().to_str(), "session");
        log.sent("uai");
        log.received("uaiok");
        log.note("engine exited");

        let mut contents = String::new();
        File::open(dir.path().join("session.log"))
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();

        assert!(contents.contains(">> uai"));
        assert!(contents.contains("<< uaiok"));
        assert!(contents.contains("-- engine exited"));
        // ISO 8601 UTC timestamps.
        for line in contents.lines() {
            assert!(line.starts_with('['));
            assert!(line.contains("Z]"));
        }
    }

    #[test]
    fn clones_share_the_file() {
        let dir = tempdir().unwrap();
        let log = WireLog::open(dir.path().to_str(), "shared");
        let clone = log.clone();
        log.sent("one");
        clone.sent("two");

        let mut contents = String::new();
        File::open(dir.path().join("shared.log"))
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert!(contents.contains("one"));
        assert!(contents.contains("two"));
    }
}
