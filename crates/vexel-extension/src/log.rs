//! Shared diagnostic log for extension validation.
//!
//! One plain-text file per process, opened when the extension subsystem
//! comes up and closed when it goes down. Every validation failure from
//! every extension appends one human-readable line here; callers of
//! [`crate::Extension::check`] only ever see a boolean.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// File name of the diagnostic log inside the log directory.
pub const ERROR_LOG_FILENAME: &str = "extension-errors.log";

/// Append-only diagnostic log shared by all extensions.
pub struct ErrorLog {
    file: Mutex<Option<File>>,
    path: PathBuf,
}

impl ErrorLog {
    /// Open the log file inside `dir`.
    ///
    /// When the file cannot be created the subsystem keeps working and
    /// failure lines are dropped; troubleshooting output is not worth
    /// refusing to start over.
    pub fn open(dir: &Path) -> ErrorLog {
        let path = dir.join(ERROR_LOG_FILENAME);
        let file = match File::create(&path) {
            Ok(file) => Some(file),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "could not create extension error log");
                None
            }
        };
        ErrorLog {
            file: Mutex::new(file),
            path,
        }
    }

    /// A log that drops everything; for hosts that have no log
    /// directory.
    pub fn disabled() -> ErrorLog {
        ErrorLog {
            file: Mutex::new(None),
            path: PathBuf::new(),
        }
    }

    /// Append one line.
    pub fn append(&self, line: &str) {
        let mut file = self.file.lock();
        if let Some(file) = file.as_mut() {
            // A failed write on a best-effort log is not actionable.
            let _ = writeln!(file, "{line}");
            let _ = file.flush();
        }
    }

    /// Close the log; later appends are dropped.
    pub fn close(&self) {
        self.file.lock().take();
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::open(dir.path());

        log.append("first failure");
        log.append("second failure");
        log.close();
        log.append("after close");

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents, "first failure\nsecond failure\n");
    }

    #[test]
    fn test_unwritable_directory_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-subdir");
        let log = ErrorLog::open(&missing);
        // No panic, appends are dropped.
        log.append("line");
        assert!(!log.path().exists());
    }

    #[test]
    fn test_disabled_log() {
        let log = ErrorLog::disabled();
        log.append("line");
        log.close();
    }
}
