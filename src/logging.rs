// src/logging.rs
//
// Timestamped, level-tagged logging to stderr with an optional log file.

use std::fmt;
use std::path::Path;
use std::sync::Mutex;

/// Global log file handle. When `Some`, `tlog!` writes to both stderr and this file.
pub static LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);

/// Log severity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    /// Fixed-width tag so columns line up in the terminal
    pub fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERR ",
        }
    }
}

fn timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}

/// Render one log line (without trailing newline).
pub fn format_line(level: Level, args: fmt::Arguments<'_>) -> String {
    format!("[{}] [{}] {}", timestamp(), level.tag(), args)
}

/// Write a line to stderr and, when enabled, to the log file.
pub fn emit(level: Level, args: fmt::Arguments<'_>) {
    use std::io::Write as _;

    let msg = format_line(level, args);
    eprintln!("{}", msg);
    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(ref mut f) = *guard {
            let _ = writeln!(f, "{}", msg);
        }
    }
}

/// Initialise file logging to the given directory.
/// Creates a timestamped log file and a `bridge.log` symlink (Unix only).
pub fn init_file_logging(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| format!("Failed to create log dir: {}", e))?;

    let filename = chrono::Local::now()
        .format("%Y%m%d-%H%M%S-bridge.log")
        .to_string();
    let log_path = log_dir.join(&filename);

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| format!("Failed to create log file: {}", e))?;

    #[cfg(unix)]
    {
        let symlink_path = log_dir.join("bridge.log");
        let _ = std::fs::remove_file(&symlink_path);
        if let Err(e) = std::os::unix::fs::symlink(&filename, &symlink_path) {
            eprintln!(
                "{}",
                format_line(
                    Level::Warn,
                    format_args!("[logging] Failed to create bridge.log symlink: {}", e)
                )
            );
        }
    }

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }

    // eprintln directly: the file handle was just installed and would echo this line
    eprintln!(
        "{}",
        format_line(
            Level::Info,
            format_args!("[logging] File logging started: {}", log_path.display())
        )
    );

    Ok(())
}

/// Stop file logging and close the log file.
pub fn stop_file_logging() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if guard.is_some() {
            *guard = None;
            eprintln!(
                "{}",
                format_line(Level::Info, format_args!("[logging] File logging stopped"))
            );
        }
    }
}

/// Timestamped logging macro.
///
/// `tlog!("...")` logs at info level, `tlog!(warn: "...")` and
/// `tlog!(error: "...")` at the matching level.
#[macro_export]
macro_rules! tlog {
    (warn: $($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Level::Warn, format_args!($($arg)*))
    };
    (error: $($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Level::Error, format_args!($($arg)*))
    };
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Level::Info, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_tags() {
        let line = format_line(Level::Warn, format_args!("unknown topic: {}", "a/b"));
        assert!(line.contains("[WARN] unknown topic: a/b"));
        assert!(line.starts_with('['));

        let err = format_line(Level::Error, format_args!("x"));
        assert!(err.contains("[ERR ] x"));
    }

    #[test]
    fn test_file_logging_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        init_file_logging(dir.path()).unwrap();
        crate::tlog!("hello {}", 42);
        stop_file_logging();

        let logs: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with("-bridge.log"))
            .collect();
        assert_eq!(logs.len(), 1);
        let contents = std::fs::read_to_string(logs[0].path()).unwrap();
        assert!(contents.contains("[INFO] hello 42"));
    }
}
