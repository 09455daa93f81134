//! Leveled console output plus a per-run log file.
//!
//! The `log` facade carries six severities:
//!
//! | severity  | `log` level               | prefix |
//! |-----------|---------------------------|--------|
//! | debug     | `Debug`                   | `[~]`  |
//! | verbose   | `Trace`                   | `[.]`  |
//! | info      | `Info`                    | `[*]`  |
//! | warning   | `Warn`                    | `[!]`  |
//! | error     | `Error`                   | `[@]`  |
//! | fatal     | `Error`, target `fatal`   | `[&]`  |
//!
//! Continuation lines of a multi-line message get `` [`] `` instead.
//! Console output goes to stderr so `echo` output on stdout stays clean.
//! Every line, whatever the console filter, is appended to the run log.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use time::OffsetDateTime;

/// Target that turns an error record into a fatal one.
pub const FATAL_TARGET: &str = "fatal";

const CONTINUATION: &str = "[`]";

static RUN_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Verbose,
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn of(level: Level, target: &str) -> Self {
        match level {
            Level::Trace => Severity::Verbose,
            Level::Debug => Severity::Debug,
            Level::Info => Severity::Info,
            Level::Warn => Severity::Warning,
            Level::Error if target == FATAL_TARGET => Severity::Fatal,
            Level::Error => Severity::Error,
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            Severity::Debug => "[~]",
            Severity::Verbose => "[.]",
            Severity::Info => "[*]",
            Severity::Warning => "[!]",
            Severity::Error => "[@]",
            Severity::Fatal => "[&]",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Debug => "debug",
            Severity::Verbose => "verbose",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Prefix the first line with the severity marker and the rest with the
/// continuation marker.
pub fn format_message(severity: Severity, message: &str) -> String {
    let mut out = String::new();
    for (i, line) in message.lines().enumerate() {
        if i > 0 {
            out.push('\n');
            out.push_str(CONTINUATION);
        } else {
            out.push_str(severity.prefix());
        }
        out.push(' ');
        out.push_str(line);
    }
    if out.is_empty() {
        out.push_str(severity.prefix());
    }
    out
}

/// Log a fatal message.
pub fn fatal(message: impl fmt::Display) {
    log::error!(target: FATAL_TARGET, "{message}");
}

/// An append-only, line-stamped log file.
///
/// The file is reopened for every write, so clones of the same `LogFile`
/// can be handed to the script harness while the logger keeps its own.
#[derive(Debug, Clone)]
pub struct LogFile {
    path: PathBuf,
    start: Instant,
}

impl LogFile {
    /// Create (or truncate) the file, making its parent directories.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        File::create(&path)?;
        Ok(Self {
            path,
            start: Instant::now(),
        })
    }

    /// `<log_dir>/archconf-<run id>.log`
    pub fn for_run(log_dir: &Path, run_id: &str) -> io::Result<Self> {
        Self::create(log_dir.join(format!("archconf-{run_id}.log")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `data`, one stamped line per input line.
    pub fn write_log(&self, data: &str) -> io::Result<()> {
        let stamp = self.stamp();
        let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        let mut buf = String::new();
        for line in data.lines() {
            buf.push_str(&stamp);
            buf.push(' ');
            buf.push_str(line);
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())
    }

    /// Whole file contents, trailing whitespace removed.
    pub fn read_log(&self) -> io::Result<String> {
        let text = fs::read_to_string(&self.path)?;
        Ok(text.trim_end().to_string())
    }

    /// Append this file's contents to `parent` under a header naming
    /// `label`.
    pub fn save_to(&self, parent: &LogFile, label: &str) -> io::Result<()> {
        let contents = self.read_log()?;
        parent.write_log(&format!("Output of {label}:"))?;
        if !contents.is_empty() {
            parent.write_log(&contents)?;
        }
        Ok(())
    }

    fn stamp(&self) -> String {
        let now = OffsetDateTime::now_utc();
        format!(
            "[{:04}-{:02}-{:02} {:02}:{:02}:{:02} (+{:.3}s)]",
            now.year(),
            now.month() as u8,
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            self.start.elapsed().as_secs_f64()
        )
    }
}

/// Sortable base62 identifier for one invocation.
pub fn run_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let pid = (std::process::id() as u128) << 16;
    let seq = (RUN_ID_COUNTER.fetch_add(1, Ordering::Relaxed) as u128) & 0xFFFF;
    base62((nanos << 32) | pid | seq)
}

fn base62(mut value: u128) -> String {
    const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ALPHABET[(value % 62) as usize] as char);
        value /= 62;
    }
    digits.iter().rev().collect()
}

/// Console verbosity switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verbosity {
    pub debug: bool,
    pub verbose: bool,
}

impl Verbosity {
    fn shows(self, severity: Severity) -> bool {
        match severity {
            Severity::Debug => self.debug,
            Severity::Verbose => self.verbose,
            _ => true,
        }
    }
}

struct ConsoleLogger {
    verbosity: Verbosity,
    file: Option<Mutex<LogFile>>,
}

impl Log for ConsoleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let severity = Severity::of(record.level(), record.target());
        let message = format_message(severity, &record.args().to_string());

        if self.verbosity.shows(severity) {
            let _ = writeln!(io::stderr().lock(), "{message}");
        }
        if let Some(ref file) = self.file {
            let _ = file.lock().write_log(&message);
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

/// Install the process-wide logger.
///
/// `RUST_LOG`, when it parses as a level filter, caps what reaches the
/// logger at all. Fails if a logger is already installed.
pub fn init(verbosity: Verbosity, file: Option<LogFile>) -> Result<(), log::SetLoggerError> {
    let cap = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LevelFilter::Trace);

    log::set_boxed_logger(Box::new(ConsoleLogger {
        verbosity,
        file: file.map(Mutex::new),
    }))?;
    log::set_max_level(cap);
    Ok(())
}

/// Whether [`init`] has run.
pub fn is_initialized() -> bool {
    log::max_level() != LevelFilter::Off
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_severity_mapping() {
        assert_eq!(Severity::of(Level::Trace, "archconf"), Severity::Verbose);
        assert_eq!(Severity::of(Level::Debug, "archconf"), Severity::Debug);
        assert_eq!(Severity::of(Level::Error, "archconf"), Severity::Error);
        assert_eq!(Severity::of(Level::Error, FATAL_TARGET), Severity::Fatal);
        assert_eq!(Severity::of(Level::Warn, FATAL_TARGET), Severity::Warning);
    }

    #[test]
    fn test_format_message_prefixes() {
        assert_eq!(format_message(Severity::Info, "hello"), "[*] hello");
        assert_eq!(
            format_message(Severity::Fatal, "queue:\n  mkdir\n  copy"),
            "[&] queue:\n[`]   mkdir\n[`]   copy"
        );
        assert_eq!(format_message(Severity::Warning, ""), "[!]");
    }

    #[test]
    fn test_verbosity_filters_debug_and_verbose_only() {
        let quiet = Verbosity::default();
        assert!(!quiet.shows(Severity::Debug));
        assert!(!quiet.shows(Severity::Verbose));
        assert!(quiet.shows(Severity::Info));
        assert!(quiet.shows(Severity::Fatal));

        let loud = Verbosity {
            debug: true,
            verbose: true,
        };
        assert!(loud.shows(Severity::Debug));
        assert!(loud.shows(Severity::Verbose));
    }

    #[test]
    fn test_write_log_stamps_every_line() {
        let temp = TempDir::new().unwrap();
        let log = LogFile::create(temp.path().join("logs/run.log")).unwrap();

        log.write_log("first\nsecond").unwrap();
        let text = log.read_log().unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        for (line, body) in lines.iter().zip(["first", "second"]) {
            assert!(line.starts_with('['), "{line}");
            assert!(line.contains("s)] "), "{line}");
            assert!(line.ends_with(body), "{line}");
        }
    }

    #[test]
    fn test_save_to_appends_under_header() {
        let temp = TempDir::new().unwrap();
        let parent = LogFile::create(temp.path().join("run.log")).unwrap();
        let child = LogFile::create(temp.path().join("run-compile.log")).unwrap();
        child.write_log("compiled").unwrap();

        child.save_to(&parent, "x86/compile.sh").unwrap();

        let text = parent.read_log().unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Output of x86/compile.sh:"));
        assert!(lines[1].ends_with("compiled"));
    }

    #[test]
    fn test_create_truncates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("run.log");
        fs::write(&path, "stale\n").unwrap();

        let log = LogFile::create(&path).unwrap();
        assert_eq!(log.read_log().unwrap(), "");
    }

    #[test]
    fn test_run_ids_are_distinct_base62() {
        let a = run_id();
        let b = run_id();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(base62(0), "0");
        assert_eq!(base62(61), "z");
        assert_eq!(base62(62), "10");
    }
}
