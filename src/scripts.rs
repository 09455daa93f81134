//! Script harness behind the `build` command.
//!
//! A stage name maps to a shell script:
//!
//! ```text
//! <scripts_dir>/<arch>/<stage>.sh      # preferred
//! <scripts_dir>/common/<stage>.sh      # fallback
//! ```
//!
//! Scripts run under `sh` with three positional arguments: the invoking
//! process id, the base directory and the path of the script's own log
//! file. Their stdout and stderr go to that log file, which is appended to
//! the run log once the script ends.

use std::fmt;
use std::fs::File;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::ScriptError;
use crate::logging::LogFile;

const COMMON_DIR: &str = "common";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Why a script did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interruption {
    Exit(i32),
    Signal(i32),
    TimedOut(Duration),
}

impl fmt::Display for Interruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interruption::Exit(code) => write!(f, "exited with status {code}"),
            Interruption::Signal(sig) => write!(f, "killed by signal {sig}"),
            Interruption::TimedOut(after) => write!(f, "timed out after {}s", after.as_secs_f64()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    Completed,
    Interrupted(Interruption),
}

impl ScriptOutcome {
    fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            ScriptOutcome::Completed
        } else if let Some(code) = status.code() {
            ScriptOutcome::Interrupted(Interruption::Exit(code))
        } else {
            ScriptOutcome::Interrupted(Interruption::Signal(status.signal().unwrap_or_default()))
        }
    }
}

/// Runs stage scripts for one architecture.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    scripts_dir: PathBuf,
    base_dir: PathBuf,
    arch: String,
    log: LogFile,
    timeout: Duration,
}

impl ScriptRunner {
    pub fn new(
        scripts_dir: impl Into<PathBuf>,
        base_dir: impl Into<PathBuf>,
        arch: impl Into<String>,
        log: LogFile,
        timeout: Duration,
    ) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
            base_dir: base_dir.into(),
            arch: arch.into(),
            log,
            timeout,
        }
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Find the script for `stage`, preferring the architecture's own.
    pub fn locate(&self, stage: &str) -> Result<PathBuf, ScriptError> {
        let file = format!("{stage}.sh");
        let searched = vec![
            self.scripts_dir.join(&self.arch).join(&file),
            self.scripts_dir.join(COMMON_DIR).join(&file),
        ];
        match searched.iter().find(|p| p.is_file()) {
            Some(found) => Ok(found.clone()),
            None => Err(ScriptError::NotFound {
                stage: stage.to_string(),
                searched,
            }),
        }
    }

    /// Per-script log path: `<run log stem>-<stage>.log` next to the run log.
    fn script_log_path(&self, stage: &str) -> PathBuf {
        let run_log = self.log.path();
        let stem = run_log
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archconf".to_string());
        let dir = run_log.parent().unwrap_or_else(|| Path::new("."));
        dir.join(format!("{stem}-{stage}.log"))
    }

    /// Run one stage to completion, timeout or failure.
    pub fn run_stage(&self, stage: &str) -> Result<ScriptOutcome, ScriptError> {
        let script = self.locate(stage)?;
        let shell = which::which("sh")?;
        let script_log = LogFile::create(self.script_log_path(stage)).map_err(|e| {
            ScriptError::Io {
                context: format!("creating log for stage '{stage}'"),
                source: e,
            }
        })?;
        let (stdout, stderr) = redirect(script_log.path())?;

        info!("Running {} ({})", stage, script.display());
        let mut child = Command::new(shell)
            .arg(&script)
            .arg(std::process::id().to_string())
            .arg(&self.base_dir)
            .arg(script_log.path())
            .current_dir(&self.base_dir)
            .env("ARCHCONF_ARCH", &self.arch)
            .process_group(0)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|e| ScriptError::Spawn {
                script: script.clone(),
                source: e,
            })?;

        let outcome = self.wait(&mut child, &script)?;

        let label = script
            .strip_prefix(&self.scripts_dir)
            .unwrap_or(&script)
            .display()
            .to_string();
        script_log
            .save_to(&self.log, &label)
            .map_err(|e| ScriptError::Io {
                context: format!("appending output of '{label}' to the run log"),
                source: e,
            })?;

        match &outcome {
            ScriptOutcome::Completed => debug!("{label} completed"),
            ScriptOutcome::Interrupted(why) => warn!("{label} {why}"),
        }
        Ok(outcome)
    }

    fn wait(&self, child: &mut Child, script: &Path) -> Result<ScriptOutcome, ScriptError> {
        let start = Instant::now();
        loop {
            let polled = child.try_wait().map_err(|e| ScriptError::Io {
                context: format!("waiting for '{}'", script.display()),
                source: e,
            })?;
            if let Some(status) = polled {
                return Ok(ScriptOutcome::from_status(status));
            }
            if start.elapsed() > self.timeout {
                kill_group(child);
                let _ = child.wait();
                return Ok(ScriptOutcome::Interrupted(Interruption::TimedOut(
                    self.timeout,
                )));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// SIGKILL the script and everything it started; the script leads its own
/// process group.
fn kill_group(child: &mut Child) {
    match libc::pid_t::try_from(child.id()) {
        // SAFETY: plain syscall; a negative pid addresses the process group.
        Ok(pgid) if unsafe { libc::kill(-pgid, libc::SIGKILL) } == 0 => {}
        _ => {
            let _ = child.kill();
        }
    }
}

fn redirect(path: &Path) -> Result<(Stdio, Stdio), ScriptError> {
    let io_err = |e| ScriptError::Io {
        context: format!("opening script log '{}'", path.display()),
        source: e,
    };
    let file = File::options().append(true).open(path).map_err(io_err)?;
    let err = file.try_clone().map_err(io_err)?;
    Ok((Stdio::from(file), Stdio::from(err)))
}
