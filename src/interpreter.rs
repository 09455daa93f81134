//! One configuration file, end to end.
//!
//! An [`Interpreter`] owns everything needed to turn `configs/arch/<arch>`
//! into side effects: the predefined variables, the parsed queue and an
//! executor whose `build` command is wired to the script harness when
//! scripts are enabled. Interpreters share no state with each other.

use std::error::Error as _;
use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::config::InterpreterConfig;
use crate::error::ExecError;
use crate::executor::build::Build;
use crate::executor::{Executor, Registry, RunReport};
use crate::lang::{self, CommandQueue, Parsed, Variables};
use crate::logging::LogFile;
use crate::scripts::ScriptRunner;

pub struct Interpreter {
    config: InterpreterConfig,
    arch: String,
    log: Option<LogFile>,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig, arch: impl Into<String>) -> Self {
        Self {
            config,
            arch: arch.into(),
            log: None,
        }
    }

    /// Attach the run log; scripts append their output to it.
    pub fn with_log(mut self, log: LogFile) -> Self {
        self.log = Some(log);
        self
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// `configs/arch/<arch>` under the base directory.
    pub fn config_path(&self) -> PathBuf {
        self.config.arch_config_dir().join(&self.arch)
    }

    /// Variables bound before the first statement: `arch`, `base`, `log`
    /// and every configured definition.
    pub fn predefined(&self) -> Variables {
        let mut vars = Variables::new();
        vars.set("arch", self.arch.as_str());
        vars.set("base", self.config.base_dir.display().to_string());
        if let Some(log) = &self.log {
            vars.set("log", log.path().display().to_string());
        }
        for (name, value) in &self.config.variables {
            vars.set(name.as_str(), value.as_str());
        }
        vars
    }

    /// Read and parse the architecture's configuration file.
    pub fn load(&self) -> Result<Parsed> {
        let path = self.config_path();
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading configuration '{}'", path.display()))?;
        Ok(self.parse(&text))
    }

    /// Parse configuration text with the predefined variables bound.
    pub fn parse(&self, text: &str) -> Parsed {
        let parsed = lang::parse(text, self.predefined());
        if !parsed.diagnostics.is_empty() {
            warn!(
                "{} problem(s) in configuration for {}; affected statements were skipped",
                parsed.diagnostics.len(),
                self.arch
            );
        }
        debug!("{} queued command(s) for {}", parsed.queue.len(), self.arch);
        parsed
    }

    /// The default commands, with `build` attached to the harness when
    /// scripts are enabled and a run log exists.
    pub fn registry(&self) -> Registry {
        let mut registry = Registry::with_defaults();
        let scripts = &self.config.scripts;
        match (&self.log, scripts.enabled) {
            (Some(log), true) => {
                let runner = ScriptRunner::new(
                    self.config.scripts_dir(),
                    &self.config.base_dir,
                    &self.arch,
                    log.clone(),
                    scripts.timeout(),
                );
                registry.register(Build::with_runner(runner, scripts.default_stages.clone()));
            }
            (None, true) => warn!("scripts are enabled but there is no run log; build is a no-op"),
            _ => {}
        }
        registry
    }

    /// Execute a parsed queue against the base directory.
    pub fn execute(
        &self,
        queue: &CommandQueue,
        stdout: &mut dyn Write,
    ) -> Result<RunReport, ExecError> {
        let executor = Executor::new(self.registry(), &self.config.base_dir);
        let report = executor.execute(queue, stdout)?;
        info!(
            "{}: {} command(s) executed, {} skipped",
            self.arch,
            report.executed,
            report.skipped.len()
        );
        Ok(report)
    }
}

/// Render the queue with the failed entry marked.
pub fn describe_queue(queue: &CommandQueue, failed: Option<usize>) -> String {
    let mut out = String::from("command queue:");
    for (index, entry) in queue.iter().enumerate() {
        let marker = if Some(index) == failed { ">>" } else { "  " };
        let _ = write!(out, "\n{marker} [{index}] line {}: {entry}", entry.line);
    }
    out
}

/// Fatal report for a failed run: the error chain, the queue and where the
/// run log is.
pub fn describe_failure(queue: &CommandQueue, err: &ExecError, log: Option<&Path>) -> String {
    let mut out = format!("{err}");
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(out, "\ncaused by: {cause}");
        source = cause.source();
    }
    out.push('\n');
    out.push_str(&describe_queue(queue, Some(err.index())));
    if let Some(log) = log {
        let _ = write!(out, "\nrun log: {}", log.display());
    }
    out
}
