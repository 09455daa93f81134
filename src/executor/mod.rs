//! Command executor - dispatches queue entries to registered commands.
//!
//! Commands implement [`Command`] and are looked up by name in a
//! [`Registry`] built at startup. The default registry carries the five
//! built-in commands:
//!
//! | name    | module          | effect                                  |
//! |---------|-----------------|-----------------------------------------|
//! | `copy`  | [`files`]       | copy files or trees into place          |
//! | `move`  | [`files`]       | relocate files or trees                 |
//! | `mkdir` | [`directories`] | create directories (idempotent)         |
//! | `echo`  | [`output`]      | print arguments                         |
//! | `build` | [`build`]       | hand off to the script harness          |
//!
//! # Usage
//!
//! ```rust,ignore
//! use archconf::executor::{Executor, Registry};
//! use archconf::lang::{parse, Variables};
//!
//! let parsed = parse("mkdir -- out\necho -- done\n", Variables::new());
//! let executor = Executor::new(Registry::with_defaults(), "/srv/build");
//! executor.execute(&parsed.queue, &mut std::io::stdout())?;
//! ```

pub mod build;
pub mod directories;
pub mod files;
pub mod output;

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{error, trace};

use crate::error::{ExecError, HandlerError};
use crate::lang::CommandQueue;

/// State handed to a command while it runs.
pub struct ExecContext<'a> {
    /// Directory relative paths resolve against.
    pub cwd: &'a Path,
    /// Destination for command output.
    pub stdout: &'a mut dyn Write,
}

impl ExecContext<'_> {
    /// Resolve a command argument to a path.
    pub fn resolve(&self, arg: &str) -> PathBuf {
        self.cwd.join(arg)
    }
}

/// A named command the executor can dispatch to.
pub trait Command {
    /// Name used in configuration files.
    fn name(&self) -> &str;

    /// Run with the entry's positional arguments.
    fn run(&self, args: &[String], ctx: &mut ExecContext<'_>) -> Result<(), HandlerError>;
}

/// Name → command mapping.
#[derive(Default)]
pub struct Registry {
    commands: HashMap<String, Box<dyn Command>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `copy`, `echo`, `mkdir`, `move` and a harness-less
    /// `build`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(files::CopyFiles);
        registry.register(output::Echo);
        registry.register(directories::Mkdir);
        registry.register(files::MoveFiles);
        registry.register(build::Build::placeholder());
        registry
    }

    /// Register a command, replacing any command with the same name.
    pub fn register(&mut self, command: impl Command + 'static) {
        let name = command.name().to_string();
        self.commands.insert(name, Box::new(command));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(|c| c.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.commands.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("commands", &self.names())
            .finish()
    }
}

/// Summary of a completed run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Entries whose command ran successfully.
    pub executed: usize,
    /// Non-fatal errors, in queue order.
    pub skipped: Vec<ExecError>,
}

/// Runs a [`CommandQueue`] top to bottom.
#[derive(Debug)]
pub struct Executor {
    registry: Registry,
    cwd: PathBuf,
}

impl Executor {
    pub fn new(registry: Registry, cwd: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            cwd: cwd.into(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Execute every entry in order.
    ///
    /// Unknown commands are logged and skipped. The first handler failure
    /// stops execution and is returned; later entries do not run.
    pub fn execute(
        &self,
        queue: &CommandQueue,
        stdout: &mut dyn Write,
    ) -> Result<RunReport, ExecError> {
        let mut report = RunReport::default();
        let mut ctx = ExecContext {
            cwd: &self.cwd,
            stdout,
        };

        for (index, entry) in queue.iter().enumerate() {
            let outcome = match self.registry.get(&entry.command) {
                None => Err(ExecError::UnknownCommand {
                    index,
                    command: entry.command.clone(),
                    line: entry.line,
                }),
                Some(command) => {
                    trace!("[{index}] {entry}");
                    command
                        .run(&entry.args, &mut ctx)
                        .map_err(|source| ExecError::Handler {
                            index,
                            command: entry.command.clone(),
                            line: entry.line,
                            source,
                        })
                }
            };

            match outcome {
                Ok(()) => report.executed += 1,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    error!("{err}");
                    report.skipped.push(err);
                }
            }
        }

        Ok(report)
    }
}
