//! Per-architecture build-configuration interpreter.
//!
//! A configuration file under `configs/arch/<arch>` describes the
//! filesystem setup for one architecture's kernel/OS build in a small
//! line-oriented language:
//!
//! ```text
//! ?out -- ?base/out/?arch
//! mkdir -- ?out/boot
//! copy -- configs/boot/grub.cfg ?out/boot
//! echo -- "staging ready"
//! build -- toolchain compile
//! ```
//!
//! # Architecture
//!
//! ```text
//! text ──▶ lang::lexer ──▶ lang::grouper ──▶ lang::queue ──▶ executor
//!           (tokens)        (statements)      (commands)       │
//!                                                              ├── copy / move / mkdir / echo
//!                                                              └── build ──▶ scripts (sh, timeout)
//! ```
//!
//! - [`lang`]: parsing. Problems become diagnostics and skip the statement.
//! - [`executor`]: the [`executor::Command`] trait, registry and runner.
//!   An unknown command is skipped; a failing command ends the run.
//! - [`interpreter`]: one file end to end, with predefined variables.
//! - [`scripts`]: the shell harness behind `build`.
//! - [`arch`], [`config`], [`logging`]: host architecture, settings and
//!   the leveled log sink with its per-run file.
//!
//! # Example
//!
//! ```rust,ignore
//! use archconf::{Interpreter, InterpreterConfig};
//!
//! let config = InterpreterConfig::load("/srv/build", None)?;
//! let interp = Interpreter::new(config, "arm64");
//! let parsed = interp.load()?;
//! interp.execute(&parsed.queue, &mut std::io::stdout())?;
//! ```

pub mod arch;
pub mod config;
pub mod error;
pub mod executor;
pub mod interpreter;
pub mod lang;
pub mod logging;
pub mod scripts;

pub use arch::ArchResolver;
pub use config::{InterpreterConfig, ScriptSettings};
pub use error::{ExecError, GroupError, HandlerError, LexError, ScriptError};
pub use executor::{Command, ExecContext, Executor, Registry, RunReport};
pub use interpreter::Interpreter;
pub use lang::{parse, CommandQueue, Parsed, QueueEntry, Variables};
pub use logging::LogFile;
pub use scripts::{ScriptOutcome, ScriptRunner};
