//! Error types shared across the interpreter stages.
//!
//! Parse-stage errors ([`LexError`], [`GroupError`]) are diagnostics: the
//! offending character or statement is skipped and interpretation goes on.
//! Execution-stage errors ([`ExecError`]) carry the continue/abort rule in
//! [`ExecError::is_fatal`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// An input character with no entry in the lexer table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown symbol {ch:?} at offset {offset} (line {line})")]
pub struct LexError {
    pub ch: char,
    /// Character offset into the input.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
}

/// A statement that could not be turned into a queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    #[error("line {line}: statement has no command name")]
    MissingCommand { line: usize },

    #[error("line {line}: undefined variable '{name}'")]
    UndefinedVariable { name: String, line: usize },

    #[error("line {line}: variable reference without a name")]
    EmptyVariableName { line: usize },

    #[error("line {line}: variable reference is missing its closing ')'")]
    UnclosedReference { line: usize },

    #[error("line {line}: unterminated quote")]
    UnterminatedQuote { line: usize },
}

impl GroupError {
    pub fn line(&self) -> usize {
        match self {
            GroupError::MissingCommand { line }
            | GroupError::UndefinedVariable { line, .. }
            | GroupError::EmptyVariableName { line }
            | GroupError::UnclosedReference { line }
            | GroupError::UnterminatedQuote { line } => *line,
        }
    }
}

/// Failure inside a command handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{command}: destination is not set (no sources given)")]
    NoSources { command: String },

    #[error("{command}: destination '{}' is not a directory, cannot place {count} sources into it", destination.display())]
    NotADirectory {
        command: String,
        destination: PathBuf,
        count: usize,
    },

    #[error("{command}: source not found: {}", path.display())]
    SourceMissing { command: String, path: PathBuf },

    #[error("{command}: '{}' and its destination are the same file", path.display())]
    SameFile { command: String, path: PathBuf },

    #[error("{command}: cannot place directory '{}' inside itself at '{}'", dir.display(), destination.display())]
    IntoItself {
        command: String,
        dir: PathBuf,
        destination: PathBuf,
    },

    #[error("build stage '{stage}' was interrupted: {reason}")]
    BuildInterrupted { stage: String, reason: String },

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl HandlerError {
    pub(crate) fn io(context: impl Into<String>, source: impl Into<io::Error>) -> Self {
        HandlerError::Io {
            context: context.into(),
            source: source.into(),
        }
    }
}

/// Error raised while executing a command queue.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("unresolved command '{command}' (entry {index}, line {line})")]
    UnknownCommand {
        index: usize,
        command: String,
        line: usize,
    },

    #[error("command '{command}' failed (entry {index}, line {line})")]
    Handler {
        index: usize,
        command: String,
        line: usize,
        #[source]
        source: HandlerError,
    },
}

impl ExecError {
    /// Whether execution must stop.
    ///
    /// A name missing from the registry only skips that entry; a handler
    /// failure may have left the filesystem half-mutated and ends the run.
    pub fn is_fatal(&self) -> bool {
        match self {
            ExecError::UnknownCommand { .. } => false,
            ExecError::Handler { .. } => true,
        }
    }

    /// Index of the queue entry that raised the error.
    pub fn index(&self) -> usize {
        match self {
            ExecError::UnknownCommand { index, .. } | ExecError::Handler { index, .. } => *index,
        }
    }
}

/// Failure of the script-execution harness itself.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("no script for stage '{stage}'; searched: {}", display_paths(searched))]
    NotFound {
        stage: String,
        searched: Vec<PathBuf>,
    },

    #[error("no shell to run build scripts with")]
    Shell(#[from] which::Error),

    #[error("failed to run script '{}'", script.display())]
    Spawn {
        script: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
