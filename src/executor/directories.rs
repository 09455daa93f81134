//! Directory creation: `mkdir -- paths...`

use std::fs;
use std::path::Path;

use log::debug;

use super::{Command, ExecContext};
use crate::error::HandlerError;

/// `mkdir -- paths...`
///
/// Creates each path with its missing parents. Existing directories are
/// left alone, so running the same statement twice is harmless.
#[derive(Debug, Clone, Default)]
pub struct Mkdir;

impl Command for Mkdir {
    fn name(&self) -> &str {
        "mkdir"
    }

    fn run(&self, args: &[String], ctx: &mut ExecContext<'_>) -> Result<(), HandlerError> {
        for arg in args {
            create_dir(&ctx.resolve(arg))?;
        }
        Ok(())
    }
}

/// Create a directory and its parents.
pub fn create_dir(path: &Path) -> Result<(), HandlerError> {
    debug!("mkdir {}", path.display());
    fs::create_dir_all(path)
        .map_err(|e| HandlerError::io(format!("creating directory '{}'", path.display()), e))
}
