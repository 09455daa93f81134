//! File placement commands: `copy` and `move`.
//!
//! Both take `sources... destination`. Preconditions are checked before
//! anything on disk changes:
//! - at least one source is required;
//! - more than one source requires the destination to be an existing
//!   directory;
//! - every source must exist;
//! - no source may be its own target, and no directory may land inside
//!   itself.
//!
//! When the destination is a directory each source lands at
//! `destination/<basename>`.

use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use super::{Command, ExecContext};
use crate::error::HandlerError;

/// `copy -- sources... destination`
#[derive(Debug, Clone, Default)]
pub struct CopyFiles;

impl Command for CopyFiles {
    fn name(&self) -> &str {
        "copy"
    }

    fn run(&self, args: &[String], ctx: &mut ExecContext<'_>) -> Result<(), HandlerError> {
        let plan = Placement::check(self.name(), args, ctx)?;
        for (source, target) in plan.moves {
            debug!("copy {} -> {}", source.display(), target.display());
            copy_path(&source, &target)?;
        }
        Ok(())
    }
}

/// `move -- sources... destination`
#[derive(Debug, Clone, Default)]
pub struct MoveFiles;

impl Command for MoveFiles {
    fn name(&self) -> &str {
        "move"
    }

    fn run(&self, args: &[String], ctx: &mut ExecContext<'_>) -> Result<(), HandlerError> {
        let plan = Placement::check(self.name(), args, ctx)?;
        for (source, target) in plan.moves {
            debug!("move {} -> {}", source.display(), target.display());
            move_path(&source, &target)?;
        }
        Ok(())
    }
}

/// Validated `(source, target)` pairs of a copy/move.
#[derive(Debug)]
struct Placement {
    moves: Vec<(PathBuf, PathBuf)>,
}

impl Placement {
    fn check(command: &str, args: &[String], ctx: &ExecContext<'_>) -> Result<Self, HandlerError> {
        let Some((destination, sources)) = args.split_last() else {
            return Err(HandlerError::NoSources {
                command: command.to_string(),
            });
        };
        let destination = ctx.resolve(destination);
        let into_dir = destination.is_dir();

        if !into_dir && sources.len() > 1 {
            return Err(HandlerError::NotADirectory {
                command: command.to_string(),
                destination,
                count: sources.len(),
            });
        }
        if sources.is_empty() {
            return Err(HandlerError::NoSources {
                command: command.to_string(),
            });
        }

        let sources: Vec<PathBuf> = sources.iter().map(|s| ctx.resolve(s)).collect();
        if let Some(missing) = sources.iter().find(|s| fs::symlink_metadata(s).is_err()) {
            return Err(HandlerError::SourceMissing {
                command: command.to_string(),
                path: missing.clone(),
            });
        }

        let mut moves = Vec::with_capacity(sources.len());
        for source in sources {
            let target = target_for(command, &source, &destination, into_dir)?;
            check_overlap(command, &source, &target)?;
            moves.push((source, target));
        }
        Ok(Self { moves })
    }
}

fn target_for(
    command: &str,
    source: &Path,
    destination: &Path,
    into_dir: bool,
) -> Result<PathBuf, HandlerError> {
    if !into_dir {
        return Ok(destination.to_path_buf());
    }
    let name = source.file_name().ok_or_else(|| {
        HandlerError::io(
            format!("{command}: cannot derive a file name from '{}'", source.display()),
            io::Error::from(io::ErrorKind::InvalidInput),
        )
    })?;
    Ok(destination.join(name))
}

/// Reject a target that is the source itself, or lies inside a source
/// directory.
fn check_overlap(command: &str, source: &Path, target: &Path) -> Result<(), HandlerError> {
    if let (Ok(src), Ok(dst)) = (fs::metadata(source), fs::metadata(target)) {
        if src.dev() == dst.dev() && src.ino() == dst.ino() {
            return Err(HandlerError::SameFile {
                command: command.to_string(),
                path: source.to_path_buf(),
            });
        }
    }
    if source.is_dir() {
        let dir = canonical(source);
        let destination = canonical(target);
        if destination.starts_with(&dir) {
            return Err(HandlerError::IntoItself {
                command: command.to_string(),
                dir,
                destination,
            });
        }
    }
    Ok(())
}

/// Canonical form of a path that may not exist yet: the deepest existing
/// ancestor is canonicalized and the rest re-joined.
fn canonical(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => canonical(parent).join(name),
        _ => path.to_path_buf(),
    }
}

/// Copy a file or a whole tree to `dst`.
pub fn copy_path(src: &Path, dst: &Path) -> Result<(), HandlerError> {
    check_overlap("copy", src, dst)?;
    if src.is_dir() {
        copy_tree(src, dst)
    } else {
        copy_file(src, dst)
    }
}

/// Copy one file, creating the destination's parent directories.
pub fn copy_file(src: &Path, dst: &Path) -> Result<(), HandlerError> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            HandlerError::io(format!("creating directory '{}'", parent.display()), e)
        })?;
    }
    fs::copy(src, dst).map_err(|e| {
        HandlerError::io(
            format!("copying '{}' to '{}'", src.display(), dst.display()),
            e,
        )
    })?;
    Ok(())
}

/// Recursively copy a directory tree, preserving symlinks.
///
/// An existing destination directory is merged into.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<(), HandlerError> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry
            .map_err(|e| HandlerError::io(format!("walking '{}'", src.display()), e))?;
        let rel = entry.path().strip_prefix(src).map_err(|_| {
            HandlerError::io(
                format!("'{}' escaped '{}'", entry.path().display(), src.display()),
                io::Error::from(io::ErrorKind::InvalidData),
            )
        })?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| {
                HandlerError::io(format!("creating directory '{}'", target.display()), e)
            })?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path()).map_err(|e| {
                HandlerError::io(format!("reading symlink '{}'", entry.path().display()), e)
            })?;
            if fs::symlink_metadata(&target).is_ok() {
                fs::remove_file(&target).map_err(|e| {
                    HandlerError::io(format!("replacing '{}'", target.display()), e)
                })?;
            }
            std::os::unix::fs::symlink(&link, &target).map_err(|e| {
                HandlerError::io(format!("creating symlink '{}'", target.display()), e)
            })?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| {
                HandlerError::io(
                    format!(
                        "copying '{}' to '{}'",
                        entry.path().display(),
                        target.display()
                    ),
                    e,
                )
            })?;
        }
    }
    Ok(())
}

/// Move a file or tree, falling back to copy + remove across filesystems.
pub fn move_path(src: &Path, dst: &Path) -> Result<(), HandlerError> {
    check_overlap("move", src, dst)?;
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
            copy_path(src, dst)?;
            let removed = if src.is_dir() {
                fs::remove_dir_all(src)
            } else {
                fs::remove_file(src)
            };
            removed.map_err(|e| HandlerError::io(format!("removing '{}'", src.display()), e))
        }
        Err(e) => Err(HandlerError::io(
            format!("moving '{}' to '{}'", src.display(), dst.display()),
            e,
        )),
    }
}
