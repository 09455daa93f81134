//! `build -- stages...`, the terminal step of a configuration file.

use log::info;

use super::{Command, ExecContext};
use crate::error::HandlerError;
use crate::scripts::{ScriptOutcome, ScriptRunner};

/// Hands the named stages to the script harness.
///
/// Without a harness it only records that the build was reached.
#[derive(Debug, Clone, Default)]
pub struct Build {
    harness: Option<ScriptRunner>,
    default_stages: Vec<String>,
}

impl Build {
    pub fn placeholder() -> Self {
        Self::default()
    }

    /// Run stages through `runner`; `default_stages` apply to a bare
    /// `build` statement.
    pub fn with_runner(runner: ScriptRunner, default_stages: Vec<String>) -> Self {
        Self {
            harness: Some(runner),
            default_stages,
        }
    }
}

impl Command for Build {
    fn name(&self) -> &str {
        "build"
    }

    fn run(&self, args: &[String], _ctx: &mut ExecContext<'_>) -> Result<(), HandlerError> {
        let Some(runner) = &self.harness else {
            info!("build reached (no script harness attached)");
            return Ok(());
        };

        let stages: &[String] = if args.is_empty() {
            &self.default_stages
        } else {
            args
        };
        if stages.is_empty() {
            info!("build: no stages to run for {}", runner.arch());
        }

        for stage in stages {
            match runner.run_stage(stage)? {
                ScriptOutcome::Completed => {}
                ScriptOutcome::Interrupted(why) => {
                    return Err(HandlerError::BuildInterrupted {
                        stage: stage.clone(),
                        reason: why.to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScriptError;
    use crate::logging::LogFile;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn runner(root: &Path) -> ScriptRunner {
        let log = LogFile::create(root.join("archconf-run.log")).unwrap();
        ScriptRunner::new(root.join("scripts"), root, "arm64", log, Duration::from_secs(30))
    }

    fn stage(root: &Path, name: &str, body: &str) {
        let dir = root.join("scripts/arm64");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{name}.sh")), body).unwrap();
    }

    fn build(command: &Build, root: &Path, stages: &[&str]) -> Result<(), HandlerError> {
        let args: Vec<String> = stages.iter().map(|s| s.to_string()).collect();
        let mut out = Vec::<u8>::new();
        let mut ctx = ExecContext {
            cwd: root,
            stdout: &mut out,
        };
        command.run(&args, &mut ctx)
    }

    #[test]
    fn test_placeholder_always_succeeds() {
        let temp = TempDir::new().unwrap();
        build(&Build::placeholder(), temp.path(), &[]).unwrap();
        build(&Build::placeholder(), temp.path(), &["anything"]).unwrap();
    }

    #[test]
    fn test_named_stages_run_in_order() {
        let temp = TempDir::new().unwrap();
        stage(temp.path(), "one", "echo one >> \"$2/order\"\n");
        stage(temp.path(), "two", "echo two >> \"$2/order\"\n");

        let command = Build::with_runner(runner(temp.path()), Vec::new());
        build(&command, temp.path(), &["one", "two"]).unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("order")).unwrap(),
            "one\ntwo\n"
        );
    }

    #[test]
    fn test_bare_build_uses_default_stages() {
        let temp = TempDir::new().unwrap();
        stage(temp.path(), "toolchain", "touch \"$2/toolchain-done\"\n");

        let command = Build::with_runner(runner(temp.path()), vec!["toolchain".into()]);
        build(&command, temp.path(), &[]).unwrap();

        assert!(temp.path().join("toolchain-done").exists());
    }

    #[test]
    fn test_interrupted_stage_stops_the_build() {
        let temp = TempDir::new().unwrap();
        stage(temp.path(), "bad", "exit 1\n");
        stage(temp.path(), "after", "touch \"$2/after-ran\"\n");

        let command = Build::with_runner(runner(temp.path()), Vec::new());
        let err = build(&command, temp.path(), &["bad", "after"]).unwrap_err();

        assert!(matches!(
            err,
            HandlerError::BuildInterrupted { ref stage, .. } if stage == "bad"
        ));
        assert!(!temp.path().join("after-ran").exists());
    }

    #[test]
    fn test_missing_stage_script_is_a_script_error() {
        let temp = TempDir::new().unwrap();
        let command = Build::with_runner(runner(temp.path()), Vec::new());
        let err = build(&command, temp.path(), &["absent"]).unwrap_err();
        assert!(matches!(
            err,
            HandlerError::Script(ScriptError::NotFound { .. })
        ));
    }
}
