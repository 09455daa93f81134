//! `echo -- args...`

use std::io::Write;

use super::{Command, ExecContext};
use crate::error::HandlerError;

/// Prints its arguments joined by single spaces.
#[derive(Debug, Clone, Default)]
pub struct Echo;

impl Command for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn run(&self, args: &[String], ctx: &mut ExecContext<'_>) -> Result<(), HandlerError> {
        // echo always succeeds, even on a closed stdout.
        let _ = writeln!(ctx.stdout, "{}", args.join(" "));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn echo(args: &[&str]) -> String {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let mut out = Vec::<u8>::new();
        let mut ctx = ExecContext {
            cwd: Path::new("/"),
            stdout: &mut out,
        };
        Echo.run(&args, &mut ctx).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_echo_joins_with_spaces() {
        assert_eq!(echo(&["hello", "world"]), "hello world\n");
    }

    #[test]
    fn test_echo_without_arguments_prints_empty_line() {
        assert_eq!(echo(&[]), "\n");
    }

    #[test]
    fn test_echo_keeps_quoted_spacing() {
        assert_eq!(echo(&["a  b", "c"]), "a  b c\n");
    }
}
