use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use archconf::arch::{self, ArchResolver};
use archconf::interpreter::{describe_failure, describe_queue};
use archconf::logging::{self, LogFile, Verbosity};
use archconf::{Interpreter, InterpreterConfig};
use clap::Parser;
use log::info;

/// Exit status for any fatal error.
const FATAL_EXIT: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "archconf",
    about = "Interpret per-architecture build configuration files"
)]
struct Cli {
    /// Base directory holding configs/arch and configs/scripts
    #[arg(short, long, default_value = ".")]
    base: PathBuf,

    /// Architecture tag (defaults to the normalized host machine)
    #[arg(short, long)]
    arch: Option<String>,

    /// Settings file (defaults to <base>/archconf.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Show debug output
    #[arg(long)]
    debug: bool,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Directory for the run log
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Predefine a variable, NAME=VALUE (repeatable)
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
    defines: Vec<String>,

    /// Attach the script harness to `build`
    #[arg(long)]
    run_scripts: bool,

    /// Parse and print the command queue without executing it
    #[arg(long)]
    dry_run: bool,

    /// With --dry-run, print the queue as JSON
    #[arg(long, requires = "dry_run")]
    json: bool,

    /// Print the resolved architecture and exit
    #[arg(long)]
    print_arch: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            let message = format!("{err:#}");
            if logging::is_initialized() {
                logging::fatal(message);
            } else {
                eprintln!("{}", logging::format_message(logging::Severity::Fatal, &message));
            }
            ExitCode::from(FATAL_EXIT)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = settings(&cli)?;

    let config_dir = config.arch_config_dir();
    let arch = match &cli.arch {
        Some(tag) => {
            arch::ensure_supported(tag, &config_dir)?;
            tag.clone()
        }
        None => ArchResolver::from_rules(&config.arch_rules)?
            .resolve(&arch::host_machine()?, &config_dir)?,
    };
    if cli.print_arch {
        println!("{arch}");
        return Ok(ExitCode::SUCCESS);
    }

    let log = LogFile::for_run(&config.log_dir, &logging::run_id())
        .with_context(|| format!("creating run log in '{}'", config.log_dir.display()))?;
    logging::init(
        Verbosity {
            debug: config.debug,
            verbose: config.verbose,
        },
        Some(log.clone()),
    )
    .context("installing logger")?;
    info!("Configuring {arch} from '{}'", config.base_dir.display());

    let interp = Interpreter::new(config, arch).with_log(log.clone());
    let parsed = interp.load()?;

    if cli.dry_run {
        if cli.json {
            serde_json::to_writer_pretty(io::stdout().lock(), &parsed.queue)
                .context("writing queue as JSON")?;
            println!();
        } else {
            println!("{}", describe_queue(&parsed.queue, None));
        }
        return Ok(ExitCode::SUCCESS);
    }

    match interp.execute(&parsed.queue, &mut io::stdout().lock()) {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            logging::fatal(describe_failure(&parsed.queue, &err, Some(log.path())));
            Ok(ExitCode::from(FATAL_EXIT))
        }
    }
}

/// Settings file, then CLI overrides.
fn settings(cli: &Cli) -> Result<InterpreterConfig> {
    let base = cli
        .base
        .canonicalize()
        .with_context(|| format!("resolving base directory '{}'", cli.base.display()))?;
    let mut config = InterpreterConfig::load(base, cli.config.as_deref())?;

    config.debug |= cli.debug;
    config.verbose |= cli.verbose;
    config.scripts.enabled |= cli.run_scripts;
    if let Some(dir) = &cli.log_dir {
        config.log_dir = dir.clone();
    }
    config.define(cli.defines.iter().map(String::as_str))?;
    config.validate().context("invalid command-line settings")?;
    Ok(config)
}
