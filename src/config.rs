//! Interpreter settings.
//!
//! Defaults, optionally overridden by `archconf.toml` in the base
//! directory (or an explicit `--config` file), then by CLI flags:
//!
//! ```toml
//! debug = true
//! log_dir = "/var/log/archconf"
//!
//! [arch]
//! rules = ["i.86/x86", "aarch64.*/arm64"]
//!
//! [scripts]
//! enabled = true
//! dir = "configs/scripts"
//! timeout_secs = 3600
//! default_stages = ["toolchain", "compile"]
//!
//! [variables]
//! kernel = "6.6"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::arch::{self, ArchResolver};

pub const CONFIG_FILENAME: &str = "archconf.toml";
const DEFAULT_SCRIPTS_DIR: &str = "configs/scripts";
const DEFAULT_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSettings {
    /// Attach the harness to `build`.
    pub enabled: bool,
    /// Relative paths resolve against the base directory.
    pub dir: PathBuf,
    pub timeout_secs: u64,
    /// Stages a bare `build` runs.
    pub default_stages: Vec<String>,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from(DEFAULT_SCRIPTS_DIR),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            default_stages: Vec::new(),
        }
    }
}

impl ScriptSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
    pub base_dir: PathBuf,
    pub debug: bool,
    pub verbose: bool,
    pub log_dir: PathBuf,
    /// Ordered `pattern/replacement` rules for architecture names.
    pub arch_rules: Vec<String>,
    /// Bound before the first statement of every file.
    pub variables: BTreeMap<String, String>,
    pub scripts: ScriptSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    debug: Option<bool>,
    verbose: Option<bool>,
    log_dir: Option<PathBuf>,
    arch: Option<ArchToml>,
    scripts: Option<ScriptsToml>,
    #[serde(default)]
    variables: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArchToml {
    rules: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptsToml {
    enabled: Option<bool>,
    dir: Option<PathBuf>,
    timeout_secs: Option<u64>,
    default_stages: Option<Vec<String>>,
}

impl InterpreterConfig {
    /// Defaults for a base directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            debug: false,
            verbose: false,
            log_dir: std::env::temp_dir(),
            arch_rules: arch::DEFAULT_RULES.iter().map(|r| r.to_string()).collect(),
            variables: BTreeMap::new(),
            scripts: ScriptSettings::default(),
        }
    }

    /// Defaults, then the settings file if there is one.
    ///
    /// `explicit` must exist; the implicit `<base>/archconf.toml` may not.
    pub fn load(base_dir: impl Into<PathBuf>, explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::new(base_dir);
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let implicit = config.base_dir.join(CONFIG_FILENAME);
                if !implicit.is_file() {
                    return Ok(config);
                }
                implicit
            }
        };

        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading settings '{}'", path.display()))?;
        let parsed: ConfigToml = toml::from_str(&text)
            .with_context(|| format!("parsing settings '{}'", path.display()))?;
        config.apply(parsed);
        config
            .validate()
            .with_context(|| format!("invalid settings '{}'", path.display()))?;
        Ok(config)
    }

    fn apply(&mut self, parsed: ConfigToml) {
        if let Some(debug) = parsed.debug {
            self.debug = debug;
        }
        if let Some(verbose) = parsed.verbose {
            self.verbose = verbose;
        }
        if let Some(log_dir) = parsed.log_dir {
            self.log_dir = log_dir;
        }
        if let Some(arch) = parsed.arch {
            self.arch_rules = arch.rules;
        }
        if let Some(scripts) = parsed.scripts {
            if let Some(enabled) = scripts.enabled {
                self.scripts.enabled = enabled;
            }
            if let Some(dir) = scripts.dir {
                self.scripts.dir = dir;
            }
            if let Some(timeout) = scripts.timeout_secs {
                self.scripts.timeout_secs = timeout;
            }
            if let Some(stages) = scripts.default_stages {
                self.scripts.default_stages = stages;
            }
        }
        self.variables.extend(parsed.variables);
    }

    /// Reject settings the interpreter cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scripts.timeout_secs == 0 {
            bail!("scripts.timeout_secs must be greater than zero");
        }
        ArchResolver::from_rules(&self.arch_rules)?;
        for name in self.variables.keys() {
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                bail!("variable name '{name}' may only use letters, digits and '_'");
            }
        }
        Ok(())
    }

    /// `configs/arch` under the base directory.
    pub fn arch_config_dir(&self) -> PathBuf {
        self.base_dir.join("configs").join("arch")
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.base_dir.join(&self.scripts.dir)
    }

    /// Bind `NAME=VALUE` pairs.
    pub fn define<'a>(&mut self, pairs: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for pair in pairs {
            let Some((name, value)) = pair.split_once('=') else {
                bail!("definition '{pair}' is not NAME=VALUE");
            };
            self.variables.insert(name.trim().to_string(), value.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_implicit_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = InterpreterConfig::load(temp.path(), None).unwrap();
        assert_eq!(config, InterpreterConfig::new(temp.path()));
        assert!(!config.scripts.enabled);
        assert_eq!(config.arch_rules.len(), arch::DEFAULT_RULES.len());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");
        assert!(InterpreterConfig::load(temp.path(), Some(&missing)).is_err());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILENAME),
            r#"
verbose = true
log_dir = "/var/log/archconf"

[scripts]
enabled = true
timeout_secs = 60
default_stages = ["toolchain", "compile"]

[variables]
kernel = "6.6"
"#,
        )
        .unwrap();

        let config = InterpreterConfig::load(temp.path(), None).unwrap();
        assert!(config.verbose);
        assert!(!config.debug);
        assert_eq!(config.log_dir, PathBuf::from("/var/log/archconf"));
        assert!(config.scripts.enabled);
        assert_eq!(config.scripts.timeout(), Duration::from_secs(60));
        assert_eq!(config.scripts.dir, PathBuf::from(DEFAULT_SCRIPTS_DIR));
        assert_eq!(config.scripts.default_stages, vec!["toolchain", "compile"]);
        assert_eq!(config.variables.get("kernel").map(String::as_str), Some("6.6"));
        assert_eq!(config.scripts_dir(), temp.path().join(DEFAULT_SCRIPTS_DIR));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILENAME), "colour = true\n").unwrap();
        let err = InterpreterConfig::load(temp.path(), None).unwrap_err();
        assert!(format!("{err:#}").contains("parsing settings"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let temp = TempDir::new().unwrap();
        for text in [
            "[scripts]\ntimeout_secs = 0\n",
            "[arch]\nrules = [\"no-separator\"]\n",
            "[arch]\nrules = [\"(/x\"]\n",
            "[variables]\n\"bad name\" = \"x\"\n",
        ] {
            fs::write(temp.path().join(CONFIG_FILENAME), text).unwrap();
            let err = InterpreterConfig::load(temp.path(), None).unwrap_err();
            assert!(format!("{err:#}").contains("invalid settings"), "{text}");
        }
    }

    #[test]
    fn test_define_pairs() {
        let mut config = InterpreterConfig::new("/srv");
        config.define(["kernel=6.6", "flags=a=b"]).unwrap();
        assert_eq!(config.variables["kernel"], "6.6");
        assert_eq!(config.variables["flags"], "a=b");
        assert!(config.define(["novalue"]).is_err());
    }
}
