//! Architecture names.
//!
//! The host machine string (`uname -m`) is normalized by applying ordered
//! `pattern/replacement` regex rules, each to the output of the previous
//! one. The resulting tag must name an entry of `configs/arch/`.

use std::ffi::CStr;
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;

pub const DEFAULT_RULES: &[&str] = &[
    "i.86/x86",
    "x86_64/x86_64",
    "sun4u/sparc64",
    "arm.*/arm",
    "sa110/arm",
    "s390x/s390",
    "ppc.*/powerpc",
    "mips.*/mips",
    "sh[234].*/sh",
    "aarch64.*/arm64",
    "riscv.*/riscv",
    "loongarch.*/loongarch",
];

#[derive(Debug, Clone)]
pub struct ArchResolver {
    rules: Vec<(Regex, String)>,
}

impl ArchResolver {
    /// Compile `pattern/replacement` rules, in order.
    pub fn from_rules<S: AsRef<str>>(rules: &[S]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                let rule = rule.as_ref();
                let (pattern, replacement) = rule
                    .split_once('/')
                    .ok_or_else(|| anyhow!("architecture rule '{rule}' is not pattern/replacement"))?;
                let regex = Regex::new(pattern)
                    .with_context(|| format!("compiling architecture rule '{rule}'"))?;
                Ok((regex, replacement.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Apply every rule to `machine`.
    pub fn normalize(&self, machine: &str) -> String {
        self.rules
            .iter()
            .fold(machine.to_string(), |arch, (regex, replacement)| {
                regex.replace_all(&arch, replacement.as_str()).into_owned()
            })
    }

    /// Normalize `machine` and check it against the configurations in
    /// `config_dir`.
    pub fn resolve(&self, machine: &str, config_dir: &Path) -> Result<String> {
        let tag = self.normalize(machine);
        ensure_supported(&tag, config_dir)
            .with_context(|| format!("resolving host machine '{machine}'"))?;
        Ok(tag)
    }
}

impl Default for ArchResolver {
    fn default() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .filter_map(|rule| {
                let (pattern, replacement) = rule.split_once('/')?;
                Some((Regex::new(pattern).ok()?, replacement.to_string()))
            })
            .collect();
        Self { rules }
    }
}

/// Architectures with a configuration file, sorted.
pub fn supported(config_dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let entries = fs::read_dir(config_dir).with_context(|| {
        format!("reading architecture configs '{}'", config_dir.display())
    })?;
    for entry in entries {
        let entry = entry.with_context(|| {
            format!("iterating architecture configs '{}'", config_dir.display())
        })?;
        if !entry.path().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// Fail unless `tag` has a configuration file in `config_dir`.
pub fn ensure_supported(tag: &str, config_dir: &Path) -> Result<()> {
    let available = supported(config_dir)?;
    if !available.iter().any(|a| a == tag) {
        bail!(
            "architecture '{tag}' is not supported yet; available: {}",
            if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            }
        );
    }
    Ok(())
}

/// Machine hardware name of the running kernel.
pub fn host_machine() -> Result<String> {
    // SAFETY: utsname is plain old data and uname fills it in.
    let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut uts) } != 0 {
        return Err(io::Error::last_os_error()).context("uname failed");
    }
    // SAFETY: uname NUL-terminates every field it fills.
    let machine = unsafe { CStr::from_ptr(uts.machine.as_ptr()) };
    Ok(machine.to_string_lossy().into_owned())
}
