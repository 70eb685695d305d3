use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Database file used when `--db` is not given. Default: ~/.cmd-vault/vault.db
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// Fallback tracing filter when `CMD_VAULT_LOG` is unset. Default: "warn"
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// How often the UI wakes up to poll for input and finished commands.
    #[serde(default = "default_tick_rate_ms")]
    pub tick_rate_ms: u64,

    #[serde(default)]
    pub shell: ShellConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: None,
            log_level: default_log_level(),
            tick_rate_ms: default_tick_rate_ms(),
            shell: ShellConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Interpreter that receives the command line. Default: "sh" ("cmd" on Windows)
    #[serde(default = "default_shell_program")]
    pub program: String,

    /// Arguments placed before the command line. Default: ["-c"] (["/C"] on Windows)
    #[serde(default = "default_shell_args")]
    pub args: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        ShellConfig {
            program: default_shell_program(),
            args: default_shell_args(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_tick_rate_ms() -> u64 {
    100
}

fn default_shell_program() -> String {
    if cfg!(windows) { "cmd" } else { "sh" }.to_string()
}

fn default_shell_args() -> Vec<String> {
    vec![if cfg!(windows) { "/C" } else { "-c" }.to_string()]
}

impl Config {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(10))
    }

    /// Resolve the database path: explicit flag, then config, then the default location.
    pub fn database_path(&self, flag: Option<&Path>) -> Result<PathBuf> {
        match (flag, &self.database) {
            (Some(path), _) => Ok(path.to_path_buf()),
            (None, Some(path)) => Ok(path.clone()),
            (None, None) => db_path(),
        }
    }
}

/// Returns the base cmd-vault config directory: ~/.cmd-vault/
pub fn base_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(".cmd-vault"))
}

/// Returns the default path to the `SQLite` database
pub fn db_path() -> Result<PathBuf> {
    Ok(base_dir()?.join("vault.db"))
}

/// Returns the path of the log file written while the TUI owns the terminal
pub fn log_path() -> Result<PathBuf> {
    Ok(base_dir()?.join("cmd-vault.log"))
}

pub fn ensure_dirs() -> Result<()> {
    let base = base_dir()?;
    fs::create_dir_all(&base).context("failed to create ~/.cmd-vault/")?;
    Ok(())
}

/// Load config from ~/.cmd-vault/config.toml (or return defaults if it doesn't exist)
pub fn load() -> Result<Config> {
    let path = base_dir()?.join("config.toml");
    if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        parse(&content).with_context(|| format!("failed to parse {}", path.display()))
    } else {
        Ok(Config::default())
    }
}

fn parse(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}
