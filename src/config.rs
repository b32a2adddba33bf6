//! Configuration loading and management

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use crate::hotstring::{
    MatchPolicy, PatternTable, Provider, TableError, DEFAULT_DATE_FORMAT, DEFAULT_TIME_FORMAT,
};

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding user configuration
    pub config_dir: PathBuf,

    /// Path to the JSON hotstring table
    pub table_path: PathBuf,

    /// X display to attach to; `None` uses `$DISPLAY`
    pub display: Option<String>,

    /// Which pattern wins when several match at once
    pub match_policy: MatchPolicy,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_env(|key| std::env::var(key).ok())
    }

    fn from_env(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let home = var("HOME").ok_or_else(|| anyhow!("HOME is not set"))?;
        let config_dir = var("XDG_CONFIG_HOME")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&home).join(".config"))
            .join("chotu");

        let table_path = var("CHOTU_HOTSTRINGS")
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join("hotstrings.json"));

        let display = var("CHOTU_DISPLAY").filter(|d| !d.is_empty());

        let match_policy = match var("CHOTU_MATCH_POLICY") {
            Some(value) => value
                .parse()
                .map_err(|e: String| anyhow!(e))
                .context("invalid CHOTU_MATCH_POLICY")?,
            None => MatchPolicy::default(),
        };

        Ok(Self {
            config_dir,
            table_path,
            display,
            match_policy,
        })
    }

    /// Load the hotstring table, falling back to the built-in one when
    /// the table file does not exist
    pub fn load_table(&self) -> Result<PatternTable> {
        if !self.table_path.exists() {
            info!(path = ?self.table_path, "no hotstring table found, using built-in defaults");
            return Ok(default_table()?);
        }

        let text = std::fs::read_to_string(&self.table_path)
            .with_context(|| format!("failed to read {}", self.table_path.display()))?;
        let table = PatternTable::from_json(&text)
            .with_context(|| format!("invalid hotstring table {}", self.table_path.display()))?;
        info!(path = ?self.table_path, patterns = table.len(), "hotstring table loaded");
        Ok(table)
    }
}

/// Hotstrings used when the user has not configured any
pub fn default_table() -> Result<PatternTable, TableError> {
    let mut table = PatternTable::new();
    table
        // Personal information
        .literal("/name", "Shadab Zafar")?
        .literal("/dz", "dufferzafar")?
        .literal("/blog", "http://dufferzafar.github.io/")?
        .literal("/git", "http://github.com/dufferzafar/")?
        // Misc
        .literal("/hah", "hahahahahaha")?
        .literal("/lmgtfy", "http://lmgtfy.com/?q=")?
        // ASCII emoji
        .literal("/shrug", "¯\\_(ツ)_/¯")?
        .literal("/smile", "ಠ‿ಠ")?
        // Live values
        .provider("/date", Provider::local_time(DEFAULT_DATE_FORMAT)?)?
        .provider("/time", Provider::local_time(DEFAULT_TIME_FORMAT)?)?;
    Ok(table)
}
