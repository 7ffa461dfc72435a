//! Configuration for the code-graph engine.
//!
//! Layered configuration: built-in defaults, then an optional TOML file,
//! then environment variables. The resource bounds are environment-driven
//! and read once at startup:
//!
//! - `MAX_CONCURRENCY` (positive int; default 1)
//! - `MAX_BATCH_SIZE` (positive int; default 50)
//! - `MAX_FILES` (positive int; default 10 000)
//! - `MAX_PROJECTS` (positive int; default 3)
//! - `CACHE_CAPACITY` (positive int; default 100 000)
//!
//! The full struct can also be overridden with `CODEGRAPH_`-prefixed
//! variables (e.g. `CODEGRAPH_ENABLED=false`).

use figment::{
    Figment,
    providers::{Data, Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variables consulted without a prefix.
const ENV_KEYS: &[&str] = &[
    "max_concurrency",
    "max_batch_size",
    "max_files",
    "max_projects",
    "cache_capacity",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Global switch; queries fail with `IndexDisabled` when off.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding the KV database and workspace metadata.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Reserved for parallel parsing; batches are parsed sequentially today.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Files per parse/persist batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Overall cap on files collected per project walk.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Cap on projects discovered per workspace.
    #[serde(default = "default_max_projects")]
    pub max_projects: usize,

    /// Symbol-occurrence cache capacity (entries).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Callee-map cache capacity (entries).
    #[serde(default = "default_callee_cache_capacity")]
    pub callee_cache_capacity: usize,

    /// Widest line window a single query will consider.
    #[serde(default = "default_max_query_line_limit")]
    pub max_query_line_limit: u32,

    /// Longest snippet (in lines) accepted before truncation.
    #[serde(default = "default_max_read_line")]
    pub max_read_line: usize,

    /// Children kept per call-graph node.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Default call-graph traversal depth.
    #[serde(default = "default_max_layer")]
    pub max_layer: usize,

    /// Extra ignore globs applied during the workspace walk.
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Directory names always skipped during the walk.
    #[serde(default = "default_exclude_directories")]
    pub exclude_directories: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_data_path() -> PathBuf {
    PathBuf::from(".codegraph")
}
fn default_max_concurrency() -> usize {
    1
}
fn default_max_batch_size() -> usize {
    50
}
fn default_max_files() -> usize {
    10_000
}
fn default_max_projects() -> usize {
    3
}
fn default_cache_capacity() -> usize {
    100_000
}
fn default_callee_cache_capacity() -> usize {
    1600
}
fn default_max_query_line_limit() -> u32 {
    200
}
fn default_max_read_line() -> usize {
    5000
}
fn default_top_n() -> usize {
    50
}
fn default_max_layer() -> usize {
    3
}
fn default_ignore_patterns() -> Vec<String> {
    vec!["*.min.js".to_string(), "*.generated.*".to_string()]
}
fn default_exclude_directories() -> Vec<String> {
    [
        ".git",
        "node_modules",
        "target",
        "vendor",
        "dist",
        "build",
        "__pycache__",
        ".idea",
        ".vscode",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            data_path: default_data_path(),
            max_concurrency: default_max_concurrency(),
            max_batch_size: default_max_batch_size(),
            max_files: default_max_files(),
            max_projects: default_max_projects(),
            cache_capacity: default_cache_capacity(),
            callee_cache_capacity: default_callee_cache_capacity(),
            max_query_line_limit: default_max_query_line_limit(),
            max_read_line: default_max_read_line(),
            top_n: default_top_n(),
            max_layer: default_max_layer(),
            ignore_patterns: default_ignore_patterns(),
            exclude_directories: default_exclude_directories(),
        }
    }
}

impl Settings {
    /// Load configuration from defaults, `.codegraph/settings.toml` (searched
    /// upward from the current directory), and environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        let config_path = Self::find_config_file()
            .unwrap_or_else(|| PathBuf::from(".codegraph/settings.toml"));
        Self::figment(Toml::file(config_path)).extract()
    }

    /// Load configuration from a specific TOML file plus the environment.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Self::figment(Toml::file(path.as_ref())).extract()
    }

    fn figment(file: Data<Toml>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(file)
            .merge(Env::prefixed("CODEGRAPH_"))
            .merge(Env::raw().only(ENV_KEYS))
    }

    fn find_config_file() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            let candidate = ancestor.join(".codegraph").join("settings.toml");
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    /// Save the resolved configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, rendered)
    }

    /// Clamp obviously invalid values back to their defaults.
    pub fn sanitize(mut self) -> Self {
        if self.max_batch_size == 0 {
            self.max_batch_size = default_max_batch_size();
        }
        if self.max_files == 0 {
            self.max_files = default_max_files();
        }
        if self.max_projects == 0 {
            self.max_projects = default_max_projects();
        }
        if self.cache_capacity == 0 {
            self.cache_capacity = default_cache_capacity();
        }
        if self.callee_cache_capacity == 0 {
            self.callee_cache_capacity = default_callee_cache_capacity();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.enabled);
        assert_eq!(settings.max_batch_size, 50);
        assert_eq!(settings.max_files, 10_000);
        assert_eq!(settings.max_projects, 3);
        assert_eq!(settings.cache_capacity, 100_000);
        assert_eq!(settings.callee_cache_capacity, 1600);
        assert_eq!(settings.max_query_line_limit, 200);
        assert_eq!(settings.max_read_line, 5000);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
enabled = false
max_batch_size = 10
max_files = 250

ignore_patterns = ["*.gen.go"]
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert!(!settings.enabled);
        assert_eq!(settings.max_batch_size, 10);
        assert_eq!(settings.max_files, 250);
        assert_eq!(settings.ignore_patterns, vec!["*.gen.go"]);
        // Untouched values keep defaults
        assert_eq!(settings.max_projects, 3);
    }

    #[test]
    fn test_env_override() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "max_concurrency = 2\n").unwrap();

        // Keys chosen to avoid racing the other tests in this module, which
        // run in parallel and read defaults.
        unsafe {
            std::env::set_var("MAX_CONCURRENCY", "9");
            std::env::set_var("CACHE_CAPACITY", "123");
        }

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.max_concurrency, 9);
        assert_eq!(settings.cache_capacity, 123);

        unsafe {
            std::env::remove_var("MAX_CONCURRENCY");
            std::env::remove_var("CACHE_CAPACITY");
        }
    }

    #[test]
    fn test_sanitize_restores_defaults() {
        let mut settings = Settings::default();
        settings.max_batch_size = 0;
        settings.cache_capacity = 0;
        let settings = settings.sanitize();
        assert_eq!(settings.max_batch_size, 50);
        assert_eq!(settings.cache_capacity, 100_000);
    }
}
