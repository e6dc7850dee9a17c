//! Configuration for vault tasks.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (VAULT_TASKS_HOME, VAULT_TASKS_CONFIG)
//! 2. Config file (.vault-tasks/config.yaml)
//! 3. Defaults (~/.vault-tasks)
//!
//! Config file discovery:
//! - VAULT_TASKS_CONFIG points at a file directly, otherwise
//! - searches current directory and parents for .vault-tasks/config.yaml
//! - `paths.home` in the config file is relative to the .vault-tasks/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::authorizer::AuthParam;
use crate::core::TaskConfig;
use crate::domain::Address;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub task: Option<TaskSection>,
    #[serde(default)]
    pub grants: Vec<GrantConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to the .vault-tasks/ directory)
    pub home: Option<String>,
}

/// Deployment of a single task
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSection {
    /// Identity of the task itself
    pub address: Address,
    /// Vault the task executes through
    pub vault: Address,
    /// Default caller used by the CLI
    #[serde(default)]
    pub operator: Option<Address>,
    /// Connector binding and policies
    pub config: TaskConfig,
}

/// One authorization grant, operation named by its signature
#[derive(Debug, Clone, Deserialize)]
pub struct GrantConfig {
    pub who: Address,
    #[serde(rename = "where")]
    pub target: Address,
    pub what: String,
    #[serde(default)]
    pub params: Vec<AuthParam>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to the state directory
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Task deployment (if configured)
    pub task: Option<TaskSection>,
    /// Authorization grants
    pub grants: Vec<GrantConfig>,
}

impl ResolvedConfig {
    /// Directory holding per-task record stores
    pub fn tasks_dir(&self) -> PathBuf {
        self.home.join("tasks")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("VAULT_TASKS_CONFIG") {
        return Some(PathBuf::from(explicit));
    }

    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".vault-tasks").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse and validate config file content
pub fn parse_config(content: &str) -> Result<ConfigFile> {
    let config: ConfigFile = serde_yaml::from_str(content)?;
    if let Some(ref task) = config.task {
        task.config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid task configuration: {} ({})", e, e.code()))?;
    }
    Ok(config)
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Build a resolved configuration from an optional config file
fn resolve(config_file: Option<PathBuf>, env_home: Option<PathBuf>) -> Result<ResolvedConfig> {
    let default_home = || -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".vault-tasks"))
    };

    let Some(config_path) = config_file else {
        let home = match env_home {
            Some(home) => home,
            None => default_home()?,
        };
        return Ok(ResolvedConfig {
            home,
            config_file: None,
            task: None,
            grants: Vec::new(),
        });
    };

    let config = load_config_file(&config_path)?;
    let config_dir = config_path.parent().unwrap_or(Path::new("."));

    let home = if let Some(home) = env_home {
        home
    } else if let Some(ref home_path) = config.paths.home {
        resolve_path(config_dir, home_path)
    } else {
        default_home()?
    };

    Ok(ResolvedConfig {
        home,
        config_file: Some(config_path),
        task: config.task,
        grants: config.grants,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let env_home = std::env::var("VAULT_TASKS_HOME").ok().map(PathBuf::from);
    resolve(find_config_file(), env_home)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (bypasses the cache)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the task records directory ($VAULT_TASKS_HOME/tasks)
pub fn tasks_dir() -> Result<PathBuf> {
    Ok(config()?.tasks_dir())
}
