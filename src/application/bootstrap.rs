use crate::infrastructure::config::{ensure_default_configs, load_app_config, AppConfig};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::SqliteKeyValueStore;
use std::fs;
use std::path::{Path, PathBuf};

const HOME_ENV_KEY: &str = "TASKTIMER_HOME";
const DEFAULT_DIR_NAME: &str = "tasktimer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub database_path: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(workspace_root: &Path) -> Self {
        let state_dir = workspace_root.join("state");
        Self {
            workspace_root: workspace_root.to_path_buf(),
            config_dir: workspace_root.join("config"),
            database_path: state_dir.join("tasktimer.sqlite"),
            state_dir,
            logs_dir: workspace_root.join("logs"),
        }
    }
}

#[derive(Debug)]
pub struct BootstrapResult {
    pub layout: WorkspaceLayout,
    pub config: AppConfig,
}

/// Explicit root first, then `TASKTIMER_HOME`, then the platform data dir.
pub fn resolve_workspace_root<F>(explicit: Option<PathBuf>, lookup: F) -> Result<PathBuf, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(root) = explicit {
        return Ok(root);
    }
    if let Some(home) = lookup(HOME_ENV_KEY)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    {
        return Ok(PathBuf::from(home));
    }
    dirs::data_dir()
        .map(|dir| dir.join(DEFAULT_DIR_NAME))
        .ok_or_else(|| {
            InfraError::InvalidConfig(format!(
                "could not determine a data directory; pass --root or set {HOME_ENV_KEY}"
            ))
        })
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let layout = WorkspaceLayout::new(workspace_root);

    fs::create_dir_all(&layout.config_dir)?;
    fs::create_dir_all(&layout.state_dir)?;
    fs::create_dir_all(&layout.logs_dir)?;

    ensure_default_configs(&layout.config_dir)?;
    let config = load_app_config(&layout.config_dir)?;
    SqliteKeyValueStore::new(&layout.database_path).initialize()?;

    Ok(BootstrapResult { layout, config })
}
