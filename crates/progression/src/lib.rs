use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod calendar;
pub mod catalog;
mod config;
pub mod cosmetics;
pub mod custom_tasks;
pub mod daily_log;
mod engine;
mod error;
pub mod history;
pub mod leveling;
pub mod store;
pub mod streak;

pub use calendar::{CalendarDate, Clock, ManualClock, SystemClock};
pub use catalog::{TaskCard, TaskCategory};
pub use config::EngineConfig;
pub use cosmetics::{Color, CosmeticState, CosmeticUnlock, HatId, PetId};
pub use custom_tasks::CustomTask;
pub use daily_log::{DailyLogEntry, PurgeReport};
pub use engine::{keys, LevelUp, ProgressionEngine, ProgressionSnapshot, XpAward};
pub use error::{DecodeError, ProgressionError, ValidationError};
pub use history::{TaskHistory, TaskOutcome, TaskStats};
pub use leveling::{xp_required_for, LevelProgress, XpReward};
pub use store::{FileStore, MemoryStore, Store, StoreError};
pub use streak::ReflectionOutcome;

pub const ROOT_ENV_VAR: &str = "ARCADE_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub save_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create save directory at {path}: {source}")]
    CreateSaveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "ARCADE_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and a crates/ directory."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and crates/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/procrastination-arcade\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
    #[error("failed to open save store at {path}: {source}")]
    OpenStore {
        path: PathBuf,
        #[source]
        source: StoreError,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    let save_dir = root.join("saves");
    app_paths_with_save_dir(root, save_dir)
}

/// Uses `save_dir` as-is instead of `<root>/saves`.
pub fn app_paths_with_save_dir(root: PathBuf, save_dir: PathBuf) -> Result<AppPaths, StartupError> {
    fs::create_dir_all(&save_dir).map_err(|source| StartupError::CreateSaveDir {
        path: save_dir.clone(),
        source,
    })?;
    Ok(AppPaths { root, save_dir })
}

pub fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_repo_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join("crates").is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
