use std::env;
use std::path::PathBuf;

use progression::{
    app_paths_with_save_dir, resolve_app_paths, resolve_root, AppPaths, EngineConfig, FileStore,
    ProgressionEngine, StartupError, SystemClock,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::console::ConsoleCommandProcessor;
use super::session::Session;

const RETENTION_DAYS_ENV_VAR: &str = "ARCADE_RETENTION_DAYS";
const SAVE_DIR_ENV_VAR: &str = "ARCADE_SAVE_DIR";

pub(crate) struct AppWiring {
    pub(crate) session: Session<FileStore, SystemClock>,
    pub(crate) processor: ConsoleCommandProcessor,
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    init_tracing();
    info!("=== Procrastination Arcade Startup ===");

    let paths = resolve_paths()?;
    let config = engine_config_from_env();
    info!(
        root = %paths.root.display(),
        save_dir = %paths.save_dir.display(),
        retention_days = config.retention_days,
        "save_location_resolved"
    );

    let store = FileStore::open(&paths.save_dir).map_err(|source| StartupError::OpenStore {
        path: paths.save_dir.clone(),
        source,
    })?;
    let engine = ProgressionEngine::open(store, SystemClock, config);

    Ok(AppWiring {
        session: Session::new(engine, StdRng::from_entropy()),
        processor: ConsoleCommandProcessor::new(),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn resolve_paths() -> Result<AppPaths, StartupError> {
    match env::var_os(SAVE_DIR_ENV_VAR) {
        Some(save_dir) if !save_dir.is_empty() => {
            app_paths_with_save_dir(resolve_root()?, PathBuf::from(save_dir))
        }
        _ => resolve_app_paths(),
    }
}

fn engine_config_from_env() -> EngineConfig {
    let mut config = EngineConfig::default();
    let Ok(raw) = env::var(RETENTION_DAYS_ENV_VAR) else {
        return config;
    };
    match parse_retention_days(&raw) {
        Some(days) => config.retention_days = days,
        None => warn!(
            var = RETENTION_DAYS_ENV_VAR,
            value = %raw,
            default = config.retention_days,
            "invalid_retention_days_ignored"
        ),
    }
    config
}

fn parse_retention_days(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok()
}
