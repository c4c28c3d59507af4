use crate::daily_log::DEFAULT_RETENTION_DAYS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Daily logs older than this many days are deleted by retention.
    pub retention_days: u32,
    /// Run retention once when the engine opens its store.
    pub purge_on_open: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            purge_on_open: true,
        }
    }
}
