use std::collections::BTreeMap;
use std::num::NonZeroU32;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::calendar::{CalendarDate, Clock};
use crate::catalog::{self, TaskCard, TaskCategory};
use crate::config::EngineConfig;
use crate::cosmetics::{Color, CosmeticState, CosmeticUnlock, HatId, PetId};
use crate::custom_tasks::{next_custom_id, validate_custom_task, CustomTask};
use crate::daily_log::{
    daily_log_key, retention_decision, validate_log_text, DailyLogEntry, DailyLogIndex,
    PurgeReport, RetentionDecision, DAILY_LOG_KEY_PREFIX,
};
use crate::error::{DecodeError, ProgressionError, ValidationError};
use crate::history::{TaskHistory, TaskOutcome, TaskStats};
use crate::leveling::{xp_required_for, LevelProgress, LevelState, XpReward, STARTING_LEVEL};
use crate::store::{Store, StoreError};
use crate::streak::{ReflectionOutcome, StreakState};

/// Logical store keys. Daily logs live under
/// [`DAILY_LOG_KEY_PREFIX`](crate::daily_log::DAILY_LOG_KEY_PREFIX).
pub mod keys {
    pub const XP: &str = "xp";
    pub const LEVEL: &str = "level";
    pub const STREAK: &str = "streak";
    pub const LAST_CHECK_IN: &str = "lastCheckIn";
    pub const COSMETICS: &str = "cosmetics";
    pub const ACTIVE_TASKS: &str = "activeTasks";
    pub const CUSTOM_TASKS: &str = "customTasks";
    pub const HISTORY: &str = "history";
    pub const DAILY_LOG_INDEX: &str = "dailyTaskIndex";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelUp {
    pub new_level: u32,
    pub unlocked: Vec<CosmeticUnlock>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XpAward {
    pub awarded: u32,
    pub xp: u64,
    pub level: u32,
    pub level_up: Option<LevelUp>,
}

impl XpAward {
    pub fn leveled_up(&self) -> bool {
        self.level_up.is_some()
    }

    pub fn new_level(&self) -> Option<u32> {
        self.level_up.as_ref().map(|level_up| level_up.new_level)
    }
}

/// Read-only view for the HUD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressionSnapshot {
    pub xp: u64,
    pub level: u32,
    pub streak: u32,
    pub last_check_in: Option<CalendarDate>,
    pub can_check_in_today: bool,
    pub progress: LevelProgress,
    pub cosmetics: CosmeticState,
}

enum RecordRead<T> {
    Missing,
    Unreadable(String),
    Unavailable(StoreError),
    Present(T),
}

/// Store wrapper that turns write failures into a degraded flag instead of
/// errors; gameplay keeps going on in-memory state.
struct StoreHandle<S> {
    store: S,
    degraded: bool,
}

impl<S: Store> StoreHandle<S> {
    fn read<T: DeserializeOwned>(&self, key: &str) -> RecordRead<T> {
        let value = match self.store.load(key) {
            Ok(Some(value)) => value,
            Ok(None) => return RecordRead::Missing,
            Err(StoreError::Corrupt { source, .. }) => {
                return RecordRead::Unreadable(source.to_string())
            }
            Err(error) => return RecordRead::Unavailable(error),
        };
        match decode_record(key, value) {
            Ok(record) => RecordRead::Present(record),
            Err(error) => RecordRead::Unreadable(error.to_string()),
        }
    }

    /// Loads `key`, substituting (and writing back) `default` when the record
    /// is absent or undecodable.
    fn read_or_seed<T: DeserializeOwned + Serialize>(&mut self, key: &str, default: T) -> T {
        match self.read(key) {
            RecordRead::Present(record) => record,
            RecordRead::Missing => {
                self.save(key, &default);
                default
            }
            RecordRead::Unreadable(reason) => {
                warn!(key, reason = %reason, "stored_record_unreadable_using_default");
                self.save(key, &default);
                default
            }
            RecordRead::Unavailable(error) => {
                warn!(key, error = %error, "storage_read_failed_using_default");
                self.degraded = true;
                default
            }
        }
    }

    fn save<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        let encoded = match serde_json::to_value(value) {
            Ok(encoded) => encoded,
            Err(source) => {
                let error = StoreError::Encode {
                    key: key.to_string(),
                    source,
                };
                warn!(key, error = %error, "storage_encode_failed");
                self.degraded = true;
                return;
            }
        };
        match self.store.save(key, &encoded) {
            Ok(()) => debug!(key, "record_persisted"),
            Err(error) => {
                warn!(key, error = %error, "storage_write_failed");
                self.degraded = true;
            }
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.store.remove(key) {
            Ok(()) => true,
            Err(error) => {
                warn!(key, error = %error, "storage_remove_failed");
                self.degraded = true;
                false
            }
        }
    }
}

fn decode_record<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, DecodeError> {
    serde_path_to_error::deserialize(value).map_err(|error| {
        let path = error.path().to_string();
        DecodeError {
            key: key.to_string(),
            path,
            message: error.into_inner().to_string(),
        }
    })
}

/// Owns every piece of progression state and is the store's only writer.
///
/// Each operation validates first, builds its new state, commits it in
/// memory and then persists the touched keys before returning.
pub struct ProgressionEngine<S: Store, C: Clock> {
    handle: StoreHandle<S>,
    clock: C,
    config: EngineConfig,
    levels: LevelState,
    streak: StreakState,
    cosmetics: CosmeticState,
    history: TaskHistory,
    active_tasks: Vec<TaskCard>,
    custom_tasks: Vec<CustomTask>,
    log_index: DailyLogIndex,
    daily_logs: BTreeMap<String, Vec<DailyLogEntry>>,
}

impl<S: Store, C: Clock> ProgressionEngine<S, C> {
    pub fn open(store: S, clock: C, config: EngineConfig) -> Self {
        let mut handle = StoreHandle {
            store,
            degraded: false,
        };

        let xp = handle.read_or_seed::<u64>(keys::XP, 0);
        let level = handle.read_or_seed::<u32>(keys::LEVEL, STARTING_LEVEL);
        let streak = handle.read_or_seed::<u32>(keys::STREAK, 0);
        let last_check_in = handle.read_or_seed::<Option<CalendarDate>>(keys::LAST_CHECK_IN, None);
        let cosmetics = handle.read_or_seed(keys::COSMETICS, CosmeticState::default());
        let active_tasks = handle.read_or_seed::<Vec<TaskCard>>(keys::ACTIVE_TASKS, Vec::new());
        let custom_tasks = handle.read_or_seed::<Vec<CustomTask>>(keys::CUSTOM_TASKS, Vec::new());
        let history = handle.read_or_seed(keys::HISTORY, TaskHistory::default());
        let log_index = handle.read_or_seed(keys::DAILY_LOG_INDEX, DailyLogIndex::default());

        let mut engine = Self {
            handle,
            clock,
            config,
            levels: LevelState { xp, level },
            streak: StreakState {
                streak,
                last_check_in,
            },
            cosmetics,
            history,
            active_tasks,
            custom_tasks,
            log_index,
            daily_logs: BTreeMap::new(),
        };
        engine.repair_loaded_state();
        engine.reconcile_log_index();
        engine.load_daily_logs();

        info!(
            xp = engine.levels.xp,
            level = engine.levels.level,
            streak = engine.streak.streak,
            daily_logs = engine.log_index.len(),
            storage_degraded = engine.handle.degraded,
            "progression_state_loaded"
        );

        if engine.config.purge_on_open {
            engine.purge_expired_logs();
        }
        engine
    }

    fn repair_loaded_state(&mut self) {
        if self.levels.level < STARTING_LEVEL {
            warn!(level = self.levels.level, "stored_level_below_minimum_repairing");
            self.levels.level = STARTING_LEVEL;
            self.handle.save(keys::LEVEL, &self.levels.level);
        }
        if xp_required_for(self.levels.level) > self.levels.xp {
            let mut level = self.levels.level;
            while level > STARTING_LEVEL && xp_required_for(level) > self.levels.xp {
                level -= 1;
            }
            warn!(
                xp = self.levels.xp,
                stored_level = self.levels.level,
                repaired_level = level,
                "stored_level_exceeds_xp_repairing"
            );
            self.levels.level = level;
            self.handle.save(keys::LEVEL, &self.levels.level);
        }
        if self.cosmetics.repair() {
            self.handle.save(keys::COSMETICS, &self.cosmetics);
        }
    }

    /// Re-indexes daily logs that exist in the store but are missing from
    /// the index, e.g. after the index record was lost or unreadable.
    fn reconcile_log_index(&mut self) {
        let stored = match self.handle.store.keys() {
            Ok(stored) => stored,
            Err(error) => {
                warn!(error = %error, "store_key_listing_failed");
                self.handle.degraded = true;
                return;
            }
        };
        let mut missing: Vec<String> = stored
            .into_iter()
            .filter(|key| key.starts_with(DAILY_LOG_KEY_PREFIX) && !self.log_index.contains(key))
            .collect();
        if missing.is_empty() {
            return;
        }
        missing.sort();
        info!(recovered = missing.len(), "daily_log_index_rebuilt");
        for key in missing {
            self.log_index.insert(key);
        }
        self.handle.save(keys::DAILY_LOG_INDEX, &self.log_index);
    }

    /// Caches readable logs only. An unreadable record stays out of the
    /// cache so nothing later overwrites it with a fresh list.
    fn load_daily_logs(&mut self) {
        let mut stale = Vec::new();
        for key in self.log_index.keys() {
            match self.handle.read::<Vec<DailyLogEntry>>(key) {
                RecordRead::Present(entries) => {
                    self.daily_logs.insert(key.clone(), entries);
                }
                RecordRead::Missing => stale.push(key.clone()),
                RecordRead::Unreadable(reason) => {
                    warn!(key = %key, reason = %reason, "daily_log_unreadable");
                }
                RecordRead::Unavailable(error) => {
                    warn!(key = %key, error = %error, "daily_log_read_failed");
                    self.handle.degraded = true;
                }
            }
        }
        if !stale.is_empty() {
            debug!(stale = stale.len(), "daily_log_index_pruned");
            self.log_index.retain(|key| !stale.iter().any(|gone| gone == key));
            self.handle.save(keys::DAILY_LOG_INDEX, &self.log_index);
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.handle.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.handle.store
    }

    pub fn into_store(self) -> S {
        self.handle.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// True once any read or write of this session failed.
    pub fn storage_degraded(&self) -> bool {
        self.handle.degraded
    }

    pub fn today(&self) -> CalendarDate {
        self.clock.today()
    }

    pub fn xp(&self) -> u64 {
        self.levels.xp
    }

    pub fn level(&self) -> u32 {
        self.levels.level
    }

    pub fn streak(&self) -> u32 {
        self.streak.streak
    }

    pub fn last_check_in(&self) -> Option<CalendarDate> {
        self.streak.last_check_in
    }

    pub fn progress(&self) -> LevelProgress {
        self.levels.progress()
    }

    pub fn cosmetics(&self) -> &CosmeticState {
        &self.cosmetics
    }

    pub fn history(&self) -> &TaskHistory {
        &self.history
    }

    pub fn stats(&self) -> TaskStats {
        self.history.stats()
    }

    pub fn snapshot(&self) -> ProgressionSnapshot {
        ProgressionSnapshot {
            xp: self.levels.xp,
            level: self.levels.level,
            streak: self.streak.streak,
            last_check_in: self.streak.last_check_in,
            can_check_in_today: self.can_check_in_today(),
            progress: self.levels.progress(),
            cosmetics: self.cosmetics.clone(),
        }
    }

    pub fn award_xp(&mut self, amount: u32) -> Result<XpAward, ProgressionError> {
        let Some(amount) = NonZeroU32::new(amount) else {
            return Err(ProgressionError::InvalidXpAmount);
        };
        Ok(self.apply_award(amount))
    }

    fn apply_award(&mut self, amount: NonZeroU32) -> XpAward {
        let (levels, new_level) = self.levels.apply_award(amount.get());
        let level_up = new_level.map(|new_level| {
            let mut cosmetics = self.cosmetics.clone();
            let unlocked = cosmetics.apply_level_unlocks(new_level);
            (new_level, cosmetics, unlocked)
        });

        self.levels = levels;
        self.handle.save(keys::XP, &self.levels.xp);

        let level_up = match level_up {
            Some((new_level, cosmetics, unlocked)) => {
                self.cosmetics = cosmetics;
                self.handle.save(keys::LEVEL, &self.levels.level);
                self.handle.save(keys::COSMETICS, &self.cosmetics);
                info!(
                    new_level,
                    xp = self.levels.xp,
                    unlocked = unlocked.len(),
                    "level_up"
                );
                Some(LevelUp {
                    new_level,
                    unlocked,
                })
            }
            None => None,
        };

        XpAward {
            awarded: amount.get(),
            xp: self.levels.xp,
            level: self.levels.level,
            level_up,
        }
    }

    /// Grants the cosmetics tied to `level`. Re-running it for a level that
    /// was already processed changes nothing.
    pub fn evaluate_level_unlocks(&mut self, level: u32) -> Vec<CosmeticUnlock> {
        let unlocked = self.cosmetics.apply_level_unlocks(level);
        if !unlocked.is_empty() {
            self.handle.save(keys::COSMETICS, &self.cosmetics);
        }
        unlocked
    }

    pub fn can_check_in_today(&self) -> bool {
        self.streak.can_check_in(self.clock.today())
    }

    pub fn reflect(&mut self, was_productive: bool) -> ReflectionOutcome {
        let today = self.clock.today();
        let (next, outcome) = self.streak.reflect(today, was_productive);
        let Some(next) = next else {
            debug!(today = %today, "reflection_already_recorded");
            return outcome;
        };

        self.streak = next;
        self.handle.save(keys::STREAK, &self.streak.streak);
        self.handle.save(keys::LAST_CHECK_IN, &self.streak.last_check_in);
        info!(
            today = %today,
            was_productive,
            streak = self.streak.streak,
            "reflection_recorded"
        );
        outcome
    }

    pub fn record_outcome(&mut self, outcome: TaskOutcome) {
        let today = self.clock.today();
        self.history.record(outcome, today);
        self.handle.save(keys::HISTORY, &self.history);
        debug!(outcome = %outcome, today = %today, "task_outcome_recorded");
    }

    /// Awards the outcome's XP and counts it in the history.
    pub fn report_task(&mut self, outcome: TaskOutcome) -> XpAward {
        let award = self.apply_award(outcome.xp_reward());
        self.record_outcome(outcome);
        award
    }

    pub fn active_tasks(&self) -> &[TaskCard] {
        &self.active_tasks
    }

    pub fn accept_task(&mut self, card: TaskCard) {
        if self.active_tasks.iter().any(|active| active.id == card.id) {
            return;
        }
        self.active_tasks.push(card);
        self.handle.save(keys::ACTIVE_TASKS, &self.active_tasks);
    }

    /// Closes an accepted task. Returns `None` when no active task has `id`.
    pub fn resolve_active_task(&mut self, id: &str, outcome: TaskOutcome) -> Option<XpAward> {
        let position = self.active_tasks.iter().position(|task| task.id == id)?;
        self.active_tasks.remove(position);
        self.handle.save(keys::ACTIVE_TASKS, &self.active_tasks);
        Some(self.report_task(outcome))
    }

    /// Appends to the stored log for `date`. Refuses when that record exists
    /// but cannot be read, leaving it untouched.
    pub fn log_task(
        &mut self,
        date: CalendarDate,
        text: &str,
    ) -> Result<DailyLogEntry, ProgressionError> {
        let text = validate_log_text(text)?;
        let entry = DailyLogEntry {
            text,
            time: self.clock.now(),
            date,
        };

        let key = daily_log_key(date);
        if !self.daily_logs.contains_key(&key) {
            let stored = match self.handle.read::<Vec<DailyLogEntry>>(&key) {
                RecordRead::Present(entries) => entries,
                RecordRead::Missing => Vec::new(),
                RecordRead::Unreadable(reason) => {
                    warn!(key = %key, reason = %reason, "daily_log_unreadable_not_overwriting");
                    return Err(ProgressionError::DailyLogUnreadable { date });
                }
                RecordRead::Unavailable(error) => {
                    warn!(key = %key, error = %error, "daily_log_read_failed_not_overwriting");
                    self.handle.degraded = true;
                    return Err(ProgressionError::DailyLogUnreadable { date });
                }
            };
            self.daily_logs.insert(key.clone(), stored);
        }
        let entries = self.daily_logs.entry(key.clone()).or_default();
        entries.push(entry.clone());
        self.handle.save(&key, entries);
        if self.log_index.insert(key.clone()) {
            self.handle.save(keys::DAILY_LOG_INDEX, &self.log_index);
        }
        debug!(key = %key, "daily_task_logged");
        Ok(entry)
    }

    /// The desk: logs `text` for today and pays the desk reward.
    pub fn log_desk_task(&mut self, text: &str) -> Result<(DailyLogEntry, XpAward), ProgressionError> {
        let today = self.clock.today();
        let entry = self.log_task(today, text)?;
        let award = self.apply_award(XpReward::DESK_LOG);
        Ok((entry, award))
    }

    pub fn daily_log(&self, date: CalendarDate) -> &[DailyLogEntry] {
        self.daily_logs
            .get(&daily_log_key(date))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Days with entries among the last `days` days, newest first.
    pub fn recent_daily_logs(&self, days: u32) -> Vec<(CalendarDate, &[DailyLogEntry])> {
        let today = self.clock.today();
        (0..i64::from(days))
            .map(|offset| today.offset_days(-offset))
            .filter_map(|date| {
                let entries = self.daily_log(date);
                (!entries.is_empty()).then_some((date, entries))
            })
            .collect()
    }

    pub fn purge_expired_logs(&mut self) -> PurgeReport {
        self.purge_older_than(self.config.retention_days)
    }

    /// Deletes every indexed daily log older than `retention_days`. Keys
    /// without a readable date are never deleted.
    pub fn purge_older_than(&mut self, retention_days: u32) -> PurgeReport {
        let today = self.clock.today();
        let mut report = PurgeReport::default();

        for key in self.log_index.keys().to_vec() {
            match retention_decision(&key, today, retention_days) {
                RetentionDecision::Keep { .. } => report.retained += 1,
                RetentionDecision::Unparsable => {
                    warn!(key = %key, "daily_log_key_unparsable_skipping");
                    report.retained += 1;
                    report.skipped_unparsable.push(key);
                }
                RetentionDecision::Expire { age_days } => {
                    if self.handle.remove(&key) {
                        debug!(key = %key, age_days, "daily_log_expired");
                        self.daily_logs.remove(&key);
                        report.removed.push(key);
                    } else {
                        report.retained += 1;
                    }
                }
            }
        }

        if !report.removed.is_empty() {
            let removed = &report.removed;
            self.log_index
                .retain(|key| !removed.iter().any(|gone| gone == key));
            self.handle.save(keys::DAILY_LOG_INDEX, &self.log_index);
        }

        info!(
            retention_days,
            removed = report.removed.len(),
            retained = report.retained,
            skipped_unparsable = report.skipped_unparsable.len(),
            "daily_log_retention_summary"
        );
        report
    }

    pub fn custom_tasks(&self) -> &[CustomTask] {
        &self.custom_tasks
    }

    pub fn add_custom_task(
        &mut self,
        text: &str,
        category: &str,
        duration: Option<&str>,
    ) -> Result<CustomTask, ValidationError> {
        let draft = validate_custom_task(text, category, duration)?;
        let now_millis = self.clock.now().and_utc().timestamp_millis();
        let task = CustomTask {
            id: next_custom_id(now_millis, &self.custom_tasks),
            text: draft.text,
            category: draft.category,
            duration: draft.duration,
            unlock_level: STARTING_LEVEL,
        };
        self.custom_tasks.push(task.clone());
        self.handle.save(keys::CUSTOM_TASKS, &self.custom_tasks);
        info!(id = %task.id, category = %task.category, "custom_task_added");
        Ok(task)
    }

    /// Returns whether a task with `id` existed.
    pub fn delete_custom_task(&mut self, id: &str) -> bool {
        let before = self.custom_tasks.len();
        self.custom_tasks.retain(|task| task.id != id);
        if self.custom_tasks.len() == before {
            return false;
        }
        self.handle.save(keys::CUSTOM_TASKS, &self.custom_tasks);
        true
    }

    pub fn available_tasks(&self) -> Vec<TaskCard> {
        catalog::available_tasks(self.levels.level, &self.custom_tasks)
    }

    pub fn draw_task<R: Rng + ?Sized>(&self, rng: &mut R) -> TaskCard {
        catalog::draw_task(self.levels.level, &self.custom_tasks, rng)
    }

    pub fn draw_task_in_category<R: Rng + ?Sized>(
        &self,
        category: TaskCategory,
        rng: &mut R,
    ) -> TaskCard {
        catalog::draw_task_in_category(category, self.levels.level, &self.custom_tasks, rng)
    }

    pub fn select_color(&mut self, color: &Color) -> Result<(), ProgressionError> {
        let Some(owned) = self
            .cosmetics
            .unlocked_colors
            .iter()
            .find(|owned| owned.as_str().eq_ignore_ascii_case(color.as_str()))
            .cloned()
        else {
            return Err(ProgressionError::CosmeticLocked {
                kind: "color",
                id: color.to_string(),
            });
        };
        self.cosmetics.active_color = owned;
        self.handle.save(keys::COSMETICS, &self.cosmetics);
        Ok(())
    }

    pub fn select_hat(&mut self, hat: Option<HatId>) -> Result<(), ProgressionError> {
        if let Some(hat) = hat {
            if !self.cosmetics.unlocked_hats.contains(&hat) {
                return Err(ProgressionError::CosmeticLocked {
                    kind: "hat",
                    id: hat.name().to_string(),
                });
            }
        }
        self.cosmetics.active_hat = hat;
        self.handle.save(keys::COSMETICS, &self.cosmetics);
        Ok(())
    }

    pub fn select_pet(&mut self, pet: Option<PetId>) -> Result<(), ProgressionError> {
        if let Some(pet) = pet {
            if !self.cosmetics.unlocked_pets.contains(&pet) {
                return Err(ProgressionError::CosmeticLocked {
                    kind: "pet",
                    id: pet.name().to_string(),
                });
            }
        }
        self.cosmetics.active_pet = pet;
        self.handle.save(keys::COSMETICS, &self.cosmetics);
        Ok(())
    }

    /// Wipes the store, daily logs included, and starts over from defaults.
    pub fn reset(&mut self) {
        if let Err(error) = self.handle.store.clear() {
            warn!(error = %error, "storage_clear_failed");
            self.handle.degraded = true;
        }

        self.levels = LevelState::default();
        self.streak = StreakState::default();
        self.cosmetics = CosmeticState::default();
        self.history = TaskHistory::default();
        self.active_tasks.clear();
        self.custom_tasks.clear();
        self.log_index = DailyLogIndex::default();
        self.daily_logs.clear();

        self.handle.save(keys::XP, &self.levels.xp);
        self.handle.save(keys::LEVEL, &self.levels.level);
        self.handle.save(keys::STREAK, &self.streak.streak);
        self.handle.save(keys::LAST_CHECK_IN, &self.streak.last_check_in);
        self.handle.save(keys::COSMETICS, &self.cosmetics);
        self.handle.save(keys::ACTIVE_TASKS, &self.active_tasks);
        self.handle.save(keys::CUSTOM_TASKS, &self.custom_tasks);
        self.handle.save(keys::HISTORY, &self.history);
        self.handle.save(keys::DAILY_LOG_INDEX, &self.log_index);
        info!("progression_state_reset");
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    use super::*;
    use crate::calendar::ManualClock;
    use crate::store::MemoryStore;

    fn start_date() -> CalendarDate {
        CalendarDate::from_ymd(2026, 10, 18).expect("date")
    }

    fn open_engine() -> (ProgressionEngine<MemoryStore, ManualClock>, ManualClock) {
        let clock = ManualClock::at_date(start_date());
        let engine =
            ProgressionEngine::open(MemoryStore::new(), clock.clone(), EngineConfig::default());
        (engine, clock)
    }

    fn reopen(
        engine: ProgressionEngine<MemoryStore, ManualClock>,
        clock: &ManualClock,
    ) -> ProgressionEngine<MemoryStore, ManualClock> {
        ProgressionEngine::open(engine.into_store(), clock.clone(), EngineConfig::default())
    }

    #[test]
    fn fresh_store_is_seeded_with_defaults() {
        let (engine, _) = open_engine();
        let store = engine.store();
        assert_eq!(store.load(keys::XP).expect("load"), Some(json!(0)));
        assert_eq!(store.load(keys::LEVEL).expect("load"), Some(json!(1)));
        assert_eq!(store.load(keys::STREAK).expect("load"), Some(json!(0)));
        assert_eq!(store.load(keys::LAST_CHECK_IN).expect("load"), Some(Value::Null));
        assert_eq!(store.load(keys::ACTIVE_TASKS).expect("load"), Some(json!([])));
        let cosmetics = store.load(keys::COSMETICS).expect("load").expect("seeded");
        assert_eq!(cosmetics["unlockedColors"].as_array().map(Vec::len), Some(3));
        assert!(!engine.storage_degraded());
    }

    #[test]
    fn award_scenario_levels_once_at_hundred() {
        let (mut engine, _) = open_engine();
        for _ in 0..3 {
            let award = engine.award_xp(15).expect("award");
            assert!(!award.leveled_up());
        }
        assert_eq!(engine.xp(), 45);
        assert_eq!(engine.level(), 1);

        let before = engine.cosmetics().clone();
        let award = engine.award_xp(60).expect("award");
        assert_eq!(award.new_level(), Some(2));
        assert_eq!(award.xp, 105);
        assert_eq!(engine.level(), 2);
        // Level 2 maps to a starter color; no hat or pet milestone.
        assert_eq!(engine.cosmetics(), &before);
        assert_eq!(award.level_up.expect("level up").unlocked, Vec::new());
    }

    #[test]
    fn zero_award_is_rejected_without_change() {
        let (mut engine, _) = open_engine();
        assert_eq!(engine.award_xp(0), Err(ProgressionError::InvalidXpAmount));
        assert_eq!(engine.xp(), 0);
    }

    #[test]
    fn awards_persist_across_reopen() {
        let (mut engine, clock) = open_engine();
        engine.award_xp(100).expect("award");
        engine.award_xp(200).expect("award");
        let engine = reopen(engine, &clock);
        assert_eq!(engine.xp(), 300);
        assert_eq!(engine.level(), 3);
        assert_eq!(engine.cosmetics().unlocked_hats, vec![HatId::Cap]);
    }

    #[test]
    fn level_up_through_milestone_unlocks_hat_and_persists() {
        let (mut engine, _) = open_engine();
        engine.award_xp(100).expect("to level 2");
        let award = engine.award_xp(200).expect("to level 3");
        assert_eq!(
            award.level_up.expect("level up").unlocked,
            vec![CosmeticUnlock::Hat(HatId::Cap)]
        );
        let stored = engine.store().load(keys::COSMETICS).expect("load").expect("present");
        assert_eq!(stored["unlockedHats"], json!(["cap"]));
    }

    #[test]
    fn unlock_evaluation_is_idempotent() {
        let (mut engine, _) = open_engine();
        assert_eq!(
            engine.evaluate_level_unlocks(7),
            vec![CosmeticUnlock::Pet(PetId::Blob)]
        );
        assert!(engine.evaluate_level_unlocks(7).is_empty());
        assert_eq!(engine.cosmetics().unlocked_pets, vec![PetId::Blob]);
    }

    #[test]
    fn reflect_twice_same_day_changes_nothing() {
        let (mut engine, _) = open_engine();
        assert!(engine.can_check_in_today());
        let first = engine.reflect(true);
        assert_eq!(first, ReflectionOutcome::Recorded { new_streak: 1 });
        assert!(!engine.can_check_in_today());

        let after_first = engine.snapshot();
        let store_after_first = engine.store().clone();
        for productive in [false, true] {
            assert_eq!(engine.reflect(productive), ReflectionOutcome::AlreadyCheckedIn);
        }
        assert_eq!(engine.snapshot(), after_first);
        assert_eq!(
            engine.store().load(keys::STREAK).expect("load"),
            store_after_first.load(keys::STREAK).expect("load")
        );
    }

    #[test]
    fn streak_sequence_over_days() {
        let (mut engine, clock) = open_engine();
        assert_eq!(engine.reflect(true).new_streak(), Some(1));
        clock.advance_days(1);
        assert_eq!(engine.reflect(true).new_streak(), Some(2));
        clock.advance_days(2);
        assert_eq!(engine.reflect(true).new_streak(), Some(1));
        clock.advance_days(1);
        assert_eq!(engine.reflect(false).new_streak(), Some(0));
        assert_eq!(engine.last_check_in(), Some(clock.today()));

        let engine = reopen(engine, &clock);
        assert_eq!(engine.streak(), 0);
        assert!(!engine.can_check_in_today());
    }

    #[test]
    fn report_task_awards_and_records() {
        let (mut engine, _) = open_engine();
        let award = engine.report_task(TaskOutcome::Completed);
        assert_eq!(award.awarded, 15);
        engine.report_task(TaskOutcome::Lied);
        assert_eq!(engine.xp(), 17);
        let stats = engine.stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.lied, 1);
        assert_eq!(engine.history().last7_days.len(), 1);
    }

    #[test]
    fn accepted_task_is_resolved_once() {
        let (mut engine, clock) = open_engine();
        let mut rng = StdRng::seed_from_u64(3);
        let card = engine.draw_task(&mut rng);
        engine.accept_task(card.clone());
        engine.accept_task(card.clone());
        assert_eq!(engine.active_tasks().len(), 1);

        let mut engine = reopen(engine, &clock);
        assert_eq!(engine.active_tasks(), &[card.clone()]);
        let award = engine
            .resolve_active_task(&card.id, TaskOutcome::Half)
            .expect("active");
        assert_eq!(award.awarded, 8);
        assert!(engine.active_tasks().is_empty());
        assert!(engine
            .resolve_active_task(&card.id, TaskOutcome::Half)
            .is_none());
    }

    #[test]
    fn desk_log_appends_and_pays_five() {
        let (mut engine, clock) = open_engine();
        let (entry, award) = engine.log_desk_task("  Replied to landlord ").expect("log");
        assert_eq!(entry.text, "Replied to landlord");
        assert_eq!(entry.date, clock.today());
        assert_eq!(award.awarded, XpReward::DESK_LOG.get());
        engine.log_desk_task("Watered plants").expect("log");

        let engine = reopen(engine, &clock);
        let log = engine.daily_log(clock.today());
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].text, "Watered plants");
        assert_eq!(engine.xp(), 10);
    }

    #[test]
    fn invalid_log_text_changes_nothing() {
        let (mut engine, clock) = open_engine();
        assert_eq!(
            engine.log_desk_task("   ").map(|_| ()),
            Err(ProgressionError::EmptyLogText)
        );
        let long = "x".repeat(101);
        assert!(engine.log_task(clock.today(), &long).is_err());
        assert!(engine.daily_log(clock.today()).is_empty());
        assert_eq!(engine.xp(), 0);
        assert!(engine
            .store()
            .load(&daily_log_key(clock.today()))
            .expect("load")
            .is_none());
    }

    #[test]
    fn recent_logs_are_newest_first_and_skip_empty_days() {
        let (mut engine, clock) = open_engine();
        let today = clock.today();
        engine.log_task(today.offset_days(-3), "Old entry").expect("log");
        engine.log_task(today, "New entry").expect("log");
        engine.log_task(today.offset_days(-9), "Too old for view").expect("log");

        let recent = engine.recent_daily_logs(7);
        let dates: Vec<_> = recent.iter().map(|(date, _)| *date).collect();
        assert_eq!(dates, vec![today, today.offset_days(-3)]);
    }

    #[test]
    fn retention_deletes_old_keeps_recent_and_unparsable() {
        let (mut engine, clock) = open_engine();
        let today = clock.today();
        engine.log_task(today.offset_days(-45), "Ancient").expect("log");
        engine.log_task(today.offset_days(-10), "Recent").expect("log");

        let odd_key = format!("{DAILY_LOG_KEY_PREFIX}Sun Oct 18 2026");
        engine
            .store_mut()
            .save(&odd_key, &json!([]))
            .expect("seed odd log");
        engine.log_index.insert(odd_key.clone());

        let report = engine.purge_older_than(30);
        assert_eq!(report.removed, vec![daily_log_key(today.offset_days(-45))]);
        assert_eq!(report.skipped_unparsable, vec![odd_key.clone()]);
        assert_eq!(report.retained, 2);

        assert!(engine.daily_log(today.offset_days(-45)).is_empty());
        assert_eq!(engine.daily_log(today.offset_days(-10)).len(), 1);
        let store = engine.store();
        assert!(store
            .load(&daily_log_key(today.offset_days(-45)))
            .expect("load")
            .is_none());
        assert!(store.load(&odd_key).expect("load").is_some());
        let index = store.load(keys::DAILY_LOG_INDEX).expect("load").expect("index");
        assert_eq!(index.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn failed_remove_keeps_expired_log_indexed() {
        let (mut engine, clock) = open_engine();
        let old = clock.today().offset_days(-45);
        engine.log_task(old, "Ancient").expect("log");
        engine.store_mut().set_fail_writes(true);

        let report = engine.purge_older_than(30);
        assert!(report.removed.is_empty());
        assert_eq!(report.retained, 1);
        assert!(engine.storage_degraded());
        assert_eq!(engine.daily_log(old).len(), 1);
        assert!(engine.log_index.contains(&daily_log_key(old)));
        assert!(engine
            .store()
            .load(&daily_log_key(old))
            .expect("load")
            .is_some());
    }

    #[test]
    fn corrupt_index_is_rebuilt_from_stored_logs() {
        let (mut engine, clock) = open_engine();
        let today = clock.today();
        let old = today.offset_days(-45);
        engine.log_task(today, "first entry").expect("log");
        engine.log_task(old, "Ancient").expect("log");
        let mut store = engine.into_store();
        store
            .save(keys::DAILY_LOG_INDEX, &json!("garbage"))
            .expect("corrupt index");

        let config = EngineConfig {
            retention_days: 30,
            purge_on_open: true,
        };
        let mut engine = ProgressionEngine::open(store, clock.clone(), config);
        assert!(engine.store().load(&daily_log_key(old)).expect("load").is_none());
        assert_eq!(engine.daily_log(today).len(), 1);

        engine.log_task(today, "second entry").expect("log");
        let stored = engine
            .store()
            .load(&daily_log_key(today))
            .expect("load")
            .expect("log record");
        assert_eq!(stored.as_array().map(Vec::len), Some(2));
        let index = engine
            .store()
            .load(keys::DAILY_LOG_INDEX)
            .expect("load")
            .expect("index");
        assert_eq!(index, json!([daily_log_key(today)]));
    }

    #[test]
    fn unreadable_log_is_never_overwritten() {
        let (mut engine, clock) = open_engine();
        let today = clock.today();
        engine.log_task(today, "first entry").expect("log");
        let key = daily_log_key(today);
        let mut store = engine.into_store();
        store.save(&key, &json!({"not": "a list"})).expect("corrupt log");

        let mut engine = ProgressionEngine::open(store, clock.clone(), EngineConfig::default());
        let error = engine.log_desk_task("second entry").expect_err("refused");
        assert_eq!(error, ProgressionError::DailyLogUnreadable { date: today });
        assert_eq!(engine.xp(), 0);
        assert_eq!(
            engine.store().load(&key).expect("load"),
            Some(json!({"not": "a list"}))
        );
    }

    #[test]
    fn log_task_waits_for_readable_store_then_appends() {
        let (mut engine, clock) = open_engine();
        let today = clock.today();
        engine.log_task(today, "first entry").expect("log");
        let mut store = engine.into_store();
        store.set_fail_reads(true);

        let mut engine = ProgressionEngine::open(store, clock.clone(), EngineConfig::default());
        assert!(engine.storage_degraded());
        assert!(engine.daily_log(today).is_empty());
        let error = engine.log_task(today, "second entry").expect_err("refused");
        assert_eq!(error, ProgressionError::DailyLogUnreadable { date: today });

        engine.store_mut().set_fail_reads(false);
        engine.log_task(today, "second entry").expect("log");
        assert_eq!(engine.daily_log(today).len(), 2);
        let stored = engine
            .store()
            .load(&daily_log_key(today))
            .expect("load")
            .expect("log record");
        assert_eq!(stored.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn open_runs_retention_with_configured_window() {
        let (mut engine, clock) = open_engine();
        engine
            .log_task(clock.today().offset_days(-5), "Five days ago")
            .expect("log");
        let store = engine.into_store();

        let config = EngineConfig {
            retention_days: 3,
            purge_on_open: true,
        };
        let engine = ProgressionEngine::open(store, clock.clone(), config);
        assert!(engine.daily_log(clock.today().offset_days(-5)).is_empty());
    }

    #[test]
    fn custom_task_lifecycle() {
        let (mut engine, clock) = open_engine();
        let error = engine
            .add_custom_task("abcd", "clean", Some("⏱️"))
            .expect_err("too short");
        assert_eq!(error, ValidationError::InvalidText);
        assert!(engine.custom_tasks().is_empty());

        let first = engine.add_custom_task("abcde", "clean", Some("⏱️")).expect("add");
        let second = engine
            .add_custom_task("Call the dentist", "lifeAdmin", Some("⏰"))
            .expect("add");
        assert_ne!(first.id, second.id);
        assert_eq!(first.unlock_level, 1);
        assert!(engine
            .available_tasks()
            .iter()
            .any(|card| card.id == second.id && card.custom));

        let mut engine = reopen(engine, &clock);
        assert_eq!(engine.custom_tasks().len(), 2);
        assert!(engine.delete_custom_task(&first.id));
        assert!(!engine.delete_custom_task(&first.id));
        assert_eq!(engine.custom_tasks(), &[second]);
    }

    #[test]
    fn cosmetic_selection_requires_unlock() {
        let (mut engine, _) = open_engine();
        engine.select_color(&Color::new("#4ECCA3")).expect("starter");
        assert_eq!(engine.cosmetics().active_color, Color::new("#4ecca3"));

        let error = engine
            .select_color(&Color::new("#a8e6cf"))
            .expect_err("locked");
        assert!(matches!(error, ProgressionError::CosmeticLocked { kind: "color", .. }));
        assert!(engine.select_hat(Some(HatId::Crown)).is_err());

        engine.evaluate_level_unlocks(5);
        engine.select_hat(Some(HatId::Crown)).expect("unlocked");
        engine.select_hat(None).expect("clear");
        assert_eq!(engine.cosmetics().active_hat, None);
        assert!(engine.select_pet(Some(PetId::Robot)).is_err());
    }

    #[test]
    fn corrupt_records_fall_back_to_defaults() {
        let mut store = MemoryStore::new();
        store.save(keys::XP, &json!("lots")).expect("seed");
        store
            .save(keys::HISTORY, &json!({"totalCompleted": "many"}))
            .expect("seed");
        store
            .save(
                keys::COSMETICS,
                &json!({"unlockedColors": ["#4ecca3"], "activeColor": "#123456"}),
            )
            .expect("seed");

        let clock = ManualClock::at_date(start_date());
        let engine = ProgressionEngine::open(store, clock, EngineConfig::default());
        assert_eq!(engine.xp(), 0);
        assert_eq!(engine.history(), &TaskHistory::default());
        assert_eq!(engine.cosmetics().active_color, Color::new("#4ecca3"));
        assert_eq!(engine.store().load(keys::XP).expect("load"), Some(json!(0)));
    }

    #[test]
    fn level_without_matching_xp_is_repaired_on_open() {
        let mut store = MemoryStore::new();
        store.save(keys::XP, &json!(150)).expect("seed");
        store.save(keys::LEVEL, &json!(9)).expect("seed");
        let engine = ProgressionEngine::open(
            store,
            ManualClock::at_date(start_date()),
            EngineConfig::default(),
        );
        assert_eq!(engine.level(), 2);
    }

    #[test]
    fn write_failures_degrade_but_keep_memory_state() {
        let (mut engine, _) = open_engine();
        engine.store_mut().set_fail_writes(true);

        let award = engine.award_xp(15).expect("award");
        assert_eq!(award.xp, 15);
        assert_eq!(engine.reflect(true).new_streak(), Some(1));
        assert!(engine.storage_degraded());
        assert_eq!(engine.xp(), 15);
        assert_eq!(engine.store().load(keys::XP).expect("load"), Some(json!(0)));
    }

    #[test]
    fn unreadable_store_opens_with_defaults() {
        let mut store = MemoryStore::new();
        store.save(keys::XP, &json!(500)).expect("seed");
        store.set_fail_reads(true);
        let engine = ProgressionEngine::open(
            store,
            ManualClock::at_date(start_date()),
            EngineConfig::default(),
        );
        assert!(engine.storage_degraded());
        assert_eq!(engine.xp(), 0);
        assert_eq!(engine.level(), 1);
    }

    #[test]
    fn reset_clears_everything_including_logs() {
        let (mut engine, clock) = open_engine();
        engine.award_xp(150).expect("award");
        engine.reflect(true);
        engine.log_task(clock.today(), "Something").expect("log");
        engine
            .add_custom_task("Walk the dog", "move", Some("⏱️"))
            .expect("add");

        engine.reset();

        assert_eq!(engine.snapshot().xp, 0);
        assert_eq!(engine.level(), 1);
        assert!(engine.can_check_in_today());
        assert!(engine.custom_tasks().is_empty());
        assert!(engine.daily_log(clock.today()).is_empty());
        assert!(engine
            .store()
            .load(&daily_log_key(clock.today()))
            .expect("load")
            .is_none());
        assert_eq!(engine.store().load(keys::LEVEL).expect("load"), Some(json!(1)));
    }

    #[test]
    fn snapshot_reflects_hud_values() {
        let (mut engine, _) = open_engine();
        engine.award_xp(15).expect("award");
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.xp, 15);
        assert_eq!(snapshot.progress.next_threshold, 100);
        assert_eq!(snapshot.progress.percent, 15);
        assert!(snapshot.can_check_in_today);
    }
}
