use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::calendar::CalendarDate;
use crate::leveling::XpReward;

pub const ROLLING_WINDOW_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    Completed,
    Half,
    Lied,
}

impl TaskOutcome {
    pub fn xp_reward(self) -> NonZeroU32 {
        match self {
            TaskOutcome::Completed => XpReward::TASK_COMPLETED,
            TaskOutcome::Half => XpReward::TASK_HALF_DONE,
            TaskOutcome::Lied => XpReward::TASK_LIED,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "completed" | "done" => Some(TaskOutcome::Completed),
            "half" => Some(TaskOutcome::Half),
            "lied" => Some(TaskOutcome::Lied),
            _ => None,
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskOutcome::Completed => "completed",
            TaskOutcome::Half => "half",
            TaskOutcome::Lied => "lied",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTally {
    pub date: CalendarDate,
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub half: u32,
    #[serde(default)]
    pub lied: u32,
}

impl DayTally {
    fn empty(date: CalendarDate) -> Self {
        Self {
            date,
            completed: 0,
            half: 0,
            lied: 0,
        }
    }

    fn bump(&mut self, outcome: TaskOutcome) {
        let slot = match outcome {
            TaskOutcome::Completed => &mut self.completed,
            TaskOutcome::Half => &mut self.half,
            TaskOutcome::Lied => &mut self.lied,
        };
        *slot = slot.saturating_add(1);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHistory {
    #[serde(default)]
    pub total_completed: u32,
    #[serde(default)]
    pub total_half_completed: u32,
    #[serde(default)]
    pub total_lied: u32,
    #[serde(default)]
    pub last7_days: VecDeque<DayTally>,
}

impl TaskHistory {
    /// Counts `outcome` in the lifetime totals and in today's tally.
    ///
    /// The rolling window is a plain FIFO: once it holds more than seven
    /// tallies the oldest inserted one is dropped, whatever its date.
    pub fn record(&mut self, outcome: TaskOutcome, today: CalendarDate) {
        let total = match outcome {
            TaskOutcome::Completed => &mut self.total_completed,
            TaskOutcome::Half => &mut self.total_half_completed,
            TaskOutcome::Lied => &mut self.total_lied,
        };
        *total = total.saturating_add(1);

        match self.last7_days.iter_mut().find(|tally| tally.date == today) {
            Some(tally) => tally.bump(outcome),
            None => {
                let mut tally = DayTally::empty(today);
                tally.bump(outcome);
                self.last7_days.push_back(tally);
            }
        }

        while self.last7_days.len() > ROLLING_WINDOW_LEN {
            self.last7_days.pop_front();
        }
    }

    pub fn stats(&self) -> TaskStats {
        let total = self
            .total_completed
            .saturating_add(self.total_half_completed)
            .saturating_add(self.total_lied);
        TaskStats {
            total,
            completed: self.total_completed,
            half: self.total_half_completed,
            lied: self.total_lied,
            completion_rate: rounded_percent(self.total_completed, total),
            lying_probability: rounded_percent(self.total_lied, total),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStats {
    pub total: u32,
    pub completed: u32,
    pub half: u32,
    pub lied: u32,
    pub completion_rate: u32,
    pub lying_probability: u32,
}

fn rounded_percent(part: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let part = u64::from(part);
    let total = u64::from(total);
    ((part * 200 + total) / (total * 2)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> CalendarDate {
        CalendarDate::from_ymd(2026, 10, d).expect("date")
    }

    #[test]
    fn same_day_outcomes_share_one_tally() {
        let mut history = TaskHistory::default();
        history.record(TaskOutcome::Completed, day(1));
        history.record(TaskOutcome::Half, day(1));
        history.record(TaskOutcome::Completed, day(1));

        assert_eq!(history.total_completed, 2);
        assert_eq!(history.total_half_completed, 1);
        assert_eq!(history.last7_days.len(), 1);
        assert_eq!(
            history.last7_days[0],
            DayTally {
                date: day(1),
                completed: 2,
                half: 1,
                lied: 0
            }
        );
    }

    #[test]
    fn eighth_day_evicts_oldest_insertion() {
        let mut history = TaskHistory::default();
        for d in 1..=8 {
            history.record(TaskOutcome::Lied, day(d));
        }
        assert_eq!(history.last7_days.len(), ROLLING_WINDOW_LEN);
        assert_eq!(history.last7_days.front().map(|t| t.date), Some(day(2)));
        assert_eq!(history.last7_days.back().map(|t| t.date), Some(day(8)));
        assert_eq!(history.total_lied, 8);
    }

    #[test]
    fn eviction_is_by_insertion_not_date() {
        let mut history = TaskHistory::default();
        // Recorded out of calendar order: a later date first.
        history.record(TaskOutcome::Completed, day(20));
        for d in 1..=7 {
            history.record(TaskOutcome::Completed, day(d));
        }
        let dates: Vec<_> = history.last7_days.iter().map(|t| t.date).collect();
        assert!(!dates.contains(&day(20)));
        assert_eq!(dates.first(), Some(&day(1)));
    }

    #[test]
    fn stats_round_half_up_and_handle_empty_history() {
        assert_eq!(TaskHistory::default().stats().completion_rate, 0);

        let mut history = TaskHistory::default();
        history.record(TaskOutcome::Completed, day(1));
        history.record(TaskOutcome::Completed, day(1));
        history.record(TaskOutcome::Lied, day(1));
        history.record(TaskOutcome::Half, day(1));
        history.record(TaskOutcome::Half, day(1));
        history.record(TaskOutcome::Half, day(1));
        history.record(TaskOutcome::Half, day(1));
        history.record(TaskOutcome::Half, day(1));

        let stats = history.stats();
        assert_eq!(stats.total, 8);
        assert_eq!(stats.completion_rate, 25);
        // 12.5% rounds up.
        assert_eq!(stats.lying_probability, 13);
    }

    #[test]
    fn record_shape_matches_persisted_layout() {
        let mut history = TaskHistory::default();
        history.record(TaskOutcome::Half, day(3));
        let json = serde_json::to_value(&history).expect("encode");
        assert_eq!(json["totalHalfCompleted"], 1);
        assert_eq!(json["last7Days"][0]["date"], "2026-10-03");
        assert_eq!(json["last7Days"][0]["half"], 1);
    }

    #[test]
    fn outcome_rewards() {
        assert_eq!(TaskOutcome::Completed.xp_reward().get(), 15);
        assert_eq!(TaskOutcome::Half.xp_reward().get(), 8);
        assert_eq!(TaskOutcome::Lied.xp_reward().get(), 2);
        assert_eq!(TaskOutcome::from_name("DONE"), Some(TaskOutcome::Completed));
    }
}
