use crate::calendar::CalendarDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreakState {
    pub streak: u32,
    pub last_check_in: Option<CalendarDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectionOutcome {
    /// Today's reflection was already recorded; nothing changed.
    AlreadyCheckedIn,
    Recorded { new_streak: u32 },
}

impl ReflectionOutcome {
    pub fn already_checked_in(&self) -> bool {
        matches!(self, ReflectionOutcome::AlreadyCheckedIn)
    }

    pub fn new_streak(&self) -> Option<u32> {
        match self {
            ReflectionOutcome::AlreadyCheckedIn => None,
            ReflectionOutcome::Recorded { new_streak } => Some(*new_streak),
        }
    }
}

impl StreakState {
    pub fn can_check_in(&self, today: CalendarDate) -> bool {
        self.last_check_in != Some(today)
    }

    /// Runs one daily reflection against `today`.
    ///
    /// Returns `None` for the next state when the player already reflected
    /// today. A productive day extends the streak only if the previous
    /// check-in was exactly yesterday; any other gap restarts it at 1. An
    /// unproductive day always zeroes it.
    pub fn reflect(
        &self,
        today: CalendarDate,
        was_productive: bool,
    ) -> (Option<StreakState>, ReflectionOutcome) {
        if !self.can_check_in(today) {
            return (None, ReflectionOutcome::AlreadyCheckedIn);
        }

        let new_streak = if !was_productive {
            0
        } else if self.last_check_in == Some(today.pred()) {
            self.streak.saturating_add(1)
        } else {
            1
        };

        (
            Some(StreakState {
                streak: new_streak,
                last_check_in: Some(today),
            }),
            ReflectionOutcome::Recorded { new_streak },
        )
    }
}
