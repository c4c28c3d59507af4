use std::num::NonZeroU32;

pub const STARTING_LEVEL: u32 = 1;
const XP_SCALE: u64 = 100;

/// XP granted by each kind of interaction.
pub struct XpReward;

impl XpReward {
    pub const TASK_COMPLETED: NonZeroU32 = reward(15);
    pub const TASK_HALF_DONE: NonZeroU32 = reward(8);
    pub const TASK_LIED: NonZeroU32 = reward(2);
    pub const DESK_LOG: NonZeroU32 = reward(5);
}

const fn reward(amount: u32) -> NonZeroU32 {
    match NonZeroU32::new(amount) {
        Some(amount) => amount,
        None => panic!("xp rewards must be positive"),
    }
}

/// Cumulative XP needed to stand at `level`: 0, 100, 300, 600, 1000, ...
///
/// A scaled triangular number, strictly increasing for every level >= 1.
/// Level 0 is treated as level 1.
pub fn xp_required_for(level: u32) -> u64 {
    let level = u64::from(level.max(STARTING_LEVEL));
    ((level - 1) * level / 2).saturating_mul(XP_SCALE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelState {
    pub xp: u64,
    pub level: u32,
}

impl Default for LevelState {
    fn default() -> Self {
        Self {
            xp: 0,
            level: STARTING_LEVEL,
        }
    }
}

impl LevelState {
    /// Adds `amount` and performs at most one level-up.
    ///
    /// Crossing several thresholds in one award still advances a single
    /// level; the remainder is picked up by later awards. The cosmetic unlock
    /// tables rely on every level being visited one at a time.
    pub fn apply_award(&self, amount: u32) -> (LevelState, Option<u32>) {
        let xp = self.xp.saturating_add(u64::from(amount));
        let next_level = self.level.saturating_add(1);
        if next_level > self.level && xp >= xp_required_for(next_level) {
            (
                LevelState {
                    xp,
                    level: next_level,
                },
                Some(next_level),
            )
        } else {
            (
                LevelState {
                    xp,
                    level: self.level,
                },
                None,
            )
        }
    }

    pub fn progress(&self) -> LevelProgress {
        let current_floor = xp_required_for(self.level);
        let next_threshold = xp_required_for(self.level.saturating_add(1));
        let into_level = self.xp.saturating_sub(current_floor);
        let needed = next_threshold.saturating_sub(current_floor);
        let percent = if needed == 0 {
            100
        } else {
            ((into_level.min(needed) * 100) / needed) as u8
        };
        LevelProgress {
            level: self.level,
            xp: self.xp,
            current_floor,
            next_threshold,
            into_level,
            needed,
            percent,
        }
    }
}

/// Where the player sits between the current level's floor and the next
/// threshold, as the HUD bar shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelProgress {
    pub level: u32,
    pub xp: u64,
    pub current_floor: u64,
    pub next_threshold: u64,
    pub into_level: u64,
    pub needed: u64,
    pub percent: u8,
}
