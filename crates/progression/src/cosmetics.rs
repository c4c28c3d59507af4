use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Player colors in unlock order. The first three are owned from the start.
pub const COLOR_PALETTE: [&str; 8] = [
    "#FF6B9D", "#4ecca3", "#ffd93d", "#C06C84", "#6C5B7B", "#355C7D", "#ff6b6b", "#a8e6cf",
];
const STARTER_COLOR_COUNT: usize = 3;
const COLOR_UNLOCK_MAX_LEVEL: u32 = 16;

pub const HAT_UNLOCK_LEVELS: [(u32, HatId); 6] = [
    (3, HatId::Cap),
    (5, HatId::Crown),
    (8, HatId::Wizard),
    (12, HatId::Headphones),
    (16, HatId::Halo),
    (20, HatId::Horns),
];

pub const PET_UNLOCK_LEVELS: [(u32, PetId); 4] = [
    (7, PetId::Blob),
    (14, PetId::Cat),
    (21, PetId::Ghost),
    (30, PetId::Robot),
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub String);

impl Color {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HatId {
    Cap,
    Crown,
    Wizard,
    Headphones,
    Halo,
    Horns,
}

impl HatId {
    pub const ALL: [HatId; 6] = [
        HatId::Cap,
        HatId::Crown,
        HatId::Wizard,
        HatId::Headphones,
        HatId::Halo,
        HatId::Horns,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HatId::Cap => "cap",
            HatId::Crown => "crown",
            HatId::Wizard => "wizard",
            HatId::Headphones => "headphones",
            HatId::Halo => "halo",
            HatId::Horns => "horns",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|hat| hat.name().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PetId {
    Blob,
    Cat,
    Ghost,
    Robot,
}

impl PetId {
    pub const ALL: [PetId; 4] = [PetId::Blob, PetId::Cat, PetId::Ghost, PetId::Robot];

    pub fn name(self) -> &'static str {
        match self {
            PetId::Blob => "blob",
            PetId::Cat => "cat",
            PetId::Ghost => "ghost",
            PetId::Robot => "robot",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|pet| pet.name().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CosmeticUnlock {
    Color(Color),
    Hat(HatId),
    Pet(PetId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmeticState {
    pub unlocked_colors: Vec<Color>,
    #[serde(default)]
    pub unlocked_hats: Vec<HatId>,
    #[serde(default)]
    pub unlocked_pets: Vec<PetId>,
    pub active_color: Color,
    #[serde(default)]
    pub active_hat: Option<HatId>,
    #[serde(default)]
    pub active_pet: Option<PetId>,
}

impl Default for CosmeticState {
    fn default() -> Self {
        Self {
            unlocked_colors: COLOR_PALETTE[..STARTER_COLOR_COUNT]
                .iter()
                .map(|hex| Color::new(*hex))
                .collect(),
            unlocked_hats: Vec::new(),
            unlocked_pets: Vec::new(),
            active_color: Color::new(COLOR_PALETTE[0]),
            active_hat: None,
            active_pet: None,
        }
    }
}

impl CosmeticState {
    /// Grants whatever `new_level` unlocks and returns what was newly added.
    ///
    /// Every table matches on the exact level, so a level that is skipped
    /// never grants its item. Items already owned are left alone; nothing is
    /// ever removed.
    pub fn apply_level_unlocks(&mut self, new_level: u32) -> Vec<CosmeticUnlock> {
        let mut unlocked = Vec::new();

        if new_level % 2 == 0 && new_level <= COLOR_UNLOCK_MAX_LEVEL {
            let index = (new_level / 2) as usize;
            if let Some(hex) = COLOR_PALETTE.get(index) {
                let color = Color::new(*hex);
                if push_unique(&mut self.unlocked_colors, color.clone()) {
                    unlocked.push(CosmeticUnlock::Color(color));
                }
            }
        }

        for (level, hat) in HAT_UNLOCK_LEVELS {
            if level == new_level && push_unique(&mut self.unlocked_hats, hat) {
                unlocked.push(CosmeticUnlock::Hat(hat));
            }
        }

        for (level, pet) in PET_UNLOCK_LEVELS {
            if level == new_level && push_unique(&mut self.unlocked_pets, pet) {
                unlocked.push(CosmeticUnlock::Pet(pet));
            }
        }

        unlocked
    }

    pub fn has_color(&self, color: &Color) -> bool {
        self.unlocked_colors
            .iter()
            .any(|owned| owned.as_str().eq_ignore_ascii_case(color.as_str()))
    }

    /// Restores the invariants a hand-edited or truncated record can break.
    /// Returns true when anything changed.
    pub(crate) fn repair(&mut self) -> bool {
        let before = self.clone();

        dedup_in_order(&mut self.unlocked_colors);
        dedup_in_order(&mut self.unlocked_hats);
        dedup_in_order(&mut self.unlocked_pets);

        if self.unlocked_colors.is_empty() {
            self.unlocked_colors = CosmeticState::default().unlocked_colors;
        }
        if !self.has_color(&self.active_color) {
            warn!(
                active_color = %self.active_color,
                "active_color_not_unlocked_resetting"
            );
            self.active_color = self.unlocked_colors[0].clone();
        }
        if let Some(hat) = self.active_hat {
            if !self.unlocked_hats.contains(&hat) {
                self.active_hat = None;
            }
        }
        if let Some(pet) = self.active_pet {
            if !self.unlocked_pets.contains(&pet) {
                self.active_pet = None;
            }
        }

        *self != before
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) -> bool {
    if items.contains(&item) {
        return false;
    }
    items.push(item);
    true
}

fn dedup_in_order<T: PartialEq + Clone>(items: &mut Vec<T>) {
    let mut seen = Vec::with_capacity(items.len());
    items.retain(|item| {
        if seen.contains(item) {
            false
        } else {
            seen.push(item.clone());
            true
        }
    });
}
