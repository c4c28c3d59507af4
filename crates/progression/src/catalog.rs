use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::custom_tasks::CustomTask;

pub const QUICK: &str = "⏱️";
pub const LONG: &str = "⏰";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskCategory {
    #[serde(rename = "clean")]
    Clean,
    #[serde(rename = "learn")]
    Learn,
    #[serde(rename = "move")]
    Move,
    #[serde(rename = "focus")]
    Focus,
    #[serde(rename = "lifeAdmin")]
    LifeAdmin,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 5] = [
        TaskCategory::Clean,
        TaskCategory::Learn,
        TaskCategory::Move,
        TaskCategory::Focus,
        TaskCategory::LifeAdmin,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TaskCategory::Clean => "clean",
            TaskCategory::Learn => "learn",
            TaskCategory::Move => "move",
            TaskCategory::Focus => "focus",
            TaskCategory::LifeAdmin => "lifeAdmin",
        }
    }

    /// Exact category names only; custom tasks must name a real category.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.name() == name)
    }

    fn defs(self) -> &'static [TaskDef] {
        match self {
            TaskCategory::Clean => CLEAN,
            TaskCategory::Learn => LEARN,
            TaskCategory::Move => MOVE,
            TaskCategory::Focus => FOCUS,
            TaskCategory::LifeAdmin => LIFE_ADMIN,
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy)]
struct TaskDef {
    text: &'static str,
    duration: &'static str,
    unlock_level: u32,
}

const fn def(text: &'static str, duration: &'static str, unlock_level: u32) -> TaskDef {
    TaskDef {
        text,
        duration,
        unlock_level,
    }
}

const CLEAN: &[TaskDef] = &[
    def("Wash 3 dishes in your sink", QUICK, 1),
    def("Make your bed right now", QUICK, 1),
    def("Clear one surface (desk, table, counter)", QUICK, 1),
    def("Take out the trash or recycling", QUICK, 1),
    def("Wipe down your bathroom sink", QUICK, 1),
    def("Organize one drawer", LONG, 2),
    def("Vacuum or sweep one room", LONG, 2),
    def("Clean your computer keyboard", QUICK, 1),
    def("Wash your water bottle or coffee mug", QUICK, 1),
    def("Dust one shelf or surface", QUICK, 1),
    def("Sort through old papers and recycle", LONG, 3),
    def("Clean your phone screen", QUICK, 1),
];

const LEARN: &[TaskDef] = &[
    def("Read 2 pages of any book", QUICK, 1),
    def("Watch a 5-minute educational video", QUICK, 1),
    def("Learn 3 new words in another language", QUICK, 1),
    def("Read one article about something interesting", LONG, 2),
    def("Listen to 10 minutes of a podcast", LONG, 1),
    def("Practice a skill for 5 minutes", QUICK, 1),
    def("Read the news for 5 minutes", QUICK, 1),
    def("Watch a TED talk", LONG, 2),
    def("Learn one new fact and share it with someone", QUICK, 1),
    def("Read about a topic you know nothing about", LONG, 2),
    def("Take notes on something you learned today", QUICK, 1),
    def("Research one thing you've been curious about", LONG, 2),
];

const MOVE: &[TaskDef] = &[
    def("Stand up and stretch for 3 minutes", QUICK, 1),
    def("Do 10 jumping jacks", QUICK, 1),
    def("Walk around your space for 5 minutes", QUICK, 1),
    def("Do 5 push-ups (or wall push-ups)", QUICK, 1),
    def("Touch your toes 10 times", QUICK, 1),
    def("Dance to one full song", QUICK, 1),
    def("Do 20 seconds of planking", QUICK, 1),
    def("Walk up and down stairs twice", QUICK, 1),
    def("Do 10 squats", QUICK, 1),
    def("Stretch your neck and shoulders", QUICK, 1),
    def("Go outside for 5 minutes", QUICK, 1),
    def("Do arm circles for 1 minute", QUICK, 1),
];

const FOCUS: &[TaskDef] = &[
    def("Write 3 sentences about anything", QUICK, 1),
    def("List 5 things you're grateful for", QUICK, 1),
    def("Meditate or breathe deeply for 2 minutes", QUICK, 1),
    def("Brain dump: write down everything on your mind", LONG, 2),
    def("Plan tomorrow's top 3 priorities", QUICK, 1),
    def("Journal about your day so far", LONG, 2),
    def("Set one small goal for today", QUICK, 1),
    def("Doodle or sketch for 5 minutes", QUICK, 1),
    def("Close your eyes and count to 50", QUICK, 1),
    def("Write down one problem and one solution", QUICK, 1),
    def("Describe your perfect day in detail", LONG, 2),
    def("Free write for 5 minutes without stopping", QUICK, 1),
];

const LIFE_ADMIN: &[TaskDef] = &[
    def("Delete 10 old photos from your phone", QUICK, 1),
    def("Unsubscribe from 3 unwanted emails", QUICK, 1),
    def("Reply to one message you've been avoiding", QUICK, 1),
    def("Pay one bill or check your account", LONG, 2),
    def("Schedule one appointment you've been delaying", LONG, 3),
    def("Update one password to something secure", QUICK, 1),
    def("Clear 20 unread emails", LONG, 2),
    def("Backup one important file", QUICK, 1),
    def("Add one event to your calendar", QUICK, 1),
    def("Check your to-do list and cross off completed items", QUICK, 1),
    def("Organize your phone's home screen", QUICK, 1),
    def("Delete 5 unused apps", QUICK, 1),
    def("Clear your browser tabs", QUICK, 1),
    def("Make a quick shopping list", QUICK, 1),
];

/// A task as handed to the player, whether from the catalog or user-authored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCard {
    pub id: String,
    pub text: String,
    pub category: TaskCategory,
    pub duration: String,
    pub unlock_level: u32,
    #[serde(default)]
    pub custom: bool,
}

impl TaskCard {
    fn from_def(category: TaskCategory, index: usize, def: &TaskDef) -> Self {
        Self {
            id: format!("{}_{index}", category.name()),
            text: def.text.to_string(),
            category,
            duration: def.duration.to_string(),
            unlock_level: def.unlock_level,
            custom: false,
        }
    }

    fn fallback() -> Self {
        Self {
            id: "default".to_string(),
            text: "Take a deep breath and try again".to_string(),
            category: TaskCategory::Focus,
            duration: QUICK.to_string(),
            unlock_level: 1,
            custom: false,
        }
    }
}

/// Catalog tasks of one category unlocked at `level`, ids stable per
/// position in the category table.
pub fn tasks_in_category(category: TaskCategory, level: u32) -> Vec<TaskCard> {
    category
        .defs()
        .iter()
        .enumerate()
        .filter(|(_, def)| def.unlock_level <= level)
        .map(|(index, def)| TaskCard::from_def(category, index, def))
        .collect()
}

/// Every catalog task unlocked at `level`, followed by all custom tasks.
pub fn available_tasks(level: u32, custom: &[CustomTask]) -> Vec<TaskCard> {
    let mut cards: Vec<TaskCard> = TaskCategory::ALL
        .into_iter()
        .flat_map(|category| tasks_in_category(category, level))
        .collect();
    cards.extend(custom.iter().map(CustomTask::to_card));
    cards
}

pub fn draw_task<R: Rng + ?Sized>(level: u32, custom: &[CustomTask], rng: &mut R) -> TaskCard {
    available_tasks(level, custom)
        .choose(rng)
        .cloned()
        .unwrap_or_else(TaskCard::fallback)
}

/// Draws from one category, custom tasks of that category included; falls
/// back to the whole pool when the category has nothing unlocked.
pub fn draw_task_in_category<R: Rng + ?Sized>(
    category: TaskCategory,
    level: u32,
    custom: &[CustomTask],
    rng: &mut R,
) -> TaskCard {
    let mut cards = tasks_in_category(category, level);
    cards.extend(
        custom
            .iter()
            .filter(|task| task.category == category)
            .map(CustomTask::to_card),
    );
    match cards.choose(rng) {
        Some(card) => card.clone(),
        None => draw_task(level, custom, rng),
    }
}
