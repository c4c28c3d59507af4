use progression::{
    Clock, Color, CosmeticUnlock, HatId, PetId, ProgressionEngine, ReflectionOutcome, Store,
    TaskCard, TaskCategory, TaskOutcome, XpAward,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::info;

const DEFAULT_DESK_HISTORY_DAYS: u32 = 7;

/// How the player answers the mirror's "Were you productive today?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MirrorAnswer {
    Yes,
    Kinda,
    No,
}

impl MirrorAnswer {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "yes" | "y" => Some(MirrorAnswer::Yes),
            "kinda" | "sorta" => Some(MirrorAnswer::Kinda),
            "no" | "n" => Some(MirrorAnswer::No),
            _ => None,
        }
    }

    fn was_productive(self) -> bool {
        matches!(self, MirrorAnswer::Yes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WearTarget {
    Color(Color),
    Hat(Option<HatId>),
    Pet(Option<PetId>),
}

/// Something the player does in the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Intent {
    Hud,
    TaskMachine,
    Roulette { category: Option<TaskCategory> },
    Accept,
    Resolve { id: String, outcome: TaskOutcome },
    ActiveTasks,
    Mirror(MirrorAnswer),
    Desk { text: String },
    DeskHistory { days: Option<u32> },
    Closet,
    Wear(WearTarget),
    Couch,
    CustomAdd {
        category: String,
        duration: String,
        text: String,
    },
    CustomDelete { id: String },
    CustomList,
    Stats,
    Purge { days: Option<u32> },
    Reset,
}

/// One player's session: the engine plus whatever the world is currently
/// showing (the last card offered by the task machine or roulette).
pub(crate) struct Session<S: Store, C: Clock> {
    engine: ProgressionEngine<S, C>,
    rng: StdRng,
    offered: Option<TaskCard>,
}

impl<S: Store, C: Clock> Session<S, C> {
    pub(crate) fn new(engine: ProgressionEngine<S, C>, rng: StdRng) -> Self {
        Self {
            engine,
            rng,
            offered: None,
        }
    }

    pub(crate) fn engine(&self) -> &ProgressionEngine<S, C> {
        &self.engine
    }

    /// Applies `intent` and returns the lines to show. An empty result means
    /// the world stays silent.
    pub(crate) fn apply(&mut self, intent: Intent) -> Vec<String> {
        let mut out = Vec::new();
        match intent {
            Intent::Hud => self.hud(&mut out),
            Intent::TaskMachine => {
                let card = self.engine.draw_task(&mut self.rng);
                self.offer(card, &mut out);
            }
            Intent::Roulette { category } => {
                let category = match category {
                    Some(category) => category,
                    None => *TaskCategory::ALL
                        .choose(&mut self.rng)
                        .unwrap_or(&TaskCategory::Focus),
                };
                out.push(format!("The wheel lands on {category}!"));
                let card = self.engine.draw_task_in_category(category, &mut self.rng);
                self.offer(card, &mut out);
            }
            Intent::Accept => match self.offered.take() {
                Some(card) => {
                    out.push(format!("Accepted: {} [{}]", card.text, card.id));
                    self.engine.accept_task(card);
                }
                None => out.push("Nothing to accept. Visit the task machine first.".to_string()),
            },
            Intent::Resolve { id, outcome } => {
                match self.engine.resolve_active_task(&id, outcome) {
                    Some(award) => {
                        out.push(format!("Marked {id} as {outcome}."));
                        push_award(&award, &mut out);
                    }
                    None => out.push(format!("No active task with id {id}.")),
                }
            }
            Intent::ActiveTasks => {
                let active = self.engine.active_tasks();
                if active.is_empty() {
                    out.push("No active tasks.".to_string());
                }
                for card in active {
                    out.push(format_card(card));
                }
            }
            Intent::Mirror(answer) => self.mirror(answer, &mut out),
            Intent::Desk { text } => match self.engine.log_desk_task(&text) {
                Ok((entry, award)) => {
                    out.push(format!("Logged for {}: {}", entry.date, entry.text));
                    push_award(&award, &mut out);
                }
                Err(error) => out.push(error.to_string()),
            },
            Intent::DeskHistory { days } => {
                let days = days.unwrap_or(DEFAULT_DESK_HISTORY_DAYS);
                let recent = self.engine.recent_daily_logs(days);
                if recent.is_empty() {
                    out.push(format!("Nothing logged in the last {days} days."));
                }
                for (date, entries) in recent {
                    out.push(format!("{date}:"));
                    for entry in entries {
                        out.push(format!("  {} {}", entry.time.format("%H:%M"), entry.text));
                    }
                }
            }
            Intent::Closet => self.closet(&mut out),
            Intent::Wear(target) => self.wear(target, &mut out),
            Intent::Couch => {}
            Intent::CustomAdd {
                category,
                duration,
                text,
            } => match self
                .engine
                .add_custom_task(&text, &category, Some(duration.as_str()))
            {
                Ok(task) => out.push(format!("Added custom task {}: {}", task.id, task.text)),
                Err(error) => out.push(error.to_string()),
            },
            Intent::CustomDelete { id } => {
                if self.engine.delete_custom_task(&id) {
                    out.push(format!("Deleted {id}."));
                } else {
                    out.push(format!("No custom task with id {id}."));
                }
            }
            Intent::CustomList => {
                let tasks = self.engine.custom_tasks();
                if tasks.is_empty() {
                    out.push("No custom tasks yet.".to_string());
                }
                for task in tasks {
                    out.push(format!(
                        "{} {} [{}] {}",
                        task.duration, task.text, task.category, task.id
                    ));
                }
            }
            Intent::Stats => {
                let stats = self.engine.stats();
                out.push(format!(
                    "Tasks: {} total, {} done, {} half, {} lied",
                    stats.total, stats.completed, stats.half, stats.lied
                ));
                out.push(format!(
                    "Completion rate {}%, lying probability {}%",
                    stats.completion_rate, stats.lying_probability
                ));
            }
            Intent::Purge { days } => {
                let report = match days {
                    Some(days) => self.engine.purge_older_than(days),
                    None => self.engine.purge_expired_logs(),
                };
                out.push(format!(
                    "Removed {} daily logs, kept {}.",
                    report.removed.len(),
                    report.retained
                ));
            }
            Intent::Reset => {
                self.engine.reset();
                self.offered = None;
                out.push("Progress reset. Fresh start!".to_string());
            }
        }

        if self.engine.storage_degraded() && !out.is_empty() {
            out.push("(progress could not be saved; playing from memory)".to_string());
        }
        out
    }

    fn offer(&mut self, card: TaskCard, out: &mut Vec<String>) {
        out.push(format_card(&card));
        out.push("Type 'accept' to take it on.".to_string());
        self.offered = Some(card);
    }

    fn hud(&self, out: &mut Vec<String>) {
        let snapshot = self.engine.snapshot();
        let progress = snapshot.progress;
        out.push(format!(
            "Level {}  XP {}/{} ({}%)  Streak {}",
            snapshot.level,
            progress.xp,
            progress.next_threshold,
            progress.percent,
            snapshot.streak
        ));
        if snapshot.can_check_in_today {
            out.push("The mirror is waiting for today's reflection.".to_string());
        }
    }

    fn mirror(&mut self, answer: MirrorAnswer, out: &mut Vec<String>) {
        match self.engine.reflect(answer.was_productive()) {
            ReflectionOutcome::AlreadyCheckedIn => {
                out.push("You already reflected today. Come back tomorrow!".to_string());
            }
            ReflectionOutcome::Recorded { new_streak: 0 } => {
                out.push("Tomorrow is a new day. Streak reset.".to_string());
            }
            ReflectionOutcome::Recorded { new_streak } => {
                info!(new_streak, "mirror_reflection");
                out.push(format!("Streak: {new_streak} day(s). Keep it going!"));
            }
        }
    }

    fn closet(&self, out: &mut Vec<String>) {
        let cosmetics = self.engine.cosmetics();
        let colors: Vec<&str> = cosmetics
            .unlocked_colors
            .iter()
            .map(Color::as_str)
            .collect();
        let hats: Vec<&str> = cosmetics.unlocked_hats.iter().map(|hat| hat.name()).collect();
        let pets: Vec<&str> = cosmetics.unlocked_pets.iter().map(|pet| pet.name()).collect();
        out.push(format!(
            "Colors: {} (wearing {})",
            colors.join(", "),
            cosmetics.active_color
        ));
        out.push(format!(
            "Hats: {} (wearing {})",
            list_or_none(&hats),
            cosmetics.active_hat.map_or("none", HatId::name)
        ));
        out.push(format!(
            "Pets: {} (with {})",
            list_or_none(&pets),
            cosmetics.active_pet.map_or("none", PetId::name)
        ));
    }

    fn wear(&mut self, target: WearTarget, out: &mut Vec<String>) {
        let result = match &target {
            WearTarget::Color(color) => self.engine.select_color(color),
            WearTarget::Hat(hat) => self.engine.select_hat(*hat),
            WearTarget::Pet(pet) => self.engine.select_pet(*pet),
        };
        match result {
            Ok(()) => {
                let cosmetics = self.engine.cosmetics();
                let line = match target {
                    WearTarget::Color(_) => format!("Now wearing {}.", cosmetics.active_color),
                    WearTarget::Hat(Some(hat)) => format!("Now wearing the {} hat.", hat.name()),
                    WearTarget::Hat(None) => "Hat off.".to_string(),
                    WearTarget::Pet(Some(pet)) => format!("{} follows you around.", pet.name()),
                    WearTarget::Pet(None) => "Your pet takes a nap.".to_string(),
                };
                out.push(line);
            }
            Err(error) => out.push(error.to_string()),
        }
    }
}

fn format_card(card: &TaskCard) -> String {
    let tag = if card.custom { " (custom)" } else { "" };
    format!(
        "{} {} [{}] {}{tag}",
        card.duration, card.text, card.category, card.id
    )
}

fn push_award(award: &XpAward, out: &mut Vec<String>) {
    out.push(format!("+{} XP ({} total)", award.awarded, award.xp));
    let Some(level_up) = &award.level_up else {
        return;
    };
    out.push(format!("LEVEL UP! You are now level {}.", level_up.new_level));
    for unlock in &level_up.unlocked {
        out.push(match unlock {
            CosmeticUnlock::Color(color) => format!("Unlocked color {color}"),
            CosmeticUnlock::Hat(hat) => format!("Unlocked hat: {}", hat.name()),
            CosmeticUnlock::Pet(pet) => format!("Unlocked pet: {}", pet.name()),
        });
    }
}

fn list_or_none(items: &[&str]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
