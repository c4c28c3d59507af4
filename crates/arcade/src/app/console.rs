use std::collections::HashMap;

use progression::{Color, HatId, PetId, TaskCategory, TaskOutcome};

use super::session::{Intent, MirrorAnswer, WearTarget};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LocalAction {
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParsedCommand {
    Local(LocalAction),
    Intent(Intent),
    Quit,
}

/// What the loop should do after a line was processed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LineOutcome {
    Handled,
    Intent(Intent),
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandParseError {
    reason: String,
    usage: String,
}

impl CommandParseError {
    fn new(reason: impl Into<String>, usage: &str) -> Self {
        Self {
            reason: reason.into(),
            usage: usage.to_string(),
        }
    }
}

type ParseFn = dyn Fn(&[String]) -> Result<ParsedCommand, CommandParseError> + Send + Sync;
type BuiltinParse = fn(&[String]) -> Result<ParsedCommand, CommandParseError>;

pub(crate) struct CommandSpec {
    name: String,
    help: String,
    arg_schema: String,
    parse: Box<ParseFn>,
}

pub(crate) struct ConsoleCommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl ConsoleCommandRegistry {
    pub(crate) fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub(crate) fn with_world_commands() -> Self {
        let builtins: [(&str, &str, &str, BuiltinParse); 20] = [
            ("help", "List commands", "", parse_help_command),
            ("hud", "Show level, XP and streak", "", parse_hud_command),
            ("task", "Use the task machine", "", parse_task_command),
            (
                "roulette",
                "Spin the roulette wheel",
                "[category]",
                parse_roulette_command,
            ),
            ("accept", "Accept the offered task", "", parse_accept_command),
            ("active", "List accepted tasks", "", parse_active_command),
            (
                "done",
                "Report how an accepted task went",
                "<task_id> <completed|half|lied>",
                parse_done_command,
            ),
            (
                "mirror",
                "Reflect on today",
                "<yes|kinda|no>",
                parse_mirror_command,
            ),
            ("desk", "Log a task for today", "<text...>", parse_desk_command),
            (
                "history",
                "Show the desk log",
                "[days:u32]",
                parse_history_command,
            ),
            ("closet", "List cosmetics", "", parse_closet_command),
            (
                "wear",
                "Wear an unlocked cosmetic",
                "<color|hat|pet> <id|none>",
                parse_wear_command,
            ),
            ("couch", "Sit on the couch", "", parse_couch_command),
            (
                "custom_add",
                "Create a custom task",
                "<category> <duration> <text...>",
                parse_custom_add_command,
            ),
            (
                "custom_delete",
                "Delete a custom task",
                "<task_id>",
                parse_custom_delete_command,
            ),
            ("custom_list", "List custom tasks", "", parse_custom_list_command),
            ("stats", "Show task statistics", "", parse_stats_command),
            (
                "purge",
                "Delete old daily logs",
                "[days:u32]",
                parse_purge_command,
            ),
            ("reset", "Erase all progress", "", parse_reset_command),
            ("quit", "Quit", "", parse_quit_command),
        ];

        let mut registry = Self::new();
        for (name, help, arg_schema, parse) in builtins {
            registry
                .register(name, help, arg_schema, parse)
                .expect("built-in command registration should not fail");
        }
        registry
    }

    pub(crate) fn register<F>(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        arg_schema: impl Into<String>,
        parse: F,
    ) -> Result<(), String>
    where
        F: Fn(&[String]) -> Result<ParsedCommand, CommandParseError> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        let lower = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&lower) {
            return Err(format!("duplicate command registration: {name}"));
        }

        self.specs.push(CommandSpec {
            name,
            help: help.into(),
            arg_schema: arg_schema.into(),
            parse: Box::new(parse),
        });
        self.lookup_by_lower_name
            .insert(lower, self.specs.len() - 1);
        Ok(())
    }

    pub(crate) fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        let lower = input_name.to_ascii_lowercase();
        let index = self.lookup_by_lower_name.get(&lower)?;
        self.specs.get(*index)
    }

    pub(crate) fn iter_specs_in_order(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.specs.iter().map(|spec| {
            (
                spec.name.as_str(),
                spec.help.as_str(),
                spec.arg_schema.as_str(),
            )
        })
    }
}

pub(crate) struct ConsoleCommandProcessor {
    registry: ConsoleCommandRegistry,
}

impl Default for ConsoleCommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleCommandProcessor {
    pub(crate) fn new() -> Self {
        Self {
            registry: ConsoleCommandRegistry::with_world_commands(),
        }
    }

    /// Parses one input line. Help text and parse errors go straight to
    /// `out`; world intents are handed back to the caller.
    pub(crate) fn process_line(&self, raw_line: &str, out: &mut Vec<String>) -> LineOutcome {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            return LineOutcome::Handled;
        }

        let tokens = match tokenize_line(trimmed) {
            Ok(tokens) => tokens,
            Err(reason) => {
                out.push(format!("error: {reason}. usage: help"));
                return LineOutcome::Handled;
            }
        };
        let Some((command_name, args)) = tokens.split_first() else {
            return LineOutcome::Handled;
        };

        let Some(spec) = self.registry.lookup(command_name) else {
            out.push(format!(
                "error: unknown command '{}'. try: help",
                command_name
            ));
            return LineOutcome::Handled;
        };

        match (spec.parse)(args) {
            Ok(ParsedCommand::Local(action)) => {
                self.apply_local_action(action, out);
                LineOutcome::Handled
            }
            Ok(ParsedCommand::Intent(intent)) => LineOutcome::Intent(intent),
            Ok(ParsedCommand::Quit) => LineOutcome::Quit,
            Err(error) => {
                out.push(format!("error: {}. usage: {}", error.reason, error.usage));
                LineOutcome::Handled
            }
        }
    }

    fn apply_local_action(&self, action: LocalAction, out: &mut Vec<String>) {
        match action {
            LocalAction::Help => {
                for (name, help, arg_schema) in self.registry.iter_specs_in_order() {
                    let line = if arg_schema.is_empty() {
                        format!("{name} - {help}")
                    } else {
                        format!("{name} {arg_schema} - {help}")
                    };
                    out.push(line);
                }
            }
        }
    }
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut seen_token_content = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                seen_token_content = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if seen_token_content {
                    tokens.push(std::mem::take(&mut current));
                    seen_token_content = false;
                }
            }
            _ => {
                current.push(ch);
                seen_token_content = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if seen_token_content {
        tokens.push(current);
    }

    Ok(tokens)
}

fn intent(intent: Intent) -> Result<ParsedCommand, CommandParseError> {
    Ok(ParsedCommand::Intent(intent))
}

fn parse_help_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "help")?;
    Ok(ParsedCommand::Local(LocalAction::Help))
}

fn parse_hud_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "hud")?;
    intent(Intent::Hud)
}

fn parse_task_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "task")?;
    intent(Intent::TaskMachine)
}

fn parse_roulette_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "roulette [category]";
    let category = match args {
        [] => None,
        [name] => Some(TaskCategory::from_name(name).ok_or_else(|| {
            CommandParseError::new(
                format!("unknown category '{name}' (expected clean|learn|move|focus|lifeAdmin)"),
                USAGE,
            )
        })?),
        _ => return Err(CommandParseError::new("expected at most one argument", USAGE)),
    };
    intent(Intent::Roulette { category })
}

fn parse_accept_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "accept")?;
    intent(Intent::Accept)
}

fn parse_active_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "active")?;
    intent(Intent::ActiveTasks)
}

fn parse_done_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "done <task_id> <completed|half|lied>";
    let [id, outcome] = args else {
        return Err(CommandParseError::new(
            "expected <task_id> and <outcome>",
            USAGE,
        ));
    };
    let outcome = TaskOutcome::from_name(outcome).ok_or_else(|| {
        CommandParseError::new(
            format!("unknown outcome '{outcome}' (expected completed|half|lied)"),
            USAGE,
        )
    })?;
    intent(Intent::Resolve {
        id: id.clone(),
        outcome,
    })
}

fn parse_mirror_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "mirror <yes|kinda|no>";
    let [answer] = args else {
        return Err(CommandParseError::new(
            "expected exactly one argument <answer>",
            USAGE,
        ));
    };
    let answer = MirrorAnswer::from_name(answer).ok_or_else(|| {
        CommandParseError::new(
            format!("unknown answer '{answer}' (expected yes|kinda|no)"),
            USAGE,
        )
    })?;
    intent(Intent::Mirror(answer))
}

fn parse_desk_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    if args.is_empty() {
        return Err(CommandParseError::new(
            "missing required argument <text...>",
            "desk <text...>",
        ));
    }
    intent(Intent::Desk {
        text: args.join(" "),
    })
}

fn parse_history_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let days = parse_optional_days(args, "history [days]")?;
    intent(Intent::DeskHistory { days })
}

fn parse_closet_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "closet")?;
    intent(Intent::Closet)
}

fn parse_wear_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "wear <color|hat|pet> <id|none>";
    let [kind, id] = args else {
        return Err(CommandParseError::new("expected <kind> and <id>", USAGE));
    };
    let none = id.eq_ignore_ascii_case("none");
    let target = match kind.to_ascii_lowercase().as_str() {
        "color" => WearTarget::Color(Color::new(id.clone())),
        "hat" if none => WearTarget::Hat(None),
        "hat" => WearTarget::Hat(Some(HatId::from_name(id).ok_or_else(|| {
            CommandParseError::new(format!("unknown hat '{id}'"), USAGE)
        })?)),
        "pet" if none => WearTarget::Pet(None),
        "pet" => WearTarget::Pet(Some(PetId::from_name(id).ok_or_else(|| {
            CommandParseError::new(format!("unknown pet '{id}'"), USAGE)
        })?)),
        _ => {
            return Err(CommandParseError::new(
                format!("unknown cosmetic kind '{kind}' (expected color|hat|pet)"),
                USAGE,
            ))
        }
    };
    intent(Intent::Wear(target))
}

fn parse_couch_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "couch")?;
    intent(Intent::Couch)
}

fn parse_custom_add_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let [category, duration, text @ ..] = args else {
        return Err(CommandParseError::new(
            "expected <category> <duration> <text...>",
            "custom_add <category> <duration> <text...>",
        ));
    };
    // Category, duration and text checks belong to the engine.
    intent(Intent::CustomAdd {
        category: category.clone(),
        duration: duration.clone(),
        text: text.join(" "),
    })
}

fn parse_custom_delete_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let [id] = args else {
        return Err(CommandParseError::new(
            "expected exactly one argument <task_id>",
            "custom_delete <task_id>",
        ));
    };
    intent(Intent::CustomDelete { id: id.clone() })
}

fn parse_custom_list_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "custom_list")?;
    intent(Intent::CustomList)
}

fn parse_stats_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "stats")?;
    intent(Intent::Stats)
}

fn parse_purge_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let days = parse_optional_days(args, "purge [days]")?;
    intent(Intent::Purge { days })
}

fn parse_reset_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "reset")?;
    intent(Intent::Reset)
}

fn parse_quit_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "quit")?;
    Ok(ParsedCommand::Quit)
}

fn parse_optional_days(args: &[String], usage: &str) -> Result<Option<u32>, CommandParseError> {
    match args {
        [] => Ok(None),
        [raw] => raw.parse::<u32>().map(Some).map_err(|_| {
            CommandParseError::new(format!("invalid day count '{raw}' (expected u32)"), usage)
        }),
        _ => Err(CommandParseError::new("expected at most one argument", usage)),
    }
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError::new("unexpected extra arguments", usage))
    }
}
