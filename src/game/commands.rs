//! Chat command parser.
//!
//! The router strips the command prefix and splits the line into a name and
//! arguments; [`parse`] turns that into a [`GameCommand`]. Each command belongs
//! to a [`CommandCategory`], which decides who may run it.

use log::trace;

use super::errors::GameError;
use crate::validation::normalize_username;

/// Permission group of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCategory {
    /// Anyone in chat.
    Game,
    /// Points and mode settings.
    Config,
    /// Reveals, access lists, reports and custom commands.
    Mod,
    /// Starting and finishing games.
    State,
}

impl CommandCategory {
    /// Game commands are unconditional; everything else needs a moderator,
    /// or a whitelisted user who is not also blacklisted.
    pub fn allows(self, is_mod: bool, is_whitelisted: bool, is_blacklisted: bool) -> bool {
        match self {
            CommandCategory::Game => true,
            _ => is_mod || (is_whitelisted && !is_blacklisted),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessAction {
    Add,
    Remove,
    Ban,
    Unban,
}

impl AccessAction {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg.to_ascii_lowercase().as_str() {
            "add" => Some(AccessAction::Add),
            "remove" => Some(AccessAction::Remove),
            "ban" => Some(AccessAction::Ban),
            "unban" => Some(AccessAction::Unban),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameCommand {
    /// `!guess <item>` or `!guess <family> <location>...`; which one is
    /// decided against the channel's families.
    Guess { first: String, rest: Vec<String> },
    /// `!points [user] [total]`; `None` means the caller.
    Points { username: Option<String>, total: bool },
    GuessPoints(String),
    FirstGuess(String),
    /// `!mode <name>`; `normal` resets.
    Mode(String),
    ModeDel(String),
    /// `!freebie <family> <item>`; `None` for `clear`.
    Freebie { family: String, item: Option<String> },
    HudItem(String),
    HudFamily {
        family: String,
        item: String,
        location: String,
    },
    Access { action: AccessAction, username: String },
    ReportTotals,
    /// `!addcom <name> <output...>`; `output` may be empty.
    AddCustom { name: String, output: String },
    /// `!delcom <name>`; trailing text is refused.
    DeleteCustom { name: String, has_output: bool },
    EditCustom { name: String, output: String },
    Start,
    Finish,
    Unknown,
}

fn missing(command: &'static str, usage: &'static str) -> GameError {
    GameError::MissingArguments { command, usage }
}

/// Category of a command name, known before its arguments are checked.
pub fn category_of(name: &str) -> Option<CommandCategory> {
    let category = match name.to_ascii_lowercase().as_str() {
        "guess" | "points" => CommandCategory::Game,
        "guesspoints" | "firstguess" | "mode" | "modedel" | "freebie" => CommandCategory::Config,
        "hud" | "report" | "addcom" | "delcom" | "editcom" => CommandCategory::Mod,
        "start" | "finish" => CommandCategory::State,
        _ => return None,
    };
    Some(category)
}

/// Parse a prefix-stripped command. Names are case-insensitive.
pub fn parse(name: &str, args: &[String]) -> Result<GameCommand, GameError> {
    let name = name.to_ascii_lowercase();
    let command = match name.as_str() {
        "guess" => match args.split_first() {
            Some((first, rest)) => GameCommand::Guess {
                first: first.clone(),
                rest: rest.to_vec(),
            },
            None => {
                return Err(missing(
                    "guess",
                    "Usage: !guess <item> or !guess <type> <locations>",
                ))
            }
        },
        "points" => parse_points(args),
        "guesspoints" => match args.first() {
            Some(value) => GameCommand::GuessPoints(value.clone()),
            None => return Err(missing("guesspoints", "Usage: !guesspoints <points>")),
        },
        "firstguess" => match args.first() {
            Some(value) => GameCommand::FirstGuess(value.clone()),
            None => return Err(missing("firstguess", "Usage: !firstguess <points>")),
        },
        "mode" => match args.first() {
            Some(mode) => GameCommand::Mode(mode.clone()),
            None => return Err(missing("mode", "Mode command requires a mode argument")),
        },
        "modedel" => match args.first() {
            Some(mode) => GameCommand::ModeDel(mode.clone()),
            None => {
                return Err(missing(
                    "modedel",
                    "Mode Delete command requires a mode argument",
                ))
            }
        },
        "freebie" => match args {
            [family, item, ..] => GameCommand::Freebie {
                family: family.clone(),
                item: if item.eq_ignore_ascii_case("clear") {
                    None
                } else {
                    Some(item.clone())
                },
            },
            _ => return Err(missing("freebie", "Usage: !freebie <type> <item|clear>")),
        },
        "hud" => parse_hud(args)?,
        "report" => match args.first() {
            Some(kind) if kind.eq_ignore_ascii_case("totals") => GameCommand::ReportTotals,
            _ => return Err(missing("report", "Usage: !report totals")),
        },
        "addcom" => parse_custom("addcom", args)?,
        "delcom" => parse_custom("delcom", args)?,
        "editcom" => parse_custom("editcom", args)?,
        "start" => GameCommand::Start,
        "finish" => GameCommand::Finish,
        _ => GameCommand::Unknown,
    };
    trace!("Parsed {:?} from '{}'", command, name);
    Ok(command)
}

/// Canonical form of a custom command name: no leading prefix, lowercase.
pub fn custom_command_name(raw: &str) -> String {
    raw.trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn parse_custom(command: &'static str, args: &[String]) -> Result<GameCommand, GameError> {
    let name = match args.first().map(|raw| custom_command_name(raw)) {
        Some(name) if !name.is_empty() => name,
        _ => return Err(missing(command, "Custom command name not provided")),
    };
    let output = args[1..].join(" ");
    Ok(match command {
        "addcom" => GameCommand::AddCustom { name, output },
        "delcom" => GameCommand::DeleteCustom {
            name,
            has_output: !output.is_empty(),
        },
        _ => GameCommand::EditCustom { name, output },
    })
}

fn parse_points(args: &[String]) -> GameCommand {
    let is_total = |arg: &String| arg.eq_ignore_ascii_case("total");
    match args {
        [] => GameCommand::Points {
            username: None,
            total: false,
        },
        [only] if is_total(only) => GameCommand::Points {
            username: None,
            total: true,
        },
        [user] => GameCommand::Points {
            username: Some(normalize_username(user)),
            total: false,
        },
        [user, flag] if is_total(flag) => GameCommand::Points {
            username: Some(normalize_username(user)),
            total: true,
        },
        _ => GameCommand::Unknown,
    }
}

fn parse_hud(args: &[String]) -> Result<GameCommand, GameError> {
    if let Some(action) = args.first().and_then(|a| AccessAction::from_arg(a)) {
        return match args.get(1) {
            Some(user) => Ok(GameCommand::Access {
                action,
                username: normalize_username(user),
            }),
            None => Err(missing("hud", "Usage: !hud add|remove|ban|unban <username>")),
        };
    }
    match args {
        [item] => Ok(GameCommand::HudItem(item.clone())),
        [family, item, location] => Ok(GameCommand::HudFamily {
            family: family.clone(),
            item: item.clone(),
            location: location.clone(),
        }),
        _ => Err(missing(
            "hud",
            "Usage: !hud <item> or !hud <type> <item> <location>",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(|s| s.to_string()).collect()
    }

    #[test]
    fn guess_keeps_first_and_rest() {
        assert_eq!(
            parse("guess", &args("bow")).unwrap(),
            GameCommand::Guess {
                first: "bow".into(),
                rest: vec![]
            }
        );
        match parse("GUESS", &args("medals deku dc")).unwrap() {
            GameCommand::Guess { first, rest } => {
                assert_eq!(first, "medals");
                assert_eq!(rest, vec!["deku", "dc"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_arguments_are_reported() {
        let err = parse("mode", &[]).unwrap_err();
        assert_eq!(err.to_string(), "Mode command requires a mode argument");
        assert!(matches!(
            parse("guess", &[]),
            Err(GameError::MissingArguments { command: "guess", .. })
        ));
        assert!(parse("hud", &[]).is_err());
        assert!(parse("hud", &args("add")).is_err());
        assert!(parse("hud", &args("medals forest")).is_err());
    }

    #[test]
    fn points_forms() {
        let p = |raw: &str| parse("points", &args(raw)).unwrap();
        assert_eq!(p(""), GameCommand::Points { username: None, total: false });
        assert_eq!(p("total"), GameCommand::Points { username: None, total: true });
        assert_eq!(
            p("@Bob"),
            GameCommand::Points { username: Some("Bob".into()), total: false }
        );
        assert_eq!(
            p("bob total"),
            GameCommand::Points { username: Some("bob".into()), total: true }
        );
        assert_eq!(p("bob lifetime"), GameCommand::Unknown);
    }

    #[test]
    fn hud_variants() {
        assert_eq!(parse("hud", &args("bow")).unwrap(), GameCommand::HudItem("bow".into()));
        assert_eq!(
            parse("hud", &args("medals forest deku")).unwrap(),
            GameCommand::HudFamily {
                family: "medals".into(),
                item: "forest".into(),
                location: "deku".into()
            }
        );
        assert_eq!(
            parse("hud", &args("ban @troll")).unwrap(),
            GameCommand::Access {
                action: AccessAction::Ban,
                username: "troll".into()
            }
        );
    }

    #[test]
    fn freebie_clear_and_set() {
        assert_eq!(
            parse("freebie", &args("medals CLEAR")).unwrap(),
            GameCommand::Freebie { family: "medals".into(), item: None }
        );
        assert_eq!(
            parse("freebie", &args("medals light")).unwrap(),
            GameCommand::Freebie { family: "medals".into(), item: Some("light".into()) }
        );
    }

    #[test]
    fn categories_gate_as_expected() {
        assert_eq!(category_of("points"), Some(CommandCategory::Game));
        assert_eq!(category_of("start"), Some(CommandCategory::State));
        assert_eq!(category_of("editcom"), Some(CommandCategory::Mod));
        assert_eq!(category_of("GuessPoints"), Some(CommandCategory::Config));
        assert_eq!(category_of("lurk"), None);

        let state = CommandCategory::State;
        assert!(state.allows(true, false, true));
        assert!(state.allows(false, true, false));
        assert!(!state.allows(false, true, true));
        assert!(!state.allows(false, false, false));
        assert!(CommandCategory::Game.allows(false, false, true));
    }

    #[test]
    fn custom_command_forms() {
        assert_eq!(
            parse("addcom", &args("!Discord join us at example.org")).unwrap(),
            GameCommand::AddCustom {
                name: "discord".into(),
                output: "join us at example.org".into()
            }
        );
        assert_eq!(
            parse("delcom", &args("discord now")).unwrap(),
            GameCommand::DeleteCustom { name: "discord".into(), has_output: true }
        );
        assert_eq!(
            parse("editcom", &args("discord")).unwrap(),
            GameCommand::EditCustom { name: "discord".into(), output: String::new() }
        );
        let err = parse("addcom", &args("!")).unwrap_err();
        assert_eq!(err.to_string(), "Custom command name not provided");
        assert!(parse("delcom", &[]).is_err());
    }

    #[test]
    fn unrelated_commands_are_unknown() {
        assert_eq!(parse("lurk", &[]).unwrap(), GameCommand::Unknown);
    }
}
