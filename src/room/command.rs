//! Chat command parser for lineup rooms.
//!
//! A command is a message starting with `!`, followed by a case-insensitive
//! token and space-separated arguments. Tokens that name no command are not
//! commands at all: the parser returns `None` and the message is ignored.

use super::lineup::{PositionLabel, RosterSize};

/// Command prefix character.
pub const PREFIX: char = '!';

/// Time unit accepted by `!dnd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DndUnit {
    Seconds,
    Minutes,
    Hours,
}

impl DndUnit {
    /// Length of one unit in seconds.
    pub fn seconds(self) -> f64 {
        match self {
            DndUnit::Seconds => 1.0,
            DndUnit::Minutes => 60.0,
            DndUnit::Hours => 3600.0,
        }
    }

    /// Unit name for replies, singular when the amount is exactly one.
    pub fn label(self, amount: f64) -> &'static str {
        let singular = amount == 1.0;
        match (self, singular) {
            (DndUnit::Seconds, true) => "second",
            (DndUnit::Seconds, false) => "seconds",
            (DndUnit::Minutes, true) => "minute",
            (DndUnit::Minutes, false) => "minutes",
            (DndUnit::Hours, true) => "hour",
            (DndUnit::Hours, false) => "hours",
        }
    }
}

/// Parsed `!dnd` argument.
#[derive(Debug, Clone, PartialEq)]
pub enum DndRequest {
    /// Clear the dnd expiry.
    Clear,
    /// Set the expiry `amount` units from now. `text` is the amount as typed.
    Set {
        amount: f64,
        unit: DndUnit,
        text: String,
    },
    /// Unparsable argument.
    Invalid,
}

impl DndRequest {
    /// Parse `<n>[.<fraction>][ ]<s|m|h>`.
    ///
    /// Only the start of the argument is matched, so `30min` reads as thirty
    /// minutes.
    pub fn parse(args: &[&str]) -> Self {
        let Some(first) = args.first() else {
            return DndRequest::Clear;
        };
        if *first == "0" {
            return DndRequest::Clear;
        }

        let joined = args.join(" ");
        let digits_end = joined
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(joined.len());
        if digits_end == 0 {
            return DndRequest::Invalid;
        }
        let mut end = digits_end;
        let rest = &joined[end..];
        if let Some(after_dot) = rest.strip_prefix('.') {
            let fraction = after_dot
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(after_dot.len());
            end += 1 + fraction;
        }
        let text = &joined[..end];

        let mut unit_part = &joined[end..];
        if let Some(stripped) = unit_part.strip_prefix(' ') {
            unit_part = stripped;
        }
        let unit = match unit_part.chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('s') => DndUnit::Seconds,
            Some('m') => DndUnit::Minutes,
            Some('h') => DndUnit::Hours,
            _ => return DndRequest::Invalid,
        };

        match text.parse::<f64>() {
            Ok(amount) if !amount.is_finite() => DndRequest::Invalid,
            Ok(amount) if amount == 0.0 => DndRequest::Clear,
            Ok(amount) => DndRequest::Set {
                amount,
                unit,
                text: text.to_string(),
            },
            Err(_) => DndRequest::Invalid,
        }
    }
}

/// Informational commands answered from configuration or outside the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoTopic {
    ServerIps,
    Websites,
    Downloads,
    Voice,
}

/// A parsed room command.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomCommand {
    Help,
    /// Claim a position for `player` (default: the sender).
    Claim {
        label: PositionLabel,
        player: Option<String>,
    },
    /// Vacate a position by name or occupant, or the sender's.
    Remove { target: Option<String> },
    Reset,
    /// Set or clear the opponent label.
    Opponent(Option<String>),
    /// Set or clear the news text.
    News(Option<String>),
    TwoTeams,
    OneTeam,
    Ready { server: String },
    Highlight,
    Dnd(DndRequest),
    Whois { label: Option<String> },
    /// Set the schedule, or clear it together with the availability list.
    Schedule(Option<String>),
    Available { player: Option<String> },
    Unavailable { player: Option<String> },
    Sub { player: Option<String> },
    Unsub { player: Option<String> },
    Seen { nick: Option<String> },
    Stats,
    Feed,
    Info(InfoTopic),
}

fn joined(args: &[&str]) -> Option<String> {
    let text = args.join(" ");
    (!text.is_empty()).then_some(text)
}

fn first(args: &[&str]) -> Option<String> {
    args.first().map(|s| s.to_string())
}

/// Parse a chat message as a room command.
///
/// `size` decides which position labels exist.
pub fn parse_command(text: &str, size: RosterSize) -> Option<RoomCommand> {
    let body = text.strip_prefix(PREFIX)?;
    // The token must follow the prefix directly.
    if body.starts_with(char::is_whitespace) {
        return None;
    }
    let mut words = body.split_whitespace();
    let token = words.next()?.to_lowercase();
    let args: Vec<&str> = words.collect();

    let command = match token.as_str() {
        "help" | "commands" | "cmds" => RoomCommand::Help,
        "remove" | "delete" => RoomCommand::Remove {
            target: first(&args),
        },
        "reset" | "clear" | "empty" => RoomCommand::Reset,
        "vs" | "against" | "opponent" => RoomCommand::Opponent(joined(&args)),
        "news" | "info" => RoomCommand::News(joined(&args)),
        "twoteams" => RoomCommand::TwoTeams,
        "oneteam" => RoomCommand::OneTeam,
        "ready" => RoomCommand::Ready {
            server: args.join(" "),
        },
        "highlight" => RoomCommand::Highlight,
        "dnd" => RoomCommand::Dnd(DndRequest::parse(&args)),
        "whois" | "who" => RoomCommand::Whois {
            label: args.first().map(|s| s.to_lowercase()),
        },
        "schedule" => RoomCommand::Schedule(joined(&args)),
        "available" => RoomCommand::Available {
            player: first(&args),
        },
        "unavailable" => RoomCommand::Unavailable {
            player: first(&args),
        },
        "sub" => RoomCommand::Sub {
            player: first(&args),
        },
        "unsub" => RoomCommand::Unsub {
            player: first(&args),
        },
        "seen" => RoomCommand::Seen { nick: first(&args) },
        "stats" => RoomCommand::Stats,
        "feed" | "twitter" => RoomCommand::Feed,
        "ips" => RoomCommand::Info(InfoTopic::ServerIps),
        "sites" | "websites" => RoomCommand::Info(InfoTopic::Websites),
        "files" | "update" | "download" => RoomCommand::Info(InfoTopic::Downloads),
        "teamspeak" | "ts" => RoomCommand::Info(InfoTopic::Voice),
        other => {
            let label = size.parse_label(other)?;
            RoomCommand::Claim {
                label,
                player: first(&args),
            }
        }
    };

    Some(command)
}

/// Command information for help display.
pub struct CommandInfo {
    /// Command name.
    pub name: &'static str,
    /// Command aliases.
    pub aliases: &'static [&'static str],
    /// Command syntax.
    pub syntax: &'static str,
}

/// Get all available command information, in help order.
pub fn get_command_help() -> Vec<CommandInfo> {
    vec![
        CommandInfo {
            name: "help",
            aliases: &["commands", "cmds"],
            syntax: "!help",
        },
        CommandInfo {
            name: "<pos>",
            aliases: &[],
            syntax: "!<pos>",
        },
        CommandInfo {
            name: "remove",
            aliases: &["delete"],
            syntax: "!remove [pos]",
        },
        CommandInfo {
            name: "reset",
            aliases: &["clear", "empty"],
            syntax: "!reset",
        },
        CommandInfo {
            name: "vs",
            aliases: &["against", "opponent"],
            syntax: "!vs [team]",
        },
        CommandInfo {
            name: "oneteam",
            aliases: &[],
            syntax: "!oneteam",
        },
        CommandInfo {
            name: "twoteams",
            aliases: &[],
            syntax: "!twoteams",
        },
        CommandInfo {
            name: "news",
            aliases: &["info"],
            syntax: "!info <text>",
        },
        CommandInfo {
            name: "ready",
            aliases: &[],
            syntax: "!ready <server>",
        },
        CommandInfo {
            name: "dnd",
            aliases: &[],
            syntax: "!dnd <duration<s|m|h>>",
        },
        CommandInfo {
            name: "whois",
            aliases: &["who"],
            syntax: "!whois <pos>",
        },
        CommandInfo {
            name: "schedule",
            aliases: &[],
            syntax: "!schedule <info>",
        },
        CommandInfo {
            name: "sub",
            aliases: &[],
            syntax: "!sub",
        },
        CommandInfo {
            name: "unsub",
            aliases: &[],
            syntax: "!unsub",
        },
        CommandInfo {
            name: "available",
            aliases: &[],
            syntax: "!available",
        },
        CommandInfo {
            name: "unavailable",
            aliases: &[],
            syntax: "!unavailable",
        },
        CommandInfo {
            name: "highlight",
            aliases: &[],
            syntax: "!highlight",
        },
        CommandInfo {
            name: "sites",
            aliases: &["websites"],
            syntax: "!sites",
        },
        CommandInfo {
            name: "files",
            aliases: &["update", "download"],
            syntax: "!files",
        },
        CommandInfo {
            name: "ips",
            aliases: &[],
            syntax: "!ips",
        },
        CommandInfo {
            name: "stats",
            aliases: &[],
            syntax: "!stats",
        },
        CommandInfo {
            name: "feed",
            aliases: &["twitter"],
            syntax: "!feed",
        },
        CommandInfo {
            name: "teamspeak",
            aliases: &["ts"],
            syntax: "!teamspeak",
        },
        CommandInfo {
            name: "seen",
            aliases: &[],
            syntax: "!seen <nick>",
        },
    ]
}

/// Format the one-line command list.
pub fn format_help(bot_nick: &str) -> String {
    let syntax: Vec<&str> = get_command_help().iter().map(|info| info.syntax).collect();
    format!(
        "Commands: {}. Use '/invite {bot_nick} #yourchan' to invite me to your own channel.",
        syntax.join(", ")
    )
}
