//! Room command handlers.
//!
//! Each handler mutates at most one part of the room or answers a query.
//! Failures are [`CommandError`]s whose text is sent back to the sender.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::command::{DndRequest, RoomCommand};
use super::key::{display_prefix, same_player};
use super::lineup::ClaimRefusal;
use super::topic::bold;
use super::{Role, Room, RoomContext, RoomEffect, User};
use crate::datetime::{format_datetime_default, format_time_ago};

/// Who a list reply is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// The sender.
    Sender,
    /// Another player, named explicitly.
    Player(String),
}

impl Subject {
    fn new(explicit: Option<&str>) -> Self {
        match explicit {
            Some(player) => Subject::Player(player.to_string()),
            None => Subject::Sender,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Sender => write!(f, "You are"),
            Subject::Player(player) => write!(f, "{player} is"),
        }
    }
}

/// A command that could not be carried out. State is unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("The position is already taken by you.")]
    AlreadyYours,

    #[error("The position is already taken by another player.")]
    PositionTaken,

    #[error("Position not found.")]
    PositionNotFound,

    #[error("Position or player not found.")]
    NothingToRemove,

    #[error("Unknown position.")]
    UnknownPosition,

    #[error("You have to be operator to use this command")]
    NotOperator,

    #[error("Invalid dnd syntax.")]
    InvalidDnd,

    #[error("No schedule set.")]
    NoSchedule,

    #[error("{0} already in the list.")]
    AlreadyListed(Subject),

    #[error("{0} not in the list.")]
    NotListed(Subject),

    #[error("Seen whom?")]
    MissingNick,
}

pub type CommandResult = std::result::Result<Vec<RoomEffect>, CommandError>;

fn reply(nick: &str, text: impl fmt::Display) -> RoomEffect {
    RoomEffect::Say(format!("{nick}: {text}"))
}

/// Execute `command` issued by `nick`.
pub fn dispatch(room: &mut Room, nick: &str, command: RoomCommand, ctx: &RoomContext) -> CommandResult {
    match command {
        RoomCommand::Help => Ok(vec![reply(
            nick,
            super::command::format_help(&ctx.bot_nick),
        )]),
        RoomCommand::Claim { label, player } => {
            let player = player.as_deref().unwrap_or(nick);
            match room.lineup.claim(label, player, ctx.now) {
                Ok(_) => Ok(Vec::new()),
                Err(ClaimRefusal::AlreadyYours) if same_player(player, nick) => {
                    Err(CommandError::AlreadyYours)
                }
                Err(ClaimRefusal::AlreadyYours | ClaimRefusal::Taken) => {
                    Err(CommandError::PositionTaken)
                }
                Err(ClaimRefusal::Unknown) => Err(CommandError::PositionNotFound),
            }
        }
        RoomCommand::Remove { target } => remove(room, nick, target.as_deref()),
        RoomCommand::Reset => {
            room.lineup.reset();
            room.opponent = None;
            Ok(Vec::new())
        }
        RoomCommand::Opponent(opponent) => {
            room.set_opponent(opponent);
            Ok(Vec::new())
        }
        RoomCommand::News(news) => {
            if !room.user(nick).is_some_and(User::is_operator) {
                return Err(CommandError::NotOperator);
            }
            room.news = news;
            Ok(Vec::new())
        }
        RoomCommand::TwoTeams => {
            room.set_two_teams(true);
            Ok(Vec::new())
        }
        RoomCommand::OneTeam => {
            room.set_two_teams(false);
            Ok(Vec::new())
        }
        RoomCommand::Ready { server } => Ok(vec![RoomEffect::Say(ready(room, &server))]),
        RoomCommand::Highlight => Ok(vec![RoomEffect::Say(highlight(room, ctx))]),
        RoomCommand::Dnd(request) => dnd(room, nick, request, ctx),
        RoomCommand::Whois { label } => whois(room, nick, label.as_deref(), ctx),
        RoomCommand::Schedule(label) => {
            if label.is_none() {
                room.schedule_players.clear();
            }
            room.schedule = label;
            Ok(Vec::new())
        }
        RoomCommand::Available { player } => {
            if room.schedule.is_none() {
                return Err(CommandError::NoSchedule);
            }
            let subject = Subject::new(player.as_deref());
            let player = player.as_deref().unwrap_or(nick);
            if room.schedule_players.iter().any(|p| same_player(p, player)) {
                return Err(CommandError::AlreadyListed(subject));
            }
            room.schedule_players.push(player.to_string());
            Ok(Vec::new())
        }
        RoomCommand::Unavailable { player } => {
            if room.schedule.is_none() {
                return Err(CommandError::NoSchedule);
            }
            let subject = Subject::new(player.as_deref());
            let player = player.as_deref().unwrap_or(nick);
            match room
                .schedule_players
                .iter()
                .position(|p| same_player(p, player))
            {
                Some(idx) => {
                    room.schedule_players.remove(idx);
                    Ok(Vec::new())
                }
                None => Err(CommandError::NotListed(subject)),
            }
        }
        RoomCommand::Sub { player } => {
            let subject = Subject::new(player.as_deref());
            let player = player.as_deref().unwrap_or(nick);
            if room.lineup.add_sub(player) {
                Ok(Vec::new())
            } else {
                Err(CommandError::AlreadyListed(subject))
            }
        }
        RoomCommand::Unsub { player } => {
            let subject = Subject::new(player.as_deref());
            let player = player.as_deref().unwrap_or(nick);
            if room.lineup.remove_sub(player) {
                Ok(Vec::new())
            } else {
                Err(CommandError::NotListed(subject))
            }
        }
        RoomCommand::Seen { nick: target } => {
            let target = target.ok_or(CommandError::MissingNick)?;
            Ok(vec![reply(nick, seen(room, &target, ctx))])
        }
        RoomCommand::Stats => Ok(vec![RoomEffect::Stats {
            reply_to: nick.to_string(),
        }]),
        RoomCommand::Feed => Ok(vec![RoomEffect::LatestFeedEntry {
            reply_to: nick.to_string(),
        }]),
        RoomCommand::Info(topic) => Ok(vec![RoomEffect::Info {
            topic,
            reply_to: nick.to_string(),
        }]),
    }
}

fn remove(room: &mut Room, nick: &str, target: Option<&str>) -> CommandResult {
    let index = match target {
        Some(target) => {
            let target = target.to_lowercase();
            room.lineup
                .find_label(&target)
                .or_else(|| room.lineup.position_of(&target))
        }
        None => room.lineup.position_of(nick),
    };
    let index = index.ok_or(CommandError::NothingToRemove)?;
    room.lineup.vacate(index);
    Ok(Vec::new())
}

fn ready(room: &Room, server: &str) -> String {
    let players: Vec<&str> = room
        .lineup
        .positions()
        .iter()
        .filter_map(|p| p.occupant())
        .collect();
    let mut text = format!("Go to server {server}: {}.", players.join(", "));
    if !room.lineup.subs().is_empty() {
        text.push_str(&format!(" Subs: {}", room.lineup.subs().join(", ")));
    }
    bold(&text)
}

/// Present members who are neither playing, subbing, reserved nor in dnd.
pub fn unsigned_users<'a>(room: &'a Room, ctx: &RoomContext) -> Vec<&'a str> {
    room.users
        .values()
        .filter(|u| !u.absent)
        .filter(|u| !u.is_dnd(ctx.now))
        .filter(|u| !ctx.is_reserved(&u.name))
        .filter(|u| !room.lineup.is_playing(&u.name))
        .filter(|u| !room.lineup.is_sub(&u.name))
        .map(|u| u.name.as_str())
        .collect()
}

fn highlight(room: &Room, ctx: &RoomContext) -> String {
    format!(
        "Please sign in: {}.{}",
        unsigned_users(room, ctx).join(", "),
        bold(" Use '!dnd <duration<s|m|h>>' to remove you from this list temporarily.")
    )
}

fn dnd(room: &mut Room, nick: &str, request: DndRequest, ctx: &RoomContext) -> CommandResult {
    let key = room
        .user(nick)
        .map(|u| u.name.clone())
        .unwrap_or_else(|| nick.to_string());
    let user = room
        .users
        .entry(key)
        .or_insert_with(|| User::new(nick, Role::Normal));

    match request {
        DndRequest::Clear => {
            user.dnd_until = None;
            Ok(vec![reply(nick, "Your dnd status has been reset.")])
        }
        DndRequest::Set { amount, unit, text } => {
            let until =
                dnd_expiry(ctx.now, amount * unit.seconds()).ok_or(CommandError::InvalidDnd)?;
            user.dnd_until = Some(until);
            Ok(vec![reply(
                nick,
                format!(
                    "Excluding you from highlighting for {text} {}. Reset with '!dnd'.",
                    unit.label(amount)
                ),
            )])
        }
        DndRequest::Invalid => Err(CommandError::InvalidDnd),
    }
}

/// `now` plus `seconds`, or `None` when that is not a representable instant.
fn dnd_expiry(now: DateTime<Utc>, seconds: f64) -> Option<DateTime<Utc>> {
    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    now.checked_add_signed(Duration::try_milliseconds(millis as i64)?)
}

fn whois(room: &Room, nick: &str, label: Option<&str>, ctx: &RoomContext) -> CommandResult {
    let position = label
        .and_then(|l| room.lineup.find_label(l))
        .map(|idx| &room.lineup.positions()[idx])
        .ok_or(CommandError::UnknownPosition)?;

    let text = match position.occupant() {
        None => "No player on this position.".to_string(),
        Some(player) => match position.claimed_at() {
            Some(at) => format!(
                "'{}' is '{player}' who signed up {} ago ({}).",
                display_prefix(player),
                format_time_ago(ctx.now - at),
                format_datetime_default(&at, &ctx.timezone)
            ),
            None => format!("'{}' is '{player}'.", display_prefix(player)),
        },
    };
    Ok(vec![reply(nick, text)])
}

fn seen(room: &Room, target: &str, ctx: &RoomContext) -> String {
    let status = match room.user(target) {
        None => "hasn't been seen yet".to_string(),
        Some(user) if !user.absent => "is here right now".to_string(),
        Some(user) => match user.last_seen {
            Some(at) => format!(
                "was last seen {} ago ({})",
                format_time_ago(ctx.now - at),
                format_datetime_default(&at, &ctx.timezone)
            ),
            None => "hasn't been seen yet".to_string(),
        },
    };
    format!("{target} {status}.")
}
