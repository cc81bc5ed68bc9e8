//! Room members as seen through roster polls and membership events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Channel role of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Normal,
    Voice,
    Operator,
}

impl Role {
    /// Split a NAMES entry (`@nick`, `+nick`, `nick`) into role and nickname.
    pub fn from_names_entry(entry: &str) -> (Role, &str) {
        if let Some(nick) = entry.strip_prefix('@') {
            (Role::Operator, nick)
        } else if let Some(nick) = entry.strip_prefix('+') {
            (Role::Voice, nick)
        } else {
            (Role::Normal, entry)
        }
    }
}

/// A room member.
///
/// Members are never removed: departures only set `absent` so that
/// last-seen and dnd state survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub role: Role,
    pub dnd_until: Option<DateTime<Utc>>,
    pub absent: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl User {
    /// A newly sighted, present member.
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            dnd_until: None,
            absent: false,
            last_seen: None,
        }
    }

    pub fn is_operator(&self) -> bool {
        self.role == Role::Operator
    }

    /// Whether the member asked not to be highlighted at `now`.
    pub fn is_dnd(&self, now: DateTime<Utc>) -> bool {
        self.dnd_until.is_some_and(|until| now <= until)
    }

    /// Mark as departed at `now`.
    pub fn depart(&mut self, now: DateTime<Utc>) {
        self.absent = true;
        self.last_seen = Some(now);
    }
}
