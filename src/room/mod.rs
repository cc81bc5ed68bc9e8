//! Per-room lineup state.
//!
//! A [`Room`] owns the lineup, the member roster and the bookkeeping that
//! decides when the topic is republished. Every operation that can change
//! the rendered topic compares it before and after and emits the resulting
//! effects; the caller (the session) performs the I/O.

pub mod command;
pub mod dispatch;
pub mod key;
pub mod lineup;
pub mod topic;
pub mod user;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use url::Url;

pub use command::{parse_command, InfoTopic, RoomCommand};
pub use lineup::{Lineup, Position, RosterSize, Team};
pub use user::{Role, User};

use crate::snapshot::RoomSnapshot;
use key::same_nick;

/// Warning shown when the topic changed but the bot cannot set it.
pub const OP_WARNING: &str = "Error: I need to be operator to do my work.";

/// Per-call environment for room operations.
#[derive(Debug, Clone)]
pub struct RoomContext {
    /// The bot's current nickname.
    pub bot_nick: String,
    /// Reserved service nickname excluded from highlights and stats.
    pub service_nick: String,
    /// Current instant.
    pub now: DateTime<Utc>,
    /// Timezone name for absolute times in replies.
    pub timezone: String,
}

impl RoomContext {
    /// Whether `nick` is the bot or the reserved service.
    pub fn is_reserved(&self, nick: &str) -> bool {
        nick == self.bot_nick || nick == self.service_nick
    }
}

/// Something the session has to do on behalf of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEffect {
    /// Message to the room.
    Say(String),
    /// Set the room topic.
    SetTopic(String),
    /// Announce the titles of these pages.
    LookupTitles(Vec<Url>),
    /// Reply with the newest feed entry.
    LatestFeedEntry { reply_to: String },
    /// Reply with session-wide statistics.
    Stats { reply_to: String },
    /// Reply with configured information.
    Info { topic: InfoTopic, reply_to: String },
}

/// One tracked channel.
#[derive(Debug, Clone)]
pub struct Room {
    pub(crate) name: String,
    pub(crate) lineup: Lineup,
    pub(crate) opponent: Option<String>,
    pub(crate) news: Option<String>,
    pub(crate) schedule: Option<String>,
    pub(crate) schedule_players: Vec<String>,
    pub(crate) users: BTreeMap<String, User>,
    published_topic: Option<String>,
    roster_known: bool,
    pending_names: Vec<String>,
    op_warning_sent: bool,
}

impl Room {
    /// Create an empty room.
    pub fn new(name: impl Into<String>, size: RosterSize, two_teams: bool) -> Self {
        Self {
            name: name.into(),
            lineup: Lineup::new(size, two_teams),
            opponent: None,
            news: None,
            schedule: None,
            schedule_players: Vec::new(),
            users: BTreeMap::new(),
            published_topic: None,
            roster_known: false,
            pending_names: Vec::new(),
            op_warning_sent: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lineup(&self) -> &Lineup {
        &self.lineup
    }

    pub fn opponent(&self) -> Option<&str> {
        self.opponent.as_deref()
    }

    pub fn news(&self) -> Option<&str> {
        self.news.as_deref()
    }

    pub fn schedule(&self) -> Option<&str> {
        self.schedule.as_deref()
    }

    pub fn schedule_players(&self) -> &[String] {
        &self.schedule_players
    }

    /// Members in nickname order, absent ones included.
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Look up a member by nickname (server case rules).
    pub fn user(&self, nick: &str) -> Option<&User> {
        self.users
            .get(nick)
            .or_else(|| self.users.values().find(|u| same_nick(&u.name, nick)))
    }

    pub(crate) fn user_mut(&mut self, nick: &str) -> Option<&mut User> {
        if self.users.contains_key(nick) {
            return self.users.get_mut(nick);
        }
        self.users.values_mut().find(|u| same_nick(&u.name, nick))
    }

    /// Whether a roster poll has completed for this room.
    pub fn roster_known(&self) -> bool {
        self.roster_known
    }

    /// Last topic known to be set on the server.
    pub fn published_topic(&self) -> Option<&str> {
        self.published_topic.as_deref()
    }

    /// Render the topic from current state.
    pub fn topic(&self) -> String {
        topic::render(topic::TopicView {
            lineup: &self.lineup,
            opponent: self.opponent.as_deref(),
            schedule: self.schedule.as_deref(),
            schedule_players: &self.schedule_players,
            news: self.news.as_deref(),
        })
    }

    /// Whether the bot currently holds operator status here.
    pub fn bot_is_operator(&self, ctx: &RoomContext) -> bool {
        self.user(&ctx.bot_nick).is_some_and(User::is_operator)
    }

    /// Set or clear the opponent. Setting one leaves two-team mode.
    pub(crate) fn set_opponent(&mut self, opponent: Option<String>) {
        if opponent.is_some() {
            self.lineup.set_two_teams(false);
        }
        self.opponent = opponent;
    }

    /// Switch team mode. Entering two-team mode clears the opponent.
    pub(crate) fn set_two_teams(&mut self, enable: bool) {
        if self.lineup.set_two_teams(enable) && enable {
            self.opponent = None;
        }
    }

    /// Publish the rendered topic, or warn once when not operator.
    fn publish(&mut self, ctx: &RoomContext, effects: &mut Vec<RoomEffect>) {
        if self.bot_is_operator(ctx) {
            let topic = self.topic();
            debug!("{}: publishing topic", self.name);
            self.published_topic = Some(topic.clone());
            effects.push(RoomEffect::SetTopic(topic));
        } else if self.roster_known && !self.op_warning_sent {
            self.op_warning_sent = true;
            effects.push(RoomEffect::Say(OP_WARNING.to_string()));
        }
    }

    fn publish_if_changed(
        &mut self,
        before: &str,
        ctx: &RoomContext,
        effects: &mut Vec<RoomEffect>,
    ) {
        if self.topic() != before {
            self.publish(ctx, effects);
        }
    }

    /// A member (or the bot) joined.
    pub fn on_join(&mut self, nick: &str, ctx: &RoomContext) -> Vec<RoomEffect> {
        let mut effects = Vec::new();
        match self.user_mut(nick) {
            Some(user) => user.absent = false,
            None => {
                self.users
                    .insert(nick.to_string(), User::new(nick, Role::Normal));
            }
        }
        if same_nick(nick, &ctx.bot_nick) {
            info!("Joined {}", self.name);
            effects.push(RoomEffect::Say(command::format_help(&ctx.bot_nick)));
        }
        effects
    }

    /// A member left the room or the server.
    pub fn on_depart(&mut self, nick: &str, ctx: &RoomContext) {
        if let Some(user) = self.user_mut(nick) {
            user.depart(ctx.now);
        }
    }

    /// A member changed nickname.
    ///
    /// The record is renamed in place and positions held by exactly `old`
    /// follow. A remembered record under the new nick is merged into it.
    /// Substitute and schedule entries keep the old name.
    pub fn on_rename(&mut self, old: &str, new: &str, ctx: &RoomContext) -> Vec<RoomEffect> {
        let mut effects = Vec::new();
        let before = self.topic();

        let key = self
            .users
            .keys()
            .find(|k| same_nick(k, old))
            .cloned();
        if let Some(mut user) = key.and_then(|k| self.users.remove(&k)) {
            user.name = new.to_string();
            let stale = self
                .users
                .keys()
                .find(|k| same_nick(k, new))
                .cloned();
            if let Some(previous) = stale.and_then(|k| self.users.remove(&k)) {
                user.dnd_until = user.dnd_until.or(previous.dnd_until);
                user.last_seen = user.last_seen.or(previous.last_seen);
            }
            self.users.insert(new.to_string(), user);
        }
        self.lineup.rename_occupant(old, new);

        self.publish_if_changed(&before, ctx, &mut effects);
        effects
    }

    /// Buffer one NAMES reply line.
    pub fn queue_names<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending_names
            .extend(entries.into_iter().map(Into::into));
    }

    /// Apply buffered NAMES entries at end of names.
    ///
    /// The first completed poll also restores `snapshot`, without touching
    /// roles or presence the poll just established. The topic is published
    /// when the bot is operator and either just became operator or the topic
    /// changed.
    pub fn complete_roster_poll(
        &mut self,
        ctx: &RoomContext,
        snapshot: Option<&RoomSnapshot>,
    ) -> Vec<RoomEffect> {
        let mut effects = Vec::new();
        let was_op = self.bot_is_operator(ctx);
        let before = self.topic();

        for entry in std::mem::take(&mut self.pending_names) {
            let (role, nick) = Role::from_names_entry(&entry);
            if nick.is_empty() {
                continue;
            }
            match self.user_mut(nick) {
                Some(user) => {
                    user.role = role;
                    user.absent = false;
                }
                None => {
                    self.users.insert(nick.to_string(), User::new(nick, role));
                }
            }
        }

        let first_poll = !self.roster_known;
        self.roster_known = true;
        if first_poll {
            if let Some(snapshot) = snapshot {
                info!("{}: restoring saved state", self.name);
                snapshot.restore_into(self);
            }
        }

        let is_op = self.bot_is_operator(ctx);
        if is_op && !was_op {
            self.op_warning_sent = false;
        }
        if is_op && (!was_op || self.topic() != before) {
            self.publish(ctx, &mut effects);
        }
        effects
    }

    /// The server reported the current topic.
    ///
    /// The report becomes the cached topic; if it differs from the rendered
    /// one it is overwritten, unless the bot set it itself.
    pub fn observe_topic(
        &mut self,
        setter: Option<&str>,
        text: &str,
        ctx: &RoomContext,
    ) -> Vec<RoomEffect> {
        let mut effects = Vec::new();
        self.published_topic = Some(text.to_string());
        let by_bot = setter.is_some_and(|s| same_nick(s, &ctx.bot_nick));
        if !by_bot && self.topic() != text {
            self.publish(ctx, &mut effects);
        }
        effects
    }

    /// Handle a chat message from `nick`.
    pub fn handle_message(&mut self, nick: &str, text: &str, ctx: &RoomContext) -> Vec<RoomEffect> {
        let mut effects = Vec::new();
        let before = self.topic();

        if let Some(command) = parse_command(text, self.lineup.size()) {
            debug!("{}: {} issued {:?}", self.name, nick, command);
            match dispatch::dispatch(self, nick, command, ctx) {
                Ok(mut out) => effects.append(&mut out),
                Err(e) => effects.push(RoomEffect::Say(format!("{nick}: {e}"))),
            }
        } else if !text.starts_with(command::PREFIX) {
            let urls = crate::links::extract_urls(text);
            if !urls.is_empty() {
                effects.push(RoomEffect::LookupTitles(urls));
            }
        }

        self.publish_if_changed(&before, ctx, &mut effects);
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RoomContext {
        RoomContext {
            bot_nick: "IOSBot".to_string(),
            service_nick: "Q".to_string(),
            now: Utc::now(),
            timezone: "UTC".to_string(),
        }
    }

    fn polled_room(bot_entry: &str) -> Room {
        let mut room = Room::new("#ios.mix", RosterSize::Seven, false);
        room.queue_names([bot_entry, "romdi", "+Kaim"]);
        room.complete_roster_poll(&ctx(), None);
        room
    }

    fn topics(effects: &[RoomEffect]) -> Vec<&str> {
        effects
            .iter()
            .filter_map(|e| match e {
                RoomEffect::SetTopic(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_poll_creates_users_with_roles() {
        let room = polled_room("@IOSBot");
        assert!(room.roster_known());
        assert_eq!(room.user("kaim").map(|u| u.role), Some(Role::Voice));
        assert_eq!(room.user("romdi").map(|u| u.role), Some(Role::Normal));
        assert!(room.bot_is_operator(&ctx()));
    }

    #[test]
    fn test_poll_publishes_when_becoming_op() {
        let mut room = Room::new("#ios.mix", RosterSize::Three, false);
        room.queue_names(["@IOSBot"]);
        let effects = room.complete_roster_poll(&ctx(), None);
        assert_eq!(topics(&effects), vec!["[GK] [LM] [RM]"]);

        room.queue_names(["@IOSBot"]);
        assert!(room.complete_roster_poll(&ctx(), None).is_empty());
    }

    #[test]
    fn test_claim_publishes_topic_when_op() {
        let mut room = polled_room("@IOSBot");
        let effects = room.handle_message("romdi", "!gk", &ctx());
        assert_eq!(topics(&effects).len(), 1);
        assert!(topics(&effects)[0].starts_with("[\u{2}GK: romdi\u{f}]"));
        assert_eq!(room.published_topic(), Some(topics(&effects)[0]));
    }

    #[test]
    fn test_unchanged_topic_not_published() {
        let mut room = polled_room("@IOSBot");
        assert!(room.handle_message("romdi", "!stats", &ctx()).iter().all(|e| !matches!(e, RoomEffect::SetTopic(_))));
    }

    #[test]
    fn test_warning_once_when_not_op() {
        let mut room = polled_room("IOSBot");
        let first = room.handle_message("romdi", "!gk", &ctx());
        assert_eq!(first, vec![RoomEffect::Say(OP_WARNING.to_string())]);
        let second = room.handle_message("Kaim", "!lb", &ctx());
        assert!(second.is_empty());
    }

    #[test]
    fn test_warning_suppressed_before_poll() {
        let mut room = Room::new("#ios.mix", RosterSize::Seven, false);
        assert!(room.handle_message("romdi", "!gk", &ctx()).is_empty());
    }

    #[test]
    fn test_warning_rearms_after_regaining_op() {
        let mut room = polled_room("IOSBot");
        room.handle_message("romdi", "!gk", &ctx());

        room.queue_names(["@IOSBot"]);
        assert_eq!(topics(&room.complete_roster_poll(&ctx(), None)).len(), 1);

        room.queue_names(["IOSBot"]);
        room.complete_roster_poll(&ctx(), None);
        let effects = room.handle_message("romdi", "!lb", &ctx());
        assert_eq!(effects, vec![RoomEffect::Say(OP_WARNING.to_string())]);
    }

    #[test]
    fn test_departure_marks_absent() {
        let mut room = polled_room("@IOSBot");
        let c = ctx();
        room.on_depart("romdi", &c);
        let user = room.user("romdi").unwrap();
        assert!(user.absent);
        assert_eq!(user.last_seen, Some(c.now));

        room.on_join("romdi", &c);
        assert!(!room.user("romdi").unwrap().absent);
    }

    #[test]
    fn test_bot_join_announces_help() {
        let mut room = Room::new("#ios.mix", RosterSize::Seven, false);
        let effects = room.on_join("IOSBot", &ctx());
        assert!(matches!(&effects[..], [RoomEffect::Say(text)] if text.starts_with("Commands:")));
        assert!(room.on_join("romdi", &ctx()).is_empty());
    }

    #[test]
    fn test_rename_relocates_position() {
        let mut room = polled_room("@IOSBot");
        room.handle_message("romdi", "!gk", &ctx());
        room.handle_message("romdi", "!sub", &ctx());

        let effects = room.on_rename("romdi", "Hunki", &ctx());
        assert_eq!(room.lineup().positions()[0].occupant(), Some("Hunki"));
        assert!(room.user("Hunki").is_some());
        assert!(room.user("romdi").is_none());
        assert_eq!(room.lineup().subs(), &["romdi".to_string()]);
        assert_eq!(topics(&effects).len(), 1);
    }

    #[test]
    fn test_rename_merges_remembered_record() {
        let mut room = polled_room("@IOSBot");
        room.handle_message("Kaim", "!dnd 30m", &ctx());
        room.on_depart("Kaim", &ctx());
        let remembered = room.user("Kaim").cloned().unwrap();

        room.on_rename("romdi", "Kaim", &ctx());
        let merged = room.user("Kaim").unwrap();
        assert_eq!(merged.name, "Kaim");
        assert!(!merged.absent);
        assert_eq!(merged.dnd_until, remembered.dnd_until);
        assert_eq!(merged.last_seen, remembered.last_seen);
        assert!(room.user("romdi").is_none());
        assert_eq!(room.users().count(), 2);
    }

    #[test]
    fn test_observe_topic_enforces_rendered() {
        let mut room = polled_room("@IOSBot");
        let effects = room.observe_topic(Some("romdi"), "vandalized", &ctx());
        assert_eq!(topics(&effects), vec![room.topic().as_str()]);

        let rendered = room.topic();
        assert!(room.observe_topic(None, &rendered, &ctx()).is_empty());
        assert!(room.observe_topic(Some("IOSBot"), "truncated", &ctx()).is_empty());
    }

    #[test]
    fn test_plain_message_with_url() {
        let mut room = polled_room("@IOSBot");
        let effects = room.handle_message("romdi", "look at https://example.org/x", &ctx());
        assert_eq!(
            effects,
            vec![RoomEffect::LookupTitles(vec![Url::parse("https://example.org/x").unwrap()])]
        );
        assert!(room.handle_message("romdi", "!nope https://example.org", &ctx()).is_empty());
    }

    #[test]
    fn test_opponent_and_team_mode_exclusive() {
        let mut room = polled_room("@IOSBot");
        room.handle_message("romdi", "!twoteams", &ctx());
        room.handle_message("romdi", "!vs Rocket", &ctx());
        assert!(!room.lineup().two_teams());
        assert_eq!(room.opponent(), Some("Rocket"));

        room.handle_message("romdi", "!twoteams", &ctx());
        assert!(room.lineup().two_teams());
        assert_eq!(room.opponent(), None);
    }
}
