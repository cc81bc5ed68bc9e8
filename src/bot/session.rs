//! IRC session: routes protocol events to rooms and performs their effects.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::datetime::format_time_ago;
use crate::irc::parser::{split_end_of_names_payload, split_names_payload, split_topic_payload};
use crate::irc::{outbound, parse_line, Connection, Event, Priority};
use crate::links::LinkLookup;
use crate::room::key::same_nick;
use crate::room::topic::bold;
use crate::room::{InfoTopic, Room, RoomContext, RoomEffect, RosterSize};
use crate::snapshot::{capture_all, Snapshot};
use crate::Result;

/// Reply to CTCP VERSION.
pub const VERSION_REPLY: &str = concat!("VERSION lineupbot v", env!("CARGO_PKG_VERSION"));

/// Numeric replies the session reacts to.
mod numeric {
    pub const WELCOME: u16 = 1;
    pub const USER_MODE: u16 = 221;
    pub const TOPIC: u16 = 332;
    pub const NAMES: u16 = 353;
    pub const END_OF_NAMES: u16 = 366;
    pub const END_OF_MOTD: u16 = 376;
    pub const UNKNOWN_COMMAND: u16 = 421;
    pub const NO_MOTD: u16 = 422;
    pub const NICKNAME_IN_USE: u16 = 433;
}

fn room_key(name: &str) -> String {
    name.to_lowercase()
}

fn is_channel(target: &str) -> bool {
    target.starts_with(['#', '&'])
}

/// One connection's worth of bot state.
pub struct Session<W, L> {
    config: Config,
    nick: String,
    registered: bool,
    rooms: BTreeMap<String, Room>,
    pending: Snapshot,
    conn: Connection<W>,
    lookup: L,
}

impl<W, L> Session<W, L>
where
    W: AsyncWrite + Unpin,
    L: LinkLookup,
{
    /// Create a session for the configured rooms.
    ///
    /// `pending` holds saved room state, applied to each room after its first
    /// roster poll.
    pub fn new(config: Config, conn: Connection<W>, lookup: L, pending: Snapshot) -> Self {
        let rooms = config
            .rooms
            .iter()
            .map(|r| (room_key(&r.name), Room::new(&r.name, r.players, r.two_teams)))
            .collect();
        Self {
            nick: config.identity.nickname.clone(),
            config,
            registered: false,
            rooms,
            pending,
            conn,
            lookup,
        }
    }

    /// Current nickname.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Whether registration has completed.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Look up a room by channel name.
    pub fn room(&self, name: &str) -> Option<&Room> {
        self.rooms.get(&room_key(name))
    }

    /// All rooms.
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// The outbound connection.
    pub fn connection(&self) -> &Connection<W> {
        &self.conn
    }

    /// Configuration this session runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn context(&self) -> RoomContext {
        RoomContext {
            bot_nick: self.nick.clone(),
            service_nick: self.config.auth.service_nick.clone(),
            now: Utc::now(),
            timezone: self.config.server.timezone.clone(),
        }
    }

    /// Send the registration lines.
    pub async fn register(&mut self) -> Result<()> {
        let identity = &self.config.identity;
        let user = format!("USER {} 8 * :{}", identity.username, identity.realname);
        let nick = format!("NICK {}", self.nick);
        self.conn.send(user, Priority::Normal).await?;
        self.conn.send(nick, Priority::Normal).await
    }

    /// Send a raw line from the local control input.
    pub async fn send_control(&mut self, line: &str) -> Result<()> {
        let line = line.trim_end();
        if line.is_empty() {
            return Ok(());
        }
        info!("Control: {}", line);
        self.conn.send(line, Priority::Normal).await
    }

    /// State of all rooms for the snapshot file.
    ///
    /// Rooms whose roster was never polled keep their saved entry, as do
    /// saved rooms this session does not track.
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = self.pending.clone();
        snapshot.extend(capture_all(
            self.rooms.values().filter(|r| r.roster_known()),
            Utc::now(),
        ));
        snapshot
    }

    /// Handle one inbound line.
    pub async fn handle_line(&mut self, line: &str) -> Result<()> {
        debug!("<-- {}", line);
        match parse_line(line) {
            Some(event) => self.handle_event(event).await,
            None => Ok(()),
        }
    }

    /// Handle one parsed event.
    pub async fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Ping { token } => {
                self.conn
                    .send(outbound::pong(&token), Priority::High)
                    .await
            }
            Event::NumericReply {
                code,
                target,
                payload,
            } => self.handle_numeric(code, &target, &payload).await,
            Event::Privmsg {
                source,
                target,
                text,
                ..
            } => {
                if !is_channel(&target) {
                    debug!("Ignoring private message from {}", source);
                    return Ok(());
                }
                let ctx = self.context();
                let Some(room) = self.rooms.get_mut(&room_key(&target)) else {
                    return Ok(());
                };
                let effects = room.handle_message(&source, &text, &ctx);
                let name = room.name().to_string();
                self.apply_effects(&name, effects).await
            }
            Event::CtcpPing { source, token } => {
                debug!("CTCP PING from {}", source);
                let reply = outbound::ctcp_reply(&source, &format!("PING {token}"));
                self.conn.send(reply, Priority::Normal).await
            }
            Event::CtcpVersion { source } => {
                debug!("CTCP VERSION from {}", source);
                let reply = outbound::ctcp_reply(&source, VERSION_REPLY);
                self.conn.send(reply, Priority::Normal).await
            }
            Event::Topic {
                source,
                channel,
                text,
            } => {
                let ctx = self.context();
                let Some(room) = self.rooms.get_mut(&room_key(&channel)) else {
                    return Ok(());
                };
                let effects = room.observe_topic(Some(&source), &text, &ctx);
                let name = room.name().to_string();
                self.apply_effects(&name, effects).await
            }
            Event::Join { source, channel } => {
                let ctx = self.context();
                let Some(room) = self.rooms.get_mut(&room_key(&channel)) else {
                    return Ok(());
                };
                let effects = room.on_join(&source, &ctx);
                let name = room.name().to_string();
                self.apply_effects(&name, effects).await
            }
            Event::Part { source, channel } => {
                let ctx = self.context();
                if let Some(room) = self.rooms.get_mut(&room_key(&channel)) {
                    room.on_depart(&source, &ctx);
                }
                Ok(())
            }
            Event::Kick {
                channel, victim, ..
            } => {
                if same_nick(&victim, &self.nick) {
                    if let Some(room) = self.rooms.remove(&room_key(&channel)) {
                        warn!("Kicked from {}, dropping room", room.name());
                    }
                    return Ok(());
                }
                let ctx = self.context();
                if let Some(room) = self.rooms.get_mut(&room_key(&channel)) {
                    room.on_depart(&victim, &ctx);
                }
                Ok(())
            }
            Event::Quit { source } => {
                let ctx = self.context();
                for room in self.rooms.values_mut() {
                    room.on_depart(&source, &ctx);
                }
                Ok(())
            }
            Event::NickChange { old, new } => {
                if same_nick(&old, &self.nick) {
                    info!("Nickname changed to {}", new);
                    self.nick = new.clone();
                }
                let ctx = self.context();
                let mut pending = Vec::new();
                for room in self.rooms.values_mut() {
                    let effects = room.on_rename(&old, &new, &ctx);
                    if !effects.is_empty() {
                        pending.push((room.name().to_string(), effects));
                    }
                }
                for (name, effects) in pending {
                    self.apply_effects(&name, effects).await?;
                }
                Ok(())
            }
            Event::ModeChange { channel, .. } => {
                if self.rooms.contains_key(&room_key(&channel)) {
                    self.conn
                        .send(outbound::names(&channel), Priority::Normal)
                        .await?;
                }
                Ok(())
            }
            Event::Invite { nick, channel } => {
                if !same_nick(&nick, &self.nick) || self.rooms.contains_key(&room_key(&channel)) {
                    return Ok(());
                }
                info!("Invited to {}", channel);
                self.rooms.insert(
                    room_key(&channel),
                    Room::new(&channel, RosterSize::Seven, false),
                );
                self.conn
                    .send(outbound::join(&channel), Priority::Normal)
                    .await
            }
        }
    }

    async fn handle_numeric(&mut self, code: u16, target: &str, payload: &str) -> Result<()> {
        match code {
            numeric::WELCOME => {
                info!("Registered as {}", target);
                self.nick = target.to_string();
                Ok(())
            }
            numeric::UNKNOWN_COMMAND => self.conn.acknowledge_probe().await,
            numeric::NICKNAME_IN_USE => {
                self.nick.push('`');
                warn!("Nickname in use, trying {}", self.nick);
                let line = format!("NICK {}", self.nick);
                self.conn.send(line, Priority::Normal).await
            }
            numeric::END_OF_MOTD | numeric::NO_MOTD | numeric::USER_MODE => {
                self.complete_registration().await
            }
            numeric::TOPIC => {
                let Some((channel, text)) = split_topic_payload(payload) else {
                    return Ok(());
                };
                let ctx = self.context();
                let Some(room) = self.rooms.get_mut(&room_key(channel)) else {
                    return Ok(());
                };
                let effects = room.observe_topic(None, text, &ctx);
                let name = room.name().to_string();
                self.apply_effects(&name, effects).await
            }
            numeric::NAMES => {
                if let Some((channel, names)) = split_names_payload(payload) {
                    if let Some(room) = self.rooms.get_mut(&room_key(channel)) {
                        room.queue_names(names);
                    }
                }
                Ok(())
            }
            numeric::END_OF_NAMES => {
                let Some(channel) = split_end_of_names_payload(payload) else {
                    return Ok(());
                };
                let ctx = self.context();
                let Some(room) = self.rooms.get_mut(&room_key(channel)) else {
                    return Ok(());
                };
                let saved = if room.roster_known() {
                    None
                } else {
                    self.pending.remove(room.name())
                };
                let effects = room.complete_roster_poll(&ctx, saved.as_ref());
                let name = room.name().to_string();
                self.apply_effects(&name, effects).await
            }
            _ => Ok(()),
        }
    }

    async fn complete_registration(&mut self) -> Result<()> {
        if self.registered {
            return Ok(());
        }
        self.registered = true;
        info!("Registration complete");

        let auth = &self.config.auth;
        if !auth.name.is_empty() && !auth.password.is_empty() {
            let line = format!("PRIVMSG {} :AUTH {} {}", auth.service, auth.name, auth.password);
            self.conn.send(line, Priority::Normal).await?;
        }
        let mode = format!("MODE {} +x", self.nick);
        self.conn.send(mode, Priority::Normal).await?;

        let joins: Vec<String> = self.rooms.values().map(|r| outbound::join(r.name())).collect();
        self.conn.send_all(joins, Priority::Normal).await
    }

    fn relay_prefix_len(&self) -> usize {
        let host = format!("{}.{}", self.config.auth.name, self.config.auth.host_suffix);
        outbound::relay_prefix(&self.nick, &self.config.identity.username, &host).len()
    }

    async fn say(&mut self, target: &str, text: &str) -> Result<()> {
        let lines = outbound::privmsg_lines(self.relay_prefix_len(), target, text);
        self.conn.send_all(lines, Priority::Normal).await
    }

    async fn apply_effects(&mut self, room: &str, effects: Vec<RoomEffect>) -> Result<()> {
        for effect in effects {
            match effect {
                RoomEffect::Say(text) => self.say(room, &text).await?,
                RoomEffect::SetTopic(text) => {
                    self.conn
                        .send(outbound::topic(room, &text), Priority::Normal)
                        .await?
                }
                RoomEffect::LookupTitles(urls) => self.announce_titles(room, &urls).await?,
                RoomEffect::LatestFeedEntry { reply_to } => {
                    if let Some(text) = self.latest_feed_entry().await {
                        self.say(room, &format!("{reply_to}: {text}")).await?;
                    }
                }
                RoomEffect::Stats { reply_to } => {
                    let text = format!("{reply_to}: {}", self.stats());
                    self.say(room, &text).await?;
                }
                RoomEffect::Info { topic, reply_to } => {
                    let text = format!("{reply_to}: {}", self.info(topic).await);
                    self.say(room, &text).await?;
                }
            }
        }
        Ok(())
    }

    async fn announce_titles(&mut self, room: &str, urls: &[Url]) -> Result<()> {
        for url in urls {
            match self.lookup.title(url).await {
                Ok(Some(title)) => self.say(room, &format!("Title: {title}")).await?,
                Ok(None) => {}
                Err(e) => warn!("Title lookup for {} failed: {}", url, e),
            }
        }
        Ok(())
    }

    async fn latest_feed_entry(&self) -> Option<String> {
        let entries = match self.lookup.latest_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Feed lookup failed: {}", e);
                return None;
            }
        };
        let links = &self.config.links;
        let Some(entry) = entries.into_iter().next() else {
            return Some("No news found.".to_string());
        };

        let mut text = match entry.published {
            Some(at) => format!(
                "{} {} ago: {}",
                links.feed_label,
                format_time_ago(Utc::now() - at),
                bold(&entry.text)
            ),
            None => format!("{}: {}", links.feed_label, bold(&entry.text)),
        };
        let link = entry
            .link
            .or_else(|| (!links.feed_link.is_empty()).then(|| links.feed_link.clone()));
        if let Some(link) = link {
            text.push_str(&format!(" ({link})"));
        }
        Some(text)
    }

    fn stats(&self) -> String {
        let service = self.config.auth.service_nick.as_str();
        let users: HashSet<&str> = self
            .rooms
            .values()
            .flat_map(|r| r.users())
            .map(|u| u.name.as_str())
            .filter(|name| *name != self.nick.as_str() && *name != service)
            .collect();
        format!(
            "I'm currently in {} channels serving {} unique users.",
            self.rooms.len(),
            users.len()
        )
    }

    async fn info(&self, topic: InfoTopic) -> String {
        let info = &self.config.info;
        match topic {
            InfoTopic::ServerIps => {
                read_list(&info.server_ips_file, "Server IPs", "No server IPs found.").await
            }
            InfoTopic::Websites => {
                read_list(&info.websites_file, "Websites", "No websites found.").await
            }
            InfoTopic::Downloads if info.downloads.is_empty() => {
                "No download information configured.".to_string()
            }
            InfoTopic::Downloads => info.downloads.clone(),
            InfoTopic::Voice if info.voice.is_empty() => "No voice server configured.".to_string(),
            InfoTopic::Voice => format!("Voice server: {}", info.voice),
        }
    }
}

/// Read a one-entry-per-line file into `"<label>: a, b"`.
async fn read_list(path: &str, label: &str, missing: &str) -> String {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            debug!("Cannot read {}: {}", path, e);
            return missing.to_string();
        }
    };
    let entries: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if entries.is_empty() {
        missing.to_string()
    } else {
        format!("{label}: {}", entries.join(", "))
    }
}
