//! Configuration module for lineupbot.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::room::RosterSize;
use crate::{BotError, Result};

/// IRC server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server host name.
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Timezone for displaying dates (e.g., "Europe/Berlin", "UTC").
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_host() -> String {
    "irc.quakenet.org".to_string()
}

fn default_port() -> u16 {
    6667
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timezone: default_timezone(),
        }
    }
}

/// Identity the bot registers with.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Nickname (a backtick is appended on collision).
    #[serde(default = "default_nickname")]
    pub nickname: String,
    /// Ident user name.
    #[serde(default = "default_username")]
    pub username: String,
    /// Real name.
    #[serde(default = "default_realname")]
    pub realname: String,
}

fn default_nickname() -> String {
    "LineupBot".to_string()
}

fn default_username() -> String {
    "lineup".to_string()
}

fn default_realname() -> String {
    "Lineup Bot".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            nickname: default_nickname(),
            username: default_username(),
            realname: default_realname(),
        }
    }
}

/// Network service authentication.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Account name. Authentication is skipped when empty.
    #[serde(default)]
    pub name: String,
    /// Account password.
    #[serde(default)]
    pub password: String,
    /// Target the AUTH message is sent to.
    #[serde(default = "default_auth_service")]
    pub service: String,
    /// Nickname of the network service, never highlighted or counted.
    #[serde(default = "default_service_nick")]
    pub service_nick: String,
    /// Host suffix of authenticated users; used to size outgoing messages.
    #[serde(default = "default_host_suffix")]
    pub host_suffix: String,
}

fn default_auth_service() -> String {
    "Q@CServe.quakenet.org".to_string()
}

fn default_service_nick() -> String {
    "Q".to_string()
}

fn default_host_suffix() -> String {
    "users.quakenet.org".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            password: String::new(),
            service: default_auth_service(),
            service_nick: default_service_nick(),
            host_suffix: default_host_suffix(),
        }
    }
}

/// A room joined at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomConfig {
    /// Channel name including its prefix.
    pub name: String,
    /// Players per team (3 or 7).
    #[serde(default)]
    pub players: RosterSize,
    /// Whether both teams are tracked.
    #[serde(default)]
    pub two_teams: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/lineupbot.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Snapshot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    /// Path to the snapshot document.
    #[serde(default = "default_snapshot_path")]
    pub path: String,
}

fn default_snapshot_path() -> String {
    "data/snapshot.json".to_string()
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}

/// Link title and feed lookup configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LinksConfig {
    /// Whether titles of posted links are announced.
    #[serde(default = "default_links_enabled")]
    pub enabled: bool,
    /// Connection timeout in seconds.
    #[serde(default = "default_links_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_links_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_links_max_redirects")]
    pub max_redirects: usize,
    /// Maximum response body size in bytes.
    #[serde(default = "default_links_max_body")]
    pub max_body_bytes: u64,
    /// Feed queried by `!feed`. The command is disabled when empty.
    #[serde(default)]
    pub feed_url: String,
    /// Label shown before the newest feed entry.
    #[serde(default = "default_feed_label")]
    pub feed_label: String,
    /// Link shown after the newest feed entry.
    #[serde(default)]
    pub feed_link: String,
}

fn default_links_enabled() -> bool {
    true
}

fn default_links_connect_timeout() -> u64 {
    5
}

fn default_links_total_timeout() -> u64 {
    10
}

fn default_links_max_redirects() -> usize {
    5
}

fn default_links_max_body() -> u64 {
    2 * 1024 * 1024 // 2MB
}

fn default_feed_label() -> String {
    "News".to_string()
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            enabled: default_links_enabled(),
            connect_timeout_secs: default_links_connect_timeout(),
            total_timeout_secs: default_links_total_timeout(),
            max_redirects: default_links_max_redirects(),
            max_body_bytes: default_links_max_body(),
            feed_url: String::new(),
            feed_label: default_feed_label(),
            feed_link: String::new(),
        }
    }
}

/// Static information served by chat commands.
#[derive(Debug, Clone, Deserialize)]
pub struct InfoConfig {
    /// File with one game server address per line (`!ips`).
    #[serde(default = "default_server_ips_file")]
    pub server_ips_file: String,
    /// File with one website per line (`!sites`).
    #[serde(default = "default_websites_file")]
    pub websites_file: String,
    /// Download/installation text (`!files`).
    #[serde(default)]
    pub downloads: String,
    /// Voice server text (`!teamspeak`).
    #[serde(default)]
    pub voice: String,
}

fn default_server_ips_file() -> String {
    "server_ips.txt".to_string()
}

fn default_websites_file() -> String {
    "websites.txt".to_string()
}

impl Default for InfoConfig {
    fn default() -> Self {
        Self {
            server_ips_file: default_server_ips_file(),
            websites_file: default_websites_file(),
            downloads: String::new(),
            voice: String::new(),
        }
    }
}

/// Local control input configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    /// Relay stdin lines to the server. End of stdin stops the bot.
    #[serde(default = "default_control_stdin")]
    pub stdin: bool,
}

fn default_control_stdin() -> bool {
    true
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            stdin: default_control_stdin(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Identity configuration.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Service authentication.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Rooms joined after registration.
    #[serde(default)]
    pub rooms: Vec<RoomConfig>,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Snapshot configuration.
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    /// Link lookup configuration.
    #[serde(default)]
    pub links: LinksConfig,
    /// Static command information.
    #[serde(default)]
    pub info: InfoConfig,
    /// Local control input.
    #[serde(default)]
    pub control: ControlConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(BotError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| BotError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `LINEUPBOT_AUTH_PASSWORD`: Override the service password
    pub fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var("LINEUPBOT_AUTH_PASSWORD") {
            if !password.is_empty() {
                self.auth.password = password;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - The nickname is empty or contains spaces
    /// - A room name lacks a channel prefix or appears twice
    pub fn validate(&self) -> Result<()> {
        let nick = &self.identity.nickname;
        if nick.is_empty() || nick.contains(' ') {
            return Err(BotError::Validation(format!("invalid nickname: {nick:?}")));
        }

        let mut seen = HashSet::new();
        for room in &self.rooms {
            if !room.name.starts_with(['#', '&']) || room.name.contains(' ') {
                return Err(BotError::Validation(format!(
                    "invalid room name: {:?}",
                    room.name
                )));
            }
            if !seen.insert(room.name.to_lowercase()) {
                return Err(BotError::Validation(format!(
                    "room configured twice: {}",
                    room.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.host, "irc.quakenet.org");
        assert_eq!(config.server.port, 6667);
        assert_eq!(config.server.timezone, "UTC");

        assert_eq!(config.identity.nickname, "LineupBot");
        assert_eq!(config.identity.username, "lineup");

        assert!(config.auth.name.is_empty());
        assert_eq!(config.auth.service, "Q@CServe.quakenet.org");
        assert_eq!(config.auth.service_nick, "Q");

        assert!(config.rooms.is_empty());

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/lineupbot.log");

        assert_eq!(config.snapshot.path, "data/snapshot.json");

        assert!(config.links.enabled);
        assert_eq!(config.links.total_timeout_secs, 10);
        assert_eq!(config.links.max_redirects, 5);
        assert!(config.links.feed_url.is_empty());

        assert_eq!(config.info.server_ips_file, "server_ips.txt");
        assert!(config.control.stdin);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r##"
[server]
host = "irc.example.org"
port = 6668
timezone = "Europe/Berlin"

[identity]
nickname = "IOSLineupBot"
username = "ios"
realname = "IOS Lineup Bot"

[auth]
name = "iosbot"
password = "hunter2"

[[rooms]]
name = "#ios.mix"
players = 7

[[rooms]]
name = "#ios.3v3"
players = 3
two_teams = true

[logging]
level = "debug"
file = "custom/bot.log"

[snapshot]
path = "custom/state.json"

[links]
enabled = false
feed_url = "https://example.org/feed.xml"
feed_label = "IOS-Insider"

[info]
downloads = "https://example.org/download"
voice = "ts3server://voice.example.org"

[control]
stdin = false
"##;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.host, "irc.example.org");
        assert_eq!(config.server.port, 6668);
        assert_eq!(config.server.timezone, "Europe/Berlin");
        assert_eq!(config.identity.nickname, "IOSLineupBot");
        assert_eq!(config.auth.name, "iosbot");
        assert_eq!(config.auth.password, "hunter2");

        assert_eq!(config.rooms.len(), 2);
        assert_eq!(config.rooms[0].name, "#ios.mix");
        assert_eq!(config.rooms[0].players, RosterSize::Seven);
        assert!(!config.rooms[0].two_teams);
        assert_eq!(config.rooms[1].players, RosterSize::Three);
        assert!(config.rooms[1].two_teams);

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.snapshot.path, "custom/state.json");
        assert!(!config.links.enabled);
        assert_eq!(config.links.feed_label, "IOS-Insider");
        assert_eq!(config.info.voice, "ts3server://voice.example.org");
        assert!(!config.control.stdin);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 6667);
        assert!(config.rooms.is_empty());
    }

    #[test]
    fn test_parse_unsupported_roster_size() {
        let toml = r##"
[[rooms]]
name = "#five"
players = 5
"##;
        let result = Config::parse(toml);
        assert!(matches!(result, Err(BotError::Config(_))));
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");
        if let Err(BotError::Config(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");
        assert!(matches!(result, Err(BotError::Io(_))));
    }

    #[test]
    fn test_validate_rejects_bad_room_name() {
        let mut config = Config::default();
        config.rooms.push(RoomConfig {
            name: "ios.mix".to_string(),
            players: RosterSize::Seven,
            two_teams: false,
        });
        assert!(matches!(config.validate(), Err(BotError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_room() {
        let mut config = Config::default();
        for name in ["#ios.mix", "#IOS.mix"] {
            config.rooms.push(RoomConfig {
                name: name.to_string(),
                players: RosterSize::Seven,
                two_teams: false,
            });
        }
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("room configured twice"));
    }

    #[test]
    fn test_validate_rejects_empty_nickname() {
        let mut config = Config::default();
        config.identity.nickname = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_env_overrides_password() {
        let original = std::env::var("LINEUPBOT_AUTH_PASSWORD").ok();

        std::env::set_var("LINEUPBOT_AUTH_PASSWORD", "env-secret");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.auth.password, "env-secret");

        if let Some(val) = original {
            std::env::set_var("LINEUPBOT_AUTH_PASSWORD", val);
        } else {
            std::env::remove_var("LINEUPBOT_AUTH_PASSWORD");
        }
    }
}
