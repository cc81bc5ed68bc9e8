//! Test helpers for integration tests.
//!
//! Provides a stub link lookup, an in-memory session builder and a fake IRC
//! server for end-to-end runs.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use url::Url;

use lineupbot::bot::Session;
use lineupbot::config::RoomConfig;
use lineupbot::irc::Connection;
use lineupbot::links::{FeedEntry, LinkLookup};
use lineupbot::{Config, Result, RosterSize, Snapshot};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bot nickname used by all tests.
pub const BOT: &str = "IOSBot";

/// Main test room.
pub const ROOM: &str = "#ios.mix";

/// Link lookup answering from fixed data.
#[derive(Debug, Default, Clone)]
pub struct StubLookup {
    pub title: Option<String>,
    pub entries: Vec<FeedEntry>,
    /// Panic inside `title`, to exercise fault containment.
    pub panic_on_title: bool,
}

impl LinkLookup for StubLookup {
    async fn title(&self, url: &Url) -> Result<Option<String>> {
        if self.panic_on_title {
            panic!("title lookup exploded for {url}");
        }
        Ok(self.title.clone())
    }

    async fn latest_entries(&self) -> Result<Vec<FeedEntry>> {
        Ok(self.entries.clone())
    }
}

/// Configuration with one 7-player room and lookups disabled.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.identity.nickname = BOT.to_string();
    config.links.enabled = false;
    config.control.stdin = false;
    config.rooms.push(RoomConfig {
        name: ROOM.to_string(),
        players: RosterSize::Seven,
        two_teams: false,
    });
    config
}

pub type TestSession = Session<Vec<u8>, StubLookup>;

/// Session writing into memory.
pub fn session_with(config: Config, lookup: StubLookup, pending: Snapshot) -> TestSession {
    Session::new(config, Connection::new(Vec::new()), lookup, pending)
}

/// Default in-memory session.
pub fn session() -> TestSession {
    session_with(test_config(), StubLookup::default(), Snapshot::new())
}

/// Everything the session has written so far, one entry per line.
pub fn sent_lines(session: &TestSession) -> Vec<String> {
    String::from_utf8_lossy(session.connection().get_ref())
        .split("\r\n")
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Feed raw lines to the session.
pub async fn feed(session: &mut TestSession, lines: &[String]) {
    for line in lines {
        session.handle_line(line).await.unwrap();
    }
}

/// Registration and a first roster poll with the bot opped.
pub fn join_lines(members: &str) -> Vec<String> {
    vec![
        format!(":srv 001 {BOT} :Welcome"),
        format!(":srv 376 {BOT} :End of /MOTD command."),
        format!(":{BOT}!~lineup@host JOIN {ROOM}"),
        format!(":srv 353 {BOT} = {ROOM} :@{BOT} {members}"),
        format!(":srv 366 {BOT} {ROOM} :End of /NAMES list."),
    ]
}

/// Session that has joined the room with `members` present.
pub async fn joined_session(members: &str) -> TestSession {
    let mut s = session();
    feed(&mut s, &join_lines(members)).await;
    s
}

/// `:nick!~nick@host PRIVMSG #room :text`
pub fn say(nick: &str, text: &str) -> String {
    format!(":{nick}!~{nick}@host PRIVMSG {ROOM} :{text}")
}

/// Fake IRC server accepting a single client.
pub struct FakeServer {
    listener: TcpListener,
}

impl FakeServer {
    /// Bind to an ephemeral local port.
    pub async fn bind() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    /// Address the bot should connect to.
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr().unwrap()
    }

    /// Wait for the bot to connect.
    pub async fn accept(&self) -> std::io::Result<FakeClient> {
        let (stream, _) = timeout(DEFAULT_TIMEOUT, self.listener.accept())
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "accept"))??;
        Ok(FakeClient::new(stream))
    }
}

/// Server side of the bot's connection.
pub struct FakeClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl FakeClient {
    fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    /// Send one CRLF-terminated line to the bot.
    pub async fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await
    }

    /// Receive one line from the bot, without its terminator.
    pub async fn recv_line(&mut self) -> std::io::Result<String> {
        let mut line = String::new();
        let n = timeout(DEFAULT_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "recv"))??;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Receive lines until one starts with `prefix`; returns that line.
    pub async fn expect(&mut self, prefix: &str) -> std::io::Result<String> {
        loop {
            let line = self.recv_line().await?;
            if line.starts_with(prefix) {
                return Ok(line);
            }
        }
    }

    /// Close the connection.
    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
    }
}
