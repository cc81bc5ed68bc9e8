//! Room state snapshot for lineupbot.
//!
//! All rooms are written to one JSON document at shutdown, keyed by room
//! name. The document is read at startup, and each room's entry is applied
//! once its first roster poll completes, when membership is known.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::room::{Role, Room, User};
use crate::Result;

/// Saved state of one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub dnd_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Saved state of one room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    #[serde(default)]
    pub opponent: Option<String>,
    #[serde(default)]
    pub news: Option<String>,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub schedule_players: Vec<String>,
    /// Occupant per position index, team 1 first.
    #[serde(default)]
    pub positions: Vec<Option<String>>,
    /// Claim time per position index.
    #[serde(default)]
    pub claimed_at: Vec<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub subs: Vec<String>,
    #[serde(default)]
    pub users: Vec<UserSnapshot>,
}

impl RoomSnapshot {
    /// Capture `room` at `now`. Present members are recorded as last seen now.
    pub fn capture(room: &Room, now: DateTime<Utc>) -> Self {
        let positions = room.lineup.positions();
        Self {
            opponent: room.opponent.clone(),
            news: room.news.clone(),
            schedule: room.schedule.clone(),
            schedule_players: room.schedule_players.clone(),
            positions: positions
                .iter()
                .map(|p| p.occupant().map(str::to_string))
                .collect(),
            claimed_at: positions.iter().map(|p| p.claimed_at()).collect(),
            subs: room.lineup.subs().to_vec(),
            users: room
                .users
                .values()
                .map(|u| UserSnapshot {
                    name: u.name.clone(),
                    role: u.role,
                    dnd_until: u.dnd_until,
                    last_seen: if u.absent { u.last_seen } else { Some(now) },
                })
                .collect(),
        }
    }

    /// Apply this snapshot to `room`.
    ///
    /// Members already established by a live roster poll keep their role and
    /// presence; unknown members are recreated as absent.
    pub(crate) fn restore_into(&self, room: &mut Room) {
        room.lineup
            .restore_occupancy(&self.positions, &self.claimed_at);
        room.lineup.set_subs(self.subs.clone());
        room.news = self.news.clone();
        room.schedule = self.schedule.clone();
        room.schedule_players = if self.schedule.is_some() {
            self.schedule_players.clone()
        } else {
            Vec::new()
        };
        // Opponent and two-team mode are exclusive; the configured mode wins.
        room.opponent = if room.lineup.two_teams() {
            None
        } else {
            self.opponent.clone()
        };

        for saved in &self.users {
            match room.user_mut(&saved.name) {
                Some(live) => {
                    if live.dnd_until.is_none() {
                        live.dnd_until = saved.dnd_until;
                    }
                    if live.last_seen.is_none() {
                        live.last_seen = saved.last_seen;
                    }
                }
                None => {
                    let mut user = User::new(saved.name.clone(), saved.role);
                    user.absent = true;
                    user.dnd_until = saved.dnd_until;
                    user.last_seen = saved.last_seen;
                    room.users.insert(saved.name.clone(), user);
                }
            }
        }
    }
}

/// Snapshot document: room name to room state.
pub type Snapshot = BTreeMap<String, RoomSnapshot>;

/// Reads and writes the snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Create a store for the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot, best effort.
    ///
    /// A missing file is an empty snapshot. An unreadable or malformed file
    /// is logged and also treated as empty.
    pub fn load(&self) -> Snapshot {
        match self.try_load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Ignoring snapshot {}: {}", self.path.display(), e);
                Snapshot::new()
            }
        }
    }

    fn try_load(&self) -> Result<Snapshot> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No snapshot at {}", self.path.display());
                return Ok(Snapshot::new());
            }
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        info!(
            "Loaded snapshot for {} rooms from {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(snapshot)
    }

    /// Write the snapshot, creating the parent directory if needed.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, content)?;
        info!(
            "Saved snapshot for {} rooms to {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Capture every room.
pub fn capture_all<'a, I>(rooms: I, now: DateTime<Utc>) -> Snapshot
where
    I: IntoIterator<Item = &'a Room>,
{
    rooms
        .into_iter()
        .map(|room| (room.name().to_string(), RoomSnapshot::capture(room, now)))
        .collect()
}
