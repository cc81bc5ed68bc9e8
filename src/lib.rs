//! lineupbot - IRC lineup bot
//!
//! Keeps team lineups, substitutes, schedules and news for game channels and
//! publishes them in the channel topic.

pub mod bot;
pub mod config;
pub mod datetime;
pub mod error;
pub mod irc;
pub mod links;
pub mod logging;
pub mod room;
pub mod snapshot;

pub use config::Config;
pub use error::{BotError, Result};
pub use room::{Room, RoomContext, RoomEffect, RosterSize};
pub use snapshot::{RoomSnapshot, Snapshot, SnapshotStore};
