//! Topic rendering.

use super::key::display_prefix;
use super::lineup::{Lineup, Position, Team};
use crate::irc::outbound::truncate;

/// Longest topic the network accepts; longer topics are cut by the server.
pub const MAX_TOPIC_LEN: usize = 390;

const BOLD: char = '\u{2}';
const RESET: char = '\u{f}';

/// Wrap text in IRC bold.
pub fn bold(text: &str) -> String {
    format!("{BOLD}{text}{RESET}")
}

/// Room state the topic is rendered from.
#[derive(Debug, Clone, Copy)]
pub struct TopicView<'a> {
    pub lineup: &'a Lineup,
    pub opponent: Option<&'a str>,
    pub schedule: Option<&'a str>,
    pub schedule_players: &'a [String],
    pub news: Option<&'a str>,
}

fn render_position(position: &Position) -> String {
    let name = position.name().to_uppercase();
    match position.occupant() {
        Some(player) => format!("[{}]", bold(&format!("{name}: {}", display_prefix(player)))),
        None => format!("[{name}]"),
    }
}

fn render_team(positions: &[Position]) -> String {
    positions
        .iter()
        .map(render_position)
        .collect::<Vec<_>>()
        .join(" ")
}

fn prefixes(names: &[String]) -> String {
    names
        .iter()
        .map(|n| display_prefix(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the topic line.
///
/// Segment order: team 1, then either team 2 and subs (two-team mode) or
/// subs and opponent (one-team mode), then schedule, then news. The result
/// is cut to [`MAX_TOPIC_LEN`] bytes.
pub fn render(view: TopicView<'_>) -> String {
    let lineup = view.lineup;
    let mut text = render_team(lineup.team(Team::One));

    let subs = if lineup.subs().is_empty() {
        None
    } else {
        Some(format!(
            " | {}",
            bold(&format!("[Subs: {}]", prefixes(lineup.subs())))
        ))
    };

    if lineup.two_teams() {
        text.push_str(" - vs - ");
        text.push_str(&render_team(lineup.team(Team::Two)));
        if let Some(subs) = &subs {
            text.push_str(subs);
        }
    } else {
        if let Some(subs) = &subs {
            text.push_str(subs);
        }
        if let Some(opponent) = view.opponent {
            text.push_str(&format!(" - vs - [{}]", bold(&format!("Team: {opponent}"))));
        }
    }

    if let Some(schedule) = view.schedule {
        text.push_str(&format!(
            " || Schedule: {schedule} - Avail.: {}",
            prefixes(view.schedule_players)
        ));
    }

    if let Some(news) = view.news {
        text.push_str(&format!(" || {news}"));
    }

    truncate(text.trim(), MAX_TOPIC_LEN).trim_end().to_string()
}
