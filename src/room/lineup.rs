//! Lineup positions and substitutes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::same_player;

/// Players per team. Only the two supported formats exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RosterSize {
    /// 3 vs 3.
    Three,
    /// 7 vs 7.
    #[default]
    Seven,
}

impl RosterSize {
    /// Number of players per team.
    pub fn count(self) -> usize {
        self.position_names().len()
    }

    /// Position names for one team, in topic order.
    pub fn position_names(self) -> &'static [&'static str] {
        match self {
            RosterSize::Three => &["gk", "lm", "rm"],
            RosterSize::Seven => &["gk", "lb", "rb", "cdm", "cam", "lw", "rw"],
        }
    }
}

impl RosterSize {
    /// Parse a position label: a bare name or a name with team suffix.
    pub fn parse_label(self, label: &str) -> Option<PositionLabel> {
        let names = self.position_names();
        if let Some(name) = names.iter().copied().find(|n| *n == label) {
            return Some(PositionLabel { name, team: None });
        }
        let team = match label.chars().last()? {
            '1' => Team::One,
            '2' => Team::Two,
            _ => return None,
        };
        let bare = &label[..label.len() - 1];
        names
            .iter()
            .copied()
            .find(|n| *n == bare)
            .map(|name| PositionLabel {
                name,
                team: Some(team),
            })
    }
}

impl TryFrom<u8> for RosterSize {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(RosterSize::Three),
            7 => Ok(RosterSize::Seven),
            other => Err(format!("unsupported roster size {other} (expected 3 or 7)")),
        }
    }
}

impl From<RosterSize> for u8 {
    fn from(size: RosterSize) -> Self {
        size.count() as u8
    }
}

/// Team a position belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Team {
    One,
    Two,
}

impl Team {
    /// Team number used as command suffix (`gk1`, `gk2`).
    pub fn number(self) -> u8 {
        match self {
            Team::One => 1,
            Team::Two => 2,
        }
    }
}

/// A single lineup slot.
///
/// The occupant is stored by value: it is a lookup key into the room's
/// users, not a reference, and may name someone who renamed or left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    name: &'static str,
    team: Team,
    occupant: Option<String>,
    claimed_at: Option<DateTime<Utc>>,
}

impl Position {
    fn new(name: &'static str, team: Team) -> Self {
        Self {
            name,
            team,
            occupant: None,
            claimed_at: None,
        }
    }

    /// Position name (`gk`, `cdm`, ...).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Team this position belongs to.
    pub fn team(&self) -> Team {
        self.team
    }

    /// Current occupant, if any.
    pub fn occupant(&self) -> Option<&str> {
        self.occupant.as_deref()
    }

    /// When the current occupant signed up.
    pub fn claimed_at(&self) -> Option<DateTime<Utc>> {
        self.claimed_at
    }

    /// Whether the position is free.
    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }

    /// Name with team suffix (`gk1`, `gk2`).
    pub fn suffixed_name(&self) -> String {
        format!("{}{}", self.name, self.team.number())
    }

    /// Whether `label` addresses this position, bare or suffixed.
    pub fn answers_to(&self, label: &str) -> bool {
        label == self.name || label == self.suffixed_name()
    }

    /// Whether the occupant is the same player as `player`.
    pub fn is_held_by(&self, player: &str) -> bool {
        self.occupant
            .as_deref()
            .is_some_and(|occupant| same_player(occupant, player))
    }

    pub(crate) fn occupy(&mut self, player: impl Into<String>, at: Option<DateTime<Utc>>) {
        self.occupant = Some(player.into());
        self.claimed_at = at;
    }

    pub(crate) fn vacate(&mut self) {
        self.occupant = None;
        self.claimed_at = None;
    }

    pub(crate) fn rename_occupant(&mut self, new_name: &str) {
        self.occupant = Some(new_name.to_string());
    }
}

/// A parsed position label: name plus optional explicit team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionLabel {
    pub name: &'static str,
    pub team: Option<Team>,
}

/// Why a claim was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimRefusal {
    /// The claimant already holds the addressed position.
    AlreadyYours,
    /// Someone else holds it.
    Taken,
    /// No such position.
    Unknown,
}

/// Positions for both teams plus the substitute list.
///
/// Positions are created once (two teams' worth, team 1 first) and never
/// added or removed; only occupancy changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lineup {
    size: RosterSize,
    positions: Vec<Position>,
    subs: Vec<String>,
    two_teams: bool,
}

impl Lineup {
    /// Create an empty lineup.
    pub fn new(size: RosterSize, two_teams: bool) -> Self {
        let positions = [Team::One, Team::Two]
            .into_iter()
            .flat_map(|team| {
                size.position_names()
                    .iter()
                    .copied()
                    .map(move |name| Position::new(name, team))
            })
            .collect();
        Self {
            size,
            positions,
            subs: Vec::new(),
            two_teams,
        }
    }

    /// Roster size.
    pub fn size(&self) -> RosterSize {
        self.size
    }

    /// Whether both teams are tracked.
    pub fn two_teams(&self) -> bool {
        self.two_teams
    }

    /// All positions, team 1 first.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Positions of one team.
    pub fn team(&self, team: Team) -> &[Position] {
        let n = self.size.count();
        match team {
            Team::One => &self.positions[..n],
            Team::Two => &self.positions[n..],
        }
    }

    /// Substitutes in signup order.
    pub fn subs(&self) -> &[String] {
        &self.subs
    }

    /// Parse `gk`, `gk1` or `gk2` against this lineup's position names.
    pub fn parse_label(&self, label: &str) -> Option<PositionLabel> {
        self.size.parse_label(label)
    }

    /// Index of the first position answering to `label`.
    pub fn find_label(&self, label: &str) -> Option<usize> {
        self.positions.iter().position(|p| p.answers_to(label))
    }

    /// Index of the position held by `player` (prefix comparison).
    pub fn position_of(&self, player: &str) -> Option<usize> {
        self.positions.iter().position(|p| p.is_held_by(player))
    }

    /// Whether `player` holds any position.
    pub fn is_playing(&self, player: &str) -> bool {
        self.position_of(player).is_some()
    }

    fn index_of(&self, name: &str, team: Team) -> Option<usize> {
        self.positions
            .iter()
            .position(|p| p.name == name && p.team == team)
    }

    /// Claim a position for `player`.
    ///
    /// An explicit team suffix addresses exactly that slot, in either team
    /// mode. A bare name tries team 1, then team 2 when both teams are
    /// tracked. Any position previously held by the player is vacated, so a
    /// player never holds two positions.
    pub fn claim(
        &mut self,
        label: PositionLabel,
        player: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, ClaimRefusal> {
        let candidates: Vec<usize> = match label.team {
            Some(team) => self.index_of(label.name, team).into_iter().collect(),
            None => {
                let mut teams = vec![Team::One];
                if self.two_teams {
                    teams.push(Team::Two);
                }
                teams
                    .into_iter()
                    .filter_map(|team| self.index_of(label.name, team))
                    .collect()
            }
        };
        if candidates.is_empty() {
            return Err(ClaimRefusal::Unknown);
        }

        if candidates.iter().any(|&i| self.positions[i].is_held_by(player)) {
            return Err(ClaimRefusal::AlreadyYours);
        }
        let target = candidates
            .into_iter()
            .find(|&i| self.positions[i].is_empty())
            .ok_or(ClaimRefusal::Taken)?;

        if let Some(previous) = self.position_of(player) {
            self.positions[previous].vacate();
        }
        self.positions[target].occupy(player, Some(now));
        Ok(target)
    }

    /// Vacate the position at `index`.
    pub fn vacate(&mut self, index: usize) {
        if let Some(position) = self.positions.get_mut(index) {
            position.vacate();
        }
    }

    /// Vacate all positions and clear substitutes.
    pub fn reset(&mut self) {
        self.positions.iter_mut().for_each(Position::vacate);
        self.subs.clear();
    }

    /// Switch between one- and two-team mode.
    ///
    /// Disabling folds each team-2 occupant into the matching team-1 slot
    /// when that slot is free; otherwise the team-2 occupant is dropped. All
    /// team-2 positions are empty afterwards. Returns whether the mode changed.
    pub fn set_two_teams(&mut self, enable: bool) -> bool {
        if enable == self.two_teams {
            return false;
        }
        if !enable {
            let n = self.size.count();
            for i in n..self.positions.len() {
                let moved = self.positions[i].occupant.take();
                let at = self.positions[i].claimed_at.take();
                if let Some(player) = moved {
                    if self.positions[i - n].is_empty() {
                        self.positions[i - n].occupy(player, at);
                    }
                }
            }
        }
        self.two_teams = enable;
        true
    }

    /// Rename the occupant of positions held by exactly `old`.
    ///
    /// Another position whose occupant shares the new name's prefix key is
    /// vacated, as a claim would. Returns whether any position changed.
    pub fn rename_occupant(&mut self, old: &str, new: &str) -> bool {
        let renamed: Vec<usize> = (0..self.positions.len())
            .filter(|&i| self.positions[i].occupant.as_deref() == Some(old))
            .collect();
        if renamed.is_empty() {
            return false;
        }
        for (i, position) in self.positions.iter_mut().enumerate() {
            if renamed.contains(&i) {
                position.rename_occupant(new);
            } else if position.is_held_by(new) {
                position.vacate();
            }
        }
        true
    }

    /// Add a substitute unless the same player is already listed.
    pub fn add_sub(&mut self, player: &str) -> bool {
        if self.subs.iter().any(|s| same_player(s, player)) {
            return false;
        }
        self.subs.push(player.to_string());
        true
    }

    /// Remove a substitute (prefix comparison).
    pub fn remove_sub(&mut self, player: &str) -> bool {
        match self.subs.iter().position(|s| same_player(s, player)) {
            Some(idx) => {
                self.subs.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Whether `player` is listed as a substitute.
    pub fn is_sub(&self, player: &str) -> bool {
        self.subs.iter().any(|s| same_player(s, player))
    }

    /// Occupy positions by index, as recorded in a snapshot.
    pub(crate) fn restore_occupancy(
        &mut self,
        occupants: &[Option<String>],
        claimed_at: &[Option<DateTime<Utc>>],
    ) {
        for (i, position) in self.positions.iter_mut().enumerate() {
            match occupants.get(i).cloned().flatten() {
                Some(player) => position.occupy(player, claimed_at.get(i).copied().flatten()),
                None => position.vacate(),
            }
        }
    }

    pub(crate) fn set_subs(&mut self, subs: Vec<String>) {
        self.subs.clear();
        for sub in subs {
            self.add_sub(&sub);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn label(lineup: &Lineup, text: &str) -> PositionLabel {
        lineup.parse_label(text).unwrap()
    }

    #[test]
    fn test_roster_size_templates() {
        assert_eq!(RosterSize::Seven.count(), 7);
        assert_eq!(RosterSize::Three.position_names(), &["gk", "lm", "rm"]);
        assert_eq!(RosterSize::try_from(3), Ok(RosterSize::Three));
        assert!(RosterSize::try_from(5).is_err());
        assert_eq!(u8::from(RosterSize::Seven), 7);
    }

    #[test]
    fn test_new_lineup_has_two_teams_of_positions() {
        let lineup = Lineup::new(RosterSize::Seven, false);
        assert_eq!(lineup.positions().len(), 14);
        assert!(lineup.team(Team::One).iter().all(|p| p.team() == Team::One));
        assert!(lineup.team(Team::Two).iter().all(|p| p.team() == Team::Two));
        assert_eq!(lineup.team(Team::Two)[3].name(), "cdm");
    }

    #[test]
    fn test_parse_label() {
        let lineup = Lineup::new(RosterSize::Seven, false);
        assert_eq!(
            lineup.parse_label("cdm"),
            Some(PositionLabel {
                name: "cdm",
                team: None
            })
        );
        assert_eq!(
            lineup.parse_label("gk2"),
            Some(PositionLabel {
                name: "gk",
                team: Some(Team::Two)
            })
        );
        assert_eq!(lineup.parse_label("gk3"), None);
        assert_eq!(lineup.parse_label("lm"), None);
        assert_eq!(lineup.parse_label(""), None);
    }

    #[test]
    fn test_claim_moves_player() {
        let mut lineup = Lineup::new(RosterSize::Seven, false);
        let gk = lineup.claim(label(&lineup, "gk"), "romdi", now()).unwrap();
        let lb = lineup.claim(label(&lineup, "lb"), "Romdi``", now()).unwrap();

        assert!(lineup.positions()[gk].is_empty());
        assert_eq!(lineup.positions()[lb].occupant(), Some("Romdi``"));
        assert_eq!(lineup.position_of("romdi"), Some(lb));
    }

    #[test]
    fn test_claim_refusals() {
        let mut lineup = Lineup::new(RosterSize::Seven, false);
        lineup.claim(label(&lineup, "gk"), "romdi", now()).unwrap();

        assert_eq!(
            lineup.claim(label(&lineup, "gk"), "romdi", now()),
            Err(ClaimRefusal::AlreadyYours)
        );
        assert_eq!(
            lineup.claim(label(&lineup, "gk"), "Hunki", now()),
            Err(ClaimRefusal::Taken)
        );
    }

    #[test]
    fn test_bare_claim_falls_through_to_team_two() {
        let mut lineup = Lineup::new(RosterSize::Three, true);
        lineup.claim(label(&lineup, "gk"), "romdi", now()).unwrap();
        let idx = lineup.claim(label(&lineup, "gk"), "Hunki", now()).unwrap();
        assert_eq!(lineup.positions()[idx].team(), Team::Two);
        assert_eq!(
            lineup.claim(label(&lineup, "gk"), "third", now()),
            Err(ClaimRefusal::Taken)
        );
    }

    #[test]
    fn test_explicit_team_two_in_one_team_mode() {
        let mut lineup = Lineup::new(RosterSize::Seven, false);
        lineup.claim(label(&lineup, "gk"), "romdi", now()).unwrap();
        let idx = lineup.claim(label(&lineup, "gk2"), "foo", now()).unwrap();
        assert_eq!(lineup.positions()[idx].team(), Team::Two);
        assert_eq!(lineup.team(Team::One)[0].occupant(), Some("romdi"));
    }

    #[test]
    fn test_disable_two_teams_folds_free_slots_only() {
        let mut lineup = Lineup::new(RosterSize::Three, true);
        lineup.claim(label(&lineup, "gk1"), "romdi", now()).unwrap();
        lineup.claim(label(&lineup, "gk2"), "Hunki", now()).unwrap();
        lineup.claim(label(&lineup, "lm2"), "Kaim", now()).unwrap();

        assert!(lineup.set_two_teams(false));

        let team1: Vec<Option<&str>> = lineup.team(Team::One).iter().map(Position::occupant).collect();
        assert_eq!(team1, vec![Some("romdi"), Some("Kaim"), None]);
        assert!(lineup.team(Team::Two).iter().all(Position::is_empty));
        assert!(!lineup.is_playing("Hunki"));
    }

    #[test]
    fn test_set_two_teams_noop() {
        let mut lineup = Lineup::new(RosterSize::Seven, false);
        assert!(!lineup.set_two_teams(false));
        assert!(lineup.set_two_teams(true));
        assert!(lineup.two_teams());
    }

    #[test]
    fn test_rename_occupant_exact() {
        let mut lineup = Lineup::new(RosterSize::Seven, false);
        lineup.claim(label(&lineup, "gk"), "romdi", now()).unwrap();
        assert!(!lineup.rename_occupant("Romdi", "x"));
        assert!(lineup.rename_occupant("romdi", "romdi|afk"));
        assert_eq!(lineup.positions()[0].occupant(), Some("romdi|afk"));
    }

    #[test]
    fn test_rename_vacates_colliding_position() {
        let mut lineup = Lineup::new(RosterSize::Seven, false);
        lineup.claim(label(&lineup, "gk"), "romdi", now()).unwrap();
        lineup.claim(label(&lineup, "lb"), "Hunki", now()).unwrap();

        assert!(lineup.rename_occupant("romdi", "Hunki2"));
        assert_eq!(lineup.positions()[0].occupant(), Some("Hunki2"));
        assert_eq!(lineup.positions()[1].occupant(), None);
        assert!(!lineup.rename_occupant("Hunki", "x"));
    }

    #[test]
    fn test_subs_no_duplicate_keys() {
        let mut lineup = Lineup::new(RosterSize::Seven, false);
        assert!(lineup.add_sub("Kaim"));
        assert!(!lineup.add_sub("kaim`"));
        assert!(lineup.is_sub("KAIM"));
        assert!(lineup.remove_sub("kaim"));
        assert!(!lineup.remove_sub("kaim"));
    }

    #[test]
    fn test_reset() {
        let mut lineup = Lineup::new(RosterSize::Seven, true);
        lineup.claim(label(&lineup, "gk2"), "romdi", now()).unwrap();
        lineup.add_sub("Kaim");
        lineup.reset();
        assert!(lineup.positions().iter().all(Position::is_empty));
        assert!(lineup.subs().is_empty());
        assert!(lineup.two_teams());
    }
}
