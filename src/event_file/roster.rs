use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use glob::glob;
use strum_macros::EnumString;
use tracing::warn;

use crate::event_file::info::Team;
use crate::event_file::stats::{NumericEncoding, PlayerRecord, StatsTracker};
use crate::event_file::traits::{Player, Side};

/// Scorebook hand codes (left, right, switch, both).
#[derive(Debug, Eq, PartialEq, EnumString, Copy, Clone)]
pub enum Hand {
    L,
    R,
    S,
    B,
}

impl Hand {
    /// One-hot over the four codes; an unknown hand encodes as all zeros.
    pub fn one_hot(hand: Option<Self>) -> [f32; 4] {
        let mut slots = [0.0; 4];
        if let Some(h) = hand {
            slots[h as usize] = 1.0;
        }
        slots
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlayerBio {
    pub batting_hand: Option<Hand>,
    pub throwing_hand: Option<Hand>,
}

/// One team-season's roster in deterministic order.
pub type TeamRoster = BTreeMap<Player, PlayerBio>;

/// Who appeared in each team's immediately preceding game.
pub type LastGameRosters = HashMap<Team, HashSet<Player>>;

/// Roster metadata loaded from Retrosheet `TEAMYYYY.ROS` files, keyed by
/// season and team.
#[derive(Debug, Default)]
pub struct RosterStore {
    seasons: HashMap<u16, HashMap<Team, TeamRoster>>,
}

impl RosterStore {
    /// Loads every roster file in a directory. A file that cannot be
    /// read at all is an error; individual bad rows are logged and
    /// skipped.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut store = Self::default();
        let pattern = dir.join("*.ROS");
        let pattern = pattern
            .to_str()
            .with_context(|| format!("Non-UTF8 roster path {}", dir.display()))?;
        for entry in glob(pattern).context("Bad roster glob pattern")? {
            store.load_file(&entry?)?;
        }
        Ok(store)
    }

    fn load_file(&mut self, path: &Path) -> Result<()> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("Unusable roster file name {}", path.display()))?;
        if stem.len() < 7 {
            warn!("skipping roster file with unrecognized name: {stem}");
            return Ok(());
        }
        let team = String::from(&stem[..3]);
        let season = match stem[3..7].parse::<u16>() {
            Ok(season) => season,
            Err(_) => {
                warn!("skipping roster file with no season in its name: {stem}");
                return Ok(());
            }
        };
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open roster file {}", path.display()))?;
        let roster = self
            .seasons
            .entry(season)
            .or_default()
            .entry(team)
            .or_default();
        for record in reader.records() {
            let record = record?;
            match record.get(0) {
                Some(player_id) if !player_id.is_empty() => {
                    let bio = PlayerBio {
                        batting_hand: record.get(3).and_then(|h| Hand::from_str(h.trim()).ok()),
                        throwing_hand: record.get(4).and_then(|h| Hand::from_str(h.trim()).ok()),
                    };
                    roster.insert(String::from(player_id), bio);
                }
                _ => warn!("skipping malformed roster row: {record:?}"),
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, season: u16, team: &str, roster: TeamRoster) {
        self.seasons
            .entry(season)
            .or_default()
            .insert(String::from(team), roster);
    }

    pub fn get(&self, season: u16, team: &str) -> Option<&TeamRoster> {
        self.seasons.get(&season)?.get(team)
    }
}

/// Builds one feature vector per player from pre-game cumulative stats
/// plus roster metadata. Constructed against the *persistent* tracker so
/// vectors never see the game being predicted.
pub struct RosterSnapshotBuilder<'a> {
    stats: &'a StatsTracker,
    roster: Option<&'a TeamRoster>,
    last_game: Option<&'a HashSet<Player>>,
    encoding: NumericEncoding,
}

impl<'a> RosterSnapshotBuilder<'a> {
    pub fn new(
        stats: &'a StatsTracker,
        roster: Option<&'a TeamRoster>,
        last_game: Option<&'a HashSet<Player>>,
        encoding: NumericEncoding,
    ) -> Self {
        Self {
            stats,
            roster,
            last_game,
            encoding,
        }
    }

    /// The home/visitor indicator is appended last; padding code
    /// downstream depends on that placement.
    pub fn build(&self, player_id: &str, side: Side) -> Vec<f32> {
        let mut vector = match self.stats.get_player(player_id) {
            Some(record) => record.to_vector(self.encoding),
            // No prior record: an empty career, not an error.
            None => PlayerRecord::default().to_vector(self.encoding),
        };
        let bio = match self.roster.and_then(|r| r.get(player_id)) {
            Some(bio) => *bio,
            None => {
                warn!("player {player_id} is missing from roster metadata");
                PlayerBio::default()
            }
        };
        vector.extend(Hand::one_hot(bio.batting_hand));
        vector.extend(Hand::one_hot(bio.throwing_hand));
        let played_last = self
            .last_game
            .map_or(false, |players| players.contains(player_id));
        vector.push(f32::from(u8::from(played_last)));
        vector.push(match side {
            Side::Away => 0.0,
            Side::Home => 1.0,
        });
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_one_hot() {
        assert_eq!(Hand::one_hot(Some(Hand::L)), [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(Hand::one_hot(Some(Hand::B)), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(Hand::one_hot(None), [0.0; 4]);
    }

    #[test]
    fn vector_tail_is_flag_then_side() {
        let stats = StatsTracker::new();
        let mut roster = TeamRoster::new();
        roster.insert(
            String::from("smithj01"),
            PlayerBio {
                batting_hand: Some(Hand::L),
                throwing_hand: Some(Hand::R),
            },
        );
        let last_game: HashSet<Player> = [String::from("smithj01")].into_iter().collect();
        let builder = RosterSnapshotBuilder::new(
            &stats,
            Some(&roster),
            Some(&last_game),
            NumericEncoding::Floats,
        );

        let home = builder.build("smithj01", Side::Home);
        assert_eq!(home[home.len() - 1], 1.0);
        assert_eq!(home[home.len() - 2], 1.0);

        let away = builder.build("nobody01", Side::Away);
        assert_eq!(away[away.len() - 1], 0.0);
        assert_eq!(away[away.len() - 2], 0.0);
        // Unknown player, unknown hands: both one-hots all zero.
        let hands = &away[away.len() - 10..away.len() - 2];
        assert!(hands.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn unknown_player_vector_matches_fresh_record_width() {
        let stats = StatsTracker::new();
        let builder = RosterSnapshotBuilder::new(&stats, None, None, NumericEncoding::Floats);
        let a = builder.build("aaaaa001", Side::Away);
        let b = builder.build("bbbbb001", Side::Home);
        assert_eq!(a.len(), b.len());
    }
}
