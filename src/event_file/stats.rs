use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use serde::Serialize;
use tracing::warn;

use crate::event_file::play::{PlayOutcome, PlayResult};
use crate::event_file::traits::{FieldingPosition, Matchup, Player};

/// A player is well-documented once their career sample crosses one of
/// these bars; below them, rate statistics are mostly noise.
const MIN_PLATE_APPEARANCES: u32 = 25;
const MIN_PITCHING_OUTS: u32 = 30;

/// How rate statistics are written into feature vectors: as-is, or
/// scaled by 1000 and truncated for integer-only consumers.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
pub enum NumericEncoding {
    #[default]
    Floats,
    Integers,
}

impl NumericEncoding {
    fn rate(self, rate: f32) -> f32 {
        match self {
            Self::Floats => rate,
            Self::Integers => (rate * 1000.0).trunc(),
        }
    }
}

fn ratio(numerator: u32, denominator: u32) -> f32 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f32 / denominator as f32
    }
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize)]
pub struct BattingStats {
    pub plate_appearances: u32,
    pub at_bats: u32,
    pub hits: u32,
    pub doubles: u32,
    pub triples: u32,
    pub home_runs: u32,
    pub walks: u32,
    pub strikeouts: u32,
    pub hit_by_pitch: u32,
}

impl BattingStats {
    pub fn update(&mut self, outcome: &PlayOutcome) {
        type R = PlayResult;
        match outcome.result {
            R::Single => self.hit(0),
            R::Double | R::GroundRuleDouble => self.hit(1),
            R::Triple => self.hit(2),
            R::HomeRun => self.hit(3),
            R::StrikeOut => {
                self.plate_appearance(true);
                self.strikeouts += 1;
            }
            R::Walk | R::IntentionalWalk => {
                self.plate_appearance(false);
                self.walks += 1;
            }
            R::HitByPitch => {
                self.plate_appearance(false);
                self.hit_by_pitch += 1;
            }
            R::Out | R::FieldersChoice | R::ReachedOnError => self.plate_appearance(true),
            // Not a plate appearance (wild pitches, balks, and the like).
            _ => {}
        }
    }

    fn plate_appearance(&mut self, is_at_bat: bool) {
        self.plate_appearances += 1;
        if is_at_bat {
            self.at_bats += 1;
        }
    }

    fn hit(&mut self, extra_bases: u32) {
        self.plate_appearance(true);
        self.hits += 1;
        match extra_bases {
            1 => self.doubles += 1,
            2 => self.triples += 1,
            3 => self.home_runs += 1,
            _ => {}
        }
    }

    pub fn merge(&mut self, other: &Self) {
        self.plate_appearances += other.plate_appearances;
        self.at_bats += other.at_bats;
        self.hits += other.hits;
        self.doubles += other.doubles;
        self.triples += other.triples;
        self.home_runs += other.home_runs;
        self.walks += other.walks;
        self.strikeouts += other.strikeouts;
        self.hit_by_pitch += other.hit_by_pitch;
    }

    pub fn to_vector(&self, encoding: NumericEncoding) -> Vec<f32> {
        let total_bases = self.hits + self.doubles + 2 * self.triples + 3 * self.home_runs;
        let on_base = self.hits + self.walks + self.hit_by_pitch;
        vec![
            self.plate_appearances as f32,
            self.at_bats as f32,
            self.hits as f32,
            self.doubles as f32,
            self.triples as f32,
            self.home_runs as f32,
            self.walks as f32,
            self.strikeouts as f32,
            self.hit_by_pitch as f32,
            encoding.rate(ratio(self.hits, self.at_bats)),
            encoding.rate(ratio(on_base, self.plate_appearances)),
            encoding.rate(ratio(total_bases, self.at_bats)),
        ]
    }
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize)]
pub struct PitchingStats {
    pub batters_faced: u32,
    pub outs_recorded: u32,
    pub hits_allowed: u32,
    pub home_runs_allowed: u32,
    pub walks: u32,
    pub strikeouts: u32,
    pub hit_batters: u32,
    pub wild_pitches: u32,
    pub balks: u32,
    pub runs_allowed: u32,
}

impl PitchingStats {
    pub fn update(&mut self, outcome: &PlayOutcome) {
        type R = PlayResult;
        match outcome.result {
            R::Single | R::Double | R::GroundRuleDouble | R::Triple => {
                self.batters_faced += 1;
                self.hits_allowed += 1;
            }
            R::HomeRun => {
                self.batters_faced += 1;
                self.hits_allowed += 1;
                self.home_runs_allowed += 1;
            }
            R::StrikeOut => {
                self.batters_faced += 1;
                self.strikeouts += 1;
                self.outs_recorded += 1;
            }
            R::Walk | R::IntentionalWalk => {
                self.batters_faced += 1;
                self.walks += 1;
            }
            R::HitByPitch => {
                self.batters_faced += 1;
                self.hit_batters += 1;
            }
            R::Out | R::FieldersChoice => {
                self.batters_faced += 1;
                self.outs_recorded += 1;
            }
            R::ReachedOnError => self.batters_faced += 1,
            R::WildPitch => self.wild_pitches += 1,
            R::Balk => self.balks += 1,
            _ => {}
        }
        self.runs_allowed += u32::from(outcome.points.away) + u32::from(outcome.points.home);
    }

    pub fn merge(&mut self, other: &Self) {
        self.batters_faced += other.batters_faced;
        self.outs_recorded += other.outs_recorded;
        self.hits_allowed += other.hits_allowed;
        self.home_runs_allowed += other.home_runs_allowed;
        self.walks += other.walks;
        self.strikeouts += other.strikeouts;
        self.hit_batters += other.hit_batters;
        self.wild_pitches += other.wild_pitches;
        self.balks += other.balks;
        self.runs_allowed += other.runs_allowed;
    }

    pub fn to_vector(&self, encoding: NumericEncoding) -> Vec<f32> {
        vec![
            self.batters_faced as f32,
            self.outs_recorded as f32,
            self.hits_allowed as f32,
            self.home_runs_allowed as f32,
            self.walks as f32,
            self.strikeouts as f32,
            self.hit_batters as f32,
            self.wild_pitches as f32,
            self.balks as f32,
            self.runs_allowed as f32,
            encoding.rate(ratio(self.outs_recorded, 3)),
            encoding.rate(ratio(27 * self.runs_allowed, self.outs_recorded)),
        ]
    }
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize)]
pub struct FieldingStats {
    pub plays: u32,
    pub putouts: u32,
    pub assists: u32,
    pub errors: u32,
}

impl FieldingStats {
    pub fn update(&mut self, outcome: &PlayOutcome, position: FieldingPosition) {
        self.participated();
        if outcome.error_positions.contains(&position) {
            self.error();
        }
        if outcome.result.is_out() {
            match outcome.fielders_involved.last() {
                Some(last) if *last == position => self.putouts += 1,
                Some(_) if outcome.fielders_involved.contains(&position) => self.assists += 1,
                _ => {}
            }
        }
    }

    pub fn participated(&mut self) {
        self.plays += 1;
    }

    pub fn error(&mut self) {
        self.errors += 1;
    }

    pub fn merge(&mut self, other: &Self) {
        self.plays += other.plays;
        self.putouts += other.putouts;
        self.assists += other.assists;
        self.errors += other.errors;
    }

    pub fn to_vector(&self, encoding: NumericEncoding) -> Vec<f32> {
        let chances = self.putouts + self.assists + self.errors;
        vec![
            self.plays as f32,
            self.putouts as f32,
            self.assists as f32,
            self.errors as f32,
            encoding.rate(ratio(self.putouts + self.assists, chances)),
        ]
    }
}

/// One player's cumulative record across every game seen so far, plus
/// the position they currently occupy in an active lineup.
#[derive(Debug, Default, Clone)]
pub struct PlayerRecord {
    pub batting: BattingStats,
    pub pitching: PitchingStats,
    pub fielding: FieldingStats,
    pub current_position: Option<FieldingPosition>,
}

impl PlayerRecord {
    pub fn good_sample(&self) -> bool {
        self.batting.plate_appearances >= MIN_PLATE_APPEARANCES
            || self.pitching.outs_recorded >= MIN_PITCHING_OUTS
    }

    pub fn set_position(&mut self, position: FieldingPosition) {
        self.current_position = Some(position);
    }

    /// Clears the assignment only if the player still holds that slot;
    /// a player moved to another position keeps the newer assignment.
    pub fn unassign_position(&mut self, old_position: FieldingPosition) {
        if self.current_position == Some(old_position) {
            self.current_position = None;
        }
    }

    pub fn merge(&mut self, other: Self) {
        self.batting.merge(&other.batting);
        self.pitching.merge(&other.pitching);
        self.fielding.merge(&other.fielding);
        if self.current_position.is_none() {
            self.current_position = other.current_position;
        }
    }

    pub fn to_vector(&self, encoding: NumericEncoding) -> Vec<f32> {
        let mut vector = self.batting.to_vector(encoding);
        vector.extend(self.pitching.to_vector(encoding));
        vector.extend(self.fielding.to_vector(encoding));
        vector
    }
}

/// Which player currently holds each defensive position for one team.
pub type PositionMap = HashMap<FieldingPosition, Player>;

/// Calculates all players' statistics by reading every play. A single
/// play may update the pitcher, the batter, and several fielders.
#[derive(Debug, Default)]
pub struct StatsTracker {
    players: BTreeMap<Player, PlayerRecord>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_player(&self, player_id: &str) -> Option<&PlayerRecord> {
        self.players.get(player_id)
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.players.contains_key(player_id)
    }

    /// Players in deterministic (sorted) order.
    pub fn players(&self) -> impl Iterator<Item = (&Player, &PlayerRecord)> {
        self.players.iter()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn get_or_create(&mut self, player_id: &str) -> &mut PlayerRecord {
        self.players
            .entry(String::from(player_id))
            .or_default()
    }

    pub fn set_player_position(&mut self, player_id: &str, position: FieldingPosition) {
        self.get_or_create(player_id).set_position(position);
    }

    pub fn unassign_player(&mut self, player_id: &str, old_position: FieldingPosition) {
        if let Some(record) = self.players.get_mut(player_id) {
            record.unassign_position(old_position);
        }
    }

    /// Routes one play's effects to every involved player and returns its
    /// score delta unchanged.
    pub fn play(
        &mut self,
        outcome: &PlayOutcome,
        batter: &str,
        fielders: &PositionMap,
    ) -> Matchup<u8> {
        type R = PlayResult;
        if outcome.result == R::NoPlay {
            return Matchup::default();
        }
        if outcome.result == R::PassedBall {
            // A passed ball is a catcher miscue; nobody else is charged.
            if let Some(catcher) = fielders.get(&FieldingPosition::Catcher) {
                let record = self.get_or_create(catcher);
                record.fielding.participated();
                record.fielding.error();
            } else {
                warn!("passed ball with no catcher assigned: {outcome:?}");
            }
        } else if outcome.result.is_baserunning_only() {
            // No pitcher/batter credit is derivable from these codes.
        } else {
            if let Some(pitcher) = fielders.get(&FieldingPosition::Pitcher) {
                self.get_or_create(pitcher).pitching.update(outcome);
            } else {
                warn!("play with no pitcher assigned: {outcome:?}");
            }
            self.get_or_create(batter).batting.update(outcome);
        }

        for position in outcome
            .fielders_involved
            .iter()
            .chain(outcome.error_positions.iter())
            .unique()
        {
            match fielders.get(position) {
                Some(fielder) => {
                    let fielder = fielder.clone();
                    self.get_or_create(&fielder).fielding.update(outcome, *position);
                }
                None => warn!(
                    "play names fielder position {position:?} with no assigned player: {outcome:?}"
                ),
            }
        }

        outcome.points.clone()
    }

    /// Folds another tracker into this one. Counter addition commutes, so
    /// per-segment trackers can be combined in any order.
    pub fn merge(&mut self, other: StatsTracker) {
        for (player_id, record) in other.players {
            match self.players.entry(player_id) {
                Entry::Occupied(mut e) => e.get_mut().merge(record),
                Entry::Vacant(e) => {
                    e.insert(record);
                }
            }
        }
    }
}
