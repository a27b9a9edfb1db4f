use chrono::NaiveDate;
use serde::Serialize;

use crate::event_file::game_state::{FeatureVector, Game};
use crate::event_file::stats::{PlayerRecord, StatsTracker};
use crate::event_file::traits::EventFileError;

/// One training-example row: the game it belongs to, then the feature
/// tail. Written headerless because the feature block width depends on
/// the encoding configuration.
#[derive(Debug, Serialize)]
pub struct SampleRow {
    game_id: String,
    features: FeatureVector,
}

impl SampleRow {
    pub fn from_game(game: &Game, starters_only: bool) -> Result<Vec<Self>, EventFileError> {
        let (vectors, _, _) = game.to_sample(starters_only)?;
        let game_id = game
            .game_id
            .as_ref()
            .ok_or(EventFileError::GameNotPopulated)?;
        Ok(vectors
            .into_iter()
            .map(|features| Self {
                game_id: game_id.id.clone(),
                features,
            })
            .collect())
    }
}

/// One row per parsed game, joinable to its sample rows by id.
#[derive(Debug, Serialize)]
pub struct GameRow {
    game_id: String,
    season: u16,
    date: Option<NaiveDate>,
    visiting_team: Option<String>,
    home_team: Option<String>,
    visiting_score: u8,
    home_score: u8,
    usable_sample: bool,
}

impl GameRow {
    pub fn from_game(game: &Game) -> Result<Self, EventFileError> {
        let game_id = game
            .game_id
            .as_ref()
            .ok_or(EventFileError::GameNotPopulated)?;
        let date = game.date.ok_or(EventFileError::GameNotPopulated)?;
        Ok(Self {
            game_id: game_id.id.clone(),
            season: date.season,
            date: date.date,
            visiting_team: game.teams.away.clone(),
            home_team: game.teams.home.clone(),
            visiting_score: game.score.away,
            home_score: game.score.home,
            usable_sample: game.is_good_sample(),
        })
    }
}

/// Career counters for one player, written after every segment tracker
/// has been folded together.
#[derive(Debug, Serialize)]
pub struct PlayerCumulativeRow {
    player_id: String,
    plate_appearances: u32,
    at_bats: u32,
    hits: u32,
    doubles: u32,
    triples: u32,
    home_runs: u32,
    walks: u32,
    strikeouts: u32,
    hit_by_pitch: u32,
    batters_faced: u32,
    pitching_outs: u32,
    hits_allowed: u32,
    home_runs_allowed: u32,
    walks_allowed: u32,
    pitching_strikeouts: u32,
    hit_batters: u32,
    wild_pitches: u32,
    balks: u32,
    runs_allowed: u32,
    fielding_plays: u32,
    putouts: u32,
    assists: u32,
    errors: u32,
}

impl PlayerCumulativeRow {
    fn new(player_id: &str, record: &PlayerRecord) -> Self {
        Self {
            player_id: String::from(player_id),
            plate_appearances: record.batting.plate_appearances,
            at_bats: record.batting.at_bats,
            hits: record.batting.hits,
            doubles: record.batting.doubles,
            triples: record.batting.triples,
            home_runs: record.batting.home_runs,
            walks: record.batting.walks,
            strikeouts: record.batting.strikeouts,
            hit_by_pitch: record.batting.hit_by_pitch,
            batters_faced: record.pitching.batters_faced,
            pitching_outs: record.pitching.outs_recorded,
            hits_allowed: record.pitching.hits_allowed,
            home_runs_allowed: record.pitching.home_runs_allowed,
            walks_allowed: record.pitching.walks,
            pitching_strikeouts: record.pitching.strikeouts,
            hit_batters: record.pitching.hit_batters,
            wild_pitches: record.pitching.wild_pitches,
            balks: record.pitching.balks,
            runs_allowed: record.pitching.runs_allowed,
            fielding_plays: record.fielding.plays,
            putouts: record.fielding.putouts,
            assists: record.fielding.assists,
            errors: record.fielding.errors,
        }
    }

    /// Rows for every tracked player, in the tracker's deterministic
    /// order.
    pub fn from_tracker(tracker: &StatsTracker) -> Vec<Self> {
        tracker
            .players()
            .map(|(player_id, record)| Self::new(player_id, record))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_file::play::{PlayOutcome, PlayRecord};
    use crate::event_file::stats::PositionMap;
    use crate::event_file::traits::Side;
    use std::convert::TryFrom;

    #[test]
    fn cumulative_rows_are_sorted_by_player() {
        let mut tracker = StatsTracker::new();
        let play = PlayRecord {
            inning: 1,
            side: Side::Away,
            batter: String::from("zzzzz001"),
            raw_play: String::from("S8"),
        };
        let outcome = PlayOutcome::try_from(&play).unwrap();
        tracker.play(&outcome, "zzzzz001", &PositionMap::new());
        tracker.play(&outcome, "aaaaa001", &PositionMap::new());

        let rows = PlayerCumulativeRow::from_tracker(&tracker);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].player_id, "aaaaa001");
        assert_eq!(rows[1].player_id, "zzzzz001");
        assert_eq!(rows[0].hits, 1);
    }
}
