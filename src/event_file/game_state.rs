use std::cmp::max;
use std::convert::TryFrom;

use anyhow::{bail, Result};
use strum_macros::EnumString;
use tracing::{debug, info, warn};

use crate::event_file::info::{InfoRecord, Team};
use crate::event_file::misc::{AppearanceFields, AppearanceRecord, GameDate, GameId};
use crate::event_file::parser::{EventStream, MappedRecord, MappedRecordKind};
use crate::event_file::play::{PlayOutcome, PlayRecord};
use crate::event_file::roster::{LastGameRosters, RosterSnapshotBuilder, RosterStore};
use crate::event_file::stats::{NumericEncoding, PositionMap, StatsTracker};
use crate::event_file::traits::{
    EventFileError, FromRetrosheetRecord, Matchup, Player, Side,
};

/// A game needs this many well-documented players per team before its
/// sample is worth training on.
const GOOD_PLAYERS_MIN_PER_TEAM: usize = 6;

/// Which players get snapshotted into a game's training sample.
#[derive(Debug, Eq, PartialEq, Copy, Clone, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum RosterStyle {
    /// Everyone who appeared, snapshotted at game end.
    Participants,
    /// The declared starting lineups, snapshotted when the lineup
    /// declarations end.
    Starters,
    /// The entire team roster, snapshotted at the transition.
    Full,
    /// The roster filtered to the previous game's participants.
    Last,
}

pub type FeatureVector = Vec<f32>;

/// Replays one game's worth of events from a shared stream, maintaining
/// team identity, the active lineups, and the running score, and taking
/// pre-game roster snapshots for the training sample.
#[derive(Debug, Default)]
pub struct Game {
    pub game_id: Option<GameId>,
    pub date: Option<GameDate>,
    pub teams: Matchup<Option<Team>>,
    pub score: Matchup<u8>,
    initial_full_roster: Matchup<Vec<FeatureVector>>,
    initial_starting_roster: Matchup<Vec<FeatureVector>>,
    /// Every player who appeared, in appearance order.
    player_ids: Matchup<Vec<Player>>,
    starting_player_ids: Matchup<Vec<Player>>,
    active_players: Matchup<PositionMap>,
    last_record_kind: Option<MappedRecordKind>,
    good_sample: bool,
    encoding: NumericEncoding,
}

impl Game {
    pub fn new(encoding: NumericEncoding) -> Self {
        Self {
            encoding,
            ..Self::default()
        }
    }

    /// Consumes a strict prefix of the stream: everything up to (but not
    /// including) the next id record. The persistent tracker must stay
    /// pristine until the very end, since snapshots taken mid-game read
    /// pre-game stats from it. Play effects land in a per-game tracker
    /// that is merged in as the final step.
    pub fn consume_next_game(
        &mut self,
        stream: &mut EventStream,
        persistent: &mut StatsTracker,
        style: RosterStyle,
        rosters: &RosterStore,
        last_game: &LastGameRosters,
    ) -> Result<Matchup<u8>> {
        let mut game_tracker = StatsTracker::new();

        // Acquire the id record, stepping over any leading junk.
        while self.game_id.is_none() {
            let Some(record) = stream.next_record() else {
                bail!("event stream ended before a game id was found");
            };
            match MappedRecord::new(record) {
                Ok(MappedRecord::GameId(game_id)) => {
                    let date = game_id.game_date()?;
                    info!(game = %game_id.id, season = date.season, "parsing game");
                    self.date = Some(date);
                    self.game_id = Some(game_id);
                }
                _ => warn!("skipping record before game id: {record:?}"),
            }
        }

        loop {
            match stream.peek() {
                // The next id belongs to the following game; leave it.
                Some(record) if EventStream::is_boundary(record) => break,
                Some(_) => {}
                None => break,
            }
            let Some(record) = stream.next_record() else {
                break;
            };
            let (kind, mapped) = match MappedRecord::new(record) {
                Ok(mapped) => (MappedRecordKind::from(&mapped), Some(mapped)),
                Err(e) => {
                    warn!("skipping unparseable record {record:?}: {e:#}");
                    (MappedRecordKind::Unrecognized, None)
                }
            };

            // The first non-start record after the start block means the
            // starting lineups are fully declared: the only safe moment
            // to snapshot pre-game rosters for the transition styles.
            if self.last_record_kind == Some(MappedRecordKind::Start)
                && kind != MappedRecordKind::Start
                && style != RosterStyle::Participants
            {
                self.snapshot_rosters(style, persistent, rosters, last_game);
            }

            if let Some(mapped) = mapped {
                self.apply_record(mapped, &mut game_tracker);
            }
            self.last_record_kind = Some(kind);
        }

        // This style wants everyone who ended up participating, which is
        // only known once the game is over.
        if style == RosterStyle::Participants {
            self.snapshot_rosters(style, persistent, rosters, last_game);
        }

        // Mirror the home lists so starters sit near the edges of the
        // concatenated sample.
        self.initial_full_roster.home.reverse();
        self.initial_starting_roster.home.reverse();

        self.set_quality(persistent);
        persistent.merge(game_tracker);
        Ok(self.score.clone())
    }

    fn apply_record(&mut self, mapped: MappedRecord, tracker: &mut StatsTracker) {
        match mapped {
            MappedRecord::Info(InfoRecord::VisitingTeam(team)) => self.set_team(Side::Away, team),
            MappedRecord::Info(InfoRecord::HomeTeam(team)) => self.set_team(Side::Home, team),
            MappedRecord::Start(fields) => self.apply_appearance(fields, true, tracker),
            MappedRecord::Substitution(fields) => self.apply_appearance(fields, false, tracker),
            MappedRecord::Play(play) => self.apply_play(&play, tracker),
            MappedRecord::GameId(_)
            | MappedRecord::Version
            | MappedRecord::Info(_)
            | MappedRecord::Comment(_)
            | MappedRecord::Unrecognized => {}
        }
    }

    fn set_team(&mut self, side: Side, team: Team) {
        let slot = self.teams.get_mut(side);
        if let Some(existing) = slot {
            // Tolerated last-write-wins, but worth flagging.
            warn!("duplicate team declaration: {existing} replaced by {team}");
        }
        *slot = Some(team);
    }

    fn apply_appearance(
        &mut self,
        fields: AppearanceFields,
        is_starter: bool,
        tracker: &mut StatsTracker,
    ) {
        let record: AppearanceRecord = match fields {
            AppearanceFields::Standard(record) => record,
            AppearanceFields::MissingName(record) => {
                warn!("appearance record is missing its name field, using it anyway: {record:?}");
                record
            }
            AppearanceFields::Invalid(raw) => {
                warn!("skipping malformed appearance record: {raw}");
                return;
            }
        };
        let side = record.side;
        if !self.player_ids.get(side).contains(&record.player) {
            self.player_ids.get_mut(side).push(record.player.clone());
        }
        if is_starter && !self.starting_player_ids.get(side).contains(&record.player) {
            self.starting_player_ids
                .get_mut(side)
                .push(record.player.clone());
        }
        let actives = self.active_players.get_mut(side);
        if let Some(displaced) = actives.get(&record.fielding_position) {
            // The incumbent's attribution window at this position closes.
            let displaced = displaced.clone();
            debug!(
                slot = ?record.lineup_position,
                "{displaced} displaced at {:?} by {}", record.fielding_position, record.player
            );
            tracker.unassign_player(&displaced, record.fielding_position);
        }
        actives.insert(record.fielding_position, record.player.clone());
        tracker.set_player_position(&record.player, record.fielding_position);
    }

    fn apply_play(&mut self, play: &PlayRecord, tracker: &mut StatsTracker) {
        let outcome = match PlayOutcome::try_from(play) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("skipping unclassifiable play {play:?}: {e:#}");
                return;
            }
        };
        let fielders = self.active_players.get(play.side);
        let points = tracker.play(&outcome, &play.batter, fielders);
        self.score.tally(&points);
    }

    fn snapshot_rosters(
        &mut self,
        style: RosterStyle,
        persistent: &StatsTracker,
        rosters: &RosterStore,
        last_game: &LastGameRosters,
    ) {
        let Some(date) = self.date else { return };
        for side in Side::BOTH {
            let Some(team) = self.teams.get(side).clone() else {
                warn!("team id for {side:?} was never declared, skipping its snapshots");
                continue;
            };
            let team_roster = rosters.get(date.season, &team);
            let previous = last_game.get(&team);
            let builder =
                RosterSnapshotBuilder::new(persistent, team_roster, previous, self.encoding);
            match style {
                RosterStyle::Starters => {
                    let ids = self.starting_player_ids.get(side).clone();
                    let snapshots = self.initial_starting_roster.get_mut(side);
                    for id in &ids {
                        snapshots.push(builder.build(id, side));
                    }
                }
                RosterStyle::Participants => {
                    let ids = self.player_ids.get(side).clone();
                    let snapshots = self.initial_full_roster.get_mut(side);
                    for id in &ids {
                        snapshots.push(builder.build(id, side));
                    }
                }
                RosterStyle::Full | RosterStyle::Last => {
                    let Some(team_roster) = team_roster else {
                        warn!(
                            "no roster metadata for {team} in {}, skipping its snapshots",
                            date.season
                        );
                        continue;
                    };
                    let snapshots = self.initial_full_roster.get_mut(side);
                    for id in team_roster.keys() {
                        if style == RosterStyle::Last
                            && !previous.map_or(false, |players| players.contains(id))
                        {
                            continue;
                        }
                        snapshots.push(builder.build(id, side));
                    }
                }
            }
        }
    }

    fn set_quality(&mut self, persistent: &StatsTracker) {
        let Some(game_id) = &self.game_id else {
            self.good_sample = false;
            return;
        };
        for side in Side::BOTH {
            let good = self
                .player_ids
                .get(side)
                .iter()
                .filter(|id| {
                    persistent
                        .get_player(id)
                        .map_or(false, |record| record.good_sample())
                })
                .count();
            let team = self.teams.get(side).as_deref().unwrap_or("<unset>");
            if good < GOOD_PLAYERS_MIN_PER_TEAM {
                self.good_sample = false;
                info!(
                    game = %game_id.id,
                    "game is too sparse: only {good} well documented players on team {team}"
                );
                return;
            }
            let full = self.initial_full_roster.get(side).len();
            let starting = self.initial_starting_roster.get(side).len();
            if full < GOOD_PLAYERS_MIN_PER_TEAM && starting < GOOD_PLAYERS_MIN_PER_TEAM {
                self.good_sample = false;
                info!(
                    game = %game_id.id,
                    "game is too sparse: only {} total players on team {team}",
                    max(full, starting)
                );
                return;
            }
        }
        self.good_sample = true;
    }

    /// Advisory only; downstream training-set filtering reads it.
    pub fn is_good_sample(&self) -> bool {
        self.good_sample
    }

    /// Feeds the previous-game roster map for the `last` style, which
    /// assumes the coach fields roughly the same players as last game.
    pub fn participants(&self) -> Vec<(Team, Vec<Player>)> {
        Side::BOTH
            .iter()
            .filter_map(|&side| {
                self.teams
                    .get(side)
                    .clone()
                    .map(|team| (team, self.player_ids.get(side).clone()))
            })
            .collect()
    }

    /// Returns the snapshot vectors and final score once the game has
    /// been replayed. Calling this before an id record was ingested is a
    /// caller ordering mistake, reported as such.
    pub fn to_sample(
        &self,
        starters_only: bool,
    ) -> Result<(Vec<FeatureVector>, u8, u8), EventFileError> {
        if self.game_id.is_none() {
            return Err(EventFileError::GameNotPopulated);
        }
        let roster = if starters_only {
            &self.initial_starting_roster
        } else {
            &self.initial_full_roster
        };
        let mut sample = roster.away.clone();
        sample.extend(roster.home.iter().cloned());
        Ok((sample, self.score.away, self.score.home))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_file::roster::{Hand, PlayerBio, TeamRoster};
    use crate::event_file::traits::{FieldingPosition, RetrosheetEventRecord};

    fn record(fields: &[&str]) -> RetrosheetEventRecord {
        RetrosheetEventRecord::from(fields.to_vec())
    }

    fn scripted_game() -> Vec<RetrosheetEventRecord> {
        vec![
            record(&["id", "TEST01198304"]),
            record(&["version", "2"]),
            record(&["info", "visteam", "VIS"]),
            record(&["info", "hometeam", "HOM"]),
            record(&["start", "p1", "Home Pitcher", "1", "9", "1"]),
            record(&["start", "p2", "Home Batter", "1", "1", "3"]),
            record(&["play", "1", "1", "p2", "00", "", "S8.3-H"]),
            record(&["id", "TES198304050"]),
        ]
    }

    fn consume(
        records: Vec<RetrosheetEventRecord>,
        persistent: &mut StatsTracker,
        style: RosterStyle,
    ) -> (Game, EventStream) {
        let mut stream = EventStream::from_records(records);
        let mut game = Game::new(NumericEncoding::Floats);
        game.consume_next_game(
            &mut stream,
            persistent,
            style,
            &RosterStore::default(),
            &LastGameRosters::new(),
        )
        .unwrap();
        (game, stream)
    }

    #[test]
    fn scripted_game_end_to_end() {
        let mut persistent = StatsTracker::new();
        let (game, stream) = consume(scripted_game(), &mut persistent, RosterStyle::Participants);

        assert_eq!(game.game_id.as_ref().unwrap().id, "TEST01198304");
        assert_eq!(game.date.unwrap().season, 1983);
        assert_eq!(game.score, Matchup::new(0, 1));
        // The home pitcher faced exactly one batter, now visible in the
        // persistent tracker after the end-of-game merge.
        assert_eq!(
            persistent.get_player("p1").unwrap().pitching.batters_faced,
            1
        );
        assert_eq!(persistent.get_player("p2").unwrap().batting.hits, 1);
        // The boundary id was peeked, not consumed.
        assert!(EventStream::is_boundary(stream.peek().unwrap()));
    }

    #[test]
    fn persistent_tracker_is_untouched_until_game_end() {
        let mut persistent = StatsTracker::new();
        let (game, _) = consume(scripted_game(), &mut persistent, RosterStyle::Participants);
        // Snapshots were taken before the merge: p2's vector shows an
        // empty career even though the play landed in the same game.
        let (sample, visitor, home) = game.to_sample(false).unwrap();
        assert_eq!((visitor, home), (0, 1));
        assert_eq!(sample.len(), 2);
        for vector in &sample {
            // Plate appearances (first feature) must predate this game.
            assert_eq!(vector[0], 0.0);
            // Home/visitor indicator is last for every style.
            assert_eq!(vector[vector.len() - 1], 1.0);
        }
    }

    #[test]
    fn leading_junk_is_skipped() {
        let mut records = vec![record(&["com", "stray comment"])];
        records.extend(scripted_game());
        let mut persistent = StatsTracker::new();
        let (game, _) = consume(records, &mut persistent, RosterStyle::Participants);
        assert_eq!(game.game_id.unwrap().id, "TEST01198304");
    }

    #[test]
    fn implausible_year_aborts_the_game() {
        let records = vec![record(&["id", "XXX098304080"])];
        let mut stream = EventStream::from_records(records);
        let mut game = Game::new(NumericEncoding::Floats);
        let result = game.consume_next_game(
            &mut stream,
            &mut StatsTracker::new(),
            RosterStyle::Participants,
            &RosterStore::default(),
            &LastGameRosters::new(),
        );
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EventFileError>(),
            Some(EventFileError::ImplausibleGameDate { .. })
        ));
    }

    #[test]
    fn substitution_displaces_exactly_one_incumbent() {
        let mut records = scripted_game();
        // Replace the boundary with a sub at position 3, a play, then
        // the boundary again.
        records.pop();
        records.push(record(&["sub", "p3", "Late Sub", "1", "1", "3"]));
        records.push(record(&["play", "2", "1", "p3", "00", "", "K"]));
        records.push(record(&["id", "TES198304050"]));

        let mut persistent = StatsTracker::new();
        let (_, _) = consume(records, &mut persistent, RosterStyle::Participants);

        // p3 is the sole occupant of position 3; p2's assignment closed.
        assert_eq!(
            persistent.get_player("p3").unwrap().current_position,
            Some(FieldingPosition::FirstBaseman)
        );
        assert_eq!(persistent.get_player("p2").unwrap().current_position, None);
    }

    #[test]
    fn to_sample_before_id_is_a_usage_error() {
        let game = Game::new(NumericEncoding::Floats);
        assert!(matches!(
            game.to_sample(false),
            Err(EventFileError::GameNotPopulated)
        ));
    }

    #[test]
    fn starters_style_snapshots_at_transition_only() {
        let mut records = scripted_game();
        records.pop();
        records.push(record(&["sub", "p3", "Late Sub", "1", "1", "3"]));
        records.push(record(&["id", "TES198304050"]));

        let mut persistent = StatsTracker::new();
        let (game, _) = consume(records, &mut persistent, RosterStyle::Starters);
        let (sample, _, _) = game.to_sample(true).unwrap();
        // Only the two declared starters; the sub never enters.
        assert_eq!(sample.len(), 2);
        for vector in &sample {
            assert_eq!(vector[vector.len() - 1], 1.0);
        }
    }

    #[test]
    fn full_style_reads_roster_metadata() {
        let mut rosters = RosterStore::default();
        let mut roster = TeamRoster::new();
        for id in ["p1", "p2", "benchp01"] {
            roster.insert(
                String::from(id),
                PlayerBio {
                    batting_hand: Some(Hand::R),
                    throwing_hand: Some(Hand::R),
                },
            );
        }
        rosters.insert(1983, "HOM", roster);

        let mut stream = EventStream::from_records(scripted_game());
        let mut game = Game::new(NumericEncoding::Floats);
        game.consume_next_game(
            &mut stream,
            &mut StatsTracker::new(),
            RosterStyle::Full,
            &rosters,
            &LastGameRosters::new(),
        )
        .unwrap();
        let (sample, _, _) = game.to_sample(false).unwrap();
        // VIS has no roster metadata (skipped with a warning); HOM
        // contributes its full three-player roster.
        assert_eq!(sample.len(), 3);
    }

    #[test]
    fn home_roster_is_mirrored() {
        let mut persistent = StatsTracker::new();
        // Seed p1 with one prior plate appearance so the two home
        // vectors are distinguishable.
        let prior = PlayRecord {
            inning: 1,
            side: Side::Away,
            batter: String::from("p1"),
            raw_play: String::from("S8"),
        };
        let outcome = PlayOutcome::try_from(&prior).unwrap();
        persistent.play(&outcome, "p1", &PositionMap::new());

        let (game, _) = consume(scripted_game(), &mut persistent, RosterStyle::Participants);
        let participants = game.participants();
        assert_eq!(participants.len(), 2);
        assert!(participants[0].1.is_empty());
        assert_eq!(
            participants[1].1,
            vec![String::from("p1"), String::from("p2")]
        );

        // p1 appeared first, so after the home-side reversal his vector
        // comes last in the concatenated sample.
        let (sample, _, _) = game.to_sample(false).unwrap();
        assert_eq!(sample.len(), 2);
        assert_eq!(sample[0][0], 0.0);
        assert_eq!(sample[1][0], 1.0);
    }
}
