use std::convert::TryFrom;
use std::str::FromStr;

use anyhow::{Context, Result};
use const_format::concatcp;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use strum_macros::EnumString;

use crate::event_file::traits::{
    Batter, FieldingPosition, FromRetrosheetRecord, Inning, Matchup, RetrosheetEventRecord, Side,
};
use crate::util::{digit_vec, parse_positive_int};

pub type PositionVec = Vec<FieldingPosition>;

// Advance grammar: the moving runner's origin, then a successful advance
// or an out attempt, then optional parenthesized fielding/error detail.
const GROUP_FROM: &str = r"^(?P<from>[B123])";
const GROUP_TO: &str = r"(?:-(?P<to>[123H])|X(?P<out_at>[123H]))";
const GROUP_MODS: &str = r"(?P<mods>.*)?";
const ADVANCE: &str = concatcp!(GROUP_FROM, GROUP_TO, GROUP_MODS);

lazy_static! {
    static ref ADVANCE_REGEX: Regex = Regex::new(ADVANCE).unwrap();
    static ref STRIP_CHARS_REGEX: Regex = Regex::new(r"[#! ]").unwrap();
    static ref ERROR_POSITION_REGEX: Regex = Regex::new(r"E(?P<pos>[0-9])").unwrap();
    static ref PAREN_GROUP_REGEX: Regex = Regex::new(r"\([B123]?\)").unwrap();
    static ref PAREN_CONTENTS_REGEX: Regex = Regex::new(r"\(([^)]*)\)").unwrap();
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PlayRecord {
    pub inning: Inning,
    /// The batting side as declared on the play line.
    pub side: Side,
    pub batter: Batter,
    pub raw_play: String,
}

impl FromRetrosheetRecord for PlayRecord {
    fn new(record: &RetrosheetEventRecord) -> Result<PlayRecord> {
        let record = record.deserialize::<[&str; 7]>(None)?;
        Ok(PlayRecord {
            inning: parse_positive_int::<u8>(record[1]).context("Invalid inning")?,
            side: Side::from_str(record[2])?,
            batter: String::from(record[3]),
            raw_play: String::from(record[6].trim_end()),
        })
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, EnumString)]
pub enum PlayResult {
    #[strum(serialize = "S")]
    Single,
    #[strum(serialize = "D")]
    Double,
    #[strum(serialize = "DGR")]
    GroundRuleDouble,
    #[strum(serialize = "T")]
    Triple,
    #[strum(serialize = "H", serialize = "HR")]
    HomeRun,
    #[strum(serialize = "K")]
    StrikeOut,
    #[strum(serialize = "W")]
    Walk,
    #[strum(serialize = "I", serialize = "IW")]
    IntentionalWalk,
    #[strum(serialize = "HP")]
    HitByPitch,
    #[strum(serialize = "E")]
    ReachedOnError,
    #[strum(serialize = "FC")]
    FieldersChoice,
    #[strum(serialize = "FLE")]
    FoulBallError,
    #[strum(serialize = "SB")]
    StolenBase,
    #[strum(serialize = "SBH")]
    StolenBaseHome,
    #[strum(serialize = "CS")]
    CaughtStealing,
    #[strum(serialize = "CSH")]
    CaughtStealingHome,
    #[strum(serialize = "PO")]
    PickedOff,
    #[strum(serialize = "POCS")]
    PickedOffCaughtStealing,
    #[strum(serialize = "POCSH")]
    PickedOffCaughtStealingHome,
    #[strum(serialize = "DI")]
    DefensiveIndifference,
    #[strum(serialize = "OA")]
    OtherAdvance,
    #[strum(serialize = "C")]
    Interference,
    #[strum(serialize = "PB")]
    PassedBall,
    #[strum(serialize = "WP")]
    WildPitch,
    #[strum(serialize = "BK")]
    Balk,
    #[strum(serialize = "NP")]
    NoPlay,
    /// A fielded out, written as a bare fielder digit sequence.
    Out,
    /// A code outside the grammar; tolerated with no attribution.
    Other,
}

impl PlayResult {
    /// Codes whose pitcher/batter credit cannot be derived from the
    /// result alone. Fielders named by the play are still credited.
    pub const fn is_baserunning_only(self) -> bool {
        matches!(
            self,
            Self::StolenBase
                | Self::StolenBaseHome
                | Self::CaughtStealing
                | Self::CaughtStealingHome
                | Self::PickedOff
                | Self::PickedOffCaughtStealing
                | Self::PickedOffCaughtStealingHome
                | Self::FoulBallError
                | Self::OtherAdvance
                | Self::DefensiveIndifference
                | Self::Interference
        )
    }

    pub const fn is_out(self) -> bool {
        matches!(
            self,
            Self::Out
                | Self::StrikeOut
                | Self::CaughtStealing
                | Self::CaughtStealingHome
                | Self::PickedOff
                | Self::PickedOffCaughtStealing
                | Self::PickedOffCaughtStealingHome
        )
    }

    const fn takes_fielders_from_parens(self) -> bool {
        matches!(
            self,
            Self::StolenBase
                | Self::StolenBaseHome
                | Self::CaughtStealing
                | Self::CaughtStealingHome
                | Self::PickedOff
                | Self::PickedOffCaughtStealing
                | Self::PickedOffCaughtStealingHome
        )
    }
}

/// The classified effect of one play event: what happened, which fielders
/// touched the ball, who was charged an error, and the runs it scored.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PlayOutcome {
    pub result: PlayResult,
    pub fielders_involved: PositionVec,
    pub error_positions: PositionVec,
    /// Score delta, credited to the batting side.
    pub points: Matchup<u8>,
}

impl TryFrom<&PlayRecord> for PlayOutcome {
    type Error = anyhow::Error;

    fn try_from(record: &PlayRecord) -> Result<Self> {
        let cleaned = STRIP_CHARS_REGEX.replace_all(&record.raw_play, "");
        let (main_str, advance_str) = match cleaned.split_once('.') {
            Some((m, a)) => (m, Some(a)),
            None => (cleaned.as_ref(), None),
        };
        // The primary action; secondary plays chained with +/; contribute
        // runs through the advance section, not a second result code.
        let primary = main_str
            .split(['+', ';'])
            .next()
            .unwrap_or("")
            .split('/')
            .next()
            .unwrap_or("");

        let mut error_positions = positions(&error_digits(main_str));
        let (result, mut fielders_involved) = classify_main(primary, !error_positions.is_empty());

        let mut runs: u8 = 0;
        let mut batter_advanced = false;
        let mut runner_from_third_advanced = false;
        for segment in advance_str.iter().flat_map(|a| a.split(';')) {
            let Some(captures) = ADVANCE_REGEX.captures(segment.trim()) else {
                continue;
            };
            let mods = captures.name("mods").map_or("", |m| m.as_str());
            let segment_errors = error_digits(mods);
            // Fielders recorded on the throw, minus any charged an error.
            let mut throw_digits = digit_vec(mods);
            throw_digits.retain(|d| !segment_errors.contains(d));
            fielders_involved.extend(positions(&throw_digits));
            error_positions.extend(positions(&segment_errors));

            let out_at_home = captures.name("out_at").map_or(false, |b| b.as_str() == "H");
            let safe_at_home = captures.name("to").map_or(false, |b| b.as_str() == "H")
                // An error on the play at the plate negates the out.
                || (out_at_home && !segment_errors.is_empty());
            if safe_at_home {
                runs += 1;
                match captures.name("from").map(|m| m.as_str()) {
                    Some("B") => batter_advanced = true,
                    Some("3") => runner_from_third_advanced = true,
                    _ => {}
                }
            }
        }
        // Implicit runs the advance section does not restate.
        if result == PlayResult::HomeRun && !batter_advanced {
            runs += 1;
        }
        if result == PlayResult::StolenBaseHome && !runner_from_third_advanced {
            runs += 1;
        }

        let mut points = Matchup::default();
        *points.get_mut(record.side) += runs;

        Ok(Self {
            result,
            fielders_involved: fielders_involved.into_iter().unique().collect(),
            error_positions: error_positions.into_iter().unique().collect(),
            points,
        })
    }
}

/// Classifies the primary main-play token and extracts the fielders it
/// names directly.
fn classify_main(primary: &str, has_error: bool) -> (PlayResult, PositionVec) {
    let code: String = primary
        .chars()
        .take_while(char::is_ascii_uppercase)
        .collect();
    if code.is_empty() {
        // A bare digit sequence is a fielded out; parenthesized digits
        // name the runner retired, not a fielder.
        let result = if has_error {
            PlayResult::ReachedOnError
        } else {
            PlayResult::Out
        };
        let defielded = PAREN_GROUP_REGEX.replace_all(primary, "");
        let digits: Vec<u8> = error_free_digits(&defielded);
        return (result, positions(&digits));
    }
    let result = PlayResult::from_str(&code).unwrap_or(PlayResult::Other);
    let fielders = if result.takes_fielders_from_parens() {
        PAREN_CONTENTS_REGEX
            .captures_iter(primary)
            .flat_map(|c| error_free_digits(c.get(1).map_or("", |m| m.as_str())))
            .collect::<Vec<u8>>()
    } else {
        error_free_digits(primary)
    };
    (result, positions(&fielders))
}

/// Digits charged with an error via E-notation.
fn error_digits(s: &str) -> Vec<u8> {
    ERROR_POSITION_REGEX
        .captures_iter(s)
        .flat_map(|c| digit_vec(c.name("pos").map_or("", |m| m.as_str())))
        .collect()
}

/// Digits in the string excluding those attached to an E marker.
fn error_free_digits(s: &str) -> Vec<u8> {
    let stripped = ERROR_POSITION_REGEX.replace_all(s, "");
    digit_vec(&stripped)
}

fn positions(digits: &[u8]) -> PositionVec {
    digits
        .iter()
        .map(|d| FieldingPosition::try_from(*d).unwrap_or(FieldingPosition::Unknown))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_file::traits::FieldingPosition as F;

    fn play(side: Side, description: &str) -> PlayRecord {
        PlayRecord {
            inning: 1,
            side,
            batter: String::from("batts001"),
            raw_play: String::from(description),
        }
    }

    fn outcome(description: &str) -> PlayOutcome {
        PlayOutcome::try_from(&play(Side::Away, description)).unwrap()
    }

    #[test]
    fn single_to_center() {
        let o = outcome("S8/G");
        assert_eq!(o.result, PlayResult::Single);
        assert_eq!(o.fielders_involved, vec![F::CenterFielder]);
        assert!(o.error_positions.is_empty());
        assert_eq!(o.points, Matchup::default());
    }

    #[test]
    fn ground_out_double_play() {
        let o = outcome("64(1)3/GDP");
        assert_eq!(o.result, PlayResult::Out);
        assert_eq!(
            o.fielders_involved,
            vec![F::Shortstop, F::SecondBaseman, F::FirstBaseman]
        );
    }

    #[test]
    fn reached_on_error() {
        let o = outcome("E6/TH");
        assert_eq!(o.result, PlayResult::ReachedOnError);
        assert!(o.fielders_involved.is_empty());
        assert_eq!(o.error_positions, vec![F::Shortstop]);

        let o = outcome("6E3");
        assert_eq!(o.result, PlayResult::ReachedOnError);
        assert_eq!(o.fielders_involved, vec![F::Shortstop]);
        assert_eq!(o.error_positions, vec![F::FirstBaseman]);
    }

    #[test]
    fn home_run_scores_batter_implicitly() {
        let o = PlayOutcome::try_from(&play(Side::Home, "HR/F78")).unwrap();
        assert_eq!(o.result, PlayResult::HomeRun);
        assert_eq!(o.points, Matchup::new(0, 1));

        // A deduced account may restate the batter's advance; no double count.
        let o = PlayOutcome::try_from(&play(Side::Home, "HR.B-H;3-H")).unwrap();
        assert_eq!(o.points, Matchup::new(0, 2));
    }

    #[test]
    fn advances_to_home_score() {
        let o = PlayOutcome::try_from(&play(Side::Away, "S8.3-H;1-3")).unwrap();
        assert_eq!(o.points, Matchup::new(1, 0));
    }

    #[test]
    fn out_at_the_plate_does_not_score() {
        let o = outcome("S8.3XH(82)");
        assert_eq!(o.points, Matchup::default());
        assert!(o.fielders_involved.contains(&F::CenterFielder));
        assert!(o.fielders_involved.contains(&F::Catcher));
    }

    #[test]
    fn error_at_the_plate_negates_the_out() {
        let o = outcome("S8.3XH(8E2)");
        assert_eq!(o.points, Matchup::new(1, 0));
        assert_eq!(o.error_positions, vec![F::Catcher]);
    }

    #[test]
    fn caught_stealing_fielders_exclude_target_base() {
        let o = outcome("CS2(26)");
        assert_eq!(o.result, PlayResult::CaughtStealing);
        assert_eq!(o.fielders_involved, vec![F::Catcher, F::Shortstop]);
        assert!(o.result.is_baserunning_only());
    }

    #[test]
    fn steal_of_home_scores() {
        let o = PlayOutcome::try_from(&play(Side::Home, "SBH")).unwrap();
        assert_eq!(o.result, PlayResult::StolenBaseHome);
        assert_eq!(o.points, Matchup::new(0, 1));
    }

    #[test]
    fn no_play_is_empty() {
        let o = outcome("NP");
        assert_eq!(o.result, PlayResult::NoPlay);
        assert!(o.fielders_involved.is_empty());
        assert_eq!(o.points, Matchup::default());
    }

    #[test]
    fn strikeout_with_secondary_play() {
        let o = outcome("K+SB2");
        assert_eq!(o.result, PlayResult::StrikeOut);
        assert!(o.result.is_out());
    }

    #[test]
    fn unknown_code_is_tolerated() {
        let o = outcome("ZZTOP");
        assert_eq!(o.result, PlayResult::Other);
    }
}
