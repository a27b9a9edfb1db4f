use std::convert::TryFrom;

use anyhow::Result;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::event_file::traits::{
    EventFileError, FieldingPosition, FromRetrosheetRecord, LineupPosition, Player,
    RetrosheetEventRecord, Side,
};

pub type Comment = String;

lazy_static! {
    // The date inside a game id: the first digit run opening with a
    // plausible century. Team prefixes are usually three letters but can
    // themselves contain digits, so the run is located, not sliced.
    static ref DATE_DIGITS_REGEX: Regex = Regex::new(r"(?:19|20)\d{4,}").unwrap();
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct GameId {
    pub id: String,
}

impl FromRetrosheetRecord for GameId {
    fn new(record: &RetrosheetEventRecord) -> Result<GameId> {
        let record = record.deserialize::<[&str; 2]>(None)?;
        Ok(GameId {
            id: String::from(record[1].trim_end()),
        })
    }
}

impl GameId {
    /// Derives the date portion of the id (TEAM + yyyymmdd + game number
    /// by convention). An id with no recognizable year is unusable: the
    /// season keys every roster lookup and sample row downstream.
    pub fn game_date(&self) -> Result<GameDate, EventFileError> {
        let digits = DATE_DIGITS_REGEX
            .find(&self.id)
            .ok_or_else(|| EventFileError::ImplausibleGameDate {
                id: self.id.clone(),
            })?
            .as_str();
        let season = digits[..4]
            .parse::<u16>()
            .map_err(|_| EventFileError::ImplausibleGameDate {
                id: self.id.clone(),
            })?;
        let date = if digits.len() >= 8 {
            NaiveDate::parse_from_str(&digits[..8], "%Y%m%d").ok()
        } else {
            None
        };
        Ok(GameDate { season, date })
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct GameDate {
    /// Four-digit season, e.g. 1983.
    pub season: u16,
    /// Full calendar date when the id carries a complete yyyymmdd run.
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct AppearanceRecord {
    pub player: Player,
    pub side: Side,
    pub lineup_position: LineupPosition,
    pub fielding_position: FieldingPosition,
}

/// Start/sub lines carry six fields, except for a handful of 1969-era
/// records that drop the player-name column. The arity is classified up
/// front so the state machine switches on a variant, not a field count.
#[derive(Debug, Clone)]
pub enum AppearanceFields {
    Standard(AppearanceRecord),
    /// Five-field layout: type, player, side, batting order, position.
    MissingName(AppearanceRecord),
    /// Unusable arity or unparseable fields; carries the raw line for logging.
    Invalid(String),
}

impl AppearanceFields {
    pub fn from_record(record: &RetrosheetEventRecord) -> Self {
        let fields: Vec<&str> = record
            .iter()
            .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\''))
            .filter(|f| !f.is_empty())
            .collect();
        let parsed = match fields.len() {
            6 => Self::parse(&fields, 3, 4, 5).map(Self::Standard),
            5 => Self::parse(&fields, 2, 3, 4).map(Self::MissingName),
            _ => None,
        };
        parsed.unwrap_or_else(|| Self::Invalid(format!("{record:?}")))
    }

    fn parse(fields: &[&str], side: usize, lineup: usize, position: usize) -> Option<AppearanceRecord> {
        use std::str::FromStr;
        Some(AppearanceRecord {
            player: String::from(fields[1]),
            side: Side::from_str(fields[side]).ok()?,
            lineup_position: LineupPosition::try_from(fields[lineup]).ok()?,
            fielding_position: FieldingPosition::try_from(fields[position]).ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> RetrosheetEventRecord {
        RetrosheetEventRecord::from(fields.to_vec())
    }

    #[test]
    fn game_date_from_conventional_id() {
        let id = GameId {
            id: String::from("ATL198304080"),
        };
        let date = id.game_date().unwrap();
        assert_eq!(date.season, 1983);
        assert_eq!(date.date, NaiveDate::from_ymd_opt(1983, 4, 8));
    }

    #[test]
    fn game_date_with_digit_bearing_prefix() {
        let id = GameId {
            id: String::from("TEST01198304"),
        };
        let date = id.game_date().unwrap();
        assert_eq!(date.season, 1983);
        assert_eq!(date.date, None);
    }

    #[test]
    fn implausible_year_is_fatal() {
        let id = GameId {
            id: String::from("ATL098304080"),
        };
        assert!(matches!(
            id.game_date(),
            Err(EventFileError::ImplausibleGameDate { .. })
        ));
    }

    #[test]
    fn standard_appearance() {
        let fields =
            AppearanceFields::from_record(&record(&["start", "richp101", "Pete Rich", "1", "3", "9"]));
        match fields {
            AppearanceFields::Standard(r) => {
                assert_eq!(r.player, "richp101");
                assert_eq!(r.side, Side::Home);
                assert_eq!(r.lineup_position, LineupPosition::Third);
                assert_eq!(r.fielding_position, FieldingPosition::RightFielder);
            }
            other => panic!("expected standard appearance, got {other:?}"),
        }
    }

    #[test]
    fn malformed_five_field_appearance() {
        // The 1969 anomaly: name column missing entirely.
        let fields = AppearanceFields::from_record(&record(&["sub", "smithj01", "0", "5", "7"]));
        match fields {
            AppearanceFields::MissingName(r) => {
                assert_eq!(r.player, "smithj01");
                assert_eq!(r.side, Side::Away);
                assert_eq!(r.fielding_position, FieldingPosition::LeftFielder);
            }
            other => panic!("expected missing-name appearance, got {other:?}"),
        }
    }

    #[test]
    fn bad_arity_is_invalid() {
        assert!(matches!(
            AppearanceFields::from_record(&record(&["start", "smithj01"])),
            AppearanceFields::Invalid(_)
        ));
        // Correct arity, junk position field.
        assert!(matches!(
            AppearanceFields::from_record(&record(&["start", "smithj01", "Joe Smith", "1", "3", "x"])),
            AppearanceFields::Invalid(_)
        ));
    }
}
