use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;
use strum_macros::EnumString;
use thiserror::Error;

use crate::util::digit_vec;

pub type RetrosheetEventRecord = StringRecord;

pub type Inning = u8;

pub type Player = String;
pub type Batter = Player;
pub type Pitcher = Player;
pub type Fielder = Player;

pub trait FromRetrosheetRecord {
    fn new(record: &RetrosheetEventRecord) -> Result<Self>
    where
        Self: Sized;

    fn error(msg: &str, record: &RetrosheetEventRecord) -> anyhow::Error {
        anyhow!("{}\nRecord: {:?}", msg, record)
    }
}

/// Errors that must be distinguishable by the caller, as opposed to
/// data-quality problems that are logged and skipped.
#[derive(Debug, Error)]
pub enum EventFileError {
    /// The id record carries no recognizable date. Aborts the game:
    /// every downstream sample would be keyed to a corrupt season.
    #[error("no plausible date in game id {id:?} (expected a 19xx/20xx year)")]
    ImplausibleGameDate { id: String },
    /// The caller asked for a sample before any id record was ingested.
    #[error("game has not been populated from an id record and cannot be sampled")]
    GameNotPopulated,
}

#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Copy, Clone, Hash, Serialize)]
#[repr(u8)]
pub enum LineupPosition {
    PitcherWithDH = 0,
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Sixth,
    Seventh,
    Eighth,
    Ninth,
}

impl TryFrom<&str> for LineupPosition {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::try_from(value.trim_end().parse::<u8>()?)
            .context("Unable to convert to lineup position")
    }
}

#[derive(
    Debug, Eq, PartialEq, Ord, PartialOrd, TryFromPrimitive, IntoPrimitive, Copy, Clone, Hash, Serialize,
)]
#[repr(u8)]
pub enum FieldingPosition {
    Unknown = 0,
    Pitcher,
    Catcher,
    FirstBaseman,
    SecondBaseman,
    ThirdBaseman,
    Shortstop,
    LeftFielder,
    CenterFielder,
    RightFielder,
    DesignatedHitter,
    PinchHitter,
    PinchRunner,
}

impl FieldingPosition {
    /// Turns a digit sequence like "643" into the positions it names,
    /// mapping out-of-range digits to Unknown.
    pub fn fielding_vec(int_str: &str) -> Vec<Self> {
        digit_vec(int_str)
            .iter()
            .map(|d| Self::try_from(*d).unwrap_or(Self::Unknown))
            .collect()
    }
}

impl TryFrom<&str> for FieldingPosition {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::try_from(value.trim_end().parse::<u8>()?)
            .context("Unable to convert to fielding position")
    }
}

#[derive(Debug, Eq, PartialEq, EnumString, Hash, Copy, Clone, Serialize)]
pub enum Side {
    #[strum(serialize = "0")]
    Away,
    #[strum(serialize = "1")]
    Home,
}

impl Side {
    pub const BOTH: [Self; 2] = [Self::Away, Self::Home];

    pub const fn flip(self) -> Self {
        match self {
            Self::Away => Self::Home,
            Self::Home => Self::Away,
        }
    }
}

/// A home/away pair of anything.
#[derive(Debug, Default, Eq, PartialEq, Clone, Serialize)]
pub struct Matchup<T> {
    pub away: T,
    pub home: T,
}

impl<T> Matchup<T> {
    pub const fn new(away: T, home: T) -> Self {
        Self { away, home }
    }

    pub const fn get(&self, side: Side) -> &T {
        match side {
            Side::Away => &self.away,
            Side::Home => &self.home,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Away => &mut self.away,
            Side::Home => &mut self.home,
        }
    }
}

impl Matchup<u8> {
    pub fn tally(&mut self, other: &Self) {
        self.away += other.away;
        self.home += other.home;
    }
}
