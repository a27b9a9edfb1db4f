use std::convert::TryFrom;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use strum_macros::EnumDiscriminants;

use crate::event_file::info::InfoRecord;
use crate::event_file::misc::{AppearanceFields, Comment, GameId};
use crate::event_file::play::PlayRecord;
use crate::event_file::traits::{FromRetrosheetRecord, RetrosheetEventRecord};

/// One typed event line. Unknown kinds are preserved rather than
/// rejected so the state machine can log and step over them.
#[derive(Debug, EnumDiscriminants)]
#[strum_discriminants(name(MappedRecordKind))]
pub enum MappedRecord {
    GameId(GameId),
    Version,
    Info(InfoRecord),
    Start(AppearanceFields),
    Substitution(AppearanceFields),
    Play(PlayRecord),
    Comment(Comment),
    Unrecognized,
}

impl FromRetrosheetRecord for MappedRecord {
    fn new(record: &RetrosheetEventRecord) -> Result<MappedRecord> {
        let line_type = record.get(0).context("No record")?;
        let mapped = match line_type {
            "id" => MappedRecord::GameId(GameId::new(record)?),
            "version" => MappedRecord::Version,
            "info" => MappedRecord::Info(InfoRecord::try_from(record)?),
            "start" => MappedRecord::Start(AppearanceFields::from_record(record)),
            "sub" => MappedRecord::Substitution(AppearanceFields::from_record(record)),
            "play" => MappedRecord::Play(PlayRecord::new(record)?),
            "com" => MappedRecord::Comment(String::from(record.get(1).unwrap_or_default())),
            _ => MappedRecord::Unrecognized,
        };
        Ok(mapped)
    }
}

/// An explicit cursor over one file's event records. The state machine
/// peeks at the upcoming record to find its game boundary without
/// consuming it, so consecutive games share one stream.
#[derive(Debug)]
pub struct EventStream {
    records: Vec<RetrosheetEventRecord>,
    cursor: usize,
}

impl EventStream {
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(BufReader::new(File::open(path).with_context(|| {
                format!("Failed to open event file {}", path.display())
            })?));
        let records = reader
            .records()
            .collect::<csv::Result<Vec<RetrosheetEventRecord>>>()
            .with_context(|| format!("Failed to read event file {}", path.display()))?;
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<RetrosheetEventRecord>) -> Self {
        Self { records, cursor: 0 }
    }

    pub fn peek(&self) -> Option<&RetrosheetEventRecord> {
        self.records.get(self.cursor)
    }

    pub fn next_record(&mut self) -> Option<&RetrosheetEventRecord> {
        let index = self.cursor;
        if index < self.records.len() {
            self.cursor += 1;
        }
        self.records.get(index)
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.records.len()
    }

    /// True when the record opens a new game.
    pub fn is_boundary(record: &RetrosheetEventRecord) -> bool {
        record.get(0) == Some("id")
    }

    /// Advances to (but not past) the next game boundary, so an
    /// abandoned game cannot poison the one that follows.
    pub fn skip_to_boundary(&mut self) {
        while let Some(record) = self.peek() {
            if Self::is_boundary(record) {
                break;
            }
            self.cursor += 1;
        }
    }
}
