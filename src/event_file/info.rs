use std::convert::TryFrom;

use anyhow::Result;
use chrono::NaiveDate;

use crate::event_file::traits::RetrosheetEventRecord;

pub type Team = String;

/// The subset of Retrosheet info fields this pipeline consumes. The
/// format defines dozens more (park, umpires, weather); they carry no
/// signal for sample building and map to `Unrecognized`.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum InfoRecord {
    VisitingTeam(Team),
    HomeTeam(Team),
    GameDate(NaiveDate),
    Unrecognized,
}

impl TryFrom<&RetrosheetEventRecord> for InfoRecord {
    type Error = anyhow::Error;

    fn try_from(record: &RetrosheetEventRecord) -> Result<InfoRecord> {
        let record = record.deserialize::<[&str; 3]>(None)?;

        let info_type = record[1];
        let value = record[2].trim_end();

        type I = InfoRecord;
        let info = match info_type {
            "visteam" => I::VisitingTeam(String::from(value)),
            "hometeam" => I::HomeTeam(String::from(value)),
            "date" => I::GameDate(NaiveDate::parse_from_str(value, "%Y/%m/%d")?),
            _ => I::Unrecognized,
        };
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_file::traits::RetrosheetEventRecord;

    fn record(fields: &[&str]) -> RetrosheetEventRecord {
        RetrosheetEventRecord::from(fields.to_vec())
    }

    #[test]
    fn team_declarations() {
        assert_eq!(
            InfoRecord::try_from(&record(&["info", "visteam", "CHN"])).unwrap(),
            InfoRecord::VisitingTeam(String::from("CHN"))
        );
        assert_eq!(
            InfoRecord::try_from(&record(&["info", "hometeam", "SLN"])).unwrap(),
            InfoRecord::HomeTeam(String::from("SLN"))
        );
    }

    #[test]
    fn unknown_keys_pass_through() {
        assert_eq!(
            InfoRecord::try_from(&record(&["info", "sky", "cloudy"])).unwrap(),
            InfoRecord::Unrecognized
        );
    }
}
