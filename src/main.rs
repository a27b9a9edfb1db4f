#![allow(dead_code)]
#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::cargo)]
#![warn(
    clippy::nursery,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::module_name_repetitions)]

use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use csv::{Writer, WriterBuilder};
use glob::GlobError;
use rayon::prelude::*;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

use event_file::game_state::{Game, RosterStyle};
use event_file::parser::EventStream;
use event_file::roster::{LastGameRosters, RosterStore};
use event_file::schemas::{GameRow, PlayerCumulativeRow, SampleRow};
use event_file::stats::{NumericEncoding, StatsTracker};

mod event_file;
mod util;

const ABOUT: &str = "Builds model training samples and career statistics from raw Retrosheet files.";

struct ThreadSafeCsvWriter {
    csv: Mutex<Writer<File>>,
}

impl ThreadSafeCsvWriter {
    fn new(output_dir: &Path, file_name: &str, has_headers: bool) -> Result<Self> {
        let output_path = output_dir.join(file_name);
        debug!("Creating file {}", output_path.display());
        let csv = WriterBuilder::new()
            .has_headers(has_headers)
            .from_path(&output_path)
            .with_context(|| format!("Failed to create file {}", output_path.display()))?;
        Ok(Self {
            csv: Mutex::new(csv),
        })
    }

    fn csv(&self) -> Result<MutexGuard<Writer<File>>> {
        self.csv
            .lock()
            .map_err(|e| anyhow!("Failed to acquire writer lock: {}", e))
    }
}

struct WriterMap {
    /// Headerless: the feature block width depends on configuration.
    samples: ThreadSafeCsvWriter,
    games: ThreadSafeCsvWriter,
}

impl WriterMap {
    fn new(output_dir: &Path) -> Result<Self> {
        Ok(Self {
            samples: ThreadSafeCsvWriter::new(output_dir, "samples.csv", false)?,
            games: ThreadSafeCsvWriter::new(output_dir, "games.csv", true)?,
        })
    }

    fn flush_all(&self) -> Result<()> {
        self.samples
            .csv()?
            .flush()
            .map_err(|e| anyhow!("Failed to flush writer: {}", e))?;
        self.games
            .csv()?
            .flush()
            .map_err(|e| anyhow!("Failed to flush writer: {}", e))
    }
}

#[derive(Parser, Debug)]
#[command(name = "pbp-to-sample", about = ABOUT)]
struct Opt {
    /// Directory containing Retrosheet event (*.EV*) and roster (*.ROS) files
    #[arg(short, long)]
    input: PathBuf,

    #[arg(short, long)]
    output_dir: PathBuf,

    /// Which players are snapshotted into each game's training sample
    #[arg(short, long, default_value = "participants", value_parser = parse_roster_style)]
    roster_style: RosterStyle,

    /// Encode rate statistics as scaled integers instead of floats
    #[arg(long)]
    integer_features: bool,
}

fn parse_roster_style(value: &str) -> Result<RosterStyle, String> {
    RosterStyle::from_str(value).map_err(|e| e.to_string())
}

struct FileProcessor {
    opt: Opt,
    writers: WriterMap,
    rosters: RosterStore,
}

impl FileProcessor {
    fn new(opt: Opt) -> Result<Self> {
        std::fs::create_dir_all(&opt.output_dir).context("Error occurred on output dir check")?;
        let writers = WriterMap::new(&opt.output_dir)?;
        let rosters = RosterStore::load_dir(&opt.input)?;
        Ok(Self {
            opt,
            writers,
            rosters,
        })
    }

    const fn encoding(&self) -> NumericEncoding {
        if self.opt.integer_features {
            NumericEncoding::Integers
        } else {
            NumericEncoding::Floats
        }
    }

    /// Replays every game in one event file against a segment-local
    /// tracker. Games within a file are chronological, so the
    /// previous-game roster map is maintained here, between games.
    fn process_file(&self, path: &Path) -> Result<StatsTracker> {
        debug!("Processing file {}", path.display());
        let mut stream = match EventStream::from_path(path) {
            Ok(stream) => stream,
            Err(e) => {
                error!("Skipping unreadable event file {}: {:#}", path.display(), e);
                return Ok(StatsTracker::new());
            }
        };
        let mut tracker = StatsTracker::new();
        let mut last_game_rosters = LastGameRosters::new();
        while !stream.is_exhausted() {
            let mut game = Game::new(self.encoding());
            match game.consume_next_game(
                &mut stream,
                &mut tracker,
                self.opt.roster_style,
                &self.rosters,
                &last_game_rosters,
            ) {
                Ok(score) => {
                    debug!(
                        "Final score {}-{} in {}",
                        score.away,
                        score.home,
                        path.display()
                    );
                    self.write_game(&game)?;
                    for (team, players) in game.participants() {
                        last_game_rosters.insert(team, players.into_iter().collect());
                    }
                }
                Err(e) => {
                    // A bad game must not take the batch down with it.
                    error!("Abandoning game in {}: {:#}", path.display(), e);
                    stream.skip_to_boundary();
                }
            }
        }
        Ok(tracker)
    }

    fn write_game(&self, game: &Game) -> Result<()> {
        let starters_only = self.opt.roster_style == RosterStyle::Starters;
        self.writers.games.csv()?.serialize(GameRow::from_game(game)?)?;
        let mut samples = self.writers.samples.csv()?;
        for row in SampleRow::from_game(game, starters_only)? {
            samples.serialize(row)?;
        }
        Ok(())
    }

    /// Fans out across event files, one exclusively-owned tracker per
    /// file, then folds the segment trackers once all mutation is done.
    fn process_files(&self) -> Result<StatsTracker> {
        let pattern = self.opt.input.join("*.EV*");
        let pattern = pattern
            .to_str()
            .context("Non-UTF8 input path")?;
        let mut files = glob::glob(pattern)
            .context("Bad event file pattern")?
            .collect::<Result<Vec<PathBuf>, GlobError>>()?;
        files.par_sort();
        info!("Found {} event files", files.len());

        let trackers = files
            .into_par_iter()
            .map(|f| self.process_file(&f))
            .collect::<Result<Vec<StatsTracker>>>()?;

        let mut career = StatsTracker::new();
        for tracker in trackers {
            career.merge(tracker);
        }
        Ok(career)
    }

    fn write_career_stats(&self, career: &StatsTracker) -> Result<()> {
        let output_path = self.opt.output_dir.join("players.csv");
        let mut writer = WriterBuilder::new()
            .from_path(&output_path)
            .with_context(|| format!("Failed to create file {}", output_path.display()))?;
        for row in PlayerCumulativeRow::from_tracker(career) {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn run(&self) -> Result<()> {
        let career = self.process_files()?;
        info!("Tracked {} players", career.len());
        self.write_career_stats(&career)?;
        self.writers.flush_all()
    }
}

#[allow(clippy::expect_used)]
fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to initialize trace");

    let start = Instant::now();
    let opt: Opt = Opt::parse();

    FileProcessor::new(opt)
        .and_then(|processor| processor.run())
        .expect("Error occurred while processing files");

    let end = start.elapsed();
    info!("Elapsed: {:?}", end);
}
