//! Start-up configuration
//!
//! The bot is configured once from the command line. [`Config`] holds the raw
//! options and validates them; [`Settings`] is the subset the round engine
//! needs and is immutable for the life of the process.

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants;

type ValidationResult = garde::Result;

/// Validates that a duration falls within specified bounds
fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    field: &'static str,
    val: &Duration,
) -> ValidationResult {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{field} is outside of the bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

fn validate_answer_time(val: &Duration) -> ValidationResult {
    validate_duration::<
        { constants::round::MIN_ANSWER_TIME },
        { constants::round::MAX_ANSWER_TIME },
    >("answer_time", val)
}

fn validate_next_round_delay(val: &Duration) -> ValidationResult {
    validate_duration::<0, { constants::round::MAX_NEXT_ROUND_DELAY }>("next_round_delay", val)
}

/// Parses a whole number of seconds from the command line
fn parse_seconds(value: &str) -> Result<Duration, std::num::ParseIntError> {
    value.parse().map(Duration::from_secs)
}

/// Errors raised by configuration validation
#[derive(Error, Debug)]
pub enum Error {
    /// One or more options are out of bounds
    #[error("invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
}

/// Where trivia questions come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Source {
    /// The Open Trivia DB HTTP API
    OpenTrivia,
    /// A local JSON question bank
    File,
}

/// Command line options of the trivia bot
#[derive(Debug, Clone, Parser, Validate)]
#[command(name = "quizbot", version, about = "Live multiple choice trivia for a chat channel")]
pub struct Config {
    /// Scores storage file
    #[arg(long, default_value = "scores.json")]
    #[garde(skip)]
    pub scores: PathBuf,

    /// Question source
    #[arg(long, value_enum, default_value_t = Source::OpenTrivia)]
    #[garde(skip)]
    pub source: Source,

    /// Open Trivia DB endpoint used by the `open-trivia` source
    #[arg(long, default_value = constants::questions::OPEN_TRIVIA_URL)]
    #[garde(skip)]
    pub trivia_url: String,

    /// Question bank used by the `file` source (JSON list, or an Open Trivia DB response)
    #[arg(long, default_value = "questions.json")]
    #[garde(skip)]
    pub questions: PathBuf,

    /// User who can start and stop the bot
    #[arg(long, default_value = "")]
    #[garde(skip)]
    pub admin: String,

    /// Seconds users have to answer the question
    #[arg(long, value_parser = parse_seconds, default_value = "20")]
    #[garde(custom(|v, _| validate_answer_time(v)))]
    pub answer_time: Duration,

    /// Seconds to wait after a round before asking the next question
    #[arg(long, value_parser = parse_seconds, default_value = "3")]
    #[garde(custom(|v, _| validate_next_round_delay(v)))]
    pub next_round_delay: Duration,

    /// Number of questions fetched per batch
    #[arg(long, default_value_t = constants::questions::DEFAULT_BATCH_SIZE)]
    #[garde(range(min = constants::questions::MIN_BATCH_SIZE, max = constants::questions::MAX_BATCH_SIZE))]
    pub batch_size: usize,
}

impl Config {
    /// Validates the options and extracts the round engine settings
    ///
    /// # Errors
    ///
    /// Returns an error if any option is out of bounds.
    pub fn settings(&self) -> Result<Settings, Error> {
        self.validate()?;
        Ok(Settings {
            admin: self.admin.clone(),
            answer_time: self.answer_time,
            next_round_delay: self.next_round_delay,
        })
    }
}

/// Round engine settings, fixed at start-up
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Name of the user allowed to issue `!start` and `!stop`
    pub admin: String,
    /// How long participants have to answer
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub answer_time: Duration,
    /// Pause between a resolved round and the next question
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub next_round_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            admin: String::new(),
            answer_time: Duration::from_secs(constants::round::DEFAULT_ANSWER_TIME),
            next_round_delay: Duration::from_secs(constants::round::DEFAULT_NEXT_ROUND_DELAY),
        }
    }
}
