//! Cumulative scores and leaderboard rendering
//!
//! This module keeps the durable score ledger that outlives individual
//! rounds. Persistence is delegated to a [`ScoreStore`]; the [`Ledger`] wraps
//! a store with best-effort semantics so that storage failures never
//! interrupt a round.

use std::{
    collections::HashSet,
    path::PathBuf,
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{TruncatedVec, UpdateMessage, constants};

/// A participant's accumulated score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserScore {
    /// Participant name, unique within the ledger
    pub name: String,
    /// Number of rounds this participant has won
    pub score: u64,
}

impl UserScore {
    /// Creates a ledger entry
    pub fn new(name: impl Into<String>, score: u64) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// Errors that can occur when reading or writing scores
#[derive(Error, Debug)]
pub enum Error {
    /// The score file could not be read or written
    #[error("score storage failed: {0}")]
    Io(#[from] std::io::Error),
    /// The score file contents are not a valid score list
    #[error("score file is malformed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Durable storage for the score ledger
pub trait ScoreStore {
    /// Loads every entry in insertion order
    ///
    /// # Errors
    ///
    /// Returns an error if the entries could not be read.
    fn load(&self) -> Result<Vec<UserScore>, Error>;

    /// Replaces the stored entries
    ///
    /// # Errors
    ///
    /// Returns an error if the entries could not be written.
    fn save(&self, scores: &[UserScore]) -> Result<(), Error>;
}

/// Score store persisted as a JSON array on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store reading and writing `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ScoreStore for JsonFileStore {
    fn load(&self) -> Result<Vec<UserScore>, Error> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, scores: &[UserScore]) -> Result<(), Error> {
        let encoded = serde_json::to_string(scores)?;
        std::fs::write(&self.path, encoded)?;
        Ok(())
    }
}

/// Applies round results to a score store and renders the standings
///
/// Every operation reloads the store so that edits made to the backing file
/// between rounds are picked up.
#[derive(Debug)]
pub struct Ledger<S> {
    store: S,
}

impl<S: ScoreStore> Ledger<S> {
    /// Wraps a score store
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Current entries, or an empty ledger if they cannot be loaded
    pub fn scores(&self) -> Vec<UserScore> {
        self.store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Could not load scores, treating ledger as empty");
            Vec::new()
        })
    }

    /// Adds one point to each named participant
    ///
    /// Names not yet in the ledger are appended with a score of one, in the
    /// order given. Duplicate names count once. A failed save is logged and
    /// the update is lost.
    pub fn increment<T: AsRef<str>>(&mut self, names: &[T]) {
        let mut scores = self.scores();
        let mut pending: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();

        for entry in &mut scores {
            if pending.remove(entry.name.as_str()) {
                entry.score += 1;
            }
        }

        scores.extend(
            names
                .iter()
                .map(AsRef::as_ref)
                .filter(|name| pending.remove(name))
                .map(|name| UserScore::new(name, 1)),
        );

        match self.store.save(&scores) {
            Ok(()) => debug!(winners = names.len(), "Saved scores"),
            Err(e) => warn!(error = %e, "Could not save scores"),
        }
    }

    /// Entries sorted by descending score, ties kept in insertion order
    pub fn standings(&self) -> Vec<UserScore> {
        self.scores()
            .into_iter()
            .sorted_by_key(|entry| std::cmp::Reverse(entry.score))
            .collect_vec()
    }

    /// Renders the standings as the status leaderboard markup
    pub fn render(&self) -> String {
        let standings = self.standings();
        let count = standings.len();
        UpdateMessage::Scores(TruncatedVec::new(
            standings.into_iter(),
            constants::leaderboard::RENDER_LIMIT,
            count,
        ))
        .to_message()
    }
}
