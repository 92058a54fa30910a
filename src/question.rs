//! Trivia questions and where they come from
//!
//! This module defines the question type handed to each round, the
//! [`QuestionSource`] trait for fetching batches of questions, sources backed
//! by the Open Trivia DB API and by a local file, and the local buffer that serves one question per round and
//! refills itself from the source when it runs dry.

use std::{collections::VecDeque, path::Path, time::Duration};

use async_trait::async_trait;
use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::constants;

/// A multiple choice trivia question
///
/// Field names follow the Open Trivia DB format so exported question banks
/// can be loaded directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Category shown above the prompt
    pub category: String,
    /// The question prompt
    pub question: String,
    /// The single correct answer
    pub correct_answer: String,
    /// The incorrect answers, in source order
    #[serde(default)]
    pub incorrect_answers: Vec<String>,
}

impl Question {
    /// Total number of answer options offered for this question
    pub fn option_count(&self) -> usize {
        self.incorrect_answers.len() + 1
    }
}

/// Errors that can occur when fetching questions
#[derive(Error, Debug)]
pub enum Error {
    /// The question bank could not be read
    #[error("failed to read question bank: {0}")]
    Io(#[from] std::io::Error),
    /// The question bank is not valid JSON in a supported shape
    #[error("failed to parse question bank: {0}")]
    Parse(#[from] serde_json::Error),
    /// The question service could not be reached or answered with an HTTP error
    #[error("question service request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The question service answered with a non-zero response code
    #[error("question service returned response code {0}")]
    Api(u8),
    /// The source returned no questions
    #[error("question source returned no questions")]
    Exhausted,
}

/// A provider of question batches
#[async_trait]
pub trait QuestionSource: Send {
    /// Fetches up to `count` questions
    ///
    /// # Errors
    ///
    /// Returns an error if no batch could be produced.
    async fn fetch(&mut self, count: usize) -> Result<Vec<Question>, Error>;
}

/// Accepted shapes of a question bank file
#[derive(Deserialize)]
#[serde(untagged)]
enum Bank {
    /// An Open Trivia DB API response
    Response {
        #[serde(default)]
        response_code: u8,
        results: Vec<Question>,
    },
    /// A bare list of questions
    List(Vec<Question>),
}

/// Question source backed by the Open Trivia DB HTTP API
///
/// Every fetch asks the service for a fresh batch of multiple choice
/// questions.
#[derive(Debug, Clone)]
pub struct OpenTriviaSource {
    client: reqwest::Client,
    url: String,
}

impl OpenTriviaSource {
    /// Creates a source querying `url`, which must accept the Open Trivia DB
    /// `amount` and `type` parameters
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(constants::questions::REQUEST_TIMEOUT))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

/// Extracts the questions from an Open Trivia DB response body
fn decode_response(body: &str) -> Result<Vec<Question>, Error> {
    match serde_json::from_str(body)? {
        Bank::Response {
            response_code: 0,
            results,
        }
        | Bank::List(results) => Ok(results),
        Bank::Response { response_code, .. } => Err(Error::Api(response_code)),
    }
}

#[async_trait]
impl QuestionSource for OpenTriviaSource {
    async fn fetch(&mut self, count: usize) -> Result<Vec<Question>, Error> {
        let body = self
            .client
            .get(&self.url)
            .query(&[("amount", count.to_string().as_str()), ("type", "multiple")])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let batch = decode_response(&body)?;
        if batch.is_empty() {
            return Err(Error::Exhausted);
        }
        debug!(fetched = batch.len(), "Fetched questions from Open Trivia DB");
        Ok(batch)
    }
}

/// Question source backed by a JSON question bank loaded at start-up
///
/// Each fetch draws a random sample of the bank, so consecutive batches may
/// repeat questions the way a remote trivia API does.
#[derive(Debug)]
pub struct JsonFileSource {
    bank: Vec<Question>,
    rng: fastrand::Rng,
}

impl JsonFileSource {
    /// Loads a question bank from a JSON file
    ///
    /// The file may either be a list of questions or an object with a
    /// `results` list.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let source = Self::from_json(&contents)?;
        info!(path = %path.display(), questions = source.bank.len(), "Loaded question bank");
        Ok(source)
    }

    /// Parses a question bank from a JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a supported question bank.
    pub fn from_json(contents: &str) -> Result<Self, Error> {
        let bank = match serde_json::from_str(contents)? {
            Bank::Response { results, .. } => results,
            Bank::List(list) => list,
        };
        Ok(Self::with_rng(bank, fastrand::Rng::new()))
    }

    /// Creates a source from an in-memory bank and a random generator
    pub fn with_rng(bank: Vec<Question>, rng: fastrand::Rng) -> Self {
        Self { bank, rng }
    }
}

#[async_trait]
impl QuestionSource for JsonFileSource {
    async fn fetch(&mut self, count: usize) -> Result<Vec<Question>, Error> {
        let mut batch = self.rng.choose_multiple(self.bank.iter().cloned(), count);
        if batch.is_empty() {
            return Err(Error::Exhausted);
        }
        self.rng.shuffle(&mut batch);
        Ok(batch)
    }
}

/// Local buffer of fetched questions
///
/// Questions are served in the order the source returned them. The buffer
/// only calls the source when it is empty.
#[derive_where(Debug)]
pub struct QuestionBuffer<S> {
    #[derive_where(skip)]
    source: S,
    batch_size: usize,
    pending: VecDeque<Question>,
}

impl<S: QuestionSource> QuestionBuffer<S> {
    /// Creates an empty buffer that refills `batch_size` questions at a time
    pub fn new(source: S, batch_size: usize) -> Self {
        Self {
            source,
            batch_size,
            pending: VecDeque::new(),
        }
    }

    /// Number of questions buffered locally
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the next call to [`QuestionBuffer::next`] will hit the source
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pops the next question, refilling from the source first if needed
    ///
    /// # Errors
    ///
    /// Returns the source's error, or [`Error::Exhausted`] if it returned an
    /// empty batch. The buffer is left empty in both cases.
    pub async fn next(&mut self) -> Result<Question, Error> {
        if self.pending.is_empty() {
            let batch = self.source.fetch(self.batch_size).await?;
            debug!(fetched = batch.len(), "Refilled question buffer");
            self.pending.extend(batch);
        }
        self.pending.pop_front().ok_or(Error::Exhausted)
    }
}
