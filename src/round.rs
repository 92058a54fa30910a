//! State of a single trivia round
//!
//! A [`RoundState`] is built when a question is handed out and discarded when
//! the round resolves or the session stops. It tracks, for every participant
//! who received the question, their shuffled answers, where the correct
//! answer sits for them, and the first response they submitted.

use std::collections::BTreeMap;

use itertools::Itertools;
use web_time::SystemTime;

use super::{question::Question, session::Participant, shuffle};

/// One participant's view of the current question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRound {
    answers: Vec<String>,
    correct_index: usize,
    response: Option<usize>,
}

impl ParticipantRound {
    /// Creates a round entry from already shuffled answers
    pub(crate) fn new(answers: Vec<String>, correct_index: usize) -> Self {
        Self {
            answers,
            correct_index,
            response: None,
        }
    }

    /// The answers in the order this participant sees them
    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    /// Position of the correct answer in [`ParticipantRound::answers`]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    /// The zero-based option this participant chose, if any
    pub fn response(&self) -> Option<usize> {
        self.response
    }

    /// Whether the recorded response is the correct answer
    pub fn had_correct_answer(&self) -> bool {
        self.response == Some(self.correct_index)
    }

    /// Records a response unless one exists or the index is out of range
    fn respond(&mut self, index: usize) -> bool {
        if self.response.is_some() || index >= self.answers.len() {
            return false;
        }
        self.response = Some(index);
        true
    }
}

/// Why a response was not recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The sender did not receive this round's question
    NotParticipating,
    /// The sender already answered this round
    AlreadyAnswered,
    /// The chosen option does not exist for the sender's question
    OutOfRange,
}

/// The question in play and every participant's progress on it
#[derive(Debug, Clone)]
pub struct RoundState {
    number: u64,
    question: Question,
    participants: BTreeMap<Participant, ParticipantRound>,
    started_at: SystemTime,
}

impl RoundState {
    /// Deals `question` to every participant with an independent shuffle
    ///
    /// # Arguments
    ///
    /// * `number` - Sequence number of this round, used to match alarms
    /// * `question` - The question being asked
    /// * `participants` - Everyone present in the channel when the round starts
    /// * `rng` - Random source used for the per-participant shuffles
    pub fn deal<I: IntoIterator<Item = Participant>>(
        number: u64,
        question: Question,
        participants: I,
        rng: &mut fastrand::Rng,
    ) -> Self {
        let participants = participants
            .into_iter()
            .map(|participant| {
                let round = shuffle::deal(&question, rng);
                (participant, round)
            })
            .collect();

        Self {
            number,
            question,
            participants,
            started_at: SystemTime::now(),
        }
    }

    /// Sequence number of this round
    pub fn number(&self) -> u64 {
        self.number
    }

    /// The question in play
    pub fn question(&self) -> &Question {
        &self.question
    }

    /// When the question was dealt
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Iterates the participants and their round entries in name order
    pub fn participants(&self) -> impl Iterator<Item = (&Participant, &ParticipantRound)> {
        self.participants.iter()
    }

    /// Looks up a participant's round entry
    pub fn participant(&self, participant: &Participant) -> Option<&ParticipantRound> {
        self.participants.get(participant)
    }

    /// Number of participants who received the question
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Records a participant's first response
    ///
    /// # Errors
    ///
    /// Returns the reason the response was ignored. None of these are faults;
    /// callers are expected to drop them silently.
    pub fn record_response(
        &mut self,
        participant: &Participant,
        index: usize,
    ) -> Result<(), Rejection> {
        let round = self
            .participants
            .get_mut(participant)
            .ok_or(Rejection::NotParticipating)?;

        if round.response.is_some() {
            Err(Rejection::AlreadyAnswered)
        } else if round.respond(index) {
            Ok(())
        } else {
            Err(Rejection::OutOfRange)
        }
    }

    /// Number of participants who have responded
    pub fn response_count(&self) -> usize {
        self.participants
            .values()
            .filter(|round| round.response.is_some())
            .count()
    }

    /// Number of responses that ends the round early
    ///
    /// All but one participant must have answered, and always at least one,
    /// so a lone participant ends the round by answering.
    pub fn quorum(&self) -> usize {
        self.participants.len().saturating_sub(1).max(1)
    }

    /// Whether enough participants have answered to resolve early
    pub fn quorum_reached(&self) -> bool {
        !self.participants.is_empty() && self.response_count() >= self.quorum()
    }

    /// Names of everyone who picked the correct answer, in name order
    pub fn winners(&self) -> Vec<String> {
        self.participants
            .iter()
            .filter(|(_, round)| round.had_correct_answer())
            .map(|(participant, _)| participant.name().to_owned())
            .collect_vec()
    }
}
