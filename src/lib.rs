//! # Quizbot
//!
//! This library runs live multiple choice trivia rounds inside a chat
//! channel. Every participant receives the question with their own random
//! answer order, responses are collected until a deadline or until all but
//! one participant have answered, winners are awarded a point in a durable
//! ledger, and the next question follows after a short pause.
//!
//! The round engine lives in [`manager`]; [`runtime`] drives it from a single
//! tokio task so chat events and timer alarms never race.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::wildcard_imports)]
use std::fmt::Write as _;

use derive_where::derive_where;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub mod alarm;
pub mod config;
pub mod console;
pub mod constants;
pub mod leaderboard;
pub mod manager;
pub mod question;
pub mod round;
pub mod runtime;
pub mod session;
pub mod shuffle;

/// Messages sent to the channel, to participants, or as the bot status
///
/// Each variant renders to the small HTML-like markup understood by the chat
/// server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateMessage {
    /// A trivia session is starting
    Starting,
    /// A trivia session was stopped by the admin
    Stopping,
    /// A trivia session ended because no question could be fetched
    Unavailable,
    /// The question as one participant sees it
    Question {
        /// Category shown above the prompt
        category: String,
        /// The question prompt
        question: String,
        /// Answer options in this participant's order
        answers: Vec<String>,
    },
    /// The outcome of a round
    Results {
        /// Text of the correct answer
        correct_answer: String,
        /// Names of everyone who answered correctly
        winners: Vec<String>,
    },
    /// The leaderboard, best first
    Scores(TruncatedVec<leaderboard::UserScore>),
}

impl UpdateMessage {
    /// Renders the message as chat markup
    pub fn to_message(&self) -> String {
        match self {
            Self::Starting => "<h3>Trivia Starting! Good luck!</h3>".to_owned(),
            Self::Stopping => "<h3>Trivia Stopping. Thanks for playing!</h3>".to_owned(),
            Self::Unavailable => {
                "<h3>Could not fetch any questions. Trivia stopped.</h3>".to_owned()
            }
            Self::Question {
                category,
                question,
                answers,
            } => format!(
                "<h3><u>{category}</u>: {question}</h3> {}",
                answers
                    .iter()
                    .enumerate()
                    .map(|(i, answer)| format!("{}: {answer}", i + 1))
                    .join("<br/>")
            ),
            Self::Results {
                correct_answer,
                winners,
            } => {
                let mut message = format!(
                    r#"<h3><span style="color:blue">Time's up!</span> Correct answer was: {correct_answer}</h3>"#
                );
                if winners.is_empty() {
                    message.push_str("No one got it right!");
                } else {
                    message.push_str("Congrats to: ");
                    message.push_str(&winners.join(", "));
                }
                message
            }
            Self::Scores(scores) => {
                let mut message = String::from("<h2>Scores:</h2><ol>");
                for entry in scores.items() {
                    let _ = write!(message, "<li>{}: {}</li>", entry.name, entry.score);
                }
                message.push_str("</ol>");
                let hidden = scores.exact_count().saturating_sub(scores.items().len());
                if hidden > 0 {
                    let others = pluralizer::pluralize("other", hidden as isize, true);
                    let _ = write!(message, "and {others}");
                }
                message
            }
        }
    }
}

/// Alarm messages for timed events in a trivia session
///
/// Alarms are scheduled through an [`alarm::Scheduler`] and delivered back to
/// the [`manager::RoundManager`] through the same queue as chat events. Each
/// alarm names the round it belongs to so that a late alarm for an earlier
/// round is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// The answer time of a round has run out
    Deadline {
        /// Round the deadline belongs to
        round: u64,
    },
    /// The pause after a resolved round is over
    NextRound {
        /// Round that was just resolved
        after: u64,
    },
}

/// A truncated vector that maintains the exact count while limiting displayed items
///
/// Used for the leaderboard, which only renders the top entries while still
/// reporting how many entries exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[derive_where(Default)]
pub struct TruncatedVec<T> {
    /// The exact total count of items
    exact_count: usize,
    /// The truncated list of items (up to the limit)
    items: Vec<T>,
}

impl<T: Clone> TruncatedVec<T> {
    /// Creates a new truncated vector from an iterator
    ///
    /// # Arguments
    ///
    /// * `list` - An iterator over items to include
    /// * `limit` - Maximum number of items to include in the truncated vector
    /// * `exact_count` - The exact total count of items (may be larger than limit)
    pub fn new<I: Iterator<Item = T>>(list: I, limit: usize, exact_count: usize) -> Self {
        let items = list.take(limit).collect_vec();
        Self { exact_count, items }
    }

    /// Returns the exact count of items
    pub fn exact_count(&self) -> usize {
        self.exact_count
    }

    /// Returns the truncated items
    pub fn items(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use leaderboard::UserScore;

    #[test]
    fn test_truncated_vec_new() {
        let data = vec![1, 2, 3, 4, 5];
        let truncated = TruncatedVec::new(data.into_iter(), 3, 5);

        assert_eq!(truncated.exact_count(), 5);
        assert_eq!(truncated.items(), &[1, 2, 3]);
    }

    #[test]
    fn test_truncated_vec_new_limit_larger_than_items() {
        let data = vec![1, 2, 3];
        let truncated = TruncatedVec::new(data.into_iter(), 5, 3);

        assert_eq!(truncated.exact_count(), 3);
        assert_eq!(truncated.items(), &[1, 2, 3]);
    }

    #[test]
    fn test_question_message() {
        let message = UpdateMessage::Question {
            category: "Science".to_string(),
            question: "What is H2O?".to_string(),
            answers: vec!["Air".to_string(), "Water".to_string(), "Fire".to_string()],
        };

        assert_eq!(
            message.to_message(),
            "<h3><u>Science</u>: What is H2O?</h3> 1: Air<br/>2: Water<br/>3: Fire"
        );
    }

    #[test]
    fn test_results_message_with_winners() {
        let message = UpdateMessage::Results {
            correct_answer: "Water".to_string(),
            winners: vec!["alice".to_string(), "bob".to_string()],
        };

        assert_eq!(
            message.to_message(),
            r#"<h3><span style="color:blue">Time's up!</span> Correct answer was: Water</h3>Congrats to: alice, bob"#
        );
    }

    #[test]
    fn test_results_message_without_winners() {
        let message = UpdateMessage::Results {
            correct_answer: "Water".to_string(),
            winners: Vec::new(),
        };

        assert!(message.to_message().ends_with("No one got it right!"));
    }

    #[test]
    fn test_scores_message_truncated() {
        let scores = (0..4).map(|i| UserScore::new(format!("p{i}"), 10 - i));
        let message = UpdateMessage::Scores(TruncatedVec::new(scores, 2, 4));

        assert_eq!(
            message.to_message(),
            "<h2>Scores:</h2><ol><li>p0: 10</li><li>p1: 9</li></ol>and 2 others"
        );
    }

    #[test]
    fn test_scores_message_with_undercounted_total() {
        let scores = (0..3).map(|i| UserScore::new(format!("p{i}"), 3 - i));
        let message = UpdateMessage::Scores(TruncatedVec::new(scores, 3, 1));

        assert_eq!(
            message.to_message(),
            "<h2>Scores:</h2><ol><li>p0: 3</li><li>p1: 2</li><li>p2: 1</li></ol>"
        );
    }

    #[test]
    fn test_session_messages() {
        assert!(UpdateMessage::Starting.to_message().contains("Trivia Starting"));
        assert!(UpdateMessage::Stopping.to_message().contains("Thanks for playing"));
        assert!(UpdateMessage::Unavailable.to_message().contains("Could not fetch"));
    }

    #[test]
    fn test_alarm_message_serialization() {
        let alarm = AlarmMessage::Deadline { round: 3 };
        let json = serde_json::to_string(&alarm).unwrap();
        assert_eq!(json, r#"{"Deadline":{"round":3}}"#);
        assert_eq!(serde_json::from_str::<AlarmMessage>(&json).unwrap(), alarm);
    }
}
