//! Chat session plumbing
//!
//! This module defines the trait the round engine uses to talk to the chat
//! channel, the participant identity type, and the inbound events a chat
//! transport delivers to the engine. The gateway abstraction keeps the
//! engine independent of the actual chat protocol.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Identity of a channel member, compared by exact name
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display, derive_more::From,
)]
pub struct Participant(String);

impl Participant {
    /// Creates a participant identity from a chat user name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the chat user name of this participant
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Participant {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Errors reported by a chat transport when delivering a message
#[derive(Error, Debug)]
pub enum Error {
    /// The connection to the chat server is gone
    #[error("chat connection closed")]
    Closed,
    /// The recipient is no longer present in the channel
    #[error("participant {0} is not connected")]
    NotConnected(Participant),
    /// Writing to the underlying transport failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Outbound side of a chat transport
///
/// Implementations deliver formatted text to individual participants or the
/// whole channel. Messages use a small HTML-like markup which transports
/// without rich text support may strip with [`plain_text`].
pub trait Gateway {
    /// Sends a private message to a single participant
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be delivered.
    fn send_to(&self, participant: &Participant, message: &str) -> Result<(), Error>;

    /// Sends a message to the whole channel
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be delivered.
    fn send_to_channel(&self, message: &str) -> Result<(), Error>;

    /// Publishes a status text on the bot's own profile (used for the leaderboard)
    ///
    /// # Errors
    ///
    /// Returns an error if the status could not be updated.
    fn set_status(&self, status: &str) -> Result<(), Error>;

    /// Lists the participants currently present in the channel, excluding the bot itself
    fn participants(&self) -> Vec<Participant>;
}

/// Events delivered by a chat transport to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The connection to the chat server was established
    Connected,
    /// A text message was received from a channel member
    TextMessage {
        /// Who sent the message
        sender: Participant,
        /// Raw message text, possibly containing markup
        text: String,
        /// Whether the sender is registered with the chat server
        registered: bool,
    },
    /// The transport is shutting down and no more events will follow
    Shutdown,
}

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("line break pattern is valid"));
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Converts a marked-up chat message into plain text
///
/// Line breaks become newlines, every other tag is removed, and the result
/// is trimmed.
pub fn plain_text(message: &str) -> String {
    let with_newlines = LINE_BREAK.replace_all(message, "\n");
    TAG.replace_all(&with_newlines, "").trim().to_owned()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_strips_markup() {
        assert_eq!(plain_text("<p>2</p>"), "2");
        assert_eq!(plain_text("  <b>  3 </b> "), "3");
        assert_eq!(plain_text("plain"), "plain");
    }

    #[test]
    fn test_plain_text_line_breaks() {
        assert_eq!(plain_text("1: a<br/>2: b<BR />3: c"), "1: a\n2: b\n3: c");
    }

    #[test]
    fn test_participant_name_and_display() {
        let participant = Participant::from("alice");
        assert_eq!(participant.name(), "alice");
        assert_eq!(participant.to_string(), "alice");
        assert_eq!(participant, Participant::new(String::from("alice")));
    }

    #[test]
    fn test_error_display() {
        let error = Error::NotConnected(Participant::from("bob"));
        assert_eq!(error.to_string(), "participant bob is not connected");
    }
}
