//! Line based chat transport over standard input and output
//!
//! Stands in for a real chat server when running the bot locally. Each
//! input line is either a roster command or a message:
//!
//! ```text
//! /join alice        alice enters the channel
//! /leave alice       alice leaves the channel
//! alice: 2           alice says "2"
//! ~guest: 2          an unregistered user says "2"
//! ```
//!
//! Output is written one line per message with the markup flattened.

use std::{
    collections::BTreeSet,
    fmt,
    io::Write,
    sync::{Arc, LazyLock, Mutex, PoisonError},
};

use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use super::{
    runtime::TriviaHandle,
    session::{self, Event, Gateway, Participant, plain_text},
};

static BLOCK_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(h[1-6]|li|ol)>").expect("block end pattern is valid"));

/// Flattens chat markup for a terminal, keeping headings and list items on separate lines
fn render(message: &str) -> String {
    plain_text(&BLOCK_END.replace_all(message, "<br/>")).replace('\n', " | ")
}

/// Gateway printing every outgoing message to a writer
#[derive(Clone)]
pub struct ConsoleGateway {
    roster: Arc<Mutex<BTreeSet<Participant>>>,
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl fmt::Debug for ConsoleGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleGateway")
            .field("roster", &self.roster)
            .finish_non_exhaustive()
    }
}

impl ConsoleGateway {
    /// Creates a gateway printing to standard output
    pub fn stdout() -> Self {
        Self::with_writer(std::io::stdout())
    }

    /// Creates a gateway printing to `out`
    pub fn with_writer(out: impl Write + Send + 'static) -> Self {
        Self {
            roster: Arc::default(),
            out: Arc::new(Mutex::new(Box::new(out))),
        }
    }

    /// Adds a participant to the channel
    pub fn join(&self, participant: Participant) {
        self.roster
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(participant);
    }

    /// Removes a participant from the channel
    pub fn leave(&self, participant: &Participant) {
        self.roster
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(participant);
    }

    fn print(&self, prefix: fmt::Arguments<'_>, message: &str) -> Result<(), session::Error> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "[{prefix}] {}", render(message))?;
        out.flush()?;
        Ok(())
    }
}

impl Gateway for ConsoleGateway {
    fn send_to(&self, participant: &Participant, message: &str) -> Result<(), session::Error> {
        if !self
            .roster
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(participant)
        {
            return Err(session::Error::NotConnected(participant.clone()));
        }
        self.print(format_args!("to {participant}"), message)
    }

    fn send_to_channel(&self, message: &str) -> Result<(), session::Error> {
        self.print(format_args!("channel"), message)
    }

    fn set_status(&self, status: &str) -> Result<(), session::Error> {
        self.print(format_args!("status"), status)
    }

    fn participants(&self) -> Vec<Participant> {
        self.roster
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// A parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Join(Participant),
    Leave(Participant),
    Say {
        sender: Participant,
        text: String,
        registered: bool,
    },
}

fn parse_line(line: &str) -> Option<Line> {
    let line = line.trim();
    if let Some(name) = line.strip_prefix("/join ") {
        return Some(Line::Join(Participant::from(name.trim())));
    }
    if let Some(name) = line.strip_prefix("/leave ") {
        return Some(Line::Leave(Participant::from(name.trim())));
    }

    let (name, text) = line.split_once(':')?;
    let (name, registered) = match name.trim().strip_prefix('~') {
        Some(guest) => (guest, false),
        None => (name.trim(), true),
    };
    if name.is_empty() {
        return None;
    }
    Some(Line::Say {
        sender: Participant::from(name),
        text: text.trim().to_owned(),
        registered,
    })
}

/// Reads lines from `input` and feeds them to the bot until end of input
///
/// Roster commands update `gateway` directly; messages are queued on
/// `handle`. [`Event::Shutdown`] is sent when the input ends.
///
/// # Errors
///
/// Returns an error if reading fails or the bot has stopped.
pub async fn read_events<R: AsyncBufRead + Unpin>(
    input: R,
    gateway: &ConsoleGateway,
    handle: &TriviaHandle,
) -> Result<(), session::Error> {
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Some(Line::Join(participant)) => {
                debug!(%participant, "Joined");
                gateway.join(participant);
            }
            Some(Line::Leave(participant)) => {
                debug!(%participant, "Left");
                gateway.leave(&participant);
            }
            Some(Line::Say {
                sender,
                text,
                registered,
            }) => handle.send(Event::TextMessage {
                sender,
                text,
                registered,
            })?,
            None if line.trim().is_empty() => (),
            None => warn!(%line, "Unrecognized input, expected `name: message`"),
        }
    }
    handle.send(Event::Shutdown)
}
