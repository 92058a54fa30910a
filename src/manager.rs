//! Round lifecycle management
//!
//! The [`RoundManager`] owns the phase of the trivia session, the state of
//! the round in play and the handles of its pending alarms. It reacts to chat
//! messages and alarms and tells the caller when a new question is needed;
//! fetching that question is left to the caller so this module never blocks.
//!
//! Every method must be called from a single serialized context (see
//! [`crate::runtime`]). Under that guarantee a round is resolved exactly
//! once: the phase moves to [`Phase::Resolving`] before winners are
//! computed, and alarms carrying an old round number are discarded.

use tracing::{debug, error, info, warn};

use super::{
    AlarmMessage, UpdateMessage,
    alarm::{AlarmHandle, Scheduler},
    config::Settings,
    constants::commands,
    leaderboard::{Ledger, ScoreStore},
    question::{self, Question},
    round::RoundState,
    session::{self, Gateway, Participant},
};

/// Represents the current phase of the round lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// No question is in play
    #[default]
    Idle,
    /// A question was handed out and responses are being collected
    AwaitingResponses,
    /// Winners are being computed; no response can change them anymore
    Resolving,
}

/// What the caller should do after the manager handled an input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Nothing further to do
    Stay,
    /// Fetch a question and pass it to [`RoundManager::begin_round`]
    BeginRound,
}

/// Orchestrates trivia rounds for one channel
#[derive(Debug)]
pub struct RoundManager<H> {
    settings: Settings,
    phase: Phase,
    /// Whether a session is running, from `!start` until `!stop` or a failed fetch
    running: bool,
    round: Option<RoundState>,
    rounds_played: u64,
    deadline: Option<H>,
    next_round: Option<H>,
    rng: fastrand::Rng,
}

impl<H: AlarmHandle> RoundManager<H> {
    /// Creates an idle manager
    ///
    /// # Arguments
    ///
    /// * `settings` - Admin name and timing
    /// * `rng` - Random source for answer shuffling
    pub fn new(settings: Settings, rng: fastrand::Rng) -> Self {
        Self {
            settings,
            phase: Phase::Idle,
            running: false,
            round: None,
            rounds_played: 0,
            deadline: None,
            next_round: None,
            rng,
        }
    }

    /// The current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether a trivia session is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The round in play, if any
    pub fn round(&self) -> Option<&RoundState> {
        self.round.as_ref()
    }

    /// Number of rounds started so far
    pub fn rounds_played(&self) -> u64 {
        self.rounds_played
    }

    /// Attempts to transition from one phase to another
    ///
    /// # Returns
    ///
    /// `true` if the transition happened, `false` if the current phase didn't match
    fn change_phase(&mut self, before: Phase, after: Phase) -> bool {
        if self.phase == before {
            self.phase = after;
            true
        } else {
            false
        }
    }

    /// Publishes the leaderboard once the chat connection is up
    pub fn connected<G: Gateway, St: ScoreStore>(&self, gateway: &G, ledger: &Ledger<St>) {
        publish_scores(gateway, ledger);
    }

    /// Handles a text message from the channel
    ///
    /// Admin commands control the session; every other message is treated as
    /// a possible response to the current question.
    ///
    /// # Arguments
    ///
    /// * `sender` - Who sent the message
    /// * `text` - Raw message text
    /// * `registered` - Whether the sender is registered with the chat server
    /// * `gateway` - Chat transport for announcements
    /// * `ledger` - Score ledger, updated if the message resolves the round
    /// * `scheduler` - Used to schedule the next round after a resolution
    ///
    /// # Returns
    ///
    /// [`Transition::BeginRound`] if a session was just started
    pub fn receive_message<G: Gateway, St: ScoreStore, S: Scheduler<Handle = H>>(
        &mut self,
        sender: &Participant,
        text: &str,
        registered: bool,
        gateway: &G,
        ledger: &mut Ledger<St>,
        scheduler: &mut S,
    ) -> Transition {
        let text = session::plain_text(text);

        if sender.name() == self.settings.admin {
            match text.as_str() {
                commands::START => return self.start(gateway),
                commands::STOP => {
                    self.stop(gateway);
                    return Transition::Stay;
                }
                _ => (),
            }
        }

        if !registered {
            debug!(participant = %sender, "Ignoring message from unregistered user");
            return Transition::Stay;
        }

        if let Some(index) = parse_answer(&text) {
            self.receive_response(sender, index, gateway, ledger, scheduler);
        }

        Transition::Stay
    }

    /// Handles a scheduled alarm
    ///
    /// # Returns
    ///
    /// [`Transition::BeginRound`] when the pause after a round is over and the
    /// session is still running
    pub fn receive_alarm<G: Gateway, St: ScoreStore, S: Scheduler<Handle = H>>(
        &mut self,
        alarm: AlarmMessage,
        gateway: &G,
        ledger: &mut Ledger<St>,
        scheduler: &mut S,
    ) -> Transition {
        match alarm {
            AlarmMessage::Deadline { round } => {
                if self.current_round() == Some(round) && self.phase == Phase::AwaitingResponses {
                    // The timer fired on its own, there is nothing left to cancel
                    self.deadline = None;
                    info!(round, "Answer time is up");
                    self.resolve(gateway, ledger, scheduler);
                } else {
                    debug!(round, "Ignoring stale deadline");
                }
                Transition::Stay
            }
            AlarmMessage::NextRound { after } => {
                if self.running
                    && self.phase == Phase::Idle
                    && self.rounds_played == after
                    && self.next_round.take().is_some()
                {
                    Transition::BeginRound
                } else {
                    debug!(after, "Ignoring stale next round alarm");
                    Transition::Stay
                }
            }
        }
    }

    /// Deals `question` to everyone in the channel and arms the deadline
    ///
    /// Does nothing unless the session is running and no round is in play.
    pub fn begin_round<G: Gateway, S: Scheduler<Handle = H>>(
        &mut self,
        question: Question,
        gateway: &G,
        scheduler: &mut S,
    ) {
        if !self.running || self.next_round.is_some() {
            return;
        }
        if !self.change_phase(Phase::Idle, Phase::AwaitingResponses) {
            return;
        }

        self.rounds_played += 1;
        let number = self.rounds_played;
        let round = RoundState::deal(number, question, gateway.participants(), &mut self.rng);

        for (participant, entry) in round.participants() {
            let message = UpdateMessage::Question {
                category: round.question().category.clone(),
                question: round.question().question.clone(),
                answers: entry.answers().to_vec(),
            };
            if let Err(e) = gateway.send_to(participant, &message.to_message()) {
                warn!(round = number, %participant, error = %e, "Could not deliver question");
            }
        }

        info!(
            round = number,
            participants = round.participant_count(),
            category = %round.question().category,
            "Question asked"
        );

        self.round = Some(round);
        self.deadline = Some(scheduler.schedule(
            AlarmMessage::Deadline { round: number },
            self.settings.answer_time,
        ));
    }

    /// Ends the session after a question could not be fetched
    ///
    /// No round is created; the admin may `!start` again.
    pub fn abort_start<G: Gateway>(&mut self, error: &question::Error, gateway: &G) {
        if self.phase != Phase::Idle || !self.running {
            return;
        }
        error!(error = %error, "Could not fetch a question, stopping trivia");
        self.running = false;
        if let Some(alarm) = self.next_round.take() {
            alarm.cancel();
        }
        announce(gateway, &UpdateMessage::Unavailable);
    }

    /// Starts a session if none is running
    fn start<G: Gateway>(&mut self, gateway: &G) -> Transition {
        if self.running || self.phase != Phase::Idle {
            debug!("Ignoring start, trivia is already running");
            return Transition::Stay;
        }
        info!("Trivia starting");
        self.running = true;
        announce(gateway, &UpdateMessage::Starting);
        Transition::BeginRound
    }

    /// Stops the session, discarding the round in play without resolving it
    fn stop<G: Gateway>(&mut self, gateway: &G) {
        if !self.running {
            debug!("Ignoring stop, trivia is not running");
            return;
        }
        if let Some(alarm) = self.deadline.take() {
            alarm.cancel();
        }
        if let Some(alarm) = self.next_round.take() {
            alarm.cancel();
        }
        if let Some(round) = self.round.take() {
            info!(round = round.number(), "Discarding unresolved round");
        }
        self.running = false;
        self.phase = Phase::Idle;
        info!("Trivia stopping");
        announce(gateway, &UpdateMessage::Stopping);
    }

    /// Records a response and resolves early once the quorum is reached
    fn receive_response<G: Gateway, St: ScoreStore, S: Scheduler<Handle = H>>(
        &mut self,
        sender: &Participant,
        index: usize,
        gateway: &G,
        ledger: &mut Ledger<St>,
        scheduler: &mut S,
    ) {
        if self.phase != Phase::AwaitingResponses {
            return;
        }
        let Some(round) = self.round.as_mut() else {
            return;
        };

        match round.record_response(sender, index) {
            Ok(()) => {
                debug!(round = round.number(), participant = %sender, "Response recorded");
                if round.quorum_reached() {
                    if let Some(alarm) = self.deadline.take() {
                        alarm.cancel();
                    }
                    info!(round = round.number(), "Enough responses, resolving early");
                    self.resolve(gateway, ledger, scheduler);
                }
            }
            Err(reason) => {
                debug!(round = round.number(), participant = %sender, ?reason, "Response ignored");
            }
        }
    }

    /// Computes winners, updates the ledger, announces the results and
    /// schedules the next round
    fn resolve<G: Gateway, St: ScoreStore, S: Scheduler<Handle = H>>(
        &mut self,
        gateway: &G,
        ledger: &mut Ledger<St>,
        scheduler: &mut S,
    ) {
        if !self.change_phase(Phase::AwaitingResponses, Phase::Resolving) {
            return;
        }
        let Some(round) = self.round.take() else {
            self.phase = Phase::Idle;
            return;
        };

        let winners = round.winners();
        info!(
            round = round.number(),
            responses = round.response_count(),
            winners = ?winners,
            elapsed_secs = round.started_at().elapsed().map_or(0.0, |d| d.as_secs_f64()),
            "Round resolved"
        );

        if !winners.is_empty() {
            ledger.increment(&winners);
            publish_scores(gateway, ledger);
        }

        announce(
            gateway,
            &UpdateMessage::Results {
                correct_answer: round.question().correct_answer.clone(),
                winners,
            },
        );

        self.phase = Phase::Idle;
        if self.running {
            self.next_round = Some(scheduler.schedule(
                AlarmMessage::NextRound { after: round.number() },
                self.settings.next_round_delay,
            ));
        }
    }

    /// Number of the round in play, if any
    fn current_round(&self) -> Option<u64> {
        self.round.as_ref().map(RoundState::number)
    }
}

/// Maps a 1-based option number to a zero-based index
///
/// Only plain decimal tokens count: no sign, no leading zeros.
fn parse_answer(text: &str) -> Option<usize> {
    if text.starts_with('0') || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<usize>().ok()?.checked_sub(1)
}

/// Sends a message to the channel, logging delivery failures
fn announce<G: Gateway>(gateway: &G, message: &UpdateMessage) {
    if let Err(e) = gateway.send_to_channel(&message.to_message()) {
        warn!(error = %e, "Could not send channel message");
    }
}

/// Publishes the rendered leaderboard as the bot status
fn publish_scores<G: Gateway, St: ScoreStore>(gateway: &G, ledger: &Ledger<St>) {
    if let Err(e) = gateway.set_status(&ledger.render()) {
        warn!(error = %e, "Could not publish leaderboard");
    }
}
