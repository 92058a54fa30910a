//! Serialized driver for the round engine
//!
//! All chat events and alarms for a channel flow through one mailbox and are
//! handled, one at a time, by a single task that owns the
//! [`RoundManager`]. Question fetches are awaited inside that task, so inputs
//! that arrive during a fetch simply wait in the mailbox.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use super::{
    AlarmMessage,
    alarm::{TokioAlarm, TokioScheduler},
    config::Settings,
    leaderboard::{Ledger, ScoreStore},
    manager::{RoundManager, Transition},
    question::{QuestionBuffer, QuestionSource},
    session::{self, Event, Gateway},
};

/// Everything the runtime task reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// An event from the chat transport
    Event(Event),
    /// A previously scheduled alarm went off
    Alarm(AlarmMessage),
}

/// Sending half of the runtime mailbox, handed to the chat transport
#[derive(Debug, Clone)]
pub struct TriviaHandle {
    sender: UnboundedSender<Input>,
}

impl TriviaHandle {
    /// Queues a chat event for the runtime
    ///
    /// # Errors
    ///
    /// Returns [`session::Error::Closed`] if the runtime has stopped.
    pub fn send(&self, event: Event) -> Result<(), session::Error> {
        self.sender
            .send(Input::Event(event))
            .map_err(|_| session::Error::Closed)
    }
}

/// A trivia bot for one channel
pub struct Trivia<G, Q, St> {
    manager: RoundManager<TokioAlarm>,
    gateway: G,
    questions: QuestionBuffer<Q>,
    ledger: Ledger<St>,
    scheduler: TokioScheduler,
    mailbox: UnboundedReceiver<Input>,
}

impl<G: Gateway, Q: QuestionSource, St: ScoreStore> Trivia<G, Q, St> {
    /// Wires a trivia bot together
    ///
    /// # Arguments
    ///
    /// * `settings` - Admin name and timing
    /// * `gateway` - Outbound side of the chat transport
    /// * `source` - Where questions come from
    /// * `store` - Where scores are kept
    /// * `batch_size` - How many questions to fetch at a time
    ///
    /// # Returns
    ///
    /// The bot, to be driven with [`Trivia::run`], and the handle used to feed
    /// it chat events
    pub fn new(
        settings: Settings,
        gateway: G,
        source: Q,
        store: St,
        batch_size: usize,
    ) -> (Self, TriviaHandle) {
        let (sender, mailbox) = mpsc::unbounded_channel();
        let trivia = Self {
            manager: RoundManager::new(settings, fastrand::Rng::new()),
            gateway,
            questions: QuestionBuffer::new(source, batch_size),
            ledger: Ledger::new(store),
            scheduler: TokioScheduler::new(sender.clone()),
            mailbox,
        };
        (trivia, TriviaHandle { sender })
    }

    /// Processes inputs until [`Event::Shutdown`] is received
    ///
    /// The scheduler keeps its own sender, so dropping every
    /// [`TriviaHandle`] does not end the loop.
    pub async fn run(mut self) {
        info!("Trivia bot running");
        while let Some(input) = self.mailbox.recv().await {
            let transition = match input {
                Input::Event(Event::Connected) => {
                    self.manager.connected(&self.gateway, &self.ledger);
                    Transition::Stay
                }
                Input::Event(Event::TextMessage {
                    sender,
                    text,
                    registered,
                }) => self.manager.receive_message(
                    &sender,
                    &text,
                    registered,
                    &self.gateway,
                    &mut self.ledger,
                    &mut self.scheduler,
                ),
                Input::Event(Event::Shutdown) => break,
                Input::Alarm(alarm) => self.manager.receive_alarm(
                    alarm,
                    &self.gateway,
                    &mut self.ledger,
                    &mut self.scheduler,
                ),
            };

            if transition == Transition::BeginRound {
                self.begin_round().await;
            }
        }
        info!(rounds = self.manager.rounds_played(), "Trivia bot stopped");
    }

    async fn begin_round(&mut self) {
        debug!(buffered = self.questions.len(), "Fetching next question");
        match self.questions.next().await {
            Ok(question) => {
                self.manager
                    .begin_round(question, &self.gateway, &mut self.scheduler);
            }
            Err(e) => self.manager.abort_start(&e, &self.gateway),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        UpdateMessage,
        leaderboard::tests::MemoryStore,
        manager::tests::MockGateway,
        question::tests::{MockSource, sample_question},
        session::Participant,
    };
    use std::time::Duration;
    use tokio::{task::JoinHandle, time::sleep};

    const ADMIN: &str = "admin";

    struct Bot {
        handle: TriviaHandle,
        gateway: MockGateway,
        store: MemoryStore,
        task: JoinHandle<()>,
    }

    impl Bot {
        fn spawn(names: &[&str], source: MockSource) -> Self {
            let gateway = MockGateway::with_participants(names);
            let store = MemoryStore::default();
            let settings = Settings {
                admin: ADMIN.to_string(),
                ..Settings::default()
            };
            let (trivia, handle) =
                Trivia::new(settings, gateway.clone(), source, store.clone(), 50);
            Self {
                handle,
                gateway,
                store,
                task: tokio::spawn(trivia.run()),
            }
        }

        fn say(&self, name: &str, text: &str) {
            self.handle
                .send(Event::TextMessage {
                    sender: Participant::from(name),
                    text: text.to_string(),
                    registered: true,
                })
                .unwrap();
        }

        /// 1-based option holding the correct answer in the latest question `name` received
        fn correct_token(&self, name: &str) -> String {
            let question = self.gateway.private_messages(name).pop().unwrap();
            let (_, options) = question.split_once("</h3> ").unwrap();
            let position = options
                .split("<br/>")
                .position(|option| option.ends_with(": Right"))
                .unwrap();
            (position + 1).to_string()
        }

        fn results(&self) -> Vec<String> {
            self.gateway
                .channel_messages()
                .into_iter()
                .filter(|message| message.contains("Correct answer was"))
                .collect()
        }
    }

    fn questions(count: usize) -> MockSource {
        MockSource::with_batches(vec![Ok((0..count)
            .map(|i| sample_question(&format!("Question {i}")))
            .collect())])
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_next_question() {
        let bot = Bot::spawn(&["alice", "bob"], questions(5));

        bot.say(ADMIN, "!start");
        sleep(Duration::from_secs(1)).await;

        assert_eq!(
            bot.gateway.channel_messages(),
            vec![UpdateMessage::Starting.to_message()]
        );
        assert_eq!(bot.gateway.private_messages("alice").len(), 1);
        assert_eq!(bot.gateway.private_messages("bob").len(), 1);

        sleep(Duration::from_secs(20)).await;
        let results = bot.results();
        assert_eq!(results.len(), 1);
        assert!(results[0].ends_with("No one got it right!"));
        assert!(bot.store.scores.lock().unwrap().is_empty());
        assert_eq!(bot.gateway.private_messages("alice").len(), 1);

        sleep(Duration::from_secs(3)).await;
        assert_eq!(bot.gateway.private_messages("alice").len(), 2);
        assert!(
            bot.gateway
                .private_messages("alice")
                .last()
                .unwrap()
                .contains("Question 1")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_quorum_resolves_before_deadline() {
        let bot = Bot::spawn(&["alice", "bob", "carol"], questions(5));

        bot.say(ADMIN, "!start");
        sleep(Duration::from_secs(1)).await;

        bot.say("alice", &bot.correct_token("alice"));
        bot.say("bob", &bot.correct_token("bob"));
        sleep(Duration::from_secs(1)).await;

        let results = bot.results();
        assert_eq!(results.len(), 1);
        assert!(results[0].ends_with("Congrats to: alice, bob"));
        assert_eq!(bot.store.score_of("alice"), Some(1));
        assert_eq!(bot.store.score_of("bob"), Some(1));
        assert_eq!(bot.store.score_of("carol"), None);
        assert_eq!(bot.gateway.statuses().len(), 1);

        // The cancelled deadline must not resolve the round a second time
        sleep(Duration::from_secs(1)).await;
        assert_eq!(bot.gateway.private_messages("carol").len(), 1);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(bot.gateway.private_messages("carol").len(), 2);
        sleep(Duration::from_secs(17)).await;
        assert_eq!(bot.results().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_round() {
        let bot = Bot::spawn(&["alice", "bob"], questions(5));

        bot.say(ADMIN, "!start");
        sleep(Duration::from_secs(1)).await;
        bot.say(ADMIN, "!stop");
        sleep(Duration::from_secs(60)).await;

        assert!(bot.results().is_empty());
        assert_eq!(
            bot.gateway.channel_messages().last().unwrap(),
            &UpdateMessage::Stopping.to_message()
        );
        assert_eq!(bot.gateway.private_messages("alice").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_ends_session() {
        let bot = Bot::spawn(&["alice"], MockSource::with_batches(Vec::new()));

        bot.say(ADMIN, "!start");
        sleep(Duration::from_secs(1)).await;

        assert_eq!(
            bot.gateway.channel_messages(),
            vec![
                UpdateMessage::Starting.to_message(),
                UpdateMessage::Unavailable.to_message(),
            ]
        );
        assert!(bot.gateway.private_messages("alice").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_after_last_question() {
        let bot = Bot::spawn(&["alice", "bob"], questions(1));

        bot.say(ADMIN, "!start");
        sleep(Duration::from_secs(1)).await;
        bot.say("alice", &bot.correct_token("alice"));
        sleep(Duration::from_secs(5)).await;

        assert_eq!(bot.results().len(), 1);
        assert_eq!(
            bot.gateway.channel_messages().last().unwrap(),
            &UpdateMessage::Unavailable.to_message()
        );
        assert_eq!(bot.store.score_of("alice"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connected_publishes_leaderboard() {
        let bot = Bot::spawn(&[], questions(1));

        bot.handle.send(Event::Connected).unwrap();
        sleep(Duration::from_millis(10)).await;

        assert_eq!(
            bot.gateway.statuses(),
            vec!["<h2>Scores:</h2><ol></ol>".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let bot = Bot::spawn(&["alice"], questions(1));

        bot.handle.send(Event::Shutdown).unwrap();
        bot.task.await.unwrap();

        assert!(matches!(
            bot.handle.send(Event::Connected),
            Err(session::Error::Closed)
        ));
    }
}
