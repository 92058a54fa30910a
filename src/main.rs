// Entry point for running the trivia bot against the console transport

use anyhow::{Context, Result};
use clap::Parser;
use quizbot::{
    config::{Config, Settings, Source},
    console::{self, ConsoleGateway},
    leaderboard::JsonFileStore,
    question::{JsonFileSource, OpenTriviaSource, QuestionSource},
    runtime::Trivia,
    session::Event,
};
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, stdout carries the chat
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::parse();
    let settings = config.settings().context("Invalid configuration")?;

    match config.source {
        Source::OpenTrivia => {
            let source = OpenTriviaSource::new(&config.trivia_url)
                .context("Failed to create Open Trivia DB client")?;
            run(&config, settings, source).await
        }
        Source::File => {
            let source = JsonFileSource::open(&config.questions).with_context(|| {
                format!(
                    "Failed to load question bank from {}",
                    config.questions.display()
                )
            })?;
            run(&config, settings, source).await
        }
    }
}

async fn run<Q: QuestionSource + 'static>(
    config: &Config,
    settings: Settings,
    source: Q,
) -> Result<()> {
    let store = JsonFileStore::new(&config.scores);
    let gateway = ConsoleGateway::stdout();

    tracing::info!(
        admin = %settings.admin,
        answer_time = settings.answer_time.as_secs(),
        source = ?config.source,
        scores = %config.scores.display(),
        "Starting trivia bot"
    );

    let (trivia, handle) = Trivia::new(settings, gateway.clone(), source, store, config.batch_size);
    let bot = tokio::spawn(trivia.run());

    handle.send(Event::Connected)?;
    console::read_events(BufReader::new(tokio::io::stdin()), &gateway, &handle)
        .await
        .context("Chat input failed")?;

    bot.await.context("Trivia task panicked")?;
    Ok(())
}
