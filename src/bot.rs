use std::time::Duration;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::chat::ChatTransport;
use crate::chat::http::HttpTransport;
use crate::config::Settings;
use crate::conversation;
use crate::corpus::Corpus;
use crate::dispatch::{DispatchJournal, DispatchOutcome, Dispatcher, RetryPolicy, TracingJournal};

/// Pause between two cycles.
pub const CYCLE_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Phase {
    Idle,
    Initializing,
    Running,
    Interrupted,
    FatalInitError,
    Stopped,
}

fn advance(phase: &mut Phase, next: Phase) {
    debug!(from = %phase, to = %next, "phase change");
    *phase = next;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub cycles: u64,
    pub successes: u64,
    pub failures: u64,
}

impl RunStats {
    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Success { question, answer } => {
                debug!(question = %question, answer_len = answer.len(), "cycle delivered");
                self.successes += 1;
            }
            DispatchOutcome::Failure { reason } => {
                debug!(reason = %reason, "cycle abandoned");
                self.failures += 1;
            }
        }
    }
}

pub struct Bot<T, J> {
    corpus: Corpus,
    transport: T,
    journal: J,
    retry: RetryPolicy,
}

impl Bot<HttpTransport, TracingJournal> {
    pub async fn initialize(settings: &Settings) -> anyhow::Result<Self> {
        let corpus = Corpus::load(&settings.roles_file, &settings.phrases_file).await?;
        let transport = HttpTransport::new(
            settings.endpoint(),
            settings.api_key.clone(),
            settings.timeout,
        )
        .context("Failed to create HTTP client")?;

        Ok(Bot::new(corpus, transport, TracingJournal, settings.retry))
    }
}

impl<T: ChatTransport, J: DispatchJournal> Bot<T, J> {
    pub fn new(corpus: Corpus, transport: T, journal: J, retry: RetryPolicy) -> Self {
        Self {
            corpus,
            transport,
            journal,
            retry,
        }
    }

    /// Generates and dispatches conversations until `shutdown` fires.
    ///
    /// Cancellation is observed between cycles and also cuts short an
    /// in-flight dispatch or pause; an interrupted cycle is counted but has
    /// no outcome.
    pub async fn run<R: Rng>(self, rng: &mut R, shutdown: &CancellationToken) -> RunStats {
        let dispatcher = Dispatcher::new(&self.transport, &self.journal, self.retry);
        let mut stats = RunStats::default();

        while !shutdown.is_cancelled() {
            let conversation = conversation::generate(&self.corpus, rng);
            stats.cycles += 1;

            let outcome = tokio::select! {
                _ = shutdown.cancelled() => break,
                outcome = dispatcher.dispatch(&conversation) => outcome,
            };
            stats.record(&outcome);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(CYCLE_PAUSE) => {}
            }
        }

        stats
    }
}

/// Drives one bot from initialization to shutdown.
///
/// Initialization failures are returned; the HTTP client is dropped on every
/// path out of this function.
pub async fn run(settings: &Settings, shutdown: CancellationToken) -> anyhow::Result<RunStats> {
    let mut phase = Phase::Idle;
    advance(&mut phase, Phase::Initializing);

    let bot = match Bot::initialize(settings).await {
        Ok(bot) => bot,
        Err(err) => {
            advance(&mut phase, Phase::FatalInitError);
            advance(&mut phase, Phase::Stopped);
            return Err(err.context("Initialization error"));
        }
    };
    info!("Bot successfully initialized");

    advance(&mut phase, Phase::Running);
    info!("Bot started and ready to work");
    let stats = bot.run(&mut StdRng::from_entropy(), &shutdown).await;

    advance(&mut phase, Phase::Interrupted);
    info!("Bot stopped by user");
    info!(
        cycles = stats.cycles,
        successes = stats.successes,
        failures = stats.failures,
        "Run summary"
    );
    advance(&mut phase, Phase::Stopped);

    Ok(stats)
}
