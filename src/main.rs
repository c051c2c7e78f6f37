mod bot;
mod chat;
mod config;
mod conversation;
mod corpus;
mod dispatch;
mod logging;

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::config::{Environment, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    if let Err(err) = logging::init(&config::log_file(std::env::var_os("LOG_FILE"))) {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }

    exit_code(run().await)
}

async fn run() -> anyhow::Result<()> {
    let environment = Environment::from_env()?;
    let settings = Settings::resolve(environment, config::terminal_prompt)?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for interrupt: {err}");
                return;
            }
            shutdown.cancel();
        }
    });

    bot::run(&settings, shutdown).await?;
    Ok(())
}

/// Fatal errors are logged once here and turned into the exit status.
fn exit_code(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
