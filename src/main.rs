use std::env;
use std::io;
use std::path::Path;
use std::process::ExitCode;

use crowdfund_settle::csv::{read_commands, write_projects};
use crowdfund_settle::{Config, Engine};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: crowdfund <commands.csv>");
        return ExitCode::from(2);
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let commands = match read_commands(Path::new(&path)) {
        Ok(commands) => commands,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let (sender, receiver) = tokio::sync::mpsc::channel(config.channel_capacity);
    let engine = Engine::new(config);

    let reader = tokio::spawn(async move {
        for result in commands {
            match result {
                Ok(command) => {
                    if sender.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    engine.run(ReceiverStream::new(receiver)).await;
    if let Err(e) = reader.await {
        error!("command reader stopped: {e}");
        return ExitCode::FAILURE;
    }

    let projects = engine.projects().await;
    if let Err(e) = write_projects(io::stdout().lock(), &projects) {
        error!("failed to write projects: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
