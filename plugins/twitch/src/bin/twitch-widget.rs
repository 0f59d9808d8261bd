use clap::Parser;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use twitch_widget::{Config, Outbox, Runtime};

/// Serves the Twitch widget to a host process over newline-delimited JSON on stdin/stdout.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[command(flatten)]
    config: Config,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // stdout carries the protocol, so all logging goes to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let Args { config } = Args::parse();
    tracing::debug!(?config, "starting");

    let store = Arc::new(config.token_store());
    let queries = config.build_queries(store)?;
    let outbox = Outbox::new(tokio::io::stdout());
    let runtime = Runtime::new(queries, outbox, config.player_parents.clone());

    Arc::new(runtime)
        .run(tokio::io::BufReader::new(tokio::io::stdin()))
        .await
}
