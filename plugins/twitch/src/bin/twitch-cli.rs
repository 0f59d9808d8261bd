use clap::{Parser, Subcommand};
use eyre::Context;
use oauth2::AccessToken;
use serde::Serialize;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use twitch_widget::Config;
use twitch_widget::model::{
    ChannelVideosRequest, GetLiveVideoRequest, GetVideoRequest, SearchRequest,
};
use twitch_widget::token::TokenStore;

/// Runs single Twitch queries from the command line and prints the result as JSON.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search channels by name.
    Search { query: String },
    /// Search everything searchable.
    SearchAll { query: String },
    /// List a channel's archived broadcasts.
    Videos { channel: String },
    /// Show one video.
    Video { id: String },
    /// Show what a channel is streaming right now.
    Live { channel: String },
    /// Look up a channel's login name.
    ChannelName { channel: String },
    /// Fetch a fresh access token and store it.
    RefreshToken,
    /// Store an access token obtained elsewhere.
    SetToken { token: String },
    /// Forget the stored access token.
    ClearToken,
}

fn print(value: &impl Serialize) -> eyre::Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize result")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let Args { config, command } = Args::parse();
    let store = Arc::new(config.token_store());
    let queries = config.build_queries(store.clone())?;

    match command {
        Command::Search { query } => print(&queries.search_channels(SearchRequest { query }).await?),
        Command::SearchAll { query } => print(&queries.search_all(SearchRequest { query }).await?),
        Command::Videos { channel } => print(
            &queries
                .get_channel_videos(ChannelVideosRequest { api_id: channel })
                .await?,
        ),
        Command::Video { id } => print(&queries.get_video(GetVideoRequest { api_id: id }).await?),
        Command::Live { channel } => print(
            &queries
                .get_live_video(GetLiveVideoRequest {
                    channel_api_id: channel,
                })
                .await?,
        ),
        Command::ChannelName { channel } => print(&queries.get_channel_name(&channel).await?),
        Command::RefreshToken => {
            let token = queries
                .helix()
                .tokens()
                .refresh_token()
                .await
                .context("refresh access token")?;
            if token.is_none() {
                eyre::bail!("token endpoint did not issue a token");
            }
            eprintln!("stored new token in {}", store.path().display());
            Ok(())
        }
        Command::SetToken { token } => {
            store
                .set(&AccessToken::new(token))
                .await
                .context("store access token")?;
            eprintln!("stored token in {}", store.path().display());
            Ok(())
        }
        Command::ClearToken => store.clear().await.context("clear access token"),
    }
}
