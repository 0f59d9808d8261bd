//! Runtime configuration shared by both binaries.

use crate::helix::HelixClient;
use crate::queries::TwitchQueries;
use crate::token::{FileTokenStore, TokenService, TokenStore};
use crate::transport::ReqwestTransport;
use eyre::Context;
use oauth2::ClientId;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_TOKEN_URL: &str =
    "https://cloudflare-worker-token-service.audio-pwa.workers.dev/token";

// The client id is public; it is sent in the clear on every Helix request.
pub const DEFAULT_CLIENT_ID: &str = "19tpyf3jn7o7c05mk774ira19x8bbp";

pub const DEFAULT_HELIX_URL: &str = "https://api.twitch.tv/helix/";

pub const DEFAULT_TOKEN_FILE: &str = "twitch-token.json";

/// Hosts allowed to embed the Twitch player.
pub const DEFAULT_PLAYER_PARENTS: [&str; 3] =
    ["www.videogata.com", "localhost", "preview.videogata.com"];

/// How the host refers to channels in requests and results.
///
/// Helix identifies broadcasters by numeric user id, but the widget may show and round-trip
/// login names instead. With [`ChannelAddressing::Login`] every channel lookup costs an extra
/// `users?login=` request to find the id.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ChannelAddressing {
    #[default]
    Login,
    Id,
}

fn default_parents() -> Vec<String> {
    DEFAULT_PLAYER_PARENTS.iter().map(|p| p.to_string()).collect()
}

#[derive(Debug, Clone, clap::Args)]
pub struct Config {
    /// Endpoint that issues client-credentials access tokens.
    #[arg(long, env = "TWITCH_WIDGET_TOKEN_URL", default_value = DEFAULT_TOKEN_URL)]
    pub token_url: Url,

    /// Twitch application client id.
    #[arg(long, env = "TWITCH_WIDGET_CLIENT_ID", default_value = DEFAULT_CLIENT_ID)]
    pub client_id: String,

    /// Base URL of the Helix API. Must end in `/`.
    #[arg(long, env = "TWITCH_WIDGET_HELIX_URL", default_value = DEFAULT_HELIX_URL)]
    pub helix_url: Url,

    /// Whether channels are referred to by login name or by numeric id.
    #[arg(
        long,
        value_enum,
        env = "TWITCH_WIDGET_ADDRESSING",
        default_value = "login"
    )]
    pub addressing: ChannelAddressing,

    /// Where the access token is kept between runs.
    #[arg(long, env = "TWITCH_WIDGET_TOKEN_FILE", default_value = DEFAULT_TOKEN_FILE)]
    pub token_file: PathBuf,

    /// Hosts allowed to embed the player.
    #[arg(
        long = "player-parent",
        env = "TWITCH_WIDGET_PLAYER_PARENTS",
        value_delimiter = ',',
        default_values_t = default_parents()
    )]
    pub player_parents: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_url: Url::parse(DEFAULT_TOKEN_URL).expect("default token URL is valid"),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            helix_url: Url::parse(DEFAULT_HELIX_URL).expect("default Helix URL is valid"),
            addressing: ChannelAddressing::default(),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            player_parents: default_parents(),
        }
    }
}

impl Config {
    pub fn token_store(&self) -> FileTokenStore {
        FileTokenStore::new(&self.token_file)
    }

    /// Wires up the reqwest-backed client stack on top of `store`.
    pub fn build_queries(
        &self,
        store: Arc<dyn TokenStore>,
    ) -> eyre::Result<TwitchQueries<ReqwestTransport>> {
        let transport = Arc::new(ReqwestTransport::default());
        let tokens = TokenService::new(
            Arc::clone(&transport),
            store,
            self.token_url.clone(),
            ClientId::new(self.client_id.clone()),
        );
        let helix = HelixClient::new(transport, tokens, self.helix_url.clone())
            .context("construct Helix client")?;
        Ok(TwitchQueries::new(helix, self.addressing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn test_flag_defaults_match_default_impl() {
        let parsed = Cli::try_parse_from(["twitch-widget"]).unwrap().config;
        let default = Config::default();
        assert_eq!(parsed.token_url, default.token_url);
        assert_eq!(parsed.client_id, default.client_id);
        assert_eq!(parsed.helix_url, default.helix_url);
        assert_eq!(parsed.addressing, ChannelAddressing::Login);
        assert_eq!(parsed.token_file, default.token_file);
        assert_eq!(
            parsed.player_parents,
            ["www.videogata.com", "localhost", "preview.videogata.com"]
        );
    }

    #[test]
    fn test_flags_override_defaults() {
        let parsed = Cli::try_parse_from([
            "twitch-widget",
            "--addressing",
            "id",
            "--helix-url",
            "http://127.0.0.1:9000/helix/",
            "--player-parent",
            "example.com,localhost",
        ])
        .unwrap()
        .config;
        assert_eq!(parsed.addressing, ChannelAddressing::Id);
        assert_eq!(parsed.helix_url.as_str(), "http://127.0.0.1:9000/helix/");
        assert_eq!(parsed.player_parents, ["example.com", "localhost"]);
    }

    #[test]
    fn test_rejects_unknown_addressing() {
        assert!(Cli::try_parse_from(["twitch-widget", "--addressing", "email"]).is_err());
    }

    #[test]
    fn test_addressing_serde_names() {
        assert_eq!(
            serde_json::to_string(&ChannelAddressing::Login).unwrap(),
            r#""login""#
        );
        assert_eq!(
            serde_json::from_str::<ChannelAddressing>(r#""id""#).unwrap(),
            ChannelAddressing::Id
        );
    }
}
