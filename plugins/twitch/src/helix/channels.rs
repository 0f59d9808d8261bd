//! Helix channel types.

use serde::{Deserialize, Serialize};

/// One entry of the `search/channels` endpoint.
///
/// See: <https://dev.twitch.tv/docs/api/reference/#search-channels>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSearchResult {
    /// The broadcaster's numeric user id.
    pub id: String,
    /// The broadcaster's login name.
    pub broadcaster_login: String,
    pub display_name: String,
    /// URL of the broadcaster's profile image.
    pub thumbnail_url: String,
    /// Whether the broadcaster is streaming right now.
    pub is_live: bool,
}

/// One entry of the `channels` endpoint.
///
/// See: <https://dev.twitch.tv/docs/api/reference/#get-channel-information>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInformation {
    pub broadcaster_id: String,
    pub broadcaster_login: String,
    pub broadcaster_name: String,
}
