//! Helix video types.

use serde::{Deserialize, Serialize};

/// One entry of the `videos` endpoint.
///
/// See: <https://dev.twitch.tv/docs/api/reference/#get-videos>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub user_id: String,
    pub user_login: String,
    pub user_name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub view_count: u64,
    /// Length of the video in the compact `1h2m3s` form.
    pub duration: String,
    /// Thumbnail URL with literal `%{width}` and `%{height}` placeholders.
    pub thumbnail_url: String,
}

/// The `type` filter of the `videos` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoType {
    All,
    Archive,
    Highlight,
    Upload,
}

impl VideoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoType::All => "all",
            VideoType::Archive => "archive",
            VideoType::Highlight => "highlight",
            VideoType::Upload => "upload",
        }
    }
}
