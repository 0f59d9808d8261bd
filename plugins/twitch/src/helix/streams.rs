//! Helix stream types.

use serde::{Deserialize, Serialize};

/// One entry of the `streams` endpoint: a broadcast that is live right now.
///
/// See: <https://dev.twitch.tv/docs/api/reference/#get-streams>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub id: String,
    pub user_id: String,
    pub user_login: String,
    pub user_name: String,
    pub title: String,
    /// Thumbnail URL with literal `{width}` and `{height}` placeholders.
    pub thumbnail_url: String,
    /// When the broadcast started.
    pub started_at: jiff::Timestamp,
}
