//! Helix user types.

use serde::{Deserialize, Serialize};

/// One entry of the `users` endpoint.
///
/// See: <https://dev.twitch.tv/docs/api/reference/#get-users>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub login: String,
    pub display_name: String,
}
