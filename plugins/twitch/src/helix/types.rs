//! Shared envelope types for Helix responses.

use serde::{Deserialize, Serialize};

/// Every Helix list endpoint wraps its results in a `data` array.
///
/// Helix also returns a pagination cursor on some endpoints; only the first page is ever
/// requested, so it is ignored here.
///
/// See: <https://dev.twitch.tv/docs/api/guide/#pagination>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelixResponse<T> {
    pub data: Vec<T>,
}
