//! Bootstrap for the page hosting the Twitch embedded player.
//!
//! The page is opened with a query string naming either a recorded video (`apiId`) or a live
//! channel (`isLive=true&channelApiId=...`). From that we build the options for
//! `new Twitch.Player(...)` and decide which player events are passed up to the parent frame.

use crate::bridge::UiMessage;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// The script that defines `Twitch.Player`.
pub const EMBED_SCRIPT_URL: &str = "https://player.twitch.tv/js/embed/v1.js";

const FULL_SIZE: &str = "100%";

/// What the player should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerTarget {
    Live { channel: String },
    Video { id: String },
}

impl PlayerTarget {
    /// Decides what to play from the page's query string, with or without the leading `?`.
    ///
    /// `isLive=true` selects the live player and then requires `channelApiId`; anything else
    /// selects the video player, which requires `apiId`. Empty values count as missing.
    pub fn from_query(query: &str) -> Option<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut api_id = None;
        let mut is_live = None;
        let mut channel_api_id = None;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let slot = match &*key {
                "apiId" => &mut api_id,
                "isLive" => &mut is_live,
                "channelApiId" => &mut channel_api_id,
                _ => continue,
            };
            // like URLSearchParams.get, the first occurrence wins
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
        if is_live.as_deref() == Some("true") {
            non_empty(channel_api_id).map(|channel| PlayerTarget::Live { channel })
        } else {
            non_empty(api_id).map(|id| PlayerTarget::Video { id })
        }
    }
}

/// Options passed to `new Twitch.Player(element, options)`.
///
/// See: <https://dev.twitch.tv/docs/embed/video-and-clips/#interactive-frames-for-live-streams-and-vods>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerOptions {
    pub width: String,
    pub height: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    /// Domains that may embed the player.
    #[serde(default)]
    pub parent: Vec<String>,
}

impl PlayerOptions {
    pub fn for_target(target: &PlayerTarget, parents: &[String]) -> Self {
        let (channel, video) = match target {
            PlayerTarget::Live { channel } => (Some(channel.clone()), None),
            PlayerTarget::Video { id } => (None, Some(id.clone())),
        };
        Self {
            width: FULL_SIZE.to_string(),
            height: FULL_SIZE.to_string(),
            channel,
            video,
            parent: parents.to_vec(),
        }
    }
}

/// Events of the embedded player that the widget reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerEvent {
    Ended,
}

/// The frame that embeds the player page.
pub trait ParentFrame: Send + Sync {
    fn post_message(&self, message: UiMessage) -> impl Future<Output = eyre::Result<()>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    target: PlayerTarget,
    options: PlayerOptions,
}

impl Player {
    /// Sets up the player for the page's query string, or `None` if it names nothing to play.
    pub fn bootstrap(query: &str, parents: &[String]) -> Option<Self> {
        let target = PlayerTarget::from_query(query)?;
        let options = PlayerOptions::for_target(&target, parents);
        tracing::debug!(?target, "bootstrapped player");
        Some(Self { target, options })
    }

    pub fn target(&self) -> &PlayerTarget {
        &self.target
    }

    pub fn options(&self) -> &PlayerOptions {
        &self.options
    }

    /// Forwards the end of a recorded video to `parent`. A live player never ends a video.
    ///
    /// Returns whether a message was posted.
    pub async fn handle_event<P: ParentFrame>(
        &self,
        event: PlayerEvent,
        parent: &P,
    ) -> eyre::Result<bool> {
        match (&self.target, event) {
            (PlayerTarget::Video { .. }, PlayerEvent::Ended) => {
                parent.post_message(UiMessage::EndVideo).await?;
                Ok(true)
            }
            (PlayerTarget::Live { .. }, _) => {
                tracing::trace!(?event, "live player event not forwarded");
                Ok(false)
            }
        }
    }
}
