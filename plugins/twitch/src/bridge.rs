//! The boundary between the widget host and the Twitch queries.
//!
//! The host calls into us by method name with a JSON request object, and exchanges small tagged
//! messages with the widget's UI frame. Going the other way, we can ask the host to end the
//! current video or forward a message to the UI frame; that direction is the
//! [`HostApplication`] port.

use crate::model::{ChannelVideosRequest, GetLiveVideoRequest, GetVideoRequest, SearchRequest};
use crate::queries::TwitchQueries;
use crate::transport::Transport;
use eyre::Context;
use oauth2::AccessToken;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::str::FromStr;
use tracing::instrument;

/// Messages the UI frame sends to the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UiMessage {
    /// Playback of the current video finished.
    #[serde(rename = "endvideo")]
    EndVideo,
    /// The UI wants the login name of a channel.
    #[serde(rename = "getChannelName", rename_all = "camelCase")]
    GetChannelName { channel_api_id: String },
}

/// Messages the widget sends back to the UI frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostMessage {
    #[serde(rename = "channelName", rename_all = "camelCase")]
    ChannelName { channel_name: String },
}

/// What the widget can ask of its host.
pub trait HostApplication: Send + Sync {
    /// Tells the host that the current video is over so it can move on.
    fn end_video(&self) -> impl Future<Output = eyre::Result<()>> + Send;

    /// Forwards a message to the widget's UI frame.
    fn post_ui_message(&self, message: HostMessage)
    -> impl Future<Output = eyre::Result<()>> + Send;
}

/// The named entry points the host may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMethod {
    SearchAll,
    SearchChannels,
    GetChannelVideos,
    GetVideo,
    GetLiveVideo,
}

impl HostMethod {
    pub const ALL: [HostMethod; 5] = [
        HostMethod::SearchAll,
        HostMethod::SearchChannels,
        HostMethod::GetChannelVideos,
        HostMethod::GetVideo,
        HostMethod::GetLiveVideo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HostMethod::SearchAll => "searchAll",
            HostMethod::SearchChannels => "searchChannels",
            HostMethod::GetChannelVideos => "getChannelVideos",
            HostMethod::GetVideo => "getVideo",
            HostMethod::GetLiveVideo => "getLiveVideo",
        }
    }
}

impl FromStr for HostMethod {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| eyre::eyre!("unknown method {s:?}"))
    }
}

fn parse_params<R: DeserializeOwned>(method: HostMethod, params: Value) -> eyre::Result<R> {
    serde_json::from_value(params)
        .with_context(|| format!("parse parameters of {}", method.as_str()))
}

/// Dispatches host calls and UI messages to the queries.
#[derive(Debug)]
pub struct Bridge<T, H> {
    queries: TwitchQueries<T>,
    host: H,
}

impl<T: Transport, H: HostApplication> Bridge<T, H> {
    pub fn new(queries: TwitchQueries<T>, host: H) -> Self {
        Self { queries, host }
    }

    pub fn queries(&self) -> &TwitchQueries<T> {
        &self.queries
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Runs the entry point named `method` and returns its result as JSON.
    #[instrument(skip(self, params))]
    pub async fn call(&self, method: &str, params: Value) -> eyre::Result<Value> {
        let method: HostMethod = method.parse()?;
        let result = match method {
            HostMethod::SearchAll => {
                let request: SearchRequest = parse_params(method, params)?;
                serde_json::to_value(self.queries.search_all(request).await?)
            }
            HostMethod::SearchChannels => {
                let request: SearchRequest = parse_params(method, params)?;
                serde_json::to_value(self.queries.search_channels(request).await?)
            }
            HostMethod::GetChannelVideos => {
                let request: ChannelVideosRequest = parse_params(method, params)?;
                serde_json::to_value(self.queries.get_channel_videos(request).await?)
            }
            HostMethod::GetVideo => {
                let request: GetVideoRequest = parse_params(method, params)?;
                serde_json::to_value(self.queries.get_video(request).await?)
            }
            HostMethod::GetLiveVideo => {
                let request: GetLiveVideoRequest = parse_params(method, params)?;
                serde_json::to_value(self.queries.get_live_video(request).await?)
            }
        };
        result.with_context(|| format!("serialize result of {}", method.as_str()))
    }

    /// Reacts to a message from the UI frame.
    #[instrument(skip(self))]
    pub async fn on_ui_message(&self, message: UiMessage) -> eyre::Result<()> {
        match message {
            UiMessage::EndVideo => self.host.end_video().await.context("end video"),
            UiMessage::GetChannelName { channel_api_id } => {
                let channel_name = self
                    .queries
                    .get_channel_name(&channel_api_id)
                    .await
                    .with_context(|| format!("look up name of channel {channel_api_id}"))?;
                self.host
                    .post_ui_message(HostMessage::ChannelName { channel_name })
                    .await
                    .context("reply with channel name")
            }
        }
    }

    /// Seeds the token store with a token the host obtained itself.
    pub async fn set_token(&self, token: AccessToken) -> eyre::Result<()> {
        self.queries.helix().tokens().set_token(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelAddressing;
    use crate::testing::{StubTransport, queries};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        EndVideo,
        UiMessage(HostMessage),
    }

    #[derive(Debug, Default)]
    struct RecordingHost {
        seen: Mutex<Vec<Seen>>,
    }

    impl RecordingHost {
        fn seen(&self) -> Vec<Seen> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl HostApplication for RecordingHost {
        async fn end_video(&self) -> eyre::Result<()> {
            self.seen.lock().unwrap().push(Seen::EndVideo);
            Ok(())
        }

        async fn post_ui_message(&self, message: HostMessage) -> eyre::Result<()> {
            self.seen.lock().unwrap().push(Seen::UiMessage(message));
            Ok(())
        }
    }

    fn bridge(
        transport: &std::sync::Arc<StubTransport>,
        addressing: ChannelAddressing,
    ) -> Bridge<StubTransport, RecordingHost> {
        Bridge::new(queries(transport, addressing), RecordingHost::default())
    }

    #[test]
    fn test_ui_message_wire_format() {
        let end: UiMessage = serde_json::from_value(json!({"type": "endvideo"})).unwrap();
        assert_eq!(end, UiMessage::EndVideo);

        let get: UiMessage =
            serde_json::from_value(json!({"type": "getChannelName", "channelApiId": "42"}))
                .unwrap();
        assert_eq!(
            get,
            UiMessage::GetChannelName {
                channel_api_id: "42".to_string()
            }
        );
        assert_eq!(
            serde_json::to_value(&get).unwrap(),
            json!({"type": "getChannelName", "channelApiId": "42"})
        );

        let reply = HostMessage::ChannelName {
            channel_name: "twitchdev".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"type": "channelName", "channelName": "twitchdev"})
        );

        assert!(serde_json::from_value::<UiMessage>(json!({"type": "play"})).is_err());
    }

    #[test]
    fn test_method_names() {
        for method in HostMethod::ALL {
            assert_eq!(method.as_str().parse::<HostMethod>().unwrap(), method);
        }
        assert!("onSearchAll".parse::<HostMethod>().is_err());
    }

    #[tokio::test]
    async fn test_unknown_method_is_an_error() {
        let transport = StubTransport::new();
        let bridge = bridge(&transport, ChannelAddressing::Login);
        let error = bridge.call("deleteEverything", json!({})).await.unwrap_err();
        assert!(error.to_string().contains("deleteEverything"), "{error}");
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_bad_params_are_an_error() {
        let transport = StubTransport::new();
        let bridge = bridge(&transport, ChannelAddressing::Login);
        assert!(bridge.call("getVideo", json!({"id": "1"})).await.is_err());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_search_all_call() {
        let transport = StubTransport::new();
        transport.ok(
            "/search/channels",
            r#"{"data":[{"id":"1","broadcaster_login":"a","display_name":"A",
                "thumbnail_url":"https://cdn/a.png","is_live":false}]}"#,
        );
        let bridge = bridge(&transport, ChannelAddressing::Login);

        let result = bridge
            .call("searchAll", json!({"query": "a"}))
            .await
            .unwrap();
        assert_eq!(
            result,
            json!({"channels": {"items": [
                {"apiId": "a", "name": "A", "images": [{"url": "https://cdn/a.png"}], "isLive": false}
            ]}})
        );
    }

    #[tokio::test]
    async fn test_absent_live_video_is_null() {
        let transport = StubTransport::new();
        transport.ok("/streams", r#"{"data":[]}"#);
        let bridge = bridge(&transport, ChannelAddressing::Id);

        let result = bridge
            .call("getLiveVideo", json!({"channelApiId": "42"}))
            .await
            .unwrap();
        assert_eq!(result, Value::Null);
    }

    #[tokio::test]
    async fn test_endvideo_ends_video() {
        let transport = StubTransport::new();
        let bridge = bridge(&transport, ChannelAddressing::Login);

        bridge.on_ui_message(UiMessage::EndVideo).await.unwrap();
        assert_eq!(bridge.host().seen(), vec![Seen::EndVideo]);
    }

    #[tokio::test]
    async fn test_get_channel_name_posts_reply() {
        let transport = StubTransport::new();
        transport.ok(
            "/channels",
            r#"{"data":[{"broadcaster_id":"42","broadcaster_login":"twitchdev","broadcaster_name":"TwitchDev"}]}"#,
        );
        let bridge = bridge(&transport, ChannelAddressing::Id);

        bridge
            .on_ui_message(UiMessage::GetChannelName {
                channel_api_id: "42".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(
            bridge.host().seen(),
            vec![Seen::UiMessage(HostMessage::ChannelName {
                channel_name: "twitchdev".to_string()
            })]
        );
    }

    #[tokio::test]
    async fn test_failed_lookup_posts_nothing() {
        let transport = StubTransport::new();
        transport.ok("/channels", r#"{"data":[]}"#);
        let bridge = bridge(&transport, ChannelAddressing::Id);

        assert!(
            bridge
                .on_ui_message(UiMessage::GetChannelName {
                    channel_api_id: "42".to_string(),
                })
                .await
                .is_err()
        );
        assert!(bridge.host().seen().is_empty());
    }

    #[tokio::test]
    async fn test_set_token_is_used_by_later_calls() {
        let transport = StubTransport::new();
        transport.ok("/videos", r#"{"data":[]}"#);
        let bridge = bridge(&transport, ChannelAddressing::Login);

        bridge
            .set_token(AccessToken::new("from-host".to_string()))
            .await
            .unwrap();
        assert!(bridge.call("getVideo", json!({"apiId": "1"})).await.is_err());
        let request = &transport.requests()[0];
        assert_eq!(
            request.headers[http::header::AUTHORIZATION],
            "Bearer from-host"
        );
        assert!(transport.requests_to("/token").is_empty());
    }
}
