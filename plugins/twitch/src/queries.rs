//! The high-level operations the host calls, reshaping Helix data into display types.

use crate::config::ChannelAddressing;
use crate::duration::twitch_duration_to_seconds;
use crate::helix::HelixClient;
use crate::helix::channels::ChannelSearchResult;
use crate::helix::streams::Stream;
use crate::helix::videos::{self, VideoType};
use crate::model::{
    Channel, ChannelVideosRequest, ChannelVideosResult, GetLiveVideoRequest, GetVideoRequest,
    ImageInfo, SearchAllResult, SearchChannelResult, SearchRequest, Video,
};
use crate::transport::Transport;
use eyre::Context;
use tracing::instrument;

/// Size substituted into thumbnail URL templates.
const THUMBNAIL_TEMPLATE_SIZE: &str = "200";

/// Size reported to the host for thumbnails.
///
/// This deliberately differs from [`THUMBNAIL_TEMPLATE_SIZE`]; the widget lays thumbnails out at
/// 250 pixels and lets the browser scale the 200 pixel image.
const THUMBNAIL_DISPLAY_SIZE: u32 = 250;

fn require<'a>(field: &str, value: &'a str) -> eyre::Result<&'a str> {
    if value.is_empty() {
        eyre::bail!("{field} must not be empty");
    }
    Ok(value)
}

/// Maps a channel search hit to its display form.
pub fn channel_from_search(result: ChannelSearchResult, addressing: ChannelAddressing) -> Channel {
    let api_id = match addressing {
        ChannelAddressing::Login => result.broadcaster_login,
        ChannelAddressing::Id => result.id,
    };
    Channel {
        api_id,
        name: result.display_name,
        images: vec![ImageInfo::new(result.thumbnail_url)],
        is_live: result.is_live,
    }
}

/// Fills in the `%{width}`/`%{height}` placeholders of a video thumbnail template.
pub fn thumbnail_image(template: &str) -> ImageInfo {
    let url = template
        .replace("%{width}", THUMBNAIL_TEMPLATE_SIZE)
        .replace("%{height}", THUMBNAIL_TEMPLATE_SIZE);
    ImageInfo::sized(url, THUMBNAIL_DISPLAY_SIZE, THUMBNAIL_DISPLAY_SIZE)
}

/// Maps a recorded Helix video to its display form.
///
/// Fails if the reported duration cannot be parsed.
pub fn video_from_helix(video: videos::Video, addressing: ChannelAddressing) -> eyre::Result<Video> {
    let duration = twitch_duration_to_seconds(&video.duration)
        .with_context(|| format!("parse duration {:?} of video {}", video.duration, video.id))?;
    let channel_api_id = match addressing {
        ChannelAddressing::Login => video.user_login,
        ChannelAddressing::Id => video.user_id,
    };
    Ok(Video {
        title: video.title,
        images: vec![thumbnail_image(&video.thumbnail_url)],
        api_id: Some(video.id),
        duration: Some(duration),
        channel_api_id,
        channel_name: video.user_name,
    })
}

/// Maps a live stream to the partial video the player needs.
pub fn video_from_stream(stream: Stream, addressing: ChannelAddressing) -> Video {
    let channel_api_id = match addressing {
        ChannelAddressing::Login => stream.user_login,
        ChannelAddressing::Id => stream.user_id,
    };
    Video {
        title: stream.title,
        api_id: None,
        duration: None,
        images: Vec::new(),
        channel_api_id,
        channel_name: stream.user_name,
    }
}

/// The operations exposed to the host.
#[derive(Debug)]
pub struct TwitchQueries<T> {
    helix: HelixClient<T>,
    addressing: ChannelAddressing,
}

impl<T: Transport> TwitchQueries<T> {
    pub fn new(helix: HelixClient<T>, addressing: ChannelAddressing) -> Self {
        Self { helix, addressing }
    }

    pub fn helix(&self) -> &HelixClient<T> {
        &self.helix
    }

    pub fn addressing(&self) -> ChannelAddressing {
        self.addressing
    }

    /// Turns a channel reference from the host into a Helix user id.
    async fn resolve_user_id(&self, channel: &str) -> eyre::Result<String> {
        match self.addressing {
            ChannelAddressing::Id => Ok(channel.to_string()),
            ChannelAddressing::Login => {
                let user = self
                    .helix
                    .get_users_by_login(channel)
                    .await
                    .with_context(|| format!("look up user {channel}"))?
                    .into_iter()
                    .next()
                    .ok_or_else(|| eyre::eyre!("no Twitch user with login {channel}"))?;
                tracing::debug!(login = channel, id = %user.id, "resolved channel login");
                Ok(user.id)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn search_channels(&self, request: SearchRequest) -> eyre::Result<SearchChannelResult> {
        let query = require("query", &request.query)?;
        let items = self
            .helix
            .search_channels(query)
            .await
            .context("search channels")?
            .into_iter()
            .map(|result| channel_from_search(result, self.addressing))
            .collect();
        Ok(SearchChannelResult { items })
    }

    /// Lists a channel's archived broadcasts and whether it is live right now.
    #[instrument(skip(self))]
    pub async fn get_channel_videos(
        &self,
        request: ChannelVideosRequest,
    ) -> eyre::Result<ChannelVideosResult> {
        let channel = require("apiId", &request.api_id)?;
        let user_id = self.resolve_user_id(channel).await?;

        let items = self
            .helix
            .get_videos_by_user(&user_id, VideoType::Archive)
            .await
            .context("list channel videos")?
            .into_iter()
            .map(|video| video_from_helix(video, self.addressing))
            .collect::<eyre::Result<Vec<_>>>()?;

        let streams = self
            .helix
            .get_live_streams(&user_id)
            .await
            .context("check live status")?;

        Ok(ChannelVideosResult {
            items,
            is_live: !streams.is_empty(),
        })
    }

    #[instrument(skip(self))]
    pub async fn get_video(&self, request: GetVideoRequest) -> eyre::Result<Video> {
        let id = require("apiId", &request.api_id)?;
        let video = self
            .helix
            .get_videos_by_id(id)
            .await
            .context("fetch video")?
            .into_iter()
            .next()
            .ok_or_else(|| eyre::eyre!("video not found: {id}"))?;
        video_from_helix(video, self.addressing)
    }

    /// A snapshot of the channel's current broadcast, or `None` if it is offline.
    #[instrument(skip(self))]
    pub async fn get_live_video(&self, request: GetLiveVideoRequest) -> eyre::Result<Option<Video>> {
        let channel = require("channelApiId", &request.channel_api_id)?;
        let user_id = self.resolve_user_id(channel).await?;
        let stream = self
            .helix
            .get_live_streams(&user_id)
            .await
            .context("fetch live stream")?
            .into_iter()
            .next();
        Ok(stream.map(|stream| video_from_stream(stream, self.addressing)))
    }

    #[instrument(skip(self))]
    pub async fn search_all(&self, request: SearchRequest) -> eyre::Result<SearchAllResult> {
        // only channels can be searched on Twitch today; further kinds join this list
        let (channels,) = tokio::try_join!(self.search_channels(request))?;
        Ok(SearchAllResult { channels })
    }

    /// The login name of a channel, as used for the embed URL.
    #[instrument(skip(self))]
    pub async fn get_channel_name(&self, channel_api_id: &str) -> eyre::Result<String> {
        let channel = require("channelApiId", channel_api_id)?;
        let broadcaster_id = self.resolve_user_id(channel).await?;
        let info = self
            .helix
            .get_channel_information(&broadcaster_id)
            .await
            .context("fetch channel information")?
            .into_iter()
            .next()
            .ok_or_else(|| eyre::eyre!("no channel with broadcaster id {broadcaster_id}"))?;
        Ok(info.broadcaster_login)
    }
}
