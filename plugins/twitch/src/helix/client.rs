//! Helix API client with bearer-token injection and refresh-on-401.

use crate::helix::channels::{ChannelInformation, ChannelSearchResult};
use crate::helix::retry::AuthRetry;
use crate::helix::streams::Stream;
use crate::helix::types::HelixResponse;
use crate::helix::users::User;
use crate::helix::videos::{Video, VideoType};
use crate::token::TokenService;
use crate::transport::{ApiError, HttpRequest, HttpResponse, Transport};
use eyre::Context;
use http::header::{AUTHORIZATION, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use oauth2::AccessToken;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;

/// Header carrying the application's client id on every Helix request.
pub const CLIENT_ID_HEADER: HeaderName = HeaderName::from_static("client-id");

fn bearer(token: &AccessToken) -> eyre::Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.secret()))
        .context("access token is not a valid header value")?;
    value.set_sensitive(true);
    Ok(value)
}

/// Client for the Twitch Helix REST API.
///
/// Every request gets the client's default headers (the `Client-Id`, plus the `Authorization`
/// header installed by the most recent refresh) and then the stored access token, if there is
/// one, as `Authorization: Bearer <token>`.
///
/// When Helix answers 401 the client asks the [`TokenService`] for a new token once, installs it
/// as the default `Authorization` header, and replays the identical request. If the replay is
/// rejected too, the failure is returned as an [`ApiError`].
#[derive(Debug)]
pub struct HelixClient<T> {
    transport: Arc<T>,
    tokens: TokenService<T>,
    base_url: Url,
    /// Defaults applied to every request. Overwritten by token refreshes, which makes the new
    /// token visible to every later call made through this client.
    default_headers: Mutex<HeaderMap>,
    retry: AuthRetry,
}

impl<T: Transport> HelixClient<T> {
    /// Creates a client for the Helix API rooted at `base_url`.
    ///
    /// `base_url` should end in a `/` so that endpoint paths are joined beneath it.
    pub fn new(transport: Arc<T>, tokens: TokenService<T>, base_url: Url) -> eyre::Result<Self> {
        let client_id = HeaderValue::from_str(tokens.client_id().as_str())
            .context("client id is not a valid header value")?;
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CLIENT_ID_HEADER, client_id);

        Ok(Self {
            transport,
            tokens,
            base_url,
            default_headers: Mutex::new(default_headers),
            retry: AuthRetry::default(),
        })
    }

    pub fn tokens(&self) -> &TokenService<T> {
        &self.tokens
    }

    /// A snapshot of the headers currently applied to every request.
    pub async fn default_headers(&self) -> HeaderMap {
        self.default_headers.lock().await.clone()
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> eyre::Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .with_context(|| format!("build Helix URL for {path}"))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    async fn authorize(&self, request: &mut HttpRequest) -> eyre::Result<()> {
        {
            let defaults = self.default_headers.lock().await;
            for (name, value) in defaults.iter() {
                request.headers.insert(name.clone(), value.clone());
            }
        }
        if let Some(token) = self.tokens.current_token().await? {
            request.headers.insert(AUTHORIZATION, bearer(&token)?);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn refresh_authorization(&self) -> eyre::Result<()> {
        let Some(token) = self
            .tokens
            .refresh_token()
            .await
            .context("refresh Helix access token")?
        else {
            tracing::warn!("no token issued, replaying request with the existing credentials");
            return Ok(());
        };

        let client_id = HeaderValue::from_str(self.tokens.client_id().as_str())
            .context("client id is not a valid header value")?;
        let mut defaults = self.default_headers.lock().await;
        defaults.insert(CLIENT_ID_HEADER, client_id);
        defaults.insert(AUTHORIZATION, bearer(&token)?);
        Ok(())
    }

    /// Sends `request` with credentials attached, refreshing and replaying once on a 401.
    ///
    /// Transport failures are returned untouched. Any non-success status of the final attempt
    /// becomes an [`ApiError::Status`].
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn execute(&self, request: HttpRequest) -> eyre::Result<HttpResponse> {
        let template = request.clone();
        let response = self
            .retry
            .run(
                move || {
                    let mut attempt = request.clone();
                    async move {
                        self.authorize(&mut attempt).await?;
                        self.transport.send(attempt).await
                    }
                },
                |response: &HttpResponse| response.status == StatusCode::UNAUTHORIZED,
                || self.refresh_authorization(),
            )
            .await?;

        if !response.status.is_success() {
            tracing::debug!(status = %response.status, "Helix request failed");
            return Err(ApiError::from_response(&template, &response).into());
        }
        Ok(response)
    }

    /// GETs a Helix list endpoint and parses its `data` array.
    pub async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> eyre::Result<Vec<R>> {
        let url = self.endpoint(path, params)?;
        let response = self.execute(HttpRequest::get(url)).await?;
        let parsed: HelixResponse<R> = response
            .json()
            .with_context(|| format!("parse Helix {path} response"))?;
        Ok(parsed.data)
    }

    /// POSTs `body` to a Helix endpoint with the given extra headers.
    pub async fn post(
        &self,
        path: &str,
        body: impl Into<String>,
        headers: HeaderMap,
    ) -> eyre::Result<HttpResponse> {
        let url = self.endpoint(path, &[])?;
        let mut request = HttpRequest::post(url, body);
        request.headers.extend(headers);
        self.execute(request).await
    }

    /// Searches channels whose name matches `query`.
    ///
    /// See: <https://dev.twitch.tv/docs/api/reference/#search-channels>
    #[instrument(skip(self))]
    pub async fn search_channels(&self, query: &str) -> eyre::Result<Vec<ChannelSearchResult>> {
        let channels: Vec<ChannelSearchResult> =
            self.get("search/channels", &[("query", query)]).await?;
        tracing::debug!(returned_items = channels.len(), "searched channels");
        Ok(channels)
    }

    /// Looks up users by login name.
    ///
    /// See: <https://dev.twitch.tv/docs/api/reference/#get-users>
    #[instrument(skip(self))]
    pub async fn get_users_by_login(&self, login: &str) -> eyre::Result<Vec<User>> {
        self.get("users", &[("login", login)]).await
    }

    /// Lists the videos of a user.
    ///
    /// See: <https://dev.twitch.tv/docs/api/reference/#get-videos>
    #[instrument(skip(self))]
    pub async fn get_videos_by_user(
        &self,
        user_id: &str,
        video_type: VideoType,
    ) -> eyre::Result<Vec<Video>> {
        let videos: Vec<Video> = self
            .get(
                "videos",
                &[("user_id", user_id), ("type", video_type.as_str())],
            )
            .await?;
        tracing::debug!(user_id, returned_items = videos.len(), "fetched videos");
        Ok(videos)
    }

    /// Fetches videos by id.
    ///
    /// See: <https://dev.twitch.tv/docs/api/reference/#get-videos>
    #[instrument(skip(self))]
    pub async fn get_videos_by_id(&self, video_id: &str) -> eyre::Result<Vec<Video>> {
        self.get("videos", &[("id", video_id)]).await
    }

    /// Lists the live streams of a user. Empty when the user is offline.
    ///
    /// See: <https://dev.twitch.tv/docs/api/reference/#get-streams>
    #[instrument(skip(self))]
    pub async fn get_live_streams(&self, user_id: &str) -> eyre::Result<Vec<Stream>> {
        let streams: Vec<Stream> = self
            .get("streams", &[("user_id", user_id), ("live", "true")])
            .await?;
        tracing::debug!(user_id, live = !streams.is_empty(), "fetched streams");
        Ok(streams)
    }

    /// Fetches channel information for a broadcaster id.
    ///
    /// See: <https://dev.twitch.tv/docs/api/reference/#get-channel-information>
    #[instrument(skip(self))]
    pub async fn get_channel_information(
        &self,
        broadcaster_id: &str,
    ) -> eyre::Result<Vec<ChannelInformation>> {
        let params = [("broadcaster_id", broadcaster_id)];
        self.get("channels", &params).await
    }
}
