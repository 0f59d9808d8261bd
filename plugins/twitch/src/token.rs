//! Access token storage and the client-credentials token service.
//!
//! The widget never talks to Twitch's own OAuth endpoint. Instead it asks a small token-issuing
//! service for an app access token using the client-credentials grant, and keeps the result in a
//! single [`TokenStore`] slot that the Helix client reads before every request.

use crate::transport::{ApiError, HttpRequest, Transport};
use async_trait::async_trait;
use eyre::Context;
use http::header::{CONTENT_TYPE, HeaderValue};
use oauth2::{AccessToken, ClientId};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::instrument;

/// A single persistent slot holding the current access token.
#[async_trait]
pub trait TokenStore: Send + Sync + std::fmt::Debug {
    async fn get(&self) -> eyre::Result<Option<AccessToken>>;
    async fn set(&self, token: &AccessToken) -> eyre::Result<()>;
    async fn clear(&self) -> eyre::Result<()>;
}

/// Keeps the token in memory only.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<AccessToken>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: AccessToken) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self) -> eyre::Result<Option<AccessToken>> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn set(&self, token: &AccessToken) -> eyre::Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> eyre::Result<()> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredToken {
    access_token: AccessToken,
}

/// Keeps the token in a small JSON file so it survives restarts.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self) -> eyre::Result<Option<AccessToken>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("read token file {}", self.path.display()));
            }
        };
        let stored: StoredToken = serde_json::from_str(&json)
            .with_context(|| format!("parse token file {}", self.path.display()))?;
        Ok(Some(stored.access_token))
    }

    async fn set(&self, token: &AccessToken) -> eyre::Result<()> {
        let json = serde_json::to_string(&StoredToken {
            access_token: token.clone(),
        })
        .context("serialize access token")?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("write token file {}", self.path.display()))
    }

    async fn clear(&self) -> eyre::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("remove token file {}", self.path.display()))
            }
            _ => Ok(()),
        }
    }
}

/// Response body of the token-issuing endpoint.
///
/// Every field is optional: a body without `access_token` is a soft failure, not a parse error.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<AccessToken>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<Vec<String>>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Obtains app access tokens through the client-credentials grant and persists them.
///
/// Token requests go straight to the transport and never through the Helix auth interceptor,
/// so a rejected token request cannot itself trigger another refresh.
#[derive(Debug)]
pub struct TokenService<T> {
    transport: Arc<T>,
    store: Arc<dyn TokenStore>,
    token_url: Url,
    client_id: ClientId,
}

impl<T> TokenService<T> {
    pub fn new(
        transport: Arc<T>,
        store: Arc<dyn TokenStore>,
        token_url: Url,
        client_id: ClientId,
    ) -> Self {
        Self {
            transport,
            store,
            token_url,
            client_id,
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// The token currently in the store, if any.
    pub async fn current_token(&self) -> eyre::Result<Option<AccessToken>> {
        self.store.get().await.context("read stored access token")
    }

    /// Seeds the store with a token obtained out-of-band.
    pub async fn set_token(&self, token: AccessToken) -> eyre::Result<()> {
        tracing::debug!("storing externally provided access token");
        self.store.set(&token).await.context("store access token")
    }
}

impl<T: Transport> TokenService<T> {
    /// Requests a fresh app access token and writes it to the store.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(token))` - a new token was issued and stored
    /// * `Ok(None)` - the endpoint answered without a token; the store is left untouched
    /// * `Err(_)` - network failure, non-success status, or an unparseable body
    #[instrument(skip(self), fields(token_url = %self.token_url))]
    pub async fn refresh_token(&self) -> eyre::Result<Option<AccessToken>> {
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", self.client_id.as_str())
            .append_pair("grant_type", "client_credentials")
            .finish();
        let request = HttpRequest::post(self.token_url.clone(), body).header(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );

        let response = self
            .transport
            .send(request.clone())
            .await
            .context("request client-credentials token")?;
        if !response.status.is_success() {
            return Err(ApiError::from_response(&request, &response).into());
        }

        let token: TokenResponse = response
            .json()
            .context("parse token endpoint response")?;
        let Some(access_token) = token.access_token else {
            tracing::warn!("token endpoint response carried no access token");
            return Ok(None);
        };

        tracing::debug!(
            expires_in = token.expires_in,
            token_type = token.token_type.as_deref(),
            scopes = token.scope.as_ref().map_or(0, Vec::len),
            "obtained client-credentials token"
        );
        self.store
            .set(&access_token)
            .await
            .context("persist refreshed access token")?;
        Ok(Some(access_token))
    }
}
