//! The HTTP seam between the Twitch clients and the network.
//!
//! Everything above this module talks to a [`Transport`], which sends one request and hands back
//! the status code and raw body. The production implementation is [`ReqwestTransport`]; tests
//! substitute a scripted transport so that token refreshes and retries can be counted exactly.

use bytes::Bytes;
use eyre::Context;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::instrument;

/// A single outbound HTTP request.
///
/// Requests are plain data so they can be cloned and replayed verbatim after a token refresh.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn post(url: Url, body: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: HeaderMap::new(),
            body: Some(body.into()),
        }
    }

    /// Sets `name` to `value`, replacing any earlier value for that header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// The status and body of a response, before any interpretation.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    /// Parses the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> eyre::Result<T> {
        serde_json::from_slice(&self.body).context("parse response body as JSON")
    }

    /// The body as text, for error messages.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// An upstream endpoint answered with a non-success status.
///
/// This is kept as a typed error (rather than a bare report) so callers can downcast and branch
/// on the status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{method} {url} failed with status {status}: {body}")]
    Status {
        method: Method,
        url: Url,
        status: StatusCode,
        body: String,
    },
}

impl ApiError {
    pub fn from_response(request: &HttpRequest, response: &HttpResponse) -> Self {
        Self::Status {
            method: request.method.clone(),
            url: request.url.clone(),
            status: response.status,
            body: response.text(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => *status,
        }
    }
}

/// Sends HTTP requests.
///
/// Implementations must only fail for transport-level problems (connection refused, broken
/// body, and so on). Any response that arrives, whatever its status, is returned as `Ok`.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest)
    -> impl Future<Output = eyre::Result<HttpResponse>> + Send;
}

/// [`Transport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url), level = tracing::Level::TRACE)]
    async fn send(&self, request: HttpRequest) -> eyre::Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("send {method} request to {url}"))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("read response body of {method} {url}"))?;

        tracing::trace!(%status, bytes = body.len(), "received response");
        Ok(HttpResponse { status, body })
    }
}
