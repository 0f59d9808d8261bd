//! Newline-delimited JSON runtime connecting the bridge to a host process.
//!
//! Each input line is one [`Inbound`] envelope; every reply and notification is written as one
//! [`Outbound`] envelope per line. Envelopes are dispatched concurrently, so a slow call does not
//! hold up the ones behind it; replies carry the call id and may arrive in any order. A
//! `setToken` envelope is applied before any later line is read.

use crate::bridge::{Bridge, HostApplication, HostMessage, UiMessage};
use crate::player::{ParentFrame, Player, PlayerEvent, PlayerOptions};
use crate::queries::TwitchQueries;
use crate::transport::Transport;
use eyre::Context;
use oauth2::AccessToken;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Inbound {
    /// Invoke a named bridge method.
    Call {
        id: u64,
        method: String,
        #[serde(default)]
        params: Value,
    },
    /// A message from the UI frame.
    UiMessage { message: UiMessage },
    /// Seed the token store.
    SetToken { token: AccessToken },
    /// Bootstrap the player for a page query string, optionally delivering a player event.
    Player {
        query: String,
        #[serde(default)]
        event: Option<PlayerEvent>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Outbound {
    Result {
        id: u64,
        result: Value,
    },
    /// `id` is absent when the failing line could not be parsed far enough to find one.
    Error {
        id: Option<u64>,
        message: String,
    },
    EndVideo,
    UiMessage {
        message: HostMessage,
    },
    PlayerOptions {
        options: PlayerOptions,
    },
    /// A message the player page posts to the frame embedding it.
    ParentMessage {
        message: UiMessage,
    },
}

/// Serializes outbound envelopes onto a shared writer.
#[derive(Debug)]
pub struct Outbox<W> {
    writer: Arc<Mutex<W>>,
}

impl<W> Clone for Outbox<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> Outbox<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    pub async fn send(&self, envelope: &Outbound) -> eyre::Result<()> {
        let mut json = serde_json::to_vec(envelope).context("serialize outbound envelope")?;
        tracing::trace!(json = %String::from_utf8_lossy(&json), "send");
        json.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&json)
            .await
            .context("write outbound envelope")?;
        writer.flush().await.context("flush outbound envelope")
    }
}

impl<W: AsyncWrite + Unpin + Send> HostApplication for Outbox<W> {
    async fn end_video(&self) -> eyre::Result<()> {
        self.send(&Outbound::EndVideo).await
    }

    async fn post_ui_message(&self, message: HostMessage) -> eyre::Result<()> {
        self.send(&Outbound::UiMessage { message }).await
    }
}

impl<W: AsyncWrite + Unpin + Send> ParentFrame for Outbox<W> {
    async fn post_message(&self, message: UiMessage) -> eyre::Result<()> {
        self.send(&Outbound::ParentMessage { message }).await
    }
}

#[derive(Debug)]
pub struct Runtime<T, W> {
    bridge: Bridge<T, Outbox<W>>,
    player_parents: Vec<String>,
}

impl<T: Transport, W: AsyncWrite + Unpin + Send> Runtime<T, W> {
    pub fn new(queries: TwitchQueries<T>, outbox: Outbox<W>, player_parents: Vec<String>) -> Self {
        Self {
            bridge: Bridge::new(queries, outbox),
            player_parents,
        }
    }

    fn outbox(&self) -> &Outbox<W> {
        self.bridge.host()
    }

    /// Handles envelopes from `reader` until it reaches end of input, then waits for the
    /// envelopes still in flight.
    ///
    /// Failures of individual envelopes are reported as `error` envelopes; only a failure to
    /// read input or write output ends the loop early.
    pub async fn run<R: AsyncBufRead + Unpin>(self: Arc<Self>, reader: R) -> eyre::Result<()>
    where
        T: 'static,
        W: 'static,
    {
        tracing::info!("widget runtime started");
        let mut pending = JoinSet::new();
        let mut lines = reader.lines();
        while let Some(line) = lines
            .next_line()
            .await
            .context("read envelope from host")?
        {
            if line.trim().is_empty() {
                continue;
            }
            match self.parse(&line).await? {
                None => {}
                // later calls must see the new token
                Some(inbound @ Inbound::SetToken { .. }) => self.dispatch(inbound).await?,
                Some(inbound) => {
                    let runtime = Arc::clone(&self);
                    pending.spawn(async move { runtime.dispatch(inbound).await });
                }
            }
            while let Some(done) = pending.try_join_next() {
                done.context("envelope task failed")??;
            }
        }

        tracing::info!(
            in_flight = pending.len(),
            "host closed input, finishing pending envelopes"
        );
        while let Some(done) = pending.join_next().await {
            done.context("envelope task failed")??;
        }
        Ok(())
    }

    /// Handles a single envelope to completion. Only errors writing the reply are returned.
    pub async fn handle_line(&self, line: &str) -> eyre::Result<()> {
        match self.parse(line).await? {
            Some(inbound) => self.dispatch(inbound).await,
            None => Ok(()),
        }
    }

    /// Parses one line, answering with an `error` envelope if it is not a valid envelope.
    async fn parse(&self, line: &str) -> eyre::Result<Option<Inbound>> {
        let e = match serde_json::from_str(line) {
            Ok(inbound) => return Ok(Some(inbound)),
            Err(e) => e,
        };
        tracing::warn!(error = %e, "ignoring unparseable envelope");
        // still answer a call we can identify, so the host does not wait forever
        let id = serde_json::from_str::<Value>(line)
            .ok()
            .and_then(|v| v.get("id").and_then(Value::as_u64));
        self.outbox()
            .send(&Outbound::Error {
                id,
                message: format!("invalid envelope: {e}"),
            })
            .await?;
        Ok(None)
    }

    async fn dispatch(&self, inbound: Inbound) -> eyre::Result<()> {
        tracing::trace!(?inbound, "recv");
        let (id, outcome) = match inbound {
            Inbound::Call { id, method, params } => {
                match self.bridge.call(&method, params).await {
                    Ok(result) => {
                        return self.outbox().send(&Outbound::Result { id, result }).await;
                    }
                    Err(e) => (Some(id), Err(e)),
                }
            }
            Inbound::UiMessage { message } => (None, self.bridge.on_ui_message(message).await),
            Inbound::SetToken { token } => (None, self.bridge.set_token(token).await),
            Inbound::Player { query, event } => (None, self.player(&query, event).await),
        };

        if let Err(e) = outcome {
            tracing::warn!(?id, error = %format!("{e:#}"), "envelope failed");
            self.outbox()
                .send(&Outbound::Error {
                    id,
                    message: format!("{e:#}"),
                })
                .await?;
        }
        Ok(())
    }

    async fn player(&self, query: &str, event: Option<PlayerEvent>) -> eyre::Result<()> {
        let player = Player::bootstrap(query, &self.player_parents)
            .ok_or_else(|| eyre::eyre!("query {query:?} names nothing to play"))?;
        match event {
            None => {
                self.outbox()
                    .send(&Outbound::PlayerOptions {
                        options: player.options().clone(),
                    })
                    .await
            }
            Some(event) => {
                player.handle_event(event, self.outbox()).await?;
                Ok(())
            }
        }
    }
}
