//! Twitch integration for the video widget: channel search, archived and live videos, and the
//! bootstrap for Twitch's embedded player.

pub mod bridge;
pub mod config;
pub mod duration;
pub mod helix;
pub mod model;
pub mod player;
pub mod queries;
pub mod runtime;
pub mod token;
pub mod transport;

#[cfg(test)]
mod testing;

pub use bridge::{Bridge, HostApplication, HostMessage, UiMessage};
pub use config::{ChannelAddressing, Config};
pub use queries::TwitchQueries;
pub use runtime::{Outbox, Runtime};
