//! Typed access to the subset of the Twitch Helix API the widget uses.

pub mod channels;
pub mod client;
pub mod retry;
pub mod streams;
pub mod types;
pub mod users;
pub mod videos;

pub use client::{CLIENT_ID_HEADER, HelixClient};
pub use retry::AuthRetry;
pub use types::HelixResponse;
