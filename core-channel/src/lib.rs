//! # Core Channel Module
//!
//! The persistent real-time connection carrying chat, viewer counts and
//! gifts.
//!
//! - [`ChannelManager`]: one socket at a time, exponential-backoff
//!   reconnection, one handler per inbound message type
//! - [`protocol`]: JSON frames with a `type` discriminator
//! - [`ReconnectPolicy`]: attempt ceiling and delay schedule
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use core_channel::{ChannelConfig, ChannelManager, ClientMessage, ServerMessage, ServerMessageKind};
//! use core_runtime::{EventBus, Origin};
//! # fn connector() -> Arc<dyn bridge_traits::SocketConnector> { unimplemented!() }
//!
//! let origin = Origin::parse("https://live.example.com").unwrap();
//! let channel = ChannelManager::new(ChannelConfig::default(), &origin, connector(), EventBus::default());
//!
//! channel.on_message(ServerMessageKind::ViewerCountUpdate, |message| {
//!     if let ServerMessage::ViewerCountUpdate(update) = message {
//!         println!("{} watching", update.count);
//!     }
//! });
//! channel.connect();
//! // Later, once open:
//! channel.send(&ClientMessage::join_stream("42"));
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod manager;
pub mod protocol;

pub use backoff::ReconnectPolicy;
pub use config::ChannelConfig;
pub use core_runtime::events::ChannelState;
pub use error::{ChannelError, Result};
pub use manager::{ChannelManager, MessageHandler};
pub use protocol::{
    ChatMessage, ClientMessage, GiftSent, ServerMessage, ServerMessageKind, ViewerCountUpdate,
};
