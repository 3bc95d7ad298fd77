//! Live channel demonstration
//!
//! Connects to a live server, joins a stream and prints what arrives until
//! Ctrl-C.
//!
//! Run with:
//! ```bash
//! cargo run -p core-service --example channel_demo -- http://localhost:3000 42
//!
//! # JSON logs
//! cargo run -p core-service --example channel_demo -- http://localhost:3000 42 json
//! ```

use anyhow::Context;
use bridge_traits::time::LogLevel;
use core_channel::{ChannelState, ClientMessage, ServerMessage, ServerMessageKind};
use core_media::MediaCategory;
use core_runtime::events::CoreEvent;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::CoreConfig;
use core_service::{CoreService, ServiceConfig};
use std::env;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let origin = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| "http://localhost:3000".to_string());
    let stream_id = args.get(2).cloned().unwrap_or_else(|| "demo".to_string());
    let format = match args.get(3).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        _ => LogFormat::Pretty,
    };

    init_logging(
        LoggingConfig::default()
            .with_format(format)
            .with_level(LogLevel::Debug),
    )?;

    let core = CoreConfig::builder()
        .origin(&origin)
        .data_dir(env::temp_dir().join("live-core-demo"))
        .build()
        .context("building core config")?;
    let service = CoreService::init(ServiceConfig::new(core)).await?;

    info!(
        cover = %service.resolve_media("/api/media/uploads/cover.jpg", MediaCategory::Covers),
        "Media resolves under the canonical prefix"
    );

    let channel = service.channel();
    channel.on_message(ServerMessageKind::ViewerCountUpdate, |message| {
        if let ServerMessage::ViewerCountUpdate(update) = message {
            println!("[{}] {} watching", update.stream_id, update.count);
        }
    });
    channel.on_message(ServerMessageKind::ChatMessage, |message| {
        if let ServerMessage::ChatMessage(chat) = message {
            println!("[{}] {}: {}", chat.stream_id, chat.username, chat.message);
        }
    });
    channel.on_message(ServerMessageKind::GiftSent, |message| {
        if let ServerMessage::GiftSent(gift) = message {
            println!(
                "[{}] {} sent {} x{}",
                gift.stream_id, gift.sender_name, gift.gift_name, gift.quantity
            );
        }
    });

    // Rejoin every time the channel (re)opens; nothing is replayed across
    // reconnects.
    let mut states = channel.state_changes();
    let rejoin_channel = channel.clone();
    let rejoin_stream = stream_id.clone();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            if state == ChannelState::Open
                && !rejoin_channel.send(&ClientMessage::join_stream(&rejoin_stream))
            {
                warn!("Join request could not be sent");
            }
        }
    });

    let mut events = service.subscribe_events().channel();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let CoreEvent::Channel(event) = event {
                info!(?event, "Channel event");
            }
        }
    });

    channel.connect();
    tokio::signal::ctrl_c().await?;

    channel.send(&ClientMessage::leave_stream(&stream_id));
    service.dispose();
    Ok(())
}
