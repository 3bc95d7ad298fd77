//! Service-level configuration.

use std::fmt;
use std::sync::Arc;

use bridge_traits::media::MediaLoader;
use core_channel::ChannelConfig;
use core_media::MediaConfig;
use core_runtime::CoreConfig;
use core_session::SessionConfig;

use crate::error::Result;

/// Bridges plus per-module settings for [`CoreService`](crate::CoreService).
#[derive(Clone)]
pub struct ServiceConfig {
    pub core: CoreConfig,
    pub channel: ChannelConfig,
    pub media: MediaConfig,
    pub session: SessionConfig,
    /// Loader for media handles. Defaults to an HTTP loader over
    /// `core.http_client`.
    pub media_loader: Option<Arc<dyn MediaLoader>>,
}

impl ServiceConfig {
    pub fn new(core: CoreConfig) -> Self {
        Self {
            core,
            channel: ChannelConfig::default(),
            media: MediaConfig::default(),
            session: SessionConfig::default(),
            media_loader: None,
        }
    }

    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_media(mut self, media: MediaConfig) -> Self {
        self.media = media;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn with_media_loader(mut self, loader: Arc<dyn MediaLoader>) -> Self {
        self.media_loader = Some(loader);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.core.validate()?;
        self.channel.validate()?;
        self.media.validate()?;
        self.session.validate()?;
        Ok(())
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("core", &self.core)
            .field("channel", &self.channel)
            .field("media", &self.media)
            .field("session", &self.session)
            .field(
                "media_loader",
                &self.media_loader.as_ref().map(|_| "<MediaLoader>"),
            )
            .finish()
    }
}
