//! Chat platform boundary.
//!
//! The bot core treats the chat platform as an opaque collaborator: it can
//! post a poll's initial message, post final results, reply in a channel,
//! and send direct messages. Inbound commands arrive as [`IncomingCommand`]
//! events produced by the platform adapter.

use async_trait::async_trait;

use crate::poll::Poll;

pub mod discord;

/// Result type for platform operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur talking to the chat platform.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Message send failed: {0}")]
    SendFailed(String),
}

/// A rich message payload; rendering is platform-specific.
#[derive(Debug, Clone, Default)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
    pub color: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }
}

/// Outbound message content for direct messages.
#[derive(Debug, Clone)]
pub enum MessageContent {
    Text(String),
    Embed(Embed),
}

/// An inbound command event from the platform adapter.
///
/// The adapter (or the gateway feeding it) is responsible for the permission
/// check: only authorized commands reach the dispatcher.
#[derive(Debug, Clone)]
pub struct IncomingCommand {
    /// Guild the command was issued in; `None` for direct messages.
    pub guild_id: Option<String>,
    /// Channel to reply into.
    pub channel_id: String,
    /// Requester's user id.
    pub author_id: String,
    /// Display tag for logging.
    pub author_tag: String,
    /// Raw message text including the command prefix.
    pub content: String,
}

impl IncomingCommand {
    /// Whether this command arrived over a direct message.
    pub fn is_dm(&self) -> bool {
        self.guild_id.is_none()
    }
}

/// Outbound side of the chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Post a poll's initial message into its channel.
    async fn post_poll(&self, poll: &Poll) -> ChannelResult<()>;

    /// Post a poll's final tally into its channel.
    async fn post_results(&self, poll: &Poll, tally: &[u64]) -> ChannelResult<()>;

    /// Send a plain text reply into a channel.
    async fn reply(&self, channel_id: &str, text: &str) -> ChannelResult<()>;

    /// Send a direct message to a user.
    async fn direct_message(&self, user_id: &str, content: MessageContent) -> ChannelResult<()>;
}
