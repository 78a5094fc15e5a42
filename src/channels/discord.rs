//! Discord channel implementation.
//!
//! Outbound side of the chat platform via the Discord REST API: poll
//! messages, result embeds, replies, and DMs. The websocket gateway that
//! produces inbound events is external; whoever drives it feeds raw
//! MESSAGE_CREATE payloads through [`DiscordChannel::dispatch_inbound`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use super::{ChannelError, ChannelResult, ChatPlatform, Embed, IncomingCommand, MessageContent};
use crate::poll::{Poll, PollKind};

/// Discord channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token from the Discord Developer Portal.
    #[serde(default)]
    pub bot_token: String,
    /// Maximum message length.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

fn default_max_message_length() -> usize {
    2000
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            max_message_length: default_max_message_length(),
        }
    }
}

/// Discord channel struct.
pub struct DiscordChannel {
    config: DiscordConfig,
    client: reqwest::Client,
    http_url: String,
    event_tx: mpsc::Sender<IncomingCommand>,
}

impl DiscordChannel {
    /// Create a new Discord channel. Inbound commands parsed from gateway
    /// payloads are forwarded over `event_tx`.
    pub fn new(config: DiscordConfig, event_tx: mpsc::Sender<IncomingCommand>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("reqwest client");

        Self {
            config,
            client,
            http_url: "https://discord.com/api/v10".to_string(),
            event_tx,
        }
    }

    /// Send a request to the Discord API.
    async fn api_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ChannelError> {
        let mut request = self
            .client
            .request(method, format!("{}/{}", self.http_url, endpoint))
            .header("Authorization", format!("Bot {}", self.config.bot_token));

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChannelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ChannelError::Api(error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ChannelError::Parse(e.to_string()))
    }

    /// Verify the bot token against the API.
    pub async fn connect(&self) -> ChannelResult<()> {
        info!("connecting to Discord");
        let me: DiscordUserResponse = self
            .api_request(reqwest::Method::GET, "users/@me", None)
            .await
            .map_err(|e| ChannelError::Authentication(e.to_string()))?;
        info!(user_id = %me.id, username = %me.username, "Discord connected");
        Ok(())
    }

    /// Parse a gateway MESSAGE_CREATE payload into an [`IncomingCommand`]
    /// and forward it to the event channel. Bot-authored messages are
    /// dropped.
    pub async fn dispatch_inbound(&self, payload: &serde_json::Value) -> ChannelResult<()> {
        let author = payload
            .get("author")
            .ok_or_else(|| ChannelError::Parse("missing author".into()))?;
        if author.get("bot").and_then(|b| b.as_bool()).unwrap_or(false) {
            return Ok(());
        }

        let author_id = json_str(author, "id")?;
        let username = json_str(author, "username").unwrap_or_default();
        let command = IncomingCommand {
            guild_id: payload
                .get("guild_id")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            channel_id: json_str(payload, "channel_id")?,
            author_id,
            author_tag: username,
            content: json_str(payload, "content")?,
        };

        self.event_tx
            .send(command)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn send_to_channel(
        &self,
        channel_id: &str,
        content: &str,
        embed: Option<&Embed>,
    ) -> ChannelResult<()> {
        let mut content = content.to_string();
        truncate_on_char_boundary(&mut content, self.config.max_message_length);

        let mut body = serde_json::json!({ "content": content });
        if let Some(embed) = embed {
            body["embeds"] = serde_json::json!([embed_to_json(embed)]);
        }

        let message: DiscordMessageResponse = self
            .api_request(
                reqwest::Method::POST,
                &format!("channels/{channel_id}/messages"),
                Some(body),
            )
            .await?;
        tracing::debug!(channel = %channel_id, message_id = %message.id, "message sent");
        Ok(())
    }

    /// Open (or reuse) the DM channel with a user, returning its id.
    async fn dm_channel(&self, user_id: &str) -> ChannelResult<String> {
        let body = serde_json::json!({ "recipient_id": user_id });
        let channel: DiscordChannelResponse = self
            .api_request(reqwest::Method::POST, "users/@me/channels", Some(body))
            .await?;
        Ok(channel.id)
    }
}

/// Truncate `text` to at most `max` bytes without splitting a character.
fn truncate_on_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

fn json_str(value: &serde_json::Value, key: &str) -> Result<String, ChannelError> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ChannelError::Parse(format!("missing field '{key}'")))
}

#[async_trait]
impl ChatPlatform for DiscordChannel {
    async fn post_poll(&self, poll: &Poll) -> ChannelResult<()> {
        let embed = render_poll(poll);
        self.send_to_channel(&poll.channel_id, "", Some(&embed)).await
    }

    async fn post_results(&self, poll: &Poll, tally: &[u64]) -> ChannelResult<()> {
        let embed = render_results(poll, tally);
        self.send_to_channel(&poll.channel_id, "", Some(&embed)).await
    }

    async fn reply(&self, channel_id: &str, text: &str) -> ChannelResult<()> {
        self.send_to_channel(channel_id, text, None).await
    }

    async fn direct_message(&self, user_id: &str, content: MessageContent) -> ChannelResult<()> {
        let dm = self.dm_channel(user_id).await?;
        match content {
            MessageContent::Text(text) => self.send_to_channel(&dm, &text, None).await,
            MessageContent::Embed(embed) => self.send_to_channel(&dm, "", Some(&embed)).await,
        }
    }
}

/// Marker emojis for multi-option polls, in option order.
const OPTION_EMOJIS: [&str; 10] = ["🇦", "🇧", "🇨", "🇩", "🇪", "🇫", "🇬", "🇭", "🇮", "🇯"];

/// Label for option `index` as it appears in poll and result messages.
fn option_marker(kind: PollKind, index: usize) -> &'static str {
    match kind {
        PollKind::YesNo => {
            if index == 0 {
                "👍"
            } else {
                "👎"
            }
        }
        PollKind::Multi => OPTION_EMOJIS.get(index).copied().unwrap_or("▫️"),
    }
}

/// Render a poll's initial message.
pub fn render_poll(poll: &Poll) -> Embed {
    let mut embed = Embed::new().with_title(poll.question.clone());
    let lines: Vec<String> = poll
        .options
        .iter()
        .enumerate()
        .map(|(i, opt)| format!("{} {}", option_marker(poll.kind, i), opt))
        .collect();
    embed = embed.with_description(lines.join("\n"));

    if poll.is_timed {
        embed = embed.field("Closes", format!("<t:{}:R>", poll.finish_time / 1000));
    }
    embed.with_footer(format!("Poll ID: {}", poll.id))
}

/// Render a poll's final tally.
pub fn render_results(poll: &Poll, tally: &[u64]) -> Embed {
    let total: u64 = tally.iter().sum();
    let lines: Vec<String> = poll
        .options
        .iter()
        .zip(tally)
        .enumerate()
        .map(|(i, (opt, count))| {
            format!("{} {} — {} vote(s)", option_marker(poll.kind, i), opt, count)
        })
        .collect();

    Embed::new()
        .with_title(format!("Results: {}", poll.question))
        .with_description(lines.join("\n"))
        .field("Total votes", total.to_string())
        .with_footer(format!("Poll ID: {}", poll.id))
}

fn embed_to_json(embed: &Embed) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = embed
        .fields
        .iter()
        .map(|f| serde_json::json!({ "name": f.name, "value": f.value }))
        .collect();

    let mut json = serde_json::json!({ "fields": fields });
    if let Some(title) = &embed.title {
        json["title"] = serde_json::json!(title);
    }
    if let Some(description) = &embed.description {
        json["description"] = serde_json::json!(description);
    }
    if let Some(footer) = &embed.footer {
        json["footer"] = serde_json::json!({ "text": footer });
    }
    if let Some(color) = embed.color {
        json["color"] = serde_json::json!(color);
    }
    json
}

// Discord API response types
#[derive(Debug, Deserialize)]
struct DiscordUserResponse {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct DiscordMessageResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DiscordChannelResponse {
    id: String,
}
