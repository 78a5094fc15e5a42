//! Command dispatcher.
//!
//! Routes an authorized inbound command to poll creation, poll closing, or
//! an informational reply. Input passes a full-grammar regex gate first, so
//! the individual handlers only deal with shape-valid commands.

use std::sync::Arc;

use regex::Regex;
use tracing::{error, info, warn};

use crate::channels::{ChatPlatform, Embed, IncomingCommand, MessageContent};
use crate::poll::{self, Poll, PollError};
use crate::store::{PollStore, StoreError};

pub mod args;
pub mod timespec;

use args::parse_args;
use timespec::{parse_time, TimeSpecError};

/// How many times to re-roll a colliding poll id before giving up.
const ID_RETRIES: usize = 8;

/// Errors from handling one command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Malformed input; the message is replied verbatim to the requester.
    #[error("{0}")]
    UserInput(String),

    /// Nonexistent, already-finished, or cross-guild poll reference.
    #[error("Cannot find the poll.")]
    PollNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PollError> for CommandError {
    fn from(e: PollError) -> Self {
        CommandError::UserInput(e.to_string())
    }
}

impl From<TimeSpecError> for CommandError {
    fn from(e: TimeSpecError) -> Self {
        CommandError::UserInput(e.to_string())
    }
}

/// Command dispatcher: the single entry point for inbound chat commands.
pub struct Dispatcher {
    store: Arc<PollStore>,
    platform: Arc<dyn ChatPlatform>,
    prefix: String,
    invite_link: Option<String>,
    syntax: Regex,
}

impl Dispatcher {
    pub fn new(
        store: Arc<PollStore>,
        platform: Arc<dyn ChatPlatform>,
        prefix: impl Into<String>,
        invite_link: Option<String>,
    ) -> Self {
        let prefix = prefix.into();
        // Grammar: [time=<N><unit>] "<question>" ["<option>"...]{up to 11
        // quoted spans} | end <id> | help | examples | invite
        let pattern = format!(
            "^{}\\s(((time=\\d+([smhd]?\\s))?(\"[^\"\\n]+\"\\s?){{1,11}})|(help)|(examples)|(end\\s\\d+)|(invite))$",
            regex::escape(&prefix)
        );
        let syntax = Regex::new(&pattern).expect("command syntax regex");
        Self {
            store,
            platform,
            prefix,
            invite_link,
            syntax,
        }
    }

    /// Handle one inbound command end to end.
    ///
    /// Recoverable errors are reported to the requester; store and platform
    /// failures are logged. Nothing here takes down the caller's loop.
    pub async fn handle(&self, cmd: &IncomingCommand) {
        if !cmd.content.starts_with(&self.prefix) {
            return;
        }

        if !self.syntax.is_match(&cmd.content) {
            self.reply(
                cmd,
                &format!(
                    "Wrong command syntax. Learn how to do it correctly with `{} help`",
                    self.prefix
                ),
            )
            .await;
            return;
        }

        let args = parse_args(&cmd.content, &self.prefix);
        let Some(first) = args.first() else {
            self.reply(cmd, "Sorry, give me at least a question").await;
            return;
        };

        info!(command = %first, author = %cmd.author_tag, guild = ?cmd.guild_id, "command received");

        let result = match first.as_str() {
            "help" => self.send_help(cmd).await,
            "examples" => self.send_examples(cmd).await,
            "invite" => self.send_invite(cmd).await,
            // Guild-scoped commands are ignored in DMs.
            "end" if cmd.is_dm() => Ok(()),
            "end" => self.close_poll(cmd, &args).await,
            _ if cmd.is_dm() => Ok(()),
            _ => self.create_poll(cmd, args).await,
        };

        match result {
            Ok(()) => {}
            Err(e @ (CommandError::UserInput(_) | CommandError::PollNotFound)) => {
                self.reply(cmd, &e.to_string()).await;
            }
            Err(CommandError::Store(e)) => {
                error!(author = %cmd.author_tag, error = %e, "store failure while handling command");
            }
        }
    }

    async fn create_poll(
        &self,
        cmd: &IncomingCommand,
        mut args: Vec<String>,
    ) -> Result<(), CommandError> {
        let duration_ms = parse_time(&mut args)?;

        let mut rest = args.into_iter();
        let question = rest
            .next()
            .ok_or_else(|| CommandError::UserInput("Sorry, give me at least a question".into()))?;
        let answers: Vec<String> = rest.collect();

        let guild_id = cmd.guild_id.clone().unwrap_or_default();
        let id = self.fresh_id().await?;
        let poll = Poll::create(id, guild_id, &cmd.channel_id, question, answers, duration_ms)?;

        poll.start(&*self.platform).await;

        // An immediately-finished poll (malformed start) is never persisted.
        if !poll.has_finished {
            info!(poll_id = poll.id, timed = poll.is_timed, "poll created");
            self.store.insert(poll).await?;
        }
        Ok(())
    }

    async fn close_poll(&self, cmd: &IncomingCommand, args: &[String]) -> Result<(), CommandError> {
        let id: u64 = args
            .get(1)
            .and_then(|s| s.parse().ok())
            .ok_or(CommandError::PollNotFound)?;
        let guild_id = cmd.guild_id.as_deref().unwrap_or_default();

        let poll = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(CommandError::PollNotFound)?;
        if poll.has_finished || poll.guild_id != guild_id {
            return Err(CommandError::PollNotFound);
        }

        // Removal arbitrates the race with the expiration sweep: only the
        // caller that actually removed the record runs the finish.
        match self.store.remove_by_id(id).await? {
            Some(mut poll) => {
                info!(poll_id = poll.id, "poll closed on request");
                poll.finish(&*self.platform).await;
                Ok(())
            }
            None => Err(CommandError::PollNotFound),
        }
    }

    /// Generate a poll id that does not collide with a stored one.
    async fn fresh_id(&self) -> Result<u64, CommandError> {
        let mut id = poll::generate_id();
        for _ in 0..ID_RETRIES {
            if self.store.find_by_id(id).await?.is_none() {
                return Ok(id);
            }
            warn!(poll_id = id, "poll id collision, regenerating");
            id = poll::generate_id();
        }
        Err(StoreError::DuplicateId(id).into())
    }

    async fn send_help(&self, cmd: &IncomingCommand) -> Result<(), CommandError> {
        let embed = help_embed(&self.prefix);
        self.dm(cmd, MessageContent::Embed(embed)).await;
        self.dm(cmd, MessageContent::Text(HELP_NOTES.to_string())).await;
        Ok(())
    }

    async fn send_examples(&self, cmd: &IncomingCommand) -> Result<(), CommandError> {
        let embed = examples_embed(&self.prefix);
        self.dm(cmd, MessageContent::Embed(embed)).await;
        Ok(())
    }

    async fn send_invite(&self, cmd: &IncomingCommand) -> Result<(), CommandError> {
        let text = match &self.invite_link {
            Some(link) => format!("This is the link to invite me to another server! {link}"),
            None => "The invite link is not available at the moment.".to_string(),
        };
        self.reply(cmd, &text).await;
        Ok(())
    }

    async fn reply(&self, cmd: &IncomingCommand, text: &str) {
        if let Err(e) = self.platform.reply(&cmd.channel_id, text).await {
            warn!(channel = %cmd.channel_id, error = %e, "failed to send reply");
        }
    }

    async fn dm(&self, cmd: &IncomingCommand, content: MessageContent) {
        if let Err(e) = self.platform.direct_message(&cmd.author_id, content).await {
            warn!(user = %cmd.author_id, error = %e, "failed to send direct message");
        }
    }
}

/// Embed color shared by the informational embeds.
const EMBED_COLOR: u32 = 0x00DD_A0DD;

fn help_embed(prefix: &str) -> Embed {
    Embed::new()
        .with_title("VotaBot's commands")
        .field("Create a Y/N poll", format!("`{prefix} \"Question\"`"))
        .field(
            "Create a complex poll [2-10 answers]",
            format!(
                "`{prefix} \"Question\" \"Option 1\" \"Option 2\" [\"Option 3\" ...]` (quotes are necessary)"
            ),
        )
        .field(
            "Timed polls that close automatically",
            format!(
                "`{prefix} time=X{{s|m|h|d}} ...`, where X is the time to finish the poll followed by its unit."
            ),
        )
        .field(
            "See the results of a poll and close the voting",
            format!("`{prefix} end ID`, where ID appears at the end of the poll"),
        )
        .field("See examples", format!("`{prefix} examples`"))
        .with_color(EMBED_COLOR)
}

fn examples_embed(prefix: &str) -> Embed {
    Embed::new()
        .with_title("Examples of VotaBot's commands")
        .field("Y/N poll", format!("`{prefix} \"Do you like this?\"`"))
        .field(
            "Complex poll",
            format!("`{prefix} \"What do you wanna play?\" \"Overwatch\" \"CS:GO\" \"Quake\" \"WoW\"`"),
        )
        .field("Timed poll", format!("`{prefix} time=6h \"Chat tonight?\"`"))
        .field("See the results of a poll", format!("`{prefix} end 61342378`"))
        .with_color(EMBED_COLOR)
}

/// Plain-text notes sent alongside the help embed.
const HELP_NOTES: &str = "**Things to know**
- Only administrators or people with a role named \"Poll Creator\" can interact with me.
- Polls are only stored for a week; you can't retrieve the results of an older poll (this also applies to timed polls).
- Use \" not two '.
- There is a 10 second max error for timed polls.";
