//! Poll entity and lifecycle state machine.
//!
//! A poll is created in an open state (timed or untimed), accumulates votes
//! delivered by the chat platform, and transitions once to `finished`, at
//! which point results are posted and the record leaves the store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::channels::ChatPlatform;

/// One week in milliseconds, both the deadline ceiling for timed polls and
/// the retention window for stored records.
pub const WEEK_MS: i64 = 604_800_000;

/// Maximum number of answers a multi-option poll may carry.
pub const MAX_OPTIONS: usize = 10;

/// Errors raised by the validating constructor and vote recording.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("You cannot create a poll with only one answer")]
    OnlyOneAnswer,

    #[error("A poll can have at most {MAX_OPTIONS} answers")]
    TooManyAnswers,

    #[error("Poll has already finished")]
    AlreadyFinished,

    #[error("Invalid option index: {0}")]
    InvalidOption(usize),
}

/// Variant tag for the two poll shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollKind {
    /// Fixed two-option yes/no poll.
    YesNo,
    /// 2-10 caller-supplied answers.
    Multi,
}

/// A single poll: identity, options, votes, and timing.
///
/// This is the sole persisted entity. Records are only ever written to the
/// store after passing [`Poll::create`] validation, so deserializing a stored
/// record back into a `Poll` is trusted and skips re-validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    /// Numeric identifier, shown to users in the poll footer.
    pub id: u64,
    /// Guild (community) the poll belongs to; scopes close authorization.
    pub guild_id: String,
    /// Channel the poll message was posted in.
    pub channel_id: String,
    /// Question prompt.
    pub question: String,
    /// Ordered answer labels.
    pub options: Vec<String>,
    /// Voter id -> chosen option index. Re-voting replaces the entry, so a
    /// changed vote moves the tally instead of double counting.
    #[serde(default)]
    pub votes: HashMap<String, usize>,
    /// Poll shape.
    pub kind: PollKind,
    /// Whether the poll auto-closes at `finish_time`.
    pub is_timed: bool,
    /// Deadline in epoch ms; meaningless when `is_timed` is false.
    pub finish_time: i64,
    /// Creation timestamp in epoch ms, used for retention purging.
    pub created_on: i64,
    /// Terminal flag. Once set the poll must not be voted on or closed again.
    pub has_finished: bool,
}

impl Poll {
    /// Validating constructor for a user-requested poll.
    ///
    /// An empty answer list is the yes/no shortcut; exactly one answer is an
    /// explicit user error; otherwise 2-10 answers make a multi-option poll.
    /// `duration_ms` of zero means untimed; positive values are assumed
    /// already clamped to [`WEEK_MS`] by the time parser.
    pub fn create(
        id: u64,
        guild_id: impl Into<String>,
        channel_id: impl Into<String>,
        question: impl Into<String>,
        answers: Vec<String>,
        duration_ms: i64,
    ) -> Result<Self, PollError> {
        let (kind, options) = match answers.len() {
            0 => (PollKind::YesNo, vec!["Yes".to_string(), "No".to_string()]),
            1 => return Err(PollError::OnlyOneAnswer),
            n if n > MAX_OPTIONS => return Err(PollError::TooManyAnswers),
            _ => (PollKind::Multi, answers),
        };

        let created_on = now_millis();
        let is_timed = duration_ms > 0;

        Ok(Self {
            id,
            guild_id: guild_id.into(),
            channel_id: channel_id.into(),
            question: question.into(),
            options,
            votes: HashMap::new(),
            kind,
            is_timed,
            finish_time: if is_timed { created_on + duration_ms } else { 0 },
            created_on,
            has_finished: false,
        })
    }

    /// Record a vote, replacing any earlier vote by the same voter.
    pub fn record_vote(
        &mut self,
        voter_id: impl Into<String>,
        option_index: usize,
    ) -> Result<(), PollError> {
        if self.has_finished {
            return Err(PollError::AlreadyFinished);
        }
        if option_index >= self.options.len() {
            return Err(PollError::InvalidOption(option_index));
        }
        self.votes.insert(voter_id.into(), option_index);
        Ok(())
    }

    /// Per-option vote counts, in option order.
    pub fn tally(&self) -> Vec<u64> {
        let mut counts = vec![0u64; self.options.len()];
        for &choice in self.votes.values() {
            if let Some(slot) = counts.get_mut(choice) {
                *slot += 1;
            }
        }
        counts
    }

    /// Whether a timed poll's deadline has passed at time `now` (epoch ms).
    pub fn is_due(&self, now: i64) -> bool {
        self.is_timed && self.finish_time <= now
    }

    /// Post the initial poll message.
    pub async fn start(&self, platform: &dyn ChatPlatform) {
        if let Err(e) = platform.post_poll(self).await {
            warn!(poll_id = self.id, error = %e, "failed to post poll message");
        }
    }

    /// Finish transition: compute tallies, post final results, mark terminal.
    ///
    /// Not idempotent; callers must check `has_finished` before invoking.
    /// A platform failure is logged but does not block the transition.
    pub async fn finish(&mut self, platform: &dyn ChatPlatform) {
        let tally = self.tally();
        if let Err(e) = platform.post_results(self, &tally).await {
            warn!(poll_id = self.id, error = %e, "failed to post poll results");
        }
        self.has_finished = true;
    }
}

/// Generate a random 8-digit poll id.
///
/// Collisions are not prevented here; the dispatcher checks the store and
/// retries generation on conflict.
pub fn generate_id() -> u64 {
    let mut buf = [0u8; 8];
    if getrandom::fill(&mut buf).is_err() {
        // Entropy failure is effectively unreachable; clock bits keep ids
        // distinct enough for the retry loop to resolve.
        return 10_000_000 + (now_millis() as u64 % 90_000_000);
    }
    10_000_000 + (u64::from_le_bytes(buf) % 90_000_000)
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::testing::RecordingPlatform;

    #[test]
    fn create_yes_no_shortcut() {
        let poll = Poll::create(1, "g1", "c1", "Do you like this?", vec![], 0).unwrap();
        assert_eq!(poll.kind, PollKind::YesNo);
        assert_eq!(poll.options, vec!["Yes", "No"]);
        assert!(!poll.is_timed);
        assert!(!poll.has_finished);
    }

    #[test]
    fn create_single_answer_is_rejected() {
        let err = Poll::create(1, "g1", "c1", "Q?", vec!["only".into()], 0).unwrap_err();
        assert!(matches!(err, PollError::OnlyOneAnswer));
    }

    #[test]
    fn create_multi_preserves_option_order() {
        for k in 2..=MAX_OPTIONS {
            let answers: Vec<String> = (0..k).map(|i| format!("opt{i}")).collect();
            let poll = Poll::create(1, "g1", "c1", "Q?", answers.clone(), 0).unwrap();
            assert_eq!(poll.kind, PollKind::Multi);
            assert_eq!(poll.options, answers);
        }
    }

    #[test]
    fn create_too_many_answers_is_rejected() {
        let answers: Vec<String> = (0..11).map(|i| format!("opt{i}")).collect();
        let err = Poll::create(1, "g1", "c1", "Q?", answers, 0).unwrap_err();
        assert!(matches!(err, PollError::TooManyAnswers));
    }

    #[test]
    fn timed_poll_deadline() {
        let poll = Poll::create(1, "g1", "c1", "Q?", vec![], 90_000).unwrap();
        assert!(poll.is_timed);
        assert_eq!(poll.finish_time, poll.created_on + 90_000);
        assert!(!poll.is_due(poll.created_on));
        assert!(poll.is_due(poll.created_on + 90_000));
    }

    #[test]
    fn revote_moves_the_tally() {
        let mut poll = Poll::create(1, "g1", "c1", "Q?", vec![], 0).unwrap();
        poll.record_vote("alice", 0).unwrap();
        poll.record_vote("bob", 0).unwrap();
        assert_eq!(poll.tally(), vec![2, 0]);

        // A changed vote moves; nothing double counts.
        poll.record_vote("alice", 1).unwrap();
        assert_eq!(poll.tally(), vec![1, 1]);
    }

    #[test]
    fn vote_rejects_bad_index_and_finished_poll() {
        let mut poll = Poll::create(1, "g1", "c1", "Q?", vec![], 0).unwrap();
        assert!(matches!(
            poll.record_vote("alice", 5),
            Err(PollError::InvalidOption(5))
        ));

        poll.has_finished = true;
        assert!(matches!(
            poll.record_vote("alice", 0),
            Err(PollError::AlreadyFinished)
        ));
    }

    #[tokio::test]
    async fn finish_posts_results_and_marks_terminal() {
        let platform = RecordingPlatform::new();
        let mut poll = Poll::create(7, "g1", "c1", "Q?", vec![], 0).unwrap();
        poll.record_vote("alice", 0).unwrap();

        poll.finish(&platform).await;
        assert!(poll.has_finished);

        let results = platform.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0], (7, vec![1, 0]));
    }

    #[test]
    fn rehydration_round_trips_without_revalidation() {
        let mut poll = Poll::create(9, "g1", "c1", "Q?", vec!["a".into(), "b".into()], 0).unwrap();
        poll.record_vote("alice", 1).unwrap();

        let json = serde_json::to_string(&poll).unwrap();
        let back: Poll = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, 9);
        assert_eq!(back.options, poll.options);
        assert_eq!(back.votes.get("alice"), Some(&1));
    }

    #[test]
    fn generated_ids_are_eight_digits() {
        for _ in 0..100 {
            let id = generate_id();
            assert!((10_000_000..100_000_000).contains(&id), "id {id} out of range");
        }
    }
}
