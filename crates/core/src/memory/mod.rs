mod file;
mod in_memory;

use crate::config::HistoryCap;
use crate::mood::MoodLabel;
use crate::util::BoundedLog;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use file::JsonFileProfileStore;
pub use in_memory::InMemoryProfileStore;

/// Name used when the companion does not know who it is talking to.
pub const DEFAULT_ADDRESS: &str = "querida";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub utterance: String,
    pub reply: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoodEntry {
    pub mood: MoodLabel,
    pub timestamp: DateTime<Utc>,
}

/// The question the companion asked last, so the next turn can be read in
/// context.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PendingQuestion {
    AskName,
    HowAreYou,
    ReasonForHappiness,
    ReasonForSadness,
}

impl PendingQuestion {
    /// Spanish paraphrase used in the prompt continuity note.
    pub fn describe(&self) -> &'static str {
        match self {
            PendingQuestion::AskName => "¿Cómo te llamas?",
            PendingQuestion::HowAreYou => "¿Cómo has estado?",
            PendingQuestion::ReasonForHappiness => "¿A qué se debe esa felicidad?",
            PendingQuestion::ReasonForSadness => "¿Qué te tiene con el ánimo bajo?",
        }
    }
}

/// Per-user conversational memory.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub interaction_count: u64,
    #[serde(default)]
    pub last_interaction: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conversation_history: BoundedLog<ConversationTurn>,
    #[serde(default)]
    pub mood_history: BoundedLog<MoodEntry>,
    #[serde(default)]
    pub last_question: Option<PendingQuestion>,
}

impl UserProfile {
    pub fn new<S: Into<String>>(user_id: S) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: None,
            interaction_count: 0,
            last_interaction: None,
            conversation_history: BoundedLog::new(),
            mood_history: BoundedLog::new(),
            last_question: None,
        }
    }

    /// Mood of the most recent classification, `Neutral` before the first.
    pub fn current_mood(&self) -> MoodLabel {
        self.mood_history
            .last()
            .map(|entry| entry.mood)
            .unwrap_or_default()
    }

    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or(DEFAULT_ADDRESS)
    }

    pub fn record_mood(&mut self, mood: MoodLabel, at: DateTime<Utc>, cap: HistoryCap) {
        self.mood_history.push(MoodEntry { mood, timestamp: at }, cap.get());
    }

    pub fn record_turn(
        &mut self,
        utterance: impl Into<String>,
        reply: impl Into<String>,
        at: DateTime<Utc>,
        cap: HistoryCap,
    ) {
        self.conversation_history.push(
            ConversationTurn {
                utterance: utterance.into(),
                reply: reply.into(),
                timestamp: at,
            },
            cap.get(),
        );
    }

    pub fn enforce_caps(&mut self, cap: HistoryCap) {
        self.conversation_history.enforce_cap(cap.get());
        self.mood_history.enforce_cap(cap.get());
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("transient storage failure: {0}")]
    Transient(String),
    #[error("storage failure: {0}")]
    Permanent(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }

    pub(crate) fn from_io(context: &str, err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        let message = format!("{context}: {err}");
        match err.kind() {
            ErrorKind::Interrupted
            | ErrorKind::TimedOut
            | ErrorKind::WouldBlock
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => StorageError::Transient(message),
            _ => StorageError::Permanent(message),
        }
    }
}

/// Keyed persistence of [`UserProfile`] records.
///
/// `load` never fails for an unknown user: it returns a fresh profile.
/// `save` replaces the whole record; concurrent saves for one user resolve to
/// one complete profile (last write wins).
pub trait ProfileStore: Send + Sync {
    fn load(&self, user_id: String) -> BoxFuture<'_, Result<UserProfile, StorageError>>;

    fn save(&self, profile: UserProfile) -> BoxFuture<'_, Result<(), StorageError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(n: usize) -> HistoryCap {
        HistoryCap::new(n).expect("nonzero")
    }

    #[test]
    fn new_profile_is_empty_and_neutral() {
        let profile = UserProfile::new("amzn1.ask.account.X");
        assert!(profile.conversation_history.is_empty());
        assert!(profile.mood_history.is_empty());
        assert_eq!(profile.current_mood(), MoodLabel::Neutral);
        assert_eq!(profile.display_name(), DEFAULT_ADDRESS);
    }

    #[test]
    fn current_mood_tracks_latest_entry() {
        let mut profile = UserProfile::new("u");
        let now = Utc::now();
        profile.record_mood(MoodLabel::Happy, now, cap(5));
        profile.record_mood(MoodLabel::Lonely, now, cap(5));
        assert_eq!(profile.current_mood(), MoodLabel::Lonely);
        assert_eq!(profile.mood_history.len(), 2);
    }

    #[test]
    fn histories_grow_to_cap_then_stay() {
        let mut profile = UserProfile::new("u");
        let now = Utc::now();
        let mut last_len = 0;
        for i in 0..10 {
            profile.record_turn(format!("hola {i}"), "¡Hola!", now, cap(4));
            profile.record_mood(MoodLabel::Neutral, now, cap(4));
            let len = profile.conversation_history.len();
            assert!(len >= last_len);
            assert!(len <= 4);
            last_len = len;
        }
        assert_eq!(profile.conversation_history.len(), 4);
        assert_eq!(profile.mood_history.len(), 4);
        let oldest = profile.conversation_history.iter().next().expect("entry");
        assert_eq!(oldest.utterance, "hola 6");
    }

    #[test]
    fn stored_document_uses_camel_case_keys() {
        let mut profile = UserProfile::new("u-1");
        profile.user_name = Some("Maria".to_owned());
        profile.last_question = Some(PendingQuestion::AskName);
        let json = serde_json::to_value(&profile).expect("serialize");
        assert_eq!(json["userId"], "u-1");
        assert_eq!(json["userName"], "Maria");
        assert_eq!(json["lastQuestion"], "ask_name");
        assert!(json["conversationHistory"].is_array());
    }

    #[test]
    fn sparse_document_fills_defaults() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"userId":"u-2"}"#).expect("deserialize");
        assert_eq!(profile, UserProfile::new("u-2"));
    }

    #[test]
    fn io_errors_classified_by_kind() {
        use std::io::{Error, ErrorKind};
        assert!(StorageError::from_io("read", Error::from(ErrorKind::TimedOut)).is_retryable());
        assert!(
            !StorageError::from_io("read", Error::from(ErrorKind::PermissionDenied))
                .is_retryable()
        );
    }
}
