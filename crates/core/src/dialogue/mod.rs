//! Turn orchestration for the voice companion.
//!
//! A conversational turn walks `Idle → ProfileLoaded → Classified → Composed →
//! Generated → ProfileSaved → Responded` in order. Platform intents (launch,
//! stop, help, ...) answer from scripts and never reach the classifier or the
//! model. Every error is contained here: the caller always gets something to
//! say.

mod name;
pub mod phrases;

use crate::config::HistoryCap;
use crate::generate::{Reply, ResilientGenerator, ResponseGenerator};
use crate::memory::{PendingQuestion, ProfileStore, StorageError, UserProfile};
use crate::mood::{MoodClassifier, MoodLabel};
use crate::prompt::PromptComposer;
use crate::skill::{RequestEnvelope, ResponseEnvelope, Route};
use chrono::Utc;
use futures::FutureExt;
use rand::seq::IndexedRandom;
use std::panic::AssertUnwindSafe;

pub use name::extract_name;

const LOG_TARGET: &str = "dialogue";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    ProfileLoaded,
    Classified,
    Composed,
    Generated,
    ProfileSaved,
    Responded,
}

impl TurnState {
    fn successor(self) -> Option<TurnState> {
        match self {
            TurnState::Idle => Some(TurnState::ProfileLoaded),
            TurnState::ProfileLoaded => Some(TurnState::Classified),
            TurnState::Classified => Some(TurnState::Composed),
            TurnState::Composed => Some(TurnState::Generated),
            TurnState::Generated => Some(TurnState::ProfileSaved),
            TurnState::ProfileSaved => Some(TurnState::Responded),
            TurnState::Responded => None,
        }
    }
}

/// States visited during one turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnTrace {
    states: Vec<TurnState>,
}

impl Default for TurnTrace {
    fn default() -> Self {
        Self {
            states: vec![TurnState::Idle],
        }
    }
}

impl TurnTrace {
    /// Moves to `next`, which must be the successor of the current state or
    /// `Responded` (a short-circuit).
    fn advance(&mut self, next: TurnState) {
        let current = self.current();
        let allowed = current.successor() == Some(next)
            || (next == TurnState::Responded && current != TurnState::Responded);
        debug_assert!(allowed, "illegal transition {current:?} -> {next:?}");
        if allowed {
            self.states.push(next);
        } else {
            tracing::error!(target: LOG_TARGET, ?current, ?next, "illegal turn transition ignored");
        }
    }

    pub fn current(&self) -> TurnState {
        self.states.last().copied().unwrap_or(TurnState::Idle)
    }

    pub fn states(&self) -> &[TurnState] {
        &self.states
    }

    /// True when every pipeline state was visited in order.
    pub fn is_complete_pipeline(&self) -> bool {
        let mut expected = Some(TurnState::Idle);
        for state in &self.states {
            if Some(*state) != expected {
                return false;
            }
            expected = state.successor();
        }
        expected.is_none()
    }
}

/// Everything that happened in one turn, for logging and tests.
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    pub response: ResponseEnvelope,
    pub trace: TurnTrace,
    pub mood: Option<MoodLabel>,
    pub reply: Option<Reply>,
    pub persisted: bool,
}

impl TurnOutcome {
    fn scripted(response: ResponseEnvelope, trace: TurnTrace, persisted: bool) -> Self {
        Self {
            response,
            trace,
            mood: None,
            reply: None,
            persisted,
        }
    }
}

/// A profile together with whether it may be written back. Profiles that
/// could not be loaded are ephemeral: saving them would overwrite real data.
struct LoadedProfile {
    profile: UserProfile,
    persistent: bool,
}

pub struct DialogueManager<S, C, G> {
    store: S,
    classifier: C,
    composer: PromptComposer,
    generator: ResilientGenerator<G>,
    history_cap: HistoryCap,
}

impl<S, C, G> DialogueManager<S, C, G>
where
    S: ProfileStore,
    C: MoodClassifier,
    G: ResponseGenerator,
{
    pub fn new(
        store: S,
        classifier: C,
        composer: PromptComposer,
        generator: ResilientGenerator<G>,
        history_cap: HistoryCap,
    ) -> Self {
        Self {
            store,
            classifier,
            composer,
            generator,
            history_cap,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handles one voice request. Never fails and never panics outward.
    pub async fn handle(&self, request: &RequestEnvelope) -> ResponseEnvelope {
        self.handle_turn(request).await.response
    }

    pub async fn handle_turn(&self, request: &RequestEnvelope) -> TurnOutcome {
        match AssertUnwindSafe(self.dispatch(request)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(
                    target: LOG_TARGET,
                    request_id = request.request_id().unwrap_or("-"),
                    "turn aborted by an unexpected fault, answering with fallback"
                );
                let mut trace = TurnTrace::default();
                trace.advance(TurnState::Responded);
                TurnOutcome::scripted(safe_fallback(), trace, false)
            }
        }
    }

    async fn dispatch(&self, request: &RequestEnvelope) -> TurnOutcome {
        let route = request.route();
        let user_id = request.user_id();
        tracing::info!(
            target: LOG_TARGET,
            request_id = request.request_id().unwrap_or("-"),
            user_id = user_id.unwrap_or("-"),
            route = ?route,
            conversational = route.is_conversational(),
            "turn started"
        );

        match route {
            Route::Conversation(Some(utterance)) => self.converse(user_id, &utterance).await,
            Route::Conversation(None) => self.handle_silence(user_id).await,
            Route::Launch => self.launch(user_id).await,
            Route::Stop => self.stop(user_id).await,
            Route::Help => respond(
                ResponseEnvelope::speak(phrases::HELP).ask(phrases::REPROMPT_HELP),
                false,
            ),
            Route::ProvideName(raw) => self.provide_name(user_id, raw.as_deref()).await,
            Route::PositiveMood => self.quick_mood(user_id, MoodLabel::Happy).await,
            Route::NegativeMood => self.quick_mood(user_id, MoodLabel::Sad).await,
            Route::ClearMemory => self.clear_memory(user_id).await,
            Route::SessionEnded(reason) => {
                tracing::info!(target: LOG_TARGET, reason = reason.as_deref().unwrap_or("-"), "session ended");
                respond(ResponseEnvelope::empty(), false)
            }
            Route::Unrecognized => respond(not_understood(), false),
        }
    }

    /// The full classify → compose → generate pipeline.
    async fn converse(&self, user_id: Option<&str>, utterance: &str) -> TurnOutcome {
        let mut trace = TurnTrace::default();

        let LoadedProfile {
            mut profile,
            persistent,
        } = self.load_profile(user_id).await;
        trace.advance(TurnState::ProfileLoaded);

        let mood = self.classifier.classify(utterance);
        trace.advance(TurnState::Classified);

        let prompt = self.composer.compose(&profile, mood, utterance);
        trace.advance(TurnState::Composed);

        let reply = self.generator.generate(prompt).await;
        trace.advance(TurnState::Generated);

        let now = Utc::now();
        profile.record_mood(mood, now, self.history_cap);
        profile.record_turn(utterance, reply.text(), now, self.history_cap);
        profile.last_question = None;

        let persisted = persistent && self.save_profile(profile).await;
        trace.advance(TurnState::ProfileSaved);

        tracing::info!(
            target: LOG_TARGET,
            %mood,
            fallback = reply.is_fallback(),
            persisted,
            "conversation turn answered"
        );

        let response = ResponseEnvelope::speak(reply.text()).ask(phrases::REPROMPT_CONVERSATION);
        trace.advance(TurnState::Responded);

        TurnOutcome {
            response,
            trace,
            mood: Some(mood),
            reply: Some(reply),
            persisted,
        }
    }

    /// Conversation intent with nothing recognizable in it.
    async fn handle_silence(&self, user_id: Option<&str>) -> TurnOutcome {
        let loaded = self.load_profile(user_id).await;
        if loaded.profile.last_question == Some(PendingQuestion::AskName) {
            return self.store_name(loaded, None).await;
        }
        respond(not_understood(), false)
    }

    async fn launch(&self, user_id: Option<&str>) -> TurnOutcome {
        let LoadedProfile {
            mut profile,
            persistent,
        } = self.load_profile(user_id).await;

        let response = match profile.user_name.as_deref() {
            Some(name) => {
                let speech = phrases::greeting_returning(name);
                profile.last_question = Some(PendingQuestion::HowAreYou);
                ResponseEnvelope::speak(speech).ask(phrases::REPROMPT_RETURNING)
            }
            None => {
                profile.last_question = Some(PendingQuestion::AskName);
                ResponseEnvelope::speak(phrases::GREETING_NEW).ask(phrases::REPROMPT_ASK_NAME)
            }
        };
        profile.interaction_count += 1;

        let persisted = persistent && self.save_profile(profile).await;
        respond(response, persisted)
    }

    async fn stop(&self, user_id: Option<&str>) -> TurnOutcome {
        let loaded = self.load_profile(user_id).await;
        let farewell = phrases::farewell(loaded.profile.display_name());
        respond(ResponseEnvelope::speak(farewell), false)
    }

    async fn provide_name(&self, user_id: Option<&str>, raw: Option<&str>) -> TurnOutcome {
        let loaded = self.load_profile(user_id).await;
        self.store_name(loaded, raw).await
    }

    async fn store_name(&self, loaded: LoadedProfile, raw: Option<&str>) -> TurnOutcome {
        let LoadedProfile {
            mut profile,
            persistent,
        } = loaded;

        let response = match raw.and_then(extract_name) {
            Some(name) => {
                let speech = phrases::name_acknowledged(&name);
                tracing::info!(target: LOG_TARGET, user_id = %profile.user_id, "user name learned");
                profile.user_name = Some(name);
                ResponseEnvelope::speak(speech).ask(phrases::REPROMPT_AFTER_NAME)
            }
            None => ResponseEnvelope::speak(phrases::NAME_MISSED).ask(phrases::REPROMPT_NAME_MISSED),
        };
        profile.last_question = None;

        let persisted = persistent && self.save_profile(profile).await;
        respond(response, persisted)
    }

    /// Direct "I'm fine" / "I'm not well" answers, replied to from scripts.
    async fn quick_mood(&self, user_id: Option<&str>, mood: MoodLabel) -> TurnOutcome {
        let LoadedProfile {
            mut profile,
            persistent,
        } = self.load_profile(user_id).await;
        let name = profile.display_name().to_owned();

        let (speech, utterance, reprompt, question) = if mood == MoodLabel::Happy {
            (
                pick(&phrases::positive_variants(&name)),
                phrases::POSITIVE_UTTERANCE,
                phrases::REPROMPT_POSITIVE,
                PendingQuestion::ReasonForHappiness,
            )
        } else {
            (
                pick(&phrases::negative_variants(&name)),
                phrases::NEGATIVE_UTTERANCE,
                phrases::REPROMPT_NEGATIVE,
                PendingQuestion::ReasonForSadness,
            )
        };

        let now = Utc::now();
        profile.record_mood(mood, now, self.history_cap);
        profile.record_turn(utterance, speech.clone(), now, self.history_cap);
        profile.last_question = Some(question);

        let persisted = persistent && self.save_profile(profile).await;
        let mut outcome = respond(ResponseEnvelope::speak(speech).ask(reprompt), persisted);
        outcome.mood = Some(mood);
        outcome
    }

    /// Starts the relationship over: the stored profile is replaced by a
    /// fresh one waiting for the user's name.
    async fn clear_memory(&self, user_id: Option<&str>) -> TurnOutcome {
        let persisted = match user_id {
            Some(id) => {
                let mut fresh = UserProfile::new(id);
                fresh.last_question = Some(PendingQuestion::AskName);
                let saved = self.save_profile(fresh).await;
                if saved {
                    tracing::info!(target: LOG_TARGET, user_id = id, "profile reset");
                }
                saved
            }
            None => false,
        };
        respond(
            ResponseEnvelope::speak(phrases::MEMORY_CLEARED).ask(phrases::REPROMPT_ASK_NAME),
            persisted,
        )
    }

    async fn load_profile(&self, user_id: Option<&str>) -> LoadedProfile {
        let Some(user_id) = user_id else {
            tracing::warn!(target: LOG_TARGET, "request without user id, using ephemeral profile");
            return LoadedProfile {
                profile: UserProfile::new(""),
                persistent: false,
            };
        };

        let result = match self.store.load(user_id.to_owned()).await {
            Err(e) if e.is_retryable() => {
                tracing::warn!(target: LOG_TARGET, user_id, error = %e, "profile load failed, retrying once");
                self.store.load(user_id.to_owned()).await
            }
            other => other,
        };

        match result {
            Ok(profile) => LoadedProfile {
                profile,
                persistent: true,
            },
            Err(e) => {
                tracing::error!(target: LOG_TARGET, user_id, error = %e, "profile unavailable, using ephemeral profile");
                LoadedProfile {
                    profile: UserProfile::new(user_id),
                    persistent: false,
                }
            }
        }
    }

    /// Saves with one retry on transient errors. Returns whether it stuck.
    async fn save_profile(&self, mut profile: UserProfile) -> bool {
        profile.last_interaction = Some(Utc::now());
        let user_id = profile.user_id.clone();

        let result = match self.store.save(profile.clone()).await {
            Err(e) if e.is_retryable() => {
                tracing::warn!(target: LOG_TARGET, %user_id, error = %e, "profile save failed, retrying once");
                self.store.save(profile).await
            }
            other => other,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                log_save_failure(&user_id, &e);
                false
            }
        }
    }
}

fn log_save_failure(user_id: &str, err: &StorageError) {
    tracing::error!(target: LOG_TARGET, user_id, error = %err, "profile not saved");
}

fn respond(response: ResponseEnvelope, persisted: bool) -> TurnOutcome {
    let mut trace = TurnTrace::default();
    trace.advance(TurnState::Responded);
    TurnOutcome::scripted(response, trace, persisted)
}

fn not_understood() -> ResponseEnvelope {
    ResponseEnvelope::speak(phrases::NOT_UNDERSTOOD).ask(phrases::NOT_UNDERSTOOD)
}

fn safe_fallback() -> ResponseEnvelope {
    ResponseEnvelope::speak(phrases::SAFE_FALLBACK).ask(phrases::SAFE_FALLBACK)
}

fn pick(variants: &[String]) -> String {
    variants
        .choose(&mut rand::rng())
        .cloned()
        .unwrap_or_else(|| phrases::NOT_UNDERSTOOD.to_owned())
}
