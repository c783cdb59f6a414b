//! Builds the chat-completion request for one conversational turn.
//!
//! The output depends only on its inputs: no clock, no randomness. History is
//! trimmed oldest-first so the newest turns survive the size bound.

use crate::config::{
    LlmConfig, DEFAULT_MAX_PROMPT_CHARS, DEFAULT_MAX_TOKENS, DEFAULT_LLM_MODEL,
    DEFAULT_PROMPT_HISTORY_TURNS, DEFAULT_TEMPERATURE,
};
use crate::memory::UserProfile;
use crate::mood::MoodLabel;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Longest utterance passed to the model, in characters.
pub const MAX_UTTERANCE_CHARS: usize = 1000;

pub const PERSONA: &str = "Eres Comadre, una compañera virtual que platica con una persona mayor. \
Hablas como una amiga de toda la vida con cariño de madre: cálida, empática y paciente.";

const RULES: &str = "REGLAS:\n\
- Responde en español, en 1 o 2 oraciones cortas: es una conversación de voz.\n\
- Sé cercana: usa expresiones como \"¡Qué bonito!\", \"Fíjate que...\", \"Me da mucho gusto\".\n\
- Muestra interés con una pregunta de seguimiento sencilla.\n\
- Nunca des diagnósticos médicos; si algo suena grave, sugiere con cariño llamar a un familiar o a su doctor.";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    fn chars(&self) -> usize {
        self.content.chars().count()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PromptPayload {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub mood: MoodLabel,
    pub messages: Vec<ChatMessage>,
}

impl PromptPayload {
    pub fn system(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// The utterance this prompt answers.
    pub fn utterance(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    pub fn total_chars(&self) -> usize {
        self.messages.iter().map(ChatMessage::chars).sum()
    }
}

#[derive(Clone, Debug)]
pub struct PromptComposer {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_history_turns: usize,
    pub max_prompt_chars: usize,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self {
            model: DEFAULT_LLM_MODEL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_history_turns: DEFAULT_PROMPT_HISTORY_TURNS,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
        }
    }
}

impl PromptComposer {
    pub fn from_llm(llm: &LlmConfig) -> Self {
        Self {
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            ..Self::default()
        }
    }

    pub fn compose(&self, profile: &UserProfile, mood: MoodLabel, utterance: &str) -> PromptPayload {
        let system = ChatMessage::new(Role::System, self.system_prompt(profile, mood));
        let current = ChatMessage::new(Role::User, clip(utterance.trim(), MAX_UTTERANCE_CHARS));

        let mut history: Vec<[ChatMessage; 2]> = profile
            .conversation_history
            .recent(self.max_history_turns)
            .map(|turn| {
                [
                    ChatMessage::new(Role::User, turn.utterance.clone()),
                    ChatMessage::new(Role::Assistant, turn.reply.clone()),
                ]
            })
            .collect();

        let fixed = system.chars() + current.chars();
        let mut history_chars: usize = history.iter().flatten().map(ChatMessage::chars).sum();
        let mut dropped = 0;
        while !history.is_empty() && fixed + history_chars > self.max_prompt_chars {
            let oldest = history.remove(0);
            history_chars -= oldest.iter().map(ChatMessage::chars).sum::<usize>();
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(target: "prompt", dropped, "history trimmed to fit prompt budget");
        }

        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(system);
        messages.extend(history.into_iter().flatten());
        messages.push(current);

        PromptPayload {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            mood,
            messages,
        }
    }

    fn system_prompt(&self, profile: &UserProfile, mood: MoodLabel) -> String {
        let name = profile.display_name();
        let mut prompt = format!("{PERSONA} La persona con la que hablas se llama {name}.\n\n{RULES}\n");

        let _ = write!(
            prompt,
            "- ÁNIMO ACTUAL: {name} parece estar {}. {}\n",
            spanish_mood(mood),
            mood.tone().as_str()
        );
        if !profile.mood_history.is_empty() {
            let _ = write!(
                prompt,
                "- CONTEXTO: la vez anterior su ánimo era {}.\n",
                spanish_mood(profile.current_mood())
            );
        }
        if let Some(question) = profile.last_question {
            let _ = write!(
                prompt,
                "- CONTINUIDAD: acabas de preguntar \"{}\"; su respuesta probablemente tenga que ver con eso.\n",
                question.describe()
            );
        }
        let _ = write!(prompt, "[mood={}]", mood.as_str());
        prompt
    }
}

fn spanish_mood(mood: MoodLabel) -> &'static str {
    match mood {
        MoodLabel::Happy => "contenta",
        MoodLabel::Sad => "triste",
        MoodLabel::Lonely => "sola",
        MoodLabel::Anxious => "preocupada",
        MoodLabel::Angry => "enojada",
        MoodLabel::Neutral => "tranquila",
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_owned(),
        None => text.to_owned(),
    }
}
