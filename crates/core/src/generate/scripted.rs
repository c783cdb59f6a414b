use crate::generate::{GenerationError, ResponseGenerator};
use crate::mood::MoodLabel;
use crate::prompt::PromptPayload;
use futures::future::BoxFuture;
use futures::FutureExt;

/// Offline generator with one canned reply per mood. Used when no model
/// credential is configured on purpose (local runs, demos).
#[derive(Clone, Debug, Default)]
pub struct ScriptedGenerator;

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn reply_for(mood: MoodLabel) -> &'static str {
        match mood {
            MoodLabel::Happy => "¡Qué alegría me da escucharte así! Cuéntame más, ¿qué fue lo mejor?",
            MoodLabel::Sad => "Ay, lo siento mucho. Aquí estoy para escucharte, ¿quieres contarme qué pasó?",
            MoodLabel::Lonely => "No estás sola, aquí estoy contigo. ¿Qué hiciste hoy?",
            MoodLabel::Anxious => "Tranquila, respira conmigo un momentito. ¿Qué es lo que te preocupa?",
            MoodLabel::Angry => "Entiendo que estés molesta, desahógate conmigo. ¿Qué pasó?",
            MoodLabel::Neutral => "Fíjate que me da mucho gusto platicar contigo. ¿Qué más me cuentas?",
        }
    }
}

impl ResponseGenerator for ScriptedGenerator {
    fn generate(&self, prompt: PromptPayload) -> BoxFuture<'_, Result<String, GenerationError>> {
        async move { Ok(Self::reply_for(prompt.mood).to_owned()) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::UserProfile;
    use crate::prompt::PromptComposer;

    #[tokio::test]
    async fn replies_by_mood() {
        let prompt = PromptComposer::default().compose(&UserProfile::new("u"), MoodLabel::Lonely, "sola");
        let reply = ScriptedGenerator::new().generate(prompt).await.expect("reply");
        assert_eq!(reply, ScriptedGenerator::reply_for(MoodLabel::Lonely));
    }
}
