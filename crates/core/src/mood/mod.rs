mod classifier;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use classifier::{LexiconMoodClassifier, MoodClassifier};

/// Coarse emotional state inferred from what the user says.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MoodLabel {
    Happy,
    Sad,
    Lonely,
    Anxious,
    Angry,
    #[default]
    Neutral,
}

impl MoodLabel {
    pub const ALL: [MoodLabel; 6] = [
        MoodLabel::Happy,
        MoodLabel::Sad,
        MoodLabel::Lonely,
        MoodLabel::Anxious,
        MoodLabel::Angry,
        MoodLabel::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MoodLabel::Happy => "happy",
            MoodLabel::Sad => "sad",
            MoodLabel::Lonely => "lonely",
            MoodLabel::Anxious => "anxious",
            MoodLabel::Angry => "angry",
            MoodLabel::Neutral => "neutral",
        }
    }

    /// How the companion should sound when the user is in this mood.
    pub fn tone(&self) -> ToneDirective {
        let text = match self {
            MoodLabel::Happy => {
                "Comparte su alegría con entusiasmo y haz una pregunta curiosa sobre lo que la tiene contenta."
            }
            MoodLabel::Sad => {
                "Habla con mucha suavidad, reconforta primero y pregunta con delicadeza qué pasó."
            }
            MoodLabel::Lonely => {
                "Hazle sentir acompañada: recuérdale que aquí estás para platicar e invítala a contarte de su día."
            }
            MoodLabel::Anxious => {
                "Transmite calma y seguridad, con frases pausadas; no agregues preocupaciones nuevas."
            }
            MoodLabel::Angry => {
                "Valida su enojo sin juzgar, con paciencia, y dale espacio para desahogarse."
            }
            MoodLabel::Neutral => "Mantén un tono cálido y cercano, y sigue la plática con interés.",
        };
        ToneDirective(text)
    }
}

impl fmt::Display for MoodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instruction for the language model that biases the tone of the reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToneDirective(&'static str);

impl ToneDirective {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}
