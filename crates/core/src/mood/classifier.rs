use crate::mood::MoodLabel;

const LOG_TARGET: &str = "mood::classifier";

/// Words this many tokens before a cue negate it ("no estoy bien").
const NEGATION_WINDOW: usize = 2;

const NEGATIONS: &[&str] = &["no", "nunca", "jamas", "tampoco", "ni", "not", "never"];

const LONELY_WORDS: &[&str] = &[
    "sola",
    "soledad",
    "abandonada",
    "abandonado",
    "aislada",
    "aislado",
    "olvidada",
    "olvidado",
    "lonely",
    "alone",
    "lonesome",
    "miss",
];

const LONELY_PHRASES: &[&str] = &[
    "estoy solo",
    "estoy sola",
    "me siento solo",
    "me siento sola",
    "muy solo",
    "tan solo",
    "nadie me",
    "echo de menos",
    "extrano a",
    "extrano mucho",
];

const SAD_WORDS: &[&str] = &[
    "triste",
    "tristeza",
    "deprimida",
    "deprimido",
    "llorar",
    "llore",
    "llorando",
    "mal",
    "pena",
    "dolor",
    "duele",
    "murio",
    "fallecio",
    "desanimada",
    "desanimado",
    "sad",
    "depressed",
    "unhappy",
    "crying",
    "terrible",
    "awful",
];

const ANXIOUS_WORDS: &[&str] = &[
    "preocupada",
    "preocupado",
    "preocupa",
    "nerviosa",
    "nervioso",
    "miedo",
    "asustada",
    "asustado",
    "ansiedad",
    "angustia",
    "angustiada",
    "inquieta",
    "worried",
    "anxious",
    "scared",
    "afraid",
    "nervous",
];

const ANGRY_WORDS: &[&str] = &[
    "enojada",
    "enojado",
    "coraje",
    "furiosa",
    "furioso",
    "molesta",
    "molesto",
    "harta",
    "harto",
    "rabia",
    "angry",
    "mad",
    "furious",
    "annoyed",
];

const HAPPY_WORDS: &[&str] = &[
    "feliz",
    "contenta",
    "contento",
    "alegre",
    "alegria",
    "bien",
    "bonito",
    "bonita",
    "maravilloso",
    "maravillosa",
    "encanta",
    "gusto",
    "genial",
    "excelente",
    "happy",
    "glad",
    "great",
    "wonderful",
    "joy",
    "good",
];

/// Maps an utterance to a [`MoodLabel`]. Implementations must be pure and
/// must never fail: anything unclear is [`MoodLabel::Neutral`].
pub trait MoodClassifier: Send + Sync {
    fn classify(&self, utterance: &str) -> MoodLabel;
}

/// Keyword classifier for Spanish and English, accent-insensitive.
#[derive(Clone, Debug, Default)]
pub struct LexiconMoodClassifier;

impl LexiconMoodClassifier {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Default)]
struct Scores {
    happy: u32,
    sad: u32,
    lonely: u32,
    anxious: u32,
    angry: u32,
}

impl Scores {
    fn winner(&self) -> MoodLabel {
        // Ties resolve in this order.
        let ranked = [
            (MoodLabel::Lonely, self.lonely),
            (MoodLabel::Sad, self.sad),
            (MoodLabel::Anxious, self.anxious),
            (MoodLabel::Angry, self.angry),
            (MoodLabel::Happy, self.happy),
        ];
        let mut best = (MoodLabel::Neutral, 0);
        for (label, score) in ranked {
            if score > best.1 {
                best = (label, score);
            }
        }
        best.0
    }
}

impl MoodClassifier for LexiconMoodClassifier {
    fn classify(&self, utterance: &str) -> MoodLabel {
        let tokens = tokenize(utterance);
        if tokens.is_empty() {
            tracing::debug!(target: LOG_TARGET, "empty utterance, classification degraded to neutral");
            return MoodLabel::Neutral;
        }

        let mut scores = Scores::default();
        let mut consumed = vec![false; tokens.len()];
        for phrase in LONELY_PHRASES {
            let words: Vec<&str> = phrase.split(' ').collect();
            for start in 0..tokens.len().saturating_sub(words.len() - 1) {
                let span = start..start + words.len();
                let matches = tokens[span.clone()].iter().zip(&words).all(|(t, w)| t == w);
                if !matches || consumed[span.clone()].iter().any(|c| *c) {
                    continue;
                }
                consumed[span].fill(true);
                if !is_negated(&tokens, start) {
                    scores.lonely += 1;
                }
            }
        }

        for (i, token) in tokens.iter().enumerate() {
            if consumed[i] {
                continue;
            }
            let token = token.as_str();
            let negated = is_negated(&tokens, i);

            if HAPPY_WORDS.contains(&token) {
                if negated {
                    scores.sad += 1;
                } else {
                    scores.happy += 1;
                }
            } else if negated {
                continue;
            } else if LONELY_WORDS.contains(&token) {
                scores.lonely += 1;
            } else if SAD_WORDS.contains(&token) {
                scores.sad += 1;
            } else if ANXIOUS_WORDS.contains(&token) {
                scores.anxious += 1;
            } else if ANGRY_WORDS.contains(&token) {
                scores.angry += 1;
            }
        }

        let mood = scores.winner();
        tracing::debug!(target: LOG_TARGET, %mood, "utterance classified");
        mood
    }
}

/// True when a negation word sits in the window before `tokens[i]`.
fn is_negated(tokens: &[String], i: usize) -> bool {
    tokens[i.saturating_sub(NEGATION_WINDOW)..i]
        .iter()
        .any(|t| NEGATIONS.contains(&t.as_str()))
}

/// Lower-cases, strips accents and splits on anything that is not a letter
/// or digit.
fn tokenize(text: &str) -> Vec<String> {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(fold_accent)
        .collect::<String>()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        other => other,
    }
}
