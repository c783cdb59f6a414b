/// Phrases that introduce a name, lower-cased.
const MARKERS: &[&[&str]] = &[
    &["me", "llamo"],
    &["mi", "nombre", "es"],
    &["llamame"],
    &["llámame"],
    &["dime"],
    &["soy"],
    &["my", "name", "is"],
    &["call", "me"],
];

/// Words that end a name ("Lupita, por favor").
const STOP_WORDS: &[&str] = &["por", "favor", "gracias", "y", "pero", "para", "please"];

const MAX_NAME_WORDS: usize = 2;

/// Pulls a name out of a free-form answer to "¿cómo te llamas?".
///
/// Takes the words after the last introducing phrase ("me llamo", "soy", ...),
/// or the last word when there is none, and capitalizes them.
pub fn extract_name(input: &str) -> Option<String> {
    let words: Vec<&str> = input
        .split(|c: char| !(c.is_alphabetic() || c == '\'' || c == '-'))
        .filter(|w| !w.is_empty())
        .collect();
    let last = *words.last()?;
    let lower: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();

    let mut start = None;
    for i in 0..lower.len() {
        for marker in MARKERS {
            let rest = &lower[i..];
            if rest.len() > marker.len() && rest.iter().zip(marker.iter()).all(|(a, b)| a == b) {
                start = Some(i + marker.len());
            }
        }
    }

    let picked: Vec<&str> = match start {
        Some(s) => words[s..]
            .iter()
            .take_while(|w| !STOP_WORDS.contains(&w.to_lowercase().as_str()))
            .take(MAX_NAME_WORDS)
            .copied()
            .collect(),
        None if is_marker_word(last) => Vec::new(),
        None => vec![last],
    };
    if picked.is_empty() {
        return None;
    }
    Some(
        picked
            .into_iter()
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn is_marker_word(word: &str) -> bool {
    let word = word.to_lowercase();
    MARKERS.iter().any(|m| m.contains(&word.as_str()))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
