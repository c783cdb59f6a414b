//! Scripted lines spoken without the language model.

pub const GREETING_NEW: &str = "¡Hola! Soy Comadre, tu compañera virtual. Me encantaría que platicáramos. Para conocerte mejor, ¿cómo te llamas?";
pub const REPROMPT_ASK_NAME: &str = "¿Cómo te gustaría que te llame?";
pub const REPROMPT_RETURNING: &str = "¿Qué me cuentas de nuevo?";
pub const REPROMPT_AFTER_NAME: &str = "¿Qué me quieres contar?";
pub const REPROMPT_NAME_MISSED: &str = "Cuéntame cómo estás.";
pub const REPROMPT_CONVERSATION: &str = "¿Qué más me quieres contar?";
pub const REPROMPT_POSITIVE: &str = "¿Qué me cuentas?";
pub const REPROMPT_NEGATIVE: &str = "¿Qué sucede?";
pub const REPROMPT_HELP: &str = "¿De qué te gustaría hablar?";

pub const NAME_MISSED: &str = "No entendí bien tu nombre, pero no te preocupes, me da gusto conocerte. ¿Cómo te sientes hoy?";

pub const HELP: &str = "¡Claro que sí! Soy Comadre, tu amiga. Puedes contarme lo que sea: cómo te sientes, qué hiciste en el día, o simplemente platicar de lo que tú quieras. Siempre estoy aquí para escucharte. Entonces, ¿qué me quieres contar?";

pub const MEMORY_CLEARED: &str = "Listo, empecemos de cero. ¡Será un gusto conocerte de nuevo! Para empezar, ¿cómo te llamas?";

pub const NOT_UNDERSTOOD: &str = "Perdona, no te entendí muy bien. ¿Me lo puedes decir de otra forma?";

/// Spoken when a turn fails before a reply could be produced.
pub const SAFE_FALLBACK: &str = "Ay, perdóname, creo que me distraje un momento y no te entendí. ¿Me lo podrías repetir, por favor?";

/// Stand-in utterances recorded for the quick mood intents.
pub const POSITIVE_UTTERANCE: &str = "Me siento bien.";
pub const NEGATIVE_UTTERANCE: &str = "Me siento mal.";

pub fn greeting_returning(name: &str) -> String {
    format!("¡Qué alegría escucharte de nuevo, {name}! Me da mucho gusto platicar contigo. ¿Cómo has estado?")
}

pub fn name_acknowledged(name: &str) -> String {
    format!("¡Qué bonito nombre, {name}! Es un gusto conocerte. Ahora sí, cuéntame, ¿cómo te ha ido hoy?")
}

pub fn farewell(name: &str) -> String {
    format!("Claro que sí, {name}. Que tengas un día muy bonito. Aquí te espero cuando quieras volver a platicar.")
}

pub fn positive_variants(name: &str) -> [String; 2] {
    [
        format!("¡Qué alegría me da escuchar eso, {name}! Me contagias tu buen humor. ¿A qué se debe esa felicidad?"),
        "¡Me encanta que estés bien! Cuéntame algo bonito que te haya pasado hoy.".to_owned(),
    ]
}

pub fn negative_variants(name: &str) -> [String; 2] {
    [
        format!("Ay, {name}, lamento escuchar eso. Recuerda que no estás sola, aquí estoy para escucharte. ¿Quieres contarme qué pasó?"),
        "Me da mucha pena que te sientas así. A veces platicar un poquito ayuda a sacar lo que uno trae dentro. ¿Qué te tiene con el ánimo bajo?".to_owned(),
    ]
}
