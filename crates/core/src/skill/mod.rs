mod envelope;

pub use envelope::{
    Context, Intent, IntentRequest, OutputSpeech, Reprompt, Request, RequestEnvelope, RequestMeta,
    ResponseBody, ResponseEnvelope, Session, SessionEndedRequest, Slot, SystemState, User,
    RESPONSE_VERSION,
};

pub const INTENT_CONVERSATION: &str = "ConversationIntent";
pub const INTENT_PROVIDE_NAME: &str = "ProvideNameIntent";
pub const INTENT_POSITIVE: &str = "PositiveResponseIntent";
pub const INTENT_NEGATIVE: &str = "NegativeResponseIntent";
pub const INTENT_CLEAR_MEMORY: &str = "ClearMemoryIntent";
pub const INTENT_FALLBACK: &str = "AMAZON.FallbackIntent";
pub const INTENT_STOP: &str = "AMAZON.StopIntent";
pub const INTENT_CANCEL: &str = "AMAZON.CancelIntent";
pub const INTENT_HELP: &str = "AMAZON.HelpIntent";

pub const SLOT_USER_INPUT: &str = "UserInput";
pub const SLOT_USER_NAME: &str = "UserName";

/// What a request asks the companion to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Launch,
    Stop,
    Help,
    ProvideName(Option<String>),
    PositiveMood,
    NegativeMood,
    ClearMemory,
    /// Open-ended talk; the only route that reaches the model.
    Conversation(Option<String>),
    SessionEnded(Option<String>),
    Unrecognized,
}

impl Route {
    /// Platform-level routes never touch the classifier or the model.
    pub fn is_conversational(&self) -> bool {
        matches!(self, Route::Conversation(_))
    }
}

impl RequestEnvelope {
    pub fn route(&self) -> Route {
        match &self.request {
            Request::LaunchRequest(_) => Route::Launch,
            Request::SessionEndedRequest(ended) => Route::SessionEnded(ended.reason.clone()),
            Request::Unknown => Route::Unrecognized,
            Request::IntentRequest(req) => route_intent(&req.intent),
        }
    }
}

fn route_intent(intent: &Intent) -> Route {
    let owned = |v: Option<&str>| v.map(str::to_owned);
    match intent.name.as_str() {
        INTENT_STOP | INTENT_CANCEL => Route::Stop,
        INTENT_HELP => Route::Help,
        INTENT_PROVIDE_NAME => Route::ProvideName(owned(intent.slot_value(SLOT_USER_NAME))),
        INTENT_POSITIVE => Route::PositiveMood,
        INTENT_NEGATIVE => Route::NegativeMood,
        INTENT_CLEAR_MEMORY => Route::ClearMemory,
        INTENT_CONVERSATION | INTENT_FALLBACK => {
            Route::Conversation(owned(intent.slot_value(SLOT_USER_INPUT)))
        }
        _ => match intent.any_slot_value() {
            Some(text) => Route::Conversation(Some(text.to_owned())),
            None => Route::Unrecognized,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> RequestEnvelope {
        serde_json::from_str(json).expect("valid envelope")
    }

    const CONVERSATION: &str = r#"{
        "version": "1.0",
        "session": {
            "new": false,
            "sessionId": "amzn1.echo-api.session.1",
            "user": { "userId": "amzn1.ask.account.SESSION" }
        },
        "context": { "System": { "user": { "userId": "amzn1.ask.account.CONTEXT" } } },
        "request": {
            "type": "IntentRequest",
            "requestId": "amzn1.echo-api.request.1",
            "locale": "es-MX",
            "intent": {
                "name": "ConversationIntent",
                "confirmationStatus": "NONE",
                "slots": { "UserInput": { "name": "UserInput", "value": " me siento muy sola hoy " } }
            }
        }
    }"#;

    #[test]
    fn parses_conversation_request() {
        let env = parse(CONVERSATION);
        assert_eq!(env.user_id(), Some("amzn1.ask.account.CONTEXT"));
        assert_eq!(env.request_id(), Some("amzn1.echo-api.request.1"));
        assert_eq!(
            env.route(),
            Route::Conversation(Some("me siento muy sola hoy".to_owned()))
        );
        assert!(env.route().is_conversational());
    }

    #[test]
    fn falls_back_to_session_user() {
        let env = parse(
            r#"{"session":{"user":{"userId":"amzn1.ask.account.S"}},"request":{"type":"LaunchRequest"}}"#,
        );
        assert_eq!(env.user_id(), Some("amzn1.ask.account.S"));
        assert_eq!(env.route(), Route::Launch);
    }

    #[test]
    fn missing_user_is_none() {
        let env = parse(r#"{"request":{"type":"LaunchRequest"}}"#);
        assert_eq!(env.user_id(), None);
    }

    #[test]
    fn platform_intents() {
        for (name, route) in [
            (INTENT_STOP, Route::Stop),
            (INTENT_CANCEL, Route::Stop),
            (INTENT_HELP, Route::Help),
            (INTENT_POSITIVE, Route::PositiveMood),
            (INTENT_NEGATIVE, Route::NegativeMood),
            (INTENT_CLEAR_MEMORY, Route::ClearMemory),
        ] {
            let env = parse(&format!(
                r#"{{"request":{{"type":"IntentRequest","intent":{{"name":"{name}"}}}}}}"#
            ));
            assert_eq!(env.route(), route, "{name}");
            assert!(!env.route().is_conversational());
        }
    }

    #[test]
    fn fallback_intent_without_slot() {
        let env = parse(
            r#"{"request":{"type":"IntentRequest","intent":{"name":"AMAZON.FallbackIntent","slots":{}}}}"#,
        );
        assert_eq!(env.route(), Route::Conversation(None));
    }

    #[test]
    fn blank_name_slot_is_none() {
        let env = parse(
            r#"{"request":{"type":"IntentRequest","intent":{"name":"ProvideNameIntent","slots":{"UserName":{"name":"UserName","value":"  "}}}}}"#,
        );
        assert_eq!(env.route(), Route::ProvideName(None));
    }

    #[test]
    fn unknown_intent_with_text_is_conversation() {
        let env = parse(
            r#"{"request":{"type":"IntentRequest","intent":{"name":"WeatherIntent","slots":{"City":{"name":"City","value":"Puebla"}}}}}"#,
        );
        assert_eq!(env.route(), Route::Conversation(Some("Puebla".to_owned())));
        let env = parse(r#"{"request":{"type":"IntentRequest","intent":{"name":"WeatherIntent"}}}"#);
        assert_eq!(env.route(), Route::Unrecognized);
    }

    #[test]
    fn session_ended_and_unknown_types() {
        let env = parse(r#"{"request":{"type":"SessionEndedRequest","reason":"USER_INITIATED"}}"#);
        assert_eq!(
            env.route(),
            Route::SessionEnded(Some("USER_INITIATED".to_owned()))
        );
        let env = parse(r#"{"request":{"type":"CanFulfillIntentRequest"}}"#);
        assert_eq!(env.route(), Route::Unrecognized);
    }

    #[test]
    fn response_shape() {
        let open = ResponseEnvelope::speak("¡Hola!").ask("¿Cómo estás?");
        let json = serde_json::to_value(&open).expect("serialize");
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["response"]["outputSpeech"]["type"], "PlainText");
        assert_eq!(json["response"]["outputSpeech"]["text"], "¡Hola!");
        assert_eq!(json["response"]["reprompt"]["outputSpeech"]["text"], "¿Cómo estás?");
        assert_eq!(json["response"]["shouldEndSession"], false);
        assert!(!open.ends_session());

        let closed = ResponseEnvelope::speak("Adiós");
        assert!(closed.ends_session());
        assert!(serde_json::to_value(&closed).expect("serialize")["response"]["reprompt"].is_null());

        let empty = serde_json::to_value(ResponseEnvelope::empty()).expect("serialize");
        assert_eq!(empty["response"], serde_json::json!({}));
    }
}
