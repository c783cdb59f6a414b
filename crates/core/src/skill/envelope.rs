use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const RESPONSE_VERSION: &str = "1.0";
const PLAIN_TEXT: &str = "PlainText";

/// Voice-platform request, already authenticated upstream.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub context: Option<Context>,
    pub request: Request,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Context {
    #[serde(rename = "System", default)]
    pub system: Option<SystemState>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SystemState {
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    LaunchRequest(RequestMeta),
    IntentRequest(IntentRequest),
    SessionEndedRequest(SessionEndedRequest),
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntentRequest {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    pub intent: Intent,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndedRequest {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Intent {
    pub name: String,
    #[serde(default)]
    pub slots: BTreeMap<String, Slot>,
}

impl Intent {
    /// Trimmed slot value, `None` when absent or blank.
    pub fn slot_value(&self, slot: &str) -> Option<&str> {
        self.slots
            .get(slot)
            .and_then(|s| s.value.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// First non-blank slot value in slot-name order.
    pub fn any_slot_value(&self) -> Option<&str> {
        self.slots
            .values()
            .filter_map(|s| s.value.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl RequestEnvelope {
    /// Platform-issued stable user id, preferring the context block.
    pub fn user_id(&self) -> Option<&str> {
        let from_context = self
            .context
            .as_ref()
            .and_then(|c| c.system.as_ref())
            .and_then(|s| s.user.as_ref());
        let from_session = self.session.as_ref().and_then(|s| s.user.as_ref());
        from_context
            .or(from_session)
            .map(|u| u.user_id.trim())
            .filter(|id| !id.is_empty())
    }

    pub fn request_id(&self) -> Option<&str> {
        match &self.request {
            Request::LaunchRequest(meta) => meta.request_id.as_deref(),
            Request::IntentRequest(req) => req.request_id.as_deref(),
            Request::SessionEndedRequest(req) => req.request_id.as_deref(),
            Request::Unknown => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputSpeech {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl OutputSpeech {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: PLAIN_TEXT.to_owned(),
            text: text.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reprompt {
    pub output_speech: OutputSpeech,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_speech: Option<OutputSpeech>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprompt: Option<Reprompt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_end_session: Option<bool>,
}

/// Voice-platform response: spoken text plus whether the session stays open.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseEnvelope {
    pub version: String,
    pub response: ResponseBody,
}

impl ResponseEnvelope {
    /// A response with nothing to say, as required after a session ends.
    pub fn empty() -> Self {
        Self {
            version: RESPONSE_VERSION.to_owned(),
            response: ResponseBody::default(),
        }
    }

    /// Speaks `text` and closes the session.
    pub fn speak(text: impl Into<String>) -> Self {
        Self {
            version: RESPONSE_VERSION.to_owned(),
            response: ResponseBody {
                output_speech: Some(OutputSpeech::plain(text)),
                reprompt: None,
                should_end_session: Some(true),
            },
        }
    }

    /// Keeps the session open, re-asking with `reprompt` if the user is silent.
    pub fn ask(mut self, reprompt: impl Into<String>) -> Self {
        self.response.reprompt = Some(Reprompt {
            output_speech: OutputSpeech::plain(reprompt),
        });
        self.response.should_end_session = Some(false);
        self
    }

    pub fn speech(&self) -> Option<&str> {
        self.response.output_speech.as_ref().map(|s| s.text.as_str())
    }

    pub fn ends_session(&self) -> bool {
        self.response.should_end_session.unwrap_or(true)
    }
}
