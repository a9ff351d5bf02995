//! Voice Response Document
//!
//! Gateway-neutral instruction set returned from every callback. Gateways
//! render it into their own markup (see `TelephonyGateway::render`).

use serde::{Deserialize, Serialize};

/// Spoken when a callback cannot be handled at all
pub const TECHNICAL_DIFFICULTIES: &str =
    "I'm sorry, I'm experiencing technical difficulties. Goodbye.";

/// Spoken while listening after the opening line
pub const OPENING_PROMPT: &str = "Please tell me how I can help you.";
/// Spoken while listening after every later reply
pub const CONTINUE_PROMPT: &str = "Please continue.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verb")]
pub enum Verb {
    /// Speak text to the callee
    Say { text: String },
    /// Listen for speech and post the transcript to `action`, speaking
    /// `prompt` while waiting
    Gather {
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
    },
    /// Fetch the next document from `url` (used when gather hears nothing)
    Redirect { url: String },
    /// End the call
    Hangup,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceResponse {
    pub verbs: Vec<Verb>,
    /// Voice requested for this call; gateways fall back to their own
    /// default when they do not offer it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

impl VoiceResponse {
    /// Acknowledge without instructions
    pub fn empty() -> Self {
        Self::default()
    }

    /// Speak, listen for a reply, and fall through to the gather endpoint on silence
    pub fn speak_then_listen(text: impl Into<String>, gather_url: &str) -> Self {
        Self {
            verbs: vec![
                Verb::Say { text: text.into() },
                Verb::Gather {
                    action: gather_url.to_string(),
                    prompt: Some(CONTINUE_PROMPT.to_string()),
                },
                Verb::Redirect {
                    url: gather_url.to_string(),
                },
            ],
            voice: None,
        }
    }

    /// Replace what the gather speaks while listening
    pub fn with_prompt(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        for verb in &mut self.verbs {
            if let Verb::Gather { prompt, .. } = verb {
                *prompt = Some(text.clone());
            }
        }
        self
    }

    pub fn in_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn speak_then_hangup(text: impl Into<String>) -> Self {
        Self {
            verbs: vec![Verb::Say { text: text.into() }, Verb::Hangup],
            voice: None,
        }
    }

    pub fn hangup() -> Self {
        Self {
            verbs: vec![Verb::Hangup],
            voice: None,
        }
    }

    pub fn apology_hangup() -> Self {
        Self::speak_then_hangup(TECHNICAL_DIFFICULTIES)
    }

    pub fn ends_call(&self) -> bool {
        self.verbs.iter().any(|v| matches!(v, Verb::Hangup))
    }

    pub fn listens(&self) -> bool {
        self.verbs.iter().any(|v| matches!(v, Verb::Gather { .. }))
    }

    /// Text of every top-level `Say` verb, in order
    pub fn spoken(&self) -> Vec<&str> {
        self.verbs
            .iter()
            .filter_map(|v| match v {
                Verb::Say { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}
