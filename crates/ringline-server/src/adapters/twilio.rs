//! Twilio telephony gateway
//!
//! REST calls are form-encoded with HTTP basic auth; voice response
//! documents are rendered as TwiML.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;

use ringline::{DomainError, OriginNumber, PlaceCall, PlacedCall, TelephonyGateway, Verb, VoiceResponse};

use crate::config::TwilioConfig;

const API_BASE: &str = "https://api.twilio.com/2010-04-01";
const NUMBERS_PAGE_SIZE: &str = "20";

pub struct TwilioGateway {
    client: Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    voice: String,
}

#[derive(Deserialize)]
struct CallResource {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct IncomingNumbersPage {
    #[serde(default)]
    incoming_phone_numbers: Vec<IncomingNumber>,
}

#[derive(Deserialize)]
struct IncomingNumber {
    phone_number: String,
    #[serde(default)]
    friendly_name: Option<String>,
}

#[derive(Deserialize)]
struct TwilioError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

impl TwilioGateway {
    pub fn new(config: &TwilioConfig, timeout: Duration) -> Self {
        Self::with_api_base(config, timeout, API_BASE)
    }

    pub fn with_api_base(config: &TwilioConfig, timeout: Duration, api_base: &str) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
            voice: config.voice.clone(),
        }
    }

    fn account_url(&self, path: &str) -> String {
        format!("{}/Accounts/{}/{}", self.api_base, self.account_sid, path)
    }

    /// Turn a non-2xx reply into an error carrying Twilio's own message
    async fn check(response: Response, action: &str) -> Result<Response, DomainError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<TwilioError>(&body)
            .ok()
            .and_then(|e| match (e.code, e.message) {
                (Some(code), Some(message)) => Some(format!("{message} (code {code})")),
                (None, Some(message)) => Some(message),
                _ => None,
            })
            .unwrap_or(body);

        Err(DomainError::ExternalService(format!(
            "Twilio failed {action} ({status}): {detail}"
        )))
    }

    fn transport(action: &str) -> impl FnOnce(reqwest::Error) -> DomainError + '_ {
        move |e| {
            if e.is_timeout() {
                DomainError::ExternalService(format!("Twilio timed out {action}"))
            } else {
                DomainError::ExternalService(format!("Twilio request failed {action}: {e}"))
            }
        }
    }
}

#[async_trait]
impl TelephonyGateway for TwilioGateway {
    async fn place_call(&self, request: &PlaceCall) -> Result<PlacedCall, DomainError> {
        let from = request.from.as_deref().unwrap_or(&self.from_number);
        let response = self
            .client
            .post(self.account_url("Calls.json"))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", request.to.as_str()),
                ("From", from),
                ("Url", request.connected_url.as_str()),
                ("Method", "POST"),
                ("StatusCallback", request.status_url.as_str()),
                ("StatusCallbackMethod", "POST"),
            ])
            .send()
            .await
            .map_err(Self::transport("placing call"))?;

        let call: CallResource = Self::check(response, "placing call")
            .await?
            .json()
            .await
            .map_err(|e| DomainError::ExternalService(format!("Invalid Twilio call resource: {e}")))?;

        Ok(PlacedCall {
            gateway_ref: call.sid,
            status: call.status.unwrap_or_else(|| "queued".to_string()),
        })
    }

    async fn end_call(&self, gateway_ref: &str) -> Result<(), DomainError> {
        let response = self
            .client
            .post(self.account_url(&format!("Calls/{gateway_ref}.json")))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("Status", "completed")])
            .send()
            .await
            .map_err(Self::transport("ending call"))?;

        Self::check(response, "ending call").await.map(|_| ())
    }

    async fn list_numbers(&self) -> Result<Vec<OriginNumber>, DomainError> {
        let response = self
            .client
            .get(self.account_url("IncomingPhoneNumbers.json"))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .query(&[("PageSize", NUMBERS_PAGE_SIZE)])
            .send()
            .await
            .map_err(Self::transport("listing numbers"))?;

        let page: IncomingNumbersPage = Self::check(response, "listing numbers")
            .await?
            .json()
            .await
            .map_err(|e| DomainError::ExternalService(format!("Invalid Twilio numbers page: {e}")))?;

        Ok(page
            .incoming_phone_numbers
            .into_iter()
            .map(|n| OriginNumber {
                friendly_name: n.friendly_name.unwrap_or_else(|| n.phone_number.clone()),
                phone_number: n.phone_number,
            })
            .collect())
    }

    fn render(&self, response: &VoiceResponse) -> String {
        render_twiml(response, &self.voice)
    }

    fn content_type(&self) -> &'static str {
        "text/xml"
    }

    fn name(&self) -> &str {
        "twilio"
    }
}

/// Built-in and prefixed voice families `<Say>` accepts
const BUILTIN_VOICES: [&str; 3] = ["alice", "man", "woman"];
const VOICE_FAMILIES: [&str; 2] = ["Polly.", "Google."];

/// The document's voice when Twilio can speak it, else `default_voice`
fn say_voice<'a>(response: &'a VoiceResponse, default_voice: &'a str) -> &'a str {
    match response.voice.as_deref() {
        Some(voice)
            if BUILTIN_VOICES.contains(&voice)
                || VOICE_FAMILIES.iter().any(|family| voice.starts_with(family)) =>
        {
            voice
        }
        _ => default_voice,
    }
}

fn say(voice: &str, text: &str) -> String {
    format!(
        "<Say voice=\"{}\">{}</Say>",
        escape_xml(voice),
        escape_xml(text)
    )
}

/// Render a response document as TwiML
pub fn render_twiml(response: &VoiceResponse, default_voice: &str) -> String {
    let voice = say_voice(response, default_voice);
    let mut twiml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>");
    for verb in &response.verbs {
        match verb {
            Verb::Say { text } => twiml.push_str(&say(voice, text)),
            Verb::Gather { action, prompt } => {
                let open = format!(
                    "<Gather input=\"speech\" action=\"{}\" method=\"POST\" speechTimeout=\"3\" timeout=\"10\"",
                    escape_xml(action)
                );
                match prompt {
                    Some(prompt) => {
                        twiml.push_str(&format!("{open}>{}</Gather>", say(voice, prompt)))
                    }
                    None => twiml.push_str(&format!("{open}/>")),
                }
            }
            Verb::Redirect { url } => twiml.push_str(&format!(
                "<Redirect method=\"POST\">{}</Redirect>",
                escape_xml(url)
            )),
            Verb::Hangup => twiml.push_str("<Hangup/>"),
        }
    }
    twiml.push_str("</Response>");
    twiml
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}
