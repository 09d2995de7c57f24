#![forbid(unsafe_code)]

//! AI-written dialogue for a site.
//!
//! The pipeline is: fetch the site's landing page, strip it down to text
//! ([`extract_site_text`]), build a system and user prompt
//! ([`build_prompts`]), send them to a chat model, and decode the reply
//! ([`parse_generated_dialogue`]). Network steps sit behind [`PageFetcher`]
//! and [`ChatBackend`]; [`SiteDialogueGenerator`] wires them together.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::discovery::PageFetcher;

/// Longest site excerpt handed to the model, in characters.
pub const SITE_TEXT_LIMIT: usize = 5000;

/// User prompt body when the site yielded no text.
pub const NO_CONTENT_FALLBACK: &str =
    "No content was found. Just generate some friendly greetings based on the personality.";

pub const CHAT_MODEL: &str = "deepseek-chat";
pub const CHAT_MAX_TOKENS: u32 = 2000;
pub const CHAT_TEMPERATURE: f64 = 0.9;

static BODY: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?is)<body[^>]*>(.*)</body>").ok());
static TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());
static SPACE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+").ok());

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The request is missing something the pipeline needs.
    InvalidRequest(String),
    /// The model replied with something other than `{"dialogue": [..]}`.
    Format(String),
    /// The chat backend failed.
    Backend(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::InvalidRequest(reason) => write!(f, "invalid request: {reason}"),
            GenerationError::Format(reason) => {
                write!(f, "the AI returned an unexpected format: {reason}")
            }
            GenerationError::Backend(reason) => write!(f, "chat backend error: {reason}"),
        }
    }
}

impl std::error::Error for GenerationError {}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

/// What the editor asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub website_url: String,
    pub personality_base: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

/// What the editor gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerationResponse {
    Dialogue { dialogue: Vec<String> },
    Error { error: String },
}

impl From<Result<Vec<String>, GenerationError>> for GenerationResponse {
    fn from(result: Result<Vec<String>, GenerationError>) -> Self {
        match result {
            Ok(dialogue) => GenerationResponse::Dialogue { dialogue },
            Err(err) => GenerationResponse::Error {
                error: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// Body of a chat-completions call in JSON-object mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: &'static str,
    pub messages: Vec<ChatMessage>,
    pub response_format: Value,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl From<Prompts> for ChatRequest {
    fn from(prompts: Prompts) -> Self {
        Self {
            model: CHAT_MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompts.system,
                },
                ChatMessage {
                    role: "user",
                    content: prompts.user,
                },
            ],
            response_format: serde_json::json!({ "type": "json_object" }),
            max_tokens: CHAT_MAX_TOKENS,
            temperature: CHAT_TEMPERATURE,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pure steps
// ─────────────────────────────────────────────────────────────────────────────

/// Visible text of the page body: tags become spaces, whitespace runs
/// collapse, and the result is capped at [`SITE_TEXT_LIMIT`] characters.
///
/// A page without a `<body>` yields an empty string.
#[must_use]
pub fn extract_site_text(html: &str) -> String {
    let (Some(body), Some(tag), Some(space)) = (&*BODY, &*TAG, &*SPACE) else {
        return String::new();
    };
    let Some(inner) = body.captures(html).and_then(|c| c.get(1)) else {
        return String::new();
    };
    let untagged = tag.replace_all(inner.as_str(), " ");
    let collapsed = space.replace_all(&untagged, " ");
    collapsed.trim().chars().take(SITE_TEXT_LIMIT).collect()
}

#[must_use]
pub fn build_prompts(request: &GenerationRequest, site_text: &str) -> Prompts {
    let instructions = match request.custom_instructions.as_deref().map(str::trim) {
        Some(extra) if !extra.is_empty() => format!("Follow these special instructions: {extra}\n"),
        _ => String::new(),
    };
    let system = format!(
        "You are an AI assistant that generates dialogue for a website character.\n\
         Your base personality is: {personality}.\n\
         {instructions}\
         Based on the website content provided, generate a list of 20 to 40 short, engaging, and distinct sentences that the character could say to a new visitor.\n\
         The output MUST be a valid JSON array of strings inside a JSON object with a \"dialogue\" key. \
         For example: {{\"dialogue\": [\"Hello there!\", \"Welcome to the site.\", \"This place is cool!\", \"...\"]}}",
        personality = request.personality_base,
    );
    let content = if site_text.is_empty() {
        NO_CONTENT_FALLBACK
    } else {
        site_text
    };
    Prompts {
        system,
        user: format!("Website Content: \"{content}\""),
    }
}

/// Decode the model's reply into dialogue lines.
pub fn parse_generated_dialogue(content: &str) -> Result<Vec<String>, GenerationError> {
    let value: Value = serde_json::from_str(content)
        .map_err(|err| GenerationError::Format(format!("reply is not JSON: {err}")))?;
    let Some(lines) = value.get("dialogue").and_then(Value::as_array) else {
        return Err(GenerationError::Format(
            "no array in the 'dialogue' key".into(),
        ));
    };
    lines
        .iter()
        .map(|line| {
            line.as_str()
                .map(str::to_string)
                .ok_or_else(|| GenerationError::Format(format!("non-string line {line}")))
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Services
// ─────────────────────────────────────────────────────────────────────────────

/// Produces dialogue for a site.
pub trait DialogueGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<String>, GenerationError>;
}

/// A chat-completions endpoint. Returns the assistant message content.
pub trait ChatBackend {
    fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError>;
}

impl<T: ChatBackend + ?Sized> ChatBackend for &T {
    fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError> {
        (**self).complete(request)
    }
}

/// [`DialogueGenerator`] that reads the site itself before asking the model.
#[derive(Debug, Clone)]
pub struct SiteDialogueGenerator<F, C> {
    fetcher: F,
    chat: C,
}

impl<F: PageFetcher, C: ChatBackend> SiteDialogueGenerator<F, C> {
    pub fn new(fetcher: F, chat: C) -> Self {
        Self { fetcher, chat }
    }

    fn site_text(&self, website_url: &str) -> String {
        let Ok(url) = Url::parse(website_url) else {
            tracing::warn!(website_url, "site URL does not parse; generating without content");
            return String::new();
        };
        match self.fetcher.get(&url) {
            Ok(html) => extract_site_text(&html),
            Err(err) => {
                tracing::warn!(%err, "site fetch failed; generating without content");
                String::new()
            }
        }
    }
}

impl<F: PageFetcher, C: ChatBackend> DialogueGenerator for SiteDialogueGenerator<F, C> {
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<String>, GenerationError> {
        if request.personality_base.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("personalityBase is required".into()));
        }
        let site_text = self.site_text(&request.website_url);
        let chat = ChatRequest::from(build_prompts(request, &site_text));
        let reply = self.chat.complete(&chat)?;
        parse_generated_dialogue(&reply).inspect_err(|err| {
            tracing::warn!(%err, reply = %reply, "unusable model reply");
        })
    }
}
