/// Wire types: the inbound request, the chat-completion envelope we send and receive, and the
/// recipe we hand back.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A validated inbound request. `ingredients` is already trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeRequest {
    pub ingredients: String,
}

/// Body of the POST to the chat-completion endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest<'a> {
    pub(crate) model: &'a str,
    pub(crate) messages: Vec<ChatMessage<'a>>,
    pub(crate) temperature: f64,
    pub(crate) response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub(crate) role: &'static str,
    pub(crate) content: &'a str,
}

impl<'a> ChatMessage<'a> {
    pub(crate) fn user(content: &'a str) -> Self {
        Self {
            role: "user",
            content,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    pub(crate) kind: &'static str,
}

impl ResponseFormat {
    pub(crate) fn json_object() -> Self {
        Self {
            kind: "json_object",
        }
    }
}

/// Lenient view of a chat-completion response. Everything except
/// `choices[].message.content` is ignored, and every level may be missing.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    /// Kept as a raw value so a non-string content counts as "no content" instead of a
    /// deserialization failure.
    #[serde(default)]
    content: Option<Value>,
}

impl ChatCompletionResponse {
    /// The first choice's message content, if it is a string.
    pub(crate) fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| match message.content {
                Some(Value::String(content)) => Some(content),
                _ => None,
            })
    }
}

/// The `{"error": {"message": ...}}` body OpenAI-compatible providers send with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct UpstreamErrorBody {
    #[serde(default)]
    error: Option<UpstreamErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

impl UpstreamErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.error
            .and_then(|detail| detail.message)
            .filter(|message| !message.trim().is_empty())
    }
}

/// A recipe as returned to the caller.
///
/// Only `title`, `ingredients.provided` and `instructions` are typed. Everything else, from
/// `nutrition` and `tips` to fields the model invents, stays raw JSON in `extra` so the caller
/// sees the model's output unmodified, explicit `null`s included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub title: String,
    pub ingredients: RecipeIngredients,
    pub instructions: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Recipe {
    /// Nutrition figures, free-form (`{"carbs": "8g"}`, `"about 250 kcal"`, ...).
    pub fn nutrition(&self) -> Option<&Value> {
        self.extra.get("nutrition")
    }

    pub fn tips(&self) -> Option<&Value> {
        self.extra.get("tips")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredients {
    pub provided: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecipeIngredients {
    pub fn optional(&self) -> Option<&Value> {
        self.extra.get("optional")
    }
}
