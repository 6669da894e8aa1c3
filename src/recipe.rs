//! Structural validation of the model's output.
//!
//! The content string is untrusted. It is parsed into a generic [`Value`] first, the required
//! fields are checked for presence, and only then is it projected into the typed [`Recipe`].
//! Nothing here looks at what the fields say (GI values, step counts, ...).
use crate::models::Recipe;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("the AI returned no message content")]
    EmptyResponse,
    #[error("recipe could not be parsed as JSON: {0}")]
    Unparseable(#[source] serde_json::Error),
    #[error("recipe is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("recipe has an unexpected shape: {0}")]
    Shape(#[source] serde_json::Error),
}

/// Required fields, as JSON pointers, with the name reported when they are missing.
const REQUIRED_FIELDS: [(&str, &str, FieldKind); 3] = [
    ("/title", "title", FieldKind::String),
    ("/ingredients/provided", "ingredients.provided", FieldKind::Array),
    ("/instructions", "instructions", FieldKind::Array),
];

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    String,
    Array,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Array => value.is_array(),
        }
    }
}

pub fn validate(raw_content: Option<&str>) -> Result<Recipe, FormatError> {
    let content = raw_content
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .ok_or(FormatError::EmptyResponse)?;

    let value: Value = serde_json::from_str(content).map_err(FormatError::Unparseable)?;

    for (pointer, name, kind) in REQUIRED_FIELDS {
        if !value.pointer(pointer).is_some_and(|field| kind.matches(field)) {
            return Err(FormatError::MissingField(name));
        }
    }

    serde_json::from_value(value).map_err(FormatError::Shape)
}
