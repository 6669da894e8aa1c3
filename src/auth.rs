/// Upstream credential lookup.
///
/// The key is looked up on every call and never copied into configuration or state, so rotating
/// the environment variable takes effect on the next request.
use axum::http::HeaderValue;
use axum::http::header::InvalidHeaderValue;

/// Where the bearer credential for the completion provider comes from.
pub trait ApiKeySource: std::fmt::Debug + Send + Sync {
    /// Returns the key, or `None` if it is unset or blank.
    fn api_key(&self) -> Option<String>;
}

/// Reads the key from an environment variable at call time.
#[derive(Debug, Clone)]
pub struct EnvApiKey {
    var: String,
}

impl EnvApiKey {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

impl ApiKeySource for EnvApiKey {
    fn api_key(&self) -> Option<String> {
        non_blank(std::env::var(&self.var).ok())
    }
}

/// A fixed key (or a fixed absence of one). Used by tests and embedders that manage secrets
/// themselves.
#[derive(Clone)]
pub struct StaticApiKey(Option<String>);

impl StaticApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Some(key.into()))
    }

    pub fn missing() -> Self {
        Self(None)
    }
}

impl ApiKeySource for StaticApiKey {
    fn api_key(&self) -> Option<String> {
        non_blank(self.0.clone())
    }
}

/// Never print the key itself.
impl std::fmt::Debug for StaticApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = if self.0.is_some() { "<redacted>" } else { "<missing>" };
        f.debug_tuple("StaticApiKey").field(&shown).finish()
    }
}

fn non_blank(key: Option<String>) -> Option<String> {
    key.filter(|key| !key.trim().is_empty())
}

/// Builds the `Authorization: Bearer ...` value, marked sensitive so it is redacted from
/// header debug output.
pub(crate) fn bearer_header(key: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {key}"))?;
    value.set_sensitive(true);
    Ok(value)
}
