//! Secret detection and redaction utilities.
//!
//! Provider credentials travel as headers or, for some protocols, inside the
//! request URL. Everything that may end up in a log line or an error message
//! goes through these helpers first.

use url::Url;

/// The redacted placeholder string.
pub const REDACTED: &str = "[REDACTED]";

/// Query parameters that carry credentials.
const SECRET_QUERY_PARAMS: &[&str] = &["key", "api_key", "apikey", "token", "access_token"];

/// Checks if a key/variable name likely refers to a secret.
///
/// # Examples
///
/// ```
/// use polychat_shared::is_secret_key;
///
/// assert!(is_secret_key("apiKey"));
/// assert!(is_secret_key("x-api-key"));
/// assert!(is_secret_key("Authorization"));
/// assert!(!is_secret_key("model"));
/// ```
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_uppercase();
    key.contains("KEY")
        || key.contains("TOKEN")
        || key.contains("SECRET")
        || key.contains("PASSWORD")
        || key.contains("CREDENTIAL")
        || key.contains("AUTH")
}

/// Mask credential-bearing query parameters in a URL.
///
/// Unparseable input is returned fully redacted since it cannot be inspected.
///
/// ```
/// use polychat_shared::redact_url;
///
/// assert_eq!(
///     redact_url("https://api.example.com/v1?key=abc&alt=json"),
///     "https://api.example.com/v1?key=%5BREDACTED%5D&alt=json"
/// );
/// ```
pub fn redact_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return REDACTED.to_string();
    };
    if url.query().is_none() {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| {
            let lowered = name.to_ascii_lowercase();
            if SECRET_QUERY_PARAMS.contains(&lowered.as_str()) {
                (name.into_owned(), REDACTED.to_string())
            } else {
                (name.into_owned(), value.into_owned())
            }
        })
        .collect();
    url.query_pairs_mut().clear().extend_pairs(pairs);
    url.to_string()
}

/// A secret string wrapper that redacts on Display/Debug.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SecretString(Box<str>);

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<Box<str>>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true when the secret is blank.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value.into_boxed_str())
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_credential_header_names() {
        assert!(is_secret_key("authorization"));
        assert!(is_secret_key("x-api-key"));
        assert!(is_secret_key("x-goog-api-key"));
        assert!(is_secret_key("OPENAI_API_KEY"));
        assert!(is_secret_key("credential"));
    }

    #[test]
    fn rejects_non_secret_patterns() {
        assert!(!is_secret_key("content-type"));
        assert!(!is_secret_key("anthropic-version"));
        assert!(!is_secret_key("timeoutMs"));
        assert!(!is_secret_key("provider"));
    }

    #[test]
    fn redact_url_masks_only_credentials() {
        let masked = redact_url("https://host/v1beta/models/m:generateContent?key=secret"); // pragma: allowlist secret
        assert!(!masked.contains("secret"));
        assert!(masked.starts_with("https://host/v1beta/models/m:generateContent?key="));

        assert_eq!(redact_url("https://host/x"), "https://host/x");
        assert_eq!(redact_url("not a url"), REDACTED);
    }

    #[test]
    fn secret_string_redacts_display() {
        let secret = SecretString::new("shh");
        assert_eq!(secret.to_string(), REDACTED);
        assert_eq!(format!("{secret:?}"), REDACTED);
        assert_eq!(secret.expose(), "shh");
        assert!(SecretString::from("  ").is_blank());
    }
}
