/// Number of leading token characters kept in logs
const TOKEN_PREVIEW_CHARS: usize = 6;

/// Shorten a token for logging: keeps a short prefix only.
pub fn redact_token(token: &str) -> String {
    if token.chars().count() <= TOKEN_PREVIEW_CHARS {
        "***".to_string()
    } else {
        let prefix: String = token.chars().take(TOKEN_PREVIEW_CHARS).collect();
        format!("{}...", prefix)
    }
}

/// Percent-encode a value for use inside a URL query component.
pub fn encode_component(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
