//! Target URL normalization for stable entry keys.

/// Error type for URL normalization failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("missing host")]
    MissingHost,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for linkpeek_core::Error {
    fn from(err: UrlError) -> Self {
        linkpeek_core::Error::InvalidUrl(err.to_string())
    }
}

/// Normalize a link target so equal links hash to the same entry key.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Require an absolute `http`/`https` URL with a host (no scheme is guessed)
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn normalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    let host = parsed.host_str().filter(|h| !h.is_empty()).ok_or(UrlError::MissingHost)?;
    let lowered = host.to_lowercase();
    if lowered != host {
        parsed
            .set_host(Some(&lowered))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}
