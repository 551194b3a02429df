//! Link preview extraction.
//!
//! Pulls an allow-listed set of Open Graph properties out of a fetched page,
//! falling back to `<title>` and `<meta name="description">` when the page
//! has no Open Graph equivalent.
//!
//! ### Rules
//! - `<meta property="og:*" content="...">` is matched regardless of
//!   attribute order. When a property repeats, the last one wins.
//! - Keys are stored without the `og:` prefix (`og:site_name` → `site_name`).
//! - Titles keep at most 10 words and descriptions 20, with an ellipsis on cut.
//! - Broken markup never fails; at worst the preview is empty.

pub mod normalize;

pub use normalize::{ELLIPSIS, collapse_whitespace, trim_words};

use linkpeek_core::Preview;
use linkpeek_core::config::DEFAULT_PREVIEW_PROPERTIES;
use scraper::{Html, Selector};
use std::sync::LazyLock;

/// Word limit for `title`.
pub const TITLE_MAX_WORDS: usize = 10;

/// Word limit for `description`.
pub const DESCRIPTION_MAX_WORDS: usize = 20;

const OG_PREFIX: &str = "og:";

static META_PROPERTY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[property][content]").expect("invalid selector"));
static META_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[name][content]").expect("invalid selector"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").expect("invalid selector"));

/// Which Open Graph properties to keep.
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// Property names without the `og:` prefix.
    pub properties: Vec<String>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { properties: DEFAULT_PREVIEW_PROPERTIES.iter().map(|p| p.to_string()).collect() }
    }
}

impl PreviewConfig {
    pub fn new(properties: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { properties: properties.into_iter().map(Into::into).collect() }
    }

    fn allows(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p.eq_ignore_ascii_case(property))
    }
}

/// Extract a preview from an HTML document.
pub fn extract_preview(html: &str, config: &PreviewConfig) -> Preview {
    let document = Html::parse_document(html);
    let mut preview = Preview::new();

    for element in document.select(&META_PROPERTY) {
        let (Some(property), Some(content)) = (element.value().attr("property"), element.value().attr("content"))
        else {
            continue;
        };

        let Some(key) = strip_og_prefix(property.trim()) else {
            continue;
        };

        if !config.allows(key) {
            continue;
        }

        let value = collapse_whitespace(content);
        if !value.is_empty() {
            preview.insert(key.to_ascii_lowercase(), value);
        }
    }

    if config.allows("title")
        && !preview.contains_key("title")
        && let Some(title) = document.select(&TITLE).next()
    {
        let value = collapse_whitespace(&title.text().collect::<String>());
        if !value.is_empty() {
            preview.insert("title".to_string(), value);
        }
    }

    if config.allows("description") && !preview.contains_key("description") {
        let fallback = document
            .select(&META_NAME)
            .filter(|el| el.value().attr("name").is_some_and(|n| n.trim().eq_ignore_ascii_case("description")))
            .filter_map(|el| el.value().attr("content"))
            .map(collapse_whitespace)
            .filter(|v| !v.is_empty())
            .last();
        if let Some(value) = fallback {
            preview.insert("description".to_string(), value);
        }
    }

    if let Some(title) = preview.get_mut("title") {
        *title = trim_words(title, TITLE_MAX_WORDS);
    }
    if let Some(description) = preview.get_mut("description") {
        *description = trim_words(description, DESCRIPTION_MAX_WORDS);
    }

    preview
}

fn strip_og_prefix(property: &str) -> Option<&str> {
    let head = property.get(..OG_PREFIX.len())?;
    if head.eq_ignore_ascii_case(OG_PREFIX) {
        Some(&property[OG_PREFIX.len()..]).filter(|rest| !rest.is_empty())
    } else {
        None
    }
}
