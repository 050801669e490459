//! Normalized per-page crawl signals.
//!
//! Every field is defaulted (empty string, zero, empty list) so downstream
//! code only ever deals with "empty", never with "missing". Deserializing a
//! partial record fills the gaps the same way.

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

impl Heading {
    pub fn new(level: u8, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    pub src: String,
    pub has_alt: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentStats {
    pub word_count: u32,
    pub internal_links: u32,
    pub external_links: u32,
    pub broken_links: u32,
}

/// Observable attributes of one crawled page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSignals {
    pub url: String,
    /// `0` when no HTTP response was received.
    pub status_code: u16,
    pub title: String,
    pub meta_description: String,
    pub h1: String,
    pub headings: Vec<Heading>,
    pub images: Vec<Image>,
    pub content: ContentStats,
    pub canonical_url: String,
    /// Lowercased meta robots directives, e.g. `["noindex", "follow"]`.
    pub robots_directives: Vec<String>,
    /// `0` when timing was unavailable.
    pub load_time_ms: u64,
    pub content_length: u64,
    /// JSON-LD `@type` values found on the page.
    pub structured_data_types: Vec<String>,
    /// Empty when the page was fetched.
    pub fetch_error: String,
}

impl PageSignals {
    /// Degraded record for a page the fetch collaborator could not retrieve.
    pub fn unreachable(url: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            url: url.into(),
            fetch_error: if reason.is_empty() {
                "unknown fetch error".to_string()
            } else {
                reason
            },
            ..Default::default()
        }
    }

    pub fn was_fetched(&self) -> bool {
        self.status_code != 0 && self.fetch_error.is_empty()
    }

    /// Number of H1 headings. Falls back to the standalone `h1` field when the
    /// heading outline carries no level-1 entry.
    pub fn h1_count(&self) -> usize {
        let in_outline = self.headings.iter().filter(|h| h.level == 1).count();
        if in_outline == 0 && !self.h1.trim().is_empty() {
            1
        } else {
            in_outline
        }
    }

    pub fn images_missing_alt(&self) -> usize {
        self.images.iter().filter(|img| !img.has_alt).count()
    }

    pub fn is_https(&self) -> bool {
        Url::parse(&self.url)
            .map(|u| u.scheme() == "https")
            .unwrap_or(false)
    }

    pub fn has_robots_directive(&self, directive: &str) -> bool {
        self.robots_directives
            .iter()
            .any(|d| d.trim().eq_ignore_ascii_case(directive))
    }

    /// Title length in characters (not bytes).
    pub fn title_len(&self) -> usize {
        self.title.trim().chars().count()
    }

    pub fn meta_description_len(&self) -> usize {
        self.meta_description.trim().chars().count()
    }
}

/// Site-level facts shared by every page of one audit. `None` is "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteFacts {
    pub robots_txt: Option<bool>,
    pub sitemap: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let signals: PageSignals =
            serde_json::from_str(r#"{"url":"https://example.com/","status_code":200}"#).unwrap();

        assert_eq!(signals.title, "");
        assert!(signals.images.is_empty());
        assert_eq!(signals.content.word_count, 0);
        assert_eq!(signals.load_time_ms, 0);
        assert!(signals.was_fetched());
    }

    #[test]
    fn unreachable_is_not_fetched() {
        let signals = PageSignals::unreachable("https://example.com/x", "connection refused");
        assert!(!signals.was_fetched());
        assert_eq!(signals.fetch_error, "connection refused");

        let blank = PageSignals::unreachable("https://example.com/y", "");
        assert!(!blank.fetch_error.is_empty());
    }

    #[test]
    fn h1_count_prefers_outline() {
        let mut signals = PageSignals {
            h1: "Welcome".into(),
            ..Default::default()
        };
        assert_eq!(signals.h1_count(), 1);

        signals.headings = vec![Heading::new(1, "A"), Heading::new(2, "B"), Heading::new(1, "C")];
        assert_eq!(signals.h1_count(), 2);

        signals.h1.clear();
        signals.headings.clear();
        assert_eq!(signals.h1_count(), 0);
    }

    #[test]
    fn title_length_counts_chars() {
        let signals = PageSignals {
            title: "Café crème".into(),
            ..Default::default()
        };
        assert_eq!(signals.title_len(), 10);
    }

    #[test]
    fn https_detection() {
        let mut signals = PageSignals {
            url: "https://example.com".into(),
            ..Default::default()
        };
        assert!(signals.is_https());
        signals.url = "http://example.com".into();
        assert!(!signals.is_https());
        signals.url = "not a url".into();
        assert!(!signals.is_https());
    }
}
