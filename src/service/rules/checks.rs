//! Individual checks, one function per category.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::domain::models::{Category, CategoryKind, Check, CheckStatus};
use crate::domain::signals::{Heading, PageSignals, SiteFacts};

pub const TITLE_MIN_CHARS: usize = 50;
pub const TITLE_MAX_CHARS: usize = 60;
pub const META_DESCRIPTION_MIN_CHARS: usize = 120;
pub const META_DESCRIPTION_MAX_CHARS: usize = 160;
pub const URL_PATH_MAX_CHARS: usize = 75;
pub const MIN_WORD_COUNT: u32 = 300;
pub const IN_DEPTH_WORD_COUNT: u32 = 1000;
pub const MAX_LOAD_TIME_MS: u64 = 2500;
pub const MAX_HTML_BYTES: u64 = 2 * 1024 * 1024;

const NOT_FETCHED: &str = "page was not fetched";
const NOT_COLLECTED: &str = "signal not collected";

/// Accumulates the checks of one category.
struct Checks {
    category: CategoryKind,
    fetched: bool,
    items: Vec<Check>,
}

impl Checks {
    fn new(category: CategoryKind, signals: &PageSignals) -> Self {
        Self {
            category,
            fetched: signals.was_fetched(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, label: &str, status: CheckStatus, note: Option<String>) -> &mut Self {
        self.items.push(Check {
            category: self.category,
            label: label.to_string(),
            status,
            note,
        });
        self
    }

    /// Derived from the URL alone, so it is evaluated even for unfetched pages.
    fn verdict(&mut self, label: &str, ok: bool, fail_note: impl FnOnce() -> String) -> &mut Self {
        if ok {
            self.push(label, CheckStatus::Pass, None)
        } else {
            self.push(label, CheckStatus::Fail, Some(fail_note()))
        }
    }

    /// Needs page content; unknown when the page was not fetched.
    fn content(&mut self, label: &str, ok: bool, fail_note: impl FnOnce() -> String) -> &mut Self {
        if !self.fetched {
            return self.unknown(label, NOT_FETCHED);
        }
        self.verdict(label, ok, fail_note)
    }

    /// Like `content`, but the signal itself may be unavailable.
    fn maybe(
        &mut self,
        label: &str,
        ok: Option<bool>,
        unknown_note: &str,
        fail_note: impl FnOnce() -> String,
    ) -> &mut Self {
        match ok {
            None => self.unknown(label, unknown_note),
            Some(ok) => self.content(label, ok, fail_note),
        }
    }

    fn unknown(&mut self, label: &str, note: &str) -> &mut Self {
        self.push(label, CheckStatus::Unknown, Some(note.to_string()))
    }

    fn finish(self) -> Category {
        Category::new(self.category, self.items)
    }
}

// ====== Technical ======

pub fn crawlability(signals: &PageSignals, site: &SiteFacts) -> Category {
    let mut checks = Checks::new(CategoryKind::Crawlability, signals);
    let status = signals.status_code;

    checks
        .maybe(
            "HTTP status 2xx",
            (status != 0).then_some((200..300).contains(&status)),
            NOT_FETCHED,
            || format!("page returned status {status}"),
        )
        .content("Indexable (no noindex)", !signals.has_robots_directive("noindex"), || {
            "meta robots contains noindex".to_string()
        })
        .content("Canonical tag present", !signals.canonical_url.trim().is_empty(), || {
            "canonical tag missing".to_string()
        });

    match site.robots_txt {
        Some(found) => checks.verdict("robots.txt present", found, || "robots.txt not found".to_string()),
        None => checks.unknown("robots.txt present", "robots.txt availability unknown"),
    };
    match site.sitemap {
        Some(found) => checks.verdict("XML sitemap present", found, || "sitemap.xml not found".to_string()),
        None => checks.unknown("XML sitemap present", "sitemap availability unknown"),
    };

    checks.unknown("robots.txt rules allow crawling", "robots.txt content not collected");
    checks.finish()
}

pub fn performance(signals: &PageSignals) -> Category {
    let mut checks = Checks::new(CategoryKind::Performance, signals);
    let load = signals.load_time_ms;
    let size = signals.content_length;

    checks
        .maybe(
            "Load time ≤ 2500 ms",
            (load > 0).then_some(load <= MAX_LOAD_TIME_MS),
            "load time unavailable",
            || format!("slow page: loaded in {load} ms"),
        )
        .maybe(
            "HTML size ≤ 2 MB",
            (size > 0).then_some(size <= MAX_HTML_BYTES),
            "content length unavailable",
            || format!("large page: {} KB of HTML", size / 1024),
        )
        .unknown("Core Web Vitals", "field data not collected");
    checks.finish()
}

pub fn mobile(signals: &PageSignals) -> Category {
    let mut checks = Checks::new(CategoryKind::Mobile, signals);
    checks
        .unknown("Viewport configured", NOT_COLLECTED)
        .unknown("Tap targets sized", NOT_COLLECTED);
    checks.finish()
}

pub fn links(signals: &PageSignals) -> Category {
    let mut checks = Checks::new(CategoryKind::Links, signals);
    let stats = &signals.content;

    checks
        .content("No broken links", stats.broken_links == 0, || {
            format!("{} broken links", stats.broken_links)
        })
        .content("Has internal links", stats.internal_links > 0, || {
            "no internal links found".to_string()
        });
    checks.finish()
}

pub fn security(signals: &PageSignals) -> Category {
    let mut checks = Checks::new(CategoryKind::Security, signals);
    checks
        .verdict("Served over HTTPS", signals.is_https(), || {
            "page is not served over HTTPS".to_string()
        })
        .unknown("HSTS header", NOT_COLLECTED);
    checks.finish()
}

// ====== On-Page ======

pub fn meta_tags(signals: &PageSignals) -> Category {
    let mut checks = Checks::new(CategoryKind::MetaTags, signals);
    let title_len = signals.title_len();
    let description_len = signals.meta_description_len();

    checks
        .content(
            "Title length 50–60 chars",
            (TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&title_len),
            || format!("title is {title_len} chars"),
        )
        .content(
            "Meta description length 120–160 chars",
            (META_DESCRIPTION_MIN_CHARS..=META_DESCRIPTION_MAX_CHARS).contains(&description_len),
            || format!("meta description is {description_len} chars"),
        );
    checks.finish()
}

pub fn headings(signals: &PageSignals) -> Category {
    let mut checks = Checks::new(CategoryKind::Headings, signals);
    let h1_count = signals.h1_count();

    checks.content("Exactly one H1", h1_count == 1, || format!("found {h1_count} H1 headings"));

    if signals.headings.is_empty() {
        let note = if checks.fetched { "no heading outline" } else { NOT_FETCHED };
        checks.unknown("Heading hierarchy", note);
    } else {
        let jump = heading_jump(&signals.headings);
        checks.content("Heading hierarchy", jump.is_none(), || match jump {
            Some((from, to)) => format!("heading level jumps from h{from} to h{to}"),
            None => String::new(),
        });
    }
    checks.finish()
}

pub fn content(signals: &PageSignals) -> Category {
    let mut checks = Checks::new(CategoryKind::Content, signals);
    let words = signals.content.word_count;
    let url_problem = url_structure_problem(&signals.url);

    checks
        .content("Word count ≥ 300", words >= MIN_WORD_COUNT, || {
            format!("thin content: {words} words")
        })
        .verdict("SEO-friendly URL", url_problem.is_none(), || {
            url_problem.clone().unwrap_or_default()
        });
    checks.finish()
}

pub fn images(signals: &PageSignals) -> Category {
    let mut checks = Checks::new(CategoryKind::Images, signals);
    let missing = signals.images_missing_alt();
    let total = signals.images.len();

    checks.content("Images have alt text", missing == 0, || {
        format!("{missing} of {total} images missing alt text")
    });
    checks.finish()
}

pub fn schema(signals: &PageSignals) -> Category {
    let mut checks = Checks::new(CategoryKind::Schema, signals);
    checks.content(
        "Structured data present",
        !signals.structured_data_types.is_empty(),
        || "no JSON-LD structured data".to_string(),
    );
    checks.finish()
}

// ====== Advisory ======

pub fn off_page(signals: &PageSignals) -> Category {
    let mut checks = Checks::new(CategoryKind::OffPage, signals);
    checks.unknown("Backlink profile", "backlink data not collected");
    checks.finish()
}

pub fn user_experience(signals: &PageSignals) -> Category {
    let mut checks = Checks::new(CategoryKind::UserExperience, signals);
    checks.unknown("Intrusive interstitials", NOT_COLLECTED);
    checks.finish()
}

pub fn content_strategy(signals: &PageSignals) -> Category {
    let mut checks = Checks::new(CategoryKind::ContentStrategy, signals);
    let words = signals.content.word_count;
    checks.content(
        "In-depth content (≥ 1000 words)",
        words >= IN_DEPTH_WORD_COUNT,
        || format!("{words} words; consider expanding topical coverage"),
    );
    checks.finish()
}

// ====== Helpers ======

/// First consecutive pair whose level increases by more than one.
pub fn heading_jump(headings: &[Heading]) -> Option<(u8, u8)> {
    headings
        .windows(2)
        .map(|pair| (pair[0].level, pair[1].level))
        .find(|(from, to)| *to > from.saturating_add(1))
}

/// Why a URL path is not SEO friendly, or `None` when it is.
pub fn url_structure_problem(raw: &str) -> Option<String> {
    static SEGMENT: OnceLock<Option<Regex>> = OnceLock::new();
    let segment_re =
        SEGMENT.get_or_init(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*(?:\.[a-z0-9]+)?$").ok());

    let Ok(url) = Url::parse(raw) else {
        return Some("URL could not be parsed".to_string());
    };

    if url.query().is_some() {
        return Some("URL has a query string".to_string());
    }

    let path = url.path();
    let path_len = path.chars().count();
    if path_len > URL_PATH_MAX_CHARS {
        return Some(format!("URL path is {path_len} chars"));
    }
    if path.contains('_') {
        return Some("URL path contains underscores".to_string());
    }
    if path != path.to_lowercase() {
        return Some("URL path contains uppercase characters".to_string());
    }

    path.split('/')
        .filter(|segment| !segment.is_empty())
        .find(|segment| segment_re.as_ref().is_some_and(|re| !re.is_match(segment)))
        .map(|segment| format!("URL segment '{segment}' is not hyphen-separated"))
}
