//! Issue synthesis: one deduplicated, priority-tagged issue list per page.
//!
//! Sources are merged in a fixed order:
//! 1. externally supplied analyzer issues (structured, or free text classified
//!    by keyword)
//! 2. synthetic issues derived from the page signals
//! 3. failing checks from categories not already covered by (2)
//!
//! Identical text (case-insensitive, surrounding whitespace ignored) is kept
//! once with its first priority. Output keeps insertion order.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::models::{Category, CategoryKind, Check, Issue, IssuePriority};
use crate::domain::signals::PageSignals;
use crate::service::rules::checks::{
    META_DESCRIPTION_MAX_CHARS, META_DESCRIPTION_MIN_CHARS, MIN_WORD_COUNT, TITLE_MAX_CHARS,
    TITLE_MIN_CHARS,
};

/// Image count at which missing alt text becomes High priority.
pub const MANY_IMAGES_MISSING_ALT: usize = 10;

/// Categories whose failures are already reported as synthetic issues.
pub const SUPPRESSED_CHECK_CATEGORIES: [CategoryKind; 4] = [
    CategoryKind::MetaTags,
    CategoryKind::Headings,
    CategoryKind::Content,
    CategoryKind::Images,
];

// ====== Analyzer contract ======

/// Issue types an upstream analyzer can report without free text guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    BrokenLink,
    ServerError,
    ClientError,
    Timeout,
    RedirectLoop,
    Noindex,
    RobotsBlocked,
    CanonicalProblem,
    DuplicateContent,
    MissingH1,
    MultipleH1,
    MissingMetaDescription,
    MissingAltText,
    TitleLength,
    DescriptionLength,
    SlowPage,
    LargePage,
    ThinContent,
    Other,
}

impl IssueKind {
    pub fn priority(&self) -> IssuePriority {
        match self {
            IssueKind::BrokenLink
            | IssueKind::ServerError
            | IssueKind::ClientError
            | IssueKind::Timeout
            | IssueKind::RedirectLoop => IssuePriority::Critical,
            IssueKind::Noindex
            | IssueKind::RobotsBlocked
            | IssueKind::CanonicalProblem
            | IssueKind::DuplicateContent
            | IssueKind::MissingH1
            | IssueKind::MultipleH1
            | IssueKind::MissingMetaDescription => IssuePriority::High,
            IssueKind::MissingAltText
            | IssueKind::TitleLength
            | IssueKind::DescriptionLength
            | IssueKind::SlowPage
            | IssueKind::LargePage
            | IssueKind::ThinContent => IssuePriority::Medium,
            IssueKind::Other => IssuePriority::Low,
        }
    }
}

/// One issue reported by the narrative analyzer.
///
/// Plain strings deserialize as `Freeform`; `{"kind": .., "text": ..}` objects
/// as `Structured`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalyzerIssue {
    Structured { kind: IssueKind, text: String },
    Freeform(String),
}

impl AnalyzerIssue {
    pub fn text(&self) -> &str {
        match self {
            AnalyzerIssue::Structured { text, .. } => text,
            AnalyzerIssue::Freeform(text) => text,
        }
    }

    pub fn priority(&self) -> IssuePriority {
        match self {
            AnalyzerIssue::Structured { kind, .. } => kind.priority(),
            AnalyzerIssue::Freeform(text) => classify(text),
        }
    }
}

impl From<String> for AnalyzerIssue {
    fn from(text: String) -> Self {
        AnalyzerIssue::Freeform(text)
    }
}

impl From<&str> for AnalyzerIssue {
    fn from(text: &str) -> Self {
        AnalyzerIssue::Freeform(text.to_string())
    }
}

/// Per-URL output of the narrative analyzer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeFindings {
    #[serde(alias = "criticalIssues")]
    pub critical_issues: Vec<AnalyzerIssue>,
    pub opportunities: Vec<String>,
    pub recommendations: Vec<String>,
}

impl NarrativeFindings {
    /// Opportunities then recommendations, as carried on the page result.
    pub fn advice(&self) -> Vec<String> {
        self.opportunities
            .iter()
            .chain(self.recommendations.iter())
            .cloned()
            .collect()
    }
}

// ====== Keyword classifier ======

fn keyword_rules() -> &'static [(Regex, IssuePriority)] {
    static RULES: OnceLock<Vec<(Regex, IssuePriority)>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (r"(?i)broken|error|5xx|4xx|404|timeout|redirect loop", IssuePriority::Critical),
            (
                r"(?i)noindex|robots|canonical|duplicate content|multiple h1|missing h1|missing meta description",
                IssuePriority::High,
            ),
            (
                r"(?i)missing alt|title too (long|short)|description too (long|short)|slow|large",
                IssuePriority::Medium,
            ),
        ]
        .into_iter()
        .filter_map(|(pattern, priority)| Regex::new(pattern).ok().map(|re| (re, priority)))
        .collect()
    })
}

/// Fallback priority for unstructured analyzer text.
pub fn classify(text: &str) -> IssuePriority {
    keyword_rules()
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, priority)| *priority)
        .unwrap_or(IssuePriority::Low)
}

// ====== Category -> priority ======

/// Priority for a failing check, or `None` when its category is suppressed.
pub fn check_priority(kind: CategoryKind, note: Option<&str>) -> Option<IssuePriority> {
    let priority = match kind {
        CategoryKind::MetaTags
        | CategoryKind::Headings
        | CategoryKind::Content
        | CategoryKind::Images => return None,
        CategoryKind::Security => IssuePriority::Critical,
        CategoryKind::Crawlability => IssuePriority::High,
        CategoryKind::Performance | CategoryKind::Mobile => IssuePriority::Medium,
        CategoryKind::Links => {
            let broken = note.is_some_and(|n| n.to_lowercase().contains("broken"));
            if broken {
                IssuePriority::High
            } else {
                IssuePriority::Medium
            }
        }
        CategoryKind::Schema => IssuePriority::Medium,
        CategoryKind::OffPage | CategoryKind::UserExperience | CategoryKind::ContentStrategy => {
            IssuePriority::Low
        }
    };
    Some(priority)
}

fn check_issue_text(check: &Check) -> String {
    match check.note.as_deref() {
        Some(note) if !note.is_empty() => format!("{}: {}", check.label, note),
        _ => check.label.clone(),
    }
}

// ====== Synthesis ======

/// Insertion-ordered issue list with first-wins deduplication.
#[derive(Debug, Default)]
struct IssueList {
    seen: HashSet<String>,
    issues: Vec<Issue>,
}

impl IssueList {
    fn push(&mut self, text: impl Into<String>, priority: IssuePriority) {
        let text = text.into();
        let key = normalize(&text);
        if key.is_empty() || !self.seen.insert(key) {
            return;
        }
        self.issues.push(Issue::new(text.trim(), priority));
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Issues derived directly from the page signals.
pub fn signal_issues(signals: &PageSignals) -> Vec<Issue> {
    let mut issues = Vec::new();

    if !signals.was_fetched() {
        let reason = if signals.fetch_error.is_empty() {
            format!("HTTP status {}", signals.status_code)
        } else {
            signals.fetch_error.clone()
        };
        issues.push(Issue::new(
            format!("Page could not be fetched: {reason}"),
            IssuePriority::Critical,
        ));
        return issues;
    }

    match signals.h1_count() {
        0 => issues.push(Issue::new("Missing H1 on page", IssuePriority::High)),
        1 => {}
        n => issues.push(Issue::new(format!("Multiple H1 tags on page ({n})"), IssuePriority::High)),
    }

    let description_len = signals.meta_description_len();
    if description_len == 0 {
        issues.push(Issue::new("Missing meta description", IssuePriority::High));
    } else if description_len < META_DESCRIPTION_MIN_CHARS {
        issues.push(Issue::new(
            format!("Meta description too short ({description_len} chars)"),
            IssuePriority::Medium,
        ));
    } else if description_len > META_DESCRIPTION_MAX_CHARS {
        issues.push(Issue::new(
            format!("Meta description too long ({description_len} chars)"),
            IssuePriority::Medium,
        ));
    }

    let title_len = signals.title_len();
    if title_len == 0 {
        issues.push(Issue::new("Missing title tag", IssuePriority::High));
    } else if title_len < TITLE_MIN_CHARS {
        issues.push(Issue::new(
            format!("Title too short ({title_len} chars)"),
            IssuePriority::Low,
        ));
    } else if title_len > TITLE_MAX_CHARS {
        issues.push(Issue::new(
            format!("Title too long ({title_len} chars)"),
            IssuePriority::Low,
        ));
    }

    let missing_alt = signals.images_missing_alt();
    if missing_alt > 0 {
        let priority = if missing_alt >= MANY_IMAGES_MISSING_ALT {
            IssuePriority::High
        } else {
            IssuePriority::Medium
        };
        let noun = if missing_alt == 1 { "image" } else { "images" };
        issues.push(Issue::new(format!("{missing_alt} {noun} missing alt text"), priority));
    }

    let words = signals.content.word_count;
    if words < MIN_WORD_COUNT {
        issues.push(Issue::new(
            format!("Thin content ({words} words)"),
            IssuePriority::Medium,
        ));
    }

    issues
}

/// Builds the unified issue list for one page.
pub fn synthesize(
    external: &[AnalyzerIssue],
    signals: &PageSignals,
    categories: &[Category],
) -> Vec<Issue> {
    let mut list = IssueList::default();

    for issue in external {
        list.push(issue.text(), issue.priority());
    }

    for issue in signal_issues(signals) {
        list.push(issue.text, issue.priority);
    }

    for category in categories {
        for check in category.items.iter().filter(|c| c.is_fail()) {
            if let Some(priority) = check_priority(category.kind, check.note.as_deref()) {
                list.push(check_issue_text(check), priority);
            }
        }
    }

    list.issues
}
