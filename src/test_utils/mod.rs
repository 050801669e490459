//! Shared test support: signal fixtures, in-memory collaborators and issue
//! assertions. Compiled into the library so integration tests can use it.

pub mod fixtures {
    use crate::domain::signals::{ContentStats, Heading, Image, PageSignals};

    /// A page that passes every evaluable check.
    pub fn good_signals() -> PageSignals {
        PageSignals {
            url: "https://example.com/services/seo-audit".into(),
            status_code: 200,
            // 55 chars
            title: "Professional SEO Audit Services for Growing Businesses!".into(),
            // 137 chars
            meta_description: "Get a complete technical SEO audit covering crawlability, page speed, \
                               metadata and content quality, with a plan to fix every issue found."
                .into(),
            h1: "SEO Audit Services".into(),
            headings: vec![
                Heading::new(1, "SEO Audit Services"),
                Heading::new(2, "What we check"),
                Heading::new(2, "Pricing"),
                Heading::new(3, "Enterprise plans"),
            ],
            images: (1..=4)
                .map(|i| Image {
                    src: format!("/img/audit-{i}.png"),
                    has_alt: true,
                })
                .collect(),
            content: ContentStats {
                word_count: 1200,
                internal_links: 10,
                external_links: 2,
                broken_links: 0,
            },
            canonical_url: "https://example.com/services/seo-audit".into(),
            robots_directives: vec!["index".into(), "follow".into()],
            load_time_ms: 800,
            content_length: 50_000,
            structured_data_types: vec!["Organization".into()],
            fetch_error: String::new(),
        }
    }

    /// Well-formed page with 500 words of content.
    pub fn scenario_a_signals() -> PageSignals {
        let mut signals = good_signals();
        signals.url = "https://example.com/blog/local-audits".into();
        signals.canonical_url = signals.url.clone();
        // 55 chars
        signals.title = "Affordable Website Audits for Local Businesses in Texas".into();
        signals.content.word_count = 500;
        signals
    }

    /// No meta description, no H1 and twelve images without alt text.
    pub fn scenario_b_signals() -> PageSignals {
        let mut signals = good_signals();
        signals.meta_description.clear();
        signals.h1.clear();
        signals.headings = vec![Heading::new(2, "What we check"), Heading::new(3, "Pricing")];
        signals.images = (1..=12)
            .map(|i| Image {
                src: format!("/img/gallery-{i}.jpg"),
                has_alt: false,
            })
            .collect();
        signals
    }

    pub fn page_url(base: &str, index: usize) -> String {
        format!("{}/page-{}", base.trim_end_matches('/'), index)
    }

    /// `count` good pages under `base`.
    pub fn site_pages(base: &str, count: usize) -> Vec<PageSignals> {
        (0..count)
            .map(|i| {
                let mut signals = good_signals();
                signals.url = page_url(base, i);
                signals.canonical_url = signals.url.clone();
                signals
            })
            .collect()
    }
}

pub mod fakes {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use url::Url;
    use uuid::Uuid;

    use super::fixtures;
    use crate::domain::models::{AuditJob, JobStatus, Progress};
    use crate::domain::signals::{PageSignals, SiteFacts};
    use crate::repository::{AuditRepository, MemoryRepository};
    use crate::service::issues::{AnalyzerIssue, NarrativeFindings};
    use crate::service::processor::{Discovery, EventSink, JobEvent, NarrativeAnalyzer, PageSource};

    fn key(raw: &str) -> String {
        Url::parse(raw)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| raw.to_string())
    }

    /// Serves a fixed set of pages, optionally slowly or with failures.
    pub struct StaticPageSource {
        order: Vec<Url>,
        pages: HashMap<String, PageSignals>,
        failures: HashMap<String, String>,
        delay: Duration,
        discover: bool,
        discovery_error: Option<String>,
        site: SiteFacts,
    }

    impl StaticPageSource {
        pub fn new(pages: Vec<PageSignals>) -> Self {
            let order = pages.iter().filter_map(|p| Url::parse(&p.url).ok()).collect();
            let pages = pages.into_iter().map(|p| (key(&p.url), p)).collect();
            Self {
                order,
                pages,
                failures: HashMap::new(),
                delay: Duration::ZERO,
                discover: true,
                discovery_error: None,
                site: SiteFacts::default(),
            }
        }

        /// `count` good pages under `base`.
        pub fn site(base: &str, count: usize) -> Self {
            Self::new(fixtures::site_pages(base, count))
        }

        /// Makes `url` fail to fetch, adding it to discovery if new.
        pub fn failing(mut self, url: &str, reason: &str) -> Self {
            let k = key(url);
            self.pages.remove(&k);
            if let Ok(parsed) = Url::parse(url) {
                if !self.order.contains(&parsed) {
                    self.order.push(parsed);
                }
            }
            self.failures.insert(k, reason.to_string());
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn with_site_facts(mut self, site: SiteFacts) -> Self {
            self.site = site;
            self
        }

        /// Discovery succeeds but finds nothing.
        pub fn without_discovery(mut self) -> Self {
            self.discover = false;
            self
        }

        pub fn failing_discovery(mut self, reason: &str) -> Self {
            self.discovery_error = Some(reason.to_string());
            self
        }
    }

    #[async_trait]
    impl PageSource for StaticPageSource {
        async fn discover(&self, _target: &Url) -> anyhow::Result<Discovery> {
            if let Some(reason) = &self.discovery_error {
                return Err(anyhow!("{reason}"));
            }
            let urls = if self.discover { self.order.clone() } else { Vec::new() };
            Ok(Discovery::Complete(urls))
        }

        async fn fetch(&self, url: &Url) -> anyhow::Result<PageSignals> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let k = key(url.as_str());
            if let Some(reason) = self.failures.get(&k) {
                return Err(anyhow!("{reason}"));
            }
            self.pages
                .get(&k)
                .cloned()
                .ok_or_else(|| anyhow!("404 not found: {url}"))
        }

        async fn site_facts(&self, _target: &Url) -> SiteFacts {
            self.site
        }
    }

    /// Discovers pages over a channel while the audit runs.
    pub struct StreamingPageSource {
        base: String,
        count: usize,
        estimated_total: Option<usize>,
    }

    impl StreamingPageSource {
        pub fn new(base: &str, count: usize, estimated_total: Option<usize>) -> Self {
            Self {
                base: base.to_string(),
                count,
                estimated_total,
            }
        }
    }

    #[async_trait]
    impl PageSource for StreamingPageSource {
        async fn discover(&self, _target: &Url) -> anyhow::Result<Discovery> {
            let (tx, rx) = mpsc::channel(4);
            let urls: Vec<Url> = (0..self.count)
                .filter_map(|i| Url::parse(&fixtures::page_url(&self.base, i)).ok())
                .collect();

            tokio::spawn(async move {
                for url in urls {
                    if tx.send(url).await.is_err() {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            });

            Ok(Discovery::Streaming {
                pages: rx,
                estimated_total: self.estimated_total,
            })
        }

        async fn fetch(&self, url: &Url) -> anyhow::Result<PageSignals> {
            let mut signals = fixtures::good_signals();
            signals.url = url.to_string();
            signals.canonical_url = signals.url.clone();
            Ok(signals)
        }
    }

    /// Canned narrative findings per URL.
    #[derive(Default)]
    pub struct StaticNarrative {
        findings: HashMap<String, NarrativeFindings>,
    }

    impl StaticNarrative {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn critical(mut self, url: &str, text: &str) -> Self {
            self.findings
                .entry(key(url))
                .or_default()
                .critical_issues
                .push(AnalyzerIssue::from(text));
            self
        }

        pub fn advice(mut self, url: &str, text: &str) -> Self {
            self.findings
                .entry(key(url))
                .or_default()
                .opportunities
                .push(text.to_string());
            self
        }
    }

    #[async_trait]
    impl NarrativeAnalyzer for StaticNarrative {
        async fn analyze(&self, signals: &PageSignals) -> anyhow::Result<NarrativeFindings> {
            Ok(self.findings.get(&key(&signals.url)).cloned().unwrap_or_default())
        }
    }

    /// Narrative analyzer that always errors.
    pub struct UnavailableNarrative;

    #[async_trait]
    impl NarrativeAnalyzer for UnavailableNarrative {
        async fn analyze(&self, _signals: &PageSignals) -> anyhow::Result<NarrativeFindings> {
            Err(anyhow!("narrative service unavailable"))
        }
    }

    /// Narrative analyzer that crashes mid-analysis.
    pub struct PanickingNarrative;

    #[async_trait]
    impl NarrativeAnalyzer for PanickingNarrative {
        async fn analyze(&self, signals: &PageSignals) -> anyhow::Result<NarrativeFindings> {
            panic!("narrative analyzer crashed on {}", signals.url);
        }
    }

    /// Narrative analyzer that never answers.
    pub struct HangingNarrative;

    #[async_trait]
    impl NarrativeAnalyzer for HangingNarrative {
        async fn analyze(&self, _signals: &PageSignals) -> anyhow::Result<NarrativeFindings> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(NarrativeFindings::default())
        }
    }

    /// In-memory repository whose saves take `delay`.
    pub struct SlowSaveRepository {
        inner: MemoryRepository,
        delay: Duration,
    }

    impl SlowSaveRepository {
        pub fn new(delay: Duration) -> Self {
            Self {
                inner: MemoryRepository::new(),
                delay,
            }
        }

        pub fn is_empty(&self) -> bool {
            self.inner.is_empty()
        }
    }

    #[async_trait]
    impl AuditRepository for SlowSaveRepository {
        async fn save(&self, job: &AuditJob) -> anyhow::Result<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.save(job).await
        }

        async fn load(&self, id: &Uuid) -> anyhow::Result<Option<AuditJob>> {
            self.inner.load(id).await
        }

        async fn delete(&self, id: &Uuid) -> anyhow::Result<bool> {
            self.inner.delete(id).await
        }

        async fn list_ids(&self) -> anyhow::Result<Vec<Uuid>> {
            self.inner.list_ids().await
        }
    }

    /// Records every emitted event.
    #[derive(Default)]
    pub struct CollectingSink {
        events: Mutex<Vec<JobEvent>>,
    }

    impl CollectingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<JobEvent> {
            self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }

        pub fn progress_events(&self, job_id: Uuid) -> Vec<Progress> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    JobEvent::Progress { job_id: id, progress } if id == job_id => Some(progress),
                    _ => None,
                })
                .collect()
        }

        pub fn progress_percents(&self, job_id: Uuid) -> Vec<u8> {
            self.progress_events(job_id).iter().map(|p| p.percent).collect()
        }

        pub fn finished_count(&self, job_id: Uuid) -> usize {
            self.events()
                .iter()
                .filter(|event| matches!(event, JobEvent::Finished { job_id: id, .. } if *id == job_id))
                .count()
        }

        pub fn finished_status(&self, job_id: Uuid) -> Option<JobStatus> {
            self.events().into_iter().find_map(|event| match event {
                JobEvent::Finished { job_id: id, status, .. } if id == job_id => Some(status),
                _ => None,
            })
        }
    }

    impl EventSink for CollectingSink {
        fn emit(&self, event: JobEvent) {
            self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
        }
    }
}

/// Helper assertions for tests
pub mod assertions {
    use crate::domain::models::Issue;

    /// Checks if issues contain an issue with exactly this text
    pub fn has_issue(issues: &[Issue], text: &str) -> bool {
        issues.iter().any(|i| i.text == text)
    }

    pub fn count_issues(issues: &[Issue], text: &str) -> usize {
        issues.iter().filter(|i| i.text == text).count()
    }

    /// Asserts that a result contains the expected issue
    #[macro_export]
    macro_rules! assert_has_issue {
        ($issues:expr, $text:expr) => {
            assert!(
                $crate::test_utils::assertions::has_issue($issues, $text),
                "Expected to find issue '{}' but it was not present",
                $text
            );
        };
    }

    /// Asserts that a result does NOT contain the specified issue
    #[macro_export]
    macro_rules! assert_no_issue {
        ($issues:expr, $text:expr) => {
            assert!(
                !$crate::test_utils::assertions::has_issue($issues, $text),
                "Expected NOT to find issue '{}' but it was present",
                $text
            );
        };
    }
}

#[cfg(test)]
mod fixture_tests {
    use super::fixtures;

    #[test]
    fn fixture_lengths_sit_inside_thresholds() {
        let good = fixtures::good_signals();
        assert_eq!(good.title_len(), 55);
        assert_eq!(good.meta_description_len(), 137);
        assert_eq!(fixtures::scenario_a_signals().title_len(), 55);
        assert_eq!(fixtures::scenario_b_signals().images_missing_alt(), 12);
    }
}
