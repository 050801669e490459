// benches/engine_benchmarks.rs
use criterion::{criterion_group, criterion_main, Criterion};
use std::{hint::black_box, sync::Arc, time::Duration};
use tokio::runtime::Runtime;

use seo_audit::domain::signals::SiteFacts;
use seo_audit::service::issues::NarrativeFindings;
use seo_audit::service::processor::analyzer::{analyze_signals, PageAnalyzer};
use seo_audit::service::scoring::{self, ScoringPolicy};
use seo_audit::test_utils::{fakes::StaticPageSource, fixtures};

fn bench_page_pipeline(c: &mut Criterion) {
    let signals = fixtures::scenario_b_signals();
    let site = SiteFacts {
        robots_txt: Some(true),
        sitemap: Some(true),
    };
    let findings = NarrativeFindings::default();

    c.bench_function("analyze_signals_scenario_b", |b| {
        b.iter(|| {
            analyze_signals(
                0,
                black_box(signals.clone()),
                &site,
                &findings,
                ScoringPolicy::Lenient,
            )
        })
    });
}

fn bench_summary(c: &mut Criterion) {
    let pages: Vec<_> = fixtures::site_pages("https://example.com", 500)
        .into_iter()
        .enumerate()
        .map(|(i, signals)| {
            analyze_signals(
                i,
                signals,
                &SiteFacts::default(),
                &NarrativeFindings::default(),
                ScoringPolicy::Lenient,
            )
        })
        .collect();

    c.bench_function("summarize_500_pages", |b| {
        b.iter(|| scoring::summarize(black_box(&pages), ScoringPolicy::Lenient))
    });
}

fn bench_fetch_and_analyze(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let page = fixtures::good_signals();
    let url = url::Url::parse(&page.url).unwrap();
    let analyzer = PageAnalyzer::new(
        Arc::new(StaticPageSource::new(vec![page])),
        None,
        ScoringPolicy::Lenient,
        Duration::from_secs(5),
    );

    c.bench_function("audit_page_in_memory", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                analyzer
                    .audit_page(0, url.clone(), SiteFacts::default())
                    .await,
            )
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(20)
        .measurement_time(Duration::from_secs(5));
    targets = bench_page_pipeline, bench_summary, bench_fetch_and_analyze
}

criterion_main!(benches);
