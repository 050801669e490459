//! Score rollups: check -> category -> section -> page -> site.
//!
//! Everything here is a pure function of category data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::models::{
    AggregatedSummary, Category, CategoryKind, CheckTally, PageAuditResult, Section,
};

/// How unevaluated (`unknown`) checks weigh on a score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringPolicy {
    /// Only the fail fraction lowers the score; unknown weighs like pass.
    #[default]
    Lenient,
    /// Only passing checks earn points; unknown weighs like fail.
    Strict,
}

/// Categories pooled into each section. Advisory categories appear nowhere.
pub fn section_categories(section: Section) -> &'static [CategoryKind] {
    match section {
        Section::Technical => &[
            CategoryKind::Crawlability,
            CategoryKind::Performance,
            CategoryKind::Mobile,
            CategoryKind::Links,
            CategoryKind::Security,
        ],
        Section::OnPage => &[
            CategoryKind::MetaTags,
            CategoryKind::Headings,
            CategoryKind::Content,
            CategoryKind::Images,
            CategoryKind::Schema,
        ],
        Section::Performance => &[CategoryKind::Performance],
    }
}

pub fn is_advisory(kind: CategoryKind) -> bool {
    !Section::ALL
        .iter()
        .any(|section| section_categories(*section).contains(&kind))
}

/// Score for a pool of checks; `None` when nothing was actually evaluated.
pub fn tally_score(tally: &CheckTally, policy: ScoringPolicy) -> Option<u8> {
    if tally.evaluated() == 0 {
        return None;
    }
    let total = tally.total() as f64;
    let score = match policy {
        ScoringPolicy::Lenient => 100.0 - (tally.fail as f64 / total) * 100.0,
        ScoringPolicy::Strict => (tally.pass as f64 / total) * 100.0,
    };
    Some(score.round().clamp(0.0, 100.0) as u8)
}

pub fn category_score(category: &Category, policy: ScoringPolicy) -> Option<u8> {
    tally_score(&category.tally(), policy)
}

fn tallies_by_kind<'a>(categories: impl IntoIterator<Item = &'a Category>) -> BTreeMap<CategoryKind, CheckTally> {
    categories
        .into_iter()
        .fold(BTreeMap::new(), |mut acc, category| {
            acc.entry(category.kind).or_default().merge(&category.tally());
            acc
        })
}

pub fn section_scores(
    totals: &BTreeMap<CategoryKind, CheckTally>,
    policy: ScoringPolicy,
) -> BTreeMap<Section, Option<u8>> {
    Section::ALL
        .iter()
        .map(|section| {
            let pooled = section_categories(*section)
                .iter()
                .filter_map(|kind| totals.get(kind))
                .filter(|tally| tally.evaluated() > 0)
                .fold(CheckTally::default(), |mut acc, tally| {
                    acc.merge(tally);
                    acc
                });
            (*section, tally_score(&pooled, policy))
        })
        .collect()
}

/// Mean of the sections that have data.
pub fn overall_score(sections: &BTreeMap<Section, Option<u8>>) -> Option<u8> {
    let scored: Vec<f64> = sections.values().flatten().map(|s| *s as f64).collect();
    if scored.is_empty() {
        return None;
    }
    let mean = scored.iter().sum::<f64>() / scored.len() as f64;
    Some(mean.round() as u8)
}

pub fn page_score(categories: &[Category], policy: ScoringPolicy) -> Option<u8> {
    overall_score(&section_scores(&tallies_by_kind(categories), policy))
}

/// Cross-page rollup. Section and overall scores come from the summed
/// totals, not from averaging per-page scores.
pub fn summarize(pages: &[PageAuditResult], policy: ScoringPolicy) -> AggregatedSummary {
    let mut summary = AggregatedSummary::default();

    for issue in pages.iter().flat_map(|p| p.issues.iter()) {
        *summary.priority_counts.entry(issue.priority).or_insert(0) += 1;
    }

    let totals = tallies_by_kind(pages.iter().flat_map(|p| p.categories.iter()));
    summary.category_totals = totals
        .iter()
        .map(|(kind, tally)| (kind.title().to_string(), *tally))
        .collect();
    summary.section_scores = section_scores(&totals, policy);
    summary.overall_score = overall_score(&summary.section_scores);

    debug_assert_eq!(
        summary.total_issues(),
        pages.iter().map(|p| p.issues.len()).sum::<usize>()
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Check, CheckStatus, Issue, IssuePriority, PageOutcome};
    use crate::domain::signals::{PageSignals, SiteFacts};
    use crate::service::rules;
    use crate::test_utils::fixtures;

    fn category(kind: CategoryKind, statuses: &[CheckStatus]) -> Category {
        Category::new(
            kind,
            statuses
                .iter()
                .enumerate()
                .map(|(i, status)| Check {
                    category: kind,
                    label: format!("check {i}"),
                    status: *status,
                    note: None,
                })
                .collect(),
        )
    }

    fn page(categories: Vec<Category>, issues: Vec<Issue>) -> PageAuditResult {
        PageAuditResult {
            position: 0,
            url: "https://example.com".into(),
            outcome: PageOutcome::Analyzed,
            signals: PageSignals::default(),
            categories,
            issues,
            per_page_score: None,
            advice: Vec::new(),
        }
    }

    use CheckStatus::{Fail, Pass, Unknown};

    #[test]
    fn category_score_formula() {
        let c = category(CategoryKind::Links, &[Pass, Fail, Unknown, Pass]);
        assert_eq!(category_score(&c, ScoringPolicy::Lenient), Some(75));
        assert_eq!(category_score(&c, ScoringPolicy::Strict), Some(50));

        let thirds = category(CategoryKind::Links, &[Pass, Pass, Fail]);
        assert_eq!(category_score(&thirds, ScoringPolicy::Lenient), Some(67));
    }

    #[test]
    fn unknown_only_category_has_no_score() {
        let c = category(CategoryKind::Mobile, &[Unknown, Unknown]);
        assert_eq!(category_score(&c, ScoringPolicy::Lenient), None);
        assert_eq!(category_score(&c, ScoringPolicy::Strict), None);

        let empty = category(CategoryKind::Mobile, &[]);
        assert_eq!(category_score(&empty, ScoringPolicy::Lenient), None);
    }

    #[test]
    fn unknown_only_category_does_not_move_section_score() {
        let with_unknown = vec![
            category(CategoryKind::Links, &[Pass, Fail]),
            category(CategoryKind::Mobile, &[Unknown, Unknown]),
        ];
        let without = vec![category(CategoryKind::Links, &[Pass, Fail])];

        for policy in [ScoringPolicy::Lenient, ScoringPolicy::Strict] {
            let with = section_scores(&tallies_by_kind(&with_unknown), policy);
            let bare = section_scores(&tallies_by_kind(&without), policy);
            assert_eq!(with[&Section::Technical], Some(50));
            assert_eq!(with, bare);
        }

        // a section made only of unknowns stays null instead of 0 or 100
        let only_unknown = vec![category(CategoryKind::Performance, &[Unknown])];
        let sections = section_scores(&tallies_by_kind(&only_unknown), ScoringPolicy::Lenient);
        assert_eq!(sections[&Section::Performance], None);
        assert_eq!(sections[&Section::OnPage], None);
    }

    #[test]
    fn overall_is_mean_of_non_null_sections() {
        let sections: BTreeMap<Section, Option<u8>> = [
            (Section::Technical, Some(80)),
            (Section::OnPage, Some(61)),
            (Section::Performance, None),
        ]
        .into_iter()
        .collect();
        assert_eq!(overall_score(&sections), Some(71));

        let empty: BTreeMap<Section, Option<u8>> =
            Section::ALL.iter().map(|s| (*s, None)).collect();
        assert_eq!(overall_score(&empty), None);
    }

    #[test]
    fn advisory_categories_are_excluded() {
        assert!(is_advisory(CategoryKind::OffPage));
        assert!(is_advisory(CategoryKind::UserExperience));
        assert!(is_advisory(CategoryKind::ContentStrategy));
        assert!(!is_advisory(CategoryKind::Performance));

        let advisory_only = vec![category(CategoryKind::ContentStrategy, &[Fail, Fail])];
        assert_eq!(page_score(&advisory_only, ScoringPolicy::Lenient), None);
    }

    #[test]
    fn every_scored_category_has_a_section() {
        for kind in CategoryKind::ALL {
            let in_sections = Section::ALL
                .iter()
                .filter(|s| section_categories(**s).contains(&kind))
                .count();
            if is_advisory(kind) {
                assert_eq!(in_sections, 0);
            } else {
                assert!(in_sections >= 1, "{kind} belongs to no section");
            }
        }
    }

    #[test]
    fn summary_recomputes_from_totals() {
        // page 1: Links 1 pass / 1 fail; page 2: Links 8 pass
        let p1 = page(vec![category(CategoryKind::Links, &[Pass, Fail])], vec![]);
        let p2 = page(vec![category(CategoryKind::Links, &[Pass; 8])], vec![]);

        let summary = summarize(&[p1, p2], ScoringPolicy::Lenient);
        let totals = &summary.category_totals["Technical • Links"];
        assert_eq!((totals.pass, totals.fail, totals.unknown), (9, 1, 0));
        // pooled: 100 - 1/10*100 = 90, whereas averaging 50 and 100 would give 75
        assert_eq!(summary.section_scores[&Section::Technical], Some(90));
        assert_eq!(summary.overall_score, Some(90));
    }

    #[test]
    fn priority_counts_partition_issues() {
        let p1 = page(
            vec![],
            vec![
                Issue::new("a", IssuePriority::Critical),
                Issue::new("b", IssuePriority::High),
            ],
        );
        let p2 = page(
            vec![],
            vec![
                Issue::new("a", IssuePriority::Critical),
                Issue::new("c", IssuePriority::Low),
                Issue::new("d", IssuePriority::Low),
            ],
        );
        let counts = summarize(&[p1, p2], ScoringPolicy::Lenient).priority_counts;

        assert_eq!(counts[&IssuePriority::Critical], 2);
        assert_eq!(counts[&IssuePriority::High], 1);
        assert_eq!(counts[&IssuePriority::Medium], 0);
        assert_eq!(counts[&IssuePriority::Low], 2);
        assert_eq!(counts.values().sum::<usize>(), 5);
    }

    #[test]
    fn scoring_is_pure() {
        let evaluation = rules::evaluate(&fixtures::scenario_b_signals(), &SiteFacts::default());
        let first = page_score(&evaluation.categories, ScoringPolicy::Lenient);
        let second = page_score(&evaluation.categories, ScoringPolicy::Lenient);
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[test]
    fn good_page_scores_full_marks_when_lenient() {
        let evaluation = rules::evaluate(&fixtures::good_signals(), &SiteFacts::default());
        assert_eq!(page_score(&evaluation.categories, ScoringPolicy::Lenient), Some(100));
        // strict mode penalizes the unknown checks
        let strict = page_score(&evaluation.categories, ScoringPolicy::Strict).unwrap();
        assert!(strict < 100);
    }

    #[test]
    fn unreachable_page_scores_from_url_checks_only() {
        let signals = PageSignals::unreachable("https://example.com/down", "timeout");
        let evaluation = rules::evaluate(&signals, &SiteFacts::default());
        let sections = section_scores(&tallies_by_kind(&evaluation.categories), ScoringPolicy::Lenient);
        // only HTTPS (Technical) and URL structure (On-Page) were evaluated
        assert_eq!(sections[&Section::Technical], Some(100));
        assert_eq!(sections[&Section::OnPage], Some(100));
        assert_eq!(sections[&Section::Performance], None);
    }
}
