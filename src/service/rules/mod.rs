//! Rule evaluation: one page's signals in, the fixed category list out.
//!
//! Evaluation is a pure function of `PageSignals` and `SiteFacts`. A check
//! without enough underlying signal is `unknown`; it never defaults to pass
//! or fail.

pub mod checks;

use serde::{Deserialize, Serialize};

use crate::domain::models::{Category, CategoryKind};
use crate::domain::signals::{PageSignals, SiteFacts};

/// Categories for one page plus the page-wide fail count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub categories: Vec<Category>,
    pub fail_count: usize,
}

/// Evaluates every category in catalogue order.
pub fn evaluate(signals: &PageSignals, site: &SiteFacts) -> Evaluation {
    let categories: Vec<Category> = CategoryKind::ALL
        .iter()
        .map(|kind| evaluate_category(*kind, signals, site))
        .collect();
    let fail_count = categories.iter().map(Category::fail_count).sum();

    Evaluation {
        categories,
        fail_count,
    }
}

pub fn evaluate_category(kind: CategoryKind, signals: &PageSignals, site: &SiteFacts) -> Category {
    match kind {
        CategoryKind::Crawlability => checks::crawlability(signals, site),
        CategoryKind::Performance => checks::performance(signals),
        CategoryKind::Mobile => checks::mobile(signals),
        CategoryKind::Links => checks::links(signals),
        CategoryKind::Security => checks::security(signals),
        CategoryKind::MetaTags => checks::meta_tags(signals),
        CategoryKind::Headings => checks::headings(signals),
        CategoryKind::Content => checks::content(signals),
        CategoryKind::Images => checks::images(signals),
        CategoryKind::Schema => checks::schema(signals),
        CategoryKind::OffPage => checks::off_page(signals),
        CategoryKind::UserExperience => checks::user_experience(signals),
        CategoryKind::ContentStrategy => checks::content_strategy(signals),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::CheckStatus;
    use crate::test_utils::fixtures;

    fn category(evaluation: &Evaluation, kind: CategoryKind) -> &Category {
        evaluation
            .categories
            .iter()
            .find(|c| c.kind == kind)
            .expect("category present")
    }

    #[test]
    fn categories_follow_catalogue_order() {
        let evaluation = evaluate(&fixtures::good_signals(), &SiteFacts::default());
        let kinds: Vec<_> = evaluation.categories.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, CategoryKind::ALL.to_vec());
        assert!(evaluation.categories.iter().all(|c| !c.items.is_empty()));
    }

    #[test]
    fn scenario_a_listed_checks_pass() {
        let signals = fixtures::scenario_a_signals();
        let evaluation = evaluate(&signals, &SiteFacts::default());

        for kind in [
            CategoryKind::MetaTags,
            CategoryKind::Headings,
            CategoryKind::Content,
            CategoryKind::Images,
            CategoryKind::Security,
            CategoryKind::Links,
        ] {
            let category = category(&evaluation, kind);
            assert_eq!(category.fail_count(), 0, "{} has failures: {:?}", category.title, category.items);
        }

        let crawl = category(&evaluation, CategoryKind::Crawlability);
        let canonical = crawl
            .items
            .iter()
            .find(|c| c.label == "Canonical tag present")
            .unwrap();
        assert_eq!(canonical.status, CheckStatus::Pass);
        assert_eq!(crawl.fail_count(), 0);
    }

    #[test]
    fn fail_count_sums_categories() {
        let mut signals = fixtures::good_signals();
        signals.title = "Short".into();
        signals.content.broken_links = 3;
        signals.url = "http://example.com/page".into();

        let evaluation = evaluate(&signals, &SiteFacts::default());
        let per_category: usize = evaluation.categories.iter().map(|c| c.fail_count()).sum();
        assert_eq!(evaluation.fail_count, per_category);
        assert_eq!(category(&evaluation, CategoryKind::MetaTags).fail_count(), 1);
        assert_eq!(category(&evaluation, CategoryKind::Links).fail_count(), 1);
        assert_eq!(category(&evaluation, CategoryKind::Security).fail_count(), 1);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let signals = fixtures::scenario_b_signals();
        let site = SiteFacts {
            robots_txt: Some(true),
            sitemap: None,
        };
        assert_eq!(evaluate(&signals, &site), evaluate(&signals, &site));
    }

    #[test]
    fn every_check_carries_its_category() {
        let evaluation = evaluate(&fixtures::good_signals(), &SiteFacts::default());
        for category in &evaluation.categories {
            assert!(category.items.iter().all(|c| c.category == category.kind));
        }
    }
}
