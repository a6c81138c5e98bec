//! Share-of-buy, share-of-clicks and rating aggregation.
//!
//! Turns the raw rows of one test into a [`TestSummary`]. Everything here is
//! a pure function of its inputs: the same rows always produce the same
//! summary, and rows that cannot be placed (unknown variant, no selection)
//! are excluded rather than treated as errors.

use crate::analysis::questions::{self, VALUE};
use crate::context::ReportContext;
use crate::models::{
    ComparisonResponse, CompetitorProduct, CompetitorShare, PurchaseStats, RatingFields,
    ReportInputs, Section, Selection, ShopperSession, SurveyResponse, TestSummary, VariantLabel,
    VariantSummary,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// Format `part / whole` as a percentage with a fixed number of decimals.
///
/// A zero `whole` yields `0` with the same number of decimals.
pub fn percentage(part: usize, whole: usize, decimals: usize) -> String {
    if whole == 0 {
        return format!("{:.*}", decimals, 0.0);
    }
    format!("{:.*}", decimals, part as f64 * 100.0 / whole as f64)
}

/// Group sessions by variant. Sessions without a valid a/b/c label are dropped.
pub fn partition_sessions(
    sessions: &[ShopperSession],
) -> BTreeMap<VariantLabel, Vec<&ShopperSession>> {
    let mut buckets: BTreeMap<VariantLabel, Vec<&ShopperSession>> = BTreeMap::new();
    let mut discarded = 0;

    for session in sessions {
        match session.variant {
            Some(label) => buckets.entry(label).or_default().push(session),
            None => discarded += 1,
        }
    }

    if discarded > 0 {
        debug!("Discarded {} sessions without a valid variant", discarded);
    }

    buckets
}

/// Selections made by the sessions of one variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionCounts {
    pub test_product: usize,
    /// Selections per competitor id.
    pub competitors: BTreeMap<String, usize>,
}

impl SelectionCounts {
    pub fn from_sessions(sessions: &[&ShopperSession]) -> Self {
        let mut counts = Self::default();

        for session in sessions {
            match &session.selection {
                Some(Selection::TestProduct(_)) => counts.test_product += 1,
                Some(Selection::Competitor(id)) => {
                    *counts.competitors.entry(id.clone()).or_default() += 1
                }
                None => {}
            }
        }

        counts
    }

    pub fn competitor_total(&self) -> usize {
        self.competitors.values().sum()
    }

    /// Denominator of every share of buy in the variant.
    pub fn total(&self) -> usize {
        self.test_product + self.competitor_total()
    }
}

/// Competitor ids and titles known for the test.
struct Catalog {
    entries: Vec<(String, String)>,
}

impl Catalog {
    /// One entry per competitor id, in first-seen order. Overlapping export
    /// shards can list a competitor more than once; a titled row wins.
    fn new(competitors: &Section<Vec<CompetitorProduct>>) -> Self {
        let products = match competitors {
            Section::Ready(products) => products,
            Section::NoData { reason } => {
                warn!("Competitor catalog unavailable, using ids as titles: {}", reason);
                return Self {
                    entries: Vec::new(),
                };
            }
        };

        let mut entries: Vec<(String, String)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut duplicates = 0;

        for product in products {
            let title = product.title.trim();
            match positions.get(&product.id) {
                Some(&index) => {
                    duplicates += 1;
                    if entries[index].1 == product.id && !title.is_empty() {
                        entries[index].1 = title.to_string();
                    }
                }
                None => {
                    let title = if title.is_empty() { &product.id } else { title };
                    positions.insert(product.id.clone(), entries.len());
                    entries.push((product.id.clone(), title.to_string()));
                }
            }
        }

        if duplicates > 0 {
            debug!("Ignored {} duplicate competitor catalog rows", duplicates);
        }

        Self { entries }
    }

    /// Catalog entries followed by selected ids the catalog does not know.
    fn with_selected(&self, selected: &BTreeMap<String, usize>) -> Vec<(String, String)> {
        let mut entries = self.entries.clone();
        let known: HashSet<String> = entries.iter().map(|(id, _)| id.clone()).collect();
        for id in selected.keys() {
            if !known.contains(id) {
                entries.push((id.clone(), id.clone()));
            }
        }
        entries
    }
}

/// Aggregate all loaded rows of a test into per-variant summaries.
pub fn aggregate(ctx: &ReportContext, inputs: &ReportInputs) -> TestSummary {
    let buckets = inputs.sessions.ready().map(|sessions| partition_sessions(sessions));

    let mut labels: BTreeSet<VariantLabel> = inputs.test.labels().into_iter().collect();
    if let Some(buckets) = &buckets {
        labels.extend(buckets.keys().copied());
    }

    let catalog = Catalog::new(&inputs.competitors);

    let variants = labels
        .into_iter()
        .map(|label| {
            let bucket = buckets
                .as_ref()
                .and_then(|b| b.get(&label))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            (label, summarize_variant(ctx, inputs, &catalog, label, bucket))
        })
        .collect();

    TestSummary {
        test_id: inputs.test.id.clone(),
        test_name: inputs.test.name.clone(),
        search_term: inputs.test.search_term.clone(),
        variants,
    }
}

fn summarize_variant(
    ctx: &ReportContext,
    inputs: &ReportInputs,
    catalog: &Catalog,
    label: VariantLabel,
    bucket: &[&ShopperSession],
) -> VariantSummary {
    let definition = inputs.test.variant(label);
    let product_id = definition
        .map(|v| v.product_id.clone())
        .unwrap_or_default();
    let product_title = definition
        .map(|v| v.title.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| product_id.clone());

    if definition.is_none() {
        warn!("Variant {} has sessions but no product in the test definition", label);
    }

    let product_surveys: Section<Vec<&SurveyResponse>> = match &inputs.surveys {
        Section::Ready(rows) => Section::Ready(
            rows.iter()
                .filter(|s| {
                    !product_id.is_empty() && s.product_id.as_deref() == Some(product_id.as_str())
                })
                .collect(),
        ),
        Section::NoData { reason } => Section::no_data(reason.clone()),
    };

    let purchase = match &inputs.sessions {
        Section::Ready(_) => {
            let has_product_survey = product_surveys
                .ready()
                .is_some_and(|rows| !rows.is_empty());
            Section::Ready(purchase_stats(
                ctx,
                &inputs.comparisons,
                catalog,
                label,
                &product_id,
                bucket,
                has_product_survey,
            ))
        }
        Section::NoData { reason } => Section::no_data(reason.clone()),
    };

    let value_score = product_surveys.ready().and_then(|rows| {
        let question = ctx.questions.get_or_builtin(VALUE)?;
        questions::average(&question, rows.iter().map(|s| &s.ratings)).average
    });

    let (likes_most, improvements) = product_surveys
        .ready()
        .map(|rows| {
            (
                free_text(rows.iter().map(|s| s.likes_most.as_deref())),
                free_text(rows.iter().map(|s| s.improve_suggestions.as_deref())),
            )
        })
        .unwrap_or_default();

    let ratings = product_surveys.map(|rows| {
        let fields: Vec<&RatingFields> = rows.iter().map(|s| &s.ratings).collect();
        questions::averages(&ctx.questions, &fields)
    });

    VariantSummary {
        label,
        product_id,
        product_title,
        purchase,
        value_score,
        ratings,
        likes_most,
        improvements,
    }
}

fn purchase_stats(
    ctx: &ReportContext,
    comparisons: &Section<Vec<ComparisonResponse>>,
    catalog: &Catalog,
    label: VariantLabel,
    product_id: &str,
    bucket: &[&ShopperSession],
    has_product_survey: bool,
) -> PurchaseStats {
    let mut counts = SelectionCounts::from_sessions(bucket);

    // Shoppers can answer the survey without an add-to-cart event being captured.
    let survey_fallback = counts.test_product == 0 && has_product_survey;
    if survey_fallback {
        debug!(
            "Variant {}: no recorded test product selection, counting survey response as one",
            label
        );
        counts.test_product = 1;
    }

    let total = counts.total();

    let clicked = if product_id.is_empty() {
        0
    } else {
        bucket
            .iter()
            .filter(|s| s.clicked_product_ids.iter().any(|id| id == product_id))
            .count()
    };

    let session_ids: HashSet<&str> = bucket.iter().map(|s| s.id.as_str()).collect();

    let mut competitors: Vec<CompetitorShare> = catalog
        .with_selected(&counts.competitors)
        .into_iter()
        .map(|(id, title)| {
            let selections = counts.competitors.get(&id).copied().unwrap_or(0);
            competitor_share(ctx, comparisons, id, title, selections, total, &session_ids)
        })
        .collect();

    competitors.sort_by(|a, b| {
        b.selections
            .cmp(&a.selections)
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.id.cmp(&b.id))
    });

    PurchaseStats {
        sessions: bucket.len(),
        test_product_selections: counts.test_product,
        competitor_selections: counts.competitor_total(),
        total,
        survey_fallback,
        share_of_clicks: percentage(clicked, bucket.len(), 1),
        share_of_buy: percentage(counts.test_product, total, 1),
        competitors,
    }
}

/// Trimmed, non-empty free-text answers in row order.
fn free_text<'a>(answers: impl Iterator<Item = Option<&'a str>>) -> Vec<String> {
    answers
        .flatten()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect()
}

fn competitor_share(
    ctx: &ReportContext,
    comparisons: &Section<Vec<ComparisonResponse>>,
    id: String,
    title: String,
    selections: usize,
    total: usize,
    session_ids: &HashSet<&str>,
) -> CompetitorShare {
    let rows: Section<Vec<&ComparisonResponse>> = match comparisons {
        Section::Ready(rows) => Section::Ready(
            rows.iter()
                .filter(|c| {
                    c.competitor_ref() == Some(id.as_str())
                        && session_ids.contains(c.session_id.as_str())
                })
                .collect(),
        ),
        Section::NoData { reason } => Section::no_data(reason.clone()),
    };

    let reasons = rows
        .ready()
        .map(|rows| free_text(rows.iter().map(|c| c.choose_reason.as_deref())))
        .unwrap_or_default();

    let ratings = rows.map(|rows| {
        let fields: Vec<&RatingFields> = rows.iter().map(|c| &c.ratings).collect();
        questions::averages(&ctx.questions, &fields)
    });

    CompetitorShare {
        share_of_buy: percentage(selections, total, 2),
        id,
        title,
        selections,
        ratings,
        reasons,
    }
}

/// One row of the cross-variant competitor table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedCompetitorRow {
    pub variant: VariantLabel,
    pub id: String,
    pub title: String,
    pub selections: usize,
    pub share_of_buy: String,
}

/// Competitors that were bought in any variant, highest share first.
///
/// Equal shares are ordered by variant label.
pub fn combined_competitors(summary: &TestSummary) -> Vec<CombinedCompetitorRow> {
    let mut rows: Vec<(f64, CombinedCompetitorRow)> = Vec::new();

    for (label, variant) in &summary.variants {
        let Some(stats) = variant.purchase.ready() else {
            continue;
        };
        for competitor in stats.competitors.iter().filter(|c| c.selections > 0) {
            let share = competitor.selections as f64 * 100.0 / stats.total as f64;
            rows.push((
                share,
                CombinedCompetitorRow {
                    variant: *label,
                    id: competitor.id.clone(),
                    title: competitor.title.clone(),
                    selections: competitor.selections,
                    share_of_buy: competitor.share_of_buy.clone(),
                },
            ));
        }
    }

    rows.sort_by(|(share_a, a), (share_b, b)| {
        share_b
            .total_cmp(share_a)
            .then_with(|| a.variant.cmp(&b.variant))
            .then_with(|| a.title.cmp(&b.title))
    });

    rows.into_iter().map(|(_, row)| row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::QuestionSet;
    use crate::models::{TestDefinition, TestVariant};
    use serde_json::json;

    fn ctx() -> ReportContext {
        ReportContext::new("t1", QuestionSet::builtin())
    }

    fn test_definition() -> TestDefinition {
        TestDefinition {
            id: "t1".to_string(),
            name: "Protein bars".to_string(),
            search_term: "protein bar".to_string(),
            variants: ["a", "b", "c"]
                .iter()
                .map(|l| TestVariant {
                    label: l.to_string(),
                    product_id: format!("p-{}", l),
                    title: format!("Bar {}", l.to_uppercase()),
                })
                .collect(),
            created_at: None,
        }
    }

    fn session(id: &str, variant: &str, product: Option<&str>, competitor: Option<&str>) -> ShopperSession {
        ShopperSession {
            id: id.to_string(),
            variant: VariantLabel::parse(variant),
            selection: Selection::classify(
                product.map(String::from),
                competitor.map(String::from),
                None,
            ),
            clicked_product_ids: Vec::new(),
            created_at: None,
        }
    }

    fn competitor(id: &str, title: &str) -> CompetitorProduct {
        CompetitorProduct {
            id: id.to_string(),
            title: title.to_string(),
            price: None,
            image_url: None,
        }
    }

    fn survey(id: &str, session_id: &str, product: &str, ratings: RatingFields) -> SurveyResponse {
        SurveyResponse {
            id: id.to_string(),
            session_id: session_id.to_string(),
            product_id: Some(product.to_string()),
            likes_most: None,
            improve_suggestions: None,
            ratings,
        }
    }

    fn comparison(session_id: &str, competitor: &str, reason: &str, ratings: RatingFields) -> ComparisonResponse {
        ComparisonResponse {
            id: format!("cmp-{}", session_id),
            session_id: session_id.to_string(),
            competitor_id: Some(competitor.to_string()),
            walmart_product_id: None,
            choose_reason: Some(reason.to_string()),
            ratings,
        }
    }

    fn inputs(sessions: Vec<ShopperSession>) -> ReportInputs {
        ReportInputs {
            test: test_definition(),
            sessions: Section::Ready(sessions),
            surveys: Section::Ready(Vec::new()),
            comparisons: Section::Ready(Vec::new()),
            competitors: Section::Ready(vec![competitor("x", "Brand X"), competitor("y", "Brand Y")]),
            skipped_rows: 0,
        }
    }

    fn seventy_thirty() -> Vec<ShopperSession> {
        let mut sessions: Vec<ShopperSession> = (0..7)
            .map(|i| session(&format!("a{}", i), "a", Some("p-a"), None))
            .collect();
        sessions.extend((7..10).map(|i| session(&format!("a{}", i), "a", None, Some("x"))));
        sessions
    }

    fn purchase(summary: &TestSummary, label: VariantLabel) -> &PurchaseStats {
        summary.variants[&label].purchase.ready().unwrap()
    }

    #[test]
    fn test_percentage_zero_guard() {
        assert_eq!(percentage(0, 0, 1), "0.0");
        assert_eq!(percentage(3, 0, 2), "0.00");
        assert_eq!(percentage(1, 3, 2), "33.33");
        assert_eq!(percentage(2, 3, 1), "66.7");
    }

    #[test]
    fn test_seventy_thirty_split() {
        let summary = aggregate(&ctx(), &inputs(seventy_thirty()));
        let stats = purchase(&summary, VariantLabel::A);

        assert_eq!(stats.total, 10);
        assert_eq!(stats.share_of_buy, "70.0");
        let x = stats.competitors.iter().find(|c| c.id == "x").unwrap();
        assert_eq!(x.share_of_buy, "30.00");
        assert_eq!(x.title, "Brand X");
    }

    #[test]
    fn test_zero_total_formats_as_zero() {
        let sessions = vec![session("b1", "b", None, None), session("b2", "b", None, None)];
        let summary = aggregate(&ctx(), &inputs(sessions));
        let stats = purchase(&summary, VariantLabel::B);

        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.share_of_buy, "0.0");
        assert!(stats.competitors.iter().all(|c| c.share_of_buy == "0.00"));

        // Variant c has no sessions at all.
        let stats = purchase(&summary, VariantLabel::C);
        assert_eq!(stats.share_of_buy, "0.0");
        assert_eq!(stats.share_of_clicks, "0.0");
    }

    #[test]
    fn test_shares_sum_to_one_hundred() {
        let mut sessions = seventy_thirty();
        sessions.push(session("a10", "a", None, Some("y")));
        sessions.push(session("a11", "a", None, Some("unlisted")));
        let summary = aggregate(&ctx(), &inputs(sessions));
        let stats = purchase(&summary, VariantLabel::A);

        let competitor_sum: f64 = stats
            .competitors
            .iter()
            .map(|c| c.share_of_buy.parse::<f64>().unwrap())
            .sum();
        let total = competitor_sum + stats.share_of_buy.parse::<f64>().unwrap();
        assert!((total - 100.0).abs() < 0.1, "shares summed to {}", total);
    }

    #[test]
    fn test_survey_only_fallback() {
        let mut data = inputs(vec![session("b1", "b", None, None)]);
        data.surveys = Section::Ready(vec![survey(
            "s1",
            "b1",
            "p-b",
            RatingFields::from([("value", json!(4))]),
        )]);

        let summary = aggregate(&ctx(), &data);
        let stats = purchase(&summary, VariantLabel::B);

        assert!(stats.survey_fallback);
        assert_eq!(stats.test_product_selections, 1);
        assert_eq!(stats.total, 1);
        assert_eq!(stats.share_of_buy, "100.0");
    }

    #[test]
    fn test_survey_fallback_needs_no_recorded_selection() {
        let mut data = inputs(seventy_thirty());
        data.surveys = Section::Ready(vec![survey("s1", "a0", "p-a", RatingFields::default())]);

        let summary = aggregate(&ctx(), &data);
        let stats = purchase(&summary, VariantLabel::A);
        assert!(!stats.survey_fallback);
        assert_eq!(stats.total, 10);
    }

    #[test]
    fn test_malformed_variant_is_excluded() {
        let mut sessions = seventy_thirty();
        sessions.push(session("z1", "z", Some("p-a"), None));
        sessions.push(session("z2", "", None, Some("x")));

        let summary = aggregate(&ctx(), &inputs(sessions));
        assert_eq!(summary.variants.len(), 3);
        assert_eq!(purchase(&summary, VariantLabel::A).total, 10);
    }

    #[test]
    fn test_uppercase_variant_is_counted() {
        let sessions = vec![session("a1", "A", Some("p-a"), None)];
        let summary = aggregate(&ctx(), &inputs(sessions));
        assert_eq!(purchase(&summary, VariantLabel::A).test_product_selections, 1);
    }

    #[test]
    fn test_marketplace_selection_counts_as_competitor() {
        let mut s = session("a1", "a", Some("p-a"), None);
        s.selection = Selection::classify(Some("p-a".to_string()), None, Some("w-1".to_string()));
        let summary = aggregate(&ctx(), &inputs(vec![s]));
        let stats = purchase(&summary, VariantLabel::A);

        assert_eq!(stats.test_product_selections, 0);
        assert_eq!(stats.competitor_selections, 1);
        let unlisted = stats.competitors.iter().find(|c| c.id == "w-1").unwrap();
        assert_eq!(unlisted.title, "w-1");
        assert_eq!(unlisted.share_of_buy, "100.00");
    }

    #[test]
    fn test_competitors_sorted_by_share() {
        let sessions = vec![
            session("a1", "a", None, Some("y")),
            session("a2", "a", None, Some("y")),
            session("a3", "a", None, Some("x")),
        ];
        let summary = aggregate(&ctx(), &inputs(sessions));
        let ids: Vec<_> = purchase(&summary, VariantLabel::A)
            .competitors
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["y", "x"]);
    }

    #[test]
    fn test_combined_table_ties_break_by_variant() {
        let sessions = vec![
            session("b1", "b", None, Some("x")),
            session("b2", "b", Some("p-b"), None),
            session("a1", "a", None, Some("y")),
            session("a2", "a", Some("p-a"), None),
            session("c1", "c", None, Some("x")),
        ];
        let summary = aggregate(&ctx(), &inputs(sessions));
        let rows = combined_competitors(&summary);

        let order: Vec<_> = rows.iter().map(|r| (r.variant, r.id.as_str())).collect();
        assert_eq!(
            order,
            vec![
                (VariantLabel::C, "x"),
                (VariantLabel::A, "y"),
                (VariantLabel::B, "x"),
            ]
        );
        assert_eq!(rows[0].share_of_buy, "100.00");
        assert_eq!(rows[1].share_of_buy, "50.00");
    }

    #[test]
    fn test_rating_fallback_fields() {
        let mut data = inputs(vec![session("a1", "a", Some("p-a"), None)]);
        data.surveys = Section::Ready(vec![
            survey(
                "s1",
                "a1",
                "p-a",
                RatingFields::from([
                    ("value", json!(4)),
                    ("appearance", json!(0)),
                    ("aesthetics", json!(5)),
                    ("confidence", json!(3)),
                ]),
            ),
            survey(
                "s2",
                "a2",
                "p-a",
                RatingFields::from([
                    ("value", json!(2)),
                    ("appearance", serde_json::Value::Null),
                    ("aesthetics", json!(4)),
                ]),
            ),
        ]);

        let summary = aggregate(&ctx(), &data);
        let variant = &summary.variants[&VariantLabel::A];
        let ratings = variant.ratings.ready().unwrap();
        let appearance = ratings.iter().find(|q| q.question == "appearance").unwrap();

        assert_eq!(appearance.responses, 2);
        assert_eq!(appearance.average, Some(4.5));
        assert_eq!(variant.value_score, Some(3.0));
    }

    #[test]
    fn test_averages_are_not_rounded() {
        let mut data = inputs(vec![]);
        data.surveys = Section::Ready(vec![
            survey("s1", "a1", "p-a", RatingFields::from([("value", json!(4))])),
            survey("s2", "a2", "p-a", RatingFields::from([("value", json!(4))])),
            survey("s3", "a3", "p-a", RatingFields::from([("value", json!(5))])),
        ]);
        let summary = aggregate(&ctx(), &data);
        let score = summary.variants[&VariantLabel::A].value_score.unwrap();
        assert!((score - 13.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_share_of_clicks() {
        let mut sessions = seventy_thirty();
        sessions[0].clicked_product_ids = vec!["p-a".to_string()];
        sessions[8].clicked_product_ids = vec!["x".to_string(), "p-a".to_string()];
        sessions[9].clicked_product_ids = vec!["x".to_string()];

        let summary = aggregate(&ctx(), &inputs(sessions));
        assert_eq!(purchase(&summary, VariantLabel::A).share_of_clicks, "20.0");
    }

    #[test]
    fn test_competitor_ratings_and_reasons() {
        let mut data = inputs(seventy_thirty());
        data.comparisons = Section::Ready(vec![
            comparison("a7", "x", "Cheaper", RatingFields::from([("value", json!(5))])),
            comparison("a8", "x", "  ", RatingFields::from([("value", json!(3))])),
            // Session from another test run is not part of variant a.
            comparison("zz", "x", "Other", RatingFields::from([("value", json!(1))])),
        ]);

        let summary = aggregate(&ctx(), &data);
        let x = purchase(&summary, VariantLabel::A)
            .competitors
            .iter()
            .find(|c| c.id == "x")
            .unwrap();

        assert_eq!(x.reasons, vec!["Cheaper".to_string()]);
        let value = &x.ratings.ready().unwrap()[0];
        assert_eq!(value.average, Some(4.0));
        assert_eq!(value.responses, 2);
    }

    #[test]
    fn test_missing_sessions_degrades_to_no_data() {
        let mut data = inputs(vec![]);
        data.sessions = Section::no_data("sessions: connection refused");

        let summary = aggregate(&ctx(), &data);
        assert_eq!(summary.variants.len(), 3);
        for variant in summary.variants.values() {
            assert!(!variant.purchase.is_ready());
            assert!(variant.ratings.is_ready());
        }
        assert_eq!(
            summary.missing_sections(),
            vec!["sessions: connection refused".to_string()]
        );
    }

    #[test]
    fn test_missing_surveys_skips_fallback() {
        let mut data = inputs(vec![session("b1", "b", None, None)]);
        data.surveys = Section::no_data("surveys: timed out");

        let summary = aggregate(&ctx(), &data);
        let variant = &summary.variants[&VariantLabel::B];
        assert!(!variant.ratings.is_ready());
        assert_eq!(variant.value_score, None);
        let stats = variant.purchase.ready().unwrap();
        assert!(!stats.survey_fallback);
        assert_eq!(stats.share_of_buy, "0.0");
    }

    #[test]
    fn test_missing_catalog_uses_ids() {
        let mut data = inputs(seventy_thirty());
        data.competitors = Section::no_data("competitors: missing");

        let summary = aggregate(&ctx(), &data);
        let stats = purchase(&summary, VariantLabel::A);
        assert_eq!(stats.competitors.len(), 1);
        assert_eq!(stats.competitors[0].title, "x");
    }

    #[test]
    fn test_survey_free_text_is_collected() {
        let mut data = inputs(seventy_thirty());
        let mut liked = survey("s1", "a0", "p-a", RatingFields::default());
        liked.likes_most = Some("  the crunch ".to_string());
        liked.improve_suggestions = Some("less sugar".to_string());
        let mut blank = survey("s2", "a1", "p-a", RatingFields::default());
        blank.likes_most = Some("   ".to_string());
        let other_product = {
            let mut s = survey("s3", "b1", "p-b", RatingFields::default());
            s.likes_most = Some("price".to_string());
            s
        };
        data.surveys = Section::Ready(vec![liked, blank, other_product]);

        let summary = aggregate(&ctx(), &data);
        let variant = &summary.variants[&VariantLabel::A];
        assert_eq!(variant.likes_most, vec!["the crunch".to_string()]);
        assert_eq!(variant.improvements, vec!["less sugar".to_string()]);
        assert_eq!(
            summary.variants[&VariantLabel::B].likes_most,
            vec!["price".to_string()]
        );
    }

    #[test]
    fn test_duplicate_catalog_rows_are_merged() {
        let mut data = inputs(seventy_thirty());
        data.competitors = Section::Ready(vec![
            competitor("x", ""),
            competitor("y", "Brand Y"),
            competitor("x", "Brand X"),
            competitor("y", "Brand Y (old export)"),
        ]);

        let summary = aggregate(&ctx(), &data);
        let stats = purchase(&summary, VariantLabel::A);

        let ids: Vec<_> = stats.competitors.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
        assert_eq!(stats.competitors[0].title, "Brand X");
        assert_eq!(stats.competitors[1].title, "Brand Y");

        let competitor_sum: f64 = stats
            .competitors
            .iter()
            .map(|c| c.share_of_buy.parse::<f64>().unwrap())
            .sum();
        let total = competitor_sum + stats.share_of_buy.parse::<f64>().unwrap();
        assert!((total - 100.0).abs() < 0.1, "shares summed to {}", total);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let mut data = inputs(seventy_thirty());
        data.surveys = Section::Ready(vec![survey(
            "s1",
            "a0",
            "p-a",
            RatingFields::from([("value", json!(4)), ("aesthetics", json!(3))]),
        )]);
        let context = ctx();

        let first = serde_json::to_string(&aggregate(&context, &data)).unwrap();
        let second = serde_json::to_string(&aggregate(&context, &data)).unwrap();
        assert_eq!(first, second);
    }
}
