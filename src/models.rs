//! Data models for shelf test reports.
//!
//! This module contains the row types as they come out of the data store,
//! the normalized shapes the aggregator works on, and the aggregated summary
//! that every report format renders.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Label of one product version under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantLabel {
    A,
    B,
    C,
}

impl VariantLabel {
    /// Parse a raw `variant_type` value. Case and surrounding whitespace are ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "a" => Some(VariantLabel::A),
            "b" => Some(VariantLabel::B),
            "c" => Some(VariantLabel::C),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VariantLabel::A => "a",
            VariantLabel::B => "b",
            VariantLabel::C => "c",
        }
    }
}

impl fmt::Display for VariantLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantLabel::A => write!(f, "A"),
            VariantLabel::B => write!(f, "B"),
            VariantLabel::C => write!(f, "C"),
        }
    }
}

// ── Row decoding helpers ────────────────────────────────────────────

/// Ids arrive as strings from file exports and as integers from some hosted tables.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => non_empty(Some(s)),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Ids in a list column; entries that are not strings or numbers are dropped,
/// and any other shape reads as an empty list.
fn id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => non_empty(Some(s)),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Timestamps arrive as RFC 3339, or without an offset from `timestamp`
/// columns and text exports; the latter are read as UTC. Anything else is `None`.
fn opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => parse_timestamp(&s),
        _ => None,
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // psql prints offsets as `+00`
    for format in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ── Test definition ─────────────────────────────────────────────────

/// One product version of a test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestVariant {
    /// Raw label as stored (`a`, `b` or `c`).
    pub label: String,
    /// Product shown to shoppers in this variant.
    #[serde(deserialize_with = "id_string")]
    pub product_id: String,
    #[serde(default)]
    pub title: String,
}

/// An experiment: a search term and the 2–3 variants shown for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDefinition {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub variants: Vec<TestVariant>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl TestDefinition {
    /// Look up the variant definition for a label.
    pub fn variant(&self, label: VariantLabel) -> Option<&TestVariant> {
        self.variants
            .iter()
            .find(|v| VariantLabel::parse(&v.label) == Some(label))
    }

    /// Labels of all well-formed variants, in label order.
    pub fn labels(&self) -> Vec<VariantLabel> {
        let mut labels: Vec<VariantLabel> = self
            .variants
            .iter()
            .filter_map(|v| VariantLabel::parse(&v.label))
            .collect();
        labels.sort();
        labels.dedup();
        labels
    }
}

// ── Shopper sessions ────────────────────────────────────────────────

/// A shopper session row exactly as the store returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionRow {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub variant_type: Option<String>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub product_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub competitor_id: Option<String>,
    /// Product id from the external marketplace catalog.
    #[serde(default, deserialize_with = "opt_id_string")]
    pub walmart_product_id: Option<String>,
    /// Products the shopper clicked or viewed.
    #[serde(default, deserialize_with = "id_list")]
    pub clicked_product_ids: Vec<String>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// What a shopper ended up choosing at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ref_id", rename_all = "snake_case")]
pub enum Selection {
    Competitor(String),
    TestProduct(String),
}

impl Selection {
    /// Classify the selection columns of a raw row.
    ///
    /// A competitor reference wins over `product_id`.
    pub fn classify(
        product_id: Option<String>,
        competitor_id: Option<String>,
        marketplace_id: Option<String>,
    ) -> Option<Self> {
        if let Some(id) = non_empty(competitor_id).or_else(|| non_empty(marketplace_id)) {
            return Some(Selection::Competitor(id));
        }
        non_empty(product_id).map(Selection::TestProduct)
    }
}

/// A shopper session after normalization.
#[derive(Debug, Clone, Serialize)]
pub struct ShopperSession {
    pub id: String,
    /// `None` when `variant_type` is missing or not one of a/b/c.
    pub variant: Option<VariantLabel>,
    pub selection: Option<Selection>,
    pub clicked_product_ids: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<SessionRow> for ShopperSession {
    fn from(row: SessionRow) -> Self {
        Self {
            variant: row.variant_type.as_deref().and_then(VariantLabel::parse),
            selection: Selection::classify(
                row.product_id,
                row.competitor_id,
                row.walmart_product_id,
            ),
            clicked_product_ids: row.clicked_product_ids,
            created_at: row.created_at,
            id: row.id,
        }
    }
}

// ── Survey and comparison responses ─────────────────────────────────

/// Every column of a response row that is not modelled explicitly.
///
/// Rating questions are looked up here by field name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingFields(pub BTreeMap<String, Value>);

impl RatingFields {
    /// Numeric value of a field. Absent, null, non-numeric and zero all read as `None`.
    pub fn number(&self, field: &str) -> Option<f64> {
        let value = match self.0.get(field)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        (value.is_finite() && value != 0.0).then_some(value)
    }
}

impl<const N: usize> From<[(&str, Value); N]> for RatingFields {
    fn from(fields: [(&str, Value); N]) -> Self {
        Self(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

/// Ratings and free text a shopper gave about the product they selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyResponse {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub session_id: String,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub product_id: Option<String>,
    #[serde(default)]
    pub likes_most: Option<String>,
    #[serde(default)]
    pub improve_suggestions: Option<String>,
    #[serde(flatten)]
    pub ratings: RatingFields,
}

/// Variant-versus-competitor ratings recorded when a shopper picked a competitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResponse {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub session_id: String,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub competitor_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub walmart_product_id: Option<String>,
    /// Why the shopper did not choose the variant.
    #[serde(default)]
    pub choose_reason: Option<String>,
    #[serde(flatten)]
    pub ratings: RatingFields,
}

impl ComparisonResponse {
    /// The competitor this comparison is about.
    pub fn competitor_ref(&self) -> Option<&str> {
        self.competitor_id
            .as_deref()
            .or(self.walmart_product_id.as_deref())
    }
}

/// A product from the external catalog shown next to the variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorProduct {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

// ── Sections ────────────────────────────────────────────────────────

/// A piece of report data that may be unavailable because its rows could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Section<T> {
    Ready(T),
    NoData { reason: String },
}

impl<T> Section<T> {
    pub fn no_data(reason: impl Into<String>) -> Self {
        Section::NoData {
            reason: reason.into(),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(data) => Some(data),
            Section::NoData { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Section::Ready(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Section<U> {
        match self {
            Section::Ready(data) => Section::Ready(f(data)),
            Section::NoData { reason } => Section::NoData { reason },
        }
    }
}

/// Everything loaded for one test, ready for aggregation.
#[derive(Debug, Clone)]
pub struct ReportInputs {
    pub test: TestDefinition,
    pub sessions: Section<Vec<ShopperSession>>,
    pub surveys: Section<Vec<SurveyResponse>>,
    pub comparisons: Section<Vec<ComparisonResponse>>,
    pub competitors: Section<Vec<CompetitorProduct>>,
    /// Rows that were fetched but could not be decoded.
    pub skipped_rows: usize,
}

// ── Aggregated output ───────────────────────────────────────────────

/// Mean rating for one purchase-driver question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAverage {
    pub question: String,
    pub label: String,
    /// Unrounded mean; `None` when the group had no rows.
    pub average: Option<f64>,
    pub responses: usize,
}

/// Share of buy and ratings for one competitor within a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorShare {
    pub id: String,
    pub title: String,
    pub selections: usize,
    /// Percentage with two decimals.
    pub share_of_buy: String,
    pub ratings: Section<Vec<QuestionAverage>>,
    /// Free-text "why not the variant" answers.
    pub reasons: Vec<String>,
}

/// Purchase outcome of one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseStats {
    pub sessions: usize,
    pub test_product_selections: usize,
    pub competitor_selections: usize,
    pub total: usize,
    /// True when the survey-only fallback supplied the test product selection.
    pub survey_fallback: bool,
    /// Percentage with one decimal.
    pub share_of_clicks: String,
    /// Percentage with one decimal.
    pub share_of_buy: String,
    pub competitors: Vec<CompetitorShare>,
}

/// Everything reported for one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    pub label: VariantLabel,
    pub product_id: String,
    pub product_title: String,
    pub purchase: Section<PurchaseStats>,
    pub value_score: Option<f64>,
    pub ratings: Section<Vec<QuestionAverage>>,
    /// Free-text "what did you like most" answers for the variant's product.
    #[serde(default)]
    pub likes_most: Vec<String>,
    /// Free-text improvement suggestions for the variant's product.
    #[serde(default)]
    pub improvements: Vec<String>,
}

/// Aggregated results of one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub test_id: String,
    pub test_name: String,
    pub search_term: String,
    pub variants: BTreeMap<VariantLabel, VariantSummary>,
}

impl TestSummary {
    /// Reasons of every section that could not be computed, deduplicated.
    pub fn missing_sections(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut reasons = Vec::new();
        let mut push = |reason: &str| {
            if seen.insert(reason.to_string()) {
                reasons.push(reason.to_string());
            }
        };

        for variant in self.variants.values() {
            match &variant.purchase {
                Section::NoData { reason } => push(reason),
                Section::Ready(stats) => {
                    for competitor in &stats.competitors {
                        if let Section::NoData { reason } = &competitor.ratings {
                            push(reason);
                        }
                    }
                }
            }
            if let Section::NoData { reason } = &variant.ratings {
                push(reason);
            }
        }

        reasons
    }
}

/// Metadata about a generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub test_id: String,
    pub generated_at: DateTime<Utc>,
    /// Human-readable description of the data store.
    pub source: String,
    pub sessions_loaded: usize,
    pub rows_skipped: usize,
    pub duration_seconds: f64,
}

/// The complete report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: TestSummary,
}
