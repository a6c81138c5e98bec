//! Per-report context passed explicitly to aggregation and rendering.

use crate::analysis::QuestionSet;
use chrono::{DateTime, Utc};

/// What a single report run is about.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub test_id: String,
    pub questions: QuestionSet,
    pub generated_at: DateTime<Utc>,
}

impl ReportContext {
    pub fn new(test_id: impl Into<String>, questions: QuestionSet) -> Self {
        Self {
            test_id: test_id.into(),
            questions,
            generated_at: Utc::now(),
        }
    }
}
