//! Purchase-driver questions and their field fallback chains.
//!
//! Older response rows store some answers under legacy column names
//! (`aesthetics` before `appearance`, `utility` before `confidence`).
//! Every question lists the columns it accepts, in order, and [`resolve`]
//! is the only place that walks that list.

use crate::config::QuestionsConfig;
use crate::models::{QuestionAverage, RatingFields};
use anyhow::{bail, Result};
use std::collections::HashSet;

/// Id of the question whose average is reported as the value score.
pub const VALUE: &str = "value";

/// Built-in purchase drivers: (id, label, accepted fields in priority order).
const BUILTIN: &[(&str, &str, &[&str])] = &[
    (VALUE, "Value", &["value"]),
    ("appearance", "Appearance", &["appearance", "aesthetics"]),
    ("confidence", "Confidence", &["confidence", "utility"]),
    ("brand", "Brand / Trust", &["brand", "trust"]),
    ("convenience", "Convenience", &["convenience"]),
];

/// A rating question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: String,
    pub label: String,
    pub fields: Vec<String>,
}

impl Question {
    pub fn new(id: &str, label: &str, fields: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// The ordered set of questions a report covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
    questions: Vec<Question>,
}

impl Default for QuestionSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl QuestionSet {
    /// All built-in purchase drivers.
    pub fn builtin() -> Self {
        Self {
            questions: BUILTIN
                .iter()
                .map(|(id, label, fields)| Question::new(id, label, fields))
                .collect(),
        }
    }

    /// Build the question set from configuration.
    ///
    /// Extra questions are appended after the built-ins. An empty `enabled`
    /// list keeps everything; otherwise only the listed ids are kept, in
    /// table order.
    pub fn from_config(config: &QuestionsConfig) -> Result<Self> {
        let mut questions = Self::builtin().questions;

        for extra in &config.extra {
            if extra.id.trim().is_empty() {
                bail!("Extra question with label '{}' has an empty id", extra.label);
            }
            if questions.iter().any(|q| q.id == extra.id) {
                bail!("Question id '{}' is defined more than once", extra.id);
            }
            let fields = if extra.fields.is_empty() {
                vec![extra.id.clone()]
            } else {
                extra.fields.clone()
            };
            let label = if extra.label.is_empty() {
                extra.id.clone()
            } else {
                extra.label.clone()
            };
            questions.push(Question {
                id: extra.id.clone(),
                label,
                fields,
            });
        }

        if !config.enabled.is_empty() {
            let known: HashSet<&str> = questions.iter().map(|q| q.id.as_str()).collect();
            if let Some(unknown) = config.enabled.iter().find(|id| !known.contains(id.as_str())) {
                bail!("Unknown question id '{}' in enabled questions", unknown);
            }
            questions.retain(|q| config.enabled.contains(&q.id));
        }

        Ok(Self { questions })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Look up a question by id, falling back to the built-in table.
    ///
    /// The value score is reported even when `value` is not an enabled question.
    pub fn get_or_builtin(&self, id: &str) -> Option<Question> {
        self.questions
            .iter()
            .find(|q| q.id == id)
            .cloned()
            .or_else(|| Self::builtin().questions.into_iter().find(|q| q.id == id))
    }
}

/// Value a single row gives for a question: the first accepted field that holds a rating.
pub fn resolve(question: &Question, ratings: &RatingFields) -> Option<f64> {
    question
        .fields
        .iter()
        .find_map(|field| ratings.number(field))
}

/// Mean over every row of the group. Rows where nothing resolves count as 0.
pub fn average<'a, I>(question: &Question, rows: I) -> QuestionAverage
where
    I: IntoIterator<Item = &'a RatingFields>,
{
    let mut sum = 0.0;
    let mut responses = 0;
    for row in rows {
        sum += resolve(question, row).unwrap_or(0.0);
        responses += 1;
    }

    QuestionAverage {
        question: question.id.clone(),
        label: question.label.clone(),
        average: (responses > 0).then(|| sum / responses as f64),
        responses,
    }
}

/// Averages for every question in the set, in set order.
pub fn averages(questions: &QuestionSet, rows: &[&RatingFields]) -> Vec<QuestionAverage> {
    questions
        .iter()
        .map(|q| average(q, rows.iter().copied()))
        .collect()
}
