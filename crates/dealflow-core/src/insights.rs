// Insight domain types
//
// An InsightsBundle is produced wholesale by the insight service and is then
// edited one field at a time during review. A bundle is never stored partially
// populated: it is either absent from the session or passed `validate`.

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::{Result, WorkflowError};

/// One point of the sentiment curve over the call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SentimentPoint {
    /// Offset into the call, in seconds
    pub offset: f64,
    /// Sentiment score in [-1, 1]
    pub score: f64,
}

impl SentimentPoint {
    pub fn new(offset: f64, score: f64) -> Self {
        Self { offset, score }
    }

    fn is_valid(&self) -> bool {
        self.offset.is_finite() && self.offset >= 0.0 && (-1.0..=1.0).contains(&self.score)
    }
}

/// Addressable fields of an InsightsBundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum InsightField {
    SummaryText,
    SentimentSeries,
    KeyPoints,
    EmailDraft,
    PresentationDraft,
}

impl InsightField {
    pub const ALL: [InsightField; 5] = [
        InsightField::SummaryText,
        InsightField::SentimentSeries,
        InsightField::KeyPoints,
        InsightField::EmailDraft,
        InsightField::PresentationDraft,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InsightField::SummaryText => "summary_text",
            InsightField::SentimentSeries => "sentiment_series",
            InsightField::KeyPoints => "key_points",
            InsightField::EmailDraft => "email_draft",
            InsightField::PresentationDraft => "presentation_draft",
        }
    }
}

impl std::fmt::Display for InsightField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InsightField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        InsightField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("unknown insight field: {s}"))
    }
}

/// Value of a single insight field
///
/// Untagged so API clients send plain JSON: a string for text fields, an
/// array of strings for key points, an array of points for sentiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Sentiment(Vec<SentimentPoint>),
    List(Vec<String>),
}

impl FieldValue {
    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Sentiment(_) => "sentiment series",
            FieldValue::List(_) => "list of strings",
        }
    }
}

/// Structured AI-derived output for one call
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct InsightsBundle {
    pub summary_text: String,
    #[serde(default)]
    pub sentiment_series: Vec<SentimentPoint>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub email_draft: String,
    #[serde(default)]
    pub presentation_draft: String,
}

impl InsightsBundle {
    /// Read one field as a FieldValue
    pub fn get(&self, field: InsightField) -> FieldValue {
        match field {
            InsightField::SummaryText => FieldValue::Text(self.summary_text.clone()),
            InsightField::SentimentSeries => FieldValue::Sentiment(self.sentiment_series.clone()),
            InsightField::KeyPoints => FieldValue::List(self.key_points.clone()),
            InsightField::EmailDraft => FieldValue::Text(self.email_draft.clone()),
            InsightField::PresentationDraft => FieldValue::Text(self.presentation_draft.clone()),
        }
    }

    /// Replace exactly one field, leaving the others untouched
    ///
    /// Fails with `InvalidField` when the value has the wrong shape or a
    /// sentiment score falls outside [-1, 1]; the bundle is unchanged then.
    pub fn set(&mut self, field: InsightField, value: FieldValue) -> Result<()> {
        match (field, value) {
            (InsightField::SummaryText, FieldValue::Text(text)) => self.summary_text = text,
            (InsightField::EmailDraft, FieldValue::Text(text)) => self.email_draft = text,
            (InsightField::PresentationDraft, FieldValue::Text(text)) => {
                self.presentation_draft = text
            }
            (InsightField::KeyPoints, FieldValue::List(points)) => self.key_points = points,
            // an empty JSON array deserializes as the first matching variant
            (InsightField::KeyPoints, FieldValue::Sentiment(points)) if points.is_empty() => {
                self.key_points = Vec::new()
            }
            (InsightField::SentimentSeries, FieldValue::Sentiment(series)) => {
                if let Some(bad) = series.iter().find(|p| !p.is_valid()) {
                    return Err(WorkflowError::invalid_field(
                        field,
                        format!(
                            "sentiment point at offset {} has score {} outside [-1, 1]",
                            bad.offset, bad.score
                        ),
                    ));
                }
                if series.windows(2).any(|pair| pair[1].offset < pair[0].offset) {
                    return Err(WorkflowError::invalid_field(
                        field,
                        "sentiment series is not ordered by offset",
                    ));
                }
                self.sentiment_series = series;
            }
            (InsightField::SentimentSeries, FieldValue::List(items)) if items.is_empty() => {
                self.sentiment_series = Vec::new()
            }
            (field, value) => {
                return Err(WorkflowError::invalid_field(
                    field,
                    format!("expected {}, got {}", expected_kind(field), value.kind()),
                ))
            }
        }
        Ok(())
    }

    /// Check a freshly produced bundle before it enters a session
    pub fn validate(&self, required: &[InsightField]) -> std::result::Result<(), String> {
        if let Some(bad) = self.sentiment_series.iter().find(|p| !p.is_valid()) {
            return Err(format!(
                "sentiment score {} at offset {} is outside [-1, 1]",
                bad.score, bad.offset
            ));
        }

        if self
            .sentiment_series
            .windows(2)
            .any(|pair| pair[1].offset < pair[0].offset)
        {
            return Err("sentiment series is not ordered by offset".to_string());
        }

        for field in required {
            if self.is_empty(*field) {
                return Err(format!("required field {field} is empty"));
            }
        }

        Ok(())
    }

    fn is_empty(&self, field: InsightField) -> bool {
        match field {
            InsightField::SummaryText => self.summary_text.trim().is_empty(),
            InsightField::SentimentSeries => self.sentiment_series.is_empty(),
            InsightField::KeyPoints => self.key_points.is_empty(),
            InsightField::EmailDraft => self.email_draft.trim().is_empty(),
            InsightField::PresentationDraft => self.presentation_draft.trim().is_empty(),
        }
    }
}

fn expected_kind(field: InsightField) -> &'static str {
    match field {
        InsightField::SentimentSeries => "sentiment series",
        InsightField::KeyPoints => "list of strings",
        _ => "text",
    }
}
