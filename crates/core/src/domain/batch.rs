use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub String);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GrainSize {
    Uniform,
    Mixed,
    Small,
    Other(String),
}

impl From<String> for GrainSize {
    fn from(value: String) -> Self {
        match value.trim() {
            "Uniform" => Self::Uniform,
            "Mixed" => Self::Mixed,
            "Small" => Self::Small,
            _ => Self::Other(value),
        }
    }
}

impl From<GrainSize> for String {
    fn from(value: GrainSize) -> Self {
        match value {
            GrainSize::Uniform => "Uniform".to_string(),
            GrainSize::Mixed => "Mixed".to_string(),
            GrainSize::Small => "Small".to_string(),
            GrainSize::Other(other) => other,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GrainColor {
    Natural,
    Discolored,
    Mixed,
    Other(String),
}

impl From<String> for GrainColor {
    fn from(value: String) -> Self {
        match value.trim() {
            "Natural" => Self::Natural,
            "Discolored" => Self::Discolored,
            "Mixed" => Self::Mixed,
            _ => Self::Other(value),
        }
    }
}

impl From<GrainColor> for String {
    fn from(value: GrainColor) -> Self {
        match value {
            GrainColor::Natural => "Natural".to_string(),
            GrainColor::Discolored => "Discolored".to_string(),
            GrainColor::Mixed => "Mixed".to_string(),
            GrainColor::Other(other) => other,
        }
    }
}

/// Inspection measurements for a single batch. Every measurement is optional;
/// an absent value skips the corresponding quality rule.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMeasurements {
    pub moisture_content: Option<f64>,
    pub impurity_level: Option<f64>,
    pub grain_size: Option<GrainSize>,
    pub color: Option<GrainColor>,
    pub weight: Option<f64>,
    pub expected_weight: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityStatus {
    Passed,
    PassedWithWarnings,
    Flagged,
}

impl QualityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::PassedWithWarnings => "PASSED_WITH_WARNINGS",
            Self::Flagged => "FLAGGED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PASSED" => Some(Self::Passed),
            "PASSED_WITH_WARNINGS" => Some(Self::PassedWithWarnings),
            "FLAGGED" => Some(Self::Flagged),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingSeverity {
    Critical,
    Warning,
}

/// One failed quality rule. Critical findings block approval.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityFinding {
    #[serde(rename = "type")]
    pub severity: FindingSeverity,
    pub parameter: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variance: Option<String>,
    pub message: String,
}

impl QualityFinding {
    pub fn critical(
        parameter: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(FindingSeverity::Critical, parameter, value, message)
    }

    pub fn warning(
        parameter: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(FindingSeverity::Warning, parameter, value, message)
    }

    fn new(
        severity: FindingSeverity,
        parameter: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            parameter: parameter.into(),
            value: value.into(),
            threshold: None,
            expected: None,
            variance: None,
            message: message.into(),
        }
    }

    pub fn with_threshold(mut self, threshold: impl Into<String>) -> Self {
        self.threshold = Some(threshold.into());
        self
    }

    pub fn with_variance(mut self, expected: impl Into<String>, variance: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.variance = Some(variance.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityVerdict {
    pub issues: Vec<QualityFinding>,
    pub warnings: Vec<QualityFinding>,
    pub status: QualityStatus,
    pub approved: bool,
    pub score: u8,
    pub recommendation: String,
    pub checked_at: DateTime<Utc>,
}

/// A verdict as appended to the quality-check log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityCheckRecord {
    pub id: String,
    pub batch_id: BatchId,
    pub product_type: String,
    pub measurements: BatchMeasurements,
    #[serde(flatten)]
    pub verdict: QualityVerdict,
}
