use chrono::{DateTime, Utc};

use crate::domain::batch::{
    BatchMeasurements, GrainColor, GrainSize, QualityFinding, QualityStatus, QualityVerdict,
};
use crate::scoring::QualityThresholds;

pub const APPROVED_RECOMMENDATION: &str =
    "Batch meets quality standards - Approved for processing/sale";
pub const ATTENTION_RECOMMENDATION: &str =
    "Batch requires attention - Address critical issues before proceeding";

/// Rule-based batch inspection. Rules are independent; every rule whose
/// measurement is present is evaluated.
pub struct QualityInspector {
    thresholds: QualityThresholds,
}

impl QualityInspector {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn inspect(&self, batch: &BatchMeasurements, now: DateTime<Utc>) -> QualityVerdict {
        let limits = &self.thresholds;
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        if let Some(moisture) = batch.moisture_content {
            if moisture > limits.moisture_critical {
                issues.push(
                    QualityFinding::critical(
                        "Moisture Content",
                        percent(moisture),
                        "Moisture content exceeds safe storage limit - Risk of fungal growth",
                    )
                    .with_threshold(percent(limits.moisture_critical)),
                );
            } else if moisture > limits.moisture_warning {
                warnings.push(QualityFinding::warning(
                    "Moisture Content",
                    percent(moisture),
                    "Moisture content is slightly high - Monitor closely",
                ));
            }
        }

        if let Some(impurity) = batch.impurity_level {
            if impurity > limits.impurity_critical {
                issues.push(
                    QualityFinding::critical(
                        "Impurity Level",
                        percent(impurity),
                        "Impurity level exceeds acceptable limit - Requires cleaning",
                    )
                    .with_threshold(percent(limits.impurity_critical)),
                );
            } else if impurity > limits.impurity_warning {
                warnings.push(QualityFinding::warning(
                    "Impurity Level",
                    percent(impurity),
                    "Impurity level is acceptable but could be improved",
                ));
            }
        }

        if let Some(size @ (GrainSize::Mixed | GrainSize::Small)) = &batch.grain_size {
            warnings.push(QualityFinding::warning(
                "Grain Size",
                String::from(size.clone()),
                "Non-uniform grain size - May affect market price",
            ));
        }

        match &batch.color {
            Some(GrainColor::Discolored) => issues.push(QualityFinding::critical(
                "Color",
                "Discolored",
                "Discoloration detected - Possible quality degradation",
            )),
            Some(GrainColor::Mixed) => warnings.push(QualityFinding::warning(
                "Color",
                "Mixed",
                "Mixed color detected - May indicate multiple varieties",
            )),
            _ => {}
        }

        if let (Some(weight), Some(expected)) = (batch.weight, batch.expected_weight) {
            if weight > 0.0 && expected > 0.0 {
                let variance_pct = (weight - expected).abs() / expected * 100.0;
                if variance_pct > limits.weight_variance_pct {
                    issues.push(
                        QualityFinding::critical(
                            "Weight",
                            format!("{weight}kg"),
                            format!(
                                "Weight variance exceeds {}% - Possible measurement error or loss",
                                limits.weight_variance_pct
                            ),
                        )
                        .with_variance(format!("{expected}kg"), format!("{variance_pct:.2}%")),
                    );
                }
            }
        }

        let status = if !issues.is_empty() {
            QualityStatus::Flagged
        } else if !warnings.is_empty() {
            QualityStatus::PassedWithWarnings
        } else {
            QualityStatus::Passed
        };
        let approved = issues.is_empty();
        let score = self.score(issues.len(), warnings.len());
        let recommendation =
            if approved { APPROVED_RECOMMENDATION } else { ATTENTION_RECOMMENDATION };

        QualityVerdict {
            issues,
            warnings,
            status,
            approved,
            score,
            recommendation: recommendation.to_string(),
            checked_at: now,
        }
    }

    fn score(&self, critical: usize, warnings: usize) -> u8 {
        let penalty = critical * usize::from(self.thresholds.critical_penalty)
            + warnings * usize::from(self.thresholds.warning_penalty);
        100usize.saturating_sub(penalty) as u8
    }
}

impl Default for QualityInspector {
    fn default() -> Self {
        Self::new(QualityThresholds::default())
    }
}

fn percent(value: f64) -> String {
    format!("{value}%")
}
