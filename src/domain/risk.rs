use serde::{Deserialize, Serialize};

use crate::extraction::{FieldReader, StructuredOutput};

pub const DEFAULT_REASON_CODES: &str = "UNSPECIFIED";
pub const DEFAULT_EXPLANATION: &str = "No explanation provided.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScoringInput {
    pub anomaly_description: String,
    /// Free-form parameters such as threshold breaches or vendor concentration.
    pub risk_parameters: String,
    pub confidence_interval: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub confidence_score: f64,
    pub reason_codes: String,
    pub explanation: String,
}

impl Default for RiskAssessment {
    fn default() -> Self {
        Self {
            risk_score: 0.0,
            confidence_score: 0.0,
            reason_codes: DEFAULT_REASON_CODES.to_string(),
            explanation: DEFAULT_EXPLANATION.to_string(),
        }
    }
}

impl StructuredOutput for RiskAssessment {
    const SCHEMA: &'static str = "risk assessment";

    fn from_fields(fields: &mut FieldReader<'_>) -> Self {
        Self {
            risk_score: fields.score(&["riskScore", "risk_score"]),
            confidence_score: fields.score(&["confidenceScore", "confidence_score", "confidence"]),
            reason_codes: fields.text(&["reasonCodes", "reason_codes"], DEFAULT_REASON_CODES),
            explanation: fields.text(&["explanation"], DEFAULT_EXPLANATION),
        }
    }
}
