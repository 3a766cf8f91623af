use serde::{Deserialize, Serialize};

use super::risk::DEFAULT_EXPLANATION;
use crate::extraction::{FieldReader, StructuredOutput};

pub const UNKNOWN_RECORD_ID: &str = "unknown";
pub const UNCLASSIFIED_ANOMALY: &str = "unclassified";
pub const DEFAULT_REASON: &str = "No reason provided.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub date: String,
    pub amount: f64,
    pub vendor: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub date: String,
    pub amount: f64,
    pub vendor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub id: String,
    pub date: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRule {
    pub id: String,
    pub description: String,
    pub logic: String,
}

/// Ledger extract plus the rules the model should apply to it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnomalyDetectionInput {
    pub journal_entries: Vec<JournalEntry>,
    pub vendors: Vec<Vendor>,
    pub payments: Vec<Payment>,
    pub users: Vec<User>,
    pub approvals: Vec<Approval>,
    pub documents: Vec<Document>,
    pub rules: Vec<AuditRule>,
}

impl AnomalyDetectionInput {
    pub fn is_empty(&self) -> bool {
        self.journal_entries.is_empty()
            && self.payments.is_empty()
            && self.approvals.is_empty()
            && self.documents.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyFinding {
    /// Record the anomaly was raised on.
    pub id: String,
    #[serde(rename = "type")]
    pub anomaly_type: String,
    pub score: f64,
    pub reason: String,
    pub explanation: String,
    pub supporting_evidence: Vec<String>,
}

impl AnomalyFinding {
    fn from_fields(fields: &mut FieldReader<'_>) -> Self {
        Self {
            id: fields.text(&["id", "recordId", "record_id"], UNKNOWN_RECORD_ID),
            anomaly_type: fields.text(&["type", "anomalyType", "anomaly_type"], UNCLASSIFIED_ANOMALY),
            score: fields.score(&["score", "riskScore", "anomalyScore"]),
            reason: fields.text(&["reason"], DEFAULT_REASON),
            explanation: fields.text(&["explanation"], DEFAULT_EXPLANATION),
            supporting_evidence: fields.list(&["supportingEvidence", "supporting_evidence", "evidence"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<AnomalyFinding>,
}

impl StructuredOutput for AnomalyReport {
    const SCHEMA: &'static str = "anomaly report";

    fn from_fields(fields: &mut FieldReader<'_>) -> Self {
        let anomalies = fields
            .objects(&["anomalies", "findings"])
            .into_iter()
            .filter_map(|item| {
                let mut item_fields = FieldReader::new(Self::SCHEMA, item);
                let finding = AnomalyFinding::from_fields(&mut item_fields);
                // An element sharing no field with a finding is noise, not a finding.
                item_fields.finish().ok().map(|_| finding)
            })
            .collect();
        Self { anomalies }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::extract_structured;

    #[test]
    fn reads_findings_and_defaults_their_fields() {
        let text = r#"Analysis complete.
        {"anomalies": [
            {"id": "PAY-002", "type": "duplicate payment", "score": 91, "reason": "same amount and invoice",
             "explanation": "PAY-002 repeats PAY-001", "supportingEvidence": ["PAY-001", "INV-77"]},
            {"id": "JE-10", "score": "120"},
            "stray text",
            {"irrelevant": true}
        ]}"#;
        let report: AnomalyReport = extract_structured(text).unwrap();

        assert_eq!(report.anomalies.len(), 2);
        let first = &report.anomalies[0];
        assert_eq!(first.anomaly_type, "duplicate payment");
        assert_eq!(first.supporting_evidence, vec!["PAY-001", "INV-77"]);

        let second = &report.anomalies[1];
        assert_eq!(second.score, 100.0);
        assert_eq!(second.anomaly_type, UNCLASSIFIED_ANOMALY);
        assert_eq!(second.reason, DEFAULT_REASON);
        assert!(second.supporting_evidence.is_empty());
    }

    #[test]
    fn empty_anomaly_list_is_valid() {
        let report: AnomalyReport = extract_structured(r#"{"anomalies": []}"#).unwrap();
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn finding_serializes_type_field() {
        let finding = AnomalyFinding {
            id: "PAY-1".into(),
            anomaly_type: "threshold breach".into(),
            score: 70.0,
            reason: "r".into(),
            explanation: "e".into(),
            supporting_evidence: vec![],
        };
        let value = serde_json::to_value(&finding).unwrap();
        assert_eq!(value["type"], "threshold breach");
        assert!(value["supportingEvidence"].is_array());
    }

    #[test]
    fn input_accepts_partial_json() {
        let input: AnomalyDetectionInput = serde_json::from_str(
            r#"{"payments": [{"id": "PAY-1", "date": "2024-03-01", "amount": 9999.0, "vendor": "V-1"}]}"#,
        )
        .unwrap();
        assert_eq!(input.payments.len(), 1);
        assert!(input.rules.is_empty());
        assert!(!input.is_empty());
    }
}
