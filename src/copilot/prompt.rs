use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::domain::{AnomalyDetectionInput, EvidenceInput, RiskScoringInput};

const STRICT_JSON_RULES: &str = "Rules:
- Reply with one JSON object and nothing else.
- No markdown, no backticks, no comments, no text outside the JSON.
- Every field listed below must be present.";

const RISK_SCORING: &str = "You are a strict JSON risk scoring engine for internal audit.

{{rules}}
- riskScore and confidenceScore are numbers between 0 and 100.

Return JSON in exactly this shape:
{
  \"riskScore\": number,
  \"confidenceScore\": number,
  \"reasonCodes\": \"string\",
  \"explanation\": \"string\"
}

Anomaly description: {{anomaly_description}}
Risk parameters: {{risk_parameters}}
Confidence interval: {{confidence_interval}}

Return JSON only.";

const EVIDENCE_PACK: &str = "You write regulator-ready explanations and evidence packs for flagged audit issues.

{{rules}}

Explain clearly why the issue was flagged, which patterns were violated and which evidence supports it.
Then assemble the evidence pack: the relevant supporting transactions, the source documents, the
transformation logs showing how the data was processed, and the analyst notes if any.

Return JSON in exactly this shape:
{
  \"explanation\": \"string\",
  \"evidencePack\": {
    \"supportingTransactions\": \"string\",
    \"sourceDocuments\": \"string\",
    \"transformationLogs\": \"string\",
    \"analystNotes\": \"string\"
  }
}

Issue description: {{issue_description}}
Violated patterns: {{violated_patterns}}
Supporting evidence: {{supporting_evidence}}
Transformation logs: {{transformation_logs}}
Source documents: {{source_documents}}
Analyst notes: {{analyst_notes}}

Return JSON only.";

const ANOMALY_DETECTION: &str = "You are an internal audit copilot that detects anomalies in financial data.

{{rules}}
- score is a number between 0 and 100.

Apply the rules below to the data sets and report duplicate payments, threshold breaches,
vendor concentration risks and other unusual patterns. For every anomaly give the record id,
the anomaly type, a score, a short reason, a human-readable explanation and the ids of the
records that support it. Return an empty list when nothing is anomalous.

Return JSON in exactly this shape:
{
  \"anomalies\": [
    {
      \"id\": \"string\",
      \"type\": \"string\",
      \"score\": number,
      \"reason\": \"string\",
      \"explanation\": \"string\",
      \"supportingEvidence\": [\"string\"]
    }
  ]
}

Journal entries: {{journal_entries}}
Vendors: {{vendors}}
Payments: {{payments}}
Users: {{users}}
Approvals: {{approvals}}
Documents: {{documents}}
Rules: {{audit_rules}}

Return JSON only.";

const NO_ANALYST_NOTES: &str = "None provided.";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("valid placeholder regex"));

/// A prompt body with `{{name}}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub body: String,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }

    pub fn risk_scoring() -> Self {
        Self::new("risk_scoring", RISK_SCORING)
    }

    pub fn evidence_pack() -> Self {
        Self::new("evidence_pack", EVIDENCE_PACK)
    }

    pub fn anomaly_detection() -> Self {
        Self::new("anomaly_detection", ANOMALY_DETECTION)
    }

    /// Substitutes every `{{key}}` in one pass, so substituted text is never expanded
    /// again. Unknown placeholders are left untouched.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        PLACEHOLDER
            .replace_all(&self.body, |caps: &Captures<'_>| {
                let key = &caps[1];
                if key == "rules" {
                    return STRICT_JSON_RULES.to_string();
                }
                vars.iter()
                    .find(|(name, _)| *name == key)
                    .map(|(_, value)| value.trim().to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// The three templates the copilot renders, swappable as a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSet {
    pub risk_scoring: PromptTemplate,
    pub evidence_pack: PromptTemplate,
    pub anomaly_detection: PromptTemplate,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            risk_scoring: PromptTemplate::risk_scoring(),
            evidence_pack: PromptTemplate::evidence_pack(),
            anomaly_detection: PromptTemplate::anomaly_detection(),
        }
    }
}

impl PromptSet {
    pub fn risk_prompt(&self, input: &RiskScoringInput) -> String {
        self.risk_scoring.render(&[
            ("anomaly_description", input.anomaly_description.as_str()),
            ("risk_parameters", input.risk_parameters.as_str()),
            ("confidence_interval", input.confidence_interval.as_str()),
        ])
    }

    pub fn evidence_prompt(&self, input: &EvidenceInput) -> String {
        let notes = input
            .analyst_notes
            .as_deref()
            .filter(|notes| !notes.trim().is_empty())
            .unwrap_or(NO_ANALYST_NOTES);
        self.evidence_pack.render(&[
            ("issue_description", input.issue_description.as_str()),
            ("violated_patterns", input.violated_patterns.as_str()),
            ("supporting_evidence", input.supporting_evidence.as_str()),
            ("transformation_logs", input.transformation_logs.as_str()),
            ("source_documents", input.source_documents.as_str()),
            ("analyst_notes", notes),
        ])
    }

    pub fn anomaly_prompt(&self, input: &AnomalyDetectionInput) -> String {
        let json = |value: serde_json::Result<String>| value.unwrap_or_else(|_| "[]".to_string());
        let journal_entries = json(serde_json::to_string(&input.journal_entries));
        let vendors = json(serde_json::to_string(&input.vendors));
        let payments = json(serde_json::to_string(&input.payments));
        let users = json(serde_json::to_string(&input.users));
        let approvals = json(serde_json::to_string(&input.approvals));
        let documents = json(serde_json::to_string(&input.documents));
        let rules = json(serde_json::to_string(&input.rules));
        self.anomaly_detection.render(&[
            ("journal_entries", journal_entries.as_str()),
            ("vendors", vendors.as_str()),
            ("payments", payments.as_str()),
            ("users", users.as_str()),
            ("approvals", approvals.as_str()),
            ("documents", documents.as_str()),
            ("audit_rules", rules.as_str()),
        ])
    }
}
