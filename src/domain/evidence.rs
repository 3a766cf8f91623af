use serde::{Deserialize, Serialize};

use super::risk::DEFAULT_EXPLANATION;
use crate::extraction::{FieldReader, StructuredOutput};
use crate::utils::hash_text;

pub const BUNDLE_DIGEST_PREFIX: &str = "sha256:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceInput {
    pub issue_description: String,
    pub violated_patterns: String,
    /// Transaction details and document snippets backing the flag.
    pub supporting_evidence: String,
    pub transformation_logs: String,
    pub source_documents: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyst_notes: Option<String>,
}

/// What the model is asked to produce before the pack is sealed locally.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneratedEvidence {
    pub explanation: String,
    pub supporting_transactions: Option<String>,
    pub source_documents: Option<String>,
    pub transformation_logs: Option<String>,
    pub analyst_notes: Option<String>,
}

impl StructuredOutput for GeneratedEvidence {
    const SCHEMA: &'static str = "evidence report";

    fn from_fields(fields: &mut FieldReader<'_>) -> Self {
        let explanation = fields.text(&["explanation"], DEFAULT_EXPLANATION);
        let pack = fields.nested(&["evidencePack", "evidence_pack"]);
        // Some models flatten the pack into the top level.
        let mut pack_fields = match pack {
            Some(map) => FieldReader::new(Self::SCHEMA, map),
            None => FieldReader::new(Self::SCHEMA, fields.source()),
        };

        let generated = Self {
            explanation,
            supporting_transactions: pack_fields
                .optional_text(&["supportingTransactions", "supporting_transactions"]),
            source_documents: pack_fields.optional_text(&["sourceDocuments", "source_documents"]),
            transformation_logs: pack_fields
                .optional_text(&["transformationLogs", "transformation_logs"]),
            analyst_notes: pack_fields.optional_text(&["analystNotes", "analyst_notes"]),
        };
        fields.absorb(pack_fields);
        generated
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidencePack {
    pub supporting_transactions: String,
    pub source_documents: String,
    pub transformation_logs: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyst_notes: Option<String>,
    /// `sha256:<hex>` over the other fields, computed locally.
    pub hash_signed_bundle: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BundleContents<'a> {
    supporting_transactions: &'a str,
    source_documents: &'a str,
    transformation_logs: &'a str,
    analyst_notes: Option<&'a str>,
}

impl EvidencePack {
    /// Builds the pack from model output, taking the caller's own material for every
    /// section the model left out, then seals it. Analyst notes always come from the
    /// caller when given.
    pub fn assemble(generated: &GeneratedEvidence, input: &EvidenceInput) -> Self {
        let or_input = |section: &Option<String>, fallback: &str| {
            section
                .clone()
                .unwrap_or_else(|| fallback.trim().to_string())
        };

        Self::seal(
            or_input(&generated.supporting_transactions, &input.supporting_evidence),
            or_input(&generated.source_documents, &input.source_documents),
            or_input(&generated.transformation_logs, &input.transformation_logs),
            input
                .analyst_notes
                .clone()
                .filter(|notes| !notes.trim().is_empty())
                .or_else(|| generated.analyst_notes.clone()),
        )
    }

    pub fn seal(
        supporting_transactions: String,
        source_documents: String,
        transformation_logs: String,
        analyst_notes: Option<String>,
    ) -> Self {
        let mut pack = Self {
            supporting_transactions,
            source_documents,
            transformation_logs,
            analyst_notes,
            hash_signed_bundle: String::new(),
        };
        pack.hash_signed_bundle = pack.digest();
        pack
    }

    fn digest(&self) -> String {
        let contents = BundleContents {
            supporting_transactions: &self.supporting_transactions,
            source_documents: &self.source_documents,
            transformation_logs: &self.transformation_logs,
            analyst_notes: self.analyst_notes.as_deref(),
        };
        // Struct fields serialize in declaration order, so the encoding is canonical.
        let canonical = serde_json::to_string(&contents).unwrap_or_default();
        format!("{BUNDLE_DIGEST_PREFIX}{}", hash_text(&canonical))
    }

    /// True when the recorded digest still matches the pack contents.
    pub fn verify(&self) -> bool {
        self.hash_signed_bundle == self.digest()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceReport {
    pub explanation: String,
    pub evidence_pack: EvidencePack,
}

impl EvidenceReport {
    pub fn assemble(generated: GeneratedEvidence, input: &EvidenceInput) -> Self {
        let evidence_pack = EvidencePack::assemble(&generated, input);
        Self {
            explanation: generated.explanation,
            evidence_pack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::extraction::extract_structured;

    fn input() -> EvidenceInput {
        EvidenceInput {
            issue_description: "Duplicate payment to ACME Corp".into(),
            violated_patterns: "duplicate-payment".into(),
            supporting_evidence: "PAY-001 and PAY-002, both 12,500.00 EUR".into(),
            transformation_logs: "ingest: 2 payments normalised".into(),
            source_documents: "INV-77.pdf".into(),
            analyst_notes: Some("Vendor confirmed single delivery".into()),
        }
    }

    #[test]
    fn nested_pack_is_read() {
        let text = r#"{
            "explanation": "Two payments share invoice INV-77.",
            "evidencePack": {
                "supportingTransactions": ["PAY-001", "PAY-002"],
                "sourceDocuments": "INV-77.pdf",
                "transformationLogs": "dedupe step skipped",
                "hashSignedBundle": "made-up-by-the-model"
            }
        }"#;
        let generated: GeneratedEvidence = extract_structured(text).unwrap();
        let report = EvidenceReport::assemble(generated, &input());

        assert_eq!(report.explanation, "Two payments share invoice INV-77.");
        assert_eq!(report.evidence_pack.supporting_transactions, "PAY-001\nPAY-002");
        assert_eq!(report.evidence_pack.transformation_logs, "dedupe step skipped");
        assert_eq!(
            report.evidence_pack.analyst_notes.as_deref(),
            Some("Vendor confirmed single delivery")
        );
        assert!(report.evidence_pack.hash_signed_bundle.starts_with(BUNDLE_DIGEST_PREFIX));
        assert_ne!(report.evidence_pack.hash_signed_bundle, "made-up-by-the-model");
        assert!(report.evidence_pack.verify());
    }

    #[test]
    fn missing_sections_fall_back_to_inputs() {
        let generated: GeneratedEvidence =
            extract_structured(r#"{"explanation": "Flagged for duplicate amounts."}"#).unwrap();
        let report = EvidenceReport::assemble(generated, &input());

        assert_eq!(
            report.evidence_pack.supporting_transactions,
            "PAY-001 and PAY-002, both 12,500.00 EUR"
        );
        assert_eq!(report.evidence_pack.source_documents, "INV-77.pdf");
        assert_eq!(
            report.evidence_pack.transformation_logs,
            "ingest: 2 payments normalised"
        );
    }

    #[test]
    fn flattened_pack_is_accepted() {
        let text = r#"{"explanation": "x", "supportingTransactions": "PAY-009"}"#;
        let generated: GeneratedEvidence = extract_structured(text).unwrap();
        assert_eq!(generated.supporting_transactions.as_deref(), Some("PAY-009"));
    }

    #[test]
    fn digest_is_deterministic_and_tamper_evident() {
        let a = EvidencePack::seal("t".into(), "d".into(), "l".into(), None);
        let b = EvidencePack::seal("t".into(), "d".into(), "l".into(), None);
        assert_eq!(a.hash_signed_bundle, b.hash_signed_bundle);

        let mut tampered = a.clone();
        tampered.source_documents.push_str(" (edited)");
        assert!(!tampered.verify());

        let with_notes = EvidencePack::seal("t".into(), "d".into(), "l".into(), Some("n".into()));
        assert_ne!(a.hash_signed_bundle, with_notes.hash_signed_bundle);
    }

    #[test]
    fn analyst_notes_from_the_caller_win() {
        let generated: GeneratedEvidence = extract_structured(
            r#"{"explanation": "x", "evidencePack": {"analystNotes": "Vendor admitted fraud"}}"#,
        )
        .unwrap();

        let pack = EvidencePack::assemble(&generated, &input());
        assert_eq!(
            pack.analyst_notes.as_deref(),
            Some("Vendor confirmed single delivery")
        );

        let mut without_notes = input();
        without_notes.analyst_notes = None;
        let pack = EvidencePack::assemble(&generated, &without_notes);
        assert_eq!(pack.analyst_notes.as_deref(), Some("Vendor admitted fraud"));
    }

    #[test]
    fn cut_off_output_is_rejected() {
        let text = r#"{"explanation": "Two payments share INV-77", "evidencePack": {"supportingTransactions": "PAY-001, PAY-002", "sourceDocuments": "INV-77.pdf"}, "notes": "the model ran out of tok"#;
        let err = extract_structured::<GeneratedEvidence>(text).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidJson(_)));
    }

    #[test]
    fn report_serializes_with_wire_names() {
        let generated = GeneratedEvidence {
            explanation: "e".into(),
            ..GeneratedEvidence::default()
        };
        let mut input = input();
        input.analyst_notes = None;
        let value = serde_json::to_value(EvidenceReport::assemble(generated, &input)).unwrap();
        assert!(value["evidencePack"]["hashSignedBundle"].is_string());
        assert!(value["evidencePack"].get("analystNotes").is_none());
    }
}
