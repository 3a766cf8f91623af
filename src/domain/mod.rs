mod anomaly;
mod evidence;
mod risk;

pub use anomaly::{
    AnomalyDetectionInput, AnomalyFinding, AnomalyReport, Approval, AuditRule, Document,
    JournalEntry, Payment, User, Vendor,
};
pub use evidence::{EvidenceInput, EvidencePack, EvidenceReport, GeneratedEvidence};
pub use risk::{RiskAssessment, RiskScoringInput, DEFAULT_EXPLANATION, DEFAULT_REASON_CODES};
