pub mod copilot;
pub mod domain;
pub mod error;
pub mod extraction;
pub mod gateway;
pub mod utils;

pub use copilot::{AuditCopilot, CopilotConfig, PromptSet};
pub use domain::{
    AnomalyDetectionInput, AnomalyReport, EvidenceInput, EvidenceReport, RiskAssessment,
    RiskScoringInput,
};
pub use error::{CopilotError, ExtractionError, GatewayError};
pub use extraction::{extract_structured, StructuredOutput};
pub use gateway::{HttpModelGateway, MockModelGateway, ModelGateway, ProviderConfig, ProviderShape};
