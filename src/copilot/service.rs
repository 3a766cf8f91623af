use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::prompt::PromptSet;
use crate::domain::{
    AnomalyDetectionInput, AnomalyReport, EvidenceInput, EvidenceReport, GeneratedEvidence,
    RiskAssessment, RiskScoringInput,
};
use crate::error::{CopilotError, CopilotResult, GatewayError};
use crate::extraction::{extract_structured, StructuredOutput};
use crate::gateway::{GenerationOptions, GenerationRequest, ModelGateway};

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct CopilotConfig {
    /// Upper bound on gateway calls in flight across all operations.
    pub max_concurrency: usize,
    /// Wall-clock budget for one gateway call, retries included.
    pub call_timeout: Option<Duration>,
    /// Overrides the gateway's own generation options when set.
    pub options: Option<GenerationOptions>,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            call_timeout: Some(Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS)),
            options: None,
        }
    }
}

impl CopilotConfig {
    pub fn with_max_concurrency(mut self, permits: usize) -> Self {
        self.max_concurrency = permits.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Outcome of reviewing one anomaly: both calls run in parallel and fail independently.
#[derive(Debug)]
pub struct AnomalyReview {
    pub risk: CopilotResult<RiskAssessment>,
    pub evidence: CopilotResult<EvidenceReport>,
}

pub struct AuditCopilot<G: ModelGateway> {
    gateway: Arc<G>,
    prompts: PromptSet,
    config: CopilotConfig,
    gate: Arc<Semaphore>,
}

impl<G: ModelGateway> AuditCopilot<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self::with_config(gateway, CopilotConfig::default())
    }

    pub fn with_config(gateway: Arc<G>, config: CopilotConfig) -> Self {
        let gate = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            gateway,
            prompts: PromptSet::default(),
            config,
            gate,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    pub async fn score_risk(&self, input: &RiskScoringInput) -> CopilotResult<RiskAssessment> {
        let prompt = self.prompts.risk_prompt(input);
        let assessment: RiskAssessment = self.run("score_risk", prompt).await?;
        info!(
            risk_score = assessment.risk_score,
            confidence = assessment.confidence_score,
            "risk scored"
        );
        Ok(assessment)
    }

    pub async fn explain_and_assemble_evidence(
        &self,
        input: &EvidenceInput,
    ) -> CopilotResult<EvidenceReport> {
        let prompt = self.prompts.evidence_prompt(input);
        let generated: GeneratedEvidence = self.run("explain_and_assemble_evidence", prompt).await?;
        let report = EvidenceReport::assemble(generated, input);
        info!(bundle = %report.evidence_pack.hash_signed_bundle, "evidence pack sealed");
        Ok(report)
    }

    pub async fn detect_anomalies(
        &self,
        input: &AnomalyDetectionInput,
    ) -> CopilotResult<AnomalyReport> {
        let prompt = self.prompts.anomaly_prompt(input);
        let report: AnomalyReport = self.run("detect_anomalies", prompt).await?;
        info!(anomalies = report.anomalies.len(), "anomaly detection finished");
        Ok(report)
    }

    /// Scores and explains one anomaly concurrently.
    pub async fn review(
        &self,
        risk_input: &RiskScoringInput,
        evidence_input: &EvidenceInput,
    ) -> AnomalyReview {
        let (risk, evidence) = tokio::join!(
            self.score_risk(risk_input),
            self.explain_and_assemble_evidence(evidence_input)
        );
        AnomalyReview { risk, evidence }
    }

    async fn run<T: StructuredOutput>(
        &self,
        operation: &'static str,
        prompt: String,
    ) -> CopilotResult<T> {
        let span = info_span!("copilot", operation, request_id = %Uuid::new_v4());
        self.generate_and_extract(prompt).instrument(span).await
    }

    async fn generate_and_extract<T: StructuredOutput>(&self, prompt: String) -> CopilotResult<T> {
        let options = self
            .config
            .options
            .unwrap_or_else(|| self.gateway.default_options());
        let request = GenerationRequest::new(prompt, options)?;

        let text = {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| CopilotError::GateClosed)?;
            self.call_gateway(&request).await?
        };

        extract_structured::<T>(&text).map_err(|err| {
            warn!(error = %err, schema = T::SCHEMA, "model output rejected");
            CopilotError::from(err)
        })
    }

    async fn call_gateway(&self, request: &GenerationRequest) -> Result<String, GatewayError> {
        let call = self.gateway.generate(request);
        match self.config.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| GatewayError::Transport {
                    status: None,
                    body: format!("gateway call timed out after {} ms", limit.as_millis()),
                })?,
            None => call.await,
        }
    }
}
