use thiserror::Error;

/// Failures raised while talking to the inference provider.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error{}: {body}", status_suffix(.status))]
    Transport { status: Option<u16>, body: String },

    #[error("empty response from provider: {0}")]
    EmptyResponse(String),
}

impl GatewayError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// HTTP status attached to a transport failure, if the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" (HTTP {code})")).unwrap_or_default()
}

/// Failures raised while turning generated text into a typed result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("invalid JSON from model: {0}")]
    InvalidJson(String),

    #[error("model JSON does not match the {schema} schema: {reason}")]
    SchemaMismatch {
        schema: &'static str,
        reason: String,
    },
}

impl ExtractionError {
    /// True for the validation branch of the taxonomy, as opposed to locating or parsing JSON.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::SchemaMismatch { .. })
    }
}

#[derive(Debug, Error)]
pub enum CopilotError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("concurrency gate closed")]
    GateClosed,
}

impl CopilotError {
    pub fn as_gateway(&self) -> Option<&GatewayError> {
        match self {
            Self::Gateway(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_extraction(&self) -> Option<&ExtractionError> {
        match self {
            Self::Extraction(err) => Some(err),
            _ => None,
        }
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
pub type CopilotResult<T> = std::result::Result<T, CopilotError>;
