mod prompt;
mod service;

pub use prompt::{PromptSet, PromptTemplate};
pub use service::{AnomalyReview, AuditCopilot, CopilotConfig, DEFAULT_MAX_CONCURRENCY};
