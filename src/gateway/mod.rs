mod client;
mod config;
mod envelope;
mod request;

pub use client::{HttpModelGateway, MockModelGateway, ModelGateway};
pub use config::{Credential, ProviderConfig, DEFAULT_ENDPOINT, DEFAULT_TOKEN_ENV};
pub use envelope::{ProviderShape, ResponseEnvelope};
pub use request::{GenerationOptions, GenerationRequest};
