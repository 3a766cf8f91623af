use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client as HttpClient, StatusCode};
use tracing::{debug, warn};

use super::config::{ProviderConfig, DEFAULT_USER_AGENT};
use super::envelope::ResponseEnvelope;
use super::request::{GenerationOptions, GenerationRequest};
use crate::error::{GatewayError, GatewayResult};

/// Turns one prompt into the model's raw generated text.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> GatewayResult<String>;

    fn default_options(&self) -> GenerationOptions {
        GenerationOptions::default()
    }
}

#[async_trait]
impl<G: ModelGateway + ?Sized> ModelGateway for Arc<G> {
    async fn generate(&self, request: &GenerationRequest) -> GatewayResult<String> {
        (**self).generate(request).await
    }

    fn default_options(&self) -> GenerationOptions {
        (**self).default_options()
    }
}

pub struct HttpModelGateway {
    config: ProviderConfig,
    http: HttpClient,
}

impl HttpModelGateway {
    pub fn new(config: ProviderConfig) -> GatewayResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                GatewayError::Configuration(format!("unable to build HTTP client: {err}"))
            })?;

        Ok(Self { config, http })
    }
}

#[async_trait]
impl ModelGateway for HttpModelGateway {
    async fn generate(&self, request: &GenerationRequest) -> GatewayResult<String> {
        let token = self.config.credential.resolve()?;
        let body = self
            .config
            .shape
            .build_body(request, self.config.model.as_deref());

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(attempt, endpoint = %self.config.endpoint, "sending generation request");

            match self
                .http
                .post(&self.config.endpoint)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.map_err(|err| GatewayError::Transport {
                        status: Some(status.as_u16()),
                        body: format!("failed to read response body: {err}"),
                    })?;

                    if status.is_success() {
                        return ResponseEnvelope::parse(&text)?.extract_generated_text();
                    }

                    if should_retry_status(status) && attempt < self.config.max_attempts {
                        warn!(
                            attempt,
                            status = status.as_u16(),
                            "provider returned a transient error, retrying"
                        );
                        tokio::time::sleep(self.config.retry_delay(attempt)).await;
                        continue;
                    }

                    return Err(GatewayError::Transport {
                        status: Some(status.as_u16()),
                        body: text,
                    });
                }
                Err(err) => {
                    if is_transient(&err) && attempt < self.config.max_attempts {
                        warn!(attempt, "error" = %err, "generation request failed, retrying");
                        tokio::time::sleep(self.config.retry_delay(attempt)).await;
                        continue;
                    }

                    return Err(GatewayError::Transport {
                        status: err.status().map(|s| s.as_u16()),
                        body: err.to_string(),
                    });
                }
            }
        }
    }

    fn default_options(&self) -> GenerationOptions {
        self.config.options
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
            | StatusCode::REQUEST_TIMEOUT
            | StatusCode::INTERNAL_SERVER_ERROR
    )
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Scripted gateway: replies are served in push order and every request is recorded.
#[derive(Clone, Default)]
pub struct MockModelGateway {
    replies: Arc<Mutex<VecDeque<GatewayResult<String>>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl MockModelGateway {
    pub fn push_response(&self, text: impl Into<String>) {
        self.replies.lock().push_back(Ok(text.into()));
    }

    pub fn push_error(&self, error: GatewayError) {
        self.replies.lock().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ModelGateway for MockModelGateway {
    async fn generate(&self, request: &GenerationRequest) -> GatewayResult<String> {
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::EmptyResponse("no scripted reply left".into())))
    }
}
