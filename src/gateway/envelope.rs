use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::request::GenerationRequest;
use crate::error::{GatewayError, GatewayResult};

/// Which request/response family an endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderShape {
    /// `{inputs, parameters}` in, `[{generated_text}]` out.
    TextCompletion,
    /// `{messages}` in, `{choices:[{message:{content}}]}` out.
    ChatCompletion,
}

impl ProviderShape {
    pub fn build_body(self, request: &GenerationRequest, model: Option<&str>) -> Value {
        match self {
            ProviderShape::TextCompletion => serde_json::to_value(TextCompletionBody {
                inputs: request.prompt_text(),
                parameters: TextParameters {
                    temperature: request.temperature(),
                    max_new_tokens: request.max_tokens(),
                    return_full_text: request.return_full_text(),
                },
            }),
            ProviderShape::ChatCompletion => serde_json::to_value(ChatCompletionBody {
                model,
                messages: vec![ChatMessageOut {
                    role: "user",
                    content: request.prompt_text(),
                }],
                temperature: request.temperature(),
                max_tokens: request.max_tokens(),
            }),
        }
        .unwrap_or(Value::Null)
    }
}

impl std::str::FromStr for ProviderShape {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "text" | "text_completion" | "text_generation" => Ok(Self::TextCompletion),
            "chat" | "chat_completion" | "chat_completions" => Ok(Self::ChatCompletion),
            other => Err(GatewayError::Configuration(format!(
                "unknown provider shape '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
struct TextCompletionBody<'a> {
    inputs: &'a str,
    parameters: TextParameters,
}

#[derive(Debug, Serialize)]
struct TextParameters {
    temperature: f32,
    max_new_tokens: u32,
    return_full_text: bool,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessageOut<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessageOut<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextCandidate {
    pub generated_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessageIn,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessageIn {
    #[serde(default)]
    pub content: Option<String>,
}

/// Provider payload as received. Shapes are tried in order, so a chat reply is accepted
/// from a text endpoint and vice versa.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    TextCompletion(Vec<TextCandidate>),
    SingleTextCompletion(TextCandidate),
    ChatCompletion { choices: Vec<ChatChoice> },
    ProviderError { error: Value },
}

impl ResponseEnvelope {
    pub fn parse(body: &str) -> GatewayResult<Self> {
        serde_json::from_str(body).map_err(|err| {
            GatewayError::EmptyResponse(format!(
                "unrecognised response envelope ({err}): {}",
                preview(body)
            ))
        })
    }

    pub fn extract_generated_text(self) -> GatewayResult<String> {
        let text = match self {
            ResponseEnvelope::TextCompletion(candidates) => candidates
                .into_iter()
                .next()
                .map(|candidate| candidate.generated_text)
                .ok_or_else(|| GatewayError::EmptyResponse("no candidates returned".into()))?,
            ResponseEnvelope::SingleTextCompletion(candidate) => candidate.generated_text,
            ResponseEnvelope::ChatCompletion { choices } => choices
                .into_iter()
                .next()
                .ok_or_else(|| GatewayError::EmptyResponse("no choices returned".into()))?
                .message
                .content
                .unwrap_or_default(),
            ResponseEnvelope::ProviderError { error } => {
                let detail = match error {
                    Value::String(message) => message,
                    other => other.to_string(),
                };
                return Err(GatewayError::EmptyResponse(format!(
                    "provider reported an error: {detail}"
                )));
            }
        };

        if text.trim().is_empty() {
            return Err(GatewayError::EmptyResponse(
                "generated text is empty".into(),
            ));
        }
        Ok(text)
    }
}

fn preview(body: &str) -> String {
    const LIMIT: usize = 200;
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::request::GenerationOptions;
    use serde_json::json;

    fn request() -> GenerationRequest {
        GenerationRequest::new("Score this anomaly", GenerationOptions::default()).unwrap()
    }

    #[test]
    fn text_body_carries_parameters() {
        let body = ProviderShape::TextCompletion.build_body(&request(), None);
        assert_eq!(body["inputs"], "Score this anomaly");
        assert_eq!(body["parameters"]["max_new_tokens"], 600);
        assert_eq!(body["parameters"]["return_full_text"], false);
    }

    #[test]
    fn chat_body_wraps_prompt_in_messages() {
        let body = ProviderShape::ChatCompletion.build_body(&request(), Some("llama3"));
        assert_eq!(body["model"], "llama3");
        assert_eq!(
            body["messages"],
            json!([{"role": "user", "content": "Score this anomaly"}])
        );
        assert_eq!(body["max_tokens"], 600);
    }

    #[test]
    fn extracts_text_from_both_envelopes() {
        let text = ResponseEnvelope::parse(r#"[{"generated_text": "{\"riskScore\": 1}"}]"#)
            .unwrap()
            .extract_generated_text()
            .unwrap();
        assert_eq!(text, r#"{"riskScore": 1}"#);

        let chat = ResponseEnvelope::parse(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hello"}}]}"#,
        )
        .unwrap()
        .extract_generated_text()
        .unwrap();
        assert_eq!(chat, "hello");
    }

    #[test]
    fn empty_envelopes_are_errors() {
        let none = ResponseEnvelope::parse("[]").unwrap().extract_generated_text();
        assert!(matches!(none, Err(GatewayError::EmptyResponse(_))));

        let blank = ResponseEnvelope::parse(r#"{"choices":[{"message":{"content":null}}]}"#)
            .unwrap()
            .extract_generated_text();
        assert!(matches!(blank, Err(GatewayError::EmptyResponse(_))));

        let loading = ResponseEnvelope::parse(r#"{"error":"Model is currently loading"}"#)
            .unwrap()
            .extract_generated_text()
            .unwrap_err();
        assert!(loading.to_string().contains("currently loading"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(ResponseEnvelope::parse("<html>bad gateway</html>").is_err());
        assert!(ResponseEnvelope::parse(r#"{"unexpected": true}"#).is_err());
    }

    #[test]
    fn parses_shape_names() {
        assert_eq!(
            "chat-completion".parse::<ProviderShape>().unwrap(),
            ProviderShape::ChatCompletion
        );
        assert_eq!("text".parse::<ProviderShape>().unwrap(), ProviderShape::TextCompletion);
        assert!("grpc".parse::<ProviderShape>().is_err());
    }
}
