//! Delegated answer generation through a hosted LLM.
//!
//! The synthesizer hands the same grounding it would render into templates to a
//! [`GenerationStrategy`]. Any failure here is recoverable: the caller falls
//! back to the deterministic templates.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::faq::FaqMatch;
use crate::config::LlmConfig;
use crate::error::{AssistError, Result};
use crate::search::QueryResult;

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub confidence: f32,
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationshipSummary {
    pub source: String,
    pub relation: String,
    pub target: String,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpatialSummary {
    pub entity: String,
    pub location: String,
    pub relation: String,
    pub coverage: Option<String>,
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FaqSummary {
    pub question: String,
    pub answer: String,
}

/// Everything a generated answer may rely on.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroundingContext {
    pub entities: Vec<EntitySummary>,
    pub spatial_matches: Vec<SpatialSummary>,
    pub relationships: Vec<RelationshipSummary>,
    pub faqs: Vec<FaqSummary>,
}

impl GroundingContext {
    pub fn from_result(result: &QueryResult, faqs: &[FaqMatch]) -> Self {
        let name_of = |id: &str| {
            result
                .entities
                .iter()
                .find(|e| e.id == id)
                .map(|e| e.name.clone())
                .unwrap_or_else(|| id.to_string())
        };

        Self {
            entities: result
                .entities
                .iter()
                .map(|e| EntitySummary {
                    name: e.name.clone(),
                    entity_type: e.entity_type.to_string(),
                    confidence: e.confidence,
                    attributes: e
                        .attributes
                        .iter()
                        .map(|(k, v)| (k.clone(), json!(v.to_string())))
                        .collect(),
                })
                .collect(),
            spatial_matches: result
                .spatial_matches
                .iter()
                .map(|m| SpatialSummary {
                    entity: m.entity.name.clone(),
                    location: m.location.clone(),
                    relation: m.spatial_relation.clone(),
                    coverage: m.coverage.clone(),
                    resolution: m.resolution.clone(),
                })
                .collect(),
            relationships: result
                .relationships
                .iter()
                .map(|r| RelationshipSummary {
                    source: name_of(&r.source_entity_id),
                    relation: r.relationship_type.clone(),
                    target: name_of(&r.target_entity_id),
                    evidence: r.evidence.clone(),
                })
                .collect(),
            faqs: faqs
                .iter()
                .map(|m| FaqSummary {
                    question: m.item.question.clone(),
                    answer: m.item.answer.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub query: String,
    pub system_prompt: String,
    pub context: GroundingContext,
}

impl GenerationRequest {
    /// Single-string prompt: persona, JSON grounding, then the question.
    pub fn prompt(&self) -> Result<String> {
        let context = serde_json::to_string_pretty(&self.context)?;
        Ok(format!(
            "{}\n\nAnswer using only this context:\n{}\n\nUser question: {}",
            self.system_prompt, context, self.query
        ))
    }
}

/// Alternate response generator the synthesizer may delegate to.
#[async_trait]
pub trait GenerationStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "gemini" => Ok(Provider::Gemini),
            other => Err(AssistError::Config(format!("unknown LLM provider: {}", other))),
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    content: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

/// OpenAI-compatible chat completions or Gemini `generateContent` over HTTP.
pub struct HttpGenerator {
    client: Client,
    provider: Provider,
    model: String,
    endpoint: Option<String>,
    api_key: String,
}

impl HttpGenerator {
    /// Create a generator.
    ///
    /// # Arguments
    ///
    /// * `provider` - Wire protocol to speak
    /// * `model` - Model name, e.g. "gemini-1.5-flash"
    /// * `endpoint` - Overrides the provider's public endpoint (tests, proxies)
    /// * `api_key` - Provider API key
    /// * `timeout` - Per-request HTTP timeout
    pub fn new(
        provider: Provider,
        model: String,
        endpoint: Option<String>,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssistError::Generation(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            provider,
            model,
            endpoint,
            api_key,
        })
    }

    /// Build from `[llm]` config; `Ok(None)` when generation is disabled.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            AssistError::Config(format!("{} is not set", config.api_key_env))
        })?;
        let generator = Self::new(
            Provider::parse(&config.provider)?,
            config.model.clone(),
            config.endpoint.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )?;
        log::info!("LLM generation enabled: {} ({})", config.provider, config.model);
        Ok(Some(generator))
    }

    fn url(&self) -> String {
        match (self.provider, &self.endpoint) {
            (_, Some(endpoint)) => endpoint.clone(),
            (Provider::OpenAi, None) => OPENAI_ENDPOINT.to_string(),
            (Provider::Gemini, None) => format!("{}/{}:generateContent", GEMINI_ENDPOINT, self.model),
        }
    }

    async fn send(&self, request: &GenerationRequest) -> Result<reqwest::Response> {
        let builder = match self.provider {
            Provider::OpenAi => {
                let context = serde_json::to_string(&request.context)?;
                self.client
                    .post(self.url())
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&json!({
                        "model": self.model,
                        "messages": [
                            {"role": "system", "content": request.system_prompt},
                            {"role": "user", "content": format!("Context:\n{}\n\nQuestion: {}", context, request.query)},
                        ],
                    }))
            }
            Provider::Gemini => self
                .client
                .post(self.url())
                .query(&[("key", self.api_key.as_str())])
                .json(&json!({
                    "contents": [{"parts": [{"text": request.prompt()?}]}],
                })),
        };
        builder
            .send()
            .await
            .map_err(|e| AssistError::Generation(format!("network error: {}", e)))
    }
}

/// Map an unsuccessful HTTP status to a generation error.
fn status_error(status: StatusCode, body: &str) -> AssistError {
    let kind = match status.as_u16() {
        400 => "bad request",
        401 | 403 => "access denied (check the API key)",
        429 => "rate limited",
        500..=599 => "service unavailable",
        _ => "unexpected status",
    };
    AssistError::Generation(format!("{} ({}): {}", kind, status, body))
}

#[async_trait]
impl GenerationStrategy for HttpGenerator {
    fn name(&self) -> &str {
        match self.provider {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &body));
        }

        let text = match self.provider {
            Provider::OpenAi => {
                let parsed: ChatCompletionResponse = response
                    .json()
                    .await
                    .map_err(|e| AssistError::Generation(format!("malformed response: {}", e)))?;
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default()
            }
            Provider::Gemini => {
                let parsed: GeminiResponse = response
                    .json()
                    .await
                    .map_err(|e| AssistError::Generation(format!("malformed response: {}", e)))?;
                parsed
                    .candidates
                    .into_iter()
                    .next()
                    .map(|c| {
                        c.content
                            .parts
                            .into_iter()
                            .map(|p| p.text)
                            .collect::<Vec<_>>()
                            .join("")
                    })
                    .unwrap_or_default()
            }
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(AssistError::Generation("empty response".to_string()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{Entity, EntityType, Relationship};
    use crate::search::Strategy;

    #[test]
    fn test_grounding_context_names_relationship_endpoints() {
        let insat = Entity::new("INSAT-3D", EntityType::Satellite);
        let imager = Entity::new("Imager", EntityType::Sensor);
        let rel = Relationship::new(&insat.id, &imager.id, "carries", 0.85, vec!["INSAT-3D carries an Imager".into()], vec![]);
        let result = QueryResult::from_strategy(Strategy::Relational, vec![insat, imager], vec![rel], vec![], 0.8);

        let context = GroundingContext::from_result(&result, &[]);
        assert_eq!(context.relationships[0].source, "INSAT-3D");
        assert_eq!(context.relationships[0].target, "Imager");

        let request = GenerationRequest {
            query: "What does INSAT-3D carry?".into(),
            system_prompt: "You are a MOSDAC assistant.".into(),
            context,
        };
        let prompt = request.prompt().unwrap();
        assert!(prompt.starts_with("You are a MOSDAC assistant."));
        assert!(prompt.contains("\"relation\": \"carries\""));
        assert!(prompt.ends_with("User question: What does INSAT-3D carry?"));
    }

    #[test]
    fn test_status_mapping() {
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(err.to_string().contains("rate limited"));
        let err = status_error(StatusCode::BAD_GATEWAY, "");
        assert!(err.to_string().contains("service unavailable"));
        let err = status_error(StatusCode::FORBIDDEN, "");
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_urls_and_disabled_config() {
        let gemini = HttpGenerator::new(Provider::Gemini, "gemini-1.5-flash".into(), None, "k".into(), Duration::from_secs(1)).unwrap();
        assert!(gemini.url().ends_with("/models/gemini-1.5-flash:generateContent"));
        let proxied = HttpGenerator::new(Provider::OpenAi, "m".into(), Some("http://localhost:9/v1".into()), "k".into(), Duration::from_secs(1)).unwrap();
        assert_eq!(proxied.url(), "http://localhost:9/v1");
        assert!(HttpGenerator::from_config(&LlmConfig::default()).unwrap().is_none());
        assert!(Provider::parse("claude").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_generation_error() {
        let generator = HttpGenerator::new(
            Provider::OpenAi,
            "m".into(),
            Some("http://127.0.0.1:9/v1/chat/completions".into()),
            "k".into(),
            Duration::from_millis(500),
        )
        .unwrap();
        let request = GenerationRequest {
            query: "hi".into(),
            system_prompt: String::new(),
            context: GroundingContext::default(),
        };
        let err = generator.generate(&request).await.unwrap_err();
        assert!(matches!(err, AssistError::Generation(_)));
    }
}
