//! Response synthesis: small talk, template selection, escalation and
//! optional delegation to an external generator.

pub mod faq;
pub mod llm;
pub mod templates;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Timelike};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::search::QueryResult;
pub use faq::{load_faqs, FaqMatch, FaqMatcher};
pub use llm::{GenerationRequest, GenerationStrategy, GroundingContext, HttpGenerator};
use templates::{SmallTalkDetector, ESCALATION_OFFER};

pub const MAX_SOURCES: usize = 5;
pub const NO_KNOWLEDGE_REASON: &str = "no relevant knowledge found";
pub const LOW_CONFIDENCE_REASON: &str = "low confidence";

/// Which path produced the response text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPath {
    SmallTalk,
    Template,
    External,
}

impl GenerationPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationPath::SmallTalk => "small_talk",
            GenerationPath::Template => "template",
            GenerationPath::External => "external",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesizedResponse {
    pub text: String,
    pub confidence: f32,
    pub sources: Vec<String>,
    pub escalate: bool,
    pub escalation_reason: Option<String>,
    pub suggestions: Vec<String>,
    pub generation_path: GenerationPath,
    /// An external generator was consulted and the templates were used instead.
    pub generation_failed: bool,
}

struct Delegate {
    generator: Arc<dyn GenerationStrategy>,
    timeout: Duration,
    system_prompt: String,
}

pub struct Synthesizer {
    escalation_threshold: f32,
    small_talk: SmallTalkDetector,
    delegate: Option<Delegate>,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new(crate::config::SynthesisConfig::default().escalation_threshold)
    }
}

impl Synthesizer {
    /// Template-only synthesizer.
    pub fn new(escalation_threshold: f32) -> Self {
        Self {
            escalation_threshold,
            small_talk: SmallTalkDetector::default(),
            delegate: None,
        }
    }

    /// Synthesizer for `config`, delegating to the configured LLM when enabled.
    pub fn from_config(config: &Config) -> Result<Self> {
        let synthesizer = Self::new(config.synthesis.escalation_threshold);
        Ok(match HttpGenerator::from_config(&config.llm)? {
            Some(generator) => synthesizer.with_generator(
                Arc::new(generator),
                Duration::from_secs(config.llm.timeout_secs),
                config.llm.system_prompt.clone(),
            ),
            None => synthesizer,
        })
    }

    pub fn with_generator(
        mut self,
        generator: Arc<dyn GenerationStrategy>,
        timeout: Duration,
        system_prompt: String,
    ) -> Self {
        self.delegate = Some(Delegate {
            generator,
            timeout,
            system_prompt,
        });
        self
    }

    pub fn has_generator(&self) -> bool {
        self.delegate.is_some()
    }

    /// True when `query` is handled as small talk without retrieval.
    pub fn is_small_talk(&self, query: &str) -> bool {
        self.small_talk.detect(query).is_some()
    }

    /// Compose the reply to `query` from `result` and `faqs`.
    ///
    /// # Algorithm
    ///
    /// 1. Small talk short-circuits to a canned reply.
    /// 2. Nothing found anywhere: fallback text, escalate with
    ///    [`NO_KNOWLEDGE_REASON`].
    /// 3. Otherwise try the external generator (if any) under its timeout,
    ///    then the first template whose input is non-empty: spatial,
    ///    relationship, entity, FAQ.
    /// 4. Confidence is the higher of the retrieval confidence and the best
    ///    FAQ score; below the escalation threshold the expert offer is
    ///    appended and `escalate` set.
    pub async fn synthesize(
        &self,
        query: &str,
        result: &QueryResult,
        faqs: &[FaqMatch],
    ) -> SynthesizedResponse {
        if let Some(kind) = self.small_talk.detect(query) {
            return SynthesizedResponse {
                text: templates::small_talk_reply(kind, Local::now().hour()),
                confidence: 1.0,
                sources: Vec::new(),
                escalate: false,
                escalation_reason: None,
                suggestions: Vec::new(),
                generation_path: GenerationPath::SmallTalk,
                generation_failed: false,
            };
        }

        if result.entities.is_empty() && result.spatial_matches.is_empty() && faqs.is_empty() {
            return SynthesizedResponse {
                text: format!(
                    "{}\n{}",
                    templates::no_knowledge_template(&result.suggestions),
                    ESCALATION_OFFER
                ),
                confidence: 0.0,
                sources: Vec::new(),
                escalate: true,
                escalation_reason: Some(NO_KNOWLEDGE_REASON.to_string()),
                suggestions: result.suggestions.clone(),
                generation_path: GenerationPath::Template,
                generation_failed: false,
            };
        }

        let best_faq = faqs.iter().map(|m| m.score).fold(0.0_f32, f32::max);
        let confidence = result.confidence.max(best_faq).min(1.0);

        let (mut text, generation_path) = match self.delegate(query, result, faqs).await {
            Some(text) => (text, GenerationPath::External),
            None => (Self::render(result, faqs), GenerationPath::Template),
        };

        let escalate = confidence < self.escalation_threshold;
        if escalate {
            text.push('\n');
            text.push_str(ESCALATION_OFFER);
        }

        SynthesizedResponse {
            text,
            confidence,
            sources: Self::sources(result, faqs),
            escalate,
            escalation_reason: escalate.then(|| LOW_CONFIDENCE_REASON.to_string()),
            suggestions: result.suggestions.clone(),
            generation_path,
            generation_failed: self.delegate.is_some() && generation_path == GenerationPath::Template,
        }
    }

    async fn delegate(&self, query: &str, result: &QueryResult, faqs: &[FaqMatch]) -> Option<String> {
        let delegate = self.delegate.as_ref()?;
        let request = GenerationRequest {
            query: query.to_string(),
            system_prompt: delegate.system_prompt.clone(),
            context: GroundingContext::from_result(result, faqs),
        };
        let start = std::time::Instant::now();
        match tokio::time::timeout(delegate.timeout, delegate.generator.generate(&request)).await {
            Ok(Ok(text)) => {
                log::debug!("{} generated a response in {:?}", delegate.generator.name(), start.elapsed());
                Some(text)
            }
            Ok(Err(e)) => {
                log::warn!("{} failed, using templates: {}", delegate.generator.name(), e);
                None
            }
            Err(_) => {
                log::warn!(
                    "{} timed out after {:?}, using templates",
                    delegate.generator.name(),
                    delegate.timeout
                );
                None
            }
        }
    }

    fn render(result: &QueryResult, faqs: &[FaqMatch]) -> String {
        let mut text = if !result.spatial_matches.is_empty() {
            templates::spatial_template(result)
        } else if !result.relationships.is_empty() {
            templates::relationship_template(result)
        } else if !result.entities.is_empty() {
            templates::entity_template(result)
        } else {
            templates::faq_template(faqs)
        };

        let follow_ups = templates::follow_ups(result);
        if !follow_ups.is_empty() {
            text.push_str("\nYou might also:\n");
            for prompt in follow_ups {
                text.push_str("• ");
                text.push_str(prompt);
                text.push('\n');
            }
        }
        text
    }

    fn sources(result: &QueryResult, faqs: &[FaqMatch]) -> Vec<String> {
        let mut sources = result.sources();
        for source in faqs.iter().filter_map(|m| m.item.source.as_ref()) {
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }
        sources.truncate(MAX_SOURCES);
        sources
    }
}
