//! The question-answering pipeline: intent, retrieval, FAQ matching and
//! synthesis over the current knowledge snapshot.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::{ChatMessage, ConversationLog, MessageMetadata};
use crate::cache::{CachedQuery, QueryCache};
use crate::config::Config;
use crate::error::Result;
use crate::extract::{ExtractionReport, Extractor};
use crate::intent::{IntentParser, QueryIntent};
use crate::knowledge::KnowledgeStore;
use crate::metrics::{QueryLogger, QueryMetrics};
use crate::respond::{FaqMatcher, GenerationPath, Synthesizer};
use crate::search::{QueryExecutor, QueryResult};

/// Everything one answered query produced.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub message: ChatMessage,
    pub intent: QueryIntent,
    pub result: QueryResult,
    pub metrics: QueryMetrics,
}

pub struct Assistant {
    store: Arc<KnowledgeStore>,
    extractor: Extractor,
    parser: IntentParser,
    executor: QueryExecutor,
    faq_matcher: FaqMatcher,
    synthesizer: Synthesizer,
    cache: Option<QueryCache>,
    conversations: ConversationLog,
    logger: Option<QueryLogger>,
}

impl Assistant {
    /// Assistant with built-in patterns, default limits and template-only synthesis.
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self {
            store,
            extractor: Extractor::default(),
            parser: IntentParser::default(),
            executor: QueryExecutor::default(),
            faq_matcher: FaqMatcher::default(),
            synthesizer: Synthesizer::default(),
            cache: None,
            conversations: ConversationLog::new(),
            logger: None,
        }
    }

    /// Assistant configured from `config`, sharing `store`.
    ///
    /// Fails on an unreadable pattern table or an unusable LLM configuration.
    pub fn from_config(config: &Config, store: Arc<KnowledgeStore>) -> Result<Self> {
        let cache = (config.query.cache_capacity > 0)
            .then(|| QueryCache::new(config.query.cache_capacity));
        Ok(Self {
            store,
            extractor: Extractor::from_config(&config.extraction)?,
            parser: IntentParser::default(),
            executor: QueryExecutor::from_config(&config.query),
            faq_matcher: FaqMatcher::from_config(&config.synthesis),
            synthesizer: Synthesizer::from_config(config)?,
            cache,
            conversations: ConversationLog::new(),
            logger: None,
        })
    }

    pub fn with_logger(mut self, logger: QueryLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Synthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn with_cache(mut self, cache: QueryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    pub fn conversations(&self) -> &ConversationLog {
        &self.conversations
    }

    pub fn cache(&self) -> Option<&QueryCache> {
        self.cache.as_ref()
    }

    /// Extract one `(text, source_id)` pair into the shared store.
    pub fn ingest_document(&self, text: &str, source_id: &str) -> ExtractionReport {
        self.store.process_document(&self.extractor, text, source_id)
    }

    /// Answer `query` in the `(user_id, session_id)` conversation.
    ///
    /// Never fails: retrieval misses and generation failures come back as an
    /// answer with `metadata.escalate` set.
    pub async fn answer(&self, query: &str, user_id: &str, session_id: &str) -> ChatMessage {
        self.answer_detailed(query, user_id, session_id).await.message
    }

    /// [`Assistant::answer`] plus the intent, retrieval result and metrics behind it.
    ///
    /// # Arguments
    ///
    /// * `query` - Natural-language question
    /// * `user_id` - Conversation owner
    /// * `session_id` - Conversation within that user's sessions
    ///
    /// # Returns
    ///
    /// The appended assistant message together with its grounding. Both the
    /// user message and the reply are appended to the conversation log.
    pub async fn answer_detailed(&self, query: &str, user_id: &str, session_id: &str) -> Answer {
        let start = Instant::now();
        self.conversations
            .append(user_id, session_id, ChatMessage::user(query));
        let mut metrics = QueryMetrics::new(user_id, session_id, query);

        let set = self.store.snapshot();
        let (intent, result) = if self.synthesizer.is_small_talk(query) {
            (QueryIntent::default(), QueryResult::default())
        } else {
            match self.cache.as_ref().and_then(|c| c.get(set.version(), query)) {
                Some(cached) => {
                    metrics.cache_hit = true;
                    (cached.intent.clone(), cached.result.clone())
                }
                None => {
                    let parse_start = Instant::now();
                    let intent = self.parser.parse(query, set.entities());
                    log::debug!("Parsed intent {} in {:?}", intent.intent_type, parse_start.elapsed());
                    let result = self.executor.execute(&intent, query, &set);
                    if let Some(cache) = &self.cache {
                        cache.put(
                            set.version(),
                            query,
                            CachedQuery {
                                intent: intent.clone(),
                                result: result.clone(),
                            },
                        );
                    }
                    (intent, result)
                }
            }
        };
        let faqs = self.faq_matcher.find(query, set.faqs());
        drop(set);

        let response = self.synthesizer.synthesize(query, &result, &faqs).await;

        metrics.intent_type = match response.generation_path {
            GenerationPath::SmallTalk => "small_talk".to_string(),
            _ => intent.intent_type.to_string(),
        };
        metrics.entity_count = result.entities.len();
        metrics.relationship_count = result.relationships.len();
        metrics.spatial_match_count = result.spatial_matches.len();
        metrics.confidence = response.confidence;
        metrics.escalated = response.escalate;
        metrics.generation_path = response.generation_path;
        metrics.error = response.generation_failed;
        metrics.latency_ms = start.elapsed().as_millis() as u64;

        let message = ChatMessage::assistant(
            &response.text,
            MessageMetadata {
                confidence: response.confidence,
                sources: response.sources,
                escalate: response.escalate,
                escalation_reason: response.escalation_reason,
                suggestions: response.suggestions,
                intent_type: metrics.intent_type.clone(),
                generation_path: response.generation_path,
                query_result: Some(result.clone()),
            },
        );
        self.conversations
            .append(user_id, session_id, message.clone());

        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log(&metrics).await {
                log::warn!("Failed to log query {}: {}", metrics.query_id, e);
            }
        }
        log::info!(
            "Answered {} query in {}ms (confidence {:.2}, escalate {})",
            metrics.intent_type,
            metrics.latency_ms,
            metrics.confidence,
            metrics.escalated
        );

        Answer {
            message,
            intent,
            result,
            metrics,
        }
    }
}
