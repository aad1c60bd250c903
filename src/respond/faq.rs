//! Curated FAQ matching and loading.

use std::path::Path;

use serde::Serialize;

use crate::config::SynthesisConfig;
use crate::error::{AssistError, Result};
use crate::knowledge::FaqItem;
use crate::text::significant_tokens;

/// Tokens that carry no topic information in a question.
const FILLER: &[&str] = &[
    "what", "which", "who", "how", "does", "the", "and", "for", "can", "you", "tell", "about",
    "are", "there", "with", "from", "this", "that", "where", "when", "why", "get", "show",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaqMatch {
    pub item: FaqItem,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct FaqMatcher {
    min_score: f32,
    max_matches: usize,
}

impl Default for FaqMatcher {
    fn default() -> Self {
        Self::from_config(&SynthesisConfig::default())
    }
}

impl FaqMatcher {
    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self {
            min_score: config.faq_min_score,
            max_matches: config.max_faq_matches,
        }
    }

    /// Share of informative query tokens found in the FAQ question or keywords.
    pub fn score(query_tokens: &[String], faq: &FaqItem) -> f32 {
        if query_tokens.is_empty() {
            return 0.0;
        }
        let haystack = format!("{} {}", faq.question, faq.keywords.join(" ")).to_lowercase();
        let found = query_tokens
            .iter()
            .filter(|t| haystack.contains(t.as_str()))
            .count();
        found as f32 / query_tokens.len() as f32
    }

    /// Best matches first, at least `min_score`, at most `max_matches`.
    pub fn find(&self, query: &str, faqs: &[FaqItem]) -> Vec<FaqMatch> {
        let tokens: Vec<String> = significant_tokens(query)
            .into_iter()
            .filter(|t| !FILLER.contains(&t.as_str()))
            .collect();
        let mut matches: Vec<FaqMatch> = faqs
            .iter()
            .map(|faq| FaqMatch {
                score: Self::score(&tokens, faq),
                item: faq.clone(),
            })
            .filter(|m| m.score >= self.min_score)
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(self.max_matches);
        matches
    }
}

/// Load FAQs from a `.json` or `.yaml`/`.yml` list.
pub fn load_faqs(path: &Path) -> Result<Vec<FaqItem>> {
    let content = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let mut faqs: Vec<FaqItem> = match extension.as_str() {
        "json" => serde_json::from_str(&content)?,
        "yaml" | "yml" => serde_yaml_ng::from_str(&content)
            .map_err(|e| AssistError::InvalidInput(format!("{}: {}", path.display(), e)))?,
        other => {
            return Err(AssistError::InvalidInput(format!(
                "unsupported FAQ file format: .{}",
                other
            )))
        }
    };
    for faq in &mut faqs {
        if faq.id.is_empty() {
            faq.id = crate::knowledge::faq_id(&faq.question);
        }
    }
    log::info!("Loaded {} FAQs from {}", faqs.len(), path.display());
    Ok(faqs)
}
