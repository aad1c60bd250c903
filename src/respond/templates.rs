//! Deterministic response templates.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use regex::Regex;

use super::faq::FaqMatch;
use crate::knowledge::{EntityType, Relationship};
use crate::search::QueryResult;

pub const MAX_SPATIAL: usize = 5;
pub const MAX_RELATIONSHIPS: usize = 3;
pub const MAX_ENTITIES: usize = 8;
pub const MAX_FAQS: usize = 3;

pub const ESCALATION_OFFER: &str =
    "Would you like me to connect you with a human expert from the MOSDAC support team?";

/// Conversational openers and closers answered without retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmallTalk {
    Greeting,
    Help,
    HowAreYou,
    Farewell,
}

pub struct SmallTalkDetector {
    greeting: Regex,
    help: Regex,
    how_are_you: Regex,
    farewell: Regex,
}

impl Default for SmallTalkDetector {
    fn default() -> Self {
        let rx = |p: &str| Regex::new(p).expect("built-in small talk pattern must compile");
        Self {
            greeting: rx(r"^(?:hi|hello|hey|hiya|namaste|greetings|good\s+(?:morning|afternoon|evening))(?:\s+there)?[\s!.,]*$"),
            help: rx(r"^(?:help|help me|what can you do|how can you help(?:\s+me)?)[\s?!.]*$"),
            how_are_you: rx(r"\bhow\s+are\s+you\b"),
            farewell: rx(r"^(?:bye|goodbye|good\s*bye|exit|quit|see\s+you|thanks,?\s+bye)\b"),
        }
    }
}

impl SmallTalkDetector {
    pub fn detect(&self, query: &str) -> Option<SmallTalk> {
        let q = query.trim().to_lowercase();
        if self.greeting.is_match(&q) {
            Some(SmallTalk::Greeting)
        } else if self.help.is_match(&q) {
            Some(SmallTalk::Help)
        } else if self.how_are_you.is_match(&q) {
            Some(SmallTalk::HowAreYou)
        } else if self.farewell.is_match(&q) {
            Some(SmallTalk::Farewell)
        } else {
            None
        }
    }
}

/// "Good morning" before noon, "Good afternoon" until 17:00, then "Good evening".
pub fn time_of_day_greeting(hour: u32) -> &'static str {
    match hour {
        0..=11 => "Good morning",
        12..=16 => "Good afternoon",
        _ => "Good evening",
    }
}

pub fn small_talk_reply(kind: SmallTalk, hour: u32) -> String {
    match kind {
        SmallTalk::Greeting => format!(
            "{}! I'm the MOSDAC assistant. Ask me about satellites, sensors, data products or \
             coverage over a region, for example \"Show me DEM data for Kerala\".",
            time_of_day_greeting(hour)
        ),
        SmallTalk::Help => "I can answer questions about the MOSDAC archive:\n\
             • which sensors a satellite carries (\"What sensors does INSAT-3D carry?\")\n\
             • data products over a place (\"Rainfall data over Mumbai\")\n\
             • the latest available products (\"Latest SST imagery\")\n\
             • general questions about registration and data access"
            .to_string(),
        SmallTalk::HowAreYou => {
            "I'm doing well, thank you! How can I help you with satellite data today?".to_string()
        }
        SmallTalk::Farewell => "Goodbye! Come back any time you need MOSDAC data.".to_string(),
    }
}

fn percent(confidence: f32) -> String {
    format!("{:.0}%", confidence * 100.0)
}

fn relation_phrase(relationship_type: &str) -> String {
    match relationship_type {
        "used_for" => "is used for".to_string(),
        "launched_in" => "was launched in".to_string(),
        "operated_by" => "is operated by".to_string(),
        other => other.replace('_', " "),
    }
}

fn entity_name<'a>(result: &'a QueryResult, id: &'a str) -> &'a str {
    result
        .entities
        .iter()
        .find(|e| e.id == id)
        .map(|e| e.name.as_str())
        .unwrap_or(id)
}

pub fn spatial_template(result: &QueryResult) -> String {
    let location = result
        .spatial_matches
        .first()
        .map(|m| m.location.as_str())
        .unwrap_or("that area");
    let mut out = format!(
        "I found {} data source{} covering {}:\n",
        result.spatial_matches.len(),
        if result.spatial_matches.len() == 1 { "" } else { "s" },
        location
    );
    for m in result.spatial_matches.iter().take(MAX_SPATIAL) {
        let _ = write!(out, "• {} ({}) {} {}", m.entity.name, m.entity.entity_type, m.spatial_relation, m.location);
        if let Some(coverage) = &m.coverage {
            let _ = write!(out, "; coverage: {}", coverage);
        }
        if let Some(resolution) = &m.resolution {
            let _ = write!(out, "; resolution: {}", resolution);
        }
        let _ = writeln!(out, "; confidence {}", percent(m.confidence));
    }
    out
}

fn relationship_line(result: &QueryResult, relationship: &Relationship) -> String {
    let mut line = format!(
        "• {} {} {}",
        entity_name(result, &relationship.source_entity_id),
        relation_phrase(&relationship.relationship_type),
        entity_name(result, &relationship.target_entity_id)
    );
    if let Some(evidence) = relationship.evidence.first() {
        let _ = write!(line, " (\"{}\")", evidence);
    }
    line
}

pub fn relationship_template(result: &QueryResult) -> String {
    let mut out = String::from("Here is how these are connected:\n");
    for relationship in result.relationships.iter().take(MAX_RELATIONSHIPS) {
        let _ = writeln!(out, "{}", relationship_line(result, relationship));
    }
    if result.relationships.len() > MAX_RELATIONSHIPS {
        let _ = writeln!(
            out,
            "…and {} more related link{}.",
            result.relationships.len() - MAX_RELATIONSHIPS,
            if result.relationships.len() - MAX_RELATIONSHIPS == 1 { "" } else { "s" }
        );
    }
    out
}

pub fn entity_template(result: &QueryResult) -> String {
    let mut out = String::from("Here is what I know about that:\n");
    for entity in result.entities.iter().take(MAX_ENTITIES) {
        let _ = write!(
            out,
            "• {} ({}): {} mention{} across {} source{}",
            entity.name,
            entity.entity_type,
            entity.mentions.len(),
            if entity.mentions.len() == 1 { "" } else { "s" },
            entity.source_documents.len(),
            if entity.source_documents.len() == 1 { "" } else { "s" }
        );
        if !entity.attributes.is_empty() {
            let attributes: Vec<String> = entity
                .attributes
                .iter()
                .map(|(k, v)| format!("{}: {}", k.replace('_', " "), v))
                .collect();
            let _ = write!(out, " [{}]", attributes.join(", "));
        }
        out.push('\n');
    }
    out
}

pub fn faq_template(faqs: &[FaqMatch]) -> String {
    let mut out = String::from("These frequently asked questions may help:\n");
    for faq in faqs.iter().take(MAX_FAQS) {
        let _ = writeln!(out, "Q: {}\nA: {}", faq.item.question, faq.item.answer);
    }
    out
}

pub fn no_knowledge_template(suggestions: &[String]) -> String {
    let mut out =
        String::from("I couldn't find information about that in the MOSDAC knowledge base.\n");
    if !suggestions.is_empty() {
        out.push_str("You could try:\n");
        for suggestion in suggestions {
            let _ = writeln!(out, "• {}", suggestion);
        }
    }
    out
}

fn follow_up(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Satellite => "Ask which sensors a satellite carries",
        EntityType::Sensor => "Ask which data products a sensor provides",
        EntityType::DataProduct => "Ask for the latest data over a specific region",
        EntityType::Location => "Ask which products cover this region",
        EntityType::Organization => "Ask which missions an organization operates",
        EntityType::Mission => "Ask about a mission's launch and instruments",
    }
}

/// Follow-up prompts for the entity types referenced by `result`.
pub fn follow_ups(result: &QueryResult) -> Vec<&'static str> {
    let types: BTreeSet<EntityType> = result
        .entities
        .iter()
        .chain(result.spatial_matches.iter().map(|m| &m.entity))
        .map(|e| e.entity_type)
        .collect();
    types.into_iter().map(follow_up).collect()
}
