//! Temporal strategy. Only the "most recent first" ordering is applied; an
//! explicit date range on the intent does not filter results.

use chrono::NaiveDate;

use super::{QueryResult, Strategy};
use crate::intent::{QueryIntent, Timeframe};
use crate::knowledge::{Entity, KnowledgeSet};

pub const TEMPORAL_CONFIDENCE: f32 = 0.75;

/// Missing dates sort as the epoch (`NaiveDate::default()`).
fn acquisition_date(entity: &Entity) -> NaiveDate {
    entity
        .attribute("acquisition_date")
        .and_then(|v| v.as_date())
        .unwrap_or_default()
}

/// Entities by `acquisition_date`, newest first, at most `limit`.
pub fn search(set: &KnowledgeSet, intent: &QueryIntent, limit: usize) -> QueryResult {
    if let Some(Timeframe::Range { start, end }) = &intent.timeframe {
        log::debug!("Date range {}..{} parsed; ordering by recency only", start, end);
    }

    let mut entities: Vec<Entity> = set
        .entities()
        .iter()
        .filter(|e| e.attribute("acquisition_date").is_some() || !e.mentions.is_empty())
        .cloned()
        .collect();
    // Stable: undated entities keep first-seen order
    entities.sort_by_key(|e| std::cmp::Reverse(acquisition_date(e)));
    entities.truncate(limit);

    QueryResult::from_strategy(Strategy::Temporal, entities, Vec::new(), Vec::new(), TEMPORAL_CONFIDENCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{AttributeValue, EntityType};
    use crate::search::tests::mention;

    fn dated(set: &mut KnowledgeSet, name: &str, date: Option<(i32, u32, u32)>) {
        let id = mention(set, name, EntityType::DataProduct, "", "d");
        if let Some((y, m, d)) = date {
            set.set_attribute(
                &id,
                "acquisition_date",
                AttributeValue::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            );
        }
    }

    #[test]
    fn test_recent_first_missing_dates_last() {
        let mut set = KnowledgeSet::default();
        dated(&mut set, "Old", Some((2019, 1, 1)));
        dated(&mut set, "Undated", None);
        dated(&mut set, "New", Some((2024, 5, 1)));

        let result = search(&set, &QueryIntent::default(), 20);
        let names: Vec<_> = result.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["New", "Old", "Undated"]);
        assert_eq!(result.confidence, 0.75);
    }

    #[test]
    fn test_limit_and_range_not_applied() {
        let mut set = KnowledgeSet::default();
        for i in 0..25 {
            dated(&mut set, &format!("P{}", i), Some((2000 + i, 1, 1)));
        }
        let intent = QueryIntent {
            timeframe: Some(Timeframe::Range {
                start: NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2002, 12, 31).unwrap(),
            }),
            ..Default::default()
        };
        let result = search(&set, &intent, 20);
        assert_eq!(result.entities.len(), 20);
        assert_eq!(result.entities[0].name, "P24");
    }

    #[test]
    fn test_empty_set() {
        let result = search(&KnowledgeSet::default(), &QueryIntent::default(), 20);
        assert!(result.is_empty());
        assert_eq!(result.confidence, 0.0);
    }
}
