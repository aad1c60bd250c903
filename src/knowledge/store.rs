//! Versioned, copy-on-write knowledge store.
//!
//! Readers clone an `Arc<KnowledgeSet>` and drop the lock straight away, so a
//! long-running query (or a delegated LLM call) never blocks ingestion. Writers
//! mutate a private copy under the write lock; a whole document is merged in a
//! single critical section, so no reader ever sees a half-merged entity.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};

use super::snapshot::{KnowledgeSnapshot, SnapshotMetadata};
use super::{
    normalize_name, AttributeValue, Entity, EntityMention, EntityType, FaqItem, Relationship,
};
use crate::error::{AssistError, Result};
use crate::extract::{ExtractionReport, Extractor};
use crate::graph::{self, GraphData};

/// The entity/relationship/FAQ set at one version.
#[derive(Debug, Clone)]
pub struct KnowledgeSet {
    entities: Vec<Entity>,
    entity_index: HashMap<String, usize>,
    relationships: Vec<Relationship>,
    relationship_index: HashMap<(String, String, String), usize>,
    faqs: Vec<FaqItem>,
    version: u64,
    last_updated: DateTime<Utc>,
}

impl Default for KnowledgeSet {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            entity_index: HashMap::new(),
            relationships: Vec::new(),
            relationship_index: HashMap::new(),
            faqs: Vec::new(),
            version: 0,
            last_updated: Utc::now(),
        }
    }
}

impl KnowledgeSet {
    /// Entities in first-seen order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn faqs(&self) -> &[FaqItem] {
        &self.faqs
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn entity_by_name(&self, name: &str) -> Option<&Entity> {
        self.entity_index
            .get(&normalize_name(name))
            .map(|&idx| &self.entities[idx])
    }

    pub fn entity_by_id(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Record one mention, creating the entity on first sight.
    ///
    /// Attributes from later mentions overwrite earlier values for the same key.
    pub fn add_mention(
        &mut self,
        name: &str,
        entity_type: EntityType,
        mention: EntityMention,
        attributes: BTreeMap<String, AttributeValue>,
    ) -> String {
        let key = normalize_name(name);
        let idx = match self.entity_index.get(&key) {
            Some(&idx) => idx,
            None => {
                self.entities.push(Entity::new(name, entity_type));
                let idx = self.entities.len() - 1;
                self.entity_index.insert(key, idx);
                idx
            }
        };
        let entity = &mut self.entities[idx];
        entity.add_mention(mention);
        entity.attributes.extend(attributes);
        entity.id.clone()
    }

    /// Set a single attribute on an existing entity.
    pub fn set_attribute(&mut self, entity_id: &str, key: &str, value: AttributeValue) -> bool {
        match self.entities.iter_mut().find(|e| e.id == entity_id) {
            Some(entity) => {
                entity.attributes.insert(key.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Insert a relationship, merging into an existing one with the same key.
    pub fn add_relationship(&mut self, relationship: Relationship) -> String {
        let key = relationship.key();
        match self.relationship_index.get(&key) {
            Some(&idx) => {
                let existing = &mut self.relationships[idx];
                existing.merge(relationship);
                existing.id.clone()
            }
            None => {
                let id = relationship.id.clone();
                self.relationships.push(relationship);
                self.relationship_index
                    .insert(key, self.relationships.len() - 1);
                id
            }
        }
    }

    /// Insert or replace a FAQ by id.
    pub fn add_faq(&mut self, mut faq: FaqItem) {
        if faq.id.is_empty() {
            faq.id = super::faq_id(&faq.question);
        }
        match self.faqs.iter_mut().find(|f| f.id == faq.id) {
            Some(existing) => *existing = faq,
            None => self.faqs.push(faq),
        }
    }

    pub fn total_items(&self) -> usize {
        self.entities.len() + self.relationships.len() + self.faqs.len()
    }

    /// Build a set from a persisted snapshot, rejecting inconsistent data.
    pub fn from_snapshot(snapshot: KnowledgeSnapshot) -> Result<Self> {
        let mut set = KnowledgeSet {
            version: snapshot.metadata.version,
            last_updated: snapshot.metadata.last_updated,
            ..KnowledgeSet::default()
        };

        for entity in snapshot.entities {
            if !(0.0..=1.0).contains(&entity.confidence) {
                return Err(AssistError::Snapshot(format!(
                    "entity {} has confidence {} outside [0, 1]",
                    entity.name, entity.confidence
                )));
            }
            let key = entity.normalized_name();
            if set.entity_index.contains_key(&key) {
                return Err(AssistError::Snapshot(format!(
                    "duplicate entity name: {}",
                    entity.name
                )));
            }
            set.entity_index.insert(key, set.entities.len());
            set.entities.push(entity);
        }

        for relationship in snapshot.relationships {
            for endpoint in [&relationship.source_entity_id, &relationship.target_entity_id] {
                if set.entity_by_id(endpoint).is_none() {
                    return Err(AssistError::Snapshot(format!(
                        "relationship {} references unknown entity {}",
                        relationship.id, endpoint
                    )));
                }
            }
            if !(0.0..=1.0).contains(&relationship.confidence) {
                return Err(AssistError::Snapshot(format!(
                    "relationship {} has confidence {} outside [0, 1]",
                    relationship.id, relationship.confidence
                )));
            }
            set.add_relationship(relationship);
        }

        for faq in snapshot.faqs {
            set.add_faq(faq);
        }

        Ok(set)
    }

    pub fn to_snapshot(&self) -> KnowledgeSnapshot {
        KnowledgeSnapshot {
            entities: self.entities.clone(),
            relationships: self.relationships.clone(),
            faqs: self.faqs.clone(),
            metadata: SnapshotMetadata {
                last_updated: self.last_updated,
                version: self.version,
                total_items: self.total_items(),
            },
        }
    }
}

/// Shared handle to the current knowledge set.
#[derive(Debug, Default)]
pub struct KnowledgeStore {
    current: RwLock<Arc<KnowledgeSet>>,
    graph: Mutex<Option<(u64, Arc<GraphData>)>>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest committed set. The lock is released before this returns.
    pub fn snapshot(&self) -> Arc<KnowledgeSet> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version
    }

    /// Apply a mutation atomically and bump the version.
    pub fn write<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut KnowledgeSet) -> T,
    {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let set = Arc::make_mut(&mut guard);
        let out = f(set);
        set.version += 1;
        set.last_updated = Utc::now();
        out
    }

    pub fn add_mention(
        &self,
        name: &str,
        entity_type: EntityType,
        mention: EntityMention,
        attributes: BTreeMap<String, AttributeValue>,
    ) -> String {
        self.write(|set| set.add_mention(name, entity_type, mention, attributes))
    }

    pub fn add_relationship(&self, relationship: Relationship) -> String {
        self.write(|set| set.add_relationship(relationship))
    }

    /// Run one `(text, source_id)` pair through `extractor` and merge the result.
    pub fn process_document(
        &self,
        extractor: &Extractor,
        text: &str,
        source_id: &str,
    ) -> ExtractionReport {
        extractor.process(self, text, source_id)
    }

    pub fn add_faq(&self, faq: FaqItem) {
        self.write(|set| set.add_faq(faq))
    }

    /// Merge a batch of FAQs under one write.
    pub fn add_faqs(&self, faqs: Vec<FaqItem>) {
        self.write(|set| {
            for faq in faqs {
                set.add_faq(faq);
            }
        })
    }

    /// Drop every entity, relationship and FAQ.
    pub fn clear(&self) {
        self.write(|set| {
            let version = set.version;
            *set = KnowledgeSet {
                version,
                ..KnowledgeSet::default()
            };
        });
        log::info!("Knowledge base cleared");
    }

    /// Full dump in the persisted snapshot shape.
    pub fn dump(&self) -> KnowledgeSnapshot {
        self.snapshot().to_snapshot()
    }

    /// Replace the whole knowledge set from a snapshot.
    ///
    /// Validation happens before the swap; on error the store is untouched.
    /// The version always moves past both the current one and the snapshot's,
    /// so nothing keyed on an earlier version survives the load.
    pub fn load(&self, snapshot: KnowledgeSnapshot) -> Result<()> {
        let mut set = KnowledgeSet::from_snapshot(snapshot)?;
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let snapshot_version = set.version;
        set.version = guard.version.max(snapshot_version) + 1;
        log::info!(
            "Loaded knowledge snapshot v{} as v{} ({} entities, {} relationships, {} FAQs)",
            snapshot_version,
            set.version,
            set.entities.len(),
            set.relationships.len(),
            set.faqs.len()
        );
        *guard = Arc::new(set);
        Ok(())
    }

    /// Graph projection of the current set, rebuilt when the version moves.
    pub fn graph(&self) -> Arc<GraphData> {
        let set = self.snapshot();
        let mut cached = self.graph.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((version, graph)) = cached.as_ref() {
            if *version == set.version {
                return graph.clone();
            }
        }
        let start = std::time::Instant::now();
        let graph = Arc::new(graph::build(set.entities(), set.relationships()));
        log::debug!(
            "Rebuilt graph v{} ({} nodes, {} edges) in {:?}",
            set.version,
            graph.nodes.len(),
            graph.edges.len(),
            start.elapsed()
        );
        *cached = Some((set.version, graph.clone()));
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(text: &str, conf: f32, source: &str) -> EntityMention {
        EntityMention {
            text: text.to_string(),
            context: format!("... {} ...", text),
            confidence: conf,
            source_identifier: source.to_string(),
        }
    }

    #[test]
    fn test_add_mention_dedups_case_insensitively() {
        let store = KnowledgeStore::new();
        let a = store.add_mention("INSAT-3D", EntityType::Satellite, mention("INSAT-3D", 0.9, "s1"), BTreeMap::new());
        let b = store.add_mention("insat-3d", EntityType::Satellite, mention("insat-3d", 0.9, "s1"), BTreeMap::new());
        assert_eq!(a, b);
        let set = store.snapshot();
        assert_eq!(set.entities().len(), 1);
        assert_eq!(set.entities()[0].name, "INSAT-3D");
        assert_eq!(set.entities()[0].mentions.len(), 2);
        assert_eq!(set.entities()[0].source_documents, vec!["s1".to_string()]);
    }

    #[test]
    fn test_confidence_averaging_across_mentions() {
        let store = KnowledgeStore::new();
        for conf in [0.9, 0.9, 0.7] {
            store.add_mention("Imager", EntityType::Sensor, mention("Imager", conf, "doc"), BTreeMap::new());
        }
        let set = store.snapshot();
        let imager = set.entity_by_name("imager").unwrap();
        assert!((imager.confidence - 0.833_333).abs() < 1e-4);
    }

    #[test]
    fn test_relationship_dedup_merges() {
        let store = KnowledgeStore::new();
        store.add_relationship(Relationship::new("a", "b", "carries", 0.7, vec!["A carries B".into()], vec!["s1".into()]));
        store.add_relationship(Relationship::new("a", "b", "carries", 0.9, vec!["A also carries B".into()], vec!["s2".into()]));
        let set = store.snapshot();
        assert_eq!(set.relationships().len(), 1);
        let rel = &set.relationships()[0];
        assert!((rel.confidence - 0.9).abs() < 1e-6);
        assert_eq!(rel.evidence.len(), 2);
        assert_eq!(rel.source_identifiers.len(), 2);
    }

    #[test]
    fn test_snapshot_readers_are_isolated_from_writes() {
        let store = KnowledgeStore::new();
        store.add_mention("OCM", EntityType::Sensor, mention("OCM", 0.8, "s"), BTreeMap::new());
        let before = store.snapshot();
        store.add_mention("SCATSAT-1", EntityType::Satellite, mention("SCATSAT-1", 0.9, "s"), BTreeMap::new());
        assert_eq!(before.entities().len(), 1);
        assert_eq!(store.snapshot().entities().len(), 2);
        assert!(store.version() > before.version());
    }

    #[test]
    fn test_dump_and_load_round_trip() {
        let store = KnowledgeStore::new();
        let a = store.add_mention("INSAT-3D", EntityType::Satellite, mention("INSAT-3D", 0.9, "s"), BTreeMap::new());
        let b = store.add_mention("Imager", EntityType::Sensor, mention("Imager", 0.85, "s"), BTreeMap::new());
        store.add_relationship(Relationship::new(&a, &b, "carries", 0.8, vec![], vec![]));
        store.add_faqs(vec![FaqItem::new("What is MOSDAC?", "A data centre.")]);

        let dump = store.dump();
        assert_eq!(dump.metadata.total_items, 4);

        let restored = KnowledgeStore::new();
        restored.load(dump.clone()).unwrap();
        let set = restored.snapshot();
        assert_eq!(set.entities().len(), 2);
        assert_eq!(set.relationships().len(), 1);
        assert_eq!(set.faqs().len(), 1);
        assert!(set.version() > dump.metadata.version);
    }

    #[test]
    fn test_version_only_increases_across_load_and_clear() {
        let store = KnowledgeStore::new();
        let empty = store.dump();
        store.add_mention("INSAT-3D", EntityType::Satellite, mention("INSAT-3D", 0.9, "s"), BTreeMap::new());
        store.add_mention("Imager", EntityType::Sensor, mention("Imager", 0.85, "s"), BTreeMap::new());
        let mut seen = vec![store.version()];

        store.load(empty.clone()).unwrap();
        seen.push(store.version());
        store.add_mention("SARAL", EntityType::Satellite, mention("SARAL", 0.9, "s"), BTreeMap::new());
        seen.push(store.version());
        store.clear();
        seen.push(store.version());
        store.load(empty).unwrap();
        seen.push(store.version());

        assert!(seen.windows(2).all(|w| w[0] < w[1]), "versions {:?}", seen);
    }

    #[test]
    fn test_graph_rebuilt_after_loading_older_snapshot() {
        let store = KnowledgeStore::new();
        let empty = store.dump();
        store.add_mention("INSAT-3D", EntityType::Satellite, mention("INSAT-3D", 0.9, "s"), BTreeMap::new());
        let before = store.graph();
        assert_eq!(before.nodes.len(), 1);

        store.load(empty).unwrap();
        assert!(store.graph().nodes.is_empty());

        store.add_mention("SARAL", EntityType::Satellite, mention("SARAL", 0.9, "s"), BTreeMap::new());
        let after = store.graph();
        assert_eq!(after.nodes.len(), 1);
        assert_eq!(after.nodes[0].label, "SARAL");
    }

    #[test]
    fn test_load_rejects_dangling_relationship_and_keeps_state() {
        let store = KnowledgeStore::new();
        store.add_mention("OCM", EntityType::Sensor, mention("OCM", 0.8, "s"), BTreeMap::new());
        let mut bad = store.dump();
        bad.relationships.push(Relationship::new("ent_missing", "ent_other", "carries", 0.5, vec![], vec![]));

        let target = KnowledgeStore::new();
        target.add_mention("SARAL", EntityType::Satellite, mention("SARAL", 0.9, "s"), BTreeMap::new());
        let err = target.load(bad).unwrap_err();
        assert!(matches!(err, AssistError::Snapshot(_)));
        let set = target.snapshot();
        assert_eq!(set.entities().len(), 1);
        assert_eq!(set.entities()[0].name, "SARAL");
    }

    #[test]
    fn test_clear_removes_everything() {
        let store = KnowledgeStore::new();
        store.add_mention("OCM", EntityType::Sensor, mention("OCM", 0.8, "s"), BTreeMap::new());
        let version = store.version();
        store.clear();
        let set = store.snapshot();
        assert!(set.entities().is_empty());
        assert!(set.version() > version);
    }

    #[test]
    fn test_graph_is_cached_per_version() {
        let store = KnowledgeStore::new();
        store.add_mention("OCM", EntityType::Sensor, mention("OCM", 0.8, "s"), BTreeMap::new());
        let g1 = store.graph();
        let g2 = store.graph();
        assert!(Arc::ptr_eq(&g1, &g2));
        store.add_mention("SARAL", EntityType::Satellite, mention("SARAL", 0.9, "s"), BTreeMap::new());
        let g3 = store.graph();
        assert_eq!(g3.nodes.len(), 2);
    }
}
