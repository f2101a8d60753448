use extract::{Entity, GraphDocument, Relationship, RelationshipKey, ValueConfidence};
use std::collections::{BTreeMap, HashMap};

use crate::confidence::{apply_weight, merge_confidence};

/// Folds `new` into `existing`.
///
/// Same value: confidences merge. Different value: the new payload is kept
/// under the first free `{key}_altN`, unless that value is already recorded
/// under the key or one of its alternates, in which case that entry's
/// confidence merges instead.
pub fn merge_payloads(
    existing: &mut BTreeMap<String, ValueConfidence>,
    new: &BTreeMap<String, ValueConfidence>,
) {
    for (key, payload) in new {
        let Some(old) = existing.get_mut(key) else {
            existing.insert(key.clone(), payload.clone());
            continue;
        };

        if old.value == payload.value {
            old.confidence = merge_confidence(old.confidence, payload.confidence);
            continue;
        }

        let alt_prefix = format!("{key}_alt");
        let mut suffix = 1;
        loop {
            let alt_key = format!("{alt_prefix}{suffix}");
            match existing.get_mut(&alt_key) {
                Some(alt) if alt.value == payload.value => {
                    alt.confidence = merge_confidence(alt.confidence, payload.confidence);
                    break;
                }
                Some(_) => suffix += 1,
                None => {
                    existing.insert(alt_key, payload.clone());
                    break;
                }
            }
        }
    }
}

/// Multiplies every confidence in the document by the source weight.
pub fn apply_source_weight(doc: &mut GraphDocument, weight: f64) {
    if weight == 1.0 {
        return;
    }

    for entity in &mut doc.entities {
        entity.confidence = apply_weight(entity.confidence, weight);
        for payload in entity.attributes.values_mut() {
            payload.confidence = apply_weight(payload.confidence, weight);
        }
    }
    for rel in &mut doc.relationships {
        rel.confidence = apply_weight(rel.confidence, weight);
        for payload in rel.properties.values_mut() {
            payload.confidence = apply_weight(payload.confidence, weight);
        }
    }
}

/// Builds the merged graph document one input at a time.
///
/// Entity ids and `(source, relation, target)` keys stay unique; output keeps
/// first-seen order.
#[derive(Debug, Default)]
pub struct GraphAccumulator {
    entities: Vec<Entity>,
    relationships: Vec<Relationship>,
    entity_index: HashMap<String, usize>,
    relationship_index: HashMap<RelationshipKey, usize>,
}

impl GraphAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, doc: GraphDocument) {
        for entity in doc.entities {
            match self.entity_index.get(&entity.id) {
                Some(&idx) => {
                    let base = &mut self.entities[idx];
                    base.confidence = merge_confidence(base.confidence, entity.confidence);
                    merge_payloads(&mut base.attributes, &entity.attributes);
                }
                None => {
                    self.entity_index.insert(entity.id.clone(), self.entities.len());
                    self.entities.push(entity);
                }
            }
        }

        for rel in doc.relationships {
            let key = rel.key();
            match self.relationship_index.get(&key) {
                Some(&idx) => {
                    let base = &mut self.relationships[idx];
                    base.confidence = merge_confidence(base.confidence, rel.confidence);
                    merge_payloads(&mut base.properties, &rel.properties);
                }
                None => {
                    self.relationship_index.insert(key, self.relationships.len());
                    self.relationships.push(rel);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }

    pub fn finish(self) -> GraphDocument {
        GraphDocument {
            entities: self.entities,
            relationships: self.relationships,
        }
    }
}
