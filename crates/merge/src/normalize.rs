use extract::{FlatRecord, GraphDocument, MatchInfo, TermMatcher, ValueConfidence};
use serde::Serialize;
use std::collections::BTreeMap;

/// Running counters over every value passed through the matcher.
#[derive(Debug, Clone, Default)]
pub struct NormalizationStats {
    total: usize,
    matched: usize,
    score_sum: f64,
    unmatched_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizationSummary {
    pub total_values_normalized: usize,
    pub matched_terms: usize,
    pub unmatched_terms: usize,
    pub match_rate_percent: f64,
    pub average_fuzzy_score: f64,
    pub unmatched_values: Vec<String>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl NormalizationStats {
    pub fn record(&mut self, info: &MatchInfo) {
        self.total += 1;
        self.score_sum += info.score;
        if info.matched {
            self.matched += 1;
        } else {
            self.unmatched_values.push(info.normalized.clone());
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn summary(&self) -> NormalizationSummary {
        let (rate, avg) = if self.total > 0 {
            (
                self.matched as f64 / self.total as f64 * 100.0,
                self.score_sum / self.total as f64,
            )
        } else {
            (0.0, 0.0)
        };

        NormalizationSummary {
            total_values_normalized: self.total,
            matched_terms: self.matched,
            unmatched_terms: self.total - self.matched,
            match_rate_percent: round2(rate),
            average_fuzzy_score: round2(avg),
            unmatched_values: self.unmatched_values.clone(),
        }
    }
}

/// Match metadata for one source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentMapping {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub entities: BTreeMap<String, BTreeMap<String, MatchInfo>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, BTreeMap<String, MatchInfo>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Vec<MatchInfo>>,
}

/// Source file -> match metadata.
pub type OntologyMapping = BTreeMap<String, DocumentMapping>;

fn normalize_payloads(
    payloads: &mut BTreeMap<String, ValueConfidence>,
    matcher: &dyn TermMatcher,
    stats: &mut NormalizationStats,
) -> BTreeMap<String, MatchInfo> {
    let mut infos = BTreeMap::new();
    for (key, payload) in payloads.iter_mut() {
        let (value, info) = matcher.normalize(&payload.value);
        if !payload.value.trim().is_empty() {
            stats.record(&info);
        }
        payload.value = value;
        infos.insert(key.clone(), info);
    }
    infos
}

/// Rewrites every attribute and property value through the matcher.
pub fn normalize_graph_document(
    doc: &mut GraphDocument,
    matcher: &dyn TermMatcher,
    stats: &mut NormalizationStats,
) -> DocumentMapping {
    let mut mapping = DocumentMapping::default();

    for entity in &mut doc.entities {
        let infos = normalize_payloads(&mut entity.attributes, matcher, stats);
        mapping.entities.insert(entity.id.clone(), infos);
    }

    for rel in &mut doc.relationships {
        let infos = normalize_payloads(&mut rel.properties, matcher, stats);
        mapping.relationships.insert(rel.key().to_string(), infos);
    }

    mapping
}

/// Rewrites every list value of a flat record; the returned mapping keeps
/// the per-value match info in list order.
pub fn normalize_flat_record(
    record: &mut FlatRecord,
    matcher: &dyn TermMatcher,
    stats: &mut NormalizationStats,
) -> DocumentMapping {
    let mut mapping = DocumentMapping::default();

    for (field, values) in record.fields.iter_mut() {
        let mut infos = Vec::with_capacity(values.len());
        for value in values.iter_mut() {
            let (normalized, info) = matcher.normalize(value);
            stats.record(&info);
            *value = normalized;
            infos.push(info);
        }
        mapping.fields.insert(field.clone(), infos);
    }

    mapping
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::{Entity, FUZZY_CUTOFF, FuzzyTermMatcher, OntologyTerm, TermDictionary};

    fn matcher() -> FuzzyTermMatcher {
        let mut dict = TermDictionary::new();
        dict.insert(
            "active",
            OntologyTerm {
                id: "status:1".to_string(),
                name: "Active".to_string(),
            },
        );
        FuzzyTermMatcher::new(dict, FUZZY_CUTOFF)
    }

    #[test]
    fn test_normalize_graph_document_updates_values_and_stats() {
        let mut doc = GraphDocument {
            entities: vec![Entity {
                id: "acme".to_string(),
                entity_type: "company".to_string(),
                name: "Acme".to_string(),
                confidence: Some(0.9),
                attributes: BTreeMap::from([
                    ("status".to_string(), ValueConfidence::new("ACTIVE", Some(0.6))),
                    ("hq".to_string(), ValueConfidence::new("Springfield", Some(0.5))),
                    ("note".to_string(), ValueConfidence::new("", None)),
                ]),
            }],
            relationships: Vec::new(),
        };

        let mut stats = NormalizationStats::default();
        let mapping = normalize_graph_document(&mut doc, &matcher(), &mut stats);

        assert_eq!(doc.entities[0].attributes["status"].value, "Active");
        assert_eq!(doc.entities[0].attributes["hq"].value, "Springfield");
        assert!(mapping.entities["acme"]["status"].matched);

        let summary = stats.summary();
        assert_eq!(summary.total_values_normalized, 2);
        assert_eq!(summary.matched_terms, 1);
        assert_eq!(summary.match_rate_percent, 50.0);
        assert_eq!(summary.unmatched_values, vec!["Springfield"]);
    }

    #[test]
    fn test_empty_stats_summary() {
        let summary = NormalizationStats::default().summary();
        assert_eq!(summary.total_values_normalized, 0);
        assert_eq!(summary.match_rate_percent, 0.0);
    }
}
