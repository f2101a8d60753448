use extract::{Document, FlatRecord, FlatSchema, GraphDocument, ValueConfidence, slugify};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::GraphConfig;
use crate::graph::{EdgeData, KnowledgeGraph, NodeData};

const RESERVED_KEYS: [&str; 4] = ["key", "label", "type", "confidence"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildStats {
    pub n_nodes: usize,
    pub n_edges: usize,
    pub types: BTreeMap<String, usize>,
    /// Node types missing from a non-empty node configuration.
    pub undeclared_types: Vec<String>,
}

/// Flattens `{name: {value, confidence}}` into `name` and `name_confidence`.
fn flatten(payloads: &BTreeMap<String, ValueConfidence>) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    for (name, payload) in payloads {
        let name = if RESERVED_KEYS.contains(&name.as_str()) {
            format!("attr_{name}")
        } else {
            name.clone()
        };
        if let Some(c) = payload.confidence {
            out.insert(format!("{name}_confidence"), json!(c));
        }
        out.insert(name, Value::String(payload.value.clone()));
    }
    out
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Turns merged documents into a [`KnowledgeGraph`].
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    schema: FlatSchema,
    config: GraphConfig,
}

impl GraphBuilder {
    pub fn new(schema: FlatSchema, config: GraphConfig) -> Self {
        Self { schema, config }
    }

    pub fn build(&self, documents: &[Document]) -> (KnowledgeGraph, BuildStats) {
        let mut graph = KnowledgeGraph::new();

        for doc in documents {
            match doc {
                Document::Graph(doc) => self.add_graph_document(&mut graph, doc),
                Document::Flat(record) => self.add_flat_record(&mut graph, record),
            }
        }

        let stats = self.stats(&graph);
        info!(
            nodes = stats.n_nodes,
            edges = stats.n_edges,
            types = stats.types.len(),
            "Graph built"
        );
        if !stats.undeclared_types.is_empty() {
            warn!(types = ?stats.undeclared_types, "Node types missing from nodes.ini");
        }
        (graph, stats)
    }

    fn add_graph_document(&self, graph: &mut KnowledgeGraph, doc: &GraphDocument) {
        // Entities first so relationship endpoints find their definitions.
        for entity in &doc.entities {
            let key = match slugify(&entity.id) {
                k if !k.is_empty() => k,
                _ => slugify(&entity.name),
            };
            if key.is_empty() {
                continue;
            }
            let label = non_blank(&entity.name).unwrap_or_else(|| entity.id.clone());
            graph.upsert_node(NodeData {
                key,
                label,
                node_type: non_blank(&entity.entity_type),
                confidence: entity.confidence,
                attributes: flatten(&entity.attributes),
            });
        }

        for rel in &doc.relationships {
            let (source_key, target_key) = (slugify(&rel.source), slugify(&rel.target));
            if source_key.is_empty() || target_key.is_empty() {
                continue;
            }

            let declared = self.config.edge(&rel.relation);
            let endpoint = |key: String, raw: &str, node_type: Option<&String>| NodeData {
                node_type: node_type.cloned(),
                ..NodeData::new(key, raw.trim())
            };
            let a = graph.upsert_node(endpoint(
                source_key,
                &rel.source,
                declared.map(|d| &d.source_type),
            ));
            let b = graph.upsert_node(endpoint(
                target_key,
                &rel.target,
                declared.map(|d| &d.target_type),
            ));

            graph.upsert_edge(
                a,
                b,
                EdgeData {
                    edge_type: rel.relation.clone(),
                    confidence: rel.confidence,
                    weight: rel.confidence,
                    properties: flatten(&rel.properties),
                },
            );
        }
    }

    fn add_flat_record(&self, graph: &mut KnowledgeGraph, record: &FlatRecord) {
        let subject_key = slugify(&record.subject);
        if subject_key.is_empty() {
            return;
        }
        let subject = graph.upsert_node(
            NodeData::new(subject_key, record.subject.trim()).with_type(&self.schema.subject_type),
        );

        for field in &self.schema.list_fields {
            let Some(values) = record.fields.get(&field.field) else {
                continue;
            };
            for value in values {
                let key = slugify(value);
                if key.is_empty() {
                    continue;
                }
                let node = graph
                    .upsert_node(NodeData::new(key, value.trim()).with_type(&field.node_type));
                graph.upsert_edge(
                    subject,
                    node,
                    EdgeData::new(&field.relation, record.weight_of(&field.field, value)),
                );
            }
        }
    }

    fn stats(&self, graph: &KnowledgeGraph) -> BuildStats {
        let types = graph.type_histogram();
        let undeclared_types = if self.config.nodes.is_empty() {
            Vec::new()
        } else {
            graph
                .nodes()
                .filter_map(|(_, n)| n.node_type.as_deref())
                .filter(|t| !self.config.nodes.contains_key(*t))
                .fold(Vec::new(), |mut acc, t| {
                    if !acc.iter().any(|s: &String| s == t) {
                        acc.push(t.to_string());
                    }
                    acc
                })
        };

        BuildStats {
            n_nodes: graph.node_count(),
            n_edges: graph.edge_count(),
            types,
            undeclared_types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_edges_ini, parse_nodes_ini};
    use serde_json::json;

    fn resolve(raw: Value) -> Document {
        Document::resolve(&raw, &FlatSchema::default()).unwrap()
    }

    #[test]
    fn test_graph_document_nodes_and_edges() {
        let doc = resolve(json!({
            "entities": [
                {"id": "acme", "type": "company", "name": "Acme",
                 "attributes": {"status": {"value": "active", "confidence": 0.75}}},
                {"id": "alice", "type": "person", "name": "Alice"}
            ],
            "relationships": [
                {"source": "alice", "target": "acme", "relation": "belongs_to", "confidence": 0.75},
                {"source": "acme", "target": "alice", "relation": "employs", "confidence": 0.4}
            ]
        }));

        let (graph, stats) = GraphBuilder::default().build(&[doc]);
        assert_eq!(stats.n_nodes, 2);
        assert_eq!(stats.n_edges, 1);
        assert_eq!(stats.types["company"], 1);

        let acme = graph.node_by_key("acme").unwrap();
        assert_eq!(acme.attributes["status"], json!("active"));
        assert_eq!(acme.attributes["status_confidence"], json!(0.75));

        let (a, b) = (graph.node_index("alice").unwrap(), graph.node_index("acme").unwrap());
        let edge = graph.edge_between(a, b).unwrap();
        assert_eq!(edge.edge_type, "belongs_to");
        assert_eq!(edge.weight, Some(0.75));
    }

    #[test]
    fn test_endpoint_type_from_edge_config() {
        let config = GraphConfig {
            nodes: parse_nodes_ini("vtuber: name\n"),
            edges: parse_edges_ini("belongs_to: vtuber -> agency\n"),
        };
        let doc = resolve(json!({
            "relationships": [{"source": "Pekora", "target": "Hololive", "relation": "belongs_to"}]
        }));

        let (graph, stats) = GraphBuilder::new(FlatSchema::default(), config).build(&[doc]);
        assert_eq!(graph.node_by_key("pekora").unwrap().node_type.as_deref(), Some("vtuber"));
        assert_eq!(graph.node_by_key("hololive").unwrap().label, "Hololive");
        assert_eq!(stats.undeclared_types, vec!["agency"]);
    }

    #[test]
    fn test_flat_record_uses_value_weights() {
        let doc = resolve(json!({
            "disease_name": "Lung  Cancer",
            "symptoms": ["Cough", "chest pain"],
            "related_genes": ["EGFR"],
            "_edge_weights": {"symptoms": [{"value": "Cough", "weight": 0.9, "frequency": 2}]}
        }));
        let other = resolve(json!({"disease_name": "lung cancer", "symptoms": ["cough"]}));

        let (graph, stats) = GraphBuilder::default().build(&[doc, other]);
        assert_eq!(stats.n_nodes, 4);
        assert_eq!(stats.n_edges, 3);
        assert_eq!(stats.types["symptom"], 2);

        let lung = graph.node_index("lung_cancer").unwrap();
        assert_eq!(graph.node(lung).label, "Lung  Cancer");
        let cough = graph.node_index("cough").unwrap();
        let edge = graph.edge_between(lung, cough).unwrap();
        assert_eq!(edge.edge_type, "has_symptom");
        assert_eq!(edge.weight, Some(0.9));

        let pain = graph.node_index("chest_pain").unwrap();
        assert_eq!(graph.edge_between(lung, pain).unwrap().weight, None);
    }

    #[test]
    fn test_mixed_formats_share_node_keys() {
        let flat = resolve(json!({"disease_name": "Breast Cancer", "symptoms": ["Lump"]}));
        let doc = resolve(json!({
            "entities": [{"id": "breast_cancer", "type": "disease", "name": "Breast Cancer"}],
            "relationships": [
                {"source": "Breast Cancer", "target": "BRCA1", "relation": "associated_gene"}
            ]
        }));

        let (graph, stats) = GraphBuilder::default().build(&[flat, doc]);
        assert_eq!(stats.n_nodes, 3);
        assert_eq!(stats.n_edges, 2);

        let bc = graph.node_index("breast_cancer").unwrap();
        assert_eq!(graph.degree(bc), 2);
        assert!(graph.node_index("breast cancer").is_none());
    }
}
