pub mod confidence;
pub mod flat_merge;
pub mod graph_merge;
pub mod normalize;

pub use confidence::{apply_weight, merge_confidence, round4};
pub use flat_merge::FlatAccumulator;
pub use graph_merge::{GraphAccumulator, merge_payloads};
pub use normalize::{DocumentMapping, NormalizationStats, NormalizationSummary, OntologyMapping};

use extract::{Document, FlatRecord, GraphDocument, NoopMatcher, TermMatcher};
use ingest::{LoadedDocument, SourceWeights};
use serde::Serialize;
use tracing::{debug, info};

/// Result of one merge pass.
#[derive(Debug, Default, Serialize)]
pub struct MergeOutcome {
    pub merged: GraphDocument,
    pub flat_records: Vec<FlatRecord>,
    #[serde(skip)]
    pub normalization: Option<NormalizationSummary>,
    #[serde(skip)]
    pub mapping: OntologyMapping,
    pub documents_merged: usize,
}

impl MergeOutcome {
    /// The merged output as builder input: the graph document first (when it
    /// holds anything), then one flat record per topic.
    pub fn documents(&self) -> Vec<Document> {
        let mut docs = Vec::with_capacity(1 + self.flat_records.len());
        if !self.merged.entities.is_empty() || !self.merged.relationships.is_empty() {
            docs.push(Document::Graph(self.merged.clone()));
        }
        docs.extend(self.flat_records.iter().cloned().map(Document::Flat));
        docs
    }
}

/// Combines loaded documents: source weighting, then ontology
/// normalization, then duplicate reconciliation.
pub struct RecordMerger {
    weights: SourceWeights,
    matcher: Box<dyn TermMatcher>,
}

impl Default for RecordMerger {
    fn default() -> Self {
        Self::new(SourceWeights::default(), Box::new(NoopMatcher))
    }
}

impl RecordMerger {
    pub fn new(weights: SourceWeights, matcher: Box<dyn TermMatcher>) -> Self {
        Self { weights, matcher }
    }

    fn weight_for(&self, doc: &LoadedDocument) -> Option<f64> {
        let weight = doc.source.as_deref().and_then(|s| self.weights.get(s))?;
        (weight != 1.0).then_some(weight)
    }

    pub fn merge(&self, documents: &[LoadedDocument]) -> MergeOutcome {
        let normalizing = self.matcher.is_active();
        let mut stats = NormalizationStats::default();
        let mut mapping = OntologyMapping::new();
        let mut graph = GraphAccumulator::new();
        let mut flat = FlatAccumulator::new();

        for loaded in documents {
            let weight = self.weight_for(loaded);
            if let Some(w) = weight {
                debug!(file = %loaded.file_name, weight = w, "Applying source weight");
            }

            match loaded.document.clone() {
                Document::Graph(mut doc) => {
                    if let Some(w) = weight {
                        graph_merge::apply_source_weight(&mut doc, w);
                    }
                    if normalizing {
                        let doc_mapping = normalize::normalize_graph_document(
                            &mut doc,
                            self.matcher.as_ref(),
                            &mut stats,
                        );
                        mapping.insert(loaded.file_name.clone(), doc_mapping);
                    }
                    graph.absorb(doc);
                }
                Document::Flat(mut record) => {
                    if let Some(w) = weight {
                        record.confidence = apply_weight(record.confidence, w);
                    }
                    let doc_mapping = if normalizing {
                        normalize::normalize_flat_record(
                            &mut record,
                            self.matcher.as_ref(),
                            &mut stats,
                        )
                    } else {
                        DocumentMapping::default()
                    };
                    flat.absorb(record, &doc_mapping.fields);
                    if normalizing {
                        mapping.insert(loaded.file_name.clone(), doc_mapping);
                    }
                }
            }
        }

        let merged = graph.finish();
        let flat_records = flat.finish(normalizing);
        let normalization = normalizing.then(|| stats.summary());

        info!(
            documents = documents.len(),
            entities = merged.entities.len(),
            relationships = merged.relationships.len(),
            topics = flat_records.len(),
            "Merged documents"
        );
        if let Some(summary) = &normalization {
            info!(
                normalized = summary.total_values_normalized,
                match_rate = summary.match_rate_percent,
                "Ontology normalization finished"
            );
        }

        MergeOutcome {
            merged,
            flat_records,
            normalization,
            mapping,
            documents_merged: documents.len(),
        }
    }
}
