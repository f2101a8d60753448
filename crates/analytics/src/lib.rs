pub mod centrality;
pub mod connectivity;
pub mod link_prediction;
pub mod traversal;

pub use centrality::{CentralityReport, CentralityTable, compute_both, compute_centrality};
pub use connectivity::{ConnectivitySummary, ISOLATE_PREVIEW, connectivity_summary, giant_component};
pub use link_prediction::{
    LinkCandidate, LinkPredictionMode, LinkPredictor, PlausibleEdgeTypes,
    default_plausible_edge_types,
};
pub use traversal::{ShortestPath, TraversalPreview, TraversalReport, traverse};

#[cfg(test)]
pub(crate) mod tests {
    use graph::{EdgeData, KnowledgeGraph, NodeData};

    /// Typed nodes labelled with their uppercased key, unit-weight edges.
    pub fn graph_from(nodes: &[(&str, &str)], edges: &[(&str, &str)]) -> KnowledgeGraph {
        let mut g = KnowledgeGraph::new();
        for (key, node_type) in nodes {
            g.upsert_node(NodeData::new(*key, key.to_uppercase()).with_type(*node_type));
        }
        for (a, b) in edges {
            let (a, b) = (g.node_index(a).unwrap(), g.node_index(b).unwrap());
            g.upsert_edge(a, b, EdgeData::new("related_to", Some(1.0)));
        }
        g
    }

    pub fn ring(n: usize) -> KnowledgeGraph {
        let names: Vec<String> = (0..n).map(|i| format!("n{i}")).collect();
        let nodes: Vec<(&str, &str)> = names.iter().map(|k| (k.as_str(), "t")).collect();
        let edges: Vec<(&str, &str)> = (0..n)
            .map(|i| (names[i].as_str(), names[(i + 1) % n].as_str()))
            .collect();
        graph_from(&nodes, &edges)
    }
}
