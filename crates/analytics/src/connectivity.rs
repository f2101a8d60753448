use graph::{KnowledgeGraph, NodeIndex};
use serde::Serialize;

pub const ISOLATE_PREVIEW: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectivitySummary {
    pub n_components: usize,
    pub giant_nodes: usize,
    pub giant_fraction: f64,
    pub n_isolates: usize,
    /// Labels of the first isolates, bounded by the preview size.
    pub isolates: Vec<String>,
}

/// The largest connected component; the earliest discovered wins ties.
pub fn giant_component(graph: &KnowledgeGraph) -> Vec<NodeIndex> {
    graph
        .components()
        .into_iter()
        .fold(Vec::new(), |best, c| if c.len() > best.len() { c } else { best })
}

pub fn connectivity_summary(graph: &KnowledgeGraph, preview: usize) -> ConnectivitySummary {
    let n = graph.node_count();
    if n == 0 {
        return ConnectivitySummary {
            n_components: 0,
            giant_nodes: 0,
            giant_fraction: 0.0,
            n_isolates: 0,
            isolates: Vec::new(),
        };
    }

    let components = graph.components();
    let giant_nodes = components.iter().map(Vec::len).max().unwrap_or(0);

    let isolates: Vec<NodeIndex> = graph
        .nodes()
        .map(|(idx, _)| idx)
        .filter(|&idx| graph.degree(idx) == 0)
        .collect();

    ConnectivitySummary {
        n_components: components.len(),
        giant_nodes,
        giant_fraction: giant_nodes as f64 / n as f64,
        n_isolates: isolates.len(),
        isolates: isolates
            .iter()
            .take(preview)
            .map(|&idx| graph.label(idx).to_string())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{graph_from, ring};

    #[test]
    fn test_ring_is_connected() {
        let summary = connectivity_summary(&ring(10), ISOLATE_PREVIEW);
        assert_eq!(summary.n_components, 1);
        assert_eq!(summary.giant_nodes, 10);
        assert_eq!(summary.giant_fraction, 1.0);
        assert_eq!(summary.n_isolates, 0);
    }

    #[test]
    fn test_isolates_preview_is_bounded() {
        let g = graph_from(
            &[("a", "t"), ("b", "t"), ("c", "t"), ("d", "t"), ("e", "t")],
            &[("a", "b")],
        );
        let summary = connectivity_summary(&g, 2);
        assert_eq!(summary.n_components, 4);
        assert_eq!(summary.giant_nodes, 2);
        assert_eq!(summary.giant_fraction, 0.4);
        assert_eq!(summary.n_isolates, 3);
        assert_eq!(summary.isolates, vec!["C", "D"]);

        assert_eq!(giant_component(&g).len(), 2);
    }

    #[test]
    fn test_empty_graph() {
        let summary = connectivity_summary(&KnowledgeGraph::new(), ISOLATE_PREVIEW);
        assert_eq!(summary.n_components, 0);
        assert_eq!(summary.giant_fraction, 0.0);
    }
}
