use graph::{KnowledgeGraph, NodeIndex};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

pub const DEFAULT_HOLDOUT_FRACTION: f64 = 0.1;
pub const DEFAULT_HOLDOUT_SEED: u64 = 0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePropertyReport {
    pub accuracy: f64,
    pub n_holdout: usize,
    pub correct: usize,
    pub global_majority: Option<String>,
    /// Node key -> predicted type for every held-out node.
    pub predictions: BTreeMap<String, Option<String>>,
}

/// Counts in first-seen order so ties resolve to the earliest label.
#[derive(Default)]
struct Votes<'a>(Vec<(&'a str, usize)>);

impl<'a> Votes<'a> {
    fn add(&mut self, label: &'a str) {
        match self.0.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => self.0.push((label, 1)),
        }
    }

    fn winner(&self) -> Option<&'a str> {
        let mut best: Option<(&'a str, usize)> = None;
        for &(label, count) in &self.0 {
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((label, count));
            }
        }
        best.map(|(label, _)| label)
    }
}

/// Hides a seeded sample of node types and recovers them by neighbor
/// majority vote.
pub struct NodePropertyPredictor {
    holdout_fraction: f64,
    seed: u64,
}

impl Default for NodePropertyPredictor {
    fn default() -> Self {
        Self::new(DEFAULT_HOLDOUT_FRACTION, DEFAULT_HOLDOUT_SEED)
    }
}

impl NodePropertyPredictor {
    pub fn new(holdout_fraction: f64, seed: u64) -> Self {
        Self {
            holdout_fraction: holdout_fraction.clamp(0.0, 1.0),
            seed,
        }
    }

    /// Works on a copy of the type labels; the graph is only read.
    /// Returns `None` for an empty graph.
    pub fn evaluate(&self, graph: &KnowledgeGraph) -> Option<NodePropertyReport> {
        let n = graph.node_count();
        if n == 0 {
            return None;
        }

        let truth: Vec<Option<&str>> = graph
            .nodes()
            .map(|(_, node)| node.node_type.as_deref())
            .collect();

        let holdout_size = ((n as f64 * self.holdout_fraction) as usize).clamp(1, n);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut holdout: Vec<usize> = sample(&mut rng, n, holdout_size).into_vec();
        holdout.sort_unstable();

        let mut visible = truth.clone();
        for &i in &holdout {
            visible[i] = None;
        }

        let mut global = Votes::default();
        visible.iter().flatten().copied().for_each(|l| global.add(l));
        if global.0.is_empty() {
            // every label is hidden: fall back to the full label set
            truth.iter().flatten().copied().for_each(|l| global.add(l));
        }
        let global_majority = global.winner();

        let adj = graph.adjacency(false);
        let mut predictions = BTreeMap::new();
        let mut correct = 0;
        for &i in &holdout {
            let mut votes = Votes::default();
            for &(nbr, _) in &adj[i] {
                if let Some(label) = visible[nbr] {
                    votes.add(label);
                }
            }
            let predicted = votes.winner().or(global_majority);
            if predicted.is_some() && predicted == truth[i] {
                correct += 1;
            }
            predictions.insert(
                graph.key(NodeIndex::new(i)).to_string(),
                predicted.map(str::to_string),
            );
        }

        let report = NodePropertyReport {
            accuracy: correct as f64 / holdout.len() as f64,
            n_holdout: holdout.len(),
            correct,
            global_majority: global_majority.map(str::to_string),
            predictions,
        };
        info!(
            holdout = report.n_holdout,
            accuracy = report.accuracy,
            "Node property prediction finished"
        );
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph::{EdgeData, NodeData};

    fn typed_graph(nodes: &[(&str, &str)], edges: &[(&str, &str)]) -> KnowledgeGraph {
        let mut g = KnowledgeGraph::new();
        for (key, t) in nodes {
            g.upsert_node(NodeData::new(*key, key.to_uppercase()).with_type(*t));
        }
        for (a, b) in edges {
            let (a, b) = (g.node_index(a).unwrap(), g.node_index(b).unwrap());
            g.upsert_edge(a, b, EdgeData::new("r", None));
        }
        g
    }

    fn uniform(n: usize) -> KnowledgeGraph {
        let names: Vec<String> = (0..n).map(|i| format!("n{i}")).collect();
        let nodes: Vec<(&str, &str)> = names.iter().map(|k| (k.as_str(), "gene")).collect();
        let edges: Vec<(&str, &str)> = (1..n).map(|i| (names[i - 1].as_str(), names[i].as_str())).collect();
        typed_graph(&nodes, &edges)
    }

    #[test]
    fn test_single_type_is_perfect() {
        let g = uniform(25);
        for fraction in [0.01, 0.1, 0.5, 1.0] {
            let report = NodePropertyPredictor::new(fraction, 0).evaluate(&g).unwrap();
            assert_eq!(report.accuracy, 1.0, "fraction {fraction}");
        }
    }

    #[test]
    fn test_holdout_size() {
        let g = uniform(25);
        let report = NodePropertyPredictor::new(0.1, 0).evaluate(&g).unwrap();
        assert_eq!(report.n_holdout, 2);
        assert_eq!(report.predictions.len(), 2);

        let tiny = NodePropertyPredictor::new(0.01, 0).evaluate(&g).unwrap();
        assert_eq!(tiny.n_holdout, 1);
    }

    #[test]
    fn test_is_deterministic() {
        let g = uniform(40);
        let a = NodePropertyPredictor::new(0.3, 7).evaluate(&g);
        let b = NodePropertyPredictor::new(0.3, 7).evaluate(&g);
        assert_eq!(a, b);
    }

    #[test]
    fn test_all_hidden_falls_back_to_majority() {
        let g = typed_graph(
            &[
                ("g1", "gene"),
                ("g2", "gene"),
                ("g3", "gene"),
                ("g4", "gene"),
                ("g5", "gene"),
                ("s1", "symptom"),
                ("s2", "symptom"),
                ("d", "disease"),
            ],
            &[("d", "s1"), ("d", "s2")],
        );
        let report = NodePropertyPredictor::new(1.0, 0).evaluate(&g).unwrap();
        assert_eq!(report.global_majority.as_deref(), Some("gene"));
        // with everything hidden no neighbor votes, so the majority decides
        assert_eq!(report.predictions["s1"].as_deref(), Some("gene"));
        assert_eq!(report.correct, 5);
    }

    #[test]
    fn test_votes_tie_goes_to_first_seen() {
        let mut votes = Votes::default();
        votes.add("b");
        votes.add("a");
        votes.add("a");
        votes.add("b");
        assert_eq!(votes.winner(), Some("b"));
    }

    #[test]
    fn test_graph_is_untouched() {
        let g = uniform(10);
        let before: Vec<_> = g.nodes().map(|(_, n)| n.clone()).collect();
        NodePropertyPredictor::default().evaluate(&g);
        let after: Vec<_> = g.nodes().map(|(_, n)| n.clone()).collect();
        assert_eq!(before, after);
        assert!(NodePropertyPredictor::default().evaluate(&KnowledgeGraph::new()).is_none());
    }
}
