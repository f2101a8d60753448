pub mod greedy;
pub mod label_propagation;
pub mod louvain;
pub mod modularity;

pub use greedy::greedy_modularity;
pub use label_propagation::label_propagation;
pub use louvain::LouvainDetector;
pub use modularity::{Adjacency, Partition, modularity};

use anyhow::Result;
use graph::{KnowledgeGraph, NodeIndex};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// One way of partitioning the graph into communities.
pub trait CommunityStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the strategy reads edge weights.
    fn weighted(&self) -> bool {
        false
    }

    fn detect(&self, adj: &Adjacency) -> Result<Partition>;
}

pub struct GreedyModularity;

impl CommunityStrategy for GreedyModularity {
    fn name(&self) -> &'static str {
        "greedy_modularity"
    }

    fn detect(&self, adj: &Adjacency) -> Result<Partition> {
        Ok(greedy_modularity(adj))
    }
}

pub struct LabelPropagation;

impl CommunityStrategy for LabelPropagation {
    fn name(&self) -> &'static str {
        "label_propagation"
    }

    fn detect(&self, adj: &Adjacency) -> Result<Partition> {
        Ok(label_propagation(adj))
    }
}

impl CommunityStrategy for LouvainDetector {
    fn name(&self) -> &'static str {
        "louvain"
    }

    fn weighted(&self) -> bool {
        true
    }

    fn detect(&self, adj: &Adjacency) -> Result<Partition> {
        LouvainDetector::detect(self, adj)
    }
}

/// Connected components, used when every strategy fails.
pub fn components_partition(graph: &KnowledgeGraph) -> Partition {
    let partition = graph
        .components()
        .into_iter()
        .map(|members| members.into_iter().map(|n| n.index()).collect())
        .collect();
    modularity::canonical(partition)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyScore {
    pub strategy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub communities: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modularity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunityResult {
    /// Strategy whose partition was selected.
    pub strategy: String,
    pub modularity: f64,
    /// Node key -> community id (position in `communities`).
    pub node_to_community: BTreeMap<String, usize>,
    /// Node keys per community, largest community first.
    pub communities: Vec<Vec<String>>,
    pub scores: Vec<StrategyScore>,
}

impl CommunityResult {
    fn from_partition(
        graph: &KnowledgeGraph,
        strategy: &str,
        modularity: f64,
        partition: &Partition,
        scores: Vec<StrategyScore>,
    ) -> Self {
        let mut node_to_community = BTreeMap::new();
        let mut communities = Vec::with_capacity(partition.len());
        for (cid, members) in partition.iter().enumerate() {
            let keys: Vec<String> = members
                .iter()
                .map(|&i| graph.key(NodeIndex::new(i)).to_string())
                .collect();
            for key in &keys {
                node_to_community.insert(key.clone(), cid);
            }
            communities.push(keys);
        }
        debug_assert_eq!(node_to_community.len(), graph.node_count());

        Self {
            strategy: strategy.to_string(),
            modularity,
            node_to_community,
            communities,
            scores,
        }
    }
}

/// Runs every strategy and keeps the partition with the highest weighted
/// modularity. Ties go to the earlier strategy.
pub struct ConsensusDetector {
    strategies: Vec<Box<dyn CommunityStrategy>>,
}

impl ConsensusDetector {
    /// Greedy modularity, label propagation, then Louvain seeded with
    /// `random_state`.
    pub fn new(random_state: u64) -> Self {
        Self {
            strategies: vec![
                Box::new(GreedyModularity),
                Box::new(LabelPropagation),
                Box::new(LouvainDetector::new(random_state)),
            ],
        }
    }

    pub fn with_strategies(strategies: Vec<Box<dyn CommunityStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn detect(&self, graph: &KnowledgeGraph) -> CommunityResult {
        let weighted = graph.adjacency(true);
        let unweighted = graph.adjacency(false);

        let mut scores = Vec::with_capacity(self.strategies.len());
        let mut best: Option<(usize, f64, Partition)> = None;

        for (i, strategy) in self.strategies.iter().enumerate() {
            let adj = if strategy.weighted() { &weighted } else { &unweighted };
            match strategy.detect(adj) {
                Ok(partition) => {
                    let q = modularity(&weighted, &partition);
                    scores.push(StrategyScore {
                        strategy: strategy.name().to_string(),
                        communities: Some(partition.len()),
                        modularity: Some(q),
                        error: None,
                    });
                    if best.as_ref().is_none_or(|(_, b, _)| q > *b) {
                        best = Some((i, q, partition));
                    }
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "Community strategy failed");
                    scores.push(StrategyScore {
                        strategy: strategy.name().to_string(),
                        communities: None,
                        modularity: None,
                        error: Some(format!("{e:#}")),
                    });
                }
            }
        }

        let result = match best {
            Some((i, q, partition)) => CommunityResult::from_partition(
                graph,
                self.strategies[i].name(),
                q,
                &partition,
                scores,
            ),
            None => {
                let partition = components_partition(graph);
                let q = modularity(&weighted, &partition);
                CommunityResult::from_partition(graph, "connected_components", q, &partition, scores)
            }
        };

        info!(
            strategy = %result.strategy,
            communities = result.communities.len(),
            modularity = result.modularity,
            "Consensus communities"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use graph::{EdgeData, NodeData};

    struct Failing;

    impl CommunityStrategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&self, _adj: &Adjacency) -> Result<Partition> {
            bail!("unavailable")
        }
    }

    fn ring(n: usize) -> KnowledgeGraph {
        let mut g = KnowledgeGraph::new();
        let nodes: Vec<_> = (0..n)
            .map(|i| g.upsert_node(NodeData::new(format!("n{i}"), format!("N{i}")).with_type("t")))
            .collect();
        for i in 0..n {
            g.upsert_edge(nodes[i], nodes[(i + 1) % n], EdgeData::new("next", Some(1.0)));
        }
        g
    }

    #[test]
    fn test_consensus_on_ring() {
        let g = ring(10);
        let result = ConsensusDetector::new(42).detect(&g);

        assert!(result.modularity >= 0.0);
        assert!(!result.communities.is_empty() && result.communities.len() <= 5);
        assert_eq!(result.node_to_community.len(), 10);
        assert_eq!(result.scores.len(), 3);

        let best = result
            .scores
            .iter()
            .filter_map(|s| s.modularity)
            .fold(f64::MIN, f64::max);
        assert_eq!(result.modularity, best);
    }

    #[test]
    fn test_consensus_is_deterministic() {
        let g = ring(16);
        let a = ConsensusDetector::new(42).detect(&g);
        let b = ConsensusDetector::new(42).detect(&g);
        assert_eq!(a, b);
    }

    #[test]
    fn test_all_strategies_fail_falls_back() {
        let mut g = ring(4);
        g.upsert_node(NodeData::new("lonely", "Lonely"));

        let result = ConsensusDetector::with_strategies(vec![Box::new(Failing)]).detect(&g);
        assert_eq!(result.strategy, "connected_components");
        assert_eq!(result.communities.len(), 2);
        assert_eq!(result.communities[1], vec!["lonely".to_string()]);
        assert!(result.scores[0].error.is_some());
    }
}
