use extract::{normalize_label, slugify};
use graph::{KnowledgeGraph, NodeIndex};
use petgraph::visit::{Bfs, Dfs};
use serde::Serialize;
use std::collections::VecDeque;

pub const PREVIEW_LIMIT: usize = 20;
pub const MAX_BFS_DEPTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraversalPreview {
    pub seed: String,
    pub found: bool,
    /// Labels reached breadth-first, up to three hops from the seed.
    pub bfs: Vec<String>,
    /// Labels in depth-first preorder.
    pub dfs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShortestPath {
    pub from: String,
    pub to: String,
    /// Labels along the path, `None` when the seeds are disconnected.
    pub path: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TraversalReport {
    pub previews: Vec<TraversalPreview>,
    pub shortest_paths: Vec<ShortestPath>,
}

/// Finds a seed by its normalized label, then by its slug.
pub fn resolve_seed(graph: &KnowledgeGraph, seed: &str) -> Option<NodeIndex> {
    graph
        .node_index(&normalize_label(seed))
        .or_else(|| graph.node_index(&slugify(seed)))
}

fn labels(graph: &KnowledgeGraph, nodes: impl Iterator<Item = NodeIndex>) -> Vec<String> {
    nodes.map(|n| graph.label(n).to_string()).collect()
}

pub fn bfs_preview(graph: &KnowledgeGraph, start: NodeIndex) -> Vec<String> {
    let inner = graph.inner();
    let mut depth = vec![usize::MAX; graph.node_count()];
    depth[start.index()] = 0;

    let mut bfs = Bfs::new(inner, start);
    let mut order = Vec::new();
    while let Some(node) = bfs.next(inner) {
        let d = depth[node.index()];
        if d > MAX_BFS_DEPTH {
            // Bfs yields nodes by nondecreasing depth
            break;
        }
        order.push(node);
        if order.len() == PREVIEW_LIMIT {
            break;
        }
        for nbr in inner.neighbors(node) {
            if depth[nbr.index()] == usize::MAX {
                depth[nbr.index()] = d + 1;
            }
        }
    }
    labels(graph, order.into_iter())
}

pub fn dfs_preview(graph: &KnowledgeGraph, start: NodeIndex) -> Vec<String> {
    let inner = graph.inner();
    let mut dfs = Dfs::new(inner, start);
    let walk = std::iter::from_fn(|| dfs.next(inner)).take(PREVIEW_LIMIT);
    labels(graph, walk)
}

/// Unweighted shortest path as a node sequence.
pub fn shortest_path(graph: &KnowledgeGraph, from: NodeIndex, to: NodeIndex) -> Option<Vec<NodeIndex>> {
    let inner = graph.inner();
    let mut parent: Vec<Option<NodeIndex>> = vec![None; graph.node_count()];
    let mut seen = vec![false; graph.node_count()];
    let mut queue = VecDeque::from([from]);
    seen[from.index()] = true;

    while let Some(node) = queue.pop_front() {
        if node == to {
            let mut path = vec![to];
            let mut cur = to;
            while let Some(p) = parent[cur.index()] {
                path.push(p);
                cur = p;
            }
            path.reverse();
            return Some(path);
        }
        for nbr in inner.neighbors(node) {
            if !seen[nbr.index()] {
                seen[nbr.index()] = true;
                parent[nbr.index()] = Some(node);
                queue.push_back(nbr);
            }
        }
    }
    None
}

/// Previews each seed and connects every pair of seeds present in the graph.
pub fn traverse(graph: &KnowledgeGraph, seeds: &[String]) -> TraversalReport {
    let mut report = TraversalReport::default();
    let mut present: Vec<(&str, NodeIndex)> = Vec::new();

    for seed in seeds {
        match resolve_seed(graph, seed) {
            Some(idx) => {
                report.previews.push(TraversalPreview {
                    seed: seed.clone(),
                    found: true,
                    bfs: bfs_preview(graph, idx),
                    dfs: dfs_preview(graph, idx),
                });
                present.push((seed, idx));
            }
            None => report.previews.push(TraversalPreview {
                seed: seed.clone(),
                found: false,
                bfs: Vec::new(),
                dfs: Vec::new(),
            }),
        }
    }

    for (i, &(from, a)) in present.iter().enumerate() {
        for &(to, b) in &present[i + 1..] {
            report.shortest_paths.push(ShortestPath {
                from: from.to_string(),
                to: to.to_string(),
                path: shortest_path(graph, a, b).map(|p| labels(graph, p.into_iter())),
            });
        }
    }
    report
}
