use graph::{KnowledgeGraph, NodeIndex};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap, VecDeque};
use tracing::{debug, warn};

use crate::connectivity::giant_component;

pub const EIGENVECTOR_MAX_ITER: usize = 2000;
pub const EIGENVECTOR_TOLERANCE: f64 = 1e-6;
pub const BETWEENNESS_SAMPLE_SEED: u64 = 0;

/// Node key -> score, per metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CentralityTable {
    pub degree: BTreeMap<String, f64>,
    pub betweenness: BTreeMap<String, f64>,
    pub eigenvector: BTreeMap<String, f64>,
}

impl CentralityTable {
    /// Top `k` nodes of one metric, highest first.
    pub fn top(scores: &BTreeMap<String, f64>, k: usize) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = scores.iter().map(|(n, s)| (n.as_str(), *s)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);
        ranked
    }
}

/// Both tables for one graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CentralityReport {
    pub unweighted: CentralityTable,
    pub weighted: CentralityTable,
}

/// `betweenness_sample` > 0 approximates betweenness from that many seeded
/// source nodes.
pub fn compute_centrality(
    graph: &KnowledgeGraph,
    betweenness_sample: usize,
    weighted: bool,
) -> CentralityTable {
    let adj = graph.adjacency(weighted);
    let keyed = |scores: Vec<f64>| -> BTreeMap<String, f64> {
        scores
            .into_iter()
            .enumerate()
            .map(|(i, s)| (graph.key(NodeIndex::new(i)).to_string(), s))
            .collect()
    };

    CentralityTable {
        degree: keyed(degree_centrality(&adj)),
        betweenness: keyed(betweenness_centrality(&adj, betweenness_sample, weighted)),
        eigenvector: keyed(eigenvector_on_giant(graph, &adj)),
    }
}

pub fn compute_both(graph: &KnowledgeGraph, betweenness_sample: usize) -> CentralityReport {
    CentralityReport {
        unweighted: compute_centrality(graph, betweenness_sample, false),
        weighted: compute_centrality(graph, betweenness_sample, true),
    }
}

/// `degree / max(1, n - 1)`; weighted degree sums edge weights.
pub fn degree_centrality(adj: &[Vec<(usize, f64)>]) -> Vec<f64> {
    let scale = adj.len().saturating_sub(1).max(1) as f64;
    adj.iter()
        .map(|nbrs| nbrs.iter().map(|(_, w)| w).sum::<f64>() / scale)
        .collect()
}

#[derive(Debug, PartialEq)]
struct Frontier {
    dist: f64,
    seq: usize,
    node: usize,
    pred: usize,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    // Min-heap on (dist, seq).
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct ShortestPaths {
    /// Nodes in non-decreasing distance order.
    order: Vec<usize>,
    preds: Vec<Vec<usize>>,
    sigma: Vec<f64>,
}

fn bfs_paths(adj: &[Vec<(usize, f64)>], source: usize) -> ShortestPaths {
    let n = adj.len();
    let mut dist = vec![usize::MAX; n];
    let mut sigma = vec![0.0; n];
    let mut preds = vec![Vec::new(); n];
    let mut order = Vec::new();
    let mut queue = VecDeque::from([source]);
    dist[source] = 0;
    sigma[source] = 1.0;

    while let Some(v) = queue.pop_front() {
        order.push(v);
        for &(w, _) in &adj[v] {
            if dist[w] == usize::MAX {
                dist[w] = dist[v] + 1;
                queue.push_back(w);
            }
            if dist[w] == dist[v] + 1 {
                sigma[w] += sigma[v];
                preds[w].push(v);
            }
        }
    }
    ShortestPaths { order, preds, sigma }
}

fn dijkstra_paths(adj: &[Vec<(usize, f64)>], source: usize) -> ShortestPaths {
    let n = adj.len();
    let mut dist: Vec<Option<f64>> = vec![None; n];
    let mut seen: Vec<Option<f64>> = vec![None; n];
    let mut sigma = vec![0.0; n];
    let mut preds = vec![Vec::new(); n];
    let mut order = Vec::new();
    let mut seq = 0;

    let mut heap = BinaryHeap::new();
    heap.push(Frontier { dist: 0.0, seq, node: source, pred: source });
    seen[source] = Some(0.0);
    sigma[source] = 1.0;

    while let Some(Frontier { dist: d, node: v, pred, .. }) = heap.pop() {
        if dist[v].is_some() {
            continue;
        }
        if pred != v {
            sigma[v] += sigma[pred];
        }
        order.push(v);
        dist[v] = Some(d);

        for &(w, weight) in &adj[v] {
            let candidate = d + weight;
            if dist[w].is_some() {
                continue;
            }
            match seen[w] {
                Some(old) if candidate > old => {}
                Some(old) if candidate == old => {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
                _ => {
                    seq += 1;
                    seen[w] = Some(candidate);
                    heap.push(Frontier { dist: candidate, seq, node: w, pred: v });
                    sigma[w] = 0.0;
                    preds[w] = vec![v];
                }
            }
        }
    }
    ShortestPaths { order, preds, sigma }
}

/// Brandes betweenness, normalized for undirected graphs. With `sample` > 0
/// only that many seeded sources are used and scores are scaled by n / k.
pub fn betweenness_centrality(adj: &[Vec<(usize, f64)>], sample: usize, weighted: bool) -> Vec<f64> {
    let n = adj.len();
    let mut bc = vec![0.0; n];
    if n == 0 {
        return bc;
    }

    let (sources, k): (Vec<usize>, Option<usize>) = if sample > 0 {
        let k = sample.min(n);
        let mut rng = StdRng::seed_from_u64(BETWEENNESS_SAMPLE_SEED);
        (rand::seq::index::sample(&mut rng, n, k).into_vec(), Some(k))
    } else {
        ((0..n).collect(), None)
    };

    let mut delta = vec![0.0; n];
    for &s in &sources {
        let paths = if weighted { dijkstra_paths(adj, s) } else { bfs_paths(adj, s) };
        delta.iter_mut().for_each(|d| *d = 0.0);

        for &w in paths.order.iter().rev() {
            let coeff = (1.0 + delta[w]) / paths.sigma[w];
            for &v in &paths.preds[w] {
                delta[v] += paths.sigma[v] * coeff;
            }
            if w != s {
                bc[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let mut scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        if let Some(k) = k {
            scale *= n as f64 / k as f64;
        }
        bc.iter_mut().for_each(|b| *b *= scale);
    }
    bc
}

/// Power iteration on `A + I`, starting from the uniform vector. Returns
/// `None` when the iteration does not converge.
pub fn eigenvector_power(adj: &[Vec<(usize, f64)>], max_iter: usize, tol: f64) -> Option<Vec<f64>> {
    let n = adj.len();
    if n == 0 {
        return Some(Vec::new());
    }

    let mut x = vec![1.0 / n as f64; n];
    for _ in 0..max_iter {
        let last = x.clone();
        for (v, nbrs) in adj.iter().enumerate() {
            for &(w, weight) in nbrs {
                x[w] += last[v] * weight;
            }
        }
        let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        let norm = if norm == 0.0 { 1.0 } else { norm };
        x.iter_mut().for_each(|v| *v /= norm);

        let err: f64 = x.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum();
        if err < n as f64 * tol {
            return Some(x);
        }
    }
    None
}

/// Principal eigenvector of the symmetric adjacency matrix by cyclic
/// Jacobi rotations, scaled to unit norm with a positive sum.
pub fn eigenvector_exact(adj: &[Vec<(usize, f64)>]) -> Vec<f64> {
    let n = adj.len();
    if n == 0 {
        return Vec::new();
    }

    let mut a = vec![vec![0.0; n]; n];
    for (v, nbrs) in adj.iter().enumerate() {
        for &(w, weight) in nbrs {
            a[v][w] = weight;
        }
    }
    let mut vecs = vec![vec![0.0; n]; n];
    for (i, row) in vecs.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for _sweep in 0..100 {
        let off: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum();
        if off < 1e-22 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[p][q].abs() < 1e-300 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a[k][p], a[k][q]);
                    a[k][p] = c * akp - s * akq;
                    a[k][q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in vecs.iter_mut() {
                    let (vkp, vkq) = (row[p], row[q]);
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let top = (0..n)
        .max_by(|&i, &j| a[i][i].total_cmp(&a[j][j]))
        .unwrap_or(0);
    let mut x: Vec<f64> = vecs.iter().map(|row| row[top]).collect();
    let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
    let sign = if x.iter().sum::<f64>() < 0.0 { -1.0 } else { 1.0 };
    if norm > 0.0 {
        x.iter_mut().for_each(|v| *v *= sign / norm);
    }
    x
}

/// Eigenvector centrality of the giant component; every other node scores 0.
fn eigenvector_on_giant(graph: &KnowledgeGraph, adj: &[Vec<(usize, f64)>]) -> Vec<f64> {
    let mut scores = vec![0.0; adj.len()];
    let giant = giant_component(graph);
    if giant.is_empty() {
        return scores;
    }

    let local: HashMap<usize, usize> = giant
        .iter()
        .enumerate()
        .map(|(i, node)| (node.index(), i))
        .collect();
    let sub: Vec<Vec<(usize, f64)>> = giant
        .iter()
        .map(|node| {
            adj[node.index()]
                .iter()
                .filter_map(|&(w, weight)| local.get(&w).map(|&l| (l, weight)))
                .collect()
        })
        .collect();

    let x = match eigenvector_power(&sub, EIGENVECTOR_MAX_ITER, EIGENVECTOR_TOLERANCE) {
        Some(x) => x,
        None => {
            warn!(nodes = sub.len(), "Eigenvector iteration did not converge; using exact method");
            eigenvector_exact(&sub)
        }
    };
    debug!(giant = giant.len(), "Eigenvector centrality computed");

    for (node, score) in giant.iter().zip(x) {
        scores[node.index()] = score;
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::graph_from;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_path_centrality() {
        let g = graph_from(&[("a", "t"), ("b", "t"), ("c", "t")], &[("a", "b"), ("b", "c")]);
        let table = compute_centrality(&g, 0, false);

        assert_eq!(table.degree["b"], 1.0);
        assert_eq!(table.degree["a"], 0.5);
        assert_eq!(table.betweenness["b"], 1.0);
        assert_eq!(table.betweenness["a"], 0.0);
        assert!(close(table.eigenvector["b"], std::f64::consts::FRAC_1_SQRT_2));
        assert!(close(table.eigenvector["a"], 0.5));
    }

    #[test]
    fn test_star_betweenness() {
        let g = graph_from(
            &[("hub", "t"), ("a", "t"), ("b", "t"), ("c", "t"), ("d", "t")],
            &[("hub", "a"), ("hub", "b"), ("hub", "c"), ("hub", "d")],
        );
        let table = compute_centrality(&g, 0, false);
        assert!(close(table.betweenness["hub"], 1.0));
        assert_eq!(table.betweenness["a"], 0.0);
    }

    #[test]
    fn test_weights_change_shortest_paths() {
        let mut g = graph_from(&[("a", "t"), ("b", "t"), ("c", "t")], &[("a", "b"), ("b", "c")]);
        let (a, c) = (g.node_index("a").unwrap(), g.node_index("c").unwrap());
        g.upsert_edge(a, c, graph::EdgeData::new("r", Some(5.0)));

        let unweighted = compute_centrality(&g, 0, false);
        let weighted = compute_centrality(&g, 0, true);
        assert_eq!(unweighted.betweenness["b"], 0.0);
        assert_eq!(weighted.betweenness["b"], 1.0);
        assert!(weighted.degree["a"] > unweighted.degree["a"]);
    }

    #[test]
    fn test_outside_giant_scores_zero() {
        let g = graph_from(
            &[("a", "t"), ("b", "t"), ("c", "t"), ("x", "t"), ("y", "t")],
            &[("a", "b"), ("b", "c"), ("x", "y")],
        );
        let table = compute_centrality(&g, 0, false);
        assert_eq!(table.eigenvector["x"], 0.0);
        assert_eq!(table.eigenvector["y"], 0.0);
        assert!(table.eigenvector["b"] > 0.0);
    }

    #[test]
    fn test_sampled_betweenness_is_deterministic() {
        let names: Vec<String> = (0..30).map(|i| format!("n{i}")).collect();
        let nodes: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "t")).collect();
        let edges: Vec<(&str, &str)> = (0..30)
            .map(|i| (names[i].as_str(), names[(i + 1) % 30].as_str()))
            .collect();
        let g = graph_from(&nodes, &edges);

        let a = compute_centrality(&g, 10, false);
        let b = compute_centrality(&g, 10, false);
        assert_eq!(a, b);
    }

    #[test]
    fn test_exact_matches_power_iteration() {
        let g = graph_from(
            &[("a", "t"), ("b", "t"), ("c", "t"), ("d", "t")],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("b", "d")],
        );
        let adj = g.adjacency(false);
        let power = eigenvector_power(&adj, EIGENVECTOR_MAX_ITER, EIGENVECTOR_TOLERANCE).unwrap();
        let exact = eigenvector_exact(&adj);
        for (p, e) in power.iter().zip(&exact) {
            assert!((p - e).abs() < 1e-3, "{p} vs {e}");
        }
    }

    #[test]
    fn test_top_ranking() {
        let scores = BTreeMap::from([
            ("a".to_string(), 0.1),
            ("b".to_string(), 0.9),
            ("c".to_string(), 0.5),
        ]);
        assert_eq!(CentralityTable::top(&scores, 2), vec![("b", 0.9), ("c", 0.5)]);
    }
}
