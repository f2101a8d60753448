use graph::{KnowledgeGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::info;

/// Sorted `(type, type)` pair -> relation name.
pub type PlausibleEdgeTypes = BTreeMap<(String, String), String>;

pub const DEFAULT_LIMIT: usize = 4000;
const BASIC_MAX_DISTANCE: usize = 3;

/// Default biomedical table, used when no edge configuration is declared.
pub fn default_plausible_edge_types() -> PlausibleEdgeTypes {
    [
        ("disease", "gene", "associated_gene"),
        ("disease", "treatment", "treated_with"),
        ("disease", "symptom", "has_symptom"),
        ("disease", "diagnosis", "has_diagnosis"),
        ("disease", "cause", "has_cause"),
        ("disease", "risk_factor", "has_risk_factor"),
        ("disease", "subtype", "has_subtype"),
        ("gene", "gene", "interacts_with"),
        ("treatment", "treatment", "contraindicated_with"),
        ("symptom", "symptom", "correlated_with"),
        ("gene", "treatment", "targets"),
        ("gene", "symptom", "contributes_to"),
    ]
    .into_iter()
    .map(|(a, b, r)| ((a.to_string(), b.to_string()), r.to_string()))
    .collect()
}

fn type_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPredictionMode {
    /// Pairs at distance 2..=3 over a small type allowlist, summed ensemble.
    #[default]
    Basic,
    /// All non-adjacent plausible pairs, apportioned per type, mean ensemble.
    Improved,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkCandidate {
    pub u: String,
    pub v: String,
    pub type_u: Option<String>,
    pub type_v: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
    pub jaccard: f64,
    pub adamic_adar: f64,
    pub pref_attach: f64,
    pub ensemble_score: f64,
}

/// Sorted neighbor sets, indexed by node position.
struct Neighborhoods(Vec<Vec<usize>>);

impl Neighborhoods {
    fn of(graph: &KnowledgeGraph) -> Self {
        Self(
            graph
                .adjacency(false)
                .into_iter()
                .map(|nbrs| nbrs.into_iter().map(|(n, _)| n).collect())
                .collect(),
        )
    }

    fn common(&self, u: usize, v: usize) -> Vec<usize> {
        let (a, b) = (&self.0[u], &self.0[v]);
        let (mut i, mut j) = (0, 0);
        let mut out = Vec::new();
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    out.push(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        out
    }

    fn jaccard(&self, u: usize, v: usize) -> f64 {
        let common = self.common(u, v).len();
        let union = self.0[u].len() + self.0[v].len() - common;
        if union == 0 { 0.0 } else { common as f64 / union as f64 }
    }

    fn adamic_adar(&self, u: usize, v: usize) -> f64 {
        self.common(u, v)
            .into_iter()
            .map(|w| 1.0 / (self.0[w].len() as f64).ln())
            .sum()
    }

    fn preferential_attachment(&self, u: usize, v: usize) -> f64 {
        (self.0[u].len() * self.0[v].len()) as f64
    }
}

/// Scores candidate pairs with local similarity metrics.
pub struct LinkPredictor {
    mode: LinkPredictionMode,
    limit: usize,
    plausible: Option<PlausibleEdgeTypes>,
}

impl LinkPredictor {
    /// `plausible` restricts pairs to declared type pairs. Without it, basic
    /// mode falls back to disease <-> {gene, treatment, symptom} and
    /// improved mode to [`default_plausible_edge_types`].
    pub fn new(mode: LinkPredictionMode, limit: usize, plausible: Option<PlausibleEdgeTypes>) -> Self {
        Self {
            mode,
            limit,
            plausible: plausible.filter(|p| !p.is_empty()),
        }
    }

    pub fn predict(&self, graph: &KnowledgeGraph) -> Vec<LinkCandidate> {
        let hoods = Neighborhoods::of(graph);
        let candidates = match self.mode {
            LinkPredictionMode::Basic => self.basic(graph, &hoods),
            LinkPredictionMode::Improved => self.improved(graph, &hoods),
        };
        info!(
            mode = ?self.mode,
            candidates = candidates.len(),
            "Link prediction finished"
        );
        candidates
    }

    fn basic_plausible(&self, tu: Option<&str>, tv: Option<&str>) -> bool {
        match &self.plausible {
            Some(table) => match (tu, tv) {
                (Some(a), Some(b)) => table.contains_key(&type_pair(a, b)),
                _ => false,
            },
            None => {
                const RELATED: [&str; 3] = ["gene", "treatment", "symptom"];
                let related = |t: Option<&str>| t.is_some_and(|t| RELATED.contains(&t));
                (tu == Some("disease") && related(tv)) || (tv == Some("disease") && related(tu))
            }
        }
    }

    fn basic(&self, graph: &KnowledgeGraph, hoods: &Neighborhoods) -> Vec<LinkCandidate> {
        let n = graph.node_count();
        let mut pairs: Vec<(usize, usize)> = Vec::new();

        'outer: for u in 0..n {
            let u_node = graph.node(NodeIndex::new(u));
            for (v, dist) in bfs_within(&hoods.0, u, BASIC_MAX_DISTANCE) {
                let v_node = graph.node(NodeIndex::new(v));
                if u_node.key < v_node.key
                    && dist >= 2
                    && self.basic_plausible(u_node.node_type.as_deref(), v_node.node_type.as_deref())
                {
                    pairs.push((u, v));
                    if pairs.len() >= self.limit {
                        break 'outer;
                    }
                }
            }
        }

        let rows = pairs
            .into_iter()
            .map(|(u, v)| candidate(graph, hoods, u, v, None))
            .collect();
        ensemble(rows, false)
    }

    fn improved(&self, graph: &KnowledgeGraph, hoods: &Neighborhoods) -> Vec<LinkCandidate> {
        let default_table;
        let table = match &self.plausible {
            Some(t) => t,
            None => {
                default_table = default_plausible_edge_types();
                &default_table
            }
        };

        let n = graph.node_count();
        let mut slots: HashMap<(String, String), usize> = HashMap::new();
        let mut groups: Vec<((String, String), Vec<(usize, usize)>)> = Vec::new();

        for u in 0..n {
            let Some(tu) = graph.node(NodeIndex::new(u)).node_type.as_deref() else {
                continue;
            };
            for v in (u + 1)..n {
                let Some(tv) = graph.node(NodeIndex::new(v)).node_type.as_deref() else {
                    continue;
                };
                if hoods.0[u].binary_search(&v).is_ok() {
                    continue;
                }
                let key = type_pair(tu, tv);
                if !table.contains_key(&key) {
                    continue;
                }
                let slot = *slots.entry(key.clone()).or_insert_with(|| {
                    groups.push((key, Vec::new()));
                    groups.len() - 1
                });
                groups[slot].1.push((u, v));
            }
        }

        if groups.is_empty() {
            return Vec::new();
        }

        let per_type = (self.limit / groups.len()).max(1);
        let mut rows = Vec::new();
        for (key, pairs) in groups {
            let edge_type = table.get(&key).cloned();
            for (u, v) in pairs.into_iter().take(per_type) {
                rows.push(candidate(graph, hoods, u, v, edge_type.clone()));
            }
        }
        ensemble(rows, true)
    }
}

/// Nodes reachable from `source` within `max_depth` hops, in BFS order,
/// excluding the source itself.
fn bfs_within(adj: &[Vec<usize>], source: usize, max_depth: usize) -> Vec<(usize, usize)> {
    let mut dist = vec![usize::MAX; adj.len()];
    let mut out = Vec::new();
    let mut queue = VecDeque::from([source]);
    dist[source] = 0;

    while let Some(v) = queue.pop_front() {
        if dist[v] == max_depth {
            continue;
        }
        for &w in &adj[v] {
            if dist[w] == usize::MAX {
                dist[w] = dist[v] + 1;
                out.push((w, dist[w]));
                queue.push_back(w);
            }
        }
    }
    out
}

fn candidate(
    graph: &KnowledgeGraph,
    hoods: &Neighborhoods,
    u: usize,
    v: usize,
    edge_type: Option<String>,
) -> LinkCandidate {
    let (nu, nv) = (graph.node(NodeIndex::new(u)), graph.node(NodeIndex::new(v)));
    LinkCandidate {
        u: nu.label.clone(),
        v: nv.label.clone(),
        type_u: nu.node_type.clone(),
        type_v: nv.node_type.clone(),
        edge_type,
        jaccard: hoods.jaccard(u, v),
        adamic_adar: hoods.adamic_adar(u, v),
        pref_attach: hoods.preferential_attachment(u, v),
        ensemble_score: 0.0,
    }
}

fn min_max(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let lo = values.clone().fold(f64::INFINITY, f64::min);
    let hi = values.fold(f64::NEG_INFINITY, f64::max);
    let range = if hi > lo { hi - lo } else { 1.0 };
    (lo, range)
}

/// Min-max normalizes each metric across all rows and combines them; the
/// stable sort keeps discovery order among equal scores.
fn ensemble(mut rows: Vec<LinkCandidate>, mean: bool) -> Vec<LinkCandidate> {
    if rows.is_empty() {
        return rows;
    }

    let (j_lo, j_range) = min_max(rows.iter().map(|r| r.jaccard));
    let (a_lo, a_range) = min_max(rows.iter().map(|r| r.adamic_adar));
    let (p_lo, p_range) = min_max(rows.iter().map(|r| r.pref_attach));

    for row in &mut rows {
        let sum = (row.jaccard - j_lo) / j_range
            + (row.adamic_adar - a_lo) / a_range
            + (row.pref_attach - p_lo) / p_range;
        row.ensemble_score = if mean { sum / 3.0 } else { sum };
    }

    rows.sort_by(|a, b| b.ensemble_score.total_cmp(&a.ensemble_score));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::graph_from;

    /// d1 - g1 - d2, d2 - t1, g2 isolated-ish via d2.
    fn biomedical() -> KnowledgeGraph {
        graph_from(
            &[
                ("d1", "disease"),
                ("g1", "gene"),
                ("d2", "disease"),
                ("t1", "treatment"),
                ("g2", "gene"),
            ],
            &[("d1", "g1"), ("g1", "d2"), ("d2", "t1"), ("d2", "g2")],
        )
    }

    #[test]
    fn test_basic_pairs_within_distance() {
        let rows = LinkPredictor::new(LinkPredictionMode::Basic, DEFAULT_LIMIT, None)
            .predict(&biomedical());

        let pairs: Vec<(String, String)> = rows.iter().map(|r| (r.u.clone(), r.v.clone())).collect();
        assert_eq!(pairs.len(), 2);
        assert!(pairs.contains(&("D1".to_string(), "T1".to_string())));
        assert!(pairs.contains(&("D1".to_string(), "G2".to_string())));
        assert!(rows.iter().all(|r| r.edge_type.is_none()));

        // d1-t1 and d1-g2 share d2's neighborhood identically
        assert_eq!(rows[0].ensemble_score, rows[1].ensemble_score);
    }

    #[test]
    fn test_metrics() {
        let g = biomedical();
        let hoods = Neighborhoods::of(&g);
        // d1 = 0, d2 = 2: common neighbor g1 (degree 2)
        assert_eq!(hoods.jaccard(0, 2), 1.0 / 3.0);
        assert!((hoods.adamic_adar(0, 2) - 1.0 / 2f64.ln()).abs() < 1e-12);
        assert_eq!(hoods.preferential_attachment(0, 2), 3.0);
    }

    #[test]
    fn test_improved_groups_and_mean() {
        let rows = LinkPredictor::new(LinkPredictionMode::Improved, DEFAULT_LIMIT, None)
            .predict(&biomedical());

        assert!(!rows.is_empty());
        for row in &rows {
            assert!(row.edge_type.is_some());
            assert!((0.0..=1.0).contains(&row.ensemble_score));
        }
        assert!(rows.windows(2).all(|w| w[0].ensemble_score >= w[1].ensemble_score));
        // g1 - g2 is a plausible gene pair with one common neighbor
        assert!(rows.iter().any(|r| r.edge_type.as_deref() == Some("interacts_with")));
    }

    #[test]
    fn test_improved_caps_per_type() {
        let rows = LinkPredictor::new(LinkPredictionMode::Improved, 2, None).predict(&biomedical());
        let mut per_type: BTreeMap<String, usize> = BTreeMap::new();
        for r in &rows {
            *per_type.entry(r.edge_type.clone().unwrap_or_default()).or_insert(0) += 1;
        }
        assert!(per_type.values().all(|&c| c == 1));
    }

    #[test]
    fn test_no_candidates_is_empty() {
        let complete = graph_from(
            &[("d", "disease"), ("g", "gene"), ("t", "treatment")],
            &[("d", "g"), ("g", "t"), ("d", "t")],
        );
        for mode in [LinkPredictionMode::Basic, LinkPredictionMode::Improved] {
            assert!(LinkPredictor::new(mode, DEFAULT_LIMIT, None).predict(&complete).is_empty());
        }
    }

    #[test]
    fn test_config_table_restricts_basic() {
        let table = PlausibleEdgeTypes::from([(
            ("gene".to_string(), "treatment".to_string()),
            "targets".to_string(),
        )]);
        let rows = LinkPredictor::new(LinkPredictionMode::Basic, DEFAULT_LIMIT, Some(table))
            .predict(&biomedical());

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| {
            let types = [r.type_u.as_deref(), r.type_v.as_deref()];
            types.contains(&Some("gene")) && types.contains(&Some("treatment"))
        }));
    }
}
