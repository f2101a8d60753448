use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::{Bfs, EdgeRef};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeData {
    /// Normalized identity; unique within the graph.
    pub key: String,
    pub label: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Flattened attribute values and their `{attr}_confidence` companions.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl NodeData {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            node_type: None,
            confidence: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn type_name(&self) -> &str {
        self.node_type.as_deref().unwrap_or("unknown")
    }

    /// Fills absent fields from `other`; present fields are never overwritten.
    fn fill_from(&mut self, other: NodeData) {
        if self.label.trim().is_empty() {
            self.label = other.label;
        }
        if self.node_type.is_none() {
            self.node_type = other.node_type;
        }
        if self.confidence.is_none() {
            self.confidence = other.confidence;
        }
        for (k, v) in other.attributes {
            self.attributes.entry(k).or_insert(v);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeData {
    #[serde(rename = "type")]
    pub edge_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
}

impl EdgeData {
    pub fn new(edge_type: impl Into<String>, weight: Option<f64>) -> Self {
        Self {
            edge_type: edge_type.into(),
            confidence: None,
            weight,
            properties: BTreeMap::new(),
        }
    }

    /// Stored weight, or 1.0 for edges that never received one.
    pub fn weight_or_unit(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }

    /// Keeps the stronger relation and the maximum weight.
    fn strengthen(&mut self, other: EdgeData) {
        if let Some(w) = other.weight {
            if self.weight.is_none_or(|old| w > old) {
                self.weight = Some(w);
                self.edge_type = other.edge_type;
                self.confidence = other.confidence.or(self.confidence);
            }
        }
        for (k, v) in other.properties {
            self.properties.entry(k).or_insert(v);
        }
    }
}

/// Undirected typed graph keyed by normalized node identity.
///
/// Nodes are never removed, so `NodeIndex::index()` is a dense position in
/// insertion order and every iteration below is deterministic.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    graph: UnGraph<NodeData, EdgeData>,
    key_to_node: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn inner(&self) -> &UnGraph<NodeData, EdgeData> {
        &self.graph
    }

    pub fn node_index(&self, key: &str) -> Option<NodeIndex> {
        self.key_to_node.get(key).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &NodeData {
        &self.graph[idx]
    }

    pub fn node_by_key(&self, key: &str) -> Option<&NodeData> {
        self.node_index(key).map(|idx| &self.graph[idx])
    }

    pub fn key(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].key
    }

    pub fn label(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].label
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &NodeData)> {
        self.graph.node_indices().map(move |idx| (idx, &self.graph[idx]))
    }

    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, &EdgeData)> {
        self.graph
            .edge_references()
            .map(|e| (e.source(), e.target(), e.weight()))
    }

    pub fn edge_between(&self, a: NodeIndex, b: NodeIndex) -> Option<&EdgeData> {
        self.graph.find_edge(a, b).map(|e| &self.graph[e])
    }

    pub fn has_edge(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.graph.find_edge(a, b).is_some()
    }

    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.graph.edges(idx).count()
    }

    /// Neighbor lists with edge weights, indexed by node position and sorted
    /// by neighbor position.
    pub fn adjacency(&self, weighted: bool) -> Vec<Vec<(usize, f64)>> {
        let mut adj = vec![Vec::new(); self.graph.node_count()];
        for e in self.graph.edge_references() {
            let w = if weighted { e.weight().weight_or_unit() } else { 1.0 };
            let (a, b) = (e.source().index(), e.target().index());
            adj[a].push((b, w));
            adj[b].push((a, w));
        }
        for list in &mut adj {
            list.sort_by_key(|(n, _)| *n);
        }
        adj
    }

    /// Inserts a node, or fills the absent fields of the existing one.
    pub fn upsert_node(&mut self, data: NodeData) -> NodeIndex {
        match self.key_to_node.get(&data.key) {
            Some(&idx) => {
                self.graph[idx].fill_from(data);
                idx
            }
            None => {
                let key = data.key.clone();
                let idx = self.graph.add_node(data);
                self.key_to_node.insert(key, idx);
                idx
            }
        }
    }

    /// Adds the edge, or strengthens the existing one between the same pair.
    /// Self-loops are ignored.
    pub fn upsert_edge(&mut self, a: NodeIndex, b: NodeIndex, data: EdgeData) -> Option<EdgeIndex> {
        if a == b {
            return None;
        }
        match self.graph.find_edge(a, b) {
            Some(e) => {
                self.graph[e].strengthen(data);
                Some(e)
            }
            None => Some(self.graph.add_edge(a, b, data)),
        }
    }

    /// Connected components in discovery order; members in BFS order.
    pub fn components(&self) -> Vec<Vec<NodeIndex>> {
        let mut seen = vec![false; self.graph.node_count()];
        let mut components = Vec::new();

        for start in self.graph.node_indices() {
            if seen[start.index()] {
                continue;
            }
            let mut members = Vec::new();
            let mut bfs = Bfs::new(&self.graph, start);
            while let Some(node) = bfs.next(&self.graph) {
                seen[node.index()] = true;
                members.push(node);
            }
            components.push(members);
        }
        components
    }

    /// Sizes of nodes grouped by type, `unknown` for untyped nodes.
    pub fn type_histogram(&self) -> BTreeMap<String, usize> {
        let mut types = BTreeMap::new();
        for (_, node) in self.nodes() {
            *types.entry(node.type_name().to_string()).or_insert(0) += 1;
        }
        types
    }
}
