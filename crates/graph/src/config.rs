use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeTypeConfig {
    pub type_name: String,
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeTypeConfig {
    pub relation: String,
    pub source_type: String,
    pub target_type: String,
    pub properties: Vec<String>,
}

/// Declared node and edge types for one graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphConfig {
    pub nodes: BTreeMap<String, NodeTypeConfig>,
    pub edges: BTreeMap<String, EdgeTypeConfig>,
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn content_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Parses `type: attr1, attr2` lines.
pub fn parse_nodes_ini(text: &str) -> BTreeMap<String, NodeTypeConfig> {
    let mut cfg = BTreeMap::new();
    for line in content_lines(text) {
        let Some((left, right)) = line.split_once(':') else {
            warn!(line, "Skipping nodes.ini line without ':'");
            continue;
        };
        let type_name = left.trim();
        if type_name.is_empty() {
            warn!(line, "Skipping nodes.ini line with empty type");
            continue;
        }
        cfg.insert(
            type_name.to_string(),
            NodeTypeConfig {
                type_name: type_name.to_string(),
                attributes: split_list(right),
            },
        );
    }
    cfg
}

/// Parses `relation: source_type -> target_type | prop1, prop2` lines.
pub fn parse_edges_ini(text: &str) -> BTreeMap<String, EdgeTypeConfig> {
    let mut cfg = BTreeMap::new();
    for line in content_lines(text) {
        let Some((left, rest)) = line.split_once(':') else {
            warn!(line, "Skipping edges.ini line without ':'");
            continue;
        };
        let relation = left.trim();
        if relation.is_empty() {
            warn!(line, "Skipping edges.ini line with empty relation");
            continue;
        }

        let (arrow, props) = rest.split_once('|').unwrap_or((rest, ""));
        let Some((src, tgt)) = arrow.split_once("->") else {
            warn!(line, "Skipping edges.ini line without '->'");
            continue;
        };
        let (source_type, target_type) = (src.trim(), tgt.trim());
        if source_type.is_empty() || target_type.is_empty() {
            warn!(line, "Skipping edges.ini line with empty source/target");
            continue;
        }

        cfg.insert(
            relation.to_string(),
            EdgeTypeConfig {
                relation: relation.to_string(),
                source_type: source_type.to_string(),
                target_type: target_type.to_string(),
                properties: split_list(props),
            },
        );
    }
    cfg
}

impl GraphConfig {
    /// Reads `nodes.ini` and `edges.ini` from `dir`. Missing files yield an
    /// empty section.
    pub async fn load(dir: &Path) -> Self {
        let read = |name: &'static str| {
            let path = dir.join(name);
            async move {
                match tokio::fs::read_to_string(&path).await {
                    Ok(text) => Some(text),
                    Err(_) => {
                        info!(path = %path.display(), "No {}; proceeding without it", name);
                        None
                    }
                }
            }
        };

        let nodes = read("nodes.ini")
            .await
            .map(|t| parse_nodes_ini(&t))
            .unwrap_or_default();
        let edges = read("edges.ini")
            .await
            .map(|t| parse_edges_ini(&t))
            .unwrap_or_default();

        info!(
            node_types = nodes.len(),
            edge_types = edges.len(),
            "Loaded graph config"
        );
        Self { nodes, edges }
    }

    pub fn edge(&self, relation: &str) -> Option<&EdgeTypeConfig> {
        self.edges.get(relation)
    }

    /// Sorted `(type, type)` pair -> relation, for every declared edge type.
    pub fn plausible_edge_types(&self) -> BTreeMap<(String, String), String> {
        self.edges
            .values()
            .map(|e| {
                let mut pair = [e.source_type.clone(), e.target_type.clone()];
                pair.sort();
                let [a, b] = pair;
                ((a, b), e.relation.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nodes() {
        let cfg = parse_nodes_ini(
            "# nodes\nvtuber: name, synonyms, description\n\nagency: name\nbroken line\n: x\n",
        );
        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg["vtuber"].attributes, vec!["name", "synonyms", "description"]);
    }

    #[test]
    fn test_parse_edges() {
        let cfg = parse_edges_ini(
            "belongs_to: vtuber -> agency\n\
             collaborated_with: vtuber -> vtuber | hours, times\n\
             bad: vtuber agency\n\
             empty: -> agency\n",
        );
        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg["collaborated_with"].properties, vec!["hours", "times"]);
        assert_eq!(cfg["belongs_to"].target_type, "agency");
    }

    #[test]
    fn test_plausible_pairs_are_sorted() {
        let config = GraphConfig {
            nodes: BTreeMap::new(),
            edges: parse_edges_ini("played: vtuber -> game\n"),
        };
        let table = config.plausible_edge_types();
        assert_eq!(
            table.get(&("game".to_string(), "vtuber".to_string())).map(String::as_str),
            Some("played")
        );
    }

    #[tokio::test]
    async fn test_load_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("edges.ini"), "belongs_to: vtuber -> agency\n").unwrap();

        let config = GraphConfig::load(dir.path()).await;
        assert!(config.nodes.is_empty());
        assert_eq!(config.edges.len(), 1);
    }
}
