use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::graph::{EdgeData, KnowledgeGraph, NodeData};

#[derive(Debug, Serialize)]
pub struct NodeLinkNode<'a> {
    pub id: &'a str,
    #[serde(flatten)]
    pub data: &'a NodeData,
}

#[derive(Debug, Serialize)]
pub struct NodeLinkEdge<'a> {
    pub source: &'a str,
    pub target: &'a str,
    #[serde(flatten)]
    pub data: &'a EdgeData,
}

/// `{directed, multigraph, nodes, links}` in the common node-link layout.
#[derive(Debug, Serialize)]
pub struct NodeLinkGraph<'a> {
    pub directed: bool,
    pub multigraph: bool,
    pub nodes: Vec<NodeLinkNode<'a>>,
    pub links: Vec<NodeLinkEdge<'a>>,
}

pub fn node_link(graph: &KnowledgeGraph) -> NodeLinkGraph<'_> {
    NodeLinkGraph {
        directed: false,
        multigraph: false,
        nodes: graph
            .nodes()
            .map(|(_, data)| NodeLinkNode { id: &data.key, data })
            .collect(),
        links: graph
            .edges()
            .map(|(a, b, data)| NodeLinkEdge {
                source: graph.key(a),
                target: graph.key(b),
                data,
            })
            .collect(),
    }
}

pub async fn write_node_link(graph: &KnowledgeGraph, path: &Path) -> Result<()> {
    let body = serde_json::to_string_pretty(&node_link(graph))
        .context("Failed to serialize graph")?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("Failed to write graph export: {:?}", path))?;
    Ok(())
}
