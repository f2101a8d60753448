pub mod builder;
pub mod config;
pub mod export;
pub mod graph;

pub use builder::{BuildStats, GraphBuilder};
pub use config::{EdgeTypeConfig, GraphConfig, NodeTypeConfig};
pub use export::{node_link, write_node_link};
pub use graph::{EdgeData, KnowledgeGraph, NodeData};

pub use petgraph::graph::NodeIndex;
