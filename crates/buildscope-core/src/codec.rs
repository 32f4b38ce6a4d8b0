//! JSON persistence for dependency graphs.
//!
//! The document is a flat node list plus an edge list. The synthetic root
//! is written out like any other node so that top-level membership (the
//! root's out-edges) survives the round trip.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::model::Attrs;

#[derive(Serialize, Deserialize)]
struct NodeDoc {
    label: String,
    #[serde(default)]
    attrs: Attrs,
}

#[derive(Serialize, Deserialize)]
struct GraphDoc {
    nodes: Vec<NodeDoc>,
    edges: Vec<(String, String)>,
}

pub fn write_graph<W: Write>(graph: &DependencyGraph, writer: W) -> Result<()> {
    let doc = GraphDoc {
        nodes: graph
            .nodes()
            .map(|(label, attrs)| NodeDoc {
                label: label.to_string(),
                attrs: attrs.clone(),
            })
            .collect(),
        edges: graph
            .edges()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect(),
    };
    serde_json::to_writer_pretty(writer, &doc)?;
    Ok(())
}

pub fn read_graph<R: Read>(reader: R) -> Result<DependencyGraph> {
    let doc: GraphDoc = serde_json::from_reader(reader)?;
    DependencyGraph::from_parts(
        doc.nodes.into_iter().map(|node| (node.label, node.attrs)),
        doc.edges,
    )
}

pub fn save_graph(graph: &DependencyGraph, path: &Path) -> Result<()> {
    tracing::info!("storing dependency graph in {}", path.display());
    let file = File::create(path)?;
    write_graph(graph, BufWriter::new(file))
}

pub fn load_graph(path: &Path) -> Result<DependencyGraph> {
    tracing::info!("loading dependency graph from {}", path.display());
    let file = File::open(path)?;
    read_graph(BufReader::new(file))
}
