//! Buildscope Core — dependency graph store, PCH index, and metric engine

pub mod codec;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod model;
pub mod pch;
pub mod report;


pub use codec::{load_graph, read_graph, save_graph, write_graph};
pub use error::{GraphError, Result};
pub use graph::{DependencyGraph, ROOT_LABEL};
pub use metrics::{Analyzer, project_dependencies};
pub use model::{Attr, Attrs, Value, pretty_filesize};
pub use pch::PchIndex;
pub use report::{
    Column, internal_columns, root_columns, top_level_columns, unescape_separator,
    write_report,
};
