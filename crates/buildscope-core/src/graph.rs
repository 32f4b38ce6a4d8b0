//! Label-addressed dependency graph over petgraph's StableDiGraph.
//!
//! Top-level nodes hang off a synthetic root and represent translation
//! units; everything below them is an included header. Headers are shared,
//! so this is a DAG (or worse — include cycles exist in the wild), never a
//! tree. Every traversal carries its own visited set for that reason.

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use regex::Regex;

use crate::error::{GraphError, Result};
use crate::model::{Attr, Attrs, Value};

/// Label of the synthetic root node. It carries no attributes; its direct
/// successors are the top-level (translation unit) nodes.
pub const ROOT_LABEL: &str = "__ROOT__";

#[derive(Debug, Clone)]
struct NodeData {
    label: String,
    attrs: Attrs,
}

/// The dependency graph of one build.
pub struct DependencyGraph {
    inner: StableDiGraph<NodeData, ()>,
    labels: HashMap<String, NodeIndex>,
    root: NodeIndex,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        let mut inner = StableDiGraph::new();
        let root = inner.add_node(NodeData {
            label: ROOT_LABEL.to_string(),
            attrs: Attrs::new(),
        });
        let mut labels = HashMap::new();
        labels.insert(ROOT_LABEL.to_string(), root);
        DependencyGraph {
            inner,
            labels,
            root,
        }
    }

    /// Rebuild a graph from a flat node/edge listing, as produced by the
    /// codec. A `__ROOT__` entry in `nodes` is folded into the implicit
    /// root, its attributes included; edges may reference it by label.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = (String, Attrs)>,
        edges: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let mut graph = Self::new();
        for (label, attrs) in nodes {
            if label == ROOT_LABEL {
                let root = graph.root;
                graph.inner[root].attrs = attrs;
                continue;
            }
            if graph.has_node(&label) {
                return Err(GraphError::DuplicateLabel(label));
            }
            graph.insert_node(label, attrs);
        }
        for (parent, child) in edges {
            let a = graph
                .labels
                .get(&parent)
                .copied()
                .ok_or_else(|| GraphError::Malformed(format!("edge from unknown node \"{parent}\"")))?;
            let b = graph
                .labels
                .get(&child)
                .copied()
                .ok_or_else(|| GraphError::Malformed(format!("edge to unknown node \"{child}\"")))?;
            graph.inner.update_edge(a, b, ());
        }
        Ok(graph)
    }

    /// Number of nodes, the synthetic root included.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn has_node(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    fn index_of(&self, label: &str) -> Result<NodeIndex> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| GraphError::NotFound(label.to_string()))
    }

    fn insert_node(&mut self, label: String, attrs: Attrs) -> NodeIndex {
        let idx = self.inner.add_node(NodeData {
            label: label.clone(),
            attrs,
        });
        self.labels.insert(label, idx);
        idx
    }

    /// Add a translation-unit node and attach it to the root. The label
    /// must not be in use yet.
    pub fn add_top_level_node(&mut self, label: &str, attrs: Attrs) -> Result<()> {
        if self.has_node(label) {
            return Err(GraphError::DuplicateLabel(label.to_string()));
        }
        let idx = self.insert_node(label.to_string(), attrs);
        self.inner.update_edge(self.root, idx, ());
        Ok(())
    }

    /// Add a dependency node under `parent`. If the label already exists
    /// only the edge is added and `attrs` is dropped — the first writer
    /// wins, which lets many parents link the same header without attribute
    /// conflicts.
    pub fn add_dependency_node(&mut self, parent: &str, label: &str, attrs: Attrs) -> Result<()> {
        let parent_idx = self.index_of(parent).map_err(|_| GraphError::MissingParent {
            parent: parent.to_string(),
            label: label.to_string(),
        })?;
        let child_idx = match self.labels.get(label) {
            Some(idx) => *idx,
            None => self.insert_node(label.to_string(), attrs),
        };
        self.inner.update_edge(parent_idx, child_idx, ());
        Ok(())
    }

    /// True iff a directed path `parent -> … -> successor` exists. This is
    /// reachability, not adjacency.
    pub fn has_dependency(&self, parent: &str, successor: &str) -> bool {
        let (Some(&from), Some(&to)) = (self.labels.get(parent), self.labels.get(successor)) else {
            return false;
        };
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(idx) = stack.pop() {
            if !visited.insert(idx) {
                continue;
            }
            for next in self.inner.neighbors_directed(idx, Direction::Outgoing) {
                if next == to {
                    return true;
                }
                if !visited.contains(&next) {
                    stack.push(next);
                }
            }
        }
        false
    }

    /// Iterate over the top-level (translation unit) labels.
    pub fn get_top_level_nodes(&self) -> impl Iterator<Item = &str> {
        self.inner
            .neighbors_directed(self.root, Direction::Outgoing)
            .map(move |idx| self.inner[idx].label.as_str())
    }

    /// Labels reachable from the root that are not top-level nodes.
    pub fn get_dependency_nodes(&self) -> impl Iterator<Item = &str> {
        let top: HashSet<NodeIndex> = self
            .inner
            .neighbors_directed(self.root, Direction::Outgoing)
            .collect();
        self.reachable_indices()
            .into_iter()
            .filter(move |idx| *idx != self.root && !top.contains(idx))
            .map(move |idx| self.inner[idx].label.as_str())
    }

    pub fn get_immediate_dependencies(&self, label: &str) -> Result<impl Iterator<Item = &str>> {
        let idx = self.index_of(label)?;
        Ok(self
            .inner
            .neighbors_directed(idx, Direction::Outgoing)
            .map(move |i| self.inner[i].label.as_str()))
    }

    /// Depth-first pre-order traversal from `origin` (root when `None`).
    /// `reverse` walks dependant edges instead of dependency edges. Each
    /// node is yielded at most once even when reached over several paths.
    pub fn traverse_pre_order(
        &self,
        origin: Option<&str>,
        include_origin: bool,
        reverse: bool,
    ) -> Result<PreOrder<'_>> {
        let start = match origin {
            Some(label) => self.index_of(label)?,
            None => self.root,
        };
        Ok(PreOrder {
            graph: &self.inner,
            stack: vec![start],
            visited: HashSet::new(),
            dir: direction(reverse),
            skip: (!include_origin).then_some(start),
        })
    }

    /// Depth-first post-order traversal; same contract as
    /// [`Self::traverse_pre_order`] but children are yielded before their
    /// parents.
    pub fn traverse_post_order(
        &self,
        origin: Option<&str>,
        include_origin: bool,
        reverse: bool,
    ) -> Result<PostOrder<'_>> {
        let start = match origin {
            Some(label) => self.index_of(label)?,
            None => self.root,
        };
        Ok(PostOrder {
            graph: &self.inner,
            stack: vec![(start, false)],
            visited: HashSet::new(),
            dir: direction(reverse),
            skip: (!include_origin).then_some(start),
        })
    }

    /// Induced subgraph around `label`: the node itself, optionally its
    /// forward closure and/or its reverse closure. When dependants are not
    /// included the root is reattached to `label`, making it the sole
    /// top-level node of the result.
    pub fn get_subgraph(
        &self,
        label: &str,
        include_dependencies: bool,
        include_dependants: bool,
    ) -> Result<DependencyGraph> {
        let origin = self.index_of(label)?;
        let mut keep: HashSet<NodeIndex> = HashSet::new();
        keep.insert(origin);
        if include_dependencies {
            keep.extend(self.closure_indices(origin, Direction::Outgoing));
        }
        if include_dependants {
            keep.extend(self.closure_indices(origin, Direction::Incoming));
        }

        let mut subgraph = DependencyGraph::new();
        for &idx in &keep {
            if idx == self.root {
                continue;
            }
            let node = &self.inner[idx];
            subgraph.insert_node(node.label.clone(), node.attrs.clone());
        }
        for edge in self.inner.edge_indices() {
            let Some((a, b)) = self.inner.edge_endpoints(edge) else {
                continue;
            };
            if !keep.contains(&a) || !keep.contains(&b) {
                continue;
            }
            let a = if a == self.root {
                subgraph.root
            } else {
                subgraph.labels[&self.inner[a].label]
            };
            let b = subgraph.labels[&self.inner[b].label];
            subgraph.inner.update_edge(a, b, ());
        }
        if !include_dependants {
            let idx = subgraph.labels[label];
            subgraph.inner.update_edge(subgraph.root, idx, ());
        }
        Ok(subgraph)
    }

    pub fn has_attribute(&self, label: &str, key: Attr) -> Result<bool> {
        let idx = self.index_of(label)?;
        Ok(self.inner[idx].attrs.contains_key(&key))
    }

    /// The attribute value, or `None` when the node does not carry it.
    /// Defaults are the caller's business; absence is not an error.
    pub fn get_attribute(&self, label: &str, key: Attr) -> Result<Option<&Value>> {
        let idx = self.index_of(label)?;
        Ok(self.inner[idx].attrs.get(&key))
    }

    pub fn set_attribute(&mut self, label: &str, key: Attr, value: impl Into<Value>) -> Result<()> {
        let idx = self.index_of(label)?;
        self.inner[idx].attrs.insert(key, value.into());
        Ok(())
    }

    /// Drop an attribute if present. Used by metric passes to clear their
    /// own output before recomputing.
    pub fn remove_attribute(&mut self, label: &str, key: Attr) -> Result<()> {
        let idx = self.index_of(label)?;
        self.inner[idx].attrs.remove(&key);
        Ok(())
    }

    pub fn attr_text(&self, label: &str, key: Attr) -> Result<Option<&str>> {
        Ok(self.get_attribute(label, key)?.and_then(Value::as_text))
    }

    pub fn attr_int(&self, label: &str, key: Attr) -> Result<Option<u64>> {
        Ok(self.get_attribute(label, key)?.and_then(Value::as_int))
    }

    pub fn attr_real(&self, label: &str, key: Attr) -> Result<Option<f64>> {
        Ok(self.get_attribute(label, key)?.and_then(Value::as_real))
    }

    /// Delete every edge for which the predicate holds. The root's own
    /// out-edges are exempt — top-level membership is never pruned this
    /// way. Nodes are left in place; run [`Self::remove_orphans`] after.
    pub fn remove_dependency_by_predicate<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Self, &str, &str) -> bool,
    {
        let candidates: Vec<(EdgeIndex, NodeIndex, NodeIndex)> = self
            .inner
            .edge_indices()
            .filter_map(|edge| {
                let (a, b) = self.inner.edge_endpoints(edge)?;
                (a != self.root).then_some((edge, a, b))
            })
            .collect();
        let mut doomed = Vec::new();
        for (edge, a, b) in candidates {
            let parent = self.inner[a].label.as_str();
            let child = self.inner[b].label.as_str();
            if predicate(self, parent, child) {
                tracing::debug!("removing {} -> {} dependency", parent, child);
                doomed.push(edge);
            }
        }
        let removed = doomed.len();
        for edge in doomed {
            self.inner.remove_edge(edge);
        }
        tracing::info!("removed {} dependency edges", removed);
        removed
    }

    /// Delete every node whose label matches `label_pattern` (when given)
    /// and whose every listed attribute exists and matches its pattern.
    /// All conditions must hold; an absent attribute fails its condition.
    pub fn remove_matching_nodes(
        &mut self,
        label_pattern: Option<&Regex>,
        attr_patterns: &[(Attr, Regex)],
    ) -> usize {
        let doomed: Vec<NodeIndex> = self
            .inner
            .node_indices()
            .filter(|&idx| {
                if idx == self.root {
                    return false;
                }
                let node = &self.inner[idx];
                if let Some(pattern) = label_pattern {
                    if !pattern.is_match(&node.label) {
                        return false;
                    }
                }
                attr_patterns.iter().all(|(key, pattern)| {
                    node.attrs
                        .get(key)
                        .is_some_and(|value| pattern.is_match(&value.to_string()))
                })
            })
            .collect();
        let removed = doomed.len();
        for idx in doomed {
            if let Some(node) = self.inner.remove_node(idx) {
                tracing::debug!("removing {}", node.label);
                self.labels.remove(&node.label);
            }
        }
        tracing::info!("removed {} nodes", removed);
        removed
    }

    /// Drop every node that is no longer reachable from the root.
    pub fn remove_orphans(&mut self) -> usize {
        let reachable: HashSet<NodeIndex> = self.reachable_indices().into_iter().collect();
        let doomed: Vec<NodeIndex> = self
            .inner
            .node_indices()
            .filter(|idx| !reachable.contains(idx))
            .collect();
        let removed = doomed.len();
        for idx in doomed {
            if let Some(node) = self.inner.remove_node(idx) {
                self.labels.remove(&node.label);
            }
        }
        tracing::info!("removed {} orphaned nodes", removed);
        removed
    }

    /// Log the given prefix together with the current graph size.
    pub fn log_stats(&self, prefix: &str) {
        tracing::info!(
            "{} ({} nodes, {} edges)",
            prefix,
            self.node_count(),
            self.edge_count()
        );
    }

    /// Full node listing for the codec, root included.
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &Attrs)> {
        self.inner
            .node_indices()
            .map(move |idx| (self.inner[idx].label.as_str(), &self.inner[idx].attrs))
    }

    /// Full edge listing for the codec.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.edge_indices().filter_map(move |edge| {
            let (a, b) = self.inner.edge_endpoints(edge)?;
            Some((self.inner[a].label.as_str(), self.inner[b].label.as_str()))
        })
    }

    /// Pre-order node indices reachable from the root, root included.
    fn reachable_indices(&self) -> Vec<NodeIndex> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            if !visited.insert(idx) {
                continue;
            }
            order.push(idx);
            for next in self.inner.neighbors_directed(idx, Direction::Outgoing) {
                if !visited.contains(&next) {
                    stack.push(next);
                }
            }
        }
        order
    }

    /// Closure of `origin` along `dir`, origin excluded.
    fn closure_indices(&self, origin: NodeIndex, dir: Direction) -> Vec<NodeIndex> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(origin);
        let mut stack: Vec<NodeIndex> = self.inner.neighbors_directed(origin, dir).collect();
        while let Some(idx) = stack.pop() {
            if !visited.insert(idx) {
                continue;
            }
            found.push(idx);
            for next in self.inner.neighbors_directed(idx, dir) {
                if !visited.contains(&next) {
                    stack.push(next);
                }
            }
        }
        found
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn direction(reverse: bool) -> Direction {
    if reverse {
        Direction::Incoming
    } else {
        Direction::Outgoing
    }
}

/// Lazy depth-first pre-order walk. See
/// [`DependencyGraph::traverse_pre_order`].
pub struct PreOrder<'a> {
    graph: &'a StableDiGraph<NodeData, ()>,
    stack: Vec<NodeIndex>,
    visited: HashSet<NodeIndex>,
    dir: Direction,
    skip: Option<NodeIndex>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(idx) = self.stack.pop() {
            if !self.visited.insert(idx) {
                continue;
            }
            for next in self.graph.neighbors_directed(idx, self.dir) {
                if !self.visited.contains(&next) {
                    self.stack.push(next);
                }
            }
            if self.skip == Some(idx) {
                continue;
            }
            return Some(self.graph[idx].label.as_str());
        }
        None
    }
}

/// Lazy depth-first post-order walk. See
/// [`DependencyGraph::traverse_post_order`].
pub struct PostOrder<'a> {
    graph: &'a StableDiGraph<NodeData, ()>,
    stack: Vec<(NodeIndex, bool)>,
    visited: HashSet<NodeIndex>,
    dir: Direction,
    skip: Option<NodeIndex>,
}

impl<'a> Iterator for PostOrder<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((idx, expanded)) = self.stack.pop() {
            if expanded {
                if self.skip == Some(idx) {
                    continue;
                }
                return Some(self.graph[idx].label.as_str());
            }
            if !self.visited.insert(idx) {
                continue;
            }
            self.stack.push((idx, true));
            for next in self.graph.neighbors_directed(idx, self.dir) {
                if !self.visited.contains(&next) {
                    self.stack.push((next, false));
                }
            }
        }
        None
    }
}
