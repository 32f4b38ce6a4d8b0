//! Precompiled-header bookkeeping.
//!
//! A translation unit that creates a PCH pays for everything it includes
//! once; units that consume the PCH get those files for free. The index
//! captures, per PCH name, the forward closure of its creator so metric
//! passes can tell discounted dependencies apart from paid ones.

use std::collections::{HashMap, HashSet};

use crate::error::{GraphError, Result};
use crate::graph::DependencyGraph;
use crate::model::Attr;

/// Per-PCH creator closures, frozen at build time. Rebuild the index after
/// mutating the graph.
#[derive(Debug, Default)]
pub struct PchIndex {
    creators: HashMap<String, String>,
    closures: HashMap<String, HashSet<String>>,
}

impl PchIndex {
    /// Scan the top-level nodes for PCH creators and record each creator's
    /// forward closure (creator included). Two creators for the same PCH
    /// name is an error.
    pub fn build(graph: &DependencyGraph) -> Result<Self> {
        let tops: Vec<String> = graph.get_top_level_nodes().map(str::to_string).collect();
        let mut index = PchIndex::default();
        for label in tops {
            let Some(name) = graph.attr_text(&label, Attr::CreatesPch)? else {
                continue;
            };
            let name = name.to_string();
            if let Some(first) = index.creators.get(&name) {
                return Err(GraphError::DuplicatePch {
                    name,
                    first: first.clone(),
                    second: label,
                });
            }
            let closure: HashSet<String> = graph
                .traverse_pre_order(Some(&label), true, false)?
                .map(str::to_string)
                .collect();
            tracing::debug!(
                "precompiled header {} created by {} covers {} nodes",
                name,
                label,
                closure.len()
            );
            index.creators.insert(name.clone(), label);
            index.closures.insert(name, closure);
        }
        Ok(index)
    }

    /// Label of the translation unit that creates `name`, if any.
    pub fn creator(&self, name: &str) -> Option<&str> {
        self.creators.get(name).map(String::as_str)
    }

    /// The creator's closure for `name`.
    pub fn closure(&self, name: &str) -> Option<&HashSet<String>> {
        self.closures.get(name)
    }

    /// Nodes `tu` gets for free from its consumed PCH: those reachable
    /// from `tu` only along paths that never leave the creator closure. A
    /// closure member reached through a header outside the closure is a
    /// real include and is not in the set.
    pub fn discounted_for(&self, graph: &DependencyGraph, tu: &str) -> Result<HashSet<String>> {
        let Some(name) = graph.attr_text(tu, Attr::UsesPch)? else {
            return Ok(HashSet::new());
        };
        let Some(closure) = self.closures.get(name) else {
            return Ok(HashSet::new());
        };
        // Two-state reachability: "inside" tracks whether the path so far
        // has stayed within the closure. A node is discounted when it is
        // seen inside and never outside.
        let mut inside_seen: HashSet<String> = HashSet::new();
        let mut outside_seen: HashSet<String> = HashSet::new();
        let mut stack: Vec<(String, bool)> = vec![(tu.to_string(), true)];
        while let Some((label, inside)) = stack.pop() {
            let seen = if inside {
                &mut inside_seen
            } else {
                &mut outside_seen
            };
            if !seen.insert(label.clone()) {
                continue;
            }
            let deps: Vec<String> = graph
                .get_immediate_dependencies(&label)?
                .map(str::to_string)
                .collect();
            for dep in deps {
                let dep_inside = inside && closure.contains(&dep);
                stack.push((dep, dep_inside));
            }
        }
        inside_seen.remove(tu);
        Ok(inside_seen
            .into_iter()
            .filter(|label| !outside_seen.contains(label))
            .collect())
    }
}
