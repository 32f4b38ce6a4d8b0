//! Per-channel parser state machine.
//!
//! A channel sees one logical build stream. Compiled files are staged as
//! pending nodes and only committed to the graph on flush, because their
//! identity is incomplete until then: the announcement line carries only a
//! basename, and the full path arrives later on the timing line.

use std::sync::LazyLock;

use buildscope_core::{Attr, Attrs, DependencyGraph, Value};
use indexmap::IndexMap;
use regex::Regex;

use crate::error::{ParseError, Result};
use crate::paths::{basename, unify_path};

static PROJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+>[^:]*:\s+Project:\s+([^,]+),").unwrap());
static INVOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+>\s*(cl\s+/c.*)$").unwrap());
static SOURCE_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+>\s*([\w.-]+\.c(?:pp|xx)?)\s*$").unwrap());
static INCLUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+>\s*Note: including file:( +)(.*)$").unwrap());
static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+>\s*time\(.*\)=(\d+\.\d+)s.*\[([^\]]+)\]").unwrap());
// source filenames on the invocation line, optionally quoted
static INVOCATION_SOURCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s+"?([\w.\\/-]+\.c(?:pp|xx)?)"?"#).unwrap());
static PCH_USE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"/Yu\s*['"]?([^'"\s]+)"#).unwrap());
static PCH_CREATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"/Yc\s*['"]?([^'"\s]+)"#).unwrap());

/// A compiled file staged for flush. `label` starts as the announced
/// basename and is promoted to the unified full path once a timing line
/// reveals it. Dependencies are (parent path, child path) tuples.
#[derive(Debug, Default)]
struct PendingNode {
    label: String,
    attrs: Attrs,
    dependencies: Vec<(String, String)>,
}

impl PendingNode {
    /// Re-key the node, rewriting every dependency tuple that referenced
    /// the old identity.
    fn rename(&mut self, to: &str) {
        if self.label == to {
            return;
        }
        let old = std::mem::replace(&mut self.label, to.to_string());
        for (parent, _) in &mut self.dependencies {
            if *parent == old {
                *parent = self.label.clone();
            }
        }
    }
}

pub(crate) struct ChannelState {
    id: u32,
    project: Option<String>,
    nodes: IndexMap<String, PendingNode>,
    /// Key of the node currently receiving include notices.
    current: Option<String>,
    /// Include nesting stack; index 0 is the compiled file itself.
    stack: Vec<String>,
    invocation: Option<String>,
    invocation_files: Option<Vec<String>>,
    uses_pch: Option<String>,
    creates_pch: Option<String>,
}

impl ChannelState {
    pub(crate) fn new(id: u32) -> Self {
        ChannelState {
            id,
            project: None,
            nodes: IndexMap::new(),
            current: None,
            stack: Vec::new(),
            invocation: None,
            invocation_files: None,
            uses_pch: None,
            creates_pch: None,
        }
    }

    /// Dispatch one line. First matching shape wins; unrecognized lines
    /// are skipped silently.
    pub(crate) fn parse_line(&mut self, line: &str, graph: &mut DependencyGraph) -> Result<()> {
        if let Some(caps) = PROJECT_RE.captures(line) {
            self.handle_project(&caps[1]);
        } else if let Some(caps) = INVOCATION_RE.captures(line) {
            self.handle_invocation(&caps[1], graph)?;
        } else if let Some(caps) = SOURCE_FILE_RE.captures(line) {
            self.handle_source_file(&caps[1])?;
        } else if let Some(caps) = INCLUDE_RE.captures(line) {
            self.handle_include(caps[1].len(), &caps[2]);
        } else if let Some(caps) = TIME_RE.captures(line) {
            if let Ok(seconds) = caps[1].parse::<f64>() {
                self.handle_timing(seconds, &caps[2]);
            }
        }
        Ok(())
    }

    fn handle_project(&mut self, name: &str) {
        tracing::info!("channel {}: parsing project {}", self.id, name);
        self.project = Some(name.to_string());
    }

    /// A new compiler invocation flushes whatever was staged before it and
    /// records the command, its source-file list, and the PCH switches.
    fn handle_invocation(&mut self, command: &str, graph: &mut DependencyGraph) -> Result<()> {
        self.flush(graph)?;
        let files: Vec<String> = INVOCATION_SOURCE_RE
            .captures_iter(command)
            .map(|caps| basename(&unify_path(&caps[1])).to_string())
            .collect();
        let stripped = INVOCATION_SOURCE_RE.replace_all(command, "").into_owned();
        self.uses_pch = single_switch(command, &PCH_USE_RE, "/Yu")?;
        self.creates_pch = single_switch(command, &PCH_CREATE_RE, "/Yc")?;
        tracing::debug!(
            "channel {}: compiler invocation for [{}]",
            self.id,
            files.join(", ")
        );
        self.invocation = Some(stripped);
        self.invocation_files = Some(files);
        Ok(())
    }

    /// The announcement carries only the basename; the pending node gets
    /// its full identity later from the timing line.
    fn handle_source_file(&mut self, filename: &str) -> Result<()> {
        let label = basename(&unify_path(filename)).to_string();
        let Some(project) = self.project.clone() else {
            return Err(ParseError::MissingProject {
                file: label,
                channel: self.id,
            });
        };
        if let Some(files) = &self.invocation_files {
            if !files.is_empty() && !files.iter().any(|f| f == &label) {
                return Err(ParseError::UnexpectedFile {
                    file: label,
                    expected: files.join(", "),
                });
            }
        }
        tracing::debug!("channel {}: compiling {}", self.id, label);
        let mut attrs = Attrs::new();
        attrs.insert(Attr::Project, Value::from(project));
        if let Some(command) = &self.invocation {
            attrs.insert(Attr::CompilationCommand, Value::from(command.clone()));
        }
        if let Some(name) = &self.creates_pch {
            attrs.insert(Attr::CreatesPch, Value::from(name.clone()));
        }
        if let Some(name) = &self.uses_pch {
            attrs.insert(Attr::UsesPch, Value::from(name.clone()));
        }
        let node = self.nodes.entry(label.clone()).or_default();
        node.label = label.clone();
        node.attrs = attrs;
        self.stack = vec![label.clone()];
        self.current = Some(label);
        Ok(())
    }

    /// The space count after the marker is the include nesting depth; the
    /// stack is popped down to it and the edge recorded against whatever
    /// is then on top.
    fn handle_include(&mut self, depth: usize, path: &str) {
        let Some(current) = self.current.clone() else {
            tracing::debug!(
                "channel {}: include notice outside a compiled file, skipping",
                self.id
            );
            return;
        };
        let path = unify_path(path.trim());
        self.stack.truncate(depth);
        let parent = match self.stack.last() {
            Some(top) => top.clone(),
            None => current.clone(),
        };
        if let Some(node) = self.nodes.get_mut(&current) {
            node.dependencies.push((parent, path.clone()));
        }
        self.stack.push(path);
    }

    /// Timing lines reveal the compiled file's full path, so a node still
    /// keyed by basename is promoted here. Times accumulate: front-end and
    /// back-end phases report separately and must be summed.
    fn handle_timing(&mut self, seconds: f64, path: &str) {
        let path = unify_path(path);
        let name = basename(&path).to_string();
        if let Some(node) = self.nodes.shift_remove(&name) {
            self.nodes.insert(path.clone(), node);
            for entry in &mut self.stack {
                if *entry == name {
                    *entry = path.clone();
                }
            }
            if self.current.as_deref() == Some(name.as_str()) {
                self.current = Some(path.clone());
            }
        }
        let node = self.nodes.entry(path.clone()).or_default();
        node.rename(&path);
        let total = node
            .attrs
            .get(&Attr::BuildTime)
            .and_then(Value::as_real)
            .unwrap_or(0.0)
            + seconds;
        node.attrs.insert(Attr::BuildTime, Value::Real(total));
    }

    /// Commit all staged nodes to the graph. Labels are disambiguated per
    /// absolute path; a label that is already taken by the same path is a
    /// duplicate compile and dropped with a warning. Dependencies already
    /// reachable through the consumed PCH are suppressed.
    pub(crate) fn flush(&mut self, graph: &mut DependencyGraph) -> Result<()> {
        let staged: Vec<PendingNode> = self.nodes.drain(..).map(|(_, node)| node).collect();
        self.current = None;
        self.stack.clear();
        for node in staged {
            let PendingNode {
                label: absolute_path,
                mut attrs,
                dependencies,
            } = node;
            let label = unique_label(graph, &absolute_path);
            if graph.has_node(&label) {
                tracing::warn!("ignoring duplicated compiled file \"{}\"", label);
                continue;
            }
            let creates = attrs
                .get(&Attr::CreatesPch)
                .and_then(Value::as_text)
                .map(str::to_string);
            let uses = attrs
                .get(&Attr::UsesPch)
                .and_then(Value::as_text)
                .map(str::to_string);
            attrs.insert(Attr::AbsolutePath, Value::from(absolute_path));
            tracing::debug!("adding compiled file {}", label);
            graph.add_top_level_node(&label, attrs)?;
            for (parent, child_path) in dependencies {
                let parent_label = unique_label(graph, &parent);
                let child_label = unique_label(graph, &child_path);
                if let Some(pch) = &uses {
                    if graph.has_dependency(pch, &child_label) {
                        tracing::debug!(
                            "skipping {} -> {}: already included through precompiled header {}",
                            parent_label,
                            child_label,
                            pch
                        );
                        continue;
                    }
                }
                let mut child_attrs = Attrs::new();
                child_attrs.insert(Attr::AbsolutePath, Value::from(child_path));
                graph.add_dependency_node(&parent_label, &child_label, child_attrs)?;
            }
            if let Some(pch) = &creates {
                graph.add_dependency_node(&label, pch, Attrs::new())?;
            }
        }
        Ok(())
    }
}

/// Label for `absolute_path`: the basename, suffixed with `_1`, `_2`, …
/// when that basename is already taken by a different path. The same path
/// always resolves to the same label.
fn unique_label(graph: &DependencyGraph, absolute_path: &str) -> String {
    let base = basename(absolute_path);
    let mut label = base.to_string();
    let mut index = 0usize;
    loop {
        if !graph.has_node(&label) {
            return label;
        }
        let taken_by_same_path = graph
            .get_attribute(&label, Attr::AbsolutePath)
            .ok()
            .flatten()
            .and_then(Value::as_text)
            == Some(absolute_path);
        if taken_by_same_path {
            return label;
        }
        index += 1;
        label = format!("{base}_{index}");
    }
}

/// Extract an optional single-valued PCH switch; two occurrences of the
/// same switch on one invocation is an error.
fn single_switch(
    command: &str,
    pattern: &Regex,
    switch: &'static str,
) -> Result<Option<String>> {
    let mut matches = pattern.captures_iter(command);
    let first = matches
        .next()
        .map(|caps| basename(&unify_path(&caps[1])).to_string());
    if matches.next().is_some() {
        return Err(ParseError::MultiplePchSwitches { switch });
    }
    Ok(first)
}
