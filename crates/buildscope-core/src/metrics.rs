//! Metric passes over a parsed dependency graph.
//!
//! Each pass clears its output attribute on every reachable node first, so
//! re-running the analysis after pruning edges never leaves stale numbers
//! behind.

use std::collections::{BTreeSet, HashMap};
use std::fs;

use crate::error::{GraphError, Result};
use crate::graph::{DependencyGraph, ROOT_LABEL};
use crate::model::{Attr, pretty_filesize};
use crate::pch::PchIndex;

/// Runs the metric passes against a graph. Holds the PCH index computed
/// from the graph at construction time.
pub struct Analyzer<'g> {
    graph: &'g mut DependencyGraph,
    pch: PchIndex,
}

impl<'g> Analyzer<'g> {
    pub fn new(graph: &'g mut DependencyGraph) -> Result<Self> {
        let pch = PchIndex::build(graph)?;
        Ok(Analyzer { graph, pch })
    }

    /// All passes, in dependency order.
    pub fn run_full_analysis(&mut self) -> Result<()> {
        self.calculate_file_sizes()?;
        self.calculate_total_sizes()?;
        self.calculate_total_build_times()?;
        self.calculate_translation_units()?;
        self.calculate_build_time_deviations()?;
        Ok(())
    }

    /// Re-derive everything that depends on graph shape. File sizes only
    /// depend on the files themselves, so they are kept.
    pub fn update_analysis(&mut self) -> Result<()> {
        self.calculate_total_sizes()?;
        self.calculate_total_build_times()?;
        self.calculate_translation_units()?;
        self.calculate_build_time_deviations()?;
        Ok(())
    }

    /// Stat every reachable file and record its size. A node without an
    /// absolute path, or a path that cannot be stat'ed, is fatal.
    pub fn calculate_file_sizes(&mut self) -> Result<()> {
        tracing::info!("calculating file sizes");
        let labels: Vec<String> = self
            .graph
            .traverse_post_order(None, false, false)?
            .map(str::to_string)
            .collect();
        for label in labels {
            let path = self
                .graph
                .attr_text(&label, Attr::AbsolutePath)?
                .ok_or_else(|| GraphError::MissingAttribute {
                    label: label.clone(),
                    key: Attr::AbsolutePath,
                })?
                .to_string();
            let size = fs::metadata(&path)
                .map_err(|source| GraphError::Stat { path, source })?
                .len();
            tracing::debug!("{} file size: {}", label, pretty_filesize(size));
            self.graph.set_attribute(&label, Attr::FileSize, size)?;
        }
        Ok(())
    }

    /// Per-node total size: own file size plus the sizes of everything the
    /// node pulls in, with PCH-covered subtrees counted as zero for
    /// consuming translation units. The root gets the sum over all
    /// translation units.
    pub fn calculate_total_sizes(&mut self) -> Result<()> {
        tracing::info!("calculating total sizes");
        self.clear_attribute(Attr::TotalSize)?;
        let tops: Vec<String> = self.graph.get_top_level_nodes().map(str::to_string).collect();
        let mut root_total = 0u64;
        for top in &tops {
            let discounted = self.pch.discounted_for(self.graph, top)?;
            // Post-order guarantees every dependency's contribution is
            // memoized before its parents ask for it.
            let walk: Vec<String> = self
                .graph
                .traverse_post_order(Some(top), true, false)?
                .map(str::to_string)
                .collect();
            let mut contribution: HashMap<String, u64> = HashMap::new();
            for label in &walk {
                if discounted.contains(label) {
                    contribution.insert(label.clone(), 0);
                    continue;
                }
                let own = self.graph.attr_int(label, Attr::FileSize)?.ok_or_else(|| {
                    GraphError::MissingAttribute {
                        label: label.clone(),
                        key: Attr::FileSize,
                    }
                })?;
                let deps: Vec<String> = self
                    .graph
                    .get_immediate_dependencies(label)?
                    .map(str::to_string)
                    .collect();
                let total = own
                    + deps
                        .iter()
                        .map(|dep| contribution.get(dep).copied().unwrap_or(0))
                        .sum::<u64>();
                contribution.insert(label.clone(), total);
                self.graph.set_attribute(label, Attr::TotalSize, total)?;
            }
            root_total += contribution.get(top).copied().unwrap_or(0);
        }
        self.graph
            .set_attribute(ROOT_LABEL, Attr::TotalSize, root_total)?;
        Ok(())
    }

    /// Attribute each translation unit's build time to every dependency it
    /// actually pays for. A dependency reached by several units accumulates
    /// all their times; PCH-covered files are skipped for consumers.
    pub fn calculate_total_build_times(&mut self) -> Result<()> {
        tracing::info!("calculating total build times");
        self.clear_attribute(Attr::TotalBuildTime)?;
        let tops: Vec<String> = self.graph.get_top_level_nodes().map(str::to_string).collect();
        let mut root_total = 0.0f64;
        for top in &tops {
            let build_time = self.graph.attr_real(top, Attr::BuildTime)?.unwrap_or(0.0);
            root_total += build_time;
            let discounted = self.pch.discounted_for(self.graph, top)?;
            let walk: Vec<String> = self
                .graph
                .traverse_pre_order(Some(top), false, false)?
                .map(str::to_string)
                .collect();
            for label in walk {
                if discounted.contains(&label) {
                    continue;
                }
                let current = self
                    .graph
                    .attr_real(&label, Attr::TotalBuildTime)?
                    .unwrap_or(0.0);
                self.graph
                    .set_attribute(&label, Attr::TotalBuildTime, current + build_time)?;
            }
        }
        self.graph
            .set_attribute(ROOT_LABEL, Attr::TotalBuildTime, root_total)?;
        Ok(())
    }

    /// Count, per dependency node, the translation units that pay for it.
    /// The root gets the total number of translation units.
    pub fn calculate_translation_units(&mut self) -> Result<()> {
        tracing::info!("counting translation units");
        self.clear_attribute(Attr::TranslationUnits)?;
        let tops: Vec<String> = self.graph.get_top_level_nodes().map(str::to_string).collect();
        for top in &tops {
            let discounted = self.pch.discounted_for(self.graph, top)?;
            let walk: Vec<String> = self
                .graph
                .traverse_pre_order(Some(top), false, false)?
                .map(str::to_string)
                .collect();
            for label in walk {
                if discounted.contains(&label) {
                    continue;
                }
                let current = self
                    .graph
                    .attr_int(&label, Attr::TranslationUnits)?
                    .unwrap_or(0);
                self.graph
                    .set_attribute(&label, Attr::TranslationUnits, current + 1)?;
            }
        }
        self.graph
            .set_attribute(ROOT_LABEL, Attr::TranslationUnits, tops.len() as u64)?;
        Ok(())
    }

    /// Build time unexplained by the per-unit average: a node's accumulated
    /// build time minus (average unit time × units that include it).
    /// Positive values point at expensive includes.
    pub fn calculate_build_time_deviations(&mut self) -> Result<()> {
        tracing::info!("calculating build time deviations");
        self.clear_attribute(Attr::BuildTimeDev)?;
        let total = self
            .graph
            .attr_real(ROOT_LABEL, Attr::TotalBuildTime)?
            .unwrap_or(0.0);
        let units = self
            .graph
            .attr_int(ROOT_LABEL, Attr::TranslationUnits)?
            .unwrap_or(0);
        let average = if units > 0 { total / units as f64 } else { 0.0 };
        let labels: Vec<String> = self
            .graph
            .traverse_pre_order(None, false, false)?
            .map(str::to_string)
            .collect();
        for label in labels {
            let build_time = self
                .graph
                .attr_real(&label, Attr::TotalBuildTime)?
                .unwrap_or(0.0);
            let count = self
                .graph
                .attr_int(&label, Attr::TranslationUnits)?
                .unwrap_or(0);
            self.graph.set_attribute(
                &label,
                Attr::BuildTimeDev,
                build_time - average * count as f64,
            )?;
        }
        Ok(())
    }

    fn clear_attribute(&mut self, key: Attr) -> Result<()> {
        let labels: Vec<String> = self
            .graph
            .traverse_pre_order(None, true, false)?
            .map(str::to_string)
            .collect();
        for label in labels {
            self.graph.remove_attribute(&label, key)?;
        }
        Ok(())
    }
}

const UNKNOWN_PROJECT: &str = "__UNKNOWN__";

/// Project-level edges implied by file dependencies: for every file edge
/// whose endpoints resolve to different projects, one (source, target)
/// pair. Headers inherit the project of the nearest translation-unit
/// directory above them.
pub fn project_dependencies(graph: &DependencyGraph) -> Result<Vec<(String, String)>> {
    let mut directory_to_project: HashMap<String, String> = HashMap::new();
    let tops: Vec<String> = graph.get_top_level_nodes().map(str::to_string).collect();
    for label in &tops {
        let Some(path) = graph.attr_text(label, Attr::AbsolutePath)? else {
            continue;
        };
        let Some(project) = graph.attr_text(label, Attr::Project)? else {
            continue;
        };
        let dir = dirname(path).to_string();
        if let Some(existing) = directory_to_project.get(&dir) {
            if existing != project {
                tracing::error!(
                    "directory {} builds into multiple projects ({} and {})",
                    dir,
                    existing,
                    project
                );
            }
        } else {
            directory_to_project.insert(dir, project.to_string());
        }
    }

    let guess = |label: &str| -> Result<String> {
        if let Some(project) = graph.attr_text(label, Attr::Project)? {
            return Ok(project.to_string());
        }
        let path = graph.attr_text(label, Attr::AbsolutePath)?.unwrap_or("");
        let mut dir = dirname(path);
        loop {
            if let Some(project) = directory_to_project.get(dir) {
                return Ok(project.clone());
            }
            let parent = dirname(dir);
            if parent == dir {
                return Ok(UNKNOWN_PROJECT.to_string());
            }
            dir = parent;
        }
    };

    let mut result: BTreeSet<(String, String)> = BTreeSet::new();
    let labels: Vec<String> = graph
        .traverse_pre_order(None, false, false)?
        .map(str::to_string)
        .collect();
    for label in labels {
        let source = guess(&label)?;
        let deps: Vec<String> = graph
            .get_immediate_dependencies(&label)?
            .map(str::to_string)
            .collect();
        for dep in deps {
            let target = guess(&dep)?;
            if source != target {
                result.insert((source.clone(), target));
            }
        }
    }
    Ok(result.into_iter().collect())
}

/// Parent directory of a unified (forward-slash) path. The parent of a
/// bare name or of a drive root is itself.
fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(pos) => &path[..pos],
        None => path,
    }
}
