//! CLI command implementations

use std::fs::{self, File};
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Context;
use buildscope_core::{
    Analyzer, Attr, Column, DependencyGraph, ROOT_LABEL, internal_columns, load_graph,
    project_dependencies, root_columns, save_graph, top_level_columns, unescape_separator,
    write_report,
};
use buildscope_parser::{parse_msvc_log, unify_path};

pub fn profile(
    profile_dir: PathBuf,
    log_file: PathBuf,
    codebase_dir: Option<String>,
    column_separator: String,
) -> anyhow::Result<()> {
    fs::create_dir_all(&profile_dir)
        .with_context(|| format!("cannot create {}", profile_dir.display()))?;
    let log_path = if log_file.is_absolute() {
        log_file
    } else {
        profile_dir.join(log_file)
    };

    let mut graph = parse_msvc_log(&log_path)
        .with_context(|| format!("failed to parse {}", log_path.display()))?;
    Analyzer::new(&mut graph)?.run_full_analysis()?;

    if let Some(dir) = codebase_dir {
        prune_thirdparty(&mut graph, &dir)?;
    }

    save_graph(&graph, &profile_dir.join("graph.json"))?;
    write_report_file(
        &graph,
        &profile_dir.join("root.csv"),
        &root_columns(),
        &column_separator,
        vec![ROOT_LABEL.to_string()],
    )?;

    let mut tops: Vec<String> = graph.get_top_level_nodes().map(str::to_string).collect();
    tops.sort();
    write_report_file(
        &graph,
        &profile_dir.join("top_level.csv"),
        &top_level_columns(),
        &column_separator,
        tops,
    )?;

    let mut deps: Vec<String> = graph.get_dependency_nodes().map(str::to_string).collect();
    deps.sort();
    write_report_file(
        &graph,
        &profile_dir.join("dependency.csv"),
        &internal_columns(),
        &column_separator,
        deps,
    )?;

    write_project_dependencies(
        &graph,
        &profile_dir.join("project_dependencies.csv"),
        &column_separator,
    )?;

    tracing::info!("profile written to {}", profile_dir.display());
    Ok(())
}

/// Edges out of files that live outside the codebase root are pruned;
/// the first foreign file stays visible as a leaf marking the boundary.
fn prune_thirdparty(graph: &mut DependencyGraph, codebase_dir: &str) -> anyhow::Result<()> {
    let prefix = unify_path(codebase_dir);
    tracing::info!("pruning dependencies of files outside {}", prefix);
    graph.remove_dependency_by_predicate(|g, parent, _child| {
        g.attr_text(parent, Attr::AbsolutePath)
            .ok()
            .flatten()
            .is_some_and(|path| !path.starts_with(&prefix))
    });
    graph.remove_orphans();
    Analyzer::new(graph)?.update_analysis()?;
    graph.log_stats("pruned third-party dependencies");
    Ok(())
}

fn write_report_file(
    graph: &DependencyGraph,
    path: &Path,
    columns: &[Column],
    separator: &str,
    labels: Vec<String>,
) -> anyhow::Result<()> {
    tracing::info!("writing report {}", path.display());
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_report(graph, &mut out, columns, separator, labels)?;
    Ok(())
}

fn write_project_dependencies(
    graph: &DependencyGraph,
    path: &Path,
    separator: &str,
) -> anyhow::Result<()> {
    tracing::info!("writing report {}", path.display());
    let separator = unescape_separator(separator);
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "source{separator}target")?;
    for (source, target) in project_dependencies(graph)? {
        writeln!(out, "{source}{separator}{target}")?;
    }
    Ok(())
}

pub fn subgraph(
    input: PathBuf,
    label: String,
    output: PathBuf,
    dependencies: bool,
    dependants: bool,
) -> anyhow::Result<()> {
    let graph = load_graph(&input)?;
    let sub = graph
        .get_subgraph(&label, dependencies, dependants)
        .with_context(|| format!("cannot slice around \"{label}\""))?;
    sub.log_stats("extracted subgraph");
    save_graph(&sub, &output)?;
    Ok(())
}
