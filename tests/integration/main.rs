//! Integration tests for buildscope
//!
//! These drive the full pipeline: a build log referencing real files on
//! disk is parsed, analysed, persisted and reported on.

use std::fs;
use std::path::PathBuf;

use buildscope_core::{
    Analyzer, Attr, ROOT_LABEL, load_graph, root_columns, save_graph, write_report,
};
use buildscope_parser::LogParser;

/// Scratch directory with an all-lowercase path, so paths survive the
/// parser's case normalization on a case-sensitive filesystem.
struct Scratch {
    dir: PathBuf,
}

impl Scratch {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("buildscope_it_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        Scratch { dir }
    }

    fn file(&self, name: &str, bytes: usize) -> String {
        let path = self.dir.join(name);
        fs::write(&path, vec![b'x'; bytes]).unwrap();
        path.to_string_lossy().into_owned()
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

#[test]
fn test_profile_pipeline_end_to_end() {
    let scratch = Scratch::new("pipeline");
    let main_cpp = scratch.file("main.cpp", 40);
    let app_hpp = scratch.file("app.hpp", 10);
    let shared_hpp = scratch.file("shared.hpp", 20);
    let util_cpp = scratch.file("util.cpp", 30);

    let log = format!(
        "1>------ Rebuild All started: Project: app, Configuration: Debug x64 ------\n\
         2>------ Rebuild All started: Project: util, Configuration: Debug x64 ------\n\
         1>  cl /c /Bt+ /showIncludes /FC main.cpp\n\
         1>  main.cpp\n\
         2>  cl /c /Bt+ /showIncludes /FC util.cpp\n\
         2>  util.cpp\n\
         1>  Note: including file: {app_hpp}\n\
         1>  Note: including file:  {shared_hpp}\n\
         2>  Note: including file: {shared_hpp}\n\
         1>  time(c1xx.dll)=2.50000s < 1 - 2 > BB [{main_cpp}]\n\
         1>  time(c2.dll)=0.50000s < 3 - 4 > BB [{main_cpp}]\n\
         2>  time(c1xx.dll)=1.00000s < 5 - 6 > BB [{util_cpp}]\n"
    );

    let mut graph = LogParser::parse_reader(log.as_bytes()).unwrap();
    Analyzer::new(&mut graph).unwrap().run_full_analysis().unwrap();

    // main.cpp pulls in app.hpp and, through it, shared.hpp
    assert_eq!(graph.attr_int("main.cpp", Attr::FileSize).unwrap(), Some(40));
    assert_eq!(graph.attr_int("main.cpp", Attr::TotalSize).unwrap(), Some(70));
    assert_eq!(graph.attr_int("util.cpp", Attr::TotalSize).unwrap(), Some(50));
    assert_eq!(
        graph.attr_int("shared.hpp", Attr::TranslationUnits).unwrap(),
        Some(2)
    );
    let shared_time = graph
        .attr_real("shared.hpp", Attr::TotalBuildTime)
        .unwrap()
        .unwrap();
    assert!((shared_time - 4.0).abs() < 1e-9);
    assert_eq!(
        graph.attr_int(ROOT_LABEL, Attr::TranslationUnits).unwrap(),
        Some(2)
    );

    // persist and reload
    let graph_path = scratch.dir.join("graph.json");
    save_graph(&graph, &graph_path).unwrap();
    let restored = load_graph(&graph_path).unwrap();
    assert_eq!(restored.node_count(), graph.node_count());
    assert_eq!(restored.edge_count(), graph.edge_count());
    assert_eq!(
        restored.attr_int("shared.hpp", Attr::TranslationUnits).unwrap(),
        Some(2)
    );

    // the root summary reports the whole build
    let mut out = Vec::new();
    write_report(&restored, &mut out, &root_columns(), ",", [ROOT_LABEL]).unwrap();
    let report = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(
        lines[0],
        "label,total size [B],total build time [s],translation units"
    );
    assert_eq!(lines[1], "__ROOT__,120,4,2");
}

#[test]
fn test_subgraph_of_stored_graph() {
    let scratch = Scratch::new("subgraph");
    let main_cpp = scratch.file("main.cpp", 40);
    let app_hpp = scratch.file("app.hpp", 10);

    let log = format!(
        "1>------ Rebuild All started: Project: app, Configuration: Debug x64 ------\n\
         1>  cl /c /Bt+ /showIncludes /FC main.cpp\n\
         1>  main.cpp\n\
         1>  Note: including file: {app_hpp}\n\
         1>  time(c1xx.dll)=1.00000s < 1 - 2 > BB [{main_cpp}]\n"
    );

    let graph = LogParser::parse_reader(log.as_bytes()).unwrap();
    let stored = scratch.dir.join("graph.json");
    save_graph(&graph, &stored).unwrap();

    let loaded = load_graph(&stored).unwrap();
    let sub = loaded.get_subgraph("app.hpp", true, false).unwrap();
    let tops: Vec<&str> = sub.get_top_level_nodes().collect();
    assert_eq!(tops, vec!["app.hpp"]);
    assert!(!sub.has_node("main.cpp"));
}
