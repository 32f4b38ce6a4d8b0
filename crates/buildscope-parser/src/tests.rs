//! Unit tests for buildscope-parser

use std::collections::BTreeSet;
use std::fs;

use buildscope_core::{Attr, DependencyGraph, ROOT_LABEL};

use crate::error::ParseError;
use crate::{LogParser, parse_msvc_log};

// Log captured from a rebuild with the cl options /Bt+ /showIncludes
// /nologo- /FC, two projects building concurrently.
const FULL_LOG: &str = r#"
1>------ Rebuild All started: Project: test, Configuration: Debug Win32 ------
2>------ Rebuild All started: Project: test-lib, Configuration: Debug Win32 ------
1>  Microsoft (R) C/C++ Optimizing Compiler Version 19.00.24215.1 for x86
1>  Copyright (C) Microsoft Corporation.  All rights reserved.
1>
1>  cl /c /ZI /nologo /W3 /WX- /Od /Oy- /D WIN32 /D _DEBUG /D _CONSOLE /D _UNICODE /D UNICODE /Gm /EHsc /RTC1 /MDd /GS /fp:precise /Zc:wchar_t /Zc:forScope /Zc:inline /Fo"Debug\\" /Fd"Debug\vc140.pdb" /Gd /TP /analyze- /errorReport:prompt /Bt+ /showIncludes /nologo- /FC test.cpp
1>cl : Command line warning D9035: option 'nologo-' has been deprecated and will be removed in a future release
1>cl : Command line warning D9025: overriding '/nologo' with '/nologo-'
1>
1>  test.cpp
2>  Microsoft (R) C/C++ Optimizing Compiler Version 19.00.24215.1 for x86
2>  Copyright (C) Microsoft Corporation.  All rights reserved.
2>
2>  cl /c /ZI /nologo /W3 /WX- /sdl /Od /Oy- /D WIN32 /D _DEBUG /D _LIB /D _UNICODE /D UNICODE /Gm /EHsc /RTC1 /MDd /GS /fp:precise /Zc:wchar_t /Zc:forScope /Zc:inline /Yc"stdafx.h" /Fp"Debug\test-lib.pch" /Fo"Debug\\" /Fd"Debug\test-lib.pdb" /Gd /TP /analyze- /errorReport:prompt /Bt+ /showIncludes /nologo- /FC stdafx.cpp
2>cl : Command line warning D9035: option 'nologo-' has been deprecated and will be removed in a future release
2>cl : Command line warning D9025: overriding '/nologo' with '/nologo-'
2>
2>  stdafx.cpp
1>  Note: including file: d:\work\test\test\test.hpp
1>  Note: including file: d:\work\test\test\test2.hpp
2>  Note: including file: d:\work\test\test-lib\stdafx.h
2>  Note: including file:  d:\work\test\test-lib\test-lib.hpp
2>  Note: including file:  d:\work\test\test-lib\test-lib2.hpp
1>  time(C:\Program Files (x86)\Microsoft Visual Studio 14.0\VC\bin\amd64_x86\c1xx.dll)=0.03792s < 2653389603198 - 2653389729403 > BB [D:\work\test\test\test.cpp]
1>  time(C:\Program Files (x86)\Microsoft Visual Studio 14.0\VC\bin\amd64_x86\c2.dll)=0.00622s < 2653389737407 - 2653389758113 > BB [D:\work\test\test\test.cpp]
2>  time(C:\Program Files (x86)\Microsoft Visual Studio 14.0\VC\bin\amd64_x86\c1xx.dll)=0.04680s < 2653389639004 - 2653389794759 > BB [D:\work\test\test-lib\stdafx.cpp]
2>  time(C:\Program Files (x86)\Microsoft Visual Studio 14.0\VC\bin\amd64_x86\c2.dll)=0.00455s < 2653389801855 - 2653389816992 > BB [D:\work\test\test-lib\stdafx.cpp]
2>  test-lib.vcxproj -> D:\work\test\Debug\test-lib.lib
1>  test.vcxproj -> D:\work\test\Debug\test.exe
1>  test.vcxproj -> D:\work\test\Debug\test.pdb (Full PDB)
========== Rebuild All: 2 succeeded, 0 failed, 0 skipped ==========
"#;

// Same build without the extra cl options: no invocation, include or
// timing lines, only project banners and compiled-file announcements.
const MINIMAL_LOG: &str = r#"
1>------ Rebuild All started: Project: test, Configuration: Debug Win32 ------
2>------ Rebuild All started: Project: test-lib, Configuration: Debug Win32 ------
1>  test.cpp
2>  stdafx.cpp
2>  test-lib.vcxproj -> D:\work\test\Debug\test-lib.lib
1>  test.vcxproj -> D:\work\test\Debug\test.exe
1>  test.vcxproj -> D:\work\test\Debug\test.pdb (Full PDB)
========== Rebuild All: 2 succeeded, 0 failed, 0 skipped ==========
"#;

// Two projects compile a file with the same basename from different
// directories, and share one header while disagreeing on another.
const DUPLICATED_LABELS_LOG: &str = r#"
1>------ Rebuild All started: Project: test, Configuration: Debug Win32 ------
2>------ Rebuild All started: Project: test-lib, Configuration: Debug Win32 ------
1>  cl /c /ZI /nologo /W3 /WX- /Bt+ /showIncludes /nologo- /FC test.cpp
1>  test.cpp
2>  cl /c /ZI /nologo /W3 /WX- /Bt+ /showIncludes /nologo- /FC test.cpp
2>  test.cpp
1>  Note: including file: d:\work\test\test\test-same.hpp
1>  Note: including file: d:\work\test\test\test-different.hpp
2>  Note: including file: d:\work\test\test\test-same.hpp
2>  Note: including file: d:\work\test\test-other\test-different.hpp
1>  time(C:\Program Files (x86)\Microsoft Visual Studio 14.0\VC\bin\amd64_x86\c1xx.dll)=0.03792s < 2653389603198 - 2653389729403 > BB [D:\work\test\test\test.cpp]
1>  time(C:\Program Files (x86)\Microsoft Visual Studio 14.0\VC\bin\amd64_x86\c2.dll)=0.00622s < 2653389737407 - 2653389758113 > BB [D:\work\test\test\test.cpp]
2>  time(C:\Program Files (x86)\Microsoft Visual Studio 14.0\VC\bin\amd64_x86\c1xx.dll)=0.04680s < 2653389639004 - 2653389794759 > BB [D:\work\test\test-other\test.cpp]
2>  time(C:\Program Files (x86)\Microsoft Visual Studio 14.0\VC\bin\amd64_x86\c2.dll)=0.00455s < 2653389801855 - 2653389816992 > BB [D:\work\test\test-other\test.cpp]
========== Rebuild All: 2 succeeded, 0 failed, 0 skipped ==========
"#;

// One project, three compiles: a PCH creator, a file that ignores the
// PCH, and a consumer whose includes are all satisfied by the PCH.
const PCH_LOG: &str = r#"
1>------ Rebuild All started: Project: test, Configuration: Debug x64 ------
1>  cl /c /Zi /nologo /W3 /WX- /MP /Od /Gm /EHsc /RTC1 /MDd /GS /Yc"pch.h" /Fp"x64\Debug\test.pch" /Fo"x64\Debug\\" /Gd /TP /Bt+ /showIncludes /nologo- /FC pch.cpp
1>  pch.cpp
1>  Note: including file: d:\work\test\test\pch.h
1>  Note: including file:  d:\work\test\test\in-pch.h
1>  time(C:\Program Files (x86)\Microsoft Visual Studio 11.0\VC\bin\AMD64\c1xx.dll)=0.03300s < 1806376904715 - 1806377014532 > BB [D:\work\test\test\pch.cpp]
1>  time(C:\Program Files (x86)\Microsoft Visual Studio 11.0\VC\bin\AMD64\c2.dll)=0.00463s < 1806377017447 - 1806377032857 > BB [D:\work\test\test\pch.cpp]
1>  cl /c /Zi /nologo /W3 /WX- /MP /Od /Gm /EHsc /RTC1 /MDd /GS /Fo"x64\Debug\\" /Gd /TP /Bt+ /showIncludes /nologo- /FC "doesnt-use-pch.cpp"
1>  doesnt-use-pch.cpp
1>  Note: including file: d:\work\test\test\not-in-pch.h
1>  Note: including file:  d:\work\test\test\in-pch.h
1>  time(C:\Program Files (x86)\Microsoft Visual Studio 11.0\VC\bin\AMD64\c1xx.dll)=0.01835s < 1806377197600 - 1806377258685 > BB [D:\work\test\test\doesnt-use-pch.cpp]
1>  time(C:\Program Files (x86)\Microsoft Visual Studio 11.0\VC\bin\AMD64\c2.dll)=0.00420s < 1806377261413 - 1806377275378 > BB [D:\work\test\test\doesnt-use-pch.cpp]
1>  cl /c /Zi /nologo /W3 /WX- /MP /Od /Gm /EHsc /RTC1 /MDd /GS /Yu"pch.h" /Fp"x64\Debug\test.pch" /Fo"x64\Debug\\" /Gd /TP /Bt+ /showIncludes /nologo- /FC "uses-pch.cpp"
1>  uses-pch.cpp
1>  time(C:\Program Files (x86)\Microsoft Visual Studio 11.0\VC\bin\AMD64\c1xx.dll)=0.01282s < 1806377423653 - 1806377466324 > BB [D:\work\test\test\uses-pch.cpp]
1>  time(C:\Program Files (x86)\Microsoft Visual Studio 11.0\VC\bin\AMD64\c2.dll)=0.00431s < 1806377469258 - 1806377483587 > BB [D:\work\test\test\uses-pch.cpp]
1>  test.vcxproj -> D:\work\test\x64\Debug\test.exe
========== Rebuild All: 1 succeeded, 0 failed, 0 skipped ==========
"#;

// The consumer names one include the PCH already covers and one it does
// not; only the latter may become an edge.
const PCH_SUPPRESSION_LOG: &str = r#"
1>------ Build started: Project: test, Configuration: Debug x64 ------
1>  cl /c /Yc"pch.h" /Bt+ /showIncludes /FC pch.cpp
1>  pch.cpp
1>  Note: including file: d:\work\test\pch.h
1>  Note: including file:  d:\work\test\in-pch.h
1>  time(C:\VC\bin\c1xx.dll)=0.10000s < 1 - 2 > BB [D:\work\test\pch.cpp]
1>  cl /c /Yu"pch.h" /Bt+ /showIncludes /FC user.cpp
1>  user.cpp
1>  Note: including file: d:\work\test\in-pch.h
1>  Note: including file: d:\work\test\extra.h
1>  time(C:\VC\bin\c1xx.dll)=0.20000s < 3 - 4 > BB [D:\work\test\user.cpp]
"#;

fn parse(log: &str) -> DependencyGraph {
    LogParser::parse_reader(log.as_bytes()).unwrap()
}

fn node_labels(graph: &DependencyGraph) -> BTreeSet<String> {
    graph.nodes().map(|(label, _)| label.to_string()).collect()
}

fn edge_pairs(graph: &DependencyGraph) -> BTreeSet<(String, String)> {
    graph
        .edges()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

fn labels(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn edges(items: &[(&str, &str)]) -> BTreeSet<(String, String)> {
    items
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

#[test]
fn test_parses_full_build_log() {
    let graph = parse(FULL_LOG);

    assert_eq!(
        node_labels(&graph),
        labels(&[
            ROOT_LABEL,
            "test.cpp",
            "test.hpp",
            "test2.hpp",
            "stdafx.cpp",
            "stdafx.h",
            "test-lib.hpp",
            "test-lib2.hpp",
        ])
    );
    assert_eq!(
        edge_pairs(&graph),
        edges(&[
            (ROOT_LABEL, "test.cpp"),
            ("test.cpp", "test.hpp"),
            ("test.cpp", "test2.hpp"),
            (ROOT_LABEL, "stdafx.cpp"),
            ("stdafx.cpp", "stdafx.h"),
            ("stdafx.h", "test-lib.hpp"),
            ("stdafx.h", "test-lib2.hpp"),
        ])
    );

    assert_eq!(
        graph.attr_text("test.cpp", Attr::Project).unwrap(),
        Some("test")
    );
    assert_eq!(
        graph.attr_text("test.cpp", Attr::CompilationCommand).unwrap(),
        Some(
            r#"cl /c /ZI /nologo /W3 /WX- /Od /Oy- /D WIN32 /D _DEBUG /D _CONSOLE /D _UNICODE /D UNICODE /Gm /EHsc /RTC1 /MDd /GS /fp:precise /Zc:wchar_t /Zc:forScope /Zc:inline /Fo"Debug\\" /Fd"Debug\vc140.pdb" /Gd /TP /analyze- /errorReport:prompt /Bt+ /showIncludes /nologo- /FC"#
        )
    );
    // front-end and back-end phase times are summed
    let build_time = graph.attr_real("test.cpp", Attr::BuildTime).unwrap().unwrap();
    assert!((build_time - 0.04414).abs() < 1e-9);
    assert_eq!(
        graph.attr_text("test.cpp", Attr::AbsolutePath).unwrap(),
        Some("d:/work/test/test/test.cpp")
    );

    assert_eq!(
        graph.attr_text("stdafx.cpp", Attr::Project).unwrap(),
        Some("test-lib")
    );
    assert_eq!(
        graph.attr_text("stdafx.cpp", Attr::CreatesPch).unwrap(),
        Some("stdafx.h")
    );

    // headers carry a path but no compilation attributes
    assert!(!graph
        .has_attribute("test.hpp", Attr::CompilationCommand)
        .unwrap());
    assert!(!graph.has_attribute("test.hpp", Attr::BuildTime).unwrap());
    assert_eq!(
        graph.attr_text("test.hpp", Attr::AbsolutePath).unwrap(),
        Some("d:/work/test/test/test.hpp")
    );
}

#[test]
fn test_parses_minimal_build_log() {
    let graph = parse(MINIMAL_LOG);

    assert_eq!(
        node_labels(&graph),
        labels(&[ROOT_LABEL, "test.cpp", "stdafx.cpp"])
    );
    assert_eq!(
        edge_pairs(&graph),
        edges(&[(ROOT_LABEL, "test.cpp"), (ROOT_LABEL, "stdafx.cpp")])
    );
    assert!(!graph
        .has_attribute("test.cpp", Attr::CompilationCommand)
        .unwrap());
    assert!(!graph.has_attribute("test.cpp", Attr::BuildTime).unwrap());
    assert_eq!(
        graph.attr_text("test.cpp", Attr::Project).unwrap(),
        Some("test")
    );
}

#[test]
fn test_disambiguates_duplicate_basenames() {
    let graph = parse(DUPLICATED_LABELS_LOG);

    assert_eq!(
        node_labels(&graph),
        labels(&[
            ROOT_LABEL,
            "test.cpp",
            "test.cpp_1",
            "test-same.hpp",
            "test-different.hpp",
            "test-different.hpp_1",
        ])
    );
    assert_eq!(
        edge_pairs(&graph),
        edges(&[
            (ROOT_LABEL, "test.cpp"),
            (ROOT_LABEL, "test.cpp_1"),
            ("test.cpp", "test-same.hpp"),
            ("test.cpp", "test-different.hpp"),
            ("test.cpp_1", "test-same.hpp"),
            ("test.cpp_1", "test-different.hpp_1"),
        ])
    );

    assert_eq!(
        graph.attr_text("test.cpp", Attr::AbsolutePath).unwrap(),
        Some("d:/work/test/test/test.cpp")
    );
    assert_eq!(
        graph.attr_text("test.cpp_1", Attr::AbsolutePath).unwrap(),
        Some("d:/work/test/test-other/test.cpp")
    );
    assert_eq!(
        graph.attr_text("test-same.hpp", Attr::AbsolutePath).unwrap(),
        Some("d:/work/test/test/test-same.hpp")
    );
    assert_eq!(
        graph
            .attr_text("test-different.hpp", Attr::AbsolutePath)
            .unwrap(),
        Some("d:/work/test/test/test-different.hpp")
    );
    assert_eq!(
        graph
            .attr_text("test-different.hpp_1", Attr::AbsolutePath)
            .unwrap(),
        Some("d:/work/test/test-other/test-different.hpp")
    );
}

#[test]
fn test_parses_pch_switches() {
    let graph = parse(PCH_LOG);

    assert_eq!(
        node_labels(&graph),
        labels(&[
            ROOT_LABEL,
            "pch.cpp",
            "pch.h",
            "doesnt-use-pch.cpp",
            "not-in-pch.h",
            "uses-pch.cpp",
            "in-pch.h",
        ])
    );
    assert_eq!(
        edge_pairs(&graph),
        edges(&[
            (ROOT_LABEL, "pch.cpp"),
            (ROOT_LABEL, "doesnt-use-pch.cpp"),
            (ROOT_LABEL, "uses-pch.cpp"),
            ("pch.cpp", "pch.h"),
            ("pch.h", "in-pch.h"),
            ("doesnt-use-pch.cpp", "not-in-pch.h"),
            ("not-in-pch.h", "in-pch.h"),
        ])
    );

    assert_eq!(
        graph.attr_text("pch.cpp", Attr::CreatesPch).unwrap(),
        Some("pch.h")
    );
    assert!(!graph.has_attribute("pch.cpp", Attr::UsesPch).unwrap());
    assert_eq!(
        graph.attr_text("uses-pch.cpp", Attr::UsesPch).unwrap(),
        Some("pch.h")
    );
    assert!(!graph.has_attribute("uses-pch.cpp", Attr::CreatesPch).unwrap());
    for header in ["pch.h", "not-in-pch.h", "in-pch.h", "doesnt-use-pch.cpp"] {
        assert!(!graph.has_attribute(header, Attr::CreatesPch).unwrap());
        assert!(!graph.has_attribute(header, Attr::UsesPch).unwrap());
    }
}

#[test]
fn test_pch_consumer_edges_are_suppressed() {
    let graph = parse(PCH_SUPPRESSION_LOG);

    assert!(graph.has_dependency("pch.cpp", "in-pch.h"));
    // the consumer reaches in-pch.h only through the PCH
    assert!(!graph.has_dependency("user.cpp", "in-pch.h"));
    assert!(graph.has_dependency("user.cpp", "extra.h"));
}

#[test]
fn test_compiled_file_without_project_is_fatal() {
    let err = LogParser::parse_reader("1>  test.cpp\n".as_bytes()).unwrap_err();
    assert!(matches!(
        err,
        ParseError::MissingProject { file, channel: 1 } if file == "test.cpp"
    ));
}

#[test]
fn test_compiled_file_outside_invocation_list_is_fatal() {
    let log = "1>------ Build started: Project: test, Configuration: Debug x64 ------\n\
               1>  cl /c /FC other.cpp\n\
               1>  test.cpp\n";
    let err = LogParser::parse_reader(log.as_bytes()).unwrap_err();
    assert!(matches!(
        err,
        ParseError::UnexpectedFile { file, .. } if file == "test.cpp"
    ));
}

#[test]
fn test_repeated_pch_switch_is_fatal() {
    let log = r#"1>  cl /c /Yu"a.h" /Yu"b.h" /FC test.cpp"#;
    let err = LogParser::parse_reader(log.as_bytes()).unwrap_err();
    assert!(matches!(
        err,
        ParseError::MultiplePchSwitches { switch: "/Yu" }
    ));
}

#[test]
fn test_lines_without_channel_prefix_are_ignored() {
    let log = "no channel here\n========== Build: done ==========\n";
    let graph = parse(log);
    // just the root
    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn test_parse_log_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("build.log");
    fs::write(&path, MINIMAL_LOG).unwrap();

    let graph = parse_msvc_log(&path).unwrap();
    assert_eq!(
        node_labels(&graph),
        labels(&[ROOT_LABEL, "test.cpp", "stdafx.cpp"])
    );
}
