//! Attribute schema shared by the graph store, the metric engine and the
//! log parser.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Recognized node attribute keys.
///
/// The schema is closed on purpose: every producer and consumer of node
/// attributes goes through this enum, so a typo'd key is a compile error
/// rather than a silently empty report column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attr {
    /// Project that compiled the translation unit.
    Project,
    /// Unified absolute path of the file on disk.
    AbsolutePath,
    /// Compiler invocation with the source filenames stripped out.
    CompilationCommand,
    /// Compilation wall time of a translation unit, in seconds.
    BuildTime,
    /// Size of the file on disk, in bytes.
    FileSize,
    /// File size plus the sizes of everything it pulls in.
    TotalSize,
    /// Sum of build times of all translation units that pay for this file.
    TotalBuildTime,
    /// Number of translation units that pay for this file.
    TranslationUnits,
    /// Build time unexplained by the per-unit average.
    BuildTimeDev,
    /// Name of the precompiled header this unit creates.
    CreatesPch,
    /// Name of the precompiled header this unit consumes.
    UsesPch,
}

impl Attr {
    pub fn as_str(&self) -> &'static str {
        match self {
            Attr::Project => "project",
            Attr::AbsolutePath => "absolute_path",
            Attr::CompilationCommand => "compilation_command",
            Attr::BuildTime => "build_time",
            Attr::FileSize => "file_size",
            Attr::TotalSize => "total_size",
            Attr::TotalBuildTime => "total_build_time",
            Attr::TranslationUnits => "translation_units",
            Attr::BuildTimeDev => "build_time_dev",
            Attr::CreatesPch => "creates_pch",
            Attr::UsesPch => "uses_pch",
        }
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attribute value. Sizes and counts are `Int`, times and deviations are
/// `Real`, everything path- or name-like is `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(u64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(x) => Some(*x),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Real(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Real(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// Attribute bag attached to every node.
pub type Attrs = HashMap<Attr, Value>;

/// Render a byte count with a metric prefix, for log output.
pub fn pretty_filesize(size: u64) -> String {
    let mut reduced = size as f64;
    let prefixes = ["", "K", "M", "G", "T"];
    let mut idx = 0;
    while reduced >= 1000.0 && idx + 1 < prefixes.len() {
        reduced *= 0.001;
        idx += 1;
    }
    format!("{:.2}{}B", reduced, prefixes[idx])
}
