//! Tabular (CSV-ish) report output.

use std::io::Write;

use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::model::{Attr, Value};

/// One report column: the attribute to read, its header title, and the
/// value printed when a node lacks the attribute.
pub struct Column {
    pub key: Attr,
    pub title: &'static str,
    pub default: Value,
}

impl Column {
    fn new(key: Attr, title: &'static str, default: impl Into<Value>) -> Self {
        Column {
            key,
            title,
            default: default.into(),
        }
    }
}

/// Columns for the single-row root summary.
pub fn root_columns() -> Vec<Column> {
    vec![
        Column::new(Attr::TotalSize, "total size [B]", 0u64),
        Column::new(Attr::TotalBuildTime, "total build time [s]", 0.0),
        Column::new(Attr::TranslationUnits, "translation units", 0u64),
    ]
}

/// Columns for the translation-unit report.
pub fn top_level_columns() -> Vec<Column> {
    vec![
        Column::new(Attr::Project, "project", ""),
        Column::new(Attr::AbsolutePath, "absolute path", ""),
        Column::new(Attr::FileSize, "file size [B]", 0u64),
        Column::new(Attr::TotalSize, "total size [B]", 0u64),
        Column::new(Attr::BuildTime, "build time [s]", 0.0),
        Column::new(Attr::CreatesPch, "creates precompiled header", ""),
        Column::new(Attr::UsesPch, "uses precompiled header", ""),
    ]
}

/// Columns for the dependency (header) report.
pub fn internal_columns() -> Vec<Column> {
    vec![
        Column::new(Attr::AbsolutePath, "absolute path", ""),
        Column::new(Attr::FileSize, "file size [B]", 0u64),
        Column::new(Attr::TotalSize, "total size [B]", 0u64),
        Column::new(Attr::TotalBuildTime, "total build time of dependants [s]", 0.0),
        Column::new(
            Attr::TranslationUnits,
            "number of dependent translation units",
            0u64,
        ),
        Column::new(
            Attr::BuildTimeDev,
            "aggregated build time deviation [s]",
            0.0,
        ),
    ]
}

/// Turn the escape sequences `\t` and `\n` in a user-supplied separator
/// into the characters they name.
pub fn unescape_separator(separator: &str) -> String {
    separator.replace("\\t", "\t").replace("\\n", "\n")
}

/// Write one row per label, in the order given. Missing attributes fall
/// back to the column default; a label that is not in the graph is an
/// error.
pub fn write_report<W, I, S>(
    graph: &DependencyGraph,
    out: &mut W,
    columns: &[Column],
    separator: &str,
    labels: I,
) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let separator = unescape_separator(separator);
    write!(out, "label")?;
    for column in columns {
        write!(out, "{}{}", separator, column.title)?;
    }
    writeln!(out)?;
    for label in labels {
        let label = label.as_ref();
        write!(out, "{label}")?;
        for column in columns {
            match graph.get_attribute(label, column.key)? {
                Some(value) => write!(out, "{separator}{value}")?,
                None => write!(out, "{}{}", separator, column.default)?,
            }
        }
        writeln!(out)?;
    }
    Ok(())
}
