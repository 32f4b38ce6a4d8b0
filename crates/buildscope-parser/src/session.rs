//! Parser session: channel demultiplexing over a build log.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use buildscope_core::DependencyGraph;
use indexmap::IndexMap;
use regex::Regex;

use crate::channel::ChannelState;
use crate::error::Result;

static CHANNEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)>").unwrap());

/// One parse session over an interleaved multi-channel log. Channel state
/// machines are created lazily on first sight of their id.
#[derive(Default)]
pub struct LogParser {
    channels: IndexMap<u32, ChannelState>,
}

impl LogParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one log line. Lines without a channel prefix are ignored.
    pub fn feed(&mut self, line: &str, graph: &mut DependencyGraph) -> Result<()> {
        let line = line.trim_end();
        let Some(caps) = CHANNEL_RE.captures(line) else {
            return Ok(());
        };
        let Ok(channel) = caps[1].parse::<u32>() else {
            return Ok(());
        };
        self.channels
            .entry(channel)
            .or_insert_with(|| ChannelState::new(channel))
            .parse_line(line, graph)
    }

    /// Drain trailing pending nodes from every channel.
    pub fn finish(&mut self, graph: &mut DependencyGraph) -> Result<()> {
        for (_, channel) in self.channels.iter_mut() {
            channel.flush(graph)?;
        }
        Ok(())
    }

    pub fn parse_reader<R: BufRead>(reader: R) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::new();
        let mut parser = LogParser::new();
        for line in reader.lines() {
            parser.feed(&line?, &mut graph)?;
        }
        parser.finish(&mut graph)?;
        graph.log_stats("parsed build log");
        Ok(graph)
    }
}

/// Parse an MSVC build log file into a dependency graph.
pub fn parse_msvc_log(path: &Path) -> Result<DependencyGraph> {
    tracing::info!("parsing build log {}", path.display());
    let file = File::open(path)?;
    LogParser::parse_reader(BufReader::new(file))
}
