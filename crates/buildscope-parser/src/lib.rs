//! Buildscope Parser — MSVC build-log ingestion

mod channel;
pub mod error;
mod paths;
pub mod session;

#[cfg(test)]
pub mod tests;

pub use error::ParseError;
pub use paths::unify_path;
pub use session::{LogParser, parse_msvc_log};
