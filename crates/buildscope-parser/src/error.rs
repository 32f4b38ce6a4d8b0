//! Parse-level error taxonomy. Lines that match no known shape are not
//! errors; they are skipped. These variants cover logs that match a shape
//! but violate the expected invocation ordering.

use buildscope_core::GraphError;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("multiple {switch} switches in one compiler invocation")]
    MultiplePchSwitches { switch: &'static str },

    #[error("no project set for compiled file \"{file}\" in channel {channel}")]
    MissingProject { file: String, channel: u32 },

    #[error("compiled file \"{file}\" not found in the invocation's file list [{expected}]")]
    UnexpectedFile { file: String, expected: String },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ParseError>;
