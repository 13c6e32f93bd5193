use std::num::ParseIntError;

use thiserror::Error;

/// A malformed edge record, pinned to the line it came from.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: expected 2 or 3 tab-separated fields, found {found} in {text:?}")]
    FieldCount { line: usize, found: usize, text: String },
    #[error("line {line}: empty node identifier in {text:?}")]
    EmptyNode { line: usize, text: String },
    #[error("line {line}: invalid edge weight {value:?} ({source})")]
    InvalidWeight {
        line: usize,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

impl ParseError {
    /// The 1-based line number of the offending record.
    pub fn line(&self) -> usize {
        match self {
            ParseError::FieldCount { line, .. }
            | ParseError::EmptyNode { line, .. }
            | ParseError::InvalidWeight { line, .. } => *line,
        }
    }
}

/// Failure while loading a graph from a reader or a file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read edge list: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
