//! Error types shared by the loaders, the build codec and the outer surfaces.

use thiserror::Error;

/// Failure while reading catalog, team or workbook input, or writing a trace.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("workbook error: {0}")]
    Workbook(String),

    #[error("workbook is missing sheet '{0}'")]
    MissingSheet(String),

    #[error("unknown {kind} '{name}'")]
    UnknownReference { kind: &'static str, name: String },

    #[error("team must have exactly 3 members, found {0}")]
    TeamSize(usize),
}

impl From<calamine::Error> for CatalogError {
    fn from(err: calamine::Error) -> Self {
        Self::Workbook(err.to_string())
    }
}

/// Failure while decoding a shareable build string.
#[derive(Debug, Error)]
pub enum BuildCodeError {
    #[error("malformed build: found {0} sections; expected 5")]
    SectionCount(usize),

    #[error("build contains no usable member rows")]
    NoMembers,
}

/// A definition record that could not be normalized. These are collected and
/// reported; loading continues without the record.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed {table} record '{name}': {reason}")]
pub struct MalformedDefinition {
    pub table: &'static str,
    pub name: String,
    pub reason: String,
}

impl MalformedDefinition {
    pub fn new(table: &'static str, name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            table,
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
