use std::io;

use thiserror::Error;

/// Problems in the upstream snapshot that the run must not paper over.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataIntegrityError {
    #[error("duplicate trend entry for entity {entity} in year {year} ({scope})")]
    DuplicateTrendYear {
        scope: String,
        entity: String,
        year: u16,
    },
    #[error("{table} references unknown entity {entity}")]
    UnknownEntity { table: String, entity: String },
    #[error("{table} references unknown country {country}")]
    UnknownCountry { table: String, country: String },
    #[error("duplicate {kind} id {entity}")]
    DuplicateEntity { kind: String, entity: String },
    #[error("duplicate work count for country {country} and entity {entity}")]
    DuplicateCount { country: String, entity: String },
}

#[derive(Error, Debug)]
pub enum FieldmapError {
    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),

    #[error("similarity needs at least 2 entities, corpus has {size}")]
    InsufficientCorpus { size: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing required table {0}")]
    MissingTable(String),

    #[error("csv error in {table}: {source}")]
    Csv {
        table: String,
        #[source]
        source: csv::Error,
    },

    #[error("json error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_path_to_error::Error<serde_json::Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<phrase_vec::ConfigError> for FieldmapError {
    fn from(e: phrase_vec::ConfigError) -> Self {
        FieldmapError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FieldmapError>;
