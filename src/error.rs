use thiserror::Error;

/// Domain failures raised by the analysis stages.
///
/// I/O and parsing failures travel as plain `anyhow` errors with context;
/// these are the conditions a caller may want to match on.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("division by zero computing {column:?} for row {row} ({key})")]
    DivisionByZero { column: String, row: usize, key: String },

    #[error("row {row}: {column:?} value {value:?} is not an integer count")]
    InvalidCount { column: String, row: usize, value: Option<String> },

    #[error("layer {layer:?} has no CRS; cannot reproject")]
    MissingCrs { layer: String },

    #[error("unrecognised CRS definition: {0}")]
    UnknownCrs(String),

    #[error("layers use different CRSs ({left} vs {right})")]
    CrsMismatch { left: String, right: String },

    #[error("layer {layer:?} is in a geographic CRS; reproject before computing areas")]
    GeographicArea { layer: String },
}
