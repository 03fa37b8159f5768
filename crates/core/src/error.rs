/// Result alias that carries the custom [`PainterError`] type.
pub type Result<T> = std::result::Result<T, PainterError>;

/// Common error type for the core crate.
///
/// Only startup and configuration loading can fail. Tick handlers degrade to
/// defaults instead of returning errors.
#[derive(Debug, thiserror::Error)]
pub enum PainterError {
    /// The synthesis backend refused to confirm readiness.
    #[error("synthesis backend unavailable: {0}")]
    BackendUnavailable(String),
    /// A preset id that is not part of the built-in list.
    #[error("unknown preset `{0}`")]
    UnknownPreset(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Settings file could not be parsed or serialized.
    #[error("settings json: {0}")]
    Json(#[from] serde_json::Error),
}
