use thiserror::Error;

/// Error taxonomy for the sync core.
///
/// Lifecycle calls fail fast with `NotFound`; storage problems are logged at
/// the point of occurrence and degrade to defaults, so `Storage` only
/// surfaces where construction itself fails. Network failures keep the
/// affected operation queued.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("local storage failure: {0}")]
    Storage(String),

    #[error("remote request failed: {0}")]
    Network(String),

    #[error("authenticated user required")]
    AuthRequired,
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Storage(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
