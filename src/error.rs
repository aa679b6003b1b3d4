use thiserror::Error;

/// Error
///
/// Every failure the authorization layer can surface. Storage failures are
/// carried through untouched so callers see exactly what the database said.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller handed over a query that is not shaped the way the
    /// operation requires (e.g. an album query given to the photo filter).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Raised by the Postgres store.
    #[error(transparent)]
    Storage(#[from] sqlx::Error),

    /// Raised by an injected collaborator that does not talk to storage.
    #[error("collaborator failure: {message}")]
    Collaborator { message: String },
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::Collaborator {
            message: message.into(),
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
