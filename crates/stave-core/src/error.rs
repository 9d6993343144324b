use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A uniqueness constraint on identity hash or native id was violated,
    /// or two distinct entities share an identity hash.
    #[error("duplicate {entity}: {detail}")]
    DuplicateEntity { entity: &'static str, detail: String },
}

impl Error {
    /// Returns `true` for invariant violations that indicate a bug in the
    /// caller's ordering rather than a broken store.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateEntity { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
