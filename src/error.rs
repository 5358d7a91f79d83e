use crate::repo::RepoError;

#[derive(thiserror::Error, Debug)]
pub enum PostError {
    #[error("{0}")]
    Validation(String),
    /// Target absent or owned by someone else; the two are never
    /// distinguished to the caller.
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A failed deletion. The storage warning travels independently of the
/// primary error: storage cleanup may have partially succeeded even though
/// the row delete failed, and that is surfaced rather than hidden.
#[derive(thiserror::Error, Debug)]
#[error("{source}")]
pub struct DeleteFailure {
    #[source]
    pub source: PostError,
    pub storage_warning: Option<String>,
}
