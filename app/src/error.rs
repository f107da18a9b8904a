use err_derive::Error;
use infra::persistence::StoreError;

/// Failures surfaced by catalog operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Required input was missing or conflicts with existing data. Raised
    /// before anything is written.
    #[error(display = "validation failed: {}", _0)]
    ValidationFailed(String),
    #[error(display = "not found: {}", _0)]
    NotFound(String),
    /// The store could not be reached or a statement failed. Never retried.
    #[error(display = "storage unavailable: {}", _0)]
    StorageUnavailable(#[error(source)] StoreError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Lifts store-level failures into [`Error::StorageUnavailable`].
pub(crate) trait StorageContext<T> {
    fn storage(self) -> Result<T>;
}

impl<T> StorageContext<T> for std::result::Result<T, StoreError> {
    fn storage(self) -> Result<T> {
        self.map_err(Error::StorageUnavailable)
    }
}

impl<T> StorageContext<T> for std::result::Result<T, postgres::Error> {
    fn storage(self) -> Result<T> {
        self.map_err(|e| Error::StorageUnavailable(StoreError::Postgres(e)))
    }
}

impl<T> StorageContext<T> for std::result::Result<T, r2d2::Error> {
    fn storage(self) -> Result<T> {
        self.map_err(|e| Error::StorageUnavailable(StoreError::Pool(e)))
    }
}
