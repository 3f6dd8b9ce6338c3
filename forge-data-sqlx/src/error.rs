use forge_data::DataError;

/// Bridges `sqlx::Error` into `DataError`. Rust's orphan rules forbid
/// `impl From<sqlx::Error> for DataError` here (neither type is local
/// to this crate), so callers reach for this extension trait instead,
/// mirroring the teacher's `SqlxErrorExt` in its own `r2e-data-sqlx`.
pub trait SqlxErrorExt {
    fn into_query_error(self) -> DataError;
}

impl SqlxErrorExt for sqlx::Error {
    fn into_query_error(self) -> DataError {
        match &self {
            sqlx::Error::RowNotFound => DataError::NotFound("row not found".into()),
            _ => DataError::database(self),
        }
    }
}

pub type SqlxResult<T> = Result<T, DataError>;
