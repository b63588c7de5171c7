use thiserror::Error;
use tracing::warn;

/// Postgres code for a relation that does not exist.
const UNDEFINED_TABLE: &str = "42P01";

/// Failures of a store write that the operator has to see.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} table not found")]
    MissingSection(&'static str),

    #[error("no row matched {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Maps an error raised while touching `table` to `MissingSection` when the
    /// table itself is absent.
    pub fn in_section(table: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
        move |err| match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNDEFINED_TABLE) => {
                StoreError::MissingSection(table)
            }
            _ => StoreError::Database(err),
        }
    }
}

/// Reads of a missing table come back empty so the other tables still load.
pub fn missing_as_empty<T>(result: Result<Vec<T>, StoreError>) -> Result<Vec<T>, StoreError> {
    match result {
        Err(StoreError::MissingSection(table)) => {
            warn!(table, "table missing, reading it as empty");
            Ok(Vec::new())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::fmt;

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    #[derive(Debug)]
    struct PgFailure(&'static str);

    impl fmt::Display for PgFailure {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "postgres error {}", self.0)
        }
    }

    impl std::error::Error for PgFailure {}

    impl DatabaseError for PgFailure {
        fn message(&self) -> &str {
            "postgres error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    fn pg_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(PgFailure(code)))
    }

    #[test]
    fn undefined_table_becomes_missing_section() {
        let err = StoreError::in_section("leaves")(pg_error("42P01"));
        assert!(matches!(err, StoreError::MissingSection("leaves")));
        assert_eq!(err.to_string(), "leaves table not found");
    }

    #[test]
    fn other_database_errors_pass_through() {
        let err = StoreError::in_section("tasks")(pg_error("23505"));
        assert!(matches!(err, StoreError::Database(sqlx::Error::Database(_))));

        let err = StoreError::in_section("tasks")(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn missing_table_reads_as_empty() {
        let rows: Vec<String> = missing_as_empty(Err(StoreError::MissingSection("forum_reports"))).unwrap();
        assert!(rows.is_empty());

        let kept = missing_as_empty(Ok(vec!["Ash Reyes".to_string()])).unwrap();
        assert_eq!(kept, vec!["Ash Reyes"]);

        let failed = missing_as_empty::<String>(Err(StoreError::Database(sqlx::Error::PoolTimedOut)));
        assert!(matches!(failed, Err(StoreError::Database(sqlx::Error::PoolTimedOut))));
    }

    #[test]
    fn column_decode_errors_are_reported() {
        let decode = || sqlx::Error::ColumnDecode {
            index: "\"name\"".to_string(),
            source: "unexpected null".into(),
        };
        let err = StoreError::in_section("roster")(decode());
        assert!(err.to_string().starts_with("database error:"));

        let read = missing_as_empty::<String>(Err(StoreError::in_section("roster")(decode())));
        assert!(matches!(read, Err(StoreError::Database(sqlx::Error::ColumnDecode { .. }))));
    }
}
