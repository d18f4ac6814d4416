use std::time::Duration;

use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    Error as SqlxError,
};

// Batch jobs connect directly to postgres, not via a bouncer, so pools stay
// small and acquisition fails fast.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

pub async fn get_pool(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT)
        .idle_timeout(DEFAULT_IDLE_TIMEOUT)
        .test_before_acquire(true)
        .connect(url)
        .await
}

/// Determines if a sqlx::Error is a unique constraint violation. Idempotent
/// inserts treat these as "already present", not failures.
pub fn is_unique_violation(error: &SqlxError) -> bool {
    match error {
        SqlxError::Database(db_error) => {
            // 23505 = unique_violation
            // See: https://www.postgresql.org/docs/current/errcodes-appendix.html
            if let Some(code) = db_error.code() {
                code.as_ref() == "23505"
            } else {
                db_error
                    .message()
                    .to_lowercase()
                    .contains("unique constraint")
            }
        }
        _ => false,
    }
}

/// Determines if a sqlx::Error means the store is unreachable rather than the
/// query being wrong. Connectivity failures are logged and the batch moves on.
pub fn is_connectivity_error(error: &SqlxError) -> bool {
    match error {
        SqlxError::Io(_) | SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Tls(_) => {
            true
        }
        SqlxError::Database(db_error) => {
            if let Some(code) = db_error.code() {
                // Class 08 — Connection Exception; 57P01/57P02/57P03 — server shutdown
                let code = code.as_ref();
                code.starts_with("08") || code.starts_with("57P")
            } else {
                let msg = db_error.message().to_lowercase();
                msg.contains("connection") || msg.contains("terminating")
            }
        }
        SqlxError::Protocol(msg) => msg.to_lowercase().contains("connection"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{borrow::Cow, error::Error as StdError, fmt};

    #[derive(Debug)]
    struct MockDbError {
        msg: &'static str,
        code: Option<&'static str>,
        kind: ErrorKind,
    }

    impl fmt::Display for MockDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.msg)
        }
    }

    impl StdError for MockDbError {}

    impl DatabaseError for MockDbError {
        fn message(&self) -> &str {
            self.msg
        }
        fn kind(&self) -> ErrorKind {
            match self.kind {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                ErrorKind::ForeignKeyViolation => ErrorKind::ForeignKeyViolation,
                _ => ErrorKind::Other,
            }
        }
        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::from)
        }
        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }
        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }
        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }
    }

    fn db_err(msg: &'static str, code: Option<&'static str>, kind: ErrorKind) -> SqlxError {
        SqlxError::from(MockDbError { msg, code, kind })
    }

    #[test]
    fn test_unique_violation_with_sqlstate() {
        let unique = db_err(
            "duplicate key value violates unique constraint \"protein_hash_key\"",
            Some("23505"),
            ErrorKind::UniqueViolation,
        );
        assert!(is_unique_violation(&unique));

        let fk = db_err(
            "insert violates foreign key constraint",
            Some("23503"),
            ErrorKind::ForeignKeyViolation,
        );
        assert!(!is_unique_violation(&fk));
    }

    #[test]
    fn test_unique_violation_message_fallback() {
        let unique = db_err(
            "duplicate key value violates unique constraint",
            None,
            ErrorKind::UniqueViolation,
        );
        assert!(is_unique_violation(&unique));
    }

    #[test]
    fn test_connectivity_errors() {
        assert!(is_connectivity_error(&SqlxError::PoolTimedOut));
        assert!(is_connectivity_error(&SqlxError::PoolClosed));

        let io_error = SqlxError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert!(is_connectivity_error(&io_error));

        let conn = db_err(
            "connection dropped unexpectedly",
            Some("08006"),
            ErrorKind::Other,
        );
        assert!(is_connectivity_error(&conn));

        let shutdown = db_err(
            "terminating connection due to administrator command",
            Some("57P01"),
            ErrorKind::Other,
        );
        assert!(is_connectivity_error(&shutdown));
    }

    #[test]
    fn test_query_errors_are_not_connectivity_errors() {
        assert!(!is_connectivity_error(&SqlxError::RowNotFound));

        let syntax = db_err(
            "syntax error at or near \"SELECT\"",
            Some("42601"),
            ErrorKind::Other,
        );
        assert!(!is_connectivity_error(&syntax));

        let unique = db_err(
            "duplicate key value violates unique constraint",
            Some("23505"),
            ErrorKind::UniqueViolation,
        );
        assert!(!is_connectivity_error(&unique));
    }
}
