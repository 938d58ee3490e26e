/// Unified database error type for all database operations
///
/// Every driver error is classified on conversion into one of two families:
/// [`DatabaseError::Transient`] (connectivity-class, worth retrying) or a
/// permanent failure that must surface immediately. The type is `Clone` so a
/// single failed pool initialization can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatabaseError {
    /// Missing or malformed connection settings. Never retried.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Connection reset, timeout, pool exhaustion, server restarting.
    #[error("Transient database error: {0}")]
    Transient(String),

    /// Constraint violations, malformed SQL, decode errors. Never retried.
    #[error("Query execution failed: {0}")]
    Query(String),

    /// The pool was closed and cannot hand out connections anymore
    #[error("Connection pool is closed")]
    PoolClosed,

    /// Health check failed
    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    /// Redis command failed for a non-connectivity reason
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(String),
}

impl DatabaseError {
    /// Whether the operation that produced this error may succeed when retried
    pub fn is_transient(&self) -> bool {
        matches!(self, DatabaseError::Transient(_))
    }
}

/// Result type alias for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(feature = "postgres")]
mod postgres {
    use super::DatabaseError;
    use sea_orm::{DbErr, RuntimeErr, SqlxError};

    /// SQLSTATE classes and codes that indicate the server or the link to it
    /// is temporarily unable to serve the statement.
    fn is_transient_sqlstate(code: &str) -> bool {
        code.starts_with("08") // connection exception
            || code.starts_with("53") // insufficient resources
            || code.starts_with("XX") // internal error
            || matches!(code, "57P01" | "57P02" | "57P03" | "40001" | "40P01")
    }

    fn classify_sqlx(err: &SqlxError) -> DatabaseError {
        match err {
            SqlxError::Io(_)
            | SqlxError::Tls(_)
            | SqlxError::Protocol(_)
            | SqlxError::PoolTimedOut
            | SqlxError::PoolClosed
            | SqlxError::WorkerCrashed => DatabaseError::Transient(err.to_string()),
            SqlxError::Configuration(_) => DatabaseError::ConfigError(err.to_string()),
            SqlxError::Database(db_err) => match db_err.code() {
                Some(code) if is_transient_sqlstate(&code) => {
                    DatabaseError::Transient(format!("[{code}] {}", db_err.message()))
                }
                Some(code) => DatabaseError::Query(format!("[{code}] {}", db_err.message())),
                None => DatabaseError::Query(db_err.message().to_string()),
            },
            _ => DatabaseError::Query(err.to_string()),
        }
    }

    fn classify_runtime(err: &RuntimeErr) -> DatabaseError {
        match err {
            RuntimeErr::SqlxError(e) => classify_sqlx(e),
            // Driver-internal faults (lost connection state, broken pipe on the wire).
            RuntimeErr::Internal(msg) => DatabaseError::Transient(msg.clone()),
            #[allow(unreachable_patterns)]
            _ => DatabaseError::Query(err.to_string()),
        }
    }

    impl From<DbErr> for DatabaseError {
        fn from(err: DbErr) -> Self {
            match &err {
                DbErr::ConnectionAcquire(_) => DatabaseError::Transient(err.to_string()),
                DbErr::Conn(runtime) | DbErr::Exec(runtime) | DbErr::Query(runtime) => {
                    classify_runtime(runtime)
                }
                _ => DatabaseError::Query(err.to_string()),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_transient_sqlstates() {
            for code in ["08006", "08001", "53300", "57P01", "57P03", "40001", "40P01", "XX000"] {
                assert!(is_transient_sqlstate(code), "{code} should be transient");
            }
            for code in ["23505", "42601", "42P01", "22P02"] {
                assert!(!is_transient_sqlstate(code), "{code} should be permanent");
            }
        }

        #[test]
        fn test_connection_acquire_is_transient() {
            let err: DatabaseError =
                DbErr::ConnectionAcquire(sea_orm::ConnAcquireErr::Timeout).into();
            assert!(err.is_transient());
        }

        #[test]
        fn test_pool_timeout_is_transient() {
            let err = classify_sqlx(&SqlxError::PoolTimedOut);
            assert!(err.is_transient());
        }

        #[test]
        fn test_row_not_found_is_permanent() {
            let err = classify_sqlx(&SqlxError::RowNotFound);
            assert!(matches!(err, DatabaseError::Query(_)));
        }

        #[test]
        fn test_custom_error_is_permanent() {
            let err: DatabaseError = DbErr::Custom("bad input".to_string()).into();
            assert!(!err.is_transient());
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for DatabaseError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_timeout()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
        {
            DatabaseError::Transient(err.to_string())
        } else {
            DatabaseError::Redis(err.to_string())
        }
    }
}
