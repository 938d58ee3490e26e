use core_config::{ConfigError, FromEnv, env_optional, env_parse, env_parse_optional};
use database::RetryConfig;

use crate::error::{VectorError, VectorResult};
use crate::models::DistanceMetric;
use crate::upsert::COLUMNS_PER_ROW;

pub const DEFAULT_TABLE: &str = "vector_embeddings";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_NUM_RESULTS: u64 = 50;

/// Largest chunk whose upsert stays within PostgreSQL's 65535 bind parameters
pub const MAX_BATCH_SIZE: usize = u16::MAX as usize / COLUMNS_PER_ROW;

/// Settings of the vector store, independent of the connection itself
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStoreConfig {
    table: String,
    pub metric: DistanceMetric,
    pub batch_size: usize,
    pub num_results: u64,
    /// Expected embedding length; unchecked when `None`
    pub dimension: Option<usize>,
    pub retry: RetryConfig,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            metric: DistanceMetric::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            num_results: DEFAULT_NUM_RESULTS,
            dimension: None,
            retry: RetryConfig::default(),
        }
    }
}

impl VectorStoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding the embeddings. Interpolated into SQL, so it must be a
    /// plain identifier.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn with_table(mut self, table: &str) -> VectorResult<Self> {
        validate_identifier(table).map_err(VectorError::Config)?;
        self.table = table.to_string();
        Ok(self)
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> VectorResult<Self> {
        validate_batch_size(batch_size).map_err(VectorError::Config)?;
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Between 1 and [`MAX_BATCH_SIZE`]
pub fn validate_batch_size(batch_size: usize) -> Result<(), String> {
    if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
        return Err(format!(
            "batch size must be between 1 and {}, got {}",
            MAX_BATCH_SIZE, batch_size
        ));
    }
    Ok(())
}

/// `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes (PostgreSQL's NAMEDATALEN - 1)
pub fn validate_identifier(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);

    if !valid_start
        || name.len() > 63
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(format!("'{}' is not a valid table name", name));
    }
    Ok(())
}

impl FromEnv for VectorStoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let table = env_optional("VECTOR_DB_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string());
        validate_identifier(&table).map_err(|details| ConfigError::Invalid {
            key: "VECTOR_DB_TABLE".to_string(),
            details,
        })?;

        let metric = env_optional("VECTOR_SEARCH_METRIC")
            .map(|m| DistanceMetric::parse(&m))
            .unwrap_or_default();

        let batch_size: usize = env_parse("VECTOR_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        validate_batch_size(batch_size).map_err(|details| ConfigError::Invalid {
            key: "VECTOR_BATCH_SIZE".to_string(),
            details,
        })?;

        Ok(Self {
            table,
            metric,
            batch_size,
            num_results: DEFAULT_NUM_RESULTS,
            dimension: env_parse_optional("VECTOR_DIMENSION")?,
            retry: RetryConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VectorStoreConfig::default();
        assert_eq!(config.table(), "vector_embeddings");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.num_results, 50);
        assert_eq!(config.metric, DistanceMetric::Cosine);
        assert_eq!(config.dimension, None);
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("vector_embeddings").is_ok());
        assert!(validate_identifier("_docs2").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2docs").is_err());
        assert!(validate_identifier("docs; DROP TABLE sites").is_err());
        assert!(validate_identifier("public.docs").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_batch_size_bounds() {
        assert!(VectorStoreConfig::new().with_batch_size(0).is_err());
        assert!(VectorStoreConfig::new().with_batch_size(MAX_BATCH_SIZE + 1).is_err());
        assert_eq!(VectorStoreConfig::new().with_batch_size(7).unwrap().batch_size, 7);
        assert_eq!(
            VectorStoreConfig::new().with_batch_size(MAX_BATCH_SIZE).unwrap().batch_size,
            MAX_BATCH_SIZE
        );
        assert_eq!(MAX_BATCH_SIZE, 8191);
    }

    #[test]
    fn test_from_env() {
        temp_env::with_vars(
            [
                ("VECTOR_DB_TABLE", Some("site_docs")),
                ("VECTOR_SEARCH_METRIC", Some("euclidean")),
                ("VECTOR_BATCH_SIZE", Some("25")),
                ("VECTOR_DIMENSION", Some("1536")),
            ],
            || {
                let config = VectorStoreConfig::from_env().unwrap();
                assert_eq!(config.table(), "site_docs");
                assert_eq!(config.metric, DistanceMetric::Euclidean);
                assert_eq!(config.batch_size, 25);
                assert_eq!(config.dimension, Some(1536));
            },
        );
    }

    #[test]
    fn test_from_env_rejects_bad_table() {
        temp_env::with_vars([("VECTOR_DB_TABLE", Some("docs--"))], || {
            let err = VectorStoreConfig::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "VECTOR_DB_TABLE"));
        });
    }

    #[test]
    fn test_from_env_rejects_out_of_range_batch() {
        for value in ["0", "8192"] {
            temp_env::with_vars(
                [("VECTOR_DB_TABLE", None::<&str>), ("VECTOR_BATCH_SIZE", Some(value))],
                || {
                    let err = VectorStoreConfig::from_env().unwrap_err();
                    assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "VECTOR_BATCH_SIZE"));
                },
            );
        }
    }
}
