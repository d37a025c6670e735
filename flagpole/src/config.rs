use std::time::Duration;

use crate::error::FlagError;

/// Where the flag document lives and how long snapshots stay fresh.
///
/// One explicit value, validated when a client is built. Region and endpoint
/// are optional; when absent the AWS SDK's ambient resolution applies.
#[derive(Debug, Clone)]
pub struct Config {
    /// DynamoDB table holding the flag document.
    pub table_name: String,
    /// Partition key of the flag document within the table.
    pub record_name: String,
    /// AWS region override.
    pub region: Option<String>,
    /// Endpoint override, for local DynamoDB instances.
    pub endpoint_url: Option<String>,
    /// How long a fetched snapshot serves reads before the next call
    /// attempts a refresh.
    pub cache_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            table_name: "featureFlagStore".to_string(),
            record_name: "features".to_string(),
            region: None,
            endpoint_url: None,
            cache_ttl: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub(crate) fn validate(&self) -> Result<(), FlagError> {
        if self.table_name.is_empty() {
            return Err(FlagError::InvalidConfig(
                "table_name must not be empty".to_string(),
            ));
        }
        if self.record_name.is_empty() {
            return Err(FlagError::InvalidConfig(
                "record_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn empty_table_name_is_rejected() {
        let config = Config {
            table_name: String::new(),
            ..Config::default()
        };
        match config.validate() {
            Err(FlagError::InvalidConfig(_)) => (),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn empty_record_name_is_rejected() {
        let config = Config {
            record_name: String::new(),
            ..Config::default()
        };
        match config.validate() {
            Err(FlagError::InvalidConfig(_)) => (),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }
}
