use std::time::Duration;

/// Runtime configuration for the server binary
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Domain used when minting room ids through the HTTP surface
    pub domain: String,
    /// Upper bound on how long a sync request may wait for an event
    pub max_sync_timeout: Duration,
    /// Length of randomly generated id local parts
    pub id_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            domain: "localhost".to_string(),
            max_sync_timeout: Duration::from_millis(30_000),
            id_length: 16,
        }
    }
}

impl ServerConfig {
    /// Reads configuration from `ROOMSTREAM_*` environment variables,
    /// falling back to defaults for anything missing or unparseable
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_sync_timeout = std::env::var("ROOMSTREAM_SYNC_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_sync_timeout);

        let id_length = std::env::var("ROOMSTREAM_ID_LENGTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|len: &usize| *len > 0)
            .unwrap_or(defaults.id_length);

        Self {
            bind_addr: std::env::var("ROOMSTREAM_BIND_ADDR").unwrap_or(defaults.bind_addr),
            domain: std::env::var("ROOMSTREAM_DOMAIN").unwrap_or(defaults.domain),
            max_sync_timeout,
            id_length,
        }
    }

    /// Clamps a client-requested sync timeout to the configured maximum
    pub fn sync_timeout(&self, requested_ms: Option<u64>) -> Duration {
        match requested_ms {
            Some(ms) => Duration::from_millis(ms).min(self.max_sync_timeout),
            None => self.max_sync_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_timeout_is_clamped() {
        let config = ServerConfig::default();

        assert_eq!(
            config.sync_timeout(Some(500)),
            Duration::from_millis(500)
        );
        assert_eq!(
            config.sync_timeout(Some(10_000_000)),
            config.max_sync_timeout
        );
        assert_eq!(config.sync_timeout(None), config.max_sync_timeout);
    }
}
