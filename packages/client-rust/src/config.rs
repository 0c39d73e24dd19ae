use std::path::PathBuf;
use std::time::Duration;

use ledgerkit_core::Commitment;

/// Client-level configuration for the operation framework and built-in plugins.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Commitment used when an operation does not ask for one.
    pub default_commitment: Commitment,
    /// Cooperative deadline for every dispatched operation. When it elapses
    /// the operation's scope is cancelled; the handler stops at its next
    /// cancellation check. `None` disables deadlines.
    pub operation_timeout: Option<Duration>,
    /// Whether entity lookups fetch off-ledger JSON metadata by default.
    pub load_json_metadata: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_commitment: Commitment::Confirmed,
            operation_timeout: None,
            load_json_metadata: true,
        }
    }
}

/// Configuration for [`FilesystemDriver`](crate::storage::FilesystemDriver).
///
/// No `Default` impl because the root directory has no sensible default.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory every stored path is resolved against.
    pub root: PathBuf,
}

/// Per-call fetch options accepted by lookup operations.
///
/// Unset fields fall back to [`ClientConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub commitment: Option<Commitment>,
    pub load_json_metadata: Option<bool>,
}

impl FetchOptions {
    #[must_use]
    pub fn commitment(&self, config: &ClientConfig) -> Commitment {
        self.commitment.unwrap_or(config.default_commitment)
    }

    #[must_use]
    pub fn load_json_metadata(&self, config: &ClientConfig) -> bool {
        self.load_json_metadata.unwrap_or(config.load_json_metadata)
    }

    #[must_use]
    pub fn without_json(self) -> Self {
        Self {
            load_json_metadata: Some(false),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.default_commitment, Commitment::Confirmed);
        assert!(config.operation_timeout.is_none());
        assert!(config.load_json_metadata);
    }

    #[test]
    fn fetch_options_fall_back_to_config() {
        let config = ClientConfig {
            default_commitment: Commitment::Finalized,
            load_json_metadata: false,
            ..ClientConfig::default()
        };
        let opts = FetchOptions::default();
        assert_eq!(opts.commitment(&config), Commitment::Finalized);
        assert!(!opts.load_json_metadata(&config));
    }

    #[test]
    fn fetch_options_override_config() {
        let config = ClientConfig::default();
        let opts = FetchOptions {
            commitment: Some(Commitment::Processed),
            load_json_metadata: Some(false),
        };
        assert_eq!(opts.commitment(&config), Commitment::Processed);
        assert!(!opts.load_json_metadata(&config));
        assert_eq!(FetchOptions::default().without_json(), FetchOptions {
            commitment: None,
            load_json_metadata: Some(false),
        });
    }
}
