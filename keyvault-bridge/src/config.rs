//! Bridge configuration

use std::path::PathBuf;
use std::time::Duration;

use keyvault_core::crypto::cipher::DEFAULT_KDF_ITERATIONS;
use keyvault_core::dapp::{GatePolicy, DEFAULT_NOTIFY_DELAY};
use keyvault_core::vault::DEFAULT_SIGN_TIMEOUT;
use tracing::info;

use crate::error::BridgeResult;

/// Runtime settings read from `KEYVAULT_*` environment variables
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub kdf_iterations: u32,
    pub sign_timeout: Duration,
    pub notify_delay: Duration,
    /// JSON file holding the gate policy; defaults apply when unset
    pub dapp_policy_file: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            sign_timeout: DEFAULT_SIGN_TIMEOUT,
            notify_delay: DEFAULT_NOTIFY_DELAY,
            dapp_policy_file: None,
        }
    }
}

impl BridgeConfig {
    /// Load from the environment. Unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let kdf_iterations = std::env::var("KEYVAULT_KDF_ITERATIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.kdf_iterations);

        let sign_timeout = std::env::var("KEYVAULT_SIGN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.sign_timeout);

        let notify_delay = std::env::var("KEYVAULT_NOTIFY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.notify_delay);

        let dapp_policy_file = std::env::var("KEYVAULT_DAPP_POLICY_FILE")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Self {
            kdf_iterations,
            sign_timeout,
            notify_delay,
            dapp_policy_file,
        }
    }

    /// Gate policy from the configured file, or the default policy
    pub fn load_policy(&self) -> BridgeResult<GatePolicy> {
        match &self.dapp_policy_file {
            Some(path) => {
                let policy = GatePolicy::from_file(path)?;
                info!(
                    path = %path.display(),
                    exceptions = policy.mismatch_exceptions.len(),
                    "dapp policy loaded"
                );
                Ok(policy)
            }
            None => Ok(GatePolicy::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.sign_timeout, Duration::from_secs(30));
        assert_eq!(config.notify_delay, Duration::from_millis(1500));
        assert!(config.load_policy().unwrap().mismatch_exceptions.is_empty());
    }

    #[test]
    fn test_policy_file() {
        let path = std::env::temp_dir().join(format!("keyvault-policy-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{"mismatch_exceptions": [{"origin": "https://opensea.io", "scope": "solana"}]}"#,
        )
        .unwrap();

        let config = BridgeConfig {
            dapp_policy_file: Some(path.clone()),
            ..Default::default()
        };
        let policy = config.load_policy().unwrap();
        assert!(policy.suppresses_mismatch_prompt("https://opensea.io", Some("solana")));

        std::fs::remove_file(path).unwrap();
    }
}
