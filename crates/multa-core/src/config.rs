//! Runtime configuration for the ledger and evidence clients.
//!
//! Configuration is parsed from TOML and validated field by field; every
//! problem is reported at once rather than failing on the first.

use crate::errors::{MultaError, Result};
use crate::fine::LedgerAddress;
use serde::{Deserialize, Serialize};

/// Deployment environment. Controls error detail at the external boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Test runs
    Test,
}

/// Ledger connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the ledger node
    pub rpc_url: String,
    /// Address of the deployed fine contract
    pub contract_address: String,
    /// Account the node signs submissions with
    pub from_account: String,
    /// Maximum wait for a transaction to be included in a block
    pub confirmation_timeout_ms: u64,
    /// Receipt polling interval
    pub poll_interval_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            contract_address: String::new(),
            from_account: String::new(),
            confirmation_timeout_ms: 120_000,
            poll_interval_ms: 500,
        }
    }
}

/// Content-store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// HTTP API of the primary node
    pub api_url: String,
    /// HTTP gateway used as the fallback path
    pub gateway_url: String,
    /// Bound on a whole retrieval, both paths combined
    pub retrieval_timeout_ms: u64,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5001".to_string(),
            gateway_url: "https://ipfs.io".to_string(),
            retrieval_timeout_ms: 30_000,
        }
    }
}

/// External SIMIT lookup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimitConfig {
    /// API base URL
    pub base_url: String,
    /// Optional bearer key
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout_ms: u64,
}

impl Default for SimitConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.simit.gov.co".to_string(),
            api_key: None,
            timeout_ms: 10_000,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultaConfig {
    /// Deployment environment
    pub environment: Environment,
    /// Log filter directive (`info`, `multa_ledger=debug`, ...)
    pub log_level: Option<String>,
    /// Ledger settings
    pub ledger: LedgerConfig,
    /// Content-store settings
    pub evidence: EvidenceConfig,
    /// SIMIT lookup, disabled when absent
    pub simit: Option<SimitConfig>,
}

/// One configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValidationError {
    /// Offending field, dotted path
    pub field: String,
    /// What is wrong with it
    pub error: String,
}

impl ConfigValidationError {
    fn new(field: &str, error: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            error: error.into(),
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl MultaConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| MultaError::configuration(format!("Failed to parse config: {e}")))?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Fail with every validation problem joined into one message.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            return Ok(());
        }
        let summary: Vec<String> = errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.error))
            .collect();
        Err(MultaError::configuration(format!(
            "Validation failed: {}",
            summary.join("; ")
        )))
    }

    /// Collect configuration problems.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = vec![];
        let production = self.environment == Environment::Production;

        if !is_http_url(&self.ledger.rpc_url) {
            errors.push(ConfigValidationError::new(
                "ledger.rpc_url",
                "Must be an http(s) URL",
            ));
        }

        for (field, value) in [
            ("ledger.contract_address", &self.ledger.contract_address),
            ("ledger.from_account", &self.ledger.from_account),
        ] {
            if value.is_empty() {
                if production {
                    errors.push(ConfigValidationError::new(field, "Required in production"));
                }
            } else if value.parse::<LedgerAddress>().is_err() {
                errors.push(ConfigValidationError::new(
                    field,
                    "Must be a 0x-prefixed 20-byte hex address",
                ));
            }
        }

        if self.ledger.poll_interval_ms == 0 {
            errors.push(ConfigValidationError::new(
                "ledger.poll_interval_ms",
                "Must be greater than zero",
            ));
        }

        if self.ledger.confirmation_timeout_ms < self.ledger.poll_interval_ms {
            errors.push(ConfigValidationError::new(
                "ledger.confirmation_timeout_ms",
                "Must be at least one poll interval",
            ));
        }

        if !is_http_url(&self.evidence.api_url) {
            errors.push(ConfigValidationError::new(
                "evidence.api_url",
                "Must be an http(s) URL",
            ));
        }

        if !is_http_url(&self.evidence.gateway_url) {
            errors.push(ConfigValidationError::new(
                "evidence.gateway_url",
                "Must be an http(s) URL",
            ));
        }

        if self.evidence.retrieval_timeout_ms == 0 {
            errors.push(ConfigValidationError::new(
                "evidence.retrieval_timeout_ms",
                "Must be greater than zero",
            ));
        }

        if let Some(simit) = &self.simit {
            if !is_http_url(&simit.base_url) {
                errors.push(ConfigValidationError::new(
                    "simit.base_url",
                    "Must be an http(s) URL",
                ));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_outside_production() {
        let config = MultaConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.evidence.retrieval_timeout_ms, 30_000);
    }

    #[test]
    fn production_requires_contract_and_account() {
        let config = MultaConfig {
            environment: Environment::Production,
            ..MultaConfig::default()
        };
        let fields: Vec<_> = config.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"ledger.contract_address".to_string()));
        assert!(fields.contains(&"ledger.from_account".to_string()));
    }

    #[test]
    fn parses_partial_toml() {
        let config = MultaConfig::from_toml_str(
            r#"
            environment = "test"

            [ledger]
            contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"

            [evidence]
            retrieval_timeout_ms = 5000
            "#,
        )
        .unwrap();
        assert_eq!(config.environment, Environment::Test);
        assert_eq!(config.ledger.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.evidence.retrieval_timeout_ms, 5000);
        assert!(config.simit.is_none());
    }

    #[test]
    fn rejects_malformed_address() {
        let err = MultaConfig::from_toml_str("[ledger]\ncontract_address = \"0x12\"\n").unwrap_err();
        assert!(matches!(err, MultaError::Configuration { .. }));
        assert!(err.to_string().contains("ledger.contract_address"));
    }
}
