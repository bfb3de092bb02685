//! Load `multa.toml` and build the service it describes.

use anyhow::Context;
use multa_core::MultaConfig;
use multa_effects::{GatewayContentNode, JsonRpcLedgerHandler, KuboContentNode, SimitHttpClient};
use multa_ledger::{FinesService, LedgerGateway};
use multa_store::EvidenceStore;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Read and validate a configuration file. Without a path the defaults are
/// used, which suit a local development node.
pub fn load(path: Option<&Path>) -> anyhow::Result<MultaConfig> {
    let Some(path) = path else {
        let config = MultaConfig::default();
        config.ensure_valid()?;
        return Ok(config);
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    MultaConfig::from_toml_str(&contents)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

/// Log filter: `RUST_LOG` wins, then `--verbose`, then the config's
/// `log_level`, then `info`.
pub fn log_filter(verbose: bool, config: Option<&MultaConfig>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directive = if verbose {
        "debug".to_string()
    } else {
        config
            .and_then(|c| c.log_level.clone())
            .unwrap_or_else(|| "info".to_string())
    };
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Wire production handlers into a `FinesService`.
pub fn build_service(config: &MultaConfig) -> anyhow::Result<FinesService> {
    let ledger = JsonRpcLedgerHandler::from_config(&config.ledger)
        .context("Failed to configure the ledger handler")?;
    let gateway = LedgerGateway::from_handler(ledger);

    let primary = Arc::new(KuboContentNode::new(&config.evidence.api_url));
    let fallback = Arc::new(GatewayContentNode::new(&config.evidence.gateway_url));
    let store = EvidenceStore::from_config(&config.evidence, primary, fallback);

    let service = FinesService::new(gateway, store);
    match &config.simit {
        Some(simit) => {
            let client = SimitHttpClient::from_config(simit)
                .context("Failed to configure the SIMIT client")?;
            Ok(service.with_simit(Arc::new(client)))
        }
        None => Ok(service),
    }
}

