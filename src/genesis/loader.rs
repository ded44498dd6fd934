use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::domain::amount;

use super::Genesis;

/// Errors that can occur while loading a genesis file.
#[derive(Error, Debug)]
pub enum GenesisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load and validate a genesis document from a YAML file.
pub fn load_genesis(path: impl AsRef<Path>) -> Result<Genesis, GenesisError> {
    let content = fs::read_to_string(path)?;
    parse_genesis(&content)
}

/// Parse and validate a genesis document.
pub fn parse_genesis(content: &str) -> Result<Genesis, GenesisError> {
    let genesis: Genesis = serde_yaml::from_str(content)?;
    validate_genesis(&genesis)?;
    Ok(genesis)
}

/// Check identities, protocol parameters and allocations.
pub fn validate_genesis(genesis: &Genesis) -> Result<(), GenesisError> {
    for (field, identity) in [
        ("owner", &genesis.owner),
        ("first_airline", &genesis.first_airline),
        ("app_identity", &genesis.app_identity),
        ("store_identity", &genesis.store_identity),
    ] {
        if identity.is_empty() {
            return Err(GenesisError::Validation(format!("{field} cannot be empty")));
        }
    }

    if genesis.app_identity == genesis.store_identity {
        return Err(GenesisError::Validation(
            "app_identity and store_identity must differ".to_string(),
        ));
    }

    let params = &genesis.params;
    if params.oracle_quorum == 0 {
        return Err(GenesisError::Validation("oracle_quorum must be at least 1".to_string()));
    }
    if params.oracle_index_range == 0 {
        return Err(GenesisError::Validation(
            "oracle_index_range must be at least 1".to_string(),
        ));
    }
    if params.bootstrap_airlines == 0 {
        return Err(GenesisError::Validation(
            "bootstrap_airlines must be at least 1".to_string(),
        ));
    }
    if params.payout.denominator == 0 {
        return Err(GenesisError::Validation(
            "payout denominator cannot be zero".to_string(),
        ));
    }
    if params.premium_cap == 0 {
        return Err(GenesisError::Validation("premium_cap must be positive".to_string()));
    }

    for (account, units) in &genesis.accounts {
        amount::from_units(*units).map_err(|e| {
            GenesisError::Validation(format!("Invalid allocation for {account}: {e}"))
        })?;
    }

    Ok(())
}
