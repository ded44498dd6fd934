//! Deployment document: identities, protocol parameters and initial balances.

pub mod loader;

pub use loader::{load_genesis, parse_genesis, validate_genesis, GenesisError};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{amount, Address, Parameters, Wei};
use crate::engine::{HashIndexSource, IndexSource, RulesEngine};
use crate::ledger::{Balances, Ledger};
use crate::store::DataStore;

/// Everything needed to stand up a ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genesis {
    /// Administers the operational gate and the authorized caller
    pub owner: Address,

    /// Seeded as a registered (unfunded) airline
    pub first_airline: Address,

    /// Identity of the rules engine, bound as the store's authorized caller
    pub app_identity: Address,

    /// Identity of the data store; its account holds the pool
    pub store_identity: Address,

    #[serde(default)]
    pub params: Parameters,

    /// Initial balances in units
    #[serde(default)]
    pub accounts: BTreeMap<Address, Decimal>,
}

impl Genesis {
    /// Local development deployment with a handful of funded accounts.
    pub fn development() -> Self {
        let owner = Address::new("0x627306090abab3a6e1400e9345bc60c78a8bef57");
        let first_airline = Address::new("0xf17f52151ebef6c7334fad080c5704d77216b732");

        let mut accounts = BTreeMap::new();
        for account in [
            owner.clone(),
            first_airline.clone(),
            Address::new("0xc5fdf4076b8f3a5357c5e395ab970b5b54098fef"),
            Address::new("0x821aea9a577a9b44299b9c15c88cf3087f3b5544"),
            Address::new("0x0d1d4e623d10f9fba5db95830f7d3839406c6af2"),
            Address::new("0x2932b7a2355d6fecc4b5c0b6bd44cc31df247a2e"),
        ] {
            accounts.insert(account, Decimal::new(100, 0));
        }

        Genesis {
            owner,
            first_airline,
            app_identity: Address::new("0x345ca3e014aaf5dca488057592ee47305d9b3e10"),
            store_identity: Address::new("0xf25186b5081ff5ce73482ad761db0eb0d25abfbf"),
            params: Parameters::default(),
            accounts,
        }
    }

    /// Load from `path`, or fall back to the development genesis.
    pub fn load_or_development(path: Option<&Path>) -> Result<Self, GenesisError> {
        match path {
            Some(path) => {
                let genesis = load_genesis(path)?;
                info!(path = %path.display(), "Genesis loaded");
                Ok(genesis)
            }
            None => {
                info!("No genesis file configured, using development genesis");
                Ok(Genesis::development())
            }
        }
    }

    /// Build a ledger with hashed oracle index assignment.
    pub fn build(&self, fee_per_call: Wei) -> Result<Ledger, GenesisError> {
        self.build_with_index_source(fee_per_call, Arc::new(HashIndexSource))
    }

    /// Build a ledger with the rules engine bound as authorized caller.
    pub fn build_with_index_source(
        &self,
        fee_per_call: Wei,
        index_source: Arc<dyn IndexSource>,
    ) -> Result<Ledger, GenesisError> {
        validate_genesis(self)?;

        let mut store = DataStore::new(
            self.store_identity.clone(),
            self.owner.clone(),
            self.first_airline.clone(),
            self.params.payout,
        );
        store
            .set_authorized_caller(&self.owner, self.app_identity.clone())
            .map_err(|e| GenesisError::Validation(e.to_string()))?;

        let app = RulesEngine::with_index_source(
            self.app_identity.clone(),
            self.params.clone(),
            index_source,
        );

        let mut balances = Balances::new();
        for (account, units) in &self.accounts {
            let wei = amount::from_units(*units)
                .map_err(|e| GenesisError::Validation(e.to_string()))?;
            balances
                .mint(account, wei)
                .map_err(|e| GenesisError::Validation(e.to_string()))?;
        }

        info!(
            accounts = self.accounts.len(),
            fee_per_call = %fee_per_call,
            "Ledger built from genesis"
        );
        Ok(Ledger::new(store, app, balances, fee_per_call))
    }
}
