pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod genesis;
pub mod ledger;
pub mod observability;
pub mod store;

pub use config::Config;
pub use domain::{Address, FlightKey, StatusCode, SuretyError, Wei};
pub use engine::RulesEngine;
pub use genesis::Genesis;
pub use ledger::{Command, Ledger, Receipt, Revert};
pub use store::DataStore;
