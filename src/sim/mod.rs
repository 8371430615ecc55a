//! Continuous-simulation control core

pub mod ledger;
pub mod manager;
pub mod reconcile;
pub mod runner;

pub use ledger::*;
pub use manager::*;
pub use reconcile::*;
pub use runner::*;
