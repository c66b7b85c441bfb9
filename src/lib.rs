//! A discrete-event, agent-based market simulator for a depeg-insurance
//! protocol: a rebasing LST, its peg-stability module, a Vault offering
//! leveraged DS exposure, and constant-product / YieldSpace AMMs tying
//! them together.

pub mod agent;
pub mod amm;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod psm;
pub mod stats;
pub mod vault;
pub mod wallet;

pub use engine::Engine;
pub use error::{SimError, SimResult};
