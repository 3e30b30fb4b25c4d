//! Farms the Sui `spam` module across a fleet of accounts derived from one
//! mnemonic.
//!
//! Every tick the [`farmer::Farmer`] tops up low-balance accounts from
//! account 0, advances each account's counter (create, register and create,
//! or increment) and claims rewards for counters two epochs old. All chain
//! access goes through [`gateway::ChainGateway`].

pub mod action;
pub mod claim;
pub mod config;
pub mod counter;
pub mod errors;
pub mod farmer;
pub mod funding;
pub mod gateway;
pub mod notify;
pub mod resolver;
pub mod retry;
pub mod transaction;
pub mod types;
pub mod wallet;

pub type Result<T> = std::result::Result<T, errors::Error>;
