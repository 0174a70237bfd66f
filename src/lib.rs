//! scenariomap: classifies trading scenarios as bullish, bearish or no-bias
//! against a multi-timeframe market data snapshot.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
