//! Core domain types and logic.

pub mod direction;
pub mod error;
pub mod evaluation;
pub mod field_parser;
pub mod field_ref;
pub mod filter;
pub mod filter_eval;
pub mod indicator;
pub mod market_data;
pub mod ohlcv;
pub mod resolver;
pub mod scenario;
pub mod scenario_eval;
pub mod settings;
pub mod timeframe;
