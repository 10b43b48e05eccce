//! Sybil Wallet Clustering Library
//!
//! Groups wallets whose cross-chain activity moves in lockstep: same gap
//! between chain interactions, similar amounts, near-identical dates.

pub mod acquisition;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod table;

// Re-export commonly used types
pub use config::Config;
pub use engine::{ClusterEngine, ClusterReport};
pub use error::{Error, Result};
pub use model::{Chain, ChainPair, Dimension, Field, Record};
pub use table::{TableFormat, TableRow};
