//! Single-process vote ledger: votes are batched into blocks, each block is
//! sealed by a proof-of-work nonce search, and the chain is checked by
//! re-hashing every block and following its parent links.

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod pow;

pub use config::{LedgerConfig, ServerConfig};
pub use error::{AppendError, ChainFault, ConfigError, FaultKind, MineError, SealError};
pub use ledger::{Ledger, VoteRecord};
pub use models::{Block, BlockData, Vote};
pub use pow::CancelFlag;
