use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppendError {
    #[error("parent mismatch: tip is {expected}, block points at {found}")]
    ParentMismatch { expected: String, found: String },

    #[error("proof does not start with {difficulty} zero characters")]
    InvalidProofFormat { difficulty: usize },

    #[error("proof does not match the block digest")]
    ProofMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SealError {
    #[error("sealing cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("no valid nonce within {attempts} attempts")]
    Exhausted { attempts: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MineError {
    #[error("no pending votes to seal")]
    NothingPending,

    #[error(transparent)]
    Seal(#[from] SealError),

    #[error("sealed block rejected: {0}")]
    Rejected(#[from] AppendError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Stored hash differs from a fresh digest of the block.
    HashMismatch,
    /// `previous_hash` differs from the predecessor's stored hash.
    BrokenLink,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::HashMismatch => f.write_str("hash mismatch"),
            FaultKind::BrokenLink => f.write_str("broken link"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("block {index}: {kind}")]
pub struct ChainFault {
    pub index: usize,
    pub kind: FaultKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
