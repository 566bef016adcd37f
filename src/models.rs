use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Parent hash carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

// Field order is the digest order; keep it alphabetical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub candidate: String,
    pub voter_id: String,
}

impl Vote {
    pub fn new(voter_id: impl Into<String>, candidate: impl Into<String>) -> Self {
        Vote {
            candidate: candidate.into(),
            voter_id: voter_id.into(),
        }
    }
}

/// Serialises as `{"votes":null}` and accepts nothing else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisMarker {
    votes: (),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockData {
    Votes(Vec<Vote>),
    Genesis(GenesisMarker),
}

impl BlockData {
    pub fn genesis() -> Self {
        BlockData::Genesis(GenesisMarker::default())
    }

    pub fn votes(&self) -> &[Vote] {
        match self {
            BlockData::Votes(votes) => votes,
            BlockData::Genesis(_) => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub data: BlockData,
    pub previous_hash: String,
    pub nonce: u64,
    pub hash: String,
}

/// Everything in a block except its own hash.
#[derive(Serialize)]
struct HashMaterial<'a> {
    data: &'a BlockData,
    index: u64,
    nonce: u64,
    previous_hash: &'a str,
    timestamp: u64,
}

impl Block {
    pub fn new(index: u64, timestamp: u64, data: BlockData, previous_hash: impl Into<String>) -> Self {
        let mut block = Block {
            index,
            timestamp,
            data,
            previous_hash: previous_hash.into(),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    pub fn genesis(timestamp: u64) -> Self {
        Block::new(0, timestamp, BlockData::genesis(), GENESIS_PREVIOUS_HASH)
    }

    /// SHA-256 over the canonical JSON of every field but `hash`, as lowercase hex.
    pub fn compute_hash(&self) -> String {
        let material = HashMaterial {
            data: &self.data,
            index: self.index,
            nonce: self.nonce,
            previous_hash: &self.previous_hash,
            timestamp: self.timestamp,
        };
        let block_json =
            serde_json::to_vec(&material).expect("hash material contains only strings and integers");
        let mut hasher = Sha256::new();
        hasher.update(&block_json);
        format!("{:x}", hasher.finalize())
    }

    pub fn votes(&self) -> &[Vote] {
        self.data.votes()
    }
}

/// Milliseconds since the Unix epoch, zero if the clock is before it.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
