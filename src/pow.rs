//! Brute-force nonce search over a block's digest.

use crate::error::SealError;
use crate::models::Block;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Hex characters in a SHA-256 digest; no difficulty above this can be met.
pub const MAX_DIFFICULTY: usize = 64;

/// Shared stop signal for a running seal. Clones observe the same flag; a
/// child also stops when its parent does.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
    parent: Option<Box<CancelFlag>>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag that can be cancelled on its own without touching `self`.
    pub fn child(&self) -> Self {
        CancelFlag {
            flag: Arc::default(),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.parent.as_ref().is_some_and(|parent| parent.is_cancelled())
    }
}

/// True when `hash` begins with `difficulty` `'0'` characters.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// Tries nonces 0, 1, 2, ... until the block digest meets `difficulty`.
///
/// On success the block carries the winning nonce and hash, and the hash is
/// returned as the proof. On failure the block's hash still matches whatever
/// nonce it was left on.
pub fn seal(
    block: &mut Block,
    difficulty: usize,
    max_attempts: Option<u64>,
    cancel: &CancelFlag,
) -> Result<String, SealError> {
    if difficulty > MAX_DIFFICULTY {
        return Err(SealError::Exhausted { attempts: 0 });
    }

    let mut attempts: u64 = 0;
    block.nonce = 0;

    let result = loop {
        if cancel.is_cancelled() {
            break Err(SealError::Cancelled { attempts });
        }
        if max_attempts.is_some_and(|max| attempts >= max) {
            break Err(SealError::Exhausted { attempts });
        }

        let hash = block.compute_hash();
        attempts += 1;
        if meets_difficulty(&hash, difficulty) {
            break Ok(hash);
        }

        match block.nonce.checked_add(1) {
            Some(next) => block.nonce = next,
            None => break Err(SealError::Exhausted { attempts }),
        }
    };

    match result {
        Ok(hash) => {
            debug!(
                "sealed block {} with nonce {} after {} attempts",
                block.index, block.nonce, attempts
            );
            block.hash = hash.clone();
            Ok(hash)
        }
        Err(err) => {
            block.hash = block.compute_hash();
            Err(err)
        }
    }
}
