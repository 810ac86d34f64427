use log::debug;

use std::time::Instant;

use super::block::Block;
use super::hash::meets_difficulty;

/// Difficulty the genesis block is sealed at
pub const GENESIS_DIFFICULTY: usize = 1;

/// Performs proof of work on a block candidate
///
/// Starts at nonce zero and increments until the block hash has
/// `difficulty` leading zero characters. There is no upper bound on the
/// nonce: an unreachable difficulty never returns.
///
/// # Arguments
///
/// * `block` - The candidate; every field except nonce and hash is kept
/// * `difficulty` - Number of leading '0' hex characters required
///
/// # Returns
///
/// The sealed block
pub fn seal(mut block: Block, difficulty: usize) -> Block {
    let started = Instant::now();
    block.nonce = 0;

    loop {
        let hash = block.calculate_hash();

        if meets_difficulty(&hash, difficulty) {
            debug!(
                "Sealed block {} at difficulty {} with nonce {} in {:?}",
                block.index,
                difficulty,
                block.nonce,
                started.elapsed()
            );

            return Block { hash, ..block };
        }

        block.nonce += 1;
    }
}
