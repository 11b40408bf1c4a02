//! Position-addressable uniform random streams.
//!
//! Every value of the matrix (and of the vector) has a fixed position in one
//! logical stream per seed. Any thread on any rank can reproduce the values at
//! `[offset, offset + count)` by building its own generator and skipping
//! ahead, so no generator instance is ever shared.

use clap::ValueEnum;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A `f64` sample consumes one `u64`, i.e. two 32-bit ChaCha words.
const WORDS_PER_VALUE: u128 = 2;

/// How a fresh generator is advanced to its logical offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SkipAhead {
    /// Draw and drop `offset` values. O(offset).
    #[default]
    Discard,
    /// Reposition the ChaCha block counter directly. O(1).
    Jump,
}

/// One uniform sample in `[0, 1)`.
#[inline]
pub fn sample(rng: &mut ChaCha8Rng) -> f64 {
    rng.gen::<f64>()
}

/// A generator for `seed` positioned so that its next value is the one at
/// `logical_offset` in the sequential stream.
pub fn stream_at(seed: u64, logical_offset: usize, skip: SkipAhead) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    match skip {
        SkipAhead::Discard => {
            for _ in 0..logical_offset {
                sample(&mut rng);
            }
        }
        SkipAhead::Jump => rng.set_word_pos(logical_offset as u128 * WORDS_PER_VALUE),
    }
    rng
}

/// Fill `out` with the values at `[logical_offset, logical_offset + out.len())`.
pub fn fill_with(seed: u64, logical_offset: usize, out: &mut [f64], skip: SkipAhead) {
    let mut rng = stream_at(seed, logical_offset, skip);
    for value in out.iter_mut() {
        *value = sample(&mut rng);
    }
}

/// [`fill_with`] using [`SkipAhead::Discard`].
pub fn fill(seed: u64, logical_offset: usize, out: &mut [f64]) {
    fill_with(seed, logical_offset, out, SkipAhead::Discard);
}

/// `count` values starting at `logical_offset` of the stream for `seed`.
pub fn generate(seed: u64, logical_offset: usize, count: usize) -> Vec<f64> {
    let mut values = vec![0.0; count];
    fill(seed, logical_offset, &mut values);
    values
}
