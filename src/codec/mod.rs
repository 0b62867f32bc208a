// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Bit-level codec between process signals and gateway registers
//!
//! The gateway exchanges 400 boolean process signals as a block of 25 holding
//! registers of 16 bits each. This module converts between the two shapes.
//!
//! ## Layout
//!
//! Signals are grouped in 50 bit-sets of 8 signals. Bit `b` of bit-set `g` sits
//! at flat index `g * 8 + b`.
//!
//! Word `w` carries flat indices `w * 16 .. w * 16 + 16`, least significant bit
//! first:
//!
//! | Flat index | Word | Bit in word |
//! |-----------|------|-------------|
//! | 0         | 0    | 0 (`0x0001`) |
//! | 15        | 0    | 15 (`0x8000`) |
//! | 16        | 1    | 0 (`0x0001`) |
//! | 399       | 24   | 15 (`0x8000`) |
//!
//! [`encode`] and [`decode`] use mirror-image orderings, so
//! `decode(&encode(&v)) == v` for every vector.
//!
//! ## Example
//!
//! ```
//! use rust_gmod_bridge::codec::{decode, encode, SignalVector};
//!
//! let mut signals = SignalVector::new();
//! signals.set_bit(0, 3, true).unwrap();
//!
//! let words = encode(&signals);
//! assert_eq!(words.as_slice()[0], 0x0008);
//! assert_eq!(decode(&words), signals);
//! ```

use std::fmt;

use thiserror::Error;

/// Number of boolean process signals exchanged with the gateway
pub const SIGNAL_COUNT: usize = 400;
/// Number of signals in one bit-set
pub const BITS_PER_SET: usize = 8;
/// Number of bit-sets in a [`SignalVector`]
pub const BIT_SET_COUNT: usize = SIGNAL_COUNT / BITS_PER_SET;
/// Number of bits carried by one holding register
pub const BITS_PER_WORD: usize = 16;
/// Number of holding registers in a [`WordBlock`]
pub const WORD_COUNT: usize = SIGNAL_COUNT / BITS_PER_WORD;

/// Errors reported by the codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid length: expected {expected} elements, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Index {index} is out of range (limit {limit})")]
    IndexOutOfRange { index: usize, limit: usize },
}

/// The 400 process signals, grouped in 50 bit-sets of 8.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalVector([bool; SIGNAL_COUNT]);

impl SignalVector {
    /// Create a vector with every signal cleared
    pub fn new() -> Self {
        Self([false; SIGNAL_COUNT])
    }

    /// Build a vector from a flat slice of exactly [`SIGNAL_COUNT`] values.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidLength`] for any other length.
    pub fn from_slice(bits: &[bool]) -> Result<Self, CodecError> {
        let bits: [bool; SIGNAL_COUNT] =
            bits.try_into().map_err(|_| CodecError::InvalidLength {
                expected: SIGNAL_COUNT,
                actual: bits.len(),
            })?;
        Ok(Self(bits))
    }

    /// Build a vector from its 50 bit-sets
    pub fn from_bit_sets(bit_sets: &[[bool; BITS_PER_SET]; BIT_SET_COUNT]) -> Self {
        let mut bits = [false; SIGNAL_COUNT];
        for (chunk, bit_set) in bits.chunks_exact_mut(BITS_PER_SET).zip(bit_sets) {
            chunk.copy_from_slice(bit_set);
        }
        Self(bits)
    }

    /// Return the 50 bit-sets of this vector
    pub fn bit_sets(&self) -> [[bool; BITS_PER_SET]; BIT_SET_COUNT] {
        let mut bit_sets = [[false; BITS_PER_SET]; BIT_SET_COUNT];
        for (bit_set, chunk) in bit_sets.iter_mut().zip(self.0.chunks_exact(BITS_PER_SET)) {
            bit_set.copy_from_slice(chunk);
        }
        bit_sets
    }

    /// Flat view of the signals
    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    /// Value of the signal at a flat index, `None` past the end
    pub fn get(&self, index: usize) -> Option<bool> {
        self.0.get(index).copied()
    }

    /// Set the signal at a flat index
    pub fn set(&mut self, index: usize, value: bool) -> Result<(), CodecError> {
        let slot = self.0.get_mut(index).ok_or(CodecError::IndexOutOfRange {
            index,
            limit: SIGNAL_COUNT,
        })?;
        *slot = value;
        Ok(())
    }

    /// Value of bit `bit` of bit-set `group`
    pub fn bit(&self, group: usize, bit: usize) -> Result<bool, CodecError> {
        let index = flat_index(group, bit)?;
        Ok(self.0[index])
    }

    /// Set bit `bit` of bit-set `group`
    pub fn set_bit(&mut self, group: usize, bit: usize, value: bool) -> Result<(), CodecError> {
        let index = flat_index(group, bit)?;
        self.0[index] = value;
        Ok(())
    }

    /// Number of signals currently set
    pub fn count_ones(&self) -> usize {
        self.0.iter().filter(|bit| **bit).count()
    }

    /// Flat indices of the signals currently set
    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(index, bit)| bit.then_some(index))
    }
}

impl Default for SignalVector {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<&[bool]> for SignalVector {
    type Error = CodecError;

    fn try_from(bits: &[bool]) -> Result<Self, Self::Error> {
        Self::from_slice(bits)
    }
}

// Printing 400 booleans is unreadable, the packed words say the same thing.
impl fmt::Debug for SignalVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SignalVector").field(&encode(self)).finish()
    }
}

/// The 25 holding registers exchanged with the gateway
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WordBlock([u16; WORD_COUNT]);

impl WordBlock {
    pub fn new(words: [u16; WORD_COUNT]) -> Self {
        Self(words)
    }

    /// Build a block from a slice of exactly [`WORD_COUNT`] words.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidLength`] for any other length.
    pub fn from_slice(words: &[u16]) -> Result<Self, CodecError> {
        let words: [u16; WORD_COUNT] =
            words.try_into().map_err(|_| CodecError::InvalidLength {
                expected: WORD_COUNT,
                actual: words.len(),
            })?;
        Ok(Self(words))
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u16> {
        self.0.to_vec()
    }
}

impl TryFrom<&[u16]> for WordBlock {
    type Error = CodecError;

    fn try_from(words: &[u16]) -> Result<Self, Self::Error> {
        Self::from_slice(words)
    }
}

impl fmt::Debug for WordBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, word) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:#06x}", word)?;
        }
        f.write_str("]")
    }
}

/// Resolve a flat signal index into its `(bit-set, bit)` pair
pub fn locate(index: usize) -> Result<(usize, usize), CodecError> {
    if index >= SIGNAL_COUNT {
        return Err(CodecError::IndexOutOfRange {
            index,
            limit: SIGNAL_COUNT,
        });
    }
    Ok((index / BITS_PER_SET, index % BITS_PER_SET))
}

/// Resolve a `(bit-set, bit)` pair into its flat signal index
pub fn flat_index(group: usize, bit: usize) -> Result<usize, CodecError> {
    if group >= BIT_SET_COUNT {
        return Err(CodecError::IndexOutOfRange {
            index: group,
            limit: BIT_SET_COUNT,
        });
    }
    if bit >= BITS_PER_SET {
        return Err(CodecError::IndexOutOfRange {
            index: bit,
            limit: BITS_PER_SET,
        });
    }
    Ok(group * BITS_PER_SET + bit)
}

/// Pack the signals into the register block written to the gateway.
///
/// The first signal of each 16-signal range lands in the least significant bit
/// of its word, the last one in the most significant bit.
pub fn encode(signals: &SignalVector) -> WordBlock {
    let mut words = [0u16; WORD_COUNT];
    for (word, range) in words.iter_mut().zip(signals.0.chunks_exact(BITS_PER_WORD)) {
        *word = range
            .iter()
            .enumerate()
            .fold(0u16, |acc, (bit, &set)| acc | (u16::from(set) << bit));
    }
    WordBlock(words)
}

/// Unpack a register block read from the gateway into signals.
///
/// Bit `k` of word `w` becomes flat signal `w * 16 + k`, which is the
/// least-significant-first rendering of every word concatenated in order.
pub fn decode(words: &WordBlock) -> SignalVector {
    let mut bits = [false; SIGNAL_COUNT];
    for (range, word) in bits.chunks_exact_mut(BITS_PER_WORD).zip(words.0) {
        for (bit, slot) in range.iter_mut().enumerate() {
            *slot = (word >> bit) & 1 == 1;
        }
    }
    SignalVector(bits)
}

/// [`encode`] for an unchecked flat slice.
///
/// # Errors
///
/// Returns [`CodecError::InvalidLength`] unless `bits` holds exactly
/// [`SIGNAL_COUNT`] values. No partial block is produced.
pub fn encode_slice(bits: &[bool]) -> Result<WordBlock, CodecError> {
    SignalVector::from_slice(bits).map(|signals| encode(&signals))
}

/// [`decode`] for an unchecked register slice.
///
/// # Errors
///
/// Returns [`CodecError::InvalidLength`] unless `words` holds exactly
/// [`WORD_COUNT`] values. No partial vector is produced.
pub fn decode_slice(words: &[u16]) -> Result<SignalVector, CodecError> {
    WordBlock::from_slice(words).map(|block| decode(&block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_vector(rng: &mut StdRng, density: f64) -> SignalVector {
        let bits: Vec<bool> = (0..SIGNAL_COUNT).map(|_| rng.random_bool(density)).collect();
        SignalVector::from_slice(&bits).unwrap()
    }

    #[test]
    fn test_round_trip_random_vectors() {
        let mut rng = StdRng::seed_from_u64(0x6d0d_b17e);
        for density in [0.0, 0.05, 0.5, 0.95, 1.0] {
            for _ in 0..200 {
                let signals = random_vector(&mut rng, density);
                assert_eq!(decode(&encode(&signals)), signals);
            }
        }
    }

    #[test]
    fn test_round_trip_every_single_bit() {
        for index in 0..SIGNAL_COUNT {
            let mut signals = SignalVector::new();
            signals.set(index, true).unwrap();
            let decoded = decode(&encode(&signals));
            assert_eq!(decoded.active_indices().collect::<Vec<_>>(), vec![index]);
        }
    }

    #[test]
    fn test_word_bit_order() {
        let mut last = SignalVector::new();
        last.set(15, true).unwrap();
        let words = encode(&last);
        assert_eq!(words.as_slice()[0], 0x8000);
        assert!(words.as_slice()[1..].iter().all(|w| *w == 0));

        let mut first = SignalVector::new();
        first.set(0, true).unwrap();
        let words = encode(&first);
        assert_eq!(words.as_slice()[0], 0x0001);

        let mut tail = SignalVector::new();
        tail.set(399, true).unwrap();
        assert_eq!(encode(&tail).as_slice()[24], 0x8000);
    }

    #[test]
    fn test_decode_renders_words_lsb_first() {
        let mut words = [0u16; WORD_COUNT];
        // 0b0000_0000_0000_0101 reversed is "1010000000000000"
        words[0] = 0b101;
        words[3] = 0x8000;
        let signals = decode(&WordBlock::new(words));
        assert_eq!(
            signals.active_indices().collect::<Vec<_>>(),
            vec![0, 2, 3 * 16 + 15]
        );
    }

    #[test]
    fn test_full_words() {
        let signals = SignalVector::from_slice(&[true; SIGNAL_COUNT]).unwrap();
        assert_eq!(encode(&signals), WordBlock::new([0xFFFF; WORD_COUNT]));
        assert_eq!(encode(&SignalVector::new()), WordBlock::default());
    }

    #[test]
    fn test_group_mapping() {
        for index in 0..SIGNAL_COUNT {
            let (group, bit) = locate(index).unwrap();
            assert_eq!(group, index / 8);
            assert_eq!(bit, index % 8);
            assert_eq!(flat_index(group, bit).unwrap(), index);
        }
        assert!(locate(SIGNAL_COUNT).is_err());
        assert!(flat_index(BIT_SET_COUNT, 0).is_err());
        assert!(flat_index(0, BITS_PER_SET).is_err());
    }

    #[test]
    fn test_bit_sets_follow_flat_layout() {
        let mut signals = SignalVector::new();
        signals.set_bit(2, 5, true).unwrap();
        assert_eq!(signals.get(21), Some(true));
        assert!(signals.bit(2, 5).unwrap());

        let bit_sets = signals.bit_sets();
        assert!(bit_sets[2][5]);
        assert_eq!(SignalVector::from_bit_sets(&bit_sets), signals);
    }

    #[test]
    fn test_length_precondition() {
        assert_eq!(
            encode_slice(&[true; 399]),
            Err(CodecError::InvalidLength {
                expected: SIGNAL_COUNT,
                actual: 399
            })
        );
        assert!(encode_slice(&[false; 401]).is_err());
        assert!(encode_slice(&[]).is_err());

        assert_eq!(
            decode_slice(&[0xFFFF; 24]),
            Err(CodecError::InvalidLength {
                expected: WORD_COUNT,
                actual: 24
            })
        );
        assert!(decode_slice(&[0; 26]).is_err());
        assert!(decode_slice(&[0; WORD_COUNT]).is_ok());
    }

    #[test]
    fn test_set_out_of_range_leaves_vector_untouched() {
        let mut signals = SignalVector::new();
        assert!(signals.set(SIGNAL_COUNT, true).is_err());
        assert_eq!(signals, SignalVector::new());
        assert_eq!(signals.get(SIGNAL_COUNT), None);
    }
}
