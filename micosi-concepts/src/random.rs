//! Pseudo-random generators with reproducible string serialization.
//!
//! Every cell of an ensemble owns one generator state.
//! The state travels with the cell into every stored time layer so that a continued
//! simulation reproduces an uninterrupted one bit by bit.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

use rand::RngCore;

use crate::errors::RngError;
use crate::Real;

/// Number of colliding substates [RandomEngine::multiply] tolerates before giving up.
pub const MULTIPLY_ATTEMPTS: usize = 1024;

static TIME_SEED_COUNTER: AtomicU32 = AtomicU32::new(0);

fn time_seed() -> u32 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let counter = TIME_SEED_COUNTER.fetch_add(1, Ordering::Relaxed) as u128;
    // splitmix64 finalizer
    let mut z = (nanos ^ (counter << 32)) as u64;
    z = z.wrapping_add(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^= z >> 31;
    (z ^ (z >> 32)) as u32
}

/// Capabilities shared by all generators of the engine.
pub trait RandomEngine: Clone + core::fmt::Debug + Send + Sync + Sized {
    /// Largest value [RandomEngine::next] can return.
    const MAX: u32;

    /// Deterministically creates a state from a seed.
    fn from_seed_u32(seed: u32) -> Self;

    /// Creates a state seeded from the system clock.
    /// Two calls in a row yield different states.
    fn from_time() -> Self {
        Self::from_seed_u32(time_seed())
    }

    /// Uniformly distributed integer in `[0, MAX]`.
    fn next(&mut self) -> u32;

    /// Stores the state as a string.
    fn serialize_state(&self) -> String;

    /// Restores a state written by [RandomEngine::serialize_state].
    fn deserialize_state(serialized: &str) -> Result<Self, RngError>;

    /// Uniformly distributed number in `[0, 1]`.
    fn next_real(&mut self) -> Real {
        (self.next() as f64 / Self::MAX as f64) as Real
    }

    /// Uniformly distributed number in `[lo, hi]`.
    fn next_real_range(&mut self, lo: Real, hi: Real) -> Real {
        self.next_real() * (hi - lo) + lo
    }

    /// Approximately standard normal sample built from the sum of 12 uniform numbers.
    fn next_standard_normal(&mut self) -> f64 {
        let mut sum = 0.0;
        for _ in 0..12 {
            sum += self.next_real() as f64 - 0.5;
        }
        sum
    }

    /// Draws a seed for a derived state.
    fn next_seed(&mut self) -> u32 {
        let mut seed = 0u32;
        let mut bits = 0;
        while bits < 32 {
            seed = seed.rotate_left(15) ^ self.next();
            bits += 15;
        }
        seed
    }

    /// Deterministically derives `n` states with pairwise distinct serializations.
    fn multiply(&mut self, n: usize) -> Result<Vec<Self>, RngError> {
        let mut seen = HashSet::with_capacity(n);
        let mut states = Vec::with_capacity(n);
        let mut collisions = 0;
        while states.len() < n {
            let state = Self::from_seed_u32(self.next_seed());
            if seen.insert(state.serialize_state()) {
                states.push(state);
            } else {
                collisions += 1;
                #[cfg(feature = "tracing")]
                tracing::debug!(collisions, "derived generator state collided");
                if collisions >= MULTIPLY_ATTEMPTS {
                    return Err(RngError(format!(
                        "generator is not designed for such large-scale use: \
                        could not derive {n} distinct states"
                    )));
                }
            }
        }
        Ok(states)
    }
}

/// Linear congruential generator `state = 214013 * state + 2531011`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Lcg {
    state: u32,
}

impl RandomEngine for Lcg {
    const MAX: u32 = 0x7FFF;

    fn from_seed_u32(seed: u32) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(214013).wrapping_add(2531011);
        (self.state >> 16) & 0x7FFF
    }

    fn serialize_state(&self) -> String {
        self.state.to_string()
    }

    fn deserialize_state(serialized: &str) -> Result<Self, RngError> {
        let trimmed = serialized.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RngError(format!(
                "cannot deserialize generator state from \"{serialized}\""
            )));
        }
        let state = trimmed.parse::<u32>().map_err(|e| {
            RngError(format!(
                "cannot deserialize generator state from \"{serialized}\": {e}"
            ))
        })?;
        Ok(Self { state })
    }
}

const MT_N: usize = 624;
const MT_M: usize = 397;
const MT_MATRIX_A: u32 = 0x9908B0DF;
const MT_UPPER_MASK: u32 = 0x80000000;
const MT_LOWER_MASK: u32 = 0x7FFFFFFF;

/// 32-bit Mersenne Twister (MT19937).
#[derive(Clone, PartialEq, Eq)]
pub struct Mt19937 {
    words: Box<[u32; MT_N]>,
    index: usize,
}

impl core::fmt::Debug for Mt19937 {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Mt19937")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl Mt19937 {
    fn twist(&mut self) {
        for i in 0..MT_N {
            let y = (self.words[i] & MT_UPPER_MASK) | (self.words[(i + 1) % MT_N] & MT_LOWER_MASK);
            let mut next = self.words[(i + MT_M) % MT_N] ^ (y >> 1);
            if y & 1 != 0 {
                next ^= MT_MATRIX_A;
            }
            self.words[i] = next;
        }
        self.index = 0;
    }
}

impl RandomEngine for Mt19937 {
    const MAX: u32 = u32::MAX;

    fn from_seed_u32(seed: u32) -> Self {
        let mut words = Box::new([0u32; MT_N]);
        words[0] = seed;
        for i in 1..MT_N {
            let prev = words[i - 1];
            words[i] = 1812433253u32
                .wrapping_mul(prev ^ (prev >> 30))
                .wrapping_add(i as u32);
        }
        Self {
            words,
            index: MT_N,
        }
    }

    fn next(&mut self) -> u32 {
        if self.index >= MT_N {
            self.twist();
        }
        let mut y = self.words[self.index];
        self.index += 1;
        y ^= y >> 11;
        y ^= (y << 7) & 0x9D2C5680;
        y ^= (y << 15) & 0xEFC60000;
        y ^ (y >> 18)
    }

    fn serialize_state(&self) -> String {
        let mut res = String::with_capacity(MT_N * 11 + 4);
        for word in self.words.iter() {
            res.push_str(&word.to_string());
            res.push(' ');
        }
        res.push_str(&self.index.to_string());
        res
    }

    fn deserialize_state(serialized: &str) -> Result<Self, RngError> {
        let error = || {
            RngError(format!(
                "cannot deserialize Mersenne Twister state ({} characters)",
                serialized.len()
            ))
        };
        let tokens = serialized.split_whitespace().collect::<Vec<_>>();
        if tokens.len() != MT_N + 1 {
            return Err(error());
        }
        let mut words = Box::new([0u32; MT_N]);
        for (word, token) in words.iter_mut().zip(tokens.iter()) {
            *word = token.parse().map_err(|_| error())?;
        }
        let index: usize = tokens[MT_N].parse().map_err(|_| error())?;
        if index > MT_N {
            return Err(error());
        }
        Ok(Self { words, index })
    }
}

macro_rules! impl_rng_core {
    ($name:ident) => {
        impl RngCore for $name {
            fn next_u32(&mut self) -> u32 {
                if <$name as RandomEngine>::MAX == u32::MAX {
                    RandomEngine::next(self)
                } else {
                    self.next_seed()
                }
            }

            fn next_u64(&mut self) -> u64 {
                let low = self.next_u32();
                let high = self.next_u32();
                u64::from(low) | (u64::from(high) << 32)
            }

            fn fill_bytes(&mut self, dest: &mut [u8]) {
                for chunk in dest.chunks_mut(4) {
                    let bytes = self.next_u32().to_le_bytes();
                    chunk.copy_from_slice(&bytes[..chunk.len()]);
                }
            }

            fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
                self.fill_bytes(dest);
                Ok(())
            }
        }
    };
}

impl_rng_core!(Lcg);
impl_rng_core!(Mt19937);

/// Generator selected for this build.
#[cfg(feature = "rng-lcg")]
pub type Generator = Lcg;

/// Generator selected for this build.
#[cfg(not(feature = "rng-lcg"))]
pub type Generator = Mt19937;

#[cfg(test)]
mod test_random {
    use super::*;

    fn reproducible<G: RandomEngine>() {
        let mut a = G::from_seed_u32(100500);
        let mut b = G::from_seed_u32(100500);
        for _ in 0..1000 {
            assert_eq!(a.next(), b.next());
        }
    }

    fn roundtrip<G: RandomEngine>() {
        let mut a = G::from_seed_u32(42);
        for _ in 0..777 {
            a.next();
        }
        let mut b = G::deserialize_state(&a.serialize_state()).unwrap();
        for _ in 0..2000 {
            assert_eq!(a.next(), b.next());
        }
    }

    fn distinct_substates<G: RandomEngine>(n: usize) {
        let mut a = G::from_seed_u32(1);
        let mut b = G::from_seed_u32(1);
        let states = a.multiply(n).unwrap();
        let again = b.multiply(n).unwrap();
        assert_eq!(states.len(), n);
        let serialized = states
            .iter()
            .map(|s| s.serialize_state())
            .collect::<HashSet<_>>();
        assert_eq!(serialized.len(), n);
        for (s1, s2) in states.iter().zip(again.iter()) {
            assert_eq!(s1.serialize_state(), s2.serialize_state());
        }
    }

    fn histogram<G: RandomEngine>() {
        let mut g = G::from_seed_u32(100500);
        let n_bins = 8;
        let samples = 80_000;
        let mut bins = vec![0usize; n_bins];
        let mut sum = 0.0;
        for _ in 0..samples {
            let x = g.next_real();
            assert!((0.0..=1.0).contains(&x));
            sum += x as f64;
            let bin = ((x as f64 * n_bins as f64) as usize).min(n_bins - 1);
            bins[bin] += 1;
        }
        let expected = samples / n_bins;
        for count in bins {
            assert!((count as f64 - expected as f64).abs() < 0.05 * expected as f64);
        }
        assert!((sum / samples as f64 - 0.5).abs() < 0.01);
    }

    fn time_seeded_differ<G: RandomEngine>() {
        let a = G::from_time();
        let b = G::from_time();
        assert_ne!(a.serialize_state(), b.serialize_state());
    }

    fn bad_input<G: RandomEngine>() {
        let valid = G::from_seed_u32(3).serialize_state();
        let truncated = &valid[..valid.len() / 2];
        if G::MAX == u32::MAX {
            assert!(G::deserialize_state(truncated).is_err());
        }
        assert!(G::deserialize_state(&format!("a-a-a-a-a-{valid}")).is_err());
        assert!(G::deserialize_state("Noone expects the Spanish Inquisition!").is_err());
        assert!(G::deserialize_state("").is_err());
    }

    #[test]
    fn lcg_sequence() {
        let mut g = Lcg::from_seed_u32(0);
        // state_1 = 2531011 -> (2531011 >> 16) & 0x7FFF
        assert_eq!(g.next(), (2531011u32 >> 16) & 0x7FFF);
        assert!(Lcg::MAX >= 0x7FFF);
    }

    #[test]
    fn mt_reference_output() {
        // First output of std::mt19937 with its default seed
        let mut g = Mt19937::from_seed_u32(5489);
        assert_eq!(g.next(), 3499211612);
        let mut g = Mt19937::from_seed_u32(5489);
        for _ in 0..9999 {
            g.next();
        }
        assert_eq!(g.next(), 4123659995);
    }

    #[test]
    fn lcg_properties() {
        reproducible::<Lcg>();
        roundtrip::<Lcg>();
        distinct_substates::<Lcg>(32);
        distinct_substates::<Lcg>(2000);
        histogram::<Lcg>();
        time_seeded_differ::<Lcg>();
        bad_input::<Lcg>();
    }

    #[test]
    fn mt_properties() {
        reproducible::<Mt19937>();
        roundtrip::<Mt19937>();
        distinct_substates::<Mt19937>(32);
        distinct_substates::<Mt19937>(2000);
        histogram::<Mt19937>();
        time_seeded_differ::<Mt19937>();
        bad_input::<Mt19937>();
    }

    #[test]
    fn standard_normal_moments() {
        let mut g = Generator::from_seed_u32(11);
        let n = 20_000;
        let samples = (0..n).map(|_| g.next_standard_normal()).collect::<Vec<_>>();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05);
        assert!((var - 1.0).abs() < 0.05);
        assert!(samples.iter().all(|x| x.abs() <= 6.0));
    }

    #[test]
    fn drives_rand_distributions() {
        use rand::Rng;
        let mut g = Generator::from_seed_u32(5);
        for _ in 0..100 {
            let x: f64 = g.gen_range(2.0..3.0);
            assert!((2.0..3.0).contains(&x));
        }
    }

    fn wide_outputs_compose_words<G: RandomEngine + RngCore + Clone>() {
        let mut a = G::from_seed_u32(17);
        let mut b = a.clone();
        for _ in 0..50 {
            let low = u64::from(b.next_u32());
            let high = u64::from(b.next_u32());
            assert_eq!(a.next_u64(), low | (high << 32));
        }

        let mut bytes = [0u8; 11];
        a.fill_bytes(&mut bytes);
        let mut expected = Vec::new();
        for _ in 0..3 {
            expected.extend_from_slice(&b.next_u32().to_le_bytes());
        }
        assert_eq!(&bytes[..], &expected[..11]);
        assert_eq!(a.next_u32(), b.next_u32());
    }

    #[test]
    fn wide_outputs() {
        wide_outputs_compose_words::<Lcg>();
        wide_outputs_compose_words::<Mt19937>();
    }
}
