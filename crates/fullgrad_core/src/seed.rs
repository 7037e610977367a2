//! Seeds for synthetic recordings.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::step::Step;

/// Master seed of a synthetic recording.
///
/// Every tensor gets its own stream, keyed by tensor name and step, so a
/// recording regenerates identically no matter which tensors are drawn first.
///
/// ```rust
/// use fullgrad_core::{Seed, Step};
/// use rand::Rng;
///
/// let master = Seed::new(42);
/// let mut a = master.stream("gradient/input_image", Step::new(1)).to_rng();
/// let mut b = master.stream("gradient/input_image", Step::new(1)).to_rng();
/// assert_eq!(a.gen::<f32>(), b.gen::<f32>());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seed(u64);

impl Seed {
    /// Wrap a seed value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The seed value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// A ChaCha8 generator seeded with this value.
    #[must_use]
    pub fn to_rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.0)
    }

    /// Seed of the stream for tensor `name` at `step`.
    ///
    /// Mixing is done with SplitMix64 so streams are stable across Rust
    /// releases, unlike `std`'s default hasher.
    #[must_use]
    pub fn stream(&self, name: &str, step: Step) -> Self {
        let state = name
            .bytes()
            .fold(splitmix64(self.0 ^ step.value()), |state, byte| {
                splitmix64(state ^ u64::from(byte))
            });
        Self(splitmix64(state))
    }
}

impl From<u64> for Seed {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_same_seed_same_values() {
        let mut a = Seed::new(42).to_rng();
        let mut b = Seed::new(42).to_rng();
        let xs: Vec<f32> = (0..16).map(|_| a.gen()).collect();
        let ys: Vec<f32> = (0..16).map(|_| b.gen()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_streams_differ_by_name_and_step() {
        let master = Seed::new(7);
        let one = Step::new(1);
        assert_eq!(master.stream("bn1.weight", one), master.stream("bn1.weight", one));
        assert_ne!(master.stream("bn1.weight", one), master.stream("bn1.bias", one));
        assert_ne!(master.stream("bn1.weight", one), master.stream("bn1.weight", Step::new(2)));
        assert_ne!(master.stream("bn1.weight", one), Seed::new(8).stream("bn1.weight", one));
    }

    #[test]
    fn test_stream_values_are_pinned() {
        assert_eq!(splitmix64(0), 0xE220_A839_7B1D_CDAF);
        assert_eq!(
            Seed::new(42).stream("bn1.weight", Step::new(1)).value(),
            4_794_003_113_952_059_268
        );
    }

    #[test]
    fn test_seed_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Seed::new(12345)).unwrap(), "12345");
        let restored: Seed = serde_json::from_str("12345").unwrap();
        assert_eq!(restored, Seed::from(12345));
    }
}
