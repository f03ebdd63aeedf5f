use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::utils::consts::FIXED_TRIALS;

/// Draw a fresh seed for a session that was not given one.
pub fn fresh_seed() -> u64 {
    rand::rng().random()
}

/// Bytes for one session: `pattern` followed by `random` bytes from `seed`.
pub fn trial_bytes(pattern: &[u8], random: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bytes = Vec::with_capacity(pattern.len() + random);
    bytes.extend_from_slice(pattern);
    bytes.extend((0..random).map(|_| rng.random::<u8>()));
    bytes
}

/// The fixed pattern every default session starts with.
pub fn fixed_pattern() -> Vec<u8> {
    FIXED_TRIALS.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_first() {
        let bytes = trial_bytes(&fixed_pattern(), 50, 1);
        assert_eq!(bytes.len(), 55);
        assert_eq!(&bytes[..5], &[0x55, 0xA3, 0x00, 0xFF, 0x42]);
    }

    #[test]
    fn test_seed_reproducible() {
        assert_eq!(trial_bytes(&[], 32, 42), trial_bytes(&[], 32, 42));
        assert_ne!(trial_bytes(&[], 32, 42), trial_bytes(&[], 32, 43));
    }
}
