//! Locally-unique id generation.
//!
//! Ids are `base36(unix_millis) + base36(random u64)`. This is not
//! collision-free in any formal sense — it is probabilistically unique,
//! which is acceptable because local-mode ids never cross a network
//! boundary with concurrent writers. When a remote authority is
//! configured it assigns ids server-side and this generator is unused.

use chrono::Utc;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a new locally-unique id.
pub fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u128;
    let noise = u128::from(rand::random::<u64>());
    let mut id = to_base36(millis);
    id.push_str(&to_base36(noise));
    id
}

/// Current wall-clock time in unix milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn to_base36(mut n: u128) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(25);
    while n > 0 {
        buf.push(ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    // ALPHABET is ASCII, so the bytes are valid UTF-8.
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn base36_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(46_655), "zzz");
    }

    #[test]
    fn generated_ids_are_lowercase_alphanumeric() {
        let id = generate_id();
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    /// Probabilistic smoke check, not a proof: a large batch of ids must
    /// not collide.
    #[test]
    fn no_collisions_across_many_generations() {
        let n = 10_000;
        let ids: HashSet<String> = (0..n).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), n);
    }

    #[test]
    fn now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000); // sanity: after 2020
    }
}
