//! Deterministic hashing for variant bucketing.
//!
//! Not cryptographic. The only requirements are that the same input maps to
//! the same bucket on every platform and across restarts, and that buckets
//! are close to uniform.

/// FNV-1a over the bytes, then a SplitMix64 finalizer for bit diffusion.
#[must_use]
pub fn stable_hash64(s: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in s.as_bytes() {
        h ^= u64::from(*b);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    splitmix64(h)
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Map a hash into `[0, 1)` using its top 53 bits.
#[must_use]
pub fn unit_interval(hash: u64) -> f64 {
    (hash >> 11) as f64 / (1u64 << 53) as f64
}

/// Bucket position of a session within an experiment.
pub fn bucket(session_id: &str, experiment_id: &str) -> f64 {
    unit_interval(stable_hash64(&format!("{}_{}", session_id, experiment_id)))
}

/// Stable 16 hex digit stand-in for a session id, safe to log.
pub fn anonymize(session_id: &str) -> String {
    format!("{:016x}", stable_hash64(session_id))
}
