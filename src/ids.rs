use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

const SUFFIX_LEN: usize = 8;

/// Generates a row identifier: `{prefix}_{unix_millis}_{random suffix}`.
///
/// Collision-resistant enough for row creation; the store's primary-key
/// uniqueness constraint is the real guard, and a collision surfaces as an
/// ordinary insert conflict.
pub fn new_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), suffix)
}
