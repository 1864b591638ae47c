//! Chronologically sortable entry keys.
//!
//! A key is 20 characters: 8 encode the creation time in milliseconds and 12
//! carry entropy. The alphabet is in ASCII order, so keys sort by creation
//! time. Keys generated within the same millisecond increment the entropy
//! part and therefore still sort in generation order.

use std::sync::{Mutex, PoisonError};

use chrono::Utc;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const TIME_LEN: usize = 8;
const SUFFIX_LEN: usize = 12;

/// Generates push keys for new entries.
#[derive(Debug, Default)]
pub struct PushIdGenerator {
    state: Mutex<PushState>,
}

#[derive(Debug, Default)]
struct PushState {
    last_millis: i64,
    suffix: [u8; SUFFIX_LEN],
    counter: u64,
}

impl PushIdGenerator {
    /// Create a generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a key for the current time.
    pub fn next_id(&self) -> String {
        self.next_id_at(Utc::now().timestamp_millis())
    }

    /// Generate a key for the given time in milliseconds since the epoch.
    pub fn next_id_at(&self, millis: i64) -> String {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.counter = state.counter.wrapping_add(1);

        if millis == state.last_millis {
            increment(&mut state.suffix);
        } else {
            state.last_millis = millis;
            state.suffix = entropy(millis, state.counter);
        }

        let mut id = String::with_capacity(TIME_LEN + SUFFIX_LEN);
        id.push_str(&encode_time(millis));
        id.extend(state.suffix.iter().map(|&i| char::from(PUSH_CHARS[usize::from(i)])));
        id
    }
}

fn encode_time(millis: i64) -> String {
    let mut now = u64::try_from(millis).unwrap_or(0);
    let mut chars = [0u8; TIME_LEN];
    for slot in chars.iter_mut().rev() {
        *slot = PUSH_CHARS[usize::try_from(now % 64).unwrap_or(0)];
        now /= 64;
    }
    chars.iter().map(|&c| char::from(c)).collect()
}

fn entropy(millis: i64, counter: u64) -> [u8; SUFFIX_LEN] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&millis.to_le_bytes());
    hasher.update(&counter.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    hasher.update(&Utc::now().timestamp_subsec_nanos().to_le_bytes());
    let hash = hasher.finalize();

    let mut suffix = [0u8; SUFFIX_LEN];
    for (slot, byte) in suffix.iter_mut().zip(hash.as_bytes()) {
        *slot = byte % 64;
    }
    suffix
}

fn increment(suffix: &mut [u8; SUFFIX_LEN]) {
    for digit in suffix.iter_mut().rev() {
        if *digit == 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
}
