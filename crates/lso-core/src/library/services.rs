//! Host services used by nondeterministic builtins
//!
//! Wall-clock time, randomness, hashing and chat output are the only places
//! where builtins touch the outside world. Each sits behind a trait so the
//! engine can be driven deterministically in tests.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha1::{Digest, Sha1};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// Source of uniformly distributed numbers
pub trait RandomSource: Send + Sync {
    /// Uniform float in `[0, 1)`
    fn next_unit(&self) -> f64;

    /// Uniform index in `[0, bound)`; `bound` must be non-zero
    fn next_below(&self, bound: usize) -> usize {
        ((self.next_unit() * bound as f64) as usize).min(bound.saturating_sub(1))
    }
}

/// Hash primitives
pub trait HashProvider: Send + Sync {
    /// Lowercase hex MD5 digest
    fn md5_hex(&self, data: &[u8]) -> String;
    /// Lowercase hex SHA-1 digest
    fn sha1_hex(&self, data: &[u8]) -> String;
}

/// Destination for chat output (`PRINT`, `llSay`, `llOwnerSay`)
pub trait ChatSink: Send + Sync {
    /// Deliver one message
    fn say(&self, object_id: Uuid, channel: i32, text: &str);
}

// ============================================================================
// Clocks
// ============================================================================

/// The system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock stopped at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// ============================================================================
// Randomness
// ============================================================================

/// Thread-local OS-seeded generator
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Reproducible generator
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    /// Create a generator from a seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl fmt::Debug for SeededRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededRandom").finish_non_exhaustive()
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }
}

// ============================================================================
// Hashing
// ============================================================================

/// MD5 and SHA-1 from the `md5` and `sha1` crates
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardHashes;

impl HashProvider for StandardHashes {
    fn md5_hex(&self, data: &[u8]) -> String {
        format!("{:x}", md5::compute(data))
    }

    fn sha1_hex(&self, data: &[u8]) -> String {
        let mut hasher = Sha1::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }
}

// ============================================================================
// Chat
// ============================================================================

/// A chat message captured by [`CollectingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Speaking object
    pub object_id: Uuid,
    /// Chat channel (0 is public)
    pub channel: i32,
    /// Message text
    pub text: String,
}

/// Sends chat to the `tracing` subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ChatSink for TracingSink {
    fn say(&self, object_id: Uuid, channel: i32, text: &str) {
        tracing::info!(target: "lso::chat", %object_id, channel, "{text}");
    }
}

/// Prints chat to standard output
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl ChatSink for StdoutSink {
    fn say(&self, _object_id: Uuid, channel: i32, text: &str) {
        if channel == 0 {
            println!("{text}");
        } else {
            println!("[{channel}] {text}");
        }
    }
}

/// Records chat for later inspection
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<ChatMessage>>,
}

impl CollectingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().clone()
    }

    /// Texts received so far
    pub fn texts(&self) -> Vec<String> {
        self.messages.lock().iter().map(|m| m.text.clone()).collect()
    }
}

impl ChatSink for CollectingSink {
    fn say(&self, object_id: Uuid, channel: i32, text: &str) {
        self.messages.lock().push(ChatMessage {
            object_id,
            channel,
            text: text.to_string(),
        });
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// The set of services an engine hands to builtins
#[derive(Clone)]
pub struct HostServices {
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Random source
    pub random: Arc<dyn RandomSource>,
    /// Hash primitives
    pub hashes: Arc<dyn HashProvider>,
    /// Chat output
    pub chat: Arc<dyn ChatSink>,
}

impl HostServices {
    /// System clock, thread RNG, standard hashes and tracing chat
    pub fn system() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            random: Arc::new(ThreadRandom),
            hashes: Arc::new(StandardHashes),
            chat: Arc::new(TracingSink),
        }
    }

    /// Fixed clock and seeded RNG, for reproducible runs
    pub fn deterministic(now: DateTime<Utc>, seed: u64) -> Self {
        Self {
            clock: Arc::new(FixedClock::new(now)),
            random: Arc::new(SeededRandom::new(seed)),
            ..Self::system()
        }
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the random source
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// Replace the chat sink
    pub fn with_chat(mut self, chat: Arc<dyn ChatSink>) -> Self {
        self.chat = chat;
        self
    }
}

impl Default for HostServices {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for HostServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostServices").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_hashes() {
        let h = StandardHashes;
        assert_eq!(h.md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(h.sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let a = SeededRandom::new(7);
        let b = SeededRandom::new(7);
        for _ in 0..8 {
            let x = a.next_unit();
            assert_eq!(x, b.next_unit());
            assert!((0.0..1.0).contains(&x));
        }
        assert!(a.next_below(5) < 5);
    }

    #[test]
    fn test_fixed_clock() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::new(t);
        assert_eq!(clock.now(), t);
        let later = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        clock.set(later);
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingSink::new();
        sink.say(Uuid::nil(), 0, "hello");
        sink.say(Uuid::nil(), 5, "there");
        assert_eq!(sink.texts(), vec!["hello", "there"]);
        assert_eq!(sink.messages()[1].channel, 5);
    }
}
