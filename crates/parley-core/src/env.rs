//! Environment abstraction for deterministic testing.
//!
//! Decouples relay logic from system resources (time, randomness). Enables
//! deterministic simulation with a virtual clock and seeded RNG, and
//! production use with real system resources.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async sleep.
///
/// # Invariants
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `wall_clock_millis()` is milliseconds since the Unix epoch
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment.
    ///
    /// Production uses `std::time::Instant`, simulation uses the virtual
    /// clock's instant.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + std::fmt::Debug
        + std::ops::Add<Duration, Output = Self::Instant>
        + std::ops::Sub<Output = Duration>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code (not relay logic) should sleep.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Wall-clock time in milliseconds since the Unix epoch.
    ///
    /// Used only to timestamp line events; never for timeout decisions.
    fn wall_clock_millis(&self) -> u64;

    /// Generates a random `u64`.
    ///
    /// Used for connection (session) identifiers.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
