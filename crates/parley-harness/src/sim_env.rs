//! Simulation environment.
//!
//! Time comes from tokio's clock, which turmoil and `start_paused` tests
//! drive virtually, or from a manual clock advanced by the test. Randomness
//! comes from a seeded ChaCha RNG, so connection IDs repeat across runs.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use parley_core::env::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::time::Instant;

/// Wall-clock reading at simulated time zero (2023-11-14T22:13:20Z).
pub const SIM_EPOCH_MILLIS: u64 = 1_700_000_000_000;

/// Deterministic environment for tests and simulation.
///
/// Clones share the RNG and, for manual environments, the clock.
#[derive(Clone)]
pub struct SimEnv {
    origin: Instant,
    manual: Option<Arc<Mutex<Duration>>>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Environment on tokio's clock with seed 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment on tokio's clock with the given RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            origin: Instant::now(),
            manual: None,
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Environment whose clock only moves on [`SimEnv::advance`].
    ///
    /// For synchronous driver tests. `sleep` still uses tokio's clock.
    pub fn manual(seed: u64) -> Self {
        Self { manual: Some(Arc::new(Mutex::new(Duration::ZERO))), ..Self::with_seed(seed) }
    }

    /// Move a manual clock forward. No effect on tokio-clocked environments.
    pub fn advance(&self, by: Duration) {
        if let Some(elapsed) = &self.manual {
            *elapsed.lock().unwrap_or_else(PoisonError::into_inner) += by;
        }
    }

    /// Time since this environment was created.
    pub fn elapsed(&self) -> Duration {
        self.now() - self.origin
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        match &self.manual {
            Some(elapsed) => self.origin + *elapsed.lock().unwrap_or_else(PoisonError::into_inner),
            None => Instant::now(),
        }
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }

    fn wall_clock_millis(&self) -> u64 {
        SIM_EPOCH_MILLIS + self.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_ids() {
        let a = SimEnv::with_seed(42);
        let b = SimEnv::with_seed(42);
        assert_eq!(a.random_u64(), b.random_u64());
        assert_eq!(a.random_u64(), b.random_u64());
    }

    #[test]
    fn different_seeds_diverge() {
        assert_ne!(SimEnv::with_seed(1).random_u64(), SimEnv::with_seed(2).random_u64());
    }

    #[test]
    fn manual_clock_moves_only_on_advance() {
        let env = SimEnv::manual(0);
        let start = env.now();
        assert_eq!(env.now(), start);
        assert_eq!(env.wall_clock_millis(), SIM_EPOCH_MILLIS);

        env.clone().advance(Duration::from_millis(1500));
        assert_eq!(env.now() - start, Duration::from_millis(1500));
        assert_eq!(env.wall_clock_millis(), SIM_EPOCH_MILLIS + 1500);
    }

    #[tokio::test(start_paused = true)]
    async fn runtime_clock_follows_tokio() {
        let env = SimEnv::new();
        env.sleep(Duration::from_secs(3)).await;
        let elapsed = env.wall_clock_millis() - SIM_EPOCH_MILLIS;
        assert!((3000..3010).contains(&elapsed), "elapsed {elapsed}ms");
    }
}
