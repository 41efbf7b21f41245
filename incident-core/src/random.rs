//! Random source for failure injection
//!
//! The injector is the only nondeterministic component, and it draws from
//! a [`RandomSource`] shared across the process. Production runs use a
//! [`SeededSource`] (seeded from config for reproducible demos, or from OS
//! entropy); tests substitute a [`SequenceSource`] with fixed values.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform draws in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    fn next_unit(&self) -> f64;
}

/// Shared reference to a random source
pub type SharedRandom = Arc<dyn RandomSource>;

/// `StdRng` behind a mutex so one generator can serve every caller.
#[derive(Debug)]
pub struct SeededSource {
    rng: Mutex<StdRng>,
    seed: Option<u64>,
}

impl SeededSource {
    /// Reproducible generator.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            seed: Some(seed),
        }
    }

    /// Generator seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            seed: None,
        }
    }

    /// Seeded when `seed` is given, entropy otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => Self::from_seed(s),
            None => Self::from_entropy(),
        }
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn shared(self) -> SharedRandom {
        Arc::new(self)
    }
}

impl RandomSource for SeededSource {
    fn next_unit(&self) -> f64 {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rng.gen::<f64>()
    }
}

/// Replays a fixed list of values, cycling when exhausted.
///
/// An empty list yields `0.0` forever.
#[derive(Debug)]
pub struct SequenceSource {
    values: Vec<f64>,
    cursor: AtomicUsize,
}

impl SequenceSource {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self {
            values: values.into(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Always returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    pub fn shared(self) -> SharedRandom {
        Arc::new(self)
    }

    /// Number of values drawn so far.
    pub fn draws(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl RandomSource for SequenceSource {
    fn next_unit(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.values[i % self.values.len()]
    }
}
