use parking_lot::Mutex;
use rand::{RngExt as _, SeedableRng as _};

/// Source of the rolls used for `FAIL_RATE` based failure injection.
#[derive(Debug)]
pub enum FailureDice {
    Entropy,
    /// Reproducible sequence of rolls, shared by all requests.
    Seeded(Mutex<rand::rngs::StdRng>),
}

impl FailureDice {
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::Seeded(Mutex::new(rand::rngs::StdRng::seed_from_u64(seed))),
            None => Self::Entropy,
        }
    }

    /// Roll a value in `[0, 1)`.
    pub fn roll(&self) -> f64 {
        match self {
            Self::Entropy => rand::random(),
            Self::Seeded(rng) => rng.lock().random(),
        }
    }

    /// Returns true with the given probability.
    ///
    /// A rate of `0.0` never rolls, so it does not consume seeded rolls either.
    pub fn hits(&self, rate: f64) -> bool {
        if rate <= 0. {
            return false;
        }
        self.roll() < rate
    }
}
