use rand::{Rng, SeedableRng, rngs::StdRng};

/// Progress value shown while a request is outstanding.
///
/// This is cosmetic: it creeps toward [`SimulatedProgress::CEILING`] in random
/// steps and has no relation to bytes actually transferred. Only a finished
/// upload reaches 100.
#[derive(Debug)]
pub struct SimulatedProgress {
    percent: u8,
    rng: StdRng,
}

impl SimulatedProgress {
    pub const CEILING: u8 = 90;
    const MIN_STEP: u8 = 5;
    const MAX_STEP: u8 = 15;

    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self { percent: 0, rng }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Move forward by a random step, never past the ceiling.
    pub fn advance(&mut self) -> u8 {
        let step = self.rng.gen_range(Self::MIN_STEP..=Self::MAX_STEP);
        self.percent = self.percent.saturating_add(step).min(Self::CEILING);
        self.percent
    }

    pub fn complete(&mut self) -> u8 {
        self.percent = 100;
        self.percent
    }
}

impl Default for SimulatedProgress {
    fn default() -> Self {
        Self::new()
    }
}
