//! Configuration of the replay memories.
//!
//! Defaults are the values the memories were tuned with on the 20x20
//! navigation task; every struct serializes to YAML via [`load`] / [`save`]
//! style methods on the top-level configs.
//!
//! [`load`]: UniformReplayBufferConfig::load
//! [`save`]: UniformReplayBufferConfig::save
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Parameters of prioritized sampling.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PerConfig {
    /// Priority sharpening exponent; 0 degenerates to uniform sampling.
    pub alpha: f64,

    /// Initial importance-weight exponent.
    pub beta_0: f64,

    /// Sampling steps after which beta reaches 1.0.
    pub beta_frames: usize,

    /// Additive floor keeping every priority strictly positive.
    pub epsilon: f64,
}

impl Default for PerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            beta_0: 0.4,
            beta_frames: 100_000,
            epsilon: 1e-6,
        }
    }
}

impl PerConfig {
    /// Sets the prioritization exponent.
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the initial importance-weight exponent.
    pub fn beta_0(mut self, beta_0: f64) -> Self {
        self.beta_0 = beta_0;
        self
    }

    /// Sets the annealing horizon in sampling steps.
    pub fn beta_frames(mut self, beta_frames: usize) -> Self {
        self.beta_frames = beta_frames;
        self
    }

    /// Sets the additive priority floor.
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }
}

/// Configuration of [`UniformReplayBuffer`].
///
/// [`UniformReplayBuffer`]: super::UniformReplayBuffer
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct UniformReplayBufferConfig {
    /// Maximum number of stored transitions.
    pub capacity: usize,

    /// Seed of the sampling RNG.
    pub seed: u64,
}

impl Default for UniformReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            seed: 42,
        }
    }
}

impl UniformReplayBufferConfig {
    /// Sets the capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the RNG seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Configuration of [`PrioritizedReplayBuffer`].
///
/// [`PrioritizedReplayBuffer`]: super::PrioritizedReplayBuffer
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PrioritizedReplayBufferConfig {
    /// Maximum number of stored transitions.
    pub capacity: usize,

    /// Seed of the sampling RNG.
    pub seed: u64,

    /// Prioritized-sampling parameters.
    pub per_config: PerConfig,
}

impl Default for PrioritizedReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            seed: 42,
            per_config: PerConfig::default(),
        }
    }
}

impl PrioritizedReplayBufferConfig {
    /// Sets the capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the RNG seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the prioritized-sampling parameters.
    pub fn per_config(mut self, per_config: PerConfig) -> Self {
        self.per_config = per_config;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Configuration of [`DualPrioritizedReplayBuffer`].
///
/// The capacity split of the sub-pools defaults to 60/40 of a 10k memory;
/// rebalancing parameters mirror the reward-gated router's tuning.
///
/// [`DualPrioritizedReplayBuffer`]: super::DualPrioritizedReplayBuffer
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DualPrioritizedReplayBufferConfig {
    /// Configuration of the normal pool.
    pub normal: PrioritizedReplayBufferConfig,

    /// Configuration of the elite pool.
    pub elite: PrioritizedReplayBufferConfig,

    /// Rewards at or above this go to the elite pool.
    pub elite_threshold: f64,

    /// Normal-pool sampling share at construction.
    pub initial_ratio: f64,

    /// Lower bound of the sampling share.
    pub min_ratio: f64,

    /// Upper bound of the sampling share.
    pub max_ratio: f64,

    /// Fixed share used once past the auxiliary training phase.
    pub main_phase_ratio: f64,

    /// Weight of the decaying exploration term in the rebalance formula.
    pub p0: f64,

    /// Weight of the loss-share term in the rebalance formula.
    pub p1: f64,

    /// Fraction of training after which the auxiliary phase ends.
    pub beta_t: f64,

    /// Planned total training episodes, the denominator of the phase clock.
    pub total_episodes: usize,
}

impl Default for DualPrioritizedReplayBufferConfig {
    fn default() -> Self {
        let per_config = PerConfig::default().alpha(0.7);
        Self {
            normal: PrioritizedReplayBufferConfig::default()
                .capacity(6_000)
                .per_config(per_config.clone()),
            elite: PrioritizedReplayBufferConfig::default()
                .capacity(4_000)
                .seed(43)
                .per_config(per_config),
            elite_threshold: 2.0,
            initial_ratio: 0.5,
            min_ratio: 0.3,
            max_ratio: 0.8,
            main_phase_ratio: 0.4,
            p0: 0.4,
            p1: 0.5,
            beta_t: 0.4,
            total_episodes: 500,
        }
    }
}

impl DualPrioritizedReplayBufferConfig {
    /// Sets the elite reward threshold.
    pub fn elite_threshold(mut self, elite_threshold: f64) -> Self {
        self.elite_threshold = elite_threshold;
        self
    }

    /// Sets the planned total training episodes.
    pub fn total_episodes(mut self, total_episodes: usize) -> Self {
        self.total_episodes = total_episodes;
        self
    }

    /// Sets the initial normal-pool sampling share.
    pub fn initial_ratio(mut self, initial_ratio: f64) -> Self {
        self.initial_ratio = initial_ratio;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Configuration of [`DualObstacleReplayBuffer`].
///
/// The capacity split defaults to 30/70 of a 10k memory.
///
/// [`DualObstacleReplayBuffer`]: super::DualObstacleReplayBuffer
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DualObstacleReplayBufferConfig {
    /// Configuration of the near-obstacle pool.
    pub near: UniformReplayBufferConfig,

    /// Configuration of the general pool.
    pub all: UniformReplayBufferConfig,

    /// Near-pool sampling share at construction.
    pub initial_ratio: f64,

    /// Lower bound of the sampling share.
    pub min_ratio: f64,

    /// Upper bound of the sampling share.
    pub max_ratio: f64,

    /// Weight of the decaying exploration term in the rebalance formula.
    pub p0: f64,

    /// Weight of the loss-share term in the rebalance formula.
    pub p1: f64,

    /// Fraction of training after which the near pool is retired.
    pub beta_t: f64,

    /// Planned total training episodes, the denominator of the phase clock.
    pub total_episodes: usize,
}

impl Default for DualObstacleReplayBufferConfig {
    fn default() -> Self {
        Self {
            near: UniformReplayBufferConfig::default().capacity(3_000),
            all: UniformReplayBufferConfig::default().capacity(7_000).seed(43),
            initial_ratio: 0.4,
            min_ratio: 0.0,
            max_ratio: 0.6,
            p0: 0.3,
            p1: 0.6,
            beta_t: 0.4,
            total_episodes: 500,
        }
    }
}

impl DualObstacleReplayBufferConfig {
    /// Sets the planned total training episodes.
    pub fn total_episodes(mut self, total_episodes: usize) -> Self {
        self.total_episodes = total_episodes;
        self
    }

    /// Sets the initial near-pool sampling share.
    pub fn initial_ratio(mut self, initial_ratio: f64) -> Self {
        self.initial_ratio = initial_ratio;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Configuration of [`NStepProcessor`].
///
/// [`NStepProcessor`]: super::NStepProcessor
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct NStepConfig {
    /// Window length of the n-step backup.
    pub n_steps: usize,

    /// Discount factor applied per step in the window.
    pub gamma: f64,
}

impl Default for NStepConfig {
    fn default() -> Self {
        Self {
            n_steps: 3,
            gamma: 0.9,
        }
    }
}

impl NStepConfig {
    /// Sets the window length.
    pub fn n_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = n_steps;
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn dual_prioritized_config_round_trips_through_yaml() {
        let dir = TempDir::new("gridnav-replay-config").unwrap();
        let path = dir.path().join("dual.yaml");

        let config = DualPrioritizedReplayBufferConfig::default()
            .elite_threshold(5.0)
            .total_episodes(1_000);
        config.save(&path).unwrap();
        let loaded = DualPrioritizedReplayBufferConfig::load(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn obstacle_config_round_trips_through_yaml() {
        let dir = TempDir::new("gridnav-replay-config").unwrap();
        let path = dir.path().join("obstacle.yaml");

        let config = DualObstacleReplayBufferConfig::default().initial_ratio(0.25);
        config.save(&path).unwrap();
        let loaded = DualObstacleReplayBufferConfig::load(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn defaults_match_the_tuned_constants() {
        let per = PerConfig::default();
        assert_eq!(per.alpha, 0.6);
        assert_eq!(per.beta_0, 0.4);
        assert_eq!(per.beta_frames, 100_000);

        let dual = DualPrioritizedReplayBufferConfig::default();
        assert_eq!(dual.normal.capacity + dual.elite.capacity, 10_000);
        assert_eq!(dual.normal.per_config.alpha, 0.7);
        assert_eq!(dual.elite_threshold, 2.0);

        let obstacle = DualObstacleReplayBufferConfig::default();
        assert_eq!(obstacle.near.capacity + obstacle.all.capacity, 10_000);
        assert_eq!(obstacle.min_ratio, 0.0);
        assert_eq!(obstacle.max_ratio, 0.6);
    }
}
