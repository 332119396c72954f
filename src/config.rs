use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::parimutuel::{BLEND_THRESHOLD, DEFAULT_HOUSE_CUT};
use crate::simulation::{MC_ITERATIONS, RANDOM_SEED};

const MAX_HOUSE_CUT: f64 = 0.50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub iterations: usize,
    pub seed: u64,
    /// 0 runs the single-stream simulator; otherwise the partitioned parallel one.
    pub partitions: usize,
    pub blend_threshold: f64,
    pub house_cut: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            iterations: MC_ITERATIONS,
            seed: RANDOM_SEED,
            partitions: 0,
            blend_threshold: BLEND_THRESHOLD,
            house_cut: DEFAULT_HOUSE_CUT,
        }
    }
}

impl EngineConfig {
    /// Defaults, then an optional JSON file, then `DARTS_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        Ok(base.with_env_overrides().sanitized())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read engine config {}", path.display()))?;
        serde_json::from_str(&raw).context("parse engine config")
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse("DARTS_MC_ITERATIONS") {
            self.iterations = v;
        }
        if let Some(v) = env_parse("DARTS_MC_SEED") {
            self.seed = v;
        }
        if let Some(v) = env_parse("DARTS_MC_PARTITIONS") {
            self.partitions = v;
        }
        if let Some(v) = env_parse("DARTS_BLEND_THRESHOLD") {
            self.blend_threshold = v;
        }
        if let Some(v) = env_parse("DARTS_HOUSE_CUT") {
            self.house_cut = v;
        }
        self
    }

    /// Pulls out-of-range values back to something the engine can price with.
    pub fn sanitized(mut self) -> Self {
        self.iterations = self.iterations.max(1);
        if !(self.blend_threshold.is_finite() && self.blend_threshold > 0.0) {
            self.blend_threshold = BLEND_THRESHOLD;
        }
        self.house_cut = if self.house_cut.is_finite() {
            self.house_cut.clamp(0.0, MAX_HOUSE_CUT)
        } else {
            DEFAULT_HOUSE_CUT
        };
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<T>().ok())
}
