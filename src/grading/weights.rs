//! Weight configuration
//!
//! Evaluation/attention split used by the compositor. The persisted row is
//! read through [`WeightCache`] and handed to callers by value.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

pub const DEFAULT_EVALUATION_WEIGHT: i32 = 70;
pub const DEFAULT_ATTENTION_WEIGHT: i32 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WeightError {
    #[error("weights must add up to 100 (got {evaluation} + {attention} = {sum})")]
    BadSum {
        evaluation: i32,
        attention: i32,
        sum: i32,
    },

    #[error("weight {0} is outside 0..=100")]
    OutOfRange(i32),
}

/// Percent split between the evaluation grade and the attention score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightConfig {
    pub evaluation_weight: i32,
    pub attention_weight: i32,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            evaluation_weight: DEFAULT_EVALUATION_WEIGHT,
            attention_weight: DEFAULT_ATTENTION_WEIGHT,
        }
    }
}

impl WeightConfig {
    /// Build a validated pair. Both values must be in 0..=100 and sum to 100.
    pub fn new(evaluation_weight: i32, attention_weight: i32) -> Result<Self, WeightError> {
        for w in [evaluation_weight, attention_weight] {
            if !(0..=100).contains(&w) {
                return Err(WeightError::OutOfRange(w));
            }
        }

        let sum = evaluation_weight + attention_weight;
        if sum != 100 {
            return Err(WeightError::BadSum {
                evaluation: evaluation_weight,
                attention: attention_weight,
                sum,
            });
        }

        Ok(Self { evaluation_weight, attention_weight })
    }

    pub fn evaluation_factor(&self) -> f64 {
        f64::from(self.evaluation_weight) / 100.0
    }

    pub fn attention_factor(&self) -> f64 {
        f64::from(self.attention_weight) / 100.0
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedWeights {
    weights: WeightConfig,
    loaded_at: Instant,
}

/// Time-bounded cache in front of the persisted weight row.
///
/// A miss runs the loader; a loader returning `None` (no row yet) resolves to
/// the configured fallback without writing anything.
#[derive(Debug, Clone)]
pub struct WeightCache {
    inner: Arc<RwLock<Option<CachedWeights>>>,
    ttl: Duration,
    fallback: WeightConfig,
}

impl WeightCache {
    pub fn new(ttl: Duration, fallback: WeightConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
            ttl,
            fallback,
        }
    }

    /// Cached weights, loading them when the entry is missing or stale.
    pub async fn get_or_load<F, Fut, E>(&self, load: F) -> Result<WeightConfig, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<WeightConfig>, E>>,
    {
        if let Some(cached) = *self.inner.read().await {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.weights);
            }
        }

        let mut slot = self.inner.write().await;
        // Another request may have refreshed while we waited for the lock
        if let Some(cached) = *slot {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.weights);
            }
        }

        let weights = load().await?.unwrap_or(self.fallback);
        *slot = Some(CachedWeights { weights, loaded_at: Instant::now() });
        Ok(weights)
    }

    /// Replace the cached value after a successful write.
    pub async fn store(&self, weights: WeightConfig) {
        *self.inner.write().await = Some(CachedWeights { weights, loaded_at: Instant::now() });
    }
}
