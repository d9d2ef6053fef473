use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::models::Category;

pub trait ResponseSelector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns an index below `pool_len`. `previous` is the variant last
    /// served for `category` in the caller's session.
    fn select(&self, category: Category, pool_len: usize, previous: Option<usize>) -> usize;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    #[default]
    Random,
    RoundRobin,
    First,
}

impl SelectionPolicy {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::RoundRobin => "round_robin",
            Self::First => "first",
        }
    }

    pub fn build(self) -> Arc<dyn ResponseSelector> {
        match self {
            Self::Random => Arc::new(RandomSelector),
            Self::RoundRobin => Arc::new(RoundRobinSelector::new()),
            Self::First => Arc::new(FirstSelector),
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "random" | "shuffle" => Ok(Self::Random),
            "round_robin" | "rotate" => Ok(Self::RoundRobin),
            "first" | "fixed" => Ok(Self::First),
            other => Err(ConfigError::UnknownSelectionPolicy(other.to_string())),
        }
    }
}

/// Uniform pick that never repeats `previous` when there is an alternative.
#[derive(Debug, Default)]
pub struct RandomSelector;

impl ResponseSelector for RandomSelector {
    fn name(&self) -> &'static str {
        "random"
    }

    fn select(&self, _category: Category, pool_len: usize, previous: Option<usize>) -> usize {
        if pool_len <= 1 {
            return 0;
        }

        let mut rng = rand::rng();
        match previous.filter(|prev| *prev < pool_len) {
            Some(prev) => {
                let pick = rng.random_range(0..pool_len - 1);
                if pick >= prev {
                    pick + 1
                } else {
                    pick
                }
            }
            None => rng.random_range(0..pool_len),
        }
    }
}

#[derive(Debug)]
pub struct RoundRobinSelector {
    counters: Vec<AtomicUsize>,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self {
            counters: Category::ALL.iter().map(|_| AtomicUsize::new(0)).collect(),
        }
    }
}

impl Default for RoundRobinSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSelector for RoundRobinSelector {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn select(&self, category: Category, pool_len: usize, _previous: Option<usize>) -> usize {
        if pool_len == 0 {
            return 0;
        }
        let slot = &self.counters[category as usize];
        slot.fetch_add(1, Ordering::Relaxed) % pool_len
    }
}

#[derive(Debug, Default)]
pub struct FirstSelector;

impl ResponseSelector for FirstSelector {
    fn name(&self) -> &'static str {
        "first"
    }

    fn select(&self, _category: Category, _pool_len: usize, _previous: Option<usize>) -> usize {
        0
    }
}
