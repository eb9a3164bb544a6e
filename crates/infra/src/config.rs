//! Runtime configuration for the retail services.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use storeline_catalog::DEFAULT_LOW_STOCK_THRESHOLD;
use storeline_insights::promotion::DEFAULT_VALIDITY_DAYS;

pub const ENV_COMMIT_TIMEOUT_MS: &str = "STORELINE_COMMIT_TIMEOUT_MS";
pub const ENV_STATS_MAX_ATTEMPTS: &str = "STORELINE_STATS_MAX_ATTEMPTS";
pub const ENV_STOCK_POLICY: &str = "STORELINE_STOCK_POLICY";
pub const ENV_PROMOTION_VALIDITY_DAYS: &str = "STORELINE_PROMOTION_VALIDITY_DAYS";
pub const ENV_LOW_STOCK_THRESHOLD: &str = "STORELINE_LOW_STOCK_THRESHOLD";
pub const ENV_INACTIVE_DAYS: &str = "STORELINE_INACTIVE_DAYS";

/// Whether a sale may drive a stock counter below zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StockPolicy {
    /// Overselling is recorded; the counter goes negative.
    #[default]
    AllowNegative,
    /// The commit fails if any counter would go negative.
    RejectNegative,
}

impl StockPolicy {
    pub fn allows_negative(self) -> bool {
        self == StockPolicy::AllowNegative
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StockPolicy::AllowNegative => "allow-negative",
            StockPolicy::RejectNegative => "reject-negative",
        }
    }
}

impl core::fmt::Display for StockPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow-negative" => Ok(StockPolicy::AllowNegative),
            "reject-negative" => Ok(StockPolicy::RejectNegative),
            other => Err(format!(
                "unknown stock policy '{other}' (expected allow-negative or reject-negative)"
            )),
        }
    }
}

/// Retail service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetailConfig {
    /// Upper bound for one atomic commit.
    pub commit_timeout: Duration,
    /// Compare-and-swap attempts for one customer aggregate update.
    pub stats_max_attempts: u32,
    pub stock_policy: StockPolicy,
    pub promotion_validity_days: i64,
    /// Applied to products added without an explicit threshold.
    pub low_stock_threshold: i64,
    /// Default window for the inactive customers query.
    pub inactive_days: i64,
}

impl Default for RetailConfig {
    fn default() -> Self {
        Self {
            commit_timeout: Duration::from_secs(5),
            stats_max_attempts: 3,
            stock_policy: StockPolicy::AllowNegative,
            promotion_validity_days: DEFAULT_VALIDITY_DAYS,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            inactive_days: 30,
        }
    }
}

impl RetailConfig {
    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = timeout;
        self
    }

    pub fn with_stats_max_attempts(mut self, attempts: u32) -> Self {
        self.stats_max_attempts = attempts.max(1);
        self
    }

    pub fn with_stock_policy(mut self, policy: StockPolicy) -> Self {
        self.stock_policy = policy;
        self
    }

    pub fn with_promotion_validity_days(mut self, days: i64) -> Self {
        self.promotion_validity_days = days;
        self
    }

    pub fn with_low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    pub fn with_inactive_days(mut self, days: i64) -> Self {
        self.inactive_days = days;
        self
    }

    /// Read overrides from `STORELINE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`. Unset keys keep their defaults;
    /// unparsable or out-of-range values are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_COMMIT_TIMEOUT_MS, |v| *v > 0) {
            config.commit_timeout = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_var::<u32, _>(&lookup, ENV_STATS_MAX_ATTEMPTS, |v| *v > 0) {
            config.stats_max_attempts = attempts;
        }
        if let Some(policy) = parse_var::<StockPolicy, _>(&lookup, ENV_STOCK_POLICY, |_| true) {
            config.stock_policy = policy;
        }
        if let Some(days) = parse_var::<i64, _>(&lookup, ENV_PROMOTION_VALIDITY_DAYS, |v| *v > 0) {
            config.promotion_validity_days = days;
        }
        if let Some(threshold) = parse_var::<i64, _>(&lookup, ENV_LOW_STOCK_THRESHOLD, |v| *v >= 0)
        {
            config.low_stock_threshold = threshold;
        }
        if let Some(days) = parse_var::<i64, _>(&lookup, ENV_INACTIVE_DAYS, |v| *v >= 0) {
            config.inactive_days = days;
        }

        config
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, valid: impl Fn(&T) -> bool) -> Option<T>
where
    T: FromStr,
    T::Err: core::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => Some(value),
        Ok(_) => {
            warn!(key, value = %raw, "configuration value out of range, using default");
            None
        }
        Err(err) => {
            warn!(key, value = %raw, error = %err, "invalid configuration value, using default");
            None
        }
    }
}
