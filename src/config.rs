use crate::domain::{Decimal, PickupFeeSchedule};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Upper bound for every interval, hold and decay setting: one year.
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub boost_expiry_interval: Duration,
    pub earnings_release_interval: Duration,
    pub platform_fee_percent: Decimal,
    pub earnings_hold: chrono::Duration,
    pub boost_decay_step: chrono::Duration,
    pub boost_expiry_mode: BoostExpiryMode,
    pub earnings_release_concurrency: usize,
    pub pickup_fees: PickupFeeSchedule,
}

/// How the expiry processor decides a boost is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoostExpiryMode {
    /// Decrement `until_date` by a fixed step per run and expire once it
    /// reaches `now`.
    #[default]
    Countdown,
    /// Expire once the stored `end_date` is at or before `now`.
    Deadline,
}

/// Fee split and hold period applied to new earnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarningsPolicy {
    pub platform_fee_percent: Decimal,
    pub hold: chrono::Duration,
}

impl Default for EarningsPolicy {
    fn default() -> Self {
        Self {
            platform_fee_percent: Decimal::from(10),
            hold: chrono::Duration::days(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoostExpiryPolicy {
    pub mode: BoostExpiryMode,
    pub decay_step: chrono::Duration,
}

impl Default for BoostExpiryPolicy {
    fn default() -> Self {
        Self {
            mode: BoostExpiryMode::Countdown,
            decay_step: chrono::Duration::minutes(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let boost_expiry_interval =
            Duration::from_secs(parse_secs(&env_map, "BOOST_EXPIRY_INTERVAL_SECS", 3600, 1)?);
        let earnings_release_interval =
            Duration::from_secs(parse_secs(&env_map, "EARNINGS_RELEASE_INTERVAL_SECS", 3600, 1)?);

        let platform_fee_percent = parse_decimal(&env_map, "PLATFORM_FEE_PERCENT", "10")?;
        if platform_fee_percent.is_negative() || platform_fee_percent > Decimal::hundred() {
            return Err(ConfigError::InvalidValue(
                "PLATFORM_FEE_PERCENT".to_string(),
                "must be between 0 and 100".to_string(),
            ));
        }

        let hold_secs = parse_secs(&env_map, "EARNINGS_HOLD_SECS", 259_200, 0)?;
        let earnings_hold = chrono_duration("EARNINGS_HOLD_SECS", hold_secs)?;

        let decay_secs = parse_secs(&env_map, "BOOST_DECAY_STEP_SECS", 1800, 1)?;
        let boost_decay_step = chrono_duration("BOOST_DECAY_STEP_SECS", decay_secs)?;

        let boost_expiry_mode = match env_map
            .get("BOOST_EXPIRY_MODE")
            .map(|s| s.as_str())
            .unwrap_or("countdown")
        {
            "countdown" => BoostExpiryMode::Countdown,
            "deadline" => BoostExpiryMode::Deadline,
            other => {
                return Err(ConfigError::InvalidValue(
                    "BOOST_EXPIRY_MODE".to_string(),
                    format!("must be countdown or deadline, got {}", other),
                ))
            }
        };

        let earnings_release_concurrency = env_map
            .get("EARNINGS_RELEASE_CONCURRENCY")
            .map(|s| s.as_str())
            .unwrap_or("1")
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "EARNINGS_RELEASE_CONCURRENCY".to_string(),
                    "must be an integer >= 1".to_string(),
                )
            })?;

        let pickup_fees = PickupFeeSchedule {
            small: parse_fee(&env_map, "PICKUP_FEE_SMALL", "5")?,
            medium: parse_fee(&env_map, "PICKUP_FEE_MEDIUM", "10")?,
            large: parse_fee(&env_map, "PICKUP_FEE_LARGE", "20")?,
        };

        Ok(Config {
            database_path,
            boost_expiry_interval,
            earnings_release_interval,
            platform_fee_percent,
            earnings_hold,
            boost_decay_step,
            boost_expiry_mode,
            earnings_release_concurrency,
            pickup_fees,
        })
    }

    pub fn earnings_policy(&self) -> EarningsPolicy {
        EarningsPolicy {
            platform_fee_percent: self.platform_fee_percent,
            hold: self.earnings_hold,
        }
    }

    pub fn boost_expiry_policy(&self) -> BoostExpiryPolicy {
        BoostExpiryPolicy {
            mode: self.boost_expiry_mode,
            decay_step: self.boost_decay_step,
        }
    }
}

fn parse_secs(
    env_map: &HashMap<String, String>,
    key: &str,
    default: u64,
    min: u64,
) -> Result<u64, ConfigError> {
    let Some(raw) = env_map.get(key) else {
        return Ok(default);
    };
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| (min..=MAX_DURATION_SECS).contains(secs))
        .ok_or_else(|| {
            ConfigError::InvalidValue(
                key.to_string(),
                format!("must be between {} and {} seconds", min, MAX_DURATION_SECS),
            )
        })
}

fn chrono_duration(key: &str, secs: u64) -> Result<chrono::Duration, ConfigError> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| {
            ConfigError::InvalidValue(key.to_string(), "duration out of range".to_string())
        })
}

fn parse_decimal(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Decimal, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    Decimal::from_str(raw)
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), "must be a decimal".to_string()))
}

fn parse_fee(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Decimal, ConfigError> {
    let fee = parse_decimal(env_map, key, default)?;
    if fee.is_negative() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(fee)
}
