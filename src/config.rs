//! Configuration Module
//!
//! Handles loading and normalizing cache configuration.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::cache::{BUCKET_COUNT, MIN_SWEEP_PERIOD};
use crate::error::{CacheError, Result};

/// Environment variable holding the maximum number of entries
pub const CAPACITY_VAR: &str = "CACHE_CAPACITY";

/// Environment variable holding the TTL in milliseconds
pub const TTL_MS_VAR: &str = "CACHE_TTL_MS";

/// Cache configuration parameters.
///
/// `capacity == 0` means unbounded, `ttl == Duration::ZERO` disables
/// expiration entirely (no buckets, no sweeper).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub capacity: usize,
    /// Nominal lifetime of an entry
    #[serde(rename = "ttl_ms", deserialize_with = "deserialize_ttl_ms")]
    pub ttl: Duration,
}

impl CacheConfig {
    /// Creates a config with the given capacity and TTL.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self { capacity, ttl }
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum entries, negative means unbounded (default: 1000)
    /// - `CACHE_TTL_MS` - TTL in milliseconds, `<= 0` disables TTL (default: 300000)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`CacheConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let capacity = match parse_var(&lookup, CAPACITY_VAR)? {
            Some(raw) => normalize_capacity(raw),
            None => defaults.capacity,
        };
        let ttl = match parse_var(&lookup, TTL_MS_VAR)? {
            Some(raw) => normalize_ttl_ms(raw),
            None => defaults.ttl,
        };

        Ok(Self { capacity, ttl })
    }

    /// Returns true if entries expire.
    pub fn is_ttl_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Interval between two sweeper ticks, or None when TTL is disabled.
    pub fn sweep_period(&self) -> Option<Duration> {
        sweep_schedule(self.ttl).map(|schedule| schedule.period)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl: Duration::from_secs(300),
        }
    }
}

/// How often the sweeper ticks and how many buckets it collects per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SweepSchedule {
    pub period: Duration,
    pub buckets_per_tick: usize,
}

/// Sweep schedule for `ttl`, or None when TTL is disabled.
///
/// One tick normally covers one bucket of width `ttl / BUCKET_COUNT`. When
/// that width is below timer granularity the tick is stretched to at least
/// [`MIN_SWEEP_PERIOD`] and covers several buckets instead, so a full ring
/// rotation still takes about `ttl`.
pub(crate) fn sweep_schedule(ttl: Duration) -> Option<SweepSchedule> {
    if ttl.is_zero() {
        return None;
    }
    let width = ttl / BUCKET_COUNT as u32;
    if width >= MIN_SWEEP_PERIOD {
        return Some(SweepSchedule {
            period: width,
            buckets_per_tick: 1,
        });
    }

    let per_tick = MIN_SWEEP_PERIOD
        .as_nanos()
        .div_ceil(width.as_nanos().max(1))
        .min(BUCKET_COUNT as u128) as usize;
    Some(SweepSchedule {
        period: (width * per_tick as u32).max(MIN_SWEEP_PERIOD),
        buckets_per_tick: per_tick,
    })
}

fn parse_var<F>(lookup: &F, var: &str) -> Result<Option<i64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| CacheError::InvalidConfig {
                var: var.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

fn normalize_capacity(raw: i64) -> usize {
    usize::try_from(raw).unwrap_or(0)
}

fn normalize_ttl_ms(raw: i64) -> Duration {
    u64::try_from(raw)
        .map(Duration::from_millis)
        .unwrap_or(Duration::ZERO)
}

fn deserialize_ttl_ms<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    i64::deserialize(deserializer).map(normalize_ttl_ms)
}
