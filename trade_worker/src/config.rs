//! Worker configuration.
//!
//! Every value comes from a `TRD_*` environment variable. Missing or invalid values are logged and replaced by the
//! default, so the worker always starts. See `cli-help.txt` for the full list.
use std::{env, time::Duration};

use esi_tools::EsiConfig;
use log::*;
use trade_common::parse_boolean_flag;

/// The Forge, home of the Jita market.
pub const DEFAULT_REFERENCE_REGION_ID: i64 = 10000002;
pub const DEFAULT_AUTO_SELL_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_AUTO_BUY_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_AUTO_FULFILL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_CONTRACT_SYNC_INTERVAL: Duration = Duration::from_secs(600);
pub const DEFAULT_OUTBOX_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_OUTBOX_BATCH_SIZE: i64 = 100;
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Region whose market prices are used as the reference for every policy.
    pub reference_region_id: i64,
    pub intervals: WorkerIntervals,
    pub outbox_batch_size: i64,
    pub event_buffer_size: usize,
    pub disable_auto_fulfill: bool,
    pub disable_contract_sync: bool,
    /// If true, the embedded migrations are not applied on start-up.
    pub skip_migrations: bool,
    pub esi: EsiConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerIntervals {
    pub auto_sell: Duration,
    pub auto_buy: Duration,
    pub auto_fulfill: Duration,
    pub contract_sync: Duration,
    pub outbox: Duration,
}

impl Default for WorkerIntervals {
    fn default() -> Self {
        Self {
            auto_sell: DEFAULT_AUTO_SELL_INTERVAL,
            auto_buy: DEFAULT_AUTO_BUY_INTERVAL,
            auto_fulfill: DEFAULT_AUTO_FULFILL_INTERVAL,
            contract_sync: DEFAULT_CONTRACT_SYNC_INTERVAL,
            outbox: DEFAULT_OUTBOX_INTERVAL,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: String::default(),
            reference_region_id: DEFAULT_REFERENCE_REGION_ID,
            intervals: WorkerIntervals::default(),
            outbox_batch_size: DEFAULT_OUTBOX_BATCH_SIZE,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            disable_auto_fulfill: false,
            disable_contract_sync: false,
            skip_migrations: false,
            esi: EsiConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("TRD_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ TRD_DATABASE_URL is not set. Please set it to the URL for the trade database.");
            String::default()
        });
        let reference_region_id = number_from_env("TRD_REFERENCE_REGION_ID", DEFAULT_REFERENCE_REGION_ID);
        let intervals = WorkerIntervals {
            auto_sell: interval_from_env("TRD_AUTO_SELL_INTERVAL", DEFAULT_AUTO_SELL_INTERVAL),
            auto_buy: interval_from_env("TRD_AUTO_BUY_INTERVAL", DEFAULT_AUTO_BUY_INTERVAL),
            auto_fulfill: interval_from_env("TRD_AUTO_FULFILL_INTERVAL", DEFAULT_AUTO_FULFILL_INTERVAL),
            contract_sync: interval_from_env("TRD_CONTRACT_SYNC_INTERVAL", DEFAULT_CONTRACT_SYNC_INTERVAL),
            outbox: interval_from_env("TRD_OUTBOX_INTERVAL", DEFAULT_OUTBOX_INTERVAL),
        };
        let outbox_batch_size = number_from_env("TRD_OUTBOX_BATCH_SIZE", DEFAULT_OUTBOX_BATCH_SIZE).max(1);
        let event_buffer_size = number_from_env("TRD_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE).max(1);
        let disable_auto_fulfill = parse_boolean_flag(env::var("TRD_DISABLE_AUTO_FULFILL").ok(), false);
        if disable_auto_fulfill {
            warn!("🪛️ Auto-fulfill is disabled. Buy orders will not be matched.");
        }
        let disable_contract_sync = parse_boolean_flag(env::var("TRD_DISABLE_CONTRACT_SYNC").ok(), false);
        if disable_contract_sync {
            warn!("🪛️ Contract sync is disabled. Purchases will not be settled.");
        }
        let skip_migrations = parse_boolean_flag(env::var("TRD_SKIP_MIGRATIONS").ok(), false);
        let esi = EsiConfig::new_from_env_or_default();
        Self {
            database_url,
            reference_region_id,
            intervals,
            outbox_batch_size,
            event_buffer_size,
            disable_auto_fulfill,
            disable_contract_sync,
            skip_migrations,
            esi,
        }
    }
}

fn interval_from_env(name: &str, default: Duration) -> Duration {
    parse_interval(name, env::var(name).ok(), default)
}

/// Parses a whole number of seconds. Zero, negative or malformed values fall back to the default.
pub fn parse_interval(name: &str, value: Option<String>, default: Duration) -> Duration {
    let Some(value) = value else {
        info!("🪛️ {name} is not set. Using the default value of {}s.", default.as_secs());
        return default;
    };
    match value.trim().parse::<u64>() {
        Ok(0) => {
            warn!("🪛️ {name} must be at least one second. Using the default value of {}s.", default.as_secs());
            default
        },
        Ok(secs) => Duration::from_secs(secs),
        Err(e) => {
            warn!("🪛️ Invalid configuration value for {name}: {value}. {e}. Using {}s.", default.as_secs());
            default
        },
    }
}

fn number_from_env<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    parse_number(name, env::var(name).ok(), default)
}

fn parse_number<T>(name: &str, value: Option<String>, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    match value {
        None => default,
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name}: {s}. {e}. Using the default, {default}, instead.");
            default
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn intervals() {
        let default = Duration::from_secs(60);
        assert_eq!(parse_interval("X", None, default), default);
        assert_eq!(parse_interval("X", Some("15".into()), default), Duration::from_secs(15));
        assert_eq!(parse_interval("X", Some(" 15 ".into()), default), Duration::from_secs(15));
        assert_eq!(parse_interval("X", Some("0".into()), default), default);
        assert_eq!(parse_interval("X", Some("-5".into()), default), default);
        assert_eq!(parse_interval("X", Some("5m".into()), default), default);
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_number("X", None, 10000002i64), 10000002);
        assert_eq!(parse_number("X", Some("10000043".into()), 10000002i64), 10000043);
        assert_eq!(parse_number("X", Some("Domain".into()), 10000002i64), 10000002);
        assert_eq!(parse_number("X", Some("128".into()), 64usize), 128);
    }

    #[test]
    fn defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.reference_region_id, 10000002);
        assert_eq!(config.intervals.auto_fulfill, Duration::from_secs(60));
        assert!(!config.skip_migrations);
        assert!(!config.disable_auto_fulfill);
    }
}
