use chrono::Duration;

use super::{parsed_or, ConfigError};

pub const GIB: u64 = 1024 * 1024 * 1024;

fn gib_to_bytes(key: &'static str, gib: u64) -> Result<u64, ConfigError> {
    gib.checked_mul(GIB).ok_or_else(|| ConfigError::Invalid {
        key,
        value: gib.to_string(),
    })
}

/// Tunable policy knobs. Defaults match the production limits.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub storage_limit_bytes: u64,
    pub max_upload_bytes: u64,
    pub warning_percent: f64,
    pub lock_percent: f64,
    pub unlock_percent: f64,
    pub max_failed_logins: u32,
    pub lock_base_minutes: i64,
    pub reset_escalation_on_success: bool,
    pub ip_block_minutes: i64,
    pub inactivity_days: i64,
    pub expiry_sweep_interval_secs: u64,
    pub reaper_interval_secs: u64,
    pub capacity_check_interval_secs: u64,
    pub notification_capacity: usize,
    pub session_ttl_hours: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            storage_limit_bytes: 24 * GIB,
            max_upload_bytes: 10 * GIB,
            warning_percent: 80.0,
            lock_percent: 95.0,
            unlock_percent: 90.0,
            max_failed_logins: 5,
            lock_base_minutes: 10,
            reset_escalation_on_success: false,
            ip_block_minutes: 30,
            inactivity_days: 30,
            expiry_sweep_interval_secs: 600,
            reaper_interval_secs: 3600,
            capacity_check_interval_secs: 3600,
            notification_capacity: 100,
            session_ttl_hours: 12,
        }
    }
}

impl PolicyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let storage_limit_gb = parsed_or("STORAGE_LIMIT_GB", defaults.storage_limit_bytes / GIB)?;
        let max_upload_gb = parsed_or("MAX_UPLOAD_GB", defaults.max_upload_bytes / GIB)?;

        let config = Self {
            storage_limit_bytes: gib_to_bytes("STORAGE_LIMIT_GB", storage_limit_gb)?,
            max_upload_bytes: gib_to_bytes("MAX_UPLOAD_GB", max_upload_gb)?,
            warning_percent: parsed_or("STORAGE_WARNING_PERCENT", defaults.warning_percent)?,
            lock_percent: parsed_or("STORAGE_LOCK_PERCENT", defaults.lock_percent)?,
            unlock_percent: parsed_or("STORAGE_UNLOCK_PERCENT", defaults.unlock_percent)?,
            max_failed_logins: parsed_or("MAX_FAILED_LOGINS", defaults.max_failed_logins)?,
            lock_base_minutes: parsed_or("LOCK_BASE_MINUTES", defaults.lock_base_minutes)?,
            reset_escalation_on_success: parsed_or(
                "RESET_ESCALATION_ON_SUCCESS",
                defaults.reset_escalation_on_success,
            )?,
            ip_block_minutes: parsed_or("IP_BLOCK_MINUTES", defaults.ip_block_minutes)?,
            inactivity_days: parsed_or("INACTIVITY_DAYS", defaults.inactivity_days)?,
            expiry_sweep_interval_secs: parsed_or(
                "EXPIRY_SWEEP_INTERVAL_SECS",
                defaults.expiry_sweep_interval_secs,
            )?,
            reaper_interval_secs: parsed_or("REAPER_INTERVAL_SECS", defaults.reaper_interval_secs)?,
            capacity_check_interval_secs: parsed_or(
                "CAPACITY_CHECK_INTERVAL_SECS",
                defaults.capacity_check_interval_secs,
            )?,
            notification_capacity: parsed_or(
                "NOTIFICATION_CAPACITY",
                defaults.notification_capacity,
            )?,
            session_ttl_hours: parsed_or("SESSION_TTL_HOURS", defaults.session_ttl_hours)?,
        };

        if config.unlock_percent >= config.lock_percent {
            return Err(ConfigError::Invalid {
                key: "STORAGE_UNLOCK_PERCENT",
                value: config.unlock_percent.to_string(),
            });
        }

        Ok(config)
    }

    pub fn inactivity_window(&self) -> Duration {
        Duration::days(self.inactivity_days)
    }

    pub fn ip_block_duration(&self) -> Duration {
        Duration::minutes(self.ip_block_minutes)
    }
}
