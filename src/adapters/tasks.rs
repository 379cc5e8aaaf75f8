use std::{sync::Arc, time::Duration};

use crate::application::services::{
    account_reaper::AccountReaper, capacity_gate::CapacityGate, file_lifecycle::FileLifecycle,
};

fn every(secs: u64) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval
}

/// Backstop for the per-file timers, which do not survive a crash mid-sleep.
pub fn start_expiry_sweep_task(lifecycle: Arc<FileLifecycle>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = every(interval_secs);

        loop {
            interval.tick().await;

            match lifecycle.sweep_expired().await {
                Ok(0) => {}
                Ok(count) => {
                    tracing::info!("Expiry sweep removed {} file(s)", count);
                }
                Err(e) => {
                    tracing::error!("Expiry sweep failed: {}", e);
                }
            }
        }
    });
}

pub fn start_account_reaper_task(reaper: Arc<AccountReaper>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = every(interval_secs);

        loop {
            interval.tick().await;

            match reaper.reap().await {
                Ok(reaped) if reaped.is_empty() => {
                    tracing::debug!("Account reaper found no inactive accounts");
                }
                Ok(reaped) => {
                    tracing::info!("Account reaper removed {} account(s): {:?}", reaped.len(), reaped);
                }
                Err(e) => {
                    tracing::error!("Account reaper failed: {}", e);
                }
            }
        }
    });
}

pub fn start_capacity_monitor_task(gate: Arc<CapacityGate>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = every(interval_secs);

        loop {
            interval.tick().await;

            if let Err(e) = gate.monitor().await {
                tracing::error!("Capacity monitor failed: {}", e);
            }
        }
    });
}
