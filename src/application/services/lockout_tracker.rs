use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    application::error::ApplicationError,
    domain::{config::global::PolicyConfig, models::security::LoginAttemptState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_failures: u32,
    pub base_lock: Duration,
    pub reset_escalation_on_success: bool,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failures: 5,
            base_lock: Duration::minutes(10),
            reset_escalation_on_success: false,
        }
    }
}

impl LockoutPolicy {
    pub fn from_policy(policy: &PolicyConfig) -> Self {
        Self {
            max_failures: policy.max_failed_logins.max(1),
            base_lock: Duration::minutes(policy.lock_base_minutes),
            reset_escalation_on_success: policy.reset_escalation_on_success,
        }
    }

    /// `base * 2^escalation`, saturating instead of overflowing.
    pub fn lock_duration(&self, escalation: u32) -> Duration {
        let factor = 1i64.checked_shl(escalation.min(62)).unwrap_or(i64::MAX);
        let minutes = self.base_lock.num_minutes().saturating_mul(factor);
        Duration::try_minutes(minutes).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedLoginOutcome {
    RemainingAttempts(u32),
    Locked {
        duration: Duration,
        until: DateTime<Utc>,
    },
}

/// Per-username failure counting with escalating lock windows.
pub struct LockoutTracker {
    policy: LockoutPolicy,
    attempts: Mutex<HashMap<String, LoginAttemptState>>,
}

impl LockoutTracker {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            policy,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Fails with `AccountLocked` while a lock window is open. An elapsed
    /// window is cleared here; the escalation level is kept.
    pub async fn check_at(&self, username: &str, now: DateTime<Utc>) -> Result<(), ApplicationError> {
        let mut attempts = self.attempts.lock().await;
        let Some(state) = attempts.get_mut(username) else {
            return Ok(());
        };

        match state.lock_until {
            Some(until) if now < until => {
                let remaining_secs = (until - now).num_seconds();
                let remaining_minutes = (remaining_secs + 59) / 60;
                Err(ApplicationError::AccountLocked { remaining_minutes })
            }
            Some(_) => {
                info!("Lock window for {} elapsed", username);
                state.lock_until = None;
                state.failure_count = 0;
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub async fn record_failure_at(&self, username: &str, now: DateTime<Utc>) -> FailedLoginOutcome {
        let mut attempts = self.attempts.lock().await;
        let state = attempts.entry(username.to_string()).or_default();

        state.failure_count += 1;

        if state.failure_count < self.policy.max_failures {
            return FailedLoginOutcome::RemainingAttempts(
                self.policy.max_failures - state.failure_count,
            );
        }

        let duration = self.policy.lock_duration(state.lock_escalation_count);
        let until = now.checked_add_signed(duration).unwrap_or(DateTime::<Utc>::MAX_UTC);

        state.lock_until = Some(until);
        state.lock_escalation_count = state.lock_escalation_count.saturating_add(1);
        state.failure_count = 0;

        warn!(
            "Account {} locked for {} minute(s) after repeated failures",
            username,
            duration.num_minutes()
        );

        FailedLoginOutcome::Locked { duration, until }
    }

    pub async fn reset(&self, username: &str) {
        let mut attempts = self.attempts.lock().await;

        if self.policy.reset_escalation_on_success {
            attempts.remove(username);
            return;
        }

        let drop_entry = match attempts.get_mut(username) {
            Some(state) => {
                state.failure_count = 0;
                state.lock_until = None;
                state.lock_escalation_count == 0
            }
            None => false,
        };

        if drop_entry {
            attempts.remove(username);
        }
    }

    pub async fn state(&self, username: &str) -> Option<LoginAttemptState> {
        self.attempts.lock().await.get(username).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fail_times(tracker: &LockoutTracker, user: &str, n: u32, now: DateTime<Utc>) -> FailedLoginOutcome {
        let mut last = FailedLoginOutcome::RemainingAttempts(0);
        for _ in 0..n {
            last = tracker.record_failure_at(user, now).await;
        }
        last
    }

    #[test]
    fn lock_durations_double() {
        let policy = LockoutPolicy::default();
        let minutes: Vec<i64> = (0..4).map(|n| policy.lock_duration(n).num_minutes()).collect();
        assert_eq!(minutes, vec![10, 20, 40, 80]);
    }

    #[test]
    fn lock_duration_saturates() {
        let policy = LockoutPolicy::default();
        assert!(policy.lock_duration(200) > policy.lock_duration(20));
    }

    #[tokio::test]
    async fn reports_remaining_attempts() {
        let tracker = LockoutTracker::new(LockoutPolicy::default());
        let now = Utc::now();
        assert_eq!(
            tracker.record_failure_at("alice", now).await,
            FailedLoginOutcome::RemainingAttempts(4)
        );
        assert_eq!(
            fail_times(&tracker, "alice", 3, now).await,
            FailedLoginOutcome::RemainingAttempts(1)
        );
    }

    #[tokio::test]
    async fn fifth_failure_locks_and_resets_count() {
        let tracker = LockoutTracker::new(LockoutPolicy::default());
        let now = Utc::now();

        match fail_times(&tracker, "alice", 5, now).await {
            FailedLoginOutcome::Locked { duration, until } => {
                assert_eq!(duration, Duration::minutes(10));
                assert_eq!(until, now + Duration::minutes(10));
            }
            other => panic!("expected lock, got {:?}", other),
        }

        let state = tracker.state("alice").await.unwrap();
        assert_eq!(state.failure_count, 0);
        assert_eq!(state.lock_escalation_count, 1);

        match tracker.check_at("alice", now + Duration::minutes(3)).await {
            Err(ApplicationError::AccountLocked { remaining_minutes }) => {
                assert_eq!(remaining_minutes, 7)
            }
            other => panic!("expected lock, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn remaining_minutes_round_up() {
        let tracker = LockoutTracker::new(LockoutPolicy::default());
        let now = Utc::now();
        fail_times(&tracker, "alice", 5, now).await;

        match tracker
            .check_at("alice", now + Duration::minutes(9) + Duration::seconds(30))
            .await
        {
            Err(ApplicationError::AccountLocked { remaining_minutes }) => {
                assert_eq!(remaining_minutes, 1)
            }
            other => panic!("expected lock, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn repeated_lockouts_escalate() {
        let tracker = LockoutTracker::new(LockoutPolicy::default());
        let mut now = Utc::now();
        let mut observed = Vec::new();

        for _ in 0..4 {
            tracker.check_at("alice", now).await.unwrap();
            match fail_times(&tracker, "alice", 5, now).await {
                FailedLoginOutcome::Locked { duration, until } => {
                    observed.push(duration.num_minutes());
                    now = until;
                }
                other => panic!("expected lock, got {:?}", other),
            }
        }

        assert_eq!(observed, vec![10, 20, 40, 80]);
    }

    #[tokio::test]
    async fn expired_lock_allows_and_clears_failures() {
        let tracker = LockoutTracker::new(LockoutPolicy::default());
        let now = Utc::now();
        fail_times(&tracker, "alice", 5, now).await;

        tracker
            .check_at("alice", now + Duration::minutes(10))
            .await
            .unwrap();
        let state = tracker.state("alice").await.unwrap();
        assert_eq!(state.lock_until, None);
        assert_eq!(state.failure_count, 0);
    }

    #[tokio::test]
    async fn success_keeps_escalation_by_default() {
        let tracker = LockoutTracker::new(LockoutPolicy::default());
        let now = Utc::now();
        fail_times(&tracker, "alice", 5, now).await;
        tracker.reset("alice").await;

        let state = tracker.state("alice").await.unwrap();
        assert_eq!(state.failure_count, 0);
        assert_eq!(state.lock_until, None);
        assert_eq!(state.lock_escalation_count, 1);

        match fail_times(&tracker, "alice", 5, now).await {
            FailedLoginOutcome::Locked { duration, .. } => {
                assert_eq!(duration, Duration::minutes(20))
            }
            other => panic!("expected lock, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn success_can_reset_escalation() {
        let tracker = LockoutTracker::new(LockoutPolicy {
            reset_escalation_on_success: true,
            ..LockoutPolicy::default()
        });
        let now = Utc::now();
        fail_times(&tracker, "alice", 5, now).await;
        tracker.reset("alice").await;
        assert!(tracker.state("alice").await.is_none());

        match fail_times(&tracker, "alice", 5, now).await {
            FailedLoginOutcome::Locked { duration, .. } => {
                assert_eq!(duration, Duration::minutes(10))
            }
            other => panic!("expected lock, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn usernames_are_tracked_independently() {
        let tracker = LockoutTracker::new(LockoutPolicy::default());
        let now = Utc::now();
        fail_times(&tracker, "alice", 5, now).await;
        tracker.check_at("bob", now).await.unwrap();
    }
}
