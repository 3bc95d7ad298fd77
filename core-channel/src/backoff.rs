//! Reconnect backoff.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ChannelError, Result};

/// Exponential backoff with a ceiling on consecutive attempts.
///
/// Attempt `n` (1-based) waits `min(max_delay, base_delay * 2^n)`. With the
/// defaults that is 2s, 4s, 8s, 16s, 30s, after which the channel gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay: Duration,
    #[serde(default = "default_max_delay")]
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
        }
    }
}

impl ReconnectPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Whether attempt `attempt` is still within the ceiling.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Every delay the policy will ever wait, in order.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..=self.max_attempts).map(move |attempt| self.delay_for(attempt))
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_delay.is_zero() {
            return Err(ChannelError::InvalidConfig(
                "base_delay must be > 0".to_string(),
            ));
        }
        if self.max_delay < self.base_delay {
            return Err(ChannelError::InvalidConfig(format!(
                "max_delay ({:?}) must be >= base_delay ({:?})",
                self.max_delay, self.base_delay
            )));
        }
        Ok(())
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule() {
        let delays: Vec<u128> = ReconnectPolicy::default()
            .schedule()
            .map(|d| d.as_millis())
            .collect();
        assert_eq!(delays, vec![2000, 4000, 8000, 16000, 30000]);
    }

    #[test]
    fn ceiling() {
        let policy = ReconnectPolicy::default();
        assert!(policy.allows(5));
        assert!(!policy.allows(6));
    }

    #[test]
    fn large_attempts_saturate_at_max() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn custom_policy() {
        let policy = ReconnectPolicy::default()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(500))
            .with_max_attempts(3);
        let delays: Vec<_> = policy.schedule().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(500)
            ]
        );
    }

    #[test]
    fn validation() {
        assert!(ReconnectPolicy::default().validate().is_ok());
        assert!(ReconnectPolicy::default()
            .with_base_delay(Duration::ZERO)
            .validate()
            .is_err());
        assert!(ReconnectPolicy::default()
            .with_max_delay(Duration::from_millis(10))
            .validate()
            .is_err());
    }
}
