use std::time::Duration;

use crate::error::ErrorKind;

const DEFAULT_SCHEDULE_SECS: [u64; 4] = [5, 15, 60, 300];

/// What is known about the network when a retry is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    Online,
    Offline,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after this delay.
    RetryAfter(Duration),
    /// The network is down; wait for the regular schedule instead.
    Offline,
    /// Every delay in the schedule has been used. Waits for a manual trigger.
    Exhausted,
    /// Fatal or cancelled. Never retried automatically.
    NotRetryable,
}

/// Fixed backoff schedule for failed syncs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::from_secs(&DEFAULT_SCHEDULE_SECS)
    }
}

impl RetrySchedule {
    pub fn from_secs(secs: &[u64]) -> Self {
        Self {
            delays: secs.iter().map(|s| Duration::from_secs(*s)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    /// Delay before retry number `retry_count` (1-based), if the schedule still allows one.
    pub fn delay_for(&self, retry_count: u32) -> Option<Duration> {
        let index = (retry_count as usize).checked_sub(1)?;
        self.delays.get(index).copied()
    }

    pub fn decide(&self, kind: ErrorKind, retry_count: u32, connectivity: Connectivity) -> RetryDecision {
        if kind != ErrorKind::Transient {
            return RetryDecision::NotRetryable;
        }
        if connectivity == Connectivity::Offline {
            return RetryDecision::Offline;
        }
        match self.delay_for(retry_count) {
            Some(delay) => RetryDecision::RetryAfter(delay),
            None => RetryDecision::Exhausted,
        }
    }
}
