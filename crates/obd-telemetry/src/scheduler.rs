//! PID Scheduler Implementation

use obd_protocol::Pid;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the PID scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Rate for speed, RPM, throttle and load in Hz (default: 5.0)
    pub fast_rate_hz: f64,
    /// Rate for temperatures and other slow PIDs in Hz (default: 1.0)
    pub slow_rate_hz: f64,
    /// Consecutive failures before a PID is polled at a backed-off rate
    pub max_retries: u8,
    /// Interval multiplier applied once `max_retries` is reached
    pub backoff_multiplier: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fast_rate_hz: 5.0,
            slow_rate_hz: 1.0,
            max_retries: 3,
            backoff_multiplier: 4.0,
        }
    }
}

impl SchedulerConfig {
    /// Sampling rate for a PID based on its priority class
    pub fn rate_for(&self, pid: Pid) -> f64 {
        if pid.is_fast() {
            self.fast_rate_hz
        } else {
            self.slow_rate_hz
        }
    }
}

/// A scheduled PID with priority and timing info
#[derive(Debug, Clone)]
pub struct ScheduledPid {
    /// The PID to query
    pub pid: Pid,
    /// Current sampling rate in Hz
    pub rate_hz: f64,
    /// Next scheduled query time
    pub next_query: Instant,
    /// Priority (higher = more important)
    pub priority: u8,
    /// Consecutive failure count
    pub failures: u8,
}

impl ScheduledPid {
    /// Create a new scheduled PID, due immediately
    pub fn new(pid: Pid, rate_hz: f64) -> Self {
        Self {
            pid,
            rate_hz,
            next_query: Instant::now(),
            priority: pid.sampling_priority(),
            failures: 0,
        }
    }

    /// Calculate interval between queries
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz.max(0.01))
    }
}

impl Eq for ScheduledPid {}

impl PartialEq for ScheduledPid {
    fn eq(&self, other: &Self) -> bool {
        self.next_query == other.next_query && self.priority == other.priority
    }
}

impl Ord for ScheduledPid {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior (earliest time first)
        // Then by priority (higher priority first)
        other
            .next_query
            .cmp(&self.next_query)
            .then_with(|| self.priority.cmp(&other.priority))
    }
}

impl PartialOrd for ScheduledPid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// PID Scheduler deciding which watched PID to query next
pub struct PidScheduler {
    /// Scheduled PIDs in priority queue
    queue: BinaryHeap<ScheduledPid>,
    /// Configuration
    config: SchedulerConfig,
}

impl PidScheduler {
    /// Create a scheduler for the given PIDs, all due immediately
    pub fn new(config: SchedulerConfig, pids: impl IntoIterator<Item = Pid>) -> Self {
        let queue: BinaryHeap<_> = pids
            .into_iter()
            .map(|pid| ScheduledPid::new(pid, config.rate_for(pid)))
            .collect();

        info!("PID scheduler created with {} PIDs", queue.len());

        Self { queue, config }
    }

    /// Take the PID that is due soonest
    ///
    /// The caller hands it back through [`PidScheduler::complete`].
    pub fn next(&mut self) -> Option<ScheduledPid> {
        self.queue.pop()
    }

    /// Record the outcome of a query and reschedule the PID
    pub fn complete(&mut self, mut scheduled: ScheduledPid, succeeded: bool) {
        let mut interval = scheduled.interval();

        if succeeded {
            if scheduled.failures >= self.config.max_retries {
                info!("PID {:02X} answering again", scheduled.pid.code());
            }
            scheduled.failures = 0;
        } else {
            scheduled.failures = scheduled.failures.saturating_add(1);
            if scheduled.failures >= self.config.max_retries {
                if scheduled.failures == self.config.max_retries {
                    warn!(
                        "Max retries reached for PID {:02X}, backing off",
                        scheduled.pid.code()
                    );
                }
                interval = interval.mul_f64(self.config.backoff_multiplier);
            }
        }

        debug!("PID {:02X} next query in {:?}", scheduled.pid.code(), interval);
        scheduled.next_query = Instant::now() + interval;
        self.queue.push(scheduled);
    }

    /// Get the number of scheduled PIDs
    pub fn pid_count(&self) -> usize {
        self.queue.len()
    }
}
