//! Wait and burst accounting
//!
//! Per-thread snapshots live in [`ThreadAccounting`]; processor-wide
//! aggregates live in [`DispatchStats`]. All quantities are clock ticks.

use core::fmt;

/// Per-thread timing state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadAccounting {
    /// Tick at which the current READY period began
    pub wait_snapshot: u64,
    /// Tick at which the current RUNNING period began
    pub burst_snapshot: u64,
    /// Ticks spent in the ready queue, over the thread's life
    pub total_wait: u64,
    /// Ticks spent running, over the thread's life
    pub total_run: u64,
    /// Number of times the thread was dispatched to
    pub dispatches: u64,
}

/// Processor-wide aggregates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchStats {
    /// Sum of all completed wait periods
    pub total_waiting: u64,
    /// Threads admitted or adopted
    pub total_threads: u64,
    pub max_burst: u64,
    min_burst: u64,
    /// Bursts longer than zero ticks
    pub non_zero_burst_count: u64,
    /// Sum of all non-zero bursts
    pub busy_time: u64,
    /// Completed dispatches
    pub dispatches: u64,
    /// Finished threads whose resources were released
    pub reclaimed: u64,
    /// Tick of the first accounting event, for utilization
    pub started_at: u64,
    /// Tick of the most recent accounting event
    pub last_tick: u64,
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DispatchStats {
    pub const fn new(started_at: u64) -> Self {
        Self {
            total_waiting: 0,
            total_threads: 0,
            max_burst: 0,
            min_burst: u64::MAX,
            non_zero_burst_count: 0,
            busy_time: 0,
            dispatches: 0,
            reclaimed: 0,
            started_at,
            last_tick: started_at,
        }
    }

    /// Shortest non-zero burst, if any burst was recorded
    pub fn min_burst(&self) -> Option<u64> {
        (self.non_zero_burst_count > 0).then_some(self.min_burst)
    }

    /// Record the end of a wait period
    pub(crate) fn record_wait(&mut self, waited: u64, now: u64) {
        self.total_waiting += waited;
        self.touch(now);
    }

    /// Record the end of a running period; zero-length bursts are not counted
    pub(crate) fn record_burst(&mut self, burst: u64, now: u64) {
        self.touch(now);
        if burst == 0 {
            return;
        }
        self.busy_time += burst;
        self.non_zero_burst_count += 1;
        self.max_burst = self.max_burst.max(burst);
        self.min_burst = self.min_burst.min(burst);
    }

    #[inline]
    fn touch(&mut self, now: u64) {
        self.last_tick = self.last_tick.max(now);
    }

    /// Average wait per thread
    pub fn average_wait(&self) -> f64 {
        if self.total_threads == 0 {
            return 0.0;
        }
        self.total_waiting as f64 / self.total_threads as f64
    }

    /// Average length of a non-zero burst
    pub fn average_burst(&self) -> f64 {
        if self.non_zero_burst_count == 0 {
            return 0.0;
        }
        self.busy_time as f64 / self.non_zero_burst_count as f64
    }

    /// Ticks observed between the first and the most recent event
    pub fn elapsed(&self) -> u64 {
        self.last_tick.saturating_sub(self.started_at)
    }

    /// Fraction of elapsed ticks spent in non-zero bursts, in [0, 1]
    pub fn utilization(&self) -> f64 {
        let elapsed = self.elapsed();
        if elapsed == 0 {
            return 0.0;
        }
        (self.busy_time as f64 / elapsed as f64).min(1.0)
    }
}

impl fmt::Display for DispatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scheduler statistics:")?;
        writeln!(f, "  threads:            {}", self.total_threads)?;
        writeln!(f, "  dispatches:         {}", self.dispatches)?;
        writeln!(f, "  reclaimed:          {}", self.reclaimed)?;
        writeln!(f, "  total waiting:      {}", self.total_waiting)?;
        writeln!(f, "  average wait:       {:.2}", self.average_wait())?;
        writeln!(f, "  busy time:          {}", self.busy_time)?;
        writeln!(f, "  non-zero bursts:    {}", self.non_zero_burst_count)?;
        writeln!(f, "  max burst:          {}", self.max_burst)?;
        match self.min_burst() {
            Some(min) => writeln!(f, "  min burst:          {}", min)?,
            None => writeln!(f, "  min burst:          -")?,
        }
        writeln!(f, "  average burst:      {:.2}", self.average_burst())?;
        write!(f, "  utilization:        {:.1}%", self.utilization() * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_min_max() {
        let mut stats = DispatchStats::new(0);
        assert_eq!(stats.min_burst(), None);

        stats.record_burst(30, 30);
        stats.record_burst(0, 30);
        stats.record_burst(10, 40);
        stats.record_burst(50, 90);

        assert_eq!(stats.max_burst, 50);
        assert_eq!(stats.min_burst(), Some(10));
        assert_eq!(stats.non_zero_burst_count, 3);
        assert_eq!(stats.busy_time, 90);
        assert!((stats.average_burst() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_averages_with_no_data() {
        let stats = DispatchStats::default();
        assert_eq!(stats.average_wait(), 0.0);
        assert_eq!(stats.average_burst(), 0.0);
        assert_eq!(stats.utilization(), 0.0);
    }

    #[test]
    fn test_utilization() {
        let mut stats = DispatchStats::new(100);
        stats.record_burst(25, 150);
        stats.record_wait(5, 200);
        assert_eq!(stats.elapsed(), 100);
        assert!((stats.utilization() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_report_mentions_counters() {
        let mut stats = DispatchStats::new(0);
        stats.total_threads = 2;
        stats.record_wait(8, 8);
        let report = stats.to_string();
        assert!(report.contains("threads:            2"));
        assert!(report.contains("average wait:       4.00"));
        assert!(report.contains("min burst:          -"));
    }
}
