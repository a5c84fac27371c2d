use std::time::Duration;

use serde::Serialize;

use super::visible::RebuildSummary;

pub(crate) const REBUILD_WINDOW_LEN: usize = 120;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RollingMsStats {
    pub last_ms: f32,
    pub avg_ms: f32,
    pub max_ms: f32,
}

/// Visible-tile cache diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RebuildStatsSnapshot {
    pub rebuilds: u64,
    pub frames: u64,
    pub last_tiles: usize,
    pub last_creatures: usize,
    pub rebuild_time: RollingMsStats,
}

#[derive(Debug, Default)]
pub(crate) struct RebuildStats {
    rebuilds: u64,
    frames: u64,
    last_tiles: usize,
    last_creatures: usize,
    window: RollingWindowMs,
}

impl RebuildStats {
    pub(crate) fn record_rebuild(&mut self, summary: &RebuildSummary, duration: Duration) {
        self.rebuilds += 1;
        self.last_tiles = summary.tiles;
        self.last_creatures = summary.creatures;
        self.window.push_ms(duration_to_ms(duration));
    }

    pub(crate) fn record_frame(&mut self) {
        self.frames += 1;
    }

    pub(crate) fn snapshot(&self) -> RebuildStatsSnapshot {
        RebuildStatsSnapshot {
            rebuilds: self.rebuilds,
            frames: self.frames,
            last_tiles: self.last_tiles,
            last_creatures: self.last_creatures,
            rebuild_time: self.window.snapshot(),
        }
    }
}

#[derive(Debug)]
struct RollingWindowMs {
    samples_ms: [f32; REBUILD_WINDOW_LEN],
    head: usize,
    count: usize,
    sum_ms: f32,
    last_ms: f32,
}

impl Default for RollingWindowMs {
    fn default() -> Self {
        Self {
            samples_ms: [0.0; REBUILD_WINDOW_LEN],
            head: 0,
            count: 0,
            sum_ms: 0.0,
            last_ms: 0.0,
        }
    }
}

impl RollingWindowMs {
    fn push_ms(&mut self, value_ms: f32) {
        self.last_ms = value_ms;
        let evicted = if self.count < REBUILD_WINDOW_LEN {
            self.count += 1;
            0.0
        } else {
            self.samples_ms[self.head]
        };
        self.samples_ms[self.head] = value_ms;
        self.head = (self.head + 1) % REBUILD_WINDOW_LEN;
        self.sum_ms += value_ms - evicted;
    }

    fn snapshot(&self) -> RollingMsStats {
        if self.count == 0 {
            return RollingMsStats::default();
        }
        let max_ms = self.samples_ms[..self.count]
            .iter()
            .copied()
            .fold(f32::MIN, f32::max);
        RollingMsStats {
            last_ms: self.last_ms,
            avg_ms: self.sum_ms / self.count as f32,
            max_ms,
        }
    }
}

fn duration_to_ms(duration: Duration) -> f32 {
    duration.as_secs_f32() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_is_zeroed() {
        let stats = RebuildStats::default();
        assert_eq!(stats.snapshot(), RebuildStatsSnapshot::default());
    }

    #[test]
    fn rebuilds_record_counts_and_timing() {
        let mut stats = RebuildStats::default();
        let summary = RebuildSummary {
            tiles: 42,
            creatures: 3,
            ..RebuildSummary::default()
        };
        stats.record_rebuild(&summary, Duration::from_micros(1_500));
        stats.record_rebuild(&summary, Duration::from_micros(500));
        stats.record_frame();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.rebuilds, 2);
        assert_eq!(snapshot.frames, 1);
        assert_eq!(snapshot.last_tiles, 42);
        assert!((snapshot.rebuild_time.avg_ms - 1.0).abs() < 0.001);
        assert!((snapshot.rebuild_time.max_ms - 1.5).abs() < 0.001);
        assert!((snapshot.rebuild_time.last_ms - 0.5).abs() < 0.001);
    }

    #[test]
    fn full_window_evicts_oldest_sample() {
        let mut window = RollingWindowMs::default();
        window.push_ms(100.0);
        for _ in 1..REBUILD_WINDOW_LEN {
            window.push_ms(10.0);
        }
        window.push_ms(20.0);
        let snapshot = window.snapshot();

        let expected_avg = ((REBUILD_WINDOW_LEN as f32 - 2.0) * 10.0 + 20.0 + 10.0 - 10.0)
            / REBUILD_WINDOW_LEN as f32;
        assert_eq!(snapshot.max_ms, 20.0);
        assert!((snapshot.avg_ms - expected_avg).abs() < 0.01);
    }
}
