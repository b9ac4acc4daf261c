//! Frame and request metering.
//!
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use tokio::{task::JoinHandle, time::interval};

/// Length of an FPS window in milliseconds.
const FPS_WINDOW_MS: f64 = 1000.0;

/// Outcome of one loop tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tick {
    /// Frames counted in the window that just closed.
    pub fps: Option<u64>,
    /// Whether this tick samples a frame for detection.
    pub sample: bool,
}

/// Frame counter of the live loop.
///
/// The same counter drives sampling and FPS: it counts ticks since the last FPS window closed,
/// and every `sample_every`-th count samples a frame.
#[derive(Debug)]
pub struct FrameMeter {
    sample_every: u64,
    frame_count: u64,
    last_time_ms: f64,
    fps: u64,
}

impl FrameMeter {
    pub fn new(sample_every: u64) -> Self {
        Self {
            sample_every: sample_every.max(1),
            frame_count: 0,
            last_time_ms: 0.0,
            fps: 0,
        }
    }

    /// Count a tick at `now_ms`, the loop timestamp in milliseconds.
    pub fn tick(&mut self, now_ms: f64) -> Tick {
        let mut tick = Tick::default();

        if now_ms - self.last_time_ms >= FPS_WINDOW_MS {
            self.fps = self.frame_count;
            self.frame_count = 0;
            self.last_time_ms = now_ms;
            tick.fps = Some(self.fps);
        }
        self.frame_count += 1;

        tick.sample = self.frame_count % self.sample_every == 0;
        tick
    }

    pub fn fps(&self) -> u64 {
        self.fps
    }
}

pub static METER: Meter = Meter::new();

/// Process-wide counters of live detection requests.
#[derive(Default)]
pub struct Meter {
    sent_requests: AtomicU64,
    answered_requests: AtomicU64,
    discarded_answers: AtomicU64,
}

impl Meter {
    pub const fn new() -> Meter {
        Meter {
            sent_requests: AtomicU64::new(0),
            answered_requests: AtomicU64::new(0),
            discarded_answers: AtomicU64::new(0),
        }
    }

    pub fn tick_sent(&self) {
        self.sent_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_answered(&self) {
        self.answered_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an answer that arrived after its live session stopped.
    pub fn tick_discarded(&self) {
        self.discarded_answers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_reset_sent(&self) -> u64 {
        self.sent_requests.swap(0, Ordering::Relaxed)
    }

    pub fn get_reset_answered(&self) -> u64 {
        self.answered_requests.swap(0, Ordering::Relaxed)
    }

    pub fn get_reset_discarded(&self) -> u64 {
        self.discarded_answers.swap(0, Ordering::Relaxed)
    }

    pub fn get_reset_stats(&self) -> RequestStats {
        RequestStats {
            sent: self.get_reset_sent(),
            answered: self.get_reset_answered(),
            discarded: self.get_reset_discarded(),
        }
    }
}

/// One logging window of request counters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RequestStats {
    pub sent: u64,
    pub answered: u64,
    pub discarded: u64,
}

impl RequestStats {
    /// Share of sent requests answered within the window. Answers to requests of an earlier window
    /// can push it above 1.
    pub fn answer_ratio(&self) -> Option<f32> {
        (self.sent > 0).then(|| self.answered as f32 / self.sent as f32)
    }

    /// Summary line, or `None` for a window without traffic.
    pub fn summary(&self, elapsed_secs: f32) -> Option<String> {
        if self.sent == 0 && self.answered == 0 && self.discarded == 0 {
            return None;
        }

        let mut line = format!(
            "Detection requests: {:.2}/s sent, {:.2}/s answered",
            self.sent as f32 / elapsed_secs,
            self.answered as f32 / elapsed_secs
        );
        if let Some(ratio) = self.answer_ratio() {
            line.push_str(&format!(", {:.0}% answered", ratio * 100.0));
        }
        if self.discarded > 0 {
            line.push_str(&format!(", {} stale answers dropped", self.discarded));
        }
        Some(line)
    }
}

pub fn spawn_meter_logger() -> JoinHandle<()> {
    tokio::spawn(async {
        let mut log_interval = interval(Duration::from_secs(2));
        log_interval.tick().await;

        loop {
            let start = Instant::now();
            log_interval.tick().await;

            let stats = METER.get_reset_stats();
            if let Some(line) = stats.summary(start.elapsed().as_secs_f32()) {
                log::info!("{line}");
            }
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_request_stats_window() {
        let meter = Meter::new();
        for _ in 0..4 {
            meter.tick_sent();
        }
        meter.tick_answered();
        meter.tick_answered();
        meter.tick_answered();
        meter.tick_discarded();

        let stats = meter.get_reset_stats();
        assert_eq!(
            stats,
            RequestStats {
                sent: 4,
                answered: 3,
                discarded: 1
            }
        );
        assert_eq!(stats.answer_ratio(), Some(0.75));
        assert_eq!(
            stats.summary(2.0).as_deref(),
            Some("Detection requests: 2.00/s sent, 1.50/s answered, 75% answered, 1 stale answers dropped")
        );

        // Counters start over with the next window
        let stats = meter.get_reset_stats();
        assert_eq!(stats, RequestStats::default());
        assert_eq!(stats.answer_ratio(), None);
        assert_eq!(stats.summary(2.0), None);
    }

    #[test]
    fn test_samples_every_fifth_tick() {
        let mut meter = FrameMeter::new(5);

        let sampled: Vec<usize> = (1..=20)
            .filter(|i| meter.tick(*i as f64 * 10.0).sample)
            .collect();

        assert_eq!(sampled, vec![5, 10, 15, 20]);
    }

    #[test]
    fn test_fps_only_after_full_window() {
        let mut meter = FrameMeter::new(5);

        // 60 ticks in the first 990ms
        for i in 0..60 {
            assert_eq!(meter.tick(i as f64 * 16.5).fps, None);
        }

        let tick = meter.tick(1000.0);
        assert_eq!(tick.fps, Some(60));
        assert_eq!(meter.fps(), 60);

        // Window restarts at 1000ms, nothing reported before 2000ms
        for i in 1..30 {
            assert_eq!(meter.tick(1000.0 + i as f64 * 33.0).fps, None);
        }
        assert_eq!(meter.tick(2000.0).fps, Some(30));
    }

    #[test]
    fn test_sampling_restarts_with_window() {
        let mut meter = FrameMeter::new(5);
        for i in 0..7 {
            meter.tick(i as f64);
        }

        // Counter resets when the window closes, the fifth tick after that samples again
        let ticks: Vec<Tick> = (0..5).map(|i| meter.tick(1000.0 + i as f64)).collect();
        assert_eq!(ticks[0].fps, Some(7));
        assert!(!ticks[0].sample);
        assert!(!ticks[3].sample);
        assert!(ticks[4].sample);
    }

    #[test]
    fn test_request_meter_resets() {
        let meter = Meter::new();
        meter.tick_sent();
        meter.tick_sent();
        meter.tick_answered();

        assert_eq!(meter.get_reset_sent(), 2);
        assert_eq!(meter.get_reset_sent(), 0);
        assert_eq!(meter.get_reset_answered(), 1);
    }
}
