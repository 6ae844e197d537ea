//! Swing detection over a sliding window of power levels.
//!
//! Each tick the collaborator derives one bounded power level from the
//! gyro Y rate and pushes it into the detector. A swing is the longest
//! contiguous run of nonzero levels in the window; a qualifying run is
//! scored into an average power and a roll time for the throw animation.

use std::fmt;

/// Number of power levels held in the sliding window.
pub const POWER_WINDOW: usize = 5;

/// Minimum run length for a window to qualify as a swing.
pub const MIN_SWING_SAMPLES: usize = 3;

/// Levels below this are treated as noise and floored to zero.
pub const POWER_FLOOR: u8 = 4;

/// Largest representable power level.
pub const POWER_CEILING: u8 = 16;

/// Divisor mapping a gyro rate in deg/s onto the power scale.
pub const POWER_DIVISOR: f32 = 10.0;

/// Exponent of the scoring curve: hard swings pull away from soft ones.
pub const POWER_EXPONENT: f32 = 1.8;

/// Divisor applied after the exponential curve.
pub const POWER_SCALE_DIVISOR: f32 = 10.0;

/// Shortest allowed throw animation, in seconds (hardest throw).
pub const MIN_ROLL_TIME: f32 = 1.0;

/// Longest allowed throw animation, in seconds (softest throw).
pub const MAX_ROLL_TIME: f32 = 8.0;

/// A scored swing gesture.
///
/// Produced when the window holds a qualifying run. The caller owns
/// debouncing: the detector keeps reporting while the run remains in the
/// window, and the game must ignore reports while a throw is in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingEvent {
    /// Mean power over the scoring slice.
    pub avg_power: f32,
    /// `avg_power^1.8 / 10`, the nonlinear intensity score.
    pub scaled_power: f32,
    /// Throw animation duration in seconds, clamped to [1, 8]. Higher
    /// power rolls faster.
    pub roll_time: f32,
}

impl fmt::Display for SwingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SwingEvent(avg={:.2}, scaled={:.2}, roll_time={:.2}s)",
            self.avg_power, self.scaled_power, self.roll_time
        )
    }
}

/// Maps a gyro Y rate in deg/s onto the bounded power scale.
///
/// The rate is divided down, floored, and clamped to [0, 16]; anything
/// below the noise floor of 4 reads as no motion. Non-finite rates read
/// as no motion as well.
pub fn power_level_from_rate(rate_dps: f32) -> u8 {
    if !rate_dps.is_finite() {
        return 0;
    }

    let level = (rate_dps / POWER_DIVISOR).floor();
    let level = level.clamp(0.0, POWER_CEILING as f32) as u8;
    if level < POWER_FLOOR {
        0
    } else {
        level
    }
}

/// Sliding-window swing detector.
///
/// Holds the last [`POWER_WINDOW`] power levels. Stateless across swings
/// apart from the window contents; one instance per player.
#[derive(Debug, Default)]
pub struct SwingDetector {
    window: [u8; POWER_WINDOW],
}

impl SwingDetector {
    pub fn new() -> Self {
        SwingDetector::default()
    }

    /// Clears the window back to all-zero.
    pub fn reset(&mut self) {
        self.window = [0; POWER_WINDOW];
    }

    /// The current window contents, oldest first.
    pub fn window(&self) -> &[u8; POWER_WINDOW] {
        &self.window
    }

    /// Pushes one power level, evicting the oldest, and scans the window.
    ///
    /// Returns a [`SwingEvent`] when the longest run of nonzero levels is
    /// at least [`MIN_SWING_SAMPLES`] long. The run's final sample is the
    /// deceleration tail of the gesture and is excluded from scoring.
    pub fn push(&mut self, level: u8) -> Option<SwingEvent> {
        self.window.rotate_left(1);
        self.window[POWER_WINDOW - 1] = level.min(POWER_CEILING);

        let (start, count) = self.longest_run();
        if count < MIN_SWING_SAMPLES {
            return None;
        }

        let stroke = &self.window[start..start + count - 1];
        let avg_power = stroke.iter().map(|&v| f32::from(v)).sum::<f32>() / stroke.len() as f32;
        let scaled_power = avg_power.powf(POWER_EXPONENT) / POWER_SCALE_DIVISOR;
        let roll_time = (MAX_ROLL_TIME - scaled_power).clamp(MIN_ROLL_TIME, MAX_ROLL_TIME);

        Some(SwingEvent {
            avg_power,
            scaled_power,
            roll_time,
        })
    }

    /// Greedy left-to-right scan for the longest run of nonzero levels.
    /// A strictly longer run displaces the candidate and the scan jumps
    /// past it, so equal-length runs resolve to the leftmost.
    fn longest_run(&self) -> (usize, usize) {
        let mut start = 0;
        let mut count = 0;
        let mut i = 0;
        while i < POWER_WINDOW {
            let mut run = 0;
            for j in i..POWER_WINDOW {
                if self.window[j] > 0 {
                    run += 1;
                } else {
                    break;
                }
            }
            if run > count {
                start = i;
                count = run;
                i += run;
            } else {
                i += 1;
            }
        }
        (start, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pushes a slice of levels into a fresh detector and returns the
    /// result of the final push, at which point the window equals `levels`.
    fn feed(levels: &[u8; POWER_WINDOW]) -> (SwingDetector, Option<SwingEvent>) {
        let mut detector = SwingDetector::new();
        let mut last = None;
        for &level in levels {
            last = detector.push(level);
        }
        (detector, last)
    }

    #[test]
    fn test_window_always_holds_five() {
        let mut detector = SwingDetector::new();
        assert_eq!(detector.window(), &[0; POWER_WINDOW]);
        for level in 1..=10u8 {
            detector.push(level);
            assert_eq!(detector.window().len(), POWER_WINDOW);
        }
        assert_eq!(detector.window(), &[6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_qualifying_run_drops_tail_sample() {
        let (_, event) = feed(&[0, 0, 5, 6, 7]);
        let event = event.expect("run of three should qualify");

        // Scoring slice is [5, 6]: the trailing 7 is the impact tail.
        assert!((event.avg_power - 5.5).abs() < 1e-5);
        let expected_scaled = 5.5f32.powf(POWER_EXPONENT) / POWER_SCALE_DIVISOR;
        assert!((event.scaled_power - expected_scaled).abs() < 1e-4);
        assert!((event.roll_time - (MAX_ROLL_TIME - expected_scaled)).abs() < 1e-4);
        assert!(event.roll_time > 5.8 && event.roll_time < 5.9, "got {}", event.roll_time);
    }

    #[test]
    fn test_short_run_below_threshold_is_no_swing() {
        let (_, event) = feed(&[0, 0, 0, 0, 4]);
        assert!(event.is_none(), "run of one must not qualify");

        let (_, event) = feed(&[0, 0, 0, 9, 9]);
        assert!(event.is_none(), "run of two must not qualify");
    }

    #[test]
    fn test_maximal_window_rolls_fastest() {
        let (_, event) = feed(&[9, 9, 9, 9, 9]);
        let event = event.expect("full window qualifies");

        assert!((event.avg_power - 9.0).abs() < 1e-5);
        let expected_scaled = 9.0f32.powf(POWER_EXPONENT) / POWER_SCALE_DIVISOR;
        assert!((event.scaled_power - expected_scaled).abs() < 1e-3);
        assert!((event.roll_time - (MAX_ROLL_TIME - expected_scaled)).abs() < 1e-3);

        // Harder swing -> strictly shorter roll than the soft case.
        let (_, soft) = feed(&[0, 0, 5, 6, 7]);
        assert!(event.roll_time < soft.unwrap().roll_time);
    }

    #[test]
    fn test_roll_time_clamped_to_bounds() {
        let (_, event) = feed(&[16, 16, 16, 16, 16]);
        let event = event.expect("maximal window qualifies");
        // 16^1.8 / 10 is far beyond the 8 second span.
        assert_eq!(event.roll_time, MIN_ROLL_TIME);
    }

    #[test]
    fn test_longer_run_wins_over_earlier_shorter_run() {
        // Runs of length 3 (left) and 1 (right): the left run scores, so
        // the slice is [5, 5] and an event is produced. A rightmost pick
        // would have found only the length-1 run and stayed silent.
        let (_, event) = feed(&[5, 5, 5, 0, 6]);
        let event = event.expect("length-three run qualifies");
        assert!((event.avg_power - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_equal_runs_resolve_to_leftmost() {
        let (detector, event) = feed(&[5, 0, 5, 0, 5]);
        assert!(event.is_none(), "three singleton runs are all below threshold");
        assert_eq!(detector.longest_run(), (0, 1), "leftmost singleton wins the tie");

        let (detector, _) = feed(&[5, 0, 5, 5, 0]);
        assert_eq!(
            detector.longest_run(),
            (2, 2),
            "a strictly longer run displaces an earlier shorter one"
        );
    }

    #[test]
    fn test_detector_keeps_reporting_until_run_ages_out() {
        let mut detector = SwingDetector::new();
        for level in [0, 0, 5, 6, 7] {
            detector.push(level);
        }

        // The run is still in the window on the next quiet ticks; debounce
        // is the caller's job, so the detector keeps reporting.
        assert!(detector.push(0).is_some());
        assert!(detector.push(0).is_some());
        // Window is now [6, 7, 0, 0, 0]: run of two, below threshold.
        assert!(detector.push(0).is_none());
    }

    #[test]
    fn test_power_level_noise_floor() {
        assert_eq!(power_level_from_rate(35.0), 0, "level 3 is under the noise floor");
        assert_eq!(power_level_from_rate(39.9), 0);
        assert_eq!(power_level_from_rate(47.0), 4, "level 4 is the first real level");
    }

    #[test]
    fn test_power_level_ceiling() {
        assert_eq!(power_level_from_rate(160.0), 16);
        assert_eq!(power_level_from_rate(170.0), 16);
        assert_eq!(power_level_from_rate(10_000.0), 16);
    }

    #[test]
    fn test_power_level_rejects_negative_and_non_finite() {
        assert_eq!(power_level_from_rate(-120.0), 0);
        assert_eq!(power_level_from_rate(f32::NAN), 0);
        assert_eq!(power_level_from_rate(f32::INFINITY), 0);
        assert_eq!(power_level_from_rate(f32::NEG_INFINITY), 0);
    }

    #[test]
    fn test_reset_clears_window() {
        let (mut detector, _) = feed(&[9, 9, 9, 9, 9]);
        detector.reset();
        assert_eq!(detector.window(), &[0; POWER_WINDOW]);
        assert!(detector.push(9).is_none());
    }
}
