//! Complementary-filter attitude estimation.
//!
//! Integrating the gyroscope gives a responsive angle that drifts without
//! bound; the accelerometer gives an absolute tilt reference that is noisy
//! during motion. Each tick blends the two per axis:
//!
//! `filtered = AA * (filtered + rate * dt) + (1 - AA) * accel_angle`

use log::warn;

use crate::{FusedAngles, MotionError, RawSample};

/// Degrees per radian.
pub const RAD_TO_DEG: f32 = 57.29578;

/// Gyro sensitivity for the 2000 dps full-scale range [deg/s/LSB].
pub const G_GAIN: f32 = 0.070;

/// Default weight on the gyro-integrated trend; the accelerometer
/// reference gets the remainder.
pub const DEFAULT_FILTER_WEIGHT: f32 = 0.40;

/// Construction-time tuning for a [`FusionEngine`].
///
/// Both values are calibration constants. The defaults match the sensor
/// configuration the game ships with; a future calibration pass can
/// override either without code changes.
#[derive(Debug, Clone, Copy)]
pub struct FusionConfig {
    /// Degrees per second per raw gyro count.
    pub gyro_gain: f32,
    /// Complementary filter weight on the gyro term; the accelerometer
    /// reference gets the remainder.
    pub filter_weight: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionConfig {
            gyro_gain: G_GAIN,
            filter_weight: DEFAULT_FILTER_WEIGHT,
        }
    }
}

/// Per-sensor fusion state: gyro-integrated and filtered angles for the
/// X and Y axes. One engine per physical sensor; the caller owns the value
/// and drives it once per acquisition tick.
#[derive(Debug)]
pub struct FusionEngine {
    config: FusionConfig,
    gyro_angle_x: f32,
    gyro_angle_y: f32,
    cf_angle_x: f32,
    cf_angle_y: f32,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        FusionEngine {
            config,
            gyro_angle_x: 0.0,
            gyro_angle_y: 0.0,
            cf_angle_x: 0.0,
            cf_angle_y: 0.0,
        }
    }

    /// Zeroes the integrated and filtered angles.
    pub fn reset(&mut self) {
        self.gyro_angle_x = 0.0;
        self.gyro_angle_y = 0.0;
        self.cf_angle_x = 0.0;
        self.cf_angle_y = 0.0;
    }

    /// The current filtered angle pair without advancing the filter.
    pub fn angles(&self) -> FusedAngles {
        FusedAngles {
            x: self.cf_angle_x,
            y: self.cf_angle_y,
        }
    }

    /// The raw gyro-integrated angle pair. Drifts over time; exposed for
    /// diagnostics only.
    pub fn gyro_angles(&self) -> (f32, f32) {
        (self.gyro_angle_x, self.gyro_angle_y)
    }

    /// Folds one raw sample into the filter and returns the fused angles.
    ///
    /// `dt` is the elapsed time since the previous tick in seconds and must
    /// be finite and positive. A zero, negative, or non-finite delta
    /// rejects the tick without mutating any state; the caller is expected
    /// to measure monotonic elapsed time and simply retry next tick.
    pub fn update(&mut self, raw: &RawSample, dt: f32) -> Result<FusedAngles, MotionError> {
        if !dt.is_finite() || dt <= 0.0 {
            warn!("rejecting tick: invalid time delta {}", dt);
            return Err(MotionError::InvalidInterval(dt));
        }

        let rate_x = f32::from(raw.gyro_x) * self.config.gyro_gain;
        let rate_y = f32::from(raw.gyro_y) * self.config.gyro_gain;

        // Integrated angles are an intermediate trend only, never trusted
        // directly: they accumulate drift without bound.
        self.gyro_angle_x += rate_x * dt;
        self.gyro_angle_y += rate_y * dt;

        let (acc_angle_x, acc_angle_y) = accel_angles(raw);

        let aa = self.config.filter_weight;
        self.cf_angle_x = aa * (self.cf_angle_x + rate_x * dt) + (1.0 - aa) * acc_angle_x;
        self.cf_angle_y = aa * (self.cf_angle_y + rate_y * dt) + (1.0 - aa) * acc_angle_y;

        Ok(self.angles())
    }
}

/// Instantaneous tilt from the gravity vector, in degrees.
///
/// The Y axis result is remapped into one continuous -180..180 band: the
/// raw arctangent jumps as the sensor tips past vertical, so values above
/// 90 are shifted down by 270 and the rest up by 90. Both branches meet at
/// the +/-180 seam, which is the same physical attitude.
fn accel_angles(raw: &RawSample) -> (f32, f32) {
    let acc_x = f32::from(raw.acc_x);
    let acc_y = f32::from(raw.acc_y);
    let acc_z = f32::from(raw.acc_z);

    let angle_x = acc_y.atan2(acc_z) * RAD_TO_DEG;

    let raw_y = acc_z.atan2(acc_x) * RAD_TO_DEG;
    let angle_y = if raw_y > 90.0 {
        raw_y - 270.0
    } else {
        raw_y + 90.0
    };

    (angle_x, angle_y)
}
