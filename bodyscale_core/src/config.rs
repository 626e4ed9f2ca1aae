//! Runtime configuration for the measurement session.
//!
//! Separate from the TOML-deserialized config in `bodyscale_config`.

use std::time::Duration;

use crate::composition::BiometricProfile;
use crate::decode::WeightSample;
use crate::util::in_open_window;

/// Countdowns and delays of the capture workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Ticks between the capture request and calibration.
    pub step_countdown: u8,
    /// Ticks calibration waits for a qualifying sample.
    pub calibration_countdown: u8,
    pub tick: Duration,
    /// Delay between a successful save and the automatic disconnect.
    pub disconnect_delay: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            step_countdown: 5,
            calibration_countdown: 10,
            tick: Duration::from_secs(1),
            disconnect_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stability {
    /// Only accept frames carrying the device's stabilized bit.
    DeviceFlag,
    /// Accept the first in-window frame seen during calibration.
    #[default]
    Window,
}

/// Which decoded samples may end calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptancePolicy {
    pub min_kg: f32,
    pub max_kg: f32,
    pub stability: Stability,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            min_kg: 10.0,
            max_kg: 300.0,
            stability: Stability::Window,
        }
    }
}

impl AcceptancePolicy {
    pub fn accepts(&self, s: &WeightSample) -> bool {
        let stable = match self.stability {
            Stability::DeviceFlag => s.stabilized,
            Stability::Window => true,
        };
        stable && in_open_window(s.weight_kg, self.min_kg, self.max_kg)
    }
}

/// Who is being measured. Threaded into the session at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub biometrics: BiometricProfile,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            biometrics: BiometricProfile::default(),
        }
    }
}
