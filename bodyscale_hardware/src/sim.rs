//! Deterministic scale simulator.
//!
//! Frames follow the notification layout: two noise frames without the
//! has-weight bit, `settle_frames` frames ramping towards the target weight
//! with the stabilized bit clear, then stable frames that also carry
//! impedance (when configured).

use std::time::{Duration, Instant};

use bodyscale_traits::{BoxError, ConnectRequest, LinkEvent, ScaleLink};

use crate::error::LinkError;

pub const DEFAULT_DEVICE_NAME: &str = "MIBFS sim";

const NOISE_FRAMES: u32 = 2;
const FRAME_LEN: usize = 13;
const UNIT_KG: u8 = 0x02;
const HAS_WEIGHT: u8 = 0x20;
const STABILIZED: u8 = 0x40;
const HAS_IMPEDANCE: u8 = 0x02;
const WEIGHT_DIVISOR: f32 = 200.0;

/// What the simulated scale reports.
#[derive(Debug, Clone)]
pub struct SimScale {
    /// Advertised name, matched against the connect request's filters.
    pub name: String,
    pub weight_kg: f32,
    /// 0 disables the impedance field.
    pub impedance_ohm: u16,
    pub frame_interval: Duration,
    pub settle_frames: u32,
    /// Report a device disconnect after this many frames.
    pub vanish_after: Option<u32>,
}

impl Default for SimScale {
    fn default() -> Self {
        Self {
            name: DEFAULT_DEVICE_NAME.to_string(),
            weight_kg: 72.4,
            impedance_ohm: 480,
            frame_interval: Duration::from_millis(250),
            settle_frames: 6,
            vanish_after: None,
        }
    }
}

impl SimScale {
    /// The `index`-th frame (0-based) this scale sends after connecting.
    pub fn frame(&self, index: u32) -> Vec<u8> {
        let mut f = vec![0u8; FRAME_LEN];
        f[0] = UNIT_KG;
        if index < NOISE_FRAMES {
            return f;
        }
        let step = index - NOISE_FRAMES;
        let (weight, stable) = if step < self.settle_frames {
            let share = (step + 1) as f32 / (self.settle_frames + 1) as f32;
            (self.weight_kg * share, false)
        } else {
            (self.weight_kg, true)
        };
        f[0] |= HAS_WEIGHT;
        if stable {
            f[0] |= STABILIZED;
            if self.impedance_ohm > 0 {
                f[1] = HAS_IMPEDANCE;
                let [lo, hi] = self.impedance_ohm.to_le_bytes();
                f[4] = lo;
                f[5] = hi;
                f[9] = lo;
                f[10] = hi;
            }
        }
        let raw = (weight * WEIGHT_DIVISOR).round().clamp(0.0, f32::from(u16::MAX)) as u16;
        let [lo, hi] = raw.to_le_bytes();
        f[11] = lo;
        f[12] = hi;
        f
    }
}

/// `ScaleLink` backed by a `SimScale`, paced in real time.
pub struct SimulatedLink {
    scale: SimScale,
    next_due: Option<Instant>,
    emitted: u32,
}

impl SimulatedLink {
    pub fn new(scale: SimScale) -> Self {
        Self {
            scale,
            next_due: None,
            emitted: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.next_due.is_some()
    }

    /// Frames sent since the last connect.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl ScaleLink for SimulatedLink {
    fn connect(&mut self, request: &ConnectRequest) -> Result<String, BoxError> {
        if !request.filters.is_empty() && !request.accepts(&self.scale.name) {
            tracing::debug!(name = %self.scale.name, "simulated scale filtered out");
            return Err(Box::new(LinkError::DeviceNotFound));
        }
        self.emitted = 0;
        self.next_due = Some(Instant::now());
        tracing::info!(name = %self.scale.name, "simulated scale connected");
        Ok(self.scale.name.clone())
    }

    fn next_event(&mut self, timeout: Duration) -> Result<Option<LinkEvent>, BoxError> {
        let Some(due) = self.next_due else {
            return Err(Box::new(LinkError::NotConnected));
        };
        if self.scale.vanish_after.is_some_and(|n| self.emitted >= n) {
            self.next_due = None;
            return Ok(Some(LinkEvent::Disconnected));
        }
        let now = Instant::now();
        if due > now {
            let wait = due - now;
            if wait > timeout {
                std::thread::sleep(timeout);
                return Ok(None);
            }
            std::thread::sleep(wait);
        }
        let frame = self.scale.frame(self.emitted);
        self.emitted += 1;
        self.next_due = Some(Instant::now() + self.scale.frame_interval);
        tracing::trace!(index = self.emitted, len = frame.len(), "simulated frame");
        Ok(Some(LinkEvent::Frame(frame)))
    }

    fn disconnect(&mut self) -> Result<(), BoxError> {
        self.next_due = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_frames_lack_the_weight_flag() {
        let s = SimScale::default();
        for i in 0..NOISE_FRAMES {
            assert_eq!(s.frame(i)[0] & HAS_WEIGHT, 0);
        }
    }

    #[test]
    fn ramp_then_stable_with_impedance() {
        let s = SimScale {
            weight_kg: 75.0,
            impedance_ohm: 500,
            settle_frames: 3,
            ..SimScale::default()
        };
        let ramp = s.frame(NOISE_FRAMES);
        assert_eq!(ramp[0] & (HAS_WEIGHT | STABILIZED), HAS_WEIGHT);
        assert_eq!(ramp[1], 0);

        let stable = s.frame(NOISE_FRAMES + 3);
        assert_eq!(stable[0] & STABILIZED, STABILIZED);
        assert_eq!(stable[1], HAS_IMPEDANCE);
        assert_eq!(u16::from_le_bytes([stable[11], stable[12]]), 15_000);
        assert_eq!(u16::from_le_bytes([stable[9], stable[10]]), 500);
    }

    #[test]
    fn zero_impedance_leaves_flag_clear() {
        let s = SimScale {
            impedance_ohm: 0,
            settle_frames: 0,
            ..SimScale::default()
        };
        assert_eq!(s.frame(NOISE_FRAMES)[1], 0);
    }
}
