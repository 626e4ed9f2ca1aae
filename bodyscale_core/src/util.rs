//! Small numeric helpers shared by the decoder and the estimator.

/// Combine two bytes little-endian: `low | (high << 8)`.
#[inline]
pub fn le_u16(low: u8, high: u8) -> u16 {
    u16::from(low) | (u16::from(high) << 8)
}

/// Read a little-endian u16 at `offset`, or `None` when the frame is too short
/// to hold both bytes.
#[inline]
pub fn le_u16_at(frame: &[u8], offset: usize) -> Option<u16> {
    let low = *frame.get(offset)?;
    let high = *frame.get(offset.checked_add(1)?)?;
    Some(le_u16(low, high))
}

/// Round to `decimals` places, half away from zero. Non-finite input passes through.
#[inline]
pub fn round_to(x: f32, decimals: i32) -> f32 {
    if !x.is_finite() {
        return x;
    }
    let p = 10f64.powi(decimals);
    ((f64::from(x) * p).round() / p) as f32
}

/// Open-interval membership, the acceptance test used by every plausibility window.
#[inline]
pub fn in_open_window<T: PartialOrd>(v: T, min: T, max: T) -> bool {
    v > min && v < max
}
