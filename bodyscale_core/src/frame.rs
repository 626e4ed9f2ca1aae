//! Frame validation: length gate plus control-byte flags.
//!
//! Classification is pure. A frame that fails here never reaches numeric
//! extraction.

use crate::rules::RuleTable;

/// One flag bit inside the control bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagBit {
    pub byte: usize,
    pub mask: u8,
}

impl FlagBit {
    pub const fn new(byte: usize, mask: u8) -> Self {
        Self { byte, mask }
    }

    #[inline]
    pub fn is_set(self, frame: &[u8]) -> bool {
        frame.get(self.byte).is_some_and(|b| b & self.mask != 0)
    }
}

/// Where a firmware revision keeps its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagLayout {
    pub has_weight: FlagBit,
    pub stabilized: Option<FlagBit>,
    pub has_impedance: Option<FlagBit>,
}

impl FlagLayout {
    /// byte0 0x20 has-weight, byte0 0x40 stabilized, byte1 0x02 has-impedance.
    pub const MI_SCALE: FlagLayout = FlagLayout {
        has_weight: FlagBit::new(0, 0x20),
        stabilized: Some(FlagBit::new(0, 0x40)),
        has_impedance: Some(FlagBit::new(1, 0x02)),
    };

    pub fn read(&self, frame: &[u8]) -> FrameFlags {
        FrameFlags {
            has_weight: self.has_weight.is_set(frame),
            stabilized: self.stabilized.is_some_and(|b| b.is_set(frame)),
            has_impedance: self.has_impedance.is_some_and(|b| b.is_set(frame)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags {
    pub has_weight: bool,
    pub stabilized: bool,
    pub has_impedance: bool,
}

/// Why a frame produced no sample. Not an error: the next frame is evaluated
/// independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMiss {
    TooShort { len: usize, min: usize },
    NoWeightFlag,
    NoWeightCandidate,
}

impl core::fmt::Display for DecodeMiss {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeMiss::TooShort { len, min } => write!(f, "frame too short ({len} < {min})"),
            DecodeMiss::NoWeightFlag => f.write_str("has-weight flag not set"),
            DecodeMiss::NoWeightCandidate => f.write_str("no plausible weight candidate"),
        }
    }
}

/// Classify a raw frame against a rule table's length and flag layout.
#[derive(Debug, Clone, Copy)]
pub struct FrameValidator {
    pub min_len: usize,
    pub flags: FlagLayout,
    pub require_weight_flag: bool,
}

impl FrameValidator {
    pub fn for_table(table: &RuleTable, require_weight_flag: bool) -> Self {
        Self {
            min_len: table.min_len,
            flags: table.flags,
            require_weight_flag,
        }
    }

    pub fn validate(&self, frame: &[u8]) -> Result<FrameFlags, DecodeMiss> {
        if frame.len() < self.min_len {
            return Err(DecodeMiss::TooShort {
                len: frame.len(),
                min: self.min_len,
            });
        }
        let flags = self.flags.read(frame);
        if self.require_weight_flag && !flags.has_weight {
            return Err(DecodeMiss::NoWeightFlag);
        }
        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn validator(min_len: usize) -> FrameValidator {
        FrameValidator {
            min_len,
            flags: FlagLayout::MI_SCALE,
            require_weight_flag: true,
        }
    }

    #[rstest]
    #[case(&[0x22, 0x02], FrameFlags { has_weight: true, stabilized: false, has_impedance: true })]
    #[case(&[0x62, 0x00], FrameFlags { has_weight: true, stabilized: true, has_impedance: false })]
    #[case(&[0x40, 0x02], FrameFlags { has_weight: false, stabilized: true, has_impedance: true })]
    #[case(&[0x20], FrameFlags { has_weight: true, stabilized: false, has_impedance: false })]
    fn reads_control_bits(#[case] frame: &[u8], #[case] expected: FrameFlags) {
        assert_eq!(FlagLayout::MI_SCALE.read(frame), expected);
    }

    #[test]
    fn short_frames_are_not_usable() {
        let v = validator(13);
        let frame = [0x22u8; 12];
        assert_eq!(
            v.validate(&frame),
            Err(DecodeMiss::TooShort { len: 12, min: 13 })
        );
        assert!(v.validate(&[]).is_err());
    }

    #[test]
    fn missing_weight_bit_rejects_unless_relaxed() {
        let mut v = validator(3);
        assert_eq!(v.validate(&[0x00, 0x00, 0x00]), Err(DecodeMiss::NoWeightFlag));
        v.require_weight_flag = false;
        assert!(v.validate(&[0x00, 0x00, 0x00]).is_ok());
    }
}
