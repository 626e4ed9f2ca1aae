//! Versioned, explicitly prioritised extraction rule tables.
//!
//! Different firmware revisions put the weight and impedance fields at
//! different offsets and scales. Each table lists every interpretation seen in
//! the field, in the order they are tried; the first plausible candidate wins.

use crate::frame::FlagLayout;

/// Little-endian u16 at `offset`, divided by `divisor`, accepted in the open
/// window `(min_kg, max_kg)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightRule {
    pub priority: u8,
    pub offset: usize,
    pub divisor: f32,
    pub min_kg: f32,
    pub max_kg: f32,
}

impl WeightRule {
    pub const fn new(priority: u8, offset: usize, divisor: f32, window: (f32, f32)) -> Self {
        Self {
            priority,
            offset,
            divisor,
            min_kg: window.0,
            max_kg: window.1,
        }
    }
}

/// Little-endian u16 at `offset`, accepted in the open window `(min_ohm, max_ohm)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpedanceRule {
    pub priority: u8,
    pub offset: usize,
    pub min_ohm: u16,
    pub max_ohm: u16,
}

impl ImpedanceRule {
    pub const fn new(priority: u8, offset: usize, window: (u16, u16)) -> Self {
        Self {
            priority,
            offset,
            min_ohm: window.0,
            max_ohm: window.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleTable {
    pub name: &'static str,
    pub version: u16,
    pub min_len: usize,
    pub flags: FlagLayout,
    weight_rules: Vec<WeightRule>,
    impedance_rules: Vec<ImpedanceRule>,
}

const ADV_WEIGHT_WINDOW: (f32, f32) = (5.0, 300.0);
const ADV_IMPEDANCE_WINDOW: (u16, u16) = (100, 3000);
const NOTIFY_WEIGHT_WINDOW: (f32, f32) = (10.0, 300.0);
const NOTIFY_IMPEDANCE_WINDOW: (u16, u16) = (0, 3000);

impl RuleTable {
    /// Build a table; rules are stably sorted by priority so equal priorities
    /// keep their listed order.
    pub fn new(
        name: &'static str,
        version: u16,
        min_len: usize,
        flags: FlagLayout,
        mut weight_rules: Vec<WeightRule>,
        mut impedance_rules: Vec<ImpedanceRule>,
    ) -> Self {
        weight_rules.sort_by_key(|r| r.priority);
        impedance_rules.sort_by_key(|r| r.priority);
        Self {
            name,
            version,
            min_len,
            flags,
            weight_rules,
            impedance_rules,
        }
    }

    /// Broadcast (service data) layout.
    pub fn advertisement_v1() -> Self {
        let w = ADV_WEIGHT_WINDOW;
        let z = ADV_IMPEDANCE_WINDOW;
        Self::new(
            "advertisement-v1",
            1,
            13,
            FlagLayout::MI_SCALE,
            vec![
                WeightRule::new(0, 11, 200.0, w),
                WeightRule::new(1, 1, 200.0, w),
                WeightRule::new(2, 11, 100.0, w),
                WeightRule::new(3, 9, 200.0, w),
            ],
            vec![
                ImpedanceRule::new(0, 4, z),
                ImpedanceRule::new(1, 6, z),
                ImpedanceRule::new(2, 8, z),
            ],
        )
    }

    /// Notification (body-composition characteristic) layout.
    pub fn notification_v2() -> Self {
        let w = NOTIFY_WEIGHT_WINDOW;
        let z = NOTIFY_IMPEDANCE_WINDOW;
        Self::new(
            "notification-v2",
            2,
            13,
            FlagLayout::MI_SCALE,
            vec![
                WeightRule::new(0, 11, 200.0, w),
                WeightRule::new(1, 1, 200.0, w),
                WeightRule::new(2, 9, 200.0, w),
            ],
            vec![
                ImpedanceRule::new(0, 9, z),
                ImpedanceRule::new(1, 4, z),
                ImpedanceRule::new(2, 6, z),
            ],
        )
    }

    /// Minimal weight-only frames.
    pub fn weight_only() -> Self {
        Self::new(
            "weight-only",
            1,
            3,
            FlagLayout {
                has_impedance: None,
                ..FlagLayout::MI_SCALE
            },
            vec![WeightRule::new(0, 1, 200.0, ADV_WEIGHT_WINDOW)],
            Vec::new(),
        )
    }

    pub fn weight_rules(&self) -> &[WeightRule] {
        &self.weight_rules
    }

    pub fn impedance_rules(&self) -> &[ImpedanceRule] {
        &self.impedance_rules
    }

    /// Replace the weight rules, keeping everything else.
    pub fn with_weight_rules(self, rules: Vec<WeightRule>) -> Self {
        Self::new(
            self.name,
            self.version,
            self.min_len,
            self.flags,
            rules,
            self.impedance_rules,
        )
    }

    /// Replace the impedance rules, keeping everything else.
    pub fn with_impedance_rules(self, rules: Vec<ImpedanceRule>) -> Self {
        Self::new(
            self.name,
            self.version,
            self.min_len,
            self.flags,
            self.weight_rules,
            rules,
        )
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::notification_v2()
    }
}
