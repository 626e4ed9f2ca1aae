#![no_main]
use bodyscale_core::{BiometricProfile, Decoder, RuleTable, estimate};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let profile = BiometricProfile::default();
    for table in [
        RuleTable::advertisement_v1(),
        RuleTable::notification_v2(),
        RuleTable::weight_only(),
    ] {
        for strict in [true, false] {
            let decoder = Decoder::new(table.clone(), strict);
            if let Ok(sample) = decoder.decode(data) {
                assert!(sample.weight_kg > 0.0 && sample.weight_kg < 300.0);
                if let Some(z) = sample.impedance_ohm.filter(|z| *z > 0) {
                    let c = estimate(sample.weight_kg, z, &profile);
                    assert!((5.0..=50.0).contains(&c.body_fat_pct));
                }
            }
        }
    }
});
