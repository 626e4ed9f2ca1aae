use bodyscale_config::{DecoderProfile, LinkBackend, SexCfg, StabilityCfg, load_toml};
use rstest::rstest;

#[test]
fn accepts_full_document() {
    let toml = r#"
[profile]
id = "ana"
age_years = 41
height_cm = 162.5
sex = "female"

[decoder]
profile = "advertisement-v1"
require_weight_flag = false

[session]
step_countdown_s = 3
calibration_countdown_s = 8
tick_ms = 500
disconnect_delay_ms = 1500
accept_min_kg = 20.0
accept_max_kg = 200.0
stability = "device-flag"

[link]
backend = "ble"
name_prefixes = ["MIBFS"]
names = []
poll_ms = 100

[link.sim]
weight_kg = 60.0
impedance_ohm = 0

[store]
path = "/tmp/readings.csv"
history_limit = 10

[logging]
level = "debug"
rotation = "daily"
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.profile.sex, SexCfg::Female);
    assert_eq!(cfg.decoder.profile, DecoderProfile::AdvertisementV1);
    assert!(!cfg.decoder.require_weight_flag);
    assert_eq!(cfg.session.stability, StabilityCfg::DeviceFlag);
    assert_eq!(cfg.link.backend, LinkBackend::Ble);
    // untouched sim fields keep defaults
    assert_eq!(cfg.link.sim.frame_interval_ms, 250);
}

#[rstest]
#[case("[session]\nstep_countdown_s = 0", "step_countdown_s must be >= 1")]
#[case("[session]\ncalibration_countdown_s = 0", "calibration_countdown_s must be >= 1")]
#[case("[session]\ntick_ms = 0", "tick_ms must be >= 1")]
#[case("[session]\naccept_min_kg = 150.0\naccept_max_kg = 100.0", "acceptance window")]
#[case("[session]\naccept_max_kg = 400.0", "acceptance window")]
#[case("[profile]\nage_years = 0", "age_years must be in [1, 120]")]
#[case("[profile]\nheight_cm = 20.0", "height_cm must be in [50, 250]")]
#[case("[profile]\nid = \"  \"", "profile.id must not be empty")]
#[case("[link]\nname_prefixes = []\nnames = []", "at least one of name_prefixes or names")]
#[case("[link.sim]\nimpedance_ohm = 3000", "impedance_ohm must be < 3000")]
#[case("[store]\nhistory_limit = 0", "history_limit must be >= 1")]
#[case("[logging]\nrotation = \"weekly\"", "rotation must be one of")]
#[case("[decoder]\nweight_rules = [[11, 0.0]]", "divisor must be > 0")]
#[case("[decoder]\nweight_rules = [[40, 200.0]]", "beyond the frame")]
#[case(
    "[decoder]\nimpedance_rules = [{ offset = 9, min_ohm = 3000, max_ohm = 100 }]",
    "min_ohm < max_ohm"
)]
fn rejects_out_of_range(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "expected '{needle}' in '{err}'"
    );
}

#[test]
fn unknown_decoder_profile_fails_to_parse() {
    assert!(load_toml("[decoder]\nprofile = \"v9\"").is_err());
}
