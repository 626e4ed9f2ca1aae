use std::fs::File;
use std::io::Write;

use bodyscale_config::{RuleRow, RuleTableCfg, load_rules_csv};
use rstest::rstest;
use tempfile::tempdir;

fn write_csv(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rules.csv");
    let mut f = File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    (dir, path)
}

#[rstest]
fn loads_weight_and_impedance_rows() {
    let (_dir, path) = write_csv(
        "kind,priority,offset,divisor,min,max\n\
         weight,0,11,200,10,300\n\
         weight,1,1,200,10,300\n\
         impedance,0,9,,0,3000\n",
    );
    let t = load_rules_csv(&path).unwrap();
    assert_eq!(t.weight.len(), 2);
    assert_eq!(t.weight[1].offset, 1);
    assert!((t.weight[0].divisor - 200.0).abs() < f32::EPSILON);
    assert_eq!(t.impedance.len(), 1);
    assert_eq!((t.impedance[0].offset, t.impedance[0].max_ohm), (9, 3000));
}

#[rstest]
fn rejects_wrong_headers() {
    let (_dir, path) = write_csv("kind,offset,divisor\nweight,11,200\n");
    let err = load_rules_csv(&path).unwrap_err();
    assert!(err.to_string().contains("must have headers"));
}

#[rstest]
#[case("weight,0,11,,10,300\n", "needs a divisor")]
#[case("pressure,0,11,200,10,300\n", "unknown kind 'pressure'")]
#[case("impedance,0,9,,0,70000\n", "window must fit")]
fn rejects_bad_rows(#[case] row: &str, #[case] needle: &str) {
    let (_dir, path) = write_csv(&format!("kind,priority,offset,divisor,min,max\n{row}"));
    let err = load_rules_csv(&path).unwrap_err();
    assert!(err.to_string().contains(needle), "got: {err}");
}

#[rstest]
fn rejects_unparsable_row_with_line_number() {
    let (_dir, path) = write_csv("kind,priority,offset,divisor,min,max\nweight,first,11,200,10,300\n");
    let err = load_rules_csv(&path).unwrap_err();
    assert!(err.to_string().contains("invalid CSV row 2"));
}

#[rstest]
fn empty_table_is_rejected() {
    let err = RuleTableCfg::from_rows(Vec::<RuleRow>::new()).unwrap_err();
    assert!(err.to_string().contains("at least one row"));
}
