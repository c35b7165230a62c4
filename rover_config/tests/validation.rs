use rover_config::load_toml;
use rstest::rstest;

const FULL: &str = r#"
[pins]
left_pwm = 13
left_in_a = 5
left_in_b = 6
right_pwm = 12
right_in_a = 20
right_in_b = 21
left_enc_a = 17
left_enc_b = 27
right_enc_a = 22
right_enc_b = 23

[geometry]
ppr = 960
wheel_diameter_cm = 5.0
left_reversed = false
right_reversed = true

[control]
tick_ms = 10
command_timeout_ms = 500
sample_window_ms = 100
telemetry_interval_ms = 200
telemetry_count_threshold = 5

[tuning]
feedforward_gain = 3.0
deadzone_pwm = 60.0
vel2pwm = [0.0, 1.0, 0.0, 0.0]

[logging]
level = "info"
rotation = "daily"
"#;

#[test]
fn accepts_full_config() {
    let cfg = load_toml(FULL).expect("parse TOML");
    cfg.validate().expect("valid config");
    assert_eq!(cfg.geometry.ppr, 960);
    assert!(cfg.geometry.right_reversed);
    assert_eq!(cfg.control.command_timeout_ms, 500);
}

#[test]
fn empty_file_uses_defaults() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults are valid");
    assert_eq!(cfg, rover_config::Config::default());
    assert!((cfg.tuning.feedforward_gain - 3.0).abs() < f32::EPSILON);
    assert_eq!(cfg.control.telemetry_count_threshold, 5);
}

#[rstest]
#[case("[geometry]\nppr = 0\n", "ppr must be > 0")]
#[case("[geometry]\nwheel_diameter_cm = -1.0\n", "wheel_diameter_cm must be > 0")]
#[case("[control]\ntick_ms = 0\n", "tick_ms must be > 0")]
#[case("[control]\nsample_window_ms = 5\n", "sample_window_ms must be >= control.tick_ms")]
#[case("[control]\ncommand_timeout_ms = 10\n", "command_timeout_ms must be greater")]
#[case("[tuning]\nfeedforward_gain = 0.0\n", "feedforward_gain must be > 0")]
#[case("[tuning]\nvel2pwm = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]\n", "at most 6 coefficients")]
#[case("[pins]\nleft_pwm = 12\n", "assigned more than once")]
#[case("[logging]\nrotation = \"weekly\"\n", "never|daily|hourly")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "error {err} does not mention {needle}"
    );
}

#[test]
fn unknown_type_is_a_parse_error() {
    assert!(load_toml("[geometry]\nppr = \"lots\"\n").is_err());
}
