#![no_main]
use libfuzzer_sys::fuzz_target;
use rover_config::{TuningPatch, TuningRecord};

fuzz_target!(|data: &str| {
    let Ok(patch) = TuningPatch::load_toml(data) else {
        return;
    };
    let mut record = TuningRecord::default();
    let before = record.clone();
    match patch.apply(&mut record) {
        // An accepted patch always leaves a usable record behind.
        Ok(()) => assert!(record.validate().is_ok(), "{record:?}"),
        Err(_) => assert_eq!(record, before),
    }
});
