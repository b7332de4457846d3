//! Capture file persistence and replay from disk.

use spoutfill::{CaptureError, CaptureRecord, CapturedColors, Phase, Scheduler, SceneConfig, SpoutConfig, SpoutLayout};
use std::path::PathBuf;
use std::time::Instant;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("spoutfill-{}-{}.json", name, std::process::id()))
}

#[test]
fn saved_table_loads_back() {
    let table = CapturedColors::from_records(vec![
        CaptureRecord { color: [255, 0, 0], radius: Some(4.0) },
        CaptureRecord { color: [0, 255, 0], radius: None },
        CaptureRecord { color: [0, 0, 255], radius: Some(4.5) },
    ]);
    let path = temp_path("roundtrip");
    table.save(&path).unwrap();

    let loaded = CapturedColors::load(&path).unwrap();
    assert_eq!(loaded, table);
    std::fs::remove_file(&path).ok();
}

#[test]
fn header_count_must_match() {
    let json = r#"{"particleCount": 3, "particles": [{"color": [1, 2, 3]}]}"#;
    match CapturedColors::from_json(json) {
        Err(CaptureError::CountMismatch { declared, found }) => {
            assert_eq!(declared, 3);
            assert_eq!(found, 1);
        }
        other => panic!("expected a count mismatch, got {:?}", other),
    }
}

#[test]
fn malformed_and_missing_files_are_errors() {
    assert!(matches!(
        CapturedColors::from_json("{\"particles\": 7}"),
        Err(CaptureError::Json(_))
    ));
    assert!(matches!(
        CapturedColors::load(temp_path("never-written")),
        Err(CaptureError::Io(_))
    ));
}

#[test]
fn replay_from_file_uses_recorded_colors() {
    let json = r#"{
        "particleCount": 3,
        "particles": [
            {"color": [10, 0, 0]},
            {"color": [20, 0, 0], "radius": 2.5},
            {"color": [30, 0, 0]}
        ]
    }"#;
    let table = CapturedColors::from_json(json).unwrap();

    let config = SceneConfig::default()
        .with_canvas(200, 100)
        .with_particle_radius(3.0)
        .with_settle_secs(0.1, 0.1)
        .with_capture_path(None)
        .with_spouts(SpoutConfig {
            count: 1,
            layout: SpoutLayout::Explicit(vec![[100.0, 10.0]]),
            angle_degrees: 90.0,
            speed: 100.0,
        });
    let tick = config.tick_interval();
    let mut scheduler = Scheduler::from_capture(config, table);
    assert_eq!(scheduler.phase(), Phase::Replaying);
    assert_eq!(scheduler.original_count(), Some(3));

    let t0 = Instant::now();
    let mut i = 0;
    while scheduler.world().len() < 3 {
        assert!(i < 10, "replay never finished spawning");
        scheduler.tick(t0 + tick * i).unwrap();
        i += 1;
    }

    let store = scheduler.world().store();
    assert_eq!(store.colors(), &[[10, 0, 0], [20, 0, 0], [30, 0, 0]]);
    // Records without a radius fall back to the base radius.
    assert_eq!(store.radii(), &[3.0, 2.5, 3.0]);
}
