//! Harness building blocks without a plugin attached.

use aviutl2_conformance::mock::{self, EditScene, ProjectStore};
use aviutl2_conformance::{
    CheckOutcome, CheckStatus, ConformanceConfig, ConformanceError, ConformanceReport, DEFAULT_HOST_VERSION,
    EntryPoints, LifecycleEvent, LifecycleLog, PluginSession, TrackMonitor, ensure_passed,
};
use aviutl2_sys::input::{TRACK_QUERY_COUNT, track_type};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn test_config_file_round_trip() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("conformance.json");
    let config = ConformanceConfig::strict().with_input("clip.sclip");
    config.to_file(&path)?;
    assert_eq!(ConformanceConfig::from_file(&path)?, config);
    Ok(())
}

#[test]
fn test_config_defaults_fill_missing_fields() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("partial.json");
    std::fs::write(&path, r#"{ "strict": true }"#)?;
    let config = ConformanceConfig::from_file(&path)?;
    assert!(config.strict);
    assert_eq!(config.host_version, DEFAULT_HOST_VERSION);
    assert_eq!(config.concurrent_threads, ConformanceConfig::default().concurrent_threads);
    Ok(())
}

#[test]
fn test_config_errors_name_the_file() -> TestResult {
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("missing.json");
    match ConformanceConfig::from_file(&missing) {
        Err(ConformanceError::Io { path, .. }) => assert_eq!(path, missing),
        other => return Err(format!("unexpected {other:?}").into()),
    }
    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{ not json")?;
    assert!(matches!(ConformanceConfig::from_file(&broken), Err(ConformanceError::Json(_))));
    Ok(())
}

#[test]
fn test_report_strictness() -> TestResult {
    let mut lenient = ConformanceReport::new("plugin", DEFAULT_HOST_VERSION, false);
    lenient.push(CheckOutcome::pass("a", "ok"));
    lenient.push(CheckOutcome::gap("b", "abort never polled"));
    lenient.push(CheckOutcome::skipped("c", "no inputs"));
    assert!(lenient.passed());
    assert!(matches!(ensure_passed(&lenient), Ok(())));

    let strict = ConformanceReport {
        strict: true,
        ..lenient.clone()
    };
    assert_eq!(strict.failures(), 2);
    assert!(matches!(
        ensure_passed(&strict),
        Err(ConformanceError::ChecksFailed { failed: 2, total: 3 })
    ));

    let json = serde_json::to_value(&lenient)?;
    assert_eq!(json["outcomes"][1]["status"], "gap");
    Ok(())
}

#[test]
fn test_status_display() {
    let shown: Vec<String> = [CheckStatus::Pass, CheckStatus::Fail, CheckStatus::Gap, CheckStatus::Skipped]
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(shown, ["PASS", "FAIL", "GAP", "SKIP"]);
}

#[test]
fn test_track_monitor_contract() {
    let mut tracks = TrackMonitor::default();
    assert!(matches!(tracks.record(track_type::VIDEO, TRACK_QUERY_COUNT), Ok(())));
    assert!(matches!(tracks.record(track_type::VIDEO, 0), Ok(())));
    assert!(matches!(
        tracks.record(track_type::VIDEO, 0),
        Err(ConformanceError::Contract(_))
    ));
    assert!(matches!(tracks.record(7, 0), Err(ConformanceError::Contract(_))));
    assert_eq!(tracks.selections(track_type::VIDEO), 1);
    assert_eq!(tracks.selections(track_type::AUDIO), 0);

    tracks.read();
    assert!(matches!(
        tracks.record(track_type::AUDIO, 0),
        Err(ConformanceError::Contract(_))
    ));
}

#[test]
fn test_lifecycle_ordering() {
    let mut log = LifecycleLog::default();
    for event in [
        LifecycleEvent::InitializeLogger,
        LifecycleEvent::InitializePlugin,
        LifecycleEvent::Register,
    ] {
        log.push(event);
    }
    assert!(log.is_ordered());
    log.push(LifecycleEvent::InitializeConfig);
    assert!(!log.is_ordered());

    let mut twice = LifecycleLog::default();
    twice.push(LifecycleEvent::Register);
    twice.push(LifecycleEvent::Register);
    assert!(!twice.is_ordered());
}

#[test]
fn test_session_needs_an_entry_point() {
    let result = PluginSession::start("empty", EntryPoints::default(), &ConformanceConfig::quick());
    assert!(matches!(result, Err(ConformanceError::NoEntryPoint { .. })));
}

#[test]
fn test_project_store_limits() {
    let mut store = ProjectStore::default();
    assert!(store.insert_string("key", "value"));
    assert_eq!(store.string("key"), Some("value"));
    assert_eq!(store.len(), 1);
    let other = store.clone();
    assert!(store.same_values(&other));
    assert!(!store.same_values(&ProjectStore::default()));
}

#[test]
fn test_edit_scene_rejects_overlap() -> TestResult {
    let mut scene = EditScene::default();
    let alias = "[Object]\n[Object.0]\neffect.name=Text\n";
    let first = scene.add_object(alias, 0, 0, 30).ok_or("first object refused")?;
    assert!(scene.add_object(alias, 0, 10, 5).is_none());
    assert!(scene.add_object(alias, 1, 10, 5).is_some());
    assert!(scene.select(first));
    let objects = scene.objects();
    assert_eq!(objects.len(), 2);
    assert_eq!(objects.first().map(|o| (o.layer, o.start, o.end)), Some((0, 0, 29)));
    Ok(())
}

#[test]
fn test_alias_length_prefers_frame_key() {
    let effect = "[Object.0]\neffect.name=Text\n";
    assert_eq!(mock::edit::alias_length(&format!("[Object]\nframe=10,19\n{effect}"), 3), Some(10));
    assert_eq!(mock::edit::alias_length(&format!("[Object]\n{effect}"), 3), Some(3));
    assert_eq!(mock::edit::alias_length(&format!("[Object]\n{effect}"), 0), None);
    assert_eq!(mock::edit::alias_length("[Object]\n", 3), None);
}
