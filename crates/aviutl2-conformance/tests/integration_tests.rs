//! End-to-end runs of the sample plugin through the mock host.
//!
//! The sample plugin is linked in-process, so its entry points are plain
//! function pointers. Its state is process-wide; tests are serialized.

#![allow(unsafe_code, reason = "tests call plugin tables over the C ABI")]

use std::path::PathBuf;

use aviutl2_conformance::checks::names;
use aviutl2_conformance::mock::{self, MenuKind, OutputJob, ScriptResult, ScriptValue};
use aviutl2_conformance::{
    CheckStatus, ConformanceConfig, ConformanceError, EntryPoints, InputModule, LifecycleEvent, PluginSession,
    check_names, run_entry_points,
};
use aviutl2_plugin_examples::clip::SolidClip;
use aviutl2_plugin_examples::{self as sample, SETTINGS_KEY};
use aviutl2_sys::entry::{
    InitializeConfigFn, InitializeLoggerFn, InitializePluginFn, RegisterPluginFn, RequiredVersionFn,
    UninitializePluginFn,
};
use aviutl2_sys::input::{TRACK_QUERY_COUNT, track_type};
use parking_lot::{Mutex, const_mutex};

type TestResult = Result<(), Box<dyn std::error::Error>>;

static SERIAL: Mutex<()> = const_mutex(());

fn entry_points() -> EntryPoints {
    EntryPoints {
        register_plugin: Some(sample::RegisterPlugin as RegisterPluginFn),
        initialize_logger: Some(sample::InitializeLogger as InitializeLoggerFn),
        initialize_config: Some(sample::InitializeConfig as InitializeConfigFn),
        initialize_plugin: Some(sample::InitializePlugin as InitializePluginFn),
        uninitialize_plugin: Some(sample::UninitializePlugin as UninitializePluginFn),
        required_version: Some(sample::RequiredVersion as RequiredVersionFn),
        ..EntryPoints::default()
    }
}

fn write_clip(dir: &tempfile::TempDir) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = dir.path().join("probe.sclip");
    std::fs::write(&path, serde_json::to_string(&SolidClip::default())?)?;
    Ok(path)
}

fn start() -> Result<PluginSession, ConformanceError> {
    PluginSession::start("solid-clip-toolkit", entry_points(), &ConformanceConfig::quick())
}

#[test]
fn test_full_run_passes_every_check() -> TestResult {
    let _serial = SERIAL.lock();
    let dir = tempfile::tempdir()?;
    let config = ConformanceConfig::quick().with_input(write_clip(&dir)?);
    let report = run_entry_points("solid-clip-toolkit", entry_points(), &config)?;

    for name in check_names() {
        let outcome = report.outcome(name).ok_or(format!("missing outcome {name}"))?;
        assert_eq!(outcome.status, CheckStatus::Pass, "{name}: {}", outcome.detail);
    }
    assert!(report.passed());
    assert_eq!(report.counts(), [check_names().len(), 0, 0, 0]);
    Ok(())
}

#[test]
fn test_input_checks_skip_without_files() -> TestResult {
    let _serial = SERIAL.lock();
    let report = run_entry_points("solid-clip-toolkit", entry_points(), &ConformanceConfig::quick())?;
    for name in [names::INPUT_READ, names::INPUT_CONCURRENCY, names::INPUT_TRACKS] {
        assert_eq!(report.outcome(name).map(|o| o.status), Some(CheckStatus::Skipped));
    }
    assert!(report.passed());
    let strict = ConformanceConfig {
        strict: true,
        ..ConformanceConfig::quick()
    };
    let report = run_entry_points("solid-clip-toolkit", entry_points(), &strict)?;
    assert_eq!(report.failures(), 3);
    Ok(())
}

#[test]
fn test_newer_plugin_is_refused() {
    let _serial = SERIAL.lock();
    let config = ConformanceConfig {
        host_version: 2_000_000,
        ..ConformanceConfig::quick()
    };
    let result = PluginSession::start("solid-clip-toolkit", entry_points(), &config);
    assert!(matches!(
        result,
        Err(ConformanceError::VersionTooOld {
            required: 2_003_000,
            host: 2_000_000
        })
    ));
}

#[test]
fn test_lifecycle_order_and_unload() -> TestResult {
    let _serial = SERIAL.lock();
    let mut session = start()?;
    assert_eq!(
        session.lifecycle().events(),
        [
            LifecycleEvent::RequiredVersion,
            LifecycleEvent::InitializeLogger,
            LifecycleEvent::InitializeConfig,
            LifecycleEvent::InitializePlugin,
            LifecycleEvent::Register,
        ]
    );
    assert_eq!(session.required_version(), Some(2_003_000));
    assert_eq!(session.finish(), mock::RegistrationState::Unloaded);
    assert_eq!(session.lifecycle().events().last(), Some(&LifecycleEvent::Uninitialize));
    assert!(session.inputs().is_empty());
    assert_eq!(session.save_project(), 0);
    Ok(())
}

#[test]
fn test_registration_is_recorded() -> TestResult {
    let _serial = SERIAL.lock();
    let session = start()?;
    let reg = session.registration();
    assert_eq!(reg.information.as_deref(), Some("Solid Clip Toolkit 0.1"));
    assert_eq!(reg.table_count(), 4);
    assert_eq!(reg.menu_names(MenuKind::Layer), ["Insert solid clip"]);
    assert_eq!(reg.menu_names(MenuKind::Object), ["Push down one layer"]);
    assert_eq!((reg.load_handlers.len(), reg.save_handlers.len()), (1, 1));
    assert_eq!(reg.null_arguments, 0);
    let names: Vec<String> = session.inputs().iter().map(InputModule::name).collect();
    assert_eq!(names, ["Solid Clip Reader"]);

    let summary = session.summary();
    assert_eq!(summary.outputs, ["Frame Digest"]);
    assert_eq!(summary.filters, ["Posterize"]);
    assert_eq!(summary.scripts.len(), 1);
    assert_eq!(summary.project_handlers, 2);
    assert_eq!(summary.menus.len(), 2);
    Ok(())
}

#[test]
fn test_input_session_matches_renderer() -> TestResult {
    let _serial = SERIAL.lock();
    let dir = tempfile::tempdir()?;
    let path = write_clip(&dir)?;
    let session = start()?;
    let module = *session.inputs().first().ok_or("no input")?;
    let mut handle = module.open(&path)?;
    assert_eq!(handle.set_track(track_type::AUDIO, TRACK_QUERY_COUNT)?, 2);
    assert_eq!(handle.set_track(track_type::AUDIO, 1)?, 1);
    assert!(matches!(
        handle.set_track(track_type::AUDIO, 0),
        Err(ConformanceError::Contract(_))
    ));

    let clip = SolidClip::default();
    let mut expected = vec![0u8; clip.frame_size()];
    clip.render_frame(7, &mut expected);
    assert_eq!(handle.read_video(7), Some(expected));

    let mut audio = vec![0u8; 32 * 4];
    clip.render_audio(1, 100, 32, &mut audio);
    assert_eq!(handle.read_audio(100, 32), Some(audio));
    assert!(matches!(
        handle.set_track(track_type::VIDEO, TRACK_QUERY_COUNT),
        Err(ConformanceError::Contract(_))
    ));
    assert_eq!(handle.time_to_frame(1.0), Some(30));
    assert!(handle.close());
    Ok(())
}

#[test]
fn test_input_rejects_other_files() -> TestResult {
    let _serial = SERIAL.lock();
    let dir = tempfile::tempdir()?;
    let other = dir.path().join("movie.avi");
    std::fs::write(&other, b"RIFF")?;
    let session = start()?;
    let module = *session.inputs().first().ok_or("no input")?;
    assert!(matches!(module.open(&other), Err(ConformanceError::Contract(_))));
    Ok(())
}

#[test]
fn test_insert_menu_uses_loaded_settings() -> TestResult {
    let _serial = SERIAL.lock();
    let session = start()?;
    assert!(mock::project::with_store(|store| store.insert_string(SETTINGS_KEY, r#"{"clip_length": 5}"#)));
    assert_eq!(session.load_project(), 1);

    let (_, insert) = session
        .registration()
        .menus
        .iter()
        .find(|(_, entry)| entry.kind == MenuKind::Layer)
        .ok_or("no layer menu")?;
    mock::edit::reset();
    assert!(mock::edit::invoke_menu(insert.callback));
    let objects = mock::edit::with_scene(|scene| scene.objects());
    let object = objects.first().ok_or("nothing inserted")?;
    assert_eq!((object.layer, object.start, object.end), (1, 0, 4));
    assert!(object.alias.contains("effect.name=Solid clip"));
    assert_eq!(mock::edit::stats().mutations, 1);
    Ok(())
}

#[test]
fn test_menus_are_refused_during_output() -> TestResult {
    let _serial = SERIAL.lock();
    let session = start()?;
    mock::edit::reset();
    mock::edit::set_output_in_progress(true);
    for (_, entry) in &session.registration().menus {
        assert!(!mock::edit::invoke_menu(entry.callback));
    }
    let stats = mock::edit::stats();
    assert_eq!((stats.refused, stats.mutations), (2, 0));
    Ok(())
}

#[test]
fn test_digest_output_writes_report() -> TestResult {
    let _serial = SERIAL.lock();
    let dir = tempfile::tempdir()?;
    let session = start()?;
    let output = *session.outputs().first().ok_or("no output")?;
    let func = output.func_output.ok_or("no func_output")?;
    let savefile = dir.path().join("digest.json");
    let run = mock::output::run(
        func,
        OutputJob {
            frames: 5,
            samples: 5 * 1600,
            savefile: savefile.display().to_string(),
            ..OutputJob::default()
        },
    );
    assert!(run.returned);
    assert_eq!(run.frames_requested, [0, 1, 2, 3, 4]);
    assert_eq!(run.samples_delivered, 5 * 1600);
    assert_eq!(run.buffer_size, Some((2, 2)));
    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&savefile)?)?;
    assert_eq!(written["frames"].as_array().map(Vec::len), Some(5));
    assert_eq!(written["aborted"], serde_json::Value::Bool(false));
    Ok(())
}

#[test]
fn test_script_stats_and_errors() -> TestResult {
    let _serial = SERIAL.lock();
    let session = start()?;
    let table = *session.scripts().first().ok_or("no script module")?;
    let functions = mock_functions(&table);
    let stats = functions.iter().find(|(n, _)| n == "stats").ok_or("no stats")?.1;
    let outcome = mock::script::call(
        stats,
        vec![ScriptValue::Array(vec![
            ScriptValue::Double(1.0),
            ScriptValue::Double(3.0),
            ScriptValue::Double(2.0),
        ])],
    );
    assert_eq!(
        outcome.results,
        [ScriptResult::TableDouble(vec![
            (String::from("min"), 1.0),
            (String::from("max"), 3.0),
            (String::from("mean"), 2.0),
        ])]
    );
    let empty = mock::script::call(stats, vec![ScriptValue::Array(Vec::new())]);
    assert!(empty.results.is_empty());
    assert!(empty.error.is_some_and(|e| e.contains("empty array")));

    let range = functions.iter().find(|(n, _)| n == "frame_range").ok_or("no frame_range")?.1;
    let outcome = mock::script::call(range, vec![ScriptValue::Int(10), ScriptValue::Int(3)]);
    assert_eq!(
        outcome.results,
        [ScriptResult::ArrayInt(vec![10, 11, 12]), ScriptResult::Int(3)]
    );
    Ok(())
}

type RawFn = unsafe extern "C" fn(*mut aviutl2_sys::ScriptModuleParam);

fn mock_functions(table: &aviutl2_sys::ScriptModuleTable) -> Vec<(String, RawFn)> {
    let mut out = Vec::new();
    for index in 0.. {
        // SAFETY: the list is terminated by an entry with a NULL name.
        let entry = unsafe { table.functions.add(index).read() };
        if entry.name.is_null() {
            break;
        }
        // SAFETY: non-NULL names are NUL-terminated.
        let name = unsafe { aviutl2::wide::read_wide_string(entry.name) }.unwrap_or_default();
        if let Some(func) = entry.func {
            out.push((name, func));
        }
    }
    out
}
