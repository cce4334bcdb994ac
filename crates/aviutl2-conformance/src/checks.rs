//! Individual conformance checks.
//!
//! Every check takes a started [`PluginSession`] and yields one
//! [`CheckOutcome`]. Checks never panic on plugin misbehavior; they report.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Barrier;

use aviutl2::wide::read_wide_string;
use aviutl2_sys as sys;
use aviutl2_sys::input::{TRACK_QUERY_COUNT, track_type};
use aviutl2_sys::{FilterPluginFlags, InputPluginFlags, OutputPluginFlags, PixelRgba, WChar};

use crate::config::ConformanceConfig;
use crate::mock::{self, MenuKind, OutputJob, ScriptValue};
use crate::report::CheckOutcome;
use crate::session::{InputModule, PluginSession, is_concurrent};

/// Check names as they appear in reports.
pub mod names {
    /// Hooks ran in order.
    pub const LIFECYCLE: &str = "lifecycle";
    /// Registration produced something usable.
    pub const REGISTRATION: &str = "registration";
    /// Filter item arrays are well-formed.
    pub const FILTER_ITEMS: &str = "filter-items";
    /// Filters process a block without breaking the frame contract.
    pub const FILTER_PROCESS: &str = "filter-process";
    /// Inputs open and read the configured files.
    pub const INPUT_READ: &str = "input-read";
    /// Concurrent inputs give identical results on distinct handles.
    pub const INPUT_CONCURRENCY: &str = "input-concurrency";
    /// Multi-track inputs answer the count query and the selection.
    pub const INPUT_TRACKS: &str = "input-tracks";
    /// Menus never mutate while output runs.
    pub const EDIT_EXCLUSION: &str = "edit-exclusion";
    /// Project values survive save, load and save.
    pub const PROJECT_ROUND_TRIP: &str = "project-round-trip";
    /// Project binaries stay within the host limit.
    pub const PROJECT_BINARY_LIMIT: &str = "project-binary-limit";
    /// Script function tables are well-formed and deterministic.
    pub const SCRIPT_FUNCTIONS: &str = "script-functions";
    /// Output stops requesting frames after abort.
    pub const OUTPUT_ABORT: &str = "output-abort";
}

const MAX_LIST_LEN: usize = 1024;

type RawScriptFn = unsafe extern "C" fn(*mut sys::ScriptModuleParam);

/// Run every check in a fixed order.
pub fn run_all(session: &PluginSession, config: &ConformanceConfig) -> Vec<CheckOutcome> {
    vec![
        check_lifecycle(session),
        check_registration(session),
        check_filter_items(session),
        check_filter_process(session),
        check_input_read(session, config),
        check_input_concurrency(session, config),
        check_input_tracks(session, config),
        check_edit_exclusion(session, config),
        check_project_round_trip(session),
        check_project_binary_limit(session),
        check_script_functions(session),
        check_output_abort(session, config),
    ]
}

/// `RequiredVersion`, the initialize hooks and registration ran in order.
pub fn check_lifecycle(session: &PluginSession) -> CheckOutcome {
    let events = session.lifecycle().events();
    let detail = format!("{events:?}");
    if session.lifecycle().is_ordered() {
        CheckOutcome::pass(names::LIFECYCLE, detail)
    } else {
        CheckOutcome::fail(names::LIFECYCLE, detail)
    }
}

/// Registration produced at least one table or menu and passed no NULLs.
pub fn check_registration(session: &PluginSession) -> CheckOutcome {
    let reg = session.registration();
    let detail = format!(
        "inputs={} outputs={} filters={} scripts={} menus={} windows={} project handlers={}/{}",
        reg.inputs.len(),
        reg.outputs.len(),
        reg.filters.len(),
        reg.scripts.len(),
        reg.menus.len(),
        reg.windows.len(),
        reg.load_handlers.len(),
        reg.save_handlers.len(),
    );
    if reg.null_arguments > 0 {
        return CheckOutcome::fail(
            names::REGISTRATION,
            format!("{} registration calls passed NULL; {detail}", reg.null_arguments),
        );
    }
    if reg.table_count() + reg.menus.len() + reg.windows.len() == 0 {
        return CheckOutcome::fail(names::REGISTRATION, "nothing registered");
    }
    if session.entry_points().register_plugin.is_some() && reg.information.is_none() {
        return CheckOutcome::gap(names::REGISTRATION, format!("no plugin information; {detail}"));
    }
    CheckOutcome::pass(names::REGISTRATION, detail)
}

fn known_tags() -> [&'static [u16]; 11] {
    use sys::item_type::*;
    [
        &TRACK, &CHECK, &COLOR, &SELECT, &FILE, &FOLDER, &STRING, &TEXT, &DATA, &GROUP, &BUTTON,
    ]
}

fn tag_matches(tag: *const WChar) -> bool {
    // SAFETY: the tag is a NUL-terminated static string when non-NULL.
    let Some(text) = (unsafe { aviutl2::wide::read_wide(tag) }) else {
        return false;
    };
    known_tags()
        .iter()
        .any(|known| known.split_last().is_some_and(|(_, body)| body == text))
}

/// Walk a filter's item array. Returns the count or a reason.
fn walk_items(table: &sys::FilterPluginTable) -> Result<usize, String> {
    if table.items.is_null() {
        return Ok(0);
    }
    for index in 0..MAX_LIST_LEN {
        // SAFETY: the array is NULL-terminated; `index` never passes the
        // terminator because the walk stops there.
        let item = unsafe { table.items.add(index).read() };
        if item.is_null() {
            return Ok(index);
        }
        // SAFETY: every item starts with its type tag pointer.
        let tag = unsafe { item.cast::<*const WChar>().read() };
        if !tag_matches(tag) {
            // SAFETY: as for the tag.
            let shown = unsafe { read_wide_string(tag) }.unwrap_or_else(|| String::from("NULL"));
            return Err(format!("item {index} has unknown type {shown:?}"));
        }
    }
    Err(format!("item array not terminated within {MAX_LIST_LEN} entries"))
}

/// Every filter's item array is NULL-terminated and uses known item types.
pub fn check_filter_items(session: &PluginSession) -> CheckOutcome {
    let filters = session.filters();
    if filters.is_empty() {
        return CheckOutcome::skipped(names::FILTER_ITEMS, "no filters registered");
    }
    let mut counts = Vec::with_capacity(filters.len());
    for table in &filters {
        // SAFETY: the name lives until unload.
        let name = unsafe { read_wide_string(table.name) }.unwrap_or_default();
        match walk_items(table) {
            Ok(count) => counts.push(format!("{name}: {count}")),
            Err(reason) => return CheckOutcome::fail(names::FILTER_ITEMS, format!("{name}: {reason}")),
        }
    }
    CheckOutcome::pass(names::FILTER_ITEMS, counts.join(", "))
}

fn probe_scene() -> sys::SceneInfo {
    sys::SceneInfo {
        width: 1920,
        height: 1080,
        rate: 30,
        scale: 1,
        sample_rate: 48_000,
    }
}

fn probe_image(width: usize, height: usize) -> Vec<PixelRgba> {
    (0..width * height)
        .map(|i| {
            let v = u8::try_from(i % 256).unwrap_or(0);
            PixelRgba { r: v, g: v / 2, b: 255 - v, a: 255 }
        })
        .collect()
}

/// Filters return true on a probe block; filter objects keep the image size.
pub fn check_filter_process(session: &PluginSession) -> CheckOutcome {
    let filters = session.filters();
    if filters.is_empty() {
        return CheckOutcome::skipped(names::FILTER_PROCESS, "no filters registered");
    }
    let mut notes = Vec::new();
    for table in &filters {
        // SAFETY: the name lives until unload.
        let name = unsafe { read_wide_string(table.name) }.unwrap_or_default();
        let flags = table.flags();
        let object = sys::ObjectInfo {
            id: 1,
            frame_total: 30,
            time_total: 1.0,
            channel_num: 2,
            effect_id: 1,
            ..sys::ObjectInfo::default()
        };
        if flags.contains(FilterPluginFlags::VIDEO) {
            let Some(proc_video) = table.func_proc_video else {
                return CheckOutcome::fail(names::FILTER_PROCESS, format!("{name}: VIDEO without func_proc_video"));
            };
            let run = mock::filter::run_video(proc_video, probe_scene(), object, probe_image(8, 4), 8);
            if !run.returned {
                return CheckOutcome::fail(names::FILTER_PROCESS, format!("{name}: video returned false"));
            }
            if flags.contains(FilterPluginFlags::FILTER) && (run.width, run.height) != (8, 4) {
                return CheckOutcome::fail(
                    names::FILTER_PROCESS,
                    format!("{name}: filter object resized image to {}x{}", run.width, run.height),
                );
            }
            notes.push(format!("{name}: video reads={} writes={}", run.reads, run.writes));
        }
        if flags.contains(FilterPluginFlags::AUDIO) {
            let Some(proc_audio) = table.func_proc_audio else {
                return CheckOutcome::fail(names::FILTER_PROCESS, format!("{name}: AUDIO without func_proc_audio"));
            };
            let block: Vec<f32> = (0u16..64).map(|i| f32::from(i) / 64.0).collect();
            let run = mock::filter::run_audio(proc_audio, probe_scene(), object, vec![block.clone(), block]);
            if !run.returned || run.bad_channels > 0 {
                return CheckOutcome::fail(
                    names::FILTER_PROCESS,
                    format!("{name}: audio returned {} with {} bad channel indices", run.returned, run.bad_channels),
                );
            }
            notes.push(format!("{name}: audio reads={} writes={}", run.reads, run.writes));
        }
    }
    CheckOutcome::pass(names::FILTER_PROCESS, notes.join(", "))
}

/// Inputs and the configured files they accept.
fn accepted_inputs<'a>(session: &PluginSession, files: &'a [std::path::PathBuf]) -> Vec<(InputModule, &'a Path)> {
    let mut pairs = Vec::new();
    for module in session.inputs() {
        for file in files {
            if module.open(file).is_ok() {
                pairs.push((module, file.as_path()));
            }
        }
    }
    pairs
}

/// Select track 0 of each kind the way the host does right after open.
fn select_default_tracks(session: &mut crate::session::InputSession, flags: InputPluginFlags) -> crate::Result<()> {
    if !flags.contains(InputPluginFlags::MULTI_TRACK) {
        return Ok(());
    }
    for kind in [track_type::VIDEO, track_type::AUDIO] {
        if session.set_track(kind, TRACK_QUERY_COUNT)? > 0 {
            session.set_track(kind, 0)?;
        }
    }
    Ok(())
}

/// Every input opens the configured files it accepts and reads frame 0.
pub fn check_input_read(session: &PluginSession, config: &ConformanceConfig) -> CheckOutcome {
    if session.inputs().is_empty() {
        return CheckOutcome::skipped(names::INPUT_READ, "no inputs registered");
    }
    if config.input_files.is_empty() {
        return CheckOutcome::skipped(names::INPUT_READ, "no input files configured");
    }
    let pairs = accepted_inputs(session, &config.input_files);
    if pairs.is_empty() {
        return CheckOutcome::gap(names::INPUT_READ, "no input accepted any configured file");
    }
    let mut notes = Vec::new();
    for (module, file) in pairs {
        let mut handle = match module.open(file) {
            Ok(handle) => handle,
            Err(err) => return CheckOutcome::fail(names::INPUT_READ, err.to_string()),
        };
        if let Err(err) = select_default_tracks(&mut handle, module.flags()) {
            return CheckOutcome::fail(names::INPUT_READ, err.to_string());
        }
        let Some(info) = handle.info() else {
            return CheckOutcome::fail(names::INPUT_READ, format!("{}: func_info_get failed", file.display()));
        };
        if info.format.is_some() && handle.read_video(0).is_none() {
            return CheckOutcome::fail(names::INPUT_READ, format!("{}: frame 0 unreadable", file.display()));
        }
        if info.audio_format.is_some() && handle.read_audio(0, 256).is_none() {
            return CheckOutcome::fail(names::INPUT_READ, format!("{}: no audio at 0", file.display()));
        }
        notes.push(format!("{}: {} frames, {} samples", file.display(), info.frames, info.samples));
        handle.close();
    }
    CheckOutcome::pass(names::INPUT_READ, notes.join(", "))
}

/// Sequential reference reads of the first `count` frames.
fn reference_frames(module: InputModule, file: &Path, count: usize) -> crate::Result<Vec<Option<Vec<u8>>>> {
    let mut handle = module.open(file)?;
    select_default_tracks(&mut handle, module.flags())?;
    let frames = handle.info().map_or(0, |i| usize::try_from(i.frames).unwrap_or(0));
    Ok((0..count.min(frames))
        .map(|f| handle.read_video(i32::try_from(f).unwrap_or(0)))
        .collect())
}

/// Concurrent inputs: distinct live handles, and reads on several threads
/// match sequential reads.
pub fn check_input_concurrency(session: &PluginSession, config: &ConformanceConfig) -> CheckOutcome {
    let pairs: Vec<_> = accepted_inputs(session, &config.input_files)
        .into_iter()
        .filter(|(module, _)| is_concurrent(module.flags()) && module.flags().contains(InputPluginFlags::VIDEO))
        .collect();
    let Some((module, file)) = pairs.first().copied() else {
        return CheckOutcome::skipped(names::INPUT_CONCURRENCY, "no concurrent video input with an accepted file");
    };
    let reference = match reference_frames(module, file, config.reads_per_thread) {
        Ok(reference) if !reference.is_empty() => reference,
        Ok(_) => return CheckOutcome::skipped(names::INPUT_CONCURRENCY, "input reports no frames"),
        Err(err) => return CheckOutcome::fail(names::INPUT_CONCURRENCY, err.to_string()),
    };

    let threads = config.concurrent_threads.max(1);
    let barrier = Barrier::new(threads);
    let (tx, rx) = crossbeam::channel::unbounded();
    std::thread::scope(|scope| {
        for worker in 0..threads {
            let tx = tx.clone();
            let (barrier, reference) = (&barrier, &reference);
            scope.spawn(move || {
                let opened = module.open(file);
                barrier.wait();
                let outcome = opened.and_then(|mut handle| {
                    select_default_tracks(&mut handle, module.flags())?;
                    let mut mismatches = 0usize;
                    for step in 0..config.reads_per_thread {
                        let frame = (step + worker) % reference.len();
                        let got = handle.read_video(i32::try_from(frame).unwrap_or(0));
                        if reference.get(frame) != Some(&got) {
                            mismatches += 1;
                        }
                    }
                    Ok((handle, mismatches))
                });
                // Every handle stays open until all workers are done reading.
                barrier.wait();
                let message = outcome
                    .map(|(handle, mismatches)| (handle.handle_addr(), mismatches))
                    .map_err(|err| err.to_string());
                let _sent = tx.send(message);
            });
        }
    });
    drop(tx);

    let mut addresses = BTreeSet::new();
    let mut mismatches = 0usize;
    for message in rx {
        match message {
            Ok((address, bad)) => {
                addresses.insert(address);
                mismatches += bad;
            }
            Err(reason) => return CheckOutcome::fail(names::INPUT_CONCURRENCY, reason),
        }
    }
    if addresses.len() != threads {
        return CheckOutcome::fail(
            names::INPUT_CONCURRENCY,
            format!("{threads} live opens produced {} distinct handles", addresses.len()),
        );
    }
    if mismatches > 0 {
        return CheckOutcome::fail(
            names::INPUT_CONCURRENCY,
            format!("{mismatches} concurrent reads differ from sequential reads"),
        );
    }
    CheckOutcome::pass(
        names::INPUT_CONCURRENCY,
        format!("{threads} threads x {} reads", config.reads_per_thread),
    )
}

/// Multi-track inputs report a track count and accept selecting track 0.
pub fn check_input_tracks(session: &PluginSession, config: &ConformanceConfig) -> CheckOutcome {
    let pairs: Vec<_> = accepted_inputs(session, &config.input_files)
        .into_iter()
        .filter(|(module, _)| module.flags().contains(InputPluginFlags::MULTI_TRACK))
        .collect();
    if pairs.is_empty() {
        return CheckOutcome::skipped(names::INPUT_TRACKS, "no multi-track input with an accepted file");
    }
    let mut notes = Vec::new();
    for (module, file) in pairs {
        let mut handle = match module.open(file) {
            Ok(handle) => handle,
            Err(err) => return CheckOutcome::fail(names::INPUT_TRACKS, err.to_string()),
        };
        for kind in [track_type::VIDEO, track_type::AUDIO] {
            let count = match handle.set_track(kind, TRACK_QUERY_COUNT) {
                Ok(count) => count,
                Err(err) => return CheckOutcome::fail(names::INPUT_TRACKS, err.to_string()),
            };
            if count < 0 {
                return CheckOutcome::fail(names::INPUT_TRACKS, format!("negative track count {count} for kind {kind}"));
            }
            if count > 0 {
                match handle.set_track(kind, 0) {
                    Ok(0) => {}
                    Ok(other) => {
                        return CheckOutcome::fail(
                            names::INPUT_TRACKS,
                            format!("selecting track 0 of kind {kind} returned {other}"),
                        );
                    }
                    Err(err) => return CheckOutcome::fail(names::INPUT_TRACKS, err.to_string()),
                }
            }
            notes.push(format!("{}: kind {kind} has {count}", file.display()));
        }
        if handle.info().is_none() {
            return CheckOutcome::fail(names::INPUT_TRACKS, "func_info_get failed after selection");
        }
    }
    CheckOutcome::pass(names::INPUT_TRACKS, notes.join(", "))
}

const PROBE_ALIAS: &str = "[Object]\n[Object.0]\neffect.name=Text\ntext=probe\n";

fn probe_edit_scene() {
    mock::edit::reset();
    mock::edit::with_scene(|scene| {
        if let Some(object) = scene.add_object(PROBE_ALIAS, 0, 0, 30) {
            scene.select(object);
            scene.set_focus(object);
        }
    });
}

/// Menus are refused while output runs and mutate nothing; outputs that
/// edit during the job are refused too.
pub fn check_edit_exclusion(session: &PluginSession, config: &ConformanceConfig) -> CheckOutcome {
    let menus = &session.registration().menus;
    let outputs = session.outputs();
    if menus.is_empty() && outputs.is_empty() {
        return CheckOutcome::skipped(names::EDIT_EXCLUSION, "no menus or outputs registered");
    }

    probe_edit_scene();
    mock::edit::set_output_in_progress(true);
    let accepted = menus.iter().filter(|(_, entry)| mock::edit::invoke_menu(entry.callback)).count();
    for table in &outputs {
        if let Some(func) = table.func_output {
            let _run = mock::output::run(func, short_job(config, table.flags(), None));
        }
    }
    let during = mock::edit::stats();
    mock::edit::set_output_in_progress(false);
    if accepted > 0 || during.mutations > 0 {
        return CheckOutcome::fail(
            names::EDIT_EXCLUSION,
            format!("{accepted} menus ran and {} mutations happened during output", during.mutations),
        );
    }

    probe_edit_scene();
    let ran = menus.iter().filter(|(_, entry)| mock::edit::invoke_menu(entry.callback)).count();
    let after = mock::edit::stats();
    if after.outside_section > 0 {
        return CheckOutcome::fail(
            names::EDIT_EXCLUSION,
            format!("{} edit calls outside a section", after.outside_section),
        );
    }
    let object_menus = session.registration().menu_names(MenuKind::Object).len();
    CheckOutcome::pass(
        names::EDIT_EXCLUSION,
        format!(
            "{} refused during output, {ran} ran after ({object_menus} object menus), {} mutations",
            during.refused, after.mutations
        ),
    )
}

/// Save, load into a fresh plugin state and save again; values must match.
pub fn check_project_round_trip(session: &PluginSession) -> CheckOutcome {
    let reg = session.registration();
    if reg.save_handlers.is_empty() {
        return CheckOutcome::skipped(names::PROJECT_ROUND_TRIP, "no project save handler");
    }
    mock::project::reset();
    session.save_project();
    let first = mock::project::snapshot();
    if first.is_empty() {
        return CheckOutcome::pass(names::PROJECT_ROUND_TRIP, "plugin stores nothing");
    }
    session.load_project();
    mock::project::with_store(mock::project::ProjectStore::clear);
    session.save_project();
    let second = mock::project::snapshot();
    if first.same_values(&second) {
        CheckOutcome::pass(names::PROJECT_ROUND_TRIP, format!("{} values", first.len()))
    } else {
        CheckOutcome::fail(
            names::PROJECT_ROUND_TRIP,
            format!("{} values saved, {} after load and save", first.len(), second.len()),
        )
    }
}

/// Saves keep binaries within the host limit.
pub fn check_project_binary_limit(session: &PluginSession) -> CheckOutcome {
    if session.registration().save_handlers.is_empty() {
        return CheckOutcome::skipped(names::PROJECT_BINARY_LIMIT, "no project save handler");
    }
    mock::project::reset();
    session.save_project();
    let store = mock::project::snapshot();
    if store.rejected_binaries > 0 {
        return CheckOutcome::gap(
            names::PROJECT_BINARY_LIMIT,
            format!(
                "{} binaries dropped; largest attempt {} bytes exceeds {}",
                store.rejected_binaries,
                store.largest_binary_attempt,
                sys::MAX_PROJECT_BINARY_SIZE
            ),
        );
    }
    CheckOutcome::pass(
        names::PROJECT_BINARY_LIMIT,
        format!("largest binary {} bytes", store.largest_binary_attempt),
    )
}

/// Collected `(name, func)` entries of a script function list.
fn script_functions(table: &sys::ScriptModuleTable) -> Result<Vec<(String, RawScriptFn)>, String> {
    let mut out = Vec::new();
    if table.functions.is_null() {
        return Ok(out);
    }
    for index in 0..MAX_LIST_LEN {
        // SAFETY: the list ends with an entry whose name is NULL; the walk
        // stops there.
        let entry = unsafe { table.functions.add(index).read() };
        if entry.name.is_null() {
            return Ok(out);
        }
        // SAFETY: non-NULL, NUL-terminated and static until unload.
        let name = unsafe { read_wide_string(entry.name) }.unwrap_or_default();
        let func = entry.func.ok_or_else(|| format!("{name} has no function pointer"))?;
        out.push((name, func));
    }
    Err(format!("function list not terminated within {MAX_LIST_LEN} entries"))
}

fn probe_args() -> Vec<ScriptValue> {
    vec![
        ScriptValue::Int(3),
        ScriptValue::Double(1.5),
        ScriptValue::Array(vec![ScriptValue::Int(1), ScriptValue::Int(2), ScriptValue::Int(4)]),
    ]
}

/// Script lists are terminated with unique names, and calls are
/// deterministic in results and errors.
pub fn check_script_functions(session: &PluginSession) -> CheckOutcome {
    let scripts = session.scripts();
    if scripts.is_empty() {
        return CheckOutcome::skipped(names::SCRIPT_FUNCTIONS, "no script modules registered");
    }
    let mut called = 0usize;
    let mut errors = 0usize;
    for table in &scripts {
        let functions = match script_functions(table) {
            Ok(functions) => functions,
            Err(reason) => return CheckOutcome::fail(names::SCRIPT_FUNCTIONS, reason),
        };
        let mut seen = BTreeSet::new();
        for (name, func) in functions {
            if !seen.insert(name.clone()) {
                return CheckOutcome::fail(names::SCRIPT_FUNCTIONS, format!("duplicate function {name}"));
            }
            let first = mock::script::call(func, probe_args());
            let second = mock::script::call(func, probe_args());
            if first != second {
                return CheckOutcome::fail(names::SCRIPT_FUNCTIONS, format!("{name} is not deterministic"));
            }
            errors += usize::from(first.error.is_some());
            called += 1;
        }
    }
    CheckOutcome::pass(
        names::SCRIPT_FUNCTIONS,
        format!("{called} functions, {errors} reported errors on probe arguments"),
    )
}

fn short_job(config: &ConformanceConfig, flags: OutputPluginFlags, abort: Option<usize>) -> OutputJob {
    let frames = config.output_frames.max(1);
    OutputJob {
        frames,
        samples: frames * 1600,
        video: flags.contains(OutputPluginFlags::VIDEO),
        audio: flags.contains(OutputPluginFlags::AUDIO),
        abort_after_polls: abort,
        ..OutputJob::default()
    }
}

/// Outputs poll abort and request no frames once it is signalled.
pub fn check_output_abort(session: &PluginSession, config: &ConformanceConfig) -> CheckOutcome {
    let outputs = session.outputs();
    if outputs.is_empty() {
        return CheckOutcome::skipped(names::OUTPUT_ABORT, "no outputs registered");
    }
    let mut notes = Vec::new();
    for table in &outputs {
        // SAFETY: the name lives until unload.
        let name = unsafe { read_wide_string(table.name) }.unwrap_or_default();
        let Some(func) = table.func_output else {
            return CheckOutcome::fail(names::OUTPUT_ABORT, format!("{name}: no func_output"));
        };
        let full = mock::output::run(func, short_job(config, table.flags(), None));
        if full.unknown_formats > 0 {
            return CheckOutcome::fail(names::OUTPUT_ABORT, format!("{name}: requested an unknown format"));
        }
        let limit = config.abort_after_frames.min(config.output_frames.saturating_sub(1));
        let aborted = mock::output::run(func, short_job(config, table.flags(), Some(limit)));
        if aborted.frames_after_abort > 0 {
            return CheckOutcome::fail(
                names::OUTPUT_ABORT,
                format!("{name}: {} frames requested after abort", aborted.frames_after_abort),
            );
        }
        if !aborted.abort_signalled {
            return CheckOutcome::gap(names::OUTPUT_ABORT, format!("{name}: never polled is_abort"));
        }
        notes.push(format!(
            "{name}: {} frames full, {} before abort",
            full.frames_requested.len(),
            aborted.frames_requested.len()
        ));
    }
    CheckOutcome::pass(names::OUTPUT_ABORT, notes.join(", "))
}
