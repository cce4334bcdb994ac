//! End-to-end tests of the exported entry points of a filter plugin.
//!
//! The export macro runs once per test binary, so every test here drives
//! the same `GetFilterPluginTable`/`InitializePlugin` symbols. Tests share the
//! process-wide plugin state and are serialized.

#![allow(unsafe_code, reason = "tests call the exported C entry points")]

use std::cell::RefCell;
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};

use aviutl2::prelude::*;
use aviutl2::sys;
use parking_lot::{Mutex, const_mutex};

type TestResult = Result<(), Box<dyn std::error::Error>>;

static SERIAL: Mutex<()> = const_mutex(());
static BUTTON_PRESSES: AtomicUsize = AtomicUsize::new(0);

struct Brightness;

fn reset_pressed(_edit: &mut EditSection<'_>) -> AnyResult<()> {
    BUTTON_PRESSES.fetch_add(1, Ordering::SeqCst);
    Ok(())
}

impl FilterPlugin for Brightness {
    fn new(info: HostInfo) -> AnyResult<Self> {
        if info.version == 0 {
            return Err("host version 0 is not supported".into());
        }
        Ok(Self)
    }

    fn plugin_table(&self) -> FilterPluginTable {
        FilterPluginTable {
            name: "Brightness".into(),
            label: Some("Color".into()),
            information: "Brightness filter test".into(),
            flags: FilterPluginFlags::VIDEO | FilterPluginFlags::FILTER,
            items: vec![
                FilterItem::track("Amount", 10.0, -255.0, 255.0, 1.0),
                FilterItem::button("Reset", aviutl2::edit_callback!(reset_pressed)),
            ],
        }
    }

    fn proc_video(&self, config: &FilterConfig, video: &mut VideoFilterContext<'_>) -> AnyResult<()> {
        let amount = config.track("Amount").unwrap_or(0.0).round();
        let (w, h) = video.size();
        let mut pixels = video.image()?;
        for p in &mut pixels {
            p.r = add(p.r, amount);
            p.g = add(p.g, amount);
            p.b = add(p.b, amount);
        }
        video.set_image(&pixels, w, h)?;
        Ok(())
    }
}

fn add(channel: u8, amount: f64) -> u8 {
    let value = (f64::from(channel) + amount).clamp(0.0, 255.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "value is clamped to 0..=255")]
    let byte = value as u8;
    byte
}

aviutl2::export_filter_plugin!(Brightness, required_version = 2_001_900);

thread_local! {
    static FRAME: RefCell<Vec<PixelRgba>> = const { RefCell::new(Vec::new()) };
}

unsafe extern "C" fn get_image(buffer: *mut PixelRgba) {
    FRAME.with(|f| {
        let frame = f.borrow();
        // SAFETY: the SDK allocates width * height pixels.
        unsafe { std::ptr::copy_nonoverlapping(frame.as_ptr(), buffer, frame.len()) };
    });
}

unsafe extern "C" fn set_image(buffer: *mut PixelRgba, width: i32, height: i32) {
    let len = usize::try_from(width * height).unwrap_or(0);
    // SAFETY: the SDK passes width * height pixels.
    let pixels = unsafe { std::slice::from_raw_parts(buffer, len) }.to_vec();
    FRAME.with(|f| *f.borrow_mut() = pixels);
}

fn run_video(table: &sys::FilterPluginTable, pixels: Vec<PixelRgba>) -> Result<Vec<PixelRgba>, Box<dyn std::error::Error>> {
    FRAME.with(|f| *f.borrow_mut() = pixels);
    let scene = SceneInfo::default();
    let object = ObjectInfo {
        width: 2,
        height: 1,
        ..ObjectInfo::default()
    };
    let mut video = sys::FilterProcVideo {
        scene: &scene,
        object: &object,
        get_image_data: Some(get_image),
        set_image_data: Some(set_image),
        get_image_texture2d: None,
        get_framebuffer_texture2d: None,
    };
    let proc_video = table.func_proc_video.ok_or("no video proc")?;
    // SAFETY: `video` outlives the call.
    if !unsafe { proc_video(&mut video) } {
        return Err("proc_video failed".into());
    }
    Ok(FRAME.with(|f| f.borrow().clone()))
}

fn item(table: &sys::FilterPluginTable, index: usize) -> Result<*mut c_void, Box<dyn std::error::Error>> {
    // SAFETY: the item array is NULL-terminated and `index` is in range.
    let ptr = unsafe { *table.items.add(index) };
    if ptr.is_null() {
        return Err("item out of range".into());
    }
    Ok(ptr)
}

#[test]
fn test_entry_points_round_trip() -> TestResult {
    let _serial = SERIAL.lock();
    assert_eq!(RequiredVersion(), 2_001_900);
    assert!(InitializePlugin(2_002_000));
    let table = GetFilterPluginTable();
    // SAFETY: the table stays valid until `UninitializePlugin`.
    let table = unsafe { table.as_ref() }.ok_or("null table")?;
    assert_eq!(table.flags(), FilterPluginFlags::VIDEO | FilterPluginFlags::FILTER);
    assert!(table.func_proc_audio.is_none());
    // SAFETY: the name is a live NUL-terminated string.
    let name = unsafe { aviutl2::wide::read_wide_string(table.name) };
    assert_eq!(name.as_deref(), Some("Brightness"));

    let out = run_video(table, vec![PixelRgba { r: 250, g: 0, b: 100, a: 255 }; 2])?;
    assert!(out.iter().all(|p| p.r == 255 && p.g == 10 && p.b == 110 && p.a == 255));

    // The host writes the current slider value before each call.
    let track = item(table, 0)?.cast::<sys::FilterItemTrack>();
    // SAFETY: item 0 is the track declared first.
    unsafe { (*track).value = -20.0 };
    let out = run_video(table, vec![PixelRgba { r: 10, g: 30, b: 0, a: 128 }; 2])?;
    assert!(out.iter().all(|p| p.r == 0 && p.g == 10 && p.b == 0 && p.a == 128));

    UninitializePlugin();
    assert!(GetFilterPluginTable().is_null());
    Ok(())
}

#[test]
fn test_button_callback_runs_inside_section() -> TestResult {
    let _serial = SERIAL.lock();
    assert!(InitializePlugin(1));
    // SAFETY: the table stays valid until `UninitializePlugin`.
    let table = unsafe { GetFilterPluginTable().as_ref() }.ok_or("null table")?;
    let button = item(table, 1)?.cast::<sys::FilterItemButton>();
    // SAFETY: item 1 is the button.
    let callback = unsafe { (*button).callback }.ok_or("no button callback")?;
    let mut info = sys::EditInfo::default();
    let mut section = sys::EditSection {
        info: &mut info,
        create_object_from_alias: None,
        find_object: None,
        count_object_effect: None,
        get_object_layer_frame: None,
        get_object_alias: None,
        get_object_item_value: None,
        set_object_item_value: None,
        move_object: None,
        delete_object: None,
        get_focus_object: None,
        set_focus_object: None,
        deprecated_output_log: None,
        get_selected_object: None,
        get_selected_object_num: None,
    };
    let before = BUTTON_PRESSES.load(Ordering::SeqCst);
    // SAFETY: `section` outlives the call.
    unsafe { callback(&mut section) };
    assert_eq!(BUTTON_PRESSES.load(Ordering::SeqCst), before + 1);
    assert!(!aviutl2::in_edit_section());
    UninitializePlugin();
    Ok(())
}

#[test]
fn test_failing_new_reports_false() {
    let _serial = SERIAL.lock();
    assert!(!InitializePlugin(0));
    assert!(GetFilterPluginTable().is_null());
    assert!(!aviutl2::plugin::is_initialized());
}

#[test]
fn test_reinitialize_replaces_state() {
    let _serial = SERIAL.lock();
    assert!(InitializePlugin(1));
    let first = GetFilterPluginTable();
    assert!(InitializePlugin(1));
    assert!(!GetFilterPluginTable().is_null());
    assert!(!first.is_null());
    UninitializePlugin();
}
