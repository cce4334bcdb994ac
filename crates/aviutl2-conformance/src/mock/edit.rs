//! Object arena and edit-section host.
//!
//! Object handles encode `(generation << 32) | (slot + 1)`; every call
//! validates the handle against the arena, so stale handles from a deleted
//! object are detected instead of aliasing a new one. While an output job
//! runs, edit sections are refused and nothing is mutated.

use std::cell::RefCell;
use std::ffi::{CString, c_char, c_void};

use aviutl2::wide::{read_c_str, read_wide_string};
use aviutl2_sys as sys;
use aviutl2_sys::plugin::{EditParamProc, EditProc};
use serde::Serialize;

use super::{StaticTable, to_i32, to_usize};

/// Counters observed by the checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EditStats {
    /// Edit sections entered.
    pub sections: usize,
    /// Edit section requests refused (output running or nested).
    pub refused: usize,
    /// Successful mutations (create, set, move, delete).
    pub mutations: usize,
    /// Calls with a NULL, stale or foreign object handle.
    pub invalid_handles: usize,
    /// Section functions called outside any edit section.
    pub outside_section: usize,
}

/// Owned view of one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectSnapshot {
    /// Layer.
    pub layer: i32,
    /// First frame.
    pub start: i32,
    /// Last frame (inclusive).
    pub end: i32,
    /// Alias text.
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Effect {
    name: String,
    items: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MockObject {
    layer: i32,
    start: i32,
    end: i32,
    effects: Vec<Effect>,
}

impl MockObject {
    fn overlaps(&self, layer: i32, start: i32, end: i32) -> bool {
        self.layer == layer && self.start <= end && start <= self.end
    }

    fn alias(&self) -> String {
        let mut text = format!("[Object]\nframe={},{}\n", self.start, self.end);
        for (index, effect) in self.effects.iter().enumerate() {
            text.push_str(&format!("[Object.{index}]\neffect.name={}\n", effect.name));
            for (key, value) in &effect.items {
                text.push_str(&format!("{key}={value}\n"));
            }
        }
        text
    }

    /// Effect by `effect.name`, with an optional `:N` instance suffix.
    fn effect_mut(&mut self, name: &str) -> Option<&mut Effect> {
        let (name, nth) = match name.rsplit_once(':') {
            Some((base, n)) => match n.parse::<usize>() {
                Ok(n) => (base, n),
                Err(_) => (name, 0),
            },
            None => (name, 0),
        };
        self.effects.iter_mut().filter(|e| e.name == name).nth(nth)
    }
}

/// Parsed alias: `(explicit frame range, effects)`.
type ParsedAlias = (Option<(i32, i32)>, Vec<Effect>);

fn parse_alias(text: &str) -> Option<ParsedAlias> {
    let mut seen_object = false;
    let mut in_object = false;
    let mut frames = None;
    let mut effects: Vec<Effect> = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_object = section == "Object";
            if in_object {
                seen_object = true;
            } else if section.starts_with("Object.") {
                effects.push(Effect {
                    name: String::new(),
                    items: Vec::new(),
                });
            } else {
                return None;
            }
            continue;
        }
        let (key, value) = line.split_once('=')?;
        if in_object {
            if key == "frame" {
                let (start, end) = value.split_once(',')?;
                frames = Some((start.trim().parse().ok()?, end.trim().parse().ok()?));
            }
            continue;
        }
        let effect = effects.last_mut()?;
        if key == "effect.name" {
            effect.name = value.to_string();
        } else {
            effect.items.push((key.to_string(), value.to_string()));
        }
    }
    let valid = seen_object && !effects.is_empty() && effects.iter().all(|e| !e.name.is_empty());
    valid.then_some((frames, effects))
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    object: Option<MockObject>,
}

fn encode(slot: usize, generation: u32) -> sys::ObjectHandle {
    let raw = (u64::from(generation) << 32) | (slot as u64 + 1);
    std::ptr::without_provenance_mut(usize::try_from(raw).unwrap_or(0))
}

fn decode(handle: sys::ObjectHandle) -> Option<(usize, u32)> {
    let raw = handle.addr() as u64;
    let slot = usize::try_from(raw & 0xffff_ffff).ok()?.checked_sub(1)?;
    let generation = u32::try_from(raw >> 32).ok()?;
    Some((slot, generation))
}

/// Host-side edit state of one thread.
#[derive(Debug, Clone)]
pub struct EditScene {
    slots: Vec<Slot>,
    /// Scene parameters reported in the edit-section info.
    pub info: sys::EditInfo,
    /// Refuse edit sections, as during an output job.
    pub output_in_progress: bool,
    focus: Option<(usize, u32)>,
    pending_focus: Option<(usize, u32)>,
    selected: Vec<(usize, u32)>,
    stats: EditStats,
    scratch: Vec<CString>,
    in_section: bool,
}

impl Default for EditScene {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            info: sys::EditInfo {
                width: 1920,
                height: 1080,
                rate: 30,
                scale: 1,
                sample_rate: 48_000,
                ..sys::EditInfo::default()
            },
            output_in_progress: false,
            focus: None,
            pending_focus: None,
            selected: Vec::new(),
            stats: EditStats::default(),
            scratch: Vec::new(),
            in_section: false,
        }
    }
}

impl EditScene {
    /// Counters so far.
    pub fn stats(&self) -> EditStats {
        self.stats
    }

    /// Place an object as host-side setup. Not counted as a mutation.
    pub fn add_object(&mut self, alias: &str, layer: i32, frame: i32, length: i32) -> Option<sys::ObjectHandle> {
        let (frames, effects) = parse_alias(alias)?;
        let (start, end) = match frames {
            Some((start, end)) => (frame, frame.saturating_add(end.saturating_sub(start))),
            None if length > 0 => (frame, frame.saturating_add(length - 1)),
            None => return None,
        };
        if layer < 0 || start < 0 || end < start {
            return None;
        }
        if self.objects_iter().any(|o| o.overlaps(layer, start, end)) {
            return None;
        }
        let object = MockObject {
            layer,
            start,
            end,
            effects,
        };
        let slot = match self.slots.iter().position(|s| s.object.is_none()) {
            Some(slot) => slot,
            None => {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
        };
        let entry = self.slots.get_mut(slot)?;
        entry.object = Some(object);
        Some(encode(slot, entry.generation))
    }

    /// Mark an object as selected in the layer editor.
    pub fn select(&mut self, handle: sys::ObjectHandle) -> bool {
        match self.resolve(handle) {
            Some(_) => {
                if let Some(key) = decode(handle) {
                    self.selected.push(key);
                }
                true
            }
            None => false,
        }
    }

    /// Show an object in the settings window.
    pub fn set_focus(&mut self, handle: sys::ObjectHandle) -> bool {
        let valid = self.resolve(handle).is_some();
        if valid {
            self.focus = decode(handle);
        }
        valid
    }

    /// Live objects ordered by layer and start frame.
    pub fn objects(&self) -> Vec<ObjectSnapshot> {
        let mut objects: Vec<_> = self
            .objects_iter()
            .map(|o| ObjectSnapshot {
                layer: o.layer,
                start: o.start,
                end: o.end,
                alias: o.alias(),
            })
            .collect();
        objects.sort_by_key(|o| (o.layer, o.start));
        objects
    }

    fn objects_iter(&self) -> impl Iterator<Item = &MockObject> {
        self.slots.iter().filter_map(|s| s.object.as_ref())
    }

    fn resolve(&self, handle: sys::ObjectHandle) -> Option<usize> {
        let (slot, generation) = decode(handle)?;
        let entry = self.slots.get(slot)?;
        (entry.generation == generation && entry.object.is_some()).then_some(slot)
    }

    fn object(&mut self, handle: sys::ObjectHandle) -> Option<&mut MockObject> {
        match self.resolve(handle) {
            Some(slot) => self.slots.get_mut(slot).and_then(|s| s.object.as_mut()),
            None => {
                self.stats.invalid_handles += 1;
                None
            }
        }
    }

    fn handle_of(&self, slot: usize) -> sys::ObjectHandle {
        self.slots
            .get(slot)
            .map_or(std::ptr::null_mut(), |s| encode(slot, s.generation))
    }

    fn live_handle(&self, key: Option<(usize, u32)>) -> sys::ObjectHandle {
        match key {
            Some((slot, generation)) => {
                let handle = encode(slot, generation);
                if self.resolve(handle).is_some() {
                    handle
                } else {
                    std::ptr::null_mut()
                }
            }
            None => std::ptr::null_mut(),
        }
    }

    fn snapshot_info(&self) -> sys::EditInfo {
        let mut info = self.info;
        info.frame_max = self.objects_iter().map(|o| o.end).max().unwrap_or(0);
        info.layer_max = self.objects_iter().map(|o| o.layer).max().unwrap_or(0);
        info
    }

    fn keep(&mut self, text: String) -> *const c_char {
        match CString::new(text) {
            Ok(text) => {
                let ptr = text.as_ptr();
                self.scratch.push(text);
                ptr
            }
            Err(_) => std::ptr::null(),
        }
    }

    fn enter(&mut self) -> bool {
        if self.output_in_progress || self.in_section {
            self.stats.refused += 1;
            tracing::debug!(output = self.output_in_progress, "edit section refused");
            return false;
        }
        self.in_section = true;
        self.stats.sections += 1;
        true
    }

    fn leave(&mut self) {
        self.in_section = false;
        self.scratch.clear();
        if let Some(focus) = self.pending_focus.take() {
            self.focus = Some(focus);
        }
    }
}

thread_local! {
    static SCENE: RefCell<EditScene> = RefCell::new(EditScene::default());
}

/// Run `f` on this thread's scene.
pub fn with_scene<R>(f: impl FnOnce(&mut EditScene) -> R) -> R {
    SCENE.with(|scene| f(&mut scene.borrow_mut()))
}

/// Replace this thread's scene.
pub fn install(scene: EditScene) {
    SCENE.with(|s| *s.borrow_mut() = scene);
}

/// Fresh scene for this thread.
pub fn reset() {
    install(EditScene::default());
}

/// Counters of this thread's scene.
pub fn stats() -> EditStats {
    with_scene(|scene| scene.stats)
}

/// Toggle the "output in progress" state.
pub fn set_output_in_progress(active: bool) {
    with_scene(|scene| scene.output_in_progress = active);
}

/// Run `f` only inside an edit section; counts misuse otherwise.
fn in_section<R>(fallback: R, f: impl FnOnce(&mut EditScene) -> R) -> R {
    with_scene(|scene| {
        if scene.in_section {
            f(scene)
        } else {
            scene.stats.outside_section += 1;
            fallback
        }
    })
}

fn wide(ptr: *const u16) -> Option<String> {
    // SAFETY: the plugin passes a NUL-terminated string valid for the call.
    unsafe { read_wide_string(ptr) }
}

unsafe extern "C" fn create_object_from_alias(
    alias: *const c_char,
    layer: i32,
    frame: i32,
    length: i32,
) -> sys::ObjectHandle {
    // SAFETY: NUL-terminated UTF-8 valid for the call.
    let Some(alias) = (unsafe { read_c_str(alias) }).and_then(|a| a.to_str().ok()) else {
        return std::ptr::null_mut();
    };
    in_section(std::ptr::null_mut(), |scene| {
        match scene.add_object(alias, layer, frame, length) {
            Some(handle) => {
                scene.stats.mutations += 1;
                handle
            }
            None => std::ptr::null_mut(),
        }
    })
}

unsafe extern "C" fn find_object(layer: i32, frame: i32) -> sys::ObjectHandle {
    in_section(std::ptr::null_mut(), |scene| {
        let found = scene
            .slots
            .iter()
            .enumerate()
            .filter_map(|(slot, s)| s.object.as_ref().map(|o| (slot, o)))
            .filter(|(_, o)| o.layer == layer && o.end >= frame)
            .min_by_key(|(_, o)| o.start)
            .map(|(slot, _)| slot);
        found.map_or(std::ptr::null_mut(), |slot| scene.handle_of(slot))
    })
}

unsafe extern "C" fn count_object_effect(object: sys::ObjectHandle, effect: *const u16) -> i32 {
    let Some(effect) = wide(effect) else {
        return 0;
    };
    in_section(0, |scene| {
        scene.object(object).map_or(0, |o| {
            to_i32(o.effects.iter().filter(|e| e.name == effect).count())
        })
    })
}

unsafe extern "C" fn get_object_layer_frame(object: sys::ObjectHandle) -> sys::ObjectLayerFrame {
    in_section(sys::ObjectLayerFrame::default(), |scene| {
        scene
            .object(object)
            .map_or_else(sys::ObjectLayerFrame::default, |o| sys::ObjectLayerFrame {
                layer: o.layer,
                start: o.start,
                end: o.end,
            })
    })
}

unsafe extern "C" fn get_object_alias(object: sys::ObjectHandle) -> *const c_char {
    in_section(std::ptr::null(), |scene| {
        let Some(alias) = scene.object(object).map(|o| o.alias()) else {
            return std::ptr::null();
        };
        scene.keep(alias)
    })
}

unsafe extern "C" fn get_object_item_value(
    object: sys::ObjectHandle,
    effect: *const u16,
    item: *const u16,
) -> *const c_char {
    let (Some(effect), Some(item)) = (wide(effect), wide(item)) else {
        return std::ptr::null();
    };
    in_section(std::ptr::null(), |scene| {
        let value = scene
            .object(object)
            .and_then(|o| o.effect_mut(&effect))
            .and_then(|e| e.items.iter().find(|(k, _)| *k == item))
            .map(|(_, v)| v.clone());
        value.map_or(std::ptr::null(), |v| scene.keep(v))
    })
}

unsafe extern "C" fn set_object_item_value(
    object: sys::ObjectHandle,
    effect: *const u16,
    item: *const u16,
    value: *const c_char,
) -> bool {
    let (Some(effect), Some(item)) = (wide(effect), wide(item)) else {
        return false;
    };
    // SAFETY: NUL-terminated UTF-8 valid for the call.
    let Some(value) = (unsafe { read_c_str(value) }).map(|v| v.to_string_lossy().into_owned()) else {
        return false;
    };
    in_section(false, |scene| {
        let slot = scene
            .object(object)
            .and_then(|o| o.effect_mut(&effect))
            .and_then(|e| e.items.iter_mut().find(|(k, _)| *k == item));
        match slot {
            Some((_, stored)) => {
                *stored = value;
                scene.stats.mutations += 1;
                true
            }
            None => false,
        }
    })
}

unsafe extern "C" fn move_object(object: sys::ObjectHandle, layer: i32, frame: i32) -> bool {
    in_section(false, |scene| {
        let Some(slot) = scene.resolve(object) else {
            scene.stats.invalid_handles += 1;
            return false;
        };
        let Some(current) = scene.slots.get(slot).and_then(|s| s.object.clone()) else {
            return false;
        };
        let end = frame.saturating_add(current.end - current.start);
        let blocked = layer < 0
            || frame < 0
            || scene
                .slots
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != slot)
                .filter_map(|(_, s)| s.object.as_ref())
                .any(|o| o.overlaps(layer, frame, end));
        if blocked {
            return false;
        }
        if let Some(o) = scene.slots.get_mut(slot).and_then(|s| s.object.as_mut()) {
            o.layer = layer;
            o.start = frame;
            o.end = end;
        }
        scene.stats.mutations += 1;
        true
    })
}

unsafe extern "C" fn delete_object(object: sys::ObjectHandle) {
    in_section((), |scene| {
        let Some(slot) = scene.resolve(object) else {
            scene.stats.invalid_handles += 1;
            return;
        };
        if let Some(entry) = scene.slots.get_mut(slot) {
            entry.object = None;
            entry.generation = entry.generation.wrapping_add(1);
        }
        scene.selected.retain(|(s, _)| *s != slot);
        scene.stats.mutations += 1;
    });
}

unsafe extern "C" fn get_focus_object() -> sys::ObjectHandle {
    in_section(std::ptr::null_mut(), |scene| scene.live_handle(scene.focus))
}

unsafe extern "C" fn set_focus_object(object: sys::ObjectHandle) {
    in_section((), |scene| {
        if scene.resolve(object).is_some() {
            scene.pending_focus = decode(object);
        } else {
            scene.stats.invalid_handles += 1;
        }
    });
}

unsafe extern "C" fn get_selected_object(index: i32) -> sys::ObjectHandle {
    in_section(std::ptr::null_mut(), |scene| {
        let key = usize::try_from(index).ok().and_then(|i| scene.selected.get(i)).copied();
        scene.live_handle(key)
    })
}

unsafe extern "C" fn get_selected_object_num() -> i32 {
    in_section(0, |scene| to_i32(scene.selected.len()))
}

fn section_table(info: *mut sys::EditInfo) -> sys::EditSection {
    sys::EditSection {
        info,
        create_object_from_alias: Some(create_object_from_alias),
        find_object: Some(find_object),
        count_object_effect: Some(count_object_effect),
        get_object_layer_frame: Some(get_object_layer_frame),
        get_object_alias: Some(get_object_alias),
        get_object_item_value: Some(get_object_item_value),
        set_object_item_value: Some(set_object_item_value),
        move_object: Some(move_object),
        delete_object: Some(delete_object),
        get_focus_object: Some(get_focus_object),
        set_focus_object: Some(set_focus_object),
        deprecated_output_log: Some(super::logger::deprecated_output_log),
        get_selected_object: Some(get_selected_object),
        get_selected_object_num: Some(get_selected_object_num),
    }
}

/// Enter a section, run `body` with the raw table, leave.
fn run_section(body: impl FnOnce(*mut sys::EditSection)) -> bool {
    let Some(mut info) = with_scene(|scene| scene.enter().then(|| scene.snapshot_info())) else {
        return false;
    };
    let mut section = section_table(&raw mut info);
    body(&raw mut section);
    with_scene(EditScene::leave);
    true
}

unsafe extern "C" fn call_edit_section(func_proc_edit: Option<EditProc>) -> bool {
    let Some(proc_edit) = func_proc_edit else {
        return false;
    };
    run_section(|section| {
        // SAFETY: `section` and its info live until `run_section` returns.
        unsafe { proc_edit(section) };
    })
}

unsafe extern "C" fn call_edit_section_param(
    param: *mut c_void,
    func_proc_edit: Option<EditParamProc>,
) -> bool {
    let Some(proc_edit) = func_proc_edit else {
        return false;
    };
    run_section(|section| {
        // SAFETY: as above; `param` is forwarded untouched.
        unsafe { proc_edit(param, section) };
    })
}

static HANDLE: StaticTable<sys::EditHandle> = StaticTable::new(sys::EditHandle {
    call_edit_section: Some(call_edit_section),
    call_edit_section_param: Some(call_edit_section_param),
});

/// Handle returned by `create_edit_handle`.
pub fn handle() -> *mut sys::EditHandle {
    HANDLE.as_ptr()
}

/// Host-initiated call of a menu entry. Returns false if refused.
pub fn invoke_menu(callback: EditProc) -> bool {
    // SAFETY: the static handle is always valid.
    unsafe { call_edit_section(Some(callback)) }
}

/// Number of frames an alias spans when placed with `length`.
pub fn alias_length(alias: &str, length: i32) -> Option<usize> {
    let (frames, _) = parse_alias(alias)?;
    match frames {
        Some((start, end)) => usize::try_from(end - start + 1).ok(),
        None => (length > 0).then(|| to_usize(length)),
    }
}
