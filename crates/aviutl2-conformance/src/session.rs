//! Host-side lifecycle driver and input handle sessions.

use std::path::Path;

use aviutl2::WideString;
use aviutl2_sys as sys;
use aviutl2_sys::input::{TRACK_QUERY_COUNT, track_type};
use aviutl2_sys::{BitmapInfoHeader, InputInfoFlags, InputPluginFlags, WaveFormatEx, video_format};

use crate::config::ConformanceConfig;
use crate::error::{ConformanceError, Result};
use crate::loader::{EntryPoints, LifecycleEvent, LifecycleLog};
use crate::mock::{self, RecordedRegistration, RegistrationState};

/// One loaded plugin driven through the host lifecycle.
///
/// Tables returned by the plugin stay valid until [`PluginSession::finish`]
/// (also run on drop). The library backing the entry points must outlive
/// the session.
#[derive(Debug)]
pub struct PluginSession {
    name: String,
    entry: EntryPoints,
    lifecycle: LifecycleLog,
    state: RegistrationState,
    required_version: Option<u32>,
    registration: RecordedRegistration,
}

impl PluginSession {
    /// Run `RequiredVersion`, the initialize hooks and registration.
    ///
    /// # Errors
    ///
    /// - [`ConformanceError::VersionTooOld`] if the plugin needs a newer host.
    /// - [`ConformanceError::InitializationFailed`] if `InitializePlugin`
    ///   returns false.
    /// - [`ConformanceError::NoEntryPoint`] if nothing can be registered.
    pub fn start(name: impl Into<String>, entry: EntryPoints, config: &ConformanceConfig) -> Result<Self> {
        let name = name.into();
        if !entry.has_module() {
            return Err(ConformanceError::NoEntryPoint { path: name.into() });
        }
        mock::reset_thread_state();
        let mut lifecycle = LifecycleLog::default();

        let required_version = entry.required_version.map(|required| {
            lifecycle.push(LifecycleEvent::RequiredVersion);
            // SAFETY: no arguments.
            unsafe { required() }
        });
        if let Some(required) = required_version
            && required > config.host_version
        {
            return Err(ConformanceError::VersionTooOld {
                required,
                host: config.host_version,
            });
        }

        if let Some(init) = entry.initialize_logger {
            lifecycle.push(LifecycleEvent::InitializeLogger);
            // SAFETY: the mock logger handle lives for the whole process.
            unsafe { init(mock::logger::handle()) };
        }
        if let Some(init) = entry.initialize_config {
            lifecycle.push(LifecycleEvent::InitializeConfig);
            // SAFETY: the mock config handle lives for the whole process.
            unsafe { init(mock::config::handle()) };
        }
        if let Some(init) = entry.initialize_plugin {
            lifecycle.push(LifecycleEvent::InitializePlugin);
            // SAFETY: plain integer argument.
            if !unsafe { init(config.host_version) } {
                return Err(ConformanceError::InitializationFailed);
            }
        }

        let registration = Self::register(&entry);
        lifecycle.push(LifecycleEvent::Register);
        let state = RegistrationState::Unregistered
            .register(registration.table_count(), registration.menus.len())
            .unwrap_or(RegistrationState::Unregistered);
        tracing::info!(
            plugin = %name,
            tables = registration.table_count(),
            menus = registration.menus.len(),
            "plugin registered"
        );
        Ok(Self {
            name,
            entry,
            lifecycle,
            state,
            required_version,
            registration,
        })
    }

    fn register(entry: &EntryPoints) -> RecordedRegistration {
        if let Some(register) = entry.register_plugin {
            return mock::app::record_registration(register);
        }
        let mut recorded = RecordedRegistration::default();
        if let Some(get) = entry.get_input_plugin_table {
            // SAFETY: no arguments.
            let table = unsafe { get() };
            recorded.inputs.extend((!table.is_null()).then_some(table));
        }
        if let Some(get) = entry.get_output_plugin_table {
            // SAFETY: no arguments.
            let table = unsafe { get() };
            recorded.outputs.extend((!table.is_null()).then_some(table));
        }
        if let Some(get) = entry.get_filter_plugin_table {
            // SAFETY: no arguments.
            let table = unsafe { get() };
            recorded.filters.extend((!table.is_null()).then_some(table));
        }
        if let Some(get) = entry.get_script_module_table {
            // SAFETY: no arguments.
            let table = unsafe { get() };
            recorded.scripts.extend((!table.is_null()).then_some(table));
        }
        recorded
    }

    /// Plugin name used in reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved exports.
    pub fn entry_points(&self) -> EntryPoints {
        self.entry
    }

    /// Hooks called so far.
    pub fn lifecycle(&self) -> &LifecycleLog {
        &self.lifecycle
    }

    /// Registration state.
    pub fn state(&self) -> RegistrationState {
        self.state
    }

    /// Value returned by `RequiredVersion`, if exported.
    pub fn required_version(&self) -> Option<u32> {
        self.required_version
    }

    /// What the plugin registered.
    pub fn registration(&self) -> &RecordedRegistration {
        &self.registration
    }

    /// Names of everything the plugin registered.
    pub fn summary(&self) -> RegistrationSummary {
        let text = |ptr: *const sys::WChar| {
            // SAFETY: registered strings live until unload.
            unsafe { aviutl2::wide::read_wide_string(ptr) }.unwrap_or_default()
        };
        RegistrationSummary {
            information: self.registration.information.clone(),
            required_version: self.required_version,
            inputs: self.inputs().iter().map(InputModule::name).collect(),
            outputs: self.outputs().iter().map(|t| text(t.name)).collect(),
            filters: self.filters().iter().map(|t| text(t.name)).collect(),
            scripts: self.scripts().iter().map(|t| text(t.information)).collect(),
            menus: self
                .registration
                .menus
                .iter()
                .map(|(name, entry)| (entry.kind, name.clone()))
                .collect(),
            windows: self.registration.windows.clone(),
            project_handlers: self.registration.load_handlers.len() + self.registration.save_handlers.len(),
        }
    }

    fn loaded(&self) -> bool {
        matches!(self.state, RegistrationState::Registered { .. })
    }

    /// Registered input modules.
    pub fn inputs(&self) -> Vec<InputModule> {
        if !self.loaded() {
            return Vec::new();
        }
        self.registration
            .inputs
            .iter()
            // SAFETY: registered tables stay valid until unload.
            .filter_map(|t| unsafe { t.as_ref() }.copied().map(InputModule))
            .collect()
    }

    /// Registered output tables.
    pub fn outputs(&self) -> Vec<sys::OutputPluginTable> {
        if !self.loaded() {
            return Vec::new();
        }
        self.registration
            .outputs
            .iter()
            // SAFETY: as for inputs.
            .filter_map(|t| unsafe { t.as_ref() }.copied())
            .collect()
    }

    /// Registered filter tables.
    pub fn filters(&self) -> Vec<sys::FilterPluginTable> {
        if !self.loaded() {
            return Vec::new();
        }
        self.registration
            .filters
            .iter()
            // SAFETY: as for inputs.
            .filter_map(|t| unsafe { t.as_ref() }.copied())
            .collect()
    }

    /// Registered script module tables.
    pub fn scripts(&self) -> Vec<sys::ScriptModuleTable> {
        if !self.loaded() {
            return Vec::new();
        }
        self.registration
            .scripts
            .iter()
            // SAFETY: as for inputs.
            .filter_map(|t| unsafe { t.as_ref() }.copied())
            .collect()
    }

    /// Run every project save handler. Returns how many ran.
    pub fn save_project(&self) -> usize {
        if !self.loaded() {
            return 0;
        }
        self.registration.save_handlers.iter().for_each(|h| mock::project::invoke(*h));
        self.registration.save_handlers.len()
    }

    /// Run every project load handler. Returns how many ran.
    pub fn load_project(&self) -> usize {
        if !self.loaded() {
            return 0;
        }
        self.registration.load_handlers.iter().for_each(|h| mock::project::invoke(*h));
        self.registration.load_handlers.len()
    }

    /// Call `UninitializePlugin`. Every table becomes invalid.
    pub fn finish(&mut self) -> RegistrationState {
        let Some(unloaded) = self.state.unload() else {
            return self.state;
        };
        if let Some(uninit) = self.entry.uninitialize_plugin {
            self.lifecycle.push(LifecycleEvent::Uninitialize);
            // SAFETY: no arguments; called once per session.
            unsafe { uninit() };
        }
        self.state = unloaded;
        tracing::debug!(plugin = %self.name, "plugin unloaded");
        self.state
    }
}

impl Drop for PluginSession {
    fn drop(&mut self) {
        self.finish();
    }
}

/// A registered input table.
#[derive(Debug, Clone, Copy)]
pub struct InputModule(pub sys::InputPluginTable);

// SAFETY: the table is immutable after registration and its strings live
// until unload. Whether its functions may run on several threads at once is
// governed by `CONCURRENT`, which callers check before sharing handles.
unsafe impl Send for InputModule {}
// SAFETY: see above.
unsafe impl Sync for InputModule {}

impl InputModule {
    /// Capability flags.
    pub fn flags(&self) -> InputPluginFlags {
        self.0.flags()
    }

    /// Plugin name.
    pub fn name(&self) -> String {
        // SAFETY: the name lives until unload.
        unsafe { aviutl2::wide::read_wide_string(self.0.name) }.unwrap_or_default()
    }

    /// Open `path`.
    ///
    /// # Errors
    ///
    /// Fails if the path is not representable or the plugin declines it.
    pub fn open(&self, path: &Path) -> Result<InputSession> {
        let open = self
            .0
            .func_open
            .ok_or_else(|| ConformanceError::Contract(format!("{} has no func_open", self.name())))?;
        let text = path.to_str().ok_or_else(|| ConformanceError::InvalidPath(path.to_path_buf()))?;
        let wide = WideString::new(text);
        // SAFETY: NUL-terminated path valid for the call.
        let handle = unsafe { open(wide.as_ptr()) };
        if handle.is_null() {
            return Err(ConformanceError::Contract(format!("func_open declined {}", path.display())));
        }
        Ok(InputSession {
            table: self.0,
            handle,
            tracks: TrackMonitor::default(),
            info: None,
            closed: false,
        })
    }
}

/// Guards `func_set_track`: per kind, at most one count query and one
/// selection, both before the first read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackMonitor {
    queries: [u32; 2],
    selections: [u32; 2],
    reads: usize,
}

impl TrackMonitor {
    fn slot(kind: i32) -> Option<usize> {
        match kind {
            track_type::VIDEO => Some(0),
            track_type::AUDIO => Some(1),
            _ => None,
        }
    }

    /// Record a `func_set_track(kind, index)` call, refusing contract breaks.
    ///
    /// # Errors
    ///
    /// Returns [`ConformanceError::Contract`] for an unknown kind, a repeated
    /// query or selection, or a call after the first read.
    pub fn record(&mut self, kind: i32, index: i32) -> Result<()> {
        let slot = Self::slot(kind).ok_or_else(|| ConformanceError::Contract(format!("unknown track kind {kind}")))?;
        if self.reads > 0 {
            return Err(ConformanceError::Contract(String::from(
                "func_set_track after the first read",
            )));
        }
        let counter = if index == TRACK_QUERY_COUNT {
            self.queries.get_mut(slot)
        } else {
            self.selections.get_mut(slot)
        };
        match counter {
            Some(count) if *count == 0 => {
                *count = 1;
                Ok(())
            }
            _ => Err(ConformanceError::Contract(format!(
                "func_set_track(kind={kind}, index={index}) repeated on one handle"
            ))),
        }
    }

    /// Record a read.
    pub fn read(&mut self) {
        self.reads += 1;
    }

    /// Selections so far for `kind`.
    pub fn selections(&self, kind: i32) -> u32 {
        Self::slot(kind)
            .and_then(|s| self.selections.get(s))
            .copied()
            .unwrap_or(0)
    }
}

/// Serializable view of a plugin's registrations.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RegistrationSummary {
    /// Text passed to `set_plugin_information`.
    pub information: Option<String>,
    /// Value of `RequiredVersion`, if exported.
    pub required_version: Option<u32>,
    /// Input plugin names.
    pub inputs: Vec<String>,
    /// Output plugin names.
    pub outputs: Vec<String>,
    /// Filter plugin names.
    pub filters: Vec<String>,
    /// Script module descriptions.
    pub scripts: Vec<String>,
    /// Menu entries by kind.
    pub menus: Vec<(mock::MenuKind, String)>,
    /// Window client names.
    pub windows: Vec<String>,
    /// Project load plus save handlers.
    pub project_handlers: usize,
}

/// Owned copy of what `func_info_get` reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputInfoSnapshot {
    /// Flag bits.
    pub flags: InputInfoFlags,
    /// Frame rate numerator.
    pub rate: i32,
    /// Frame rate denominator.
    pub scale: i32,
    /// Frames.
    pub frames: i32,
    /// Image format.
    pub format: Option<BitmapInfoHeader>,
    /// Audio samples.
    pub samples: i32,
    /// Audio format.
    pub audio_format: Option<WaveFormatEx>,
}

impl InputInfoSnapshot {
    /// Bytes in one decoded frame, 0 without video.
    pub fn frame_size(&self) -> usize {
        let Some(format) = self.format else {
            return 0;
        };
        if format.size_image > 0 {
            return usize::try_from(format.size_image).unwrap_or(0);
        }
        let width = usize::try_from(format.width).unwrap_or(0);
        let height = usize::try_from(format.height.unsigned_abs()).unwrap_or(0);
        let bits = usize::from(format.bit_count);
        if format.compression == video_format::BI_RGB {
            (width * bits).div_ceil(32) * 4 * height
        } else {
            width * height * bits / 8
        }
    }

    /// Bytes per audio sample frame, 0 without audio.
    pub fn block_align(&self) -> usize {
        self.audio_format.map_or(0, |f| usize::from({ f.block_align }))
    }
}

/// One open input handle. Closed on drop.
#[derive(Debug)]
pub struct InputSession {
    table: sys::InputPluginTable,
    handle: sys::InputHandle,
    tracks: TrackMonitor,
    info: Option<InputInfoSnapshot>,
    closed: bool,
}

// SAFETY: a handle may move between threads; the host never uses one handle
// from two threads at once, which `&mut self` on every call enforces.
unsafe impl Send for InputSession {}

impl InputSession {
    /// Address of the plugin's handle, for identity checks.
    pub fn handle_addr(&self) -> usize {
        self.handle.addr()
    }

    /// Track monitor of this handle.
    pub fn tracks(&self) -> TrackMonitor {
        self.tracks
    }

    /// Call `func_set_track`.
    ///
    /// # Errors
    ///
    /// Fails if the call would break the once-per-kind rule or the plugin
    /// is not multi-track.
    pub fn set_track(&mut self, kind: i32, index: i32) -> Result<i32> {
        let set = self
            .table
            .func_set_track
            .ok_or_else(|| ConformanceError::Contract(String::from("plugin has no func_set_track")))?;
        self.tracks.record(kind, index)?;
        self.info = None;
        // SAFETY: live handle; plain integers.
        Ok(unsafe { set(self.handle, kind, index) })
    }

    /// Call `func_info_get`.
    pub fn info(&mut self) -> Option<InputInfoSnapshot> {
        if let Some(info) = self.info {
            return Some(info);
        }
        let get = self.table.func_info_get?;
        let mut raw = sys::InputInfo::default();
        // SAFETY: live handle and writable struct.
        if !unsafe { get(self.handle, &raw mut raw) } {
            return None;
        }
        let format = (!raw.format.is_null()).then(|| {
            // SAFETY: the plugin keeps `format` valid until its next call on
            // this handle; copied immediately.
            unsafe { raw.format.read_unaligned() }
        });
        let audio_format = (!raw.audio_format.is_null()).then(|| {
            // SAFETY: as above; the struct is packed.
            unsafe { raw.audio_format.read_unaligned() }
        });
        let info = InputInfoSnapshot {
            flags: raw.flags(),
            rate: raw.rate,
            scale: raw.scale,
            frames: raw.n,
            format,
            samples: raw.audio_n,
            audio_format,
        };
        self.info = Some(info);
        Some(info)
    }

    /// Read one frame. `None` if the plugin wrote nothing.
    pub fn read_video(&mut self, frame: i32) -> Option<Vec<u8>> {
        let read = self.table.func_read_video?;
        let size = self.info()?.frame_size();
        self.tracks.read();
        let mut buf = vec![0u8; size];
        // SAFETY: `buf` holds one frame of the reported format.
        let written = unsafe { read(self.handle, frame, buf.as_mut_ptr().cast()) };
        let written = usize::try_from(written).ok().filter(|w| *w > 0)?;
        buf.truncate(written.min(size));
        Some(buf)
    }

    /// Read `length` sample frames from `start`. `None` if nothing was read.
    pub fn read_audio(&mut self, start: i32, length: i32) -> Option<Vec<u8>> {
        let read = self.table.func_read_audio?;
        let align = self.info()?.block_align();
        let frames = usize::try_from(length).ok()?;
        self.tracks.read();
        let mut buf = vec![0u8; frames * align];
        // SAFETY: `buf` holds `length` sample frames.
        let got = unsafe { read(self.handle, start, length, buf.as_mut_ptr().cast()) };
        let got = usize::try_from(got).ok().filter(|g| *g > 0)?;
        buf.truncate(got.min(frames) * align);
        Some(buf)
    }

    /// Call `func_time_to_frame`, if supported.
    pub fn time_to_frame(&mut self, seconds: f64) -> Option<i32> {
        let f = self.table.func_time_to_frame?;
        // SAFETY: live handle.
        Some(unsafe { f(self.handle, seconds) })
    }

    /// Close the handle. Returns the plugin's result.
    pub fn close(mut self) -> bool {
        self.close_inner()
    }

    fn close_inner(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        match self.table.func_close {
            // SAFETY: closed exactly once.
            Some(close) => unsafe { close(self.handle) },
            None => false,
        }
    }
}

impl Drop for InputSession {
    fn drop(&mut self) {
        if !self.closed {
            self.close_inner();
        }
    }
}

/// Whether `flags` allow concurrent reads.
pub fn is_concurrent(flags: InputPluginFlags) -> bool {
    flags.contains(InputPluginFlags::CONCURRENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_monitor() {
        let mut monitor = TrackMonitor::default();
        assert!(matches!(monitor.record(track_type::VIDEO, TRACK_QUERY_COUNT), Ok(())));
        assert!(matches!(monitor.record(track_type::VIDEO, 1), Ok(())));
        assert!(matches!(monitor.record(track_type::VIDEO, 0), Err(ConformanceError::Contract(_))));
        assert!(matches!(monitor.record(track_type::AUDIO, 0), Ok(())));
        assert!(matches!(monitor.record(7, 0), Err(_)));
        assert_eq!(monitor.selections(track_type::VIDEO), 1);
    }

    #[test]
    fn test_no_selection_after_read() {
        let mut monitor = TrackMonitor::default();
        monitor.read();
        assert!(matches!(monitor.record(track_type::AUDIO, 0), Err(_)));
    }

    #[test]
    fn test_frame_size() {
        let info = InputInfoSnapshot {
            flags: InputInfoFlags::VIDEO,
            rate: 30,
            scale: 1,
            frames: 1,
            format: Some(BitmapInfoHeader {
                width: 3,
                height: 2,
                bit_count: 24,
                compression: video_format::BI_RGB,
                ..BitmapInfoHeader::default()
            }),
            samples: 0,
            audio_format: None,
        };
        assert_eq!(info.frame_size(), 24);
        assert_eq!(info.block_align(), 0);
    }

    #[test]
    fn test_start_without_module_fails() {
        let result = PluginSession::start("empty", EntryPoints::default(), &ConformanceConfig::quick());
        assert!(matches!(result, Err(ConformanceError::NoEntryPoint { .. })));
    }
}
