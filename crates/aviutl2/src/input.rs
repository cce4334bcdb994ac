//! Input plugins.
//!
//! The host opens a file through `func_open`, then calls the remaining
//! functions with the returned handle until `func_close`. The bridge boxes
//! each [`InputPlugin::Handle`] together with its own lock, so reads on
//! distinct handles run in parallel while calls sharing a handle are
//! serialized.

use std::ffi::c_void;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use aviutl2_sys::{
    self as sys, BitmapInfoHeader, InputInfoFlags, InputPluginFlags, WaveFormatEx, audio_format,
    input::{TRACK_QUERY_COUNT, track_type},
    video_format,
};

use crate::error::{AnyResult, Aviutl2Error, Result};
use crate::plugin::{self, FileFilter, HostInfo, RawBox, report, to_i32, to_usize};
use crate::wide::{WideString, read_wide_string};

/// Track kind for multi-track files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    /// Video track.
    Video,
    /// Audio track.
    Audio,
}

impl TrackKind {
    /// Decode the raw `type` argument of `func_set_track`.
    #[must_use]
    pub fn from_raw(kind: i32) -> Option<Self> {
        match kind {
            track_type::VIDEO => Some(Self::Video),
            track_type::AUDIO => Some(Self::Audio),
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Video => 0,
            Self::Audio => 1,
        }
    }
}

/// Sample encoding of input audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    /// Signed 16-bit integer samples.
    Pcm16,
    /// 32-bit float samples.
    Float32,
}

impl AudioFormat {
    /// `WAVEFORMATEX::wFormatTag` value.
    #[must_use]
    pub fn format_tag(self) -> u16 {
        match self {
            Self::Pcm16 => audio_format::PCM,
            Self::Float32 => audio_format::IEEE_FLOAT,
        }
    }

    /// Bytes per single-channel sample.
    #[must_use]
    pub fn bytes_per_sample(self) -> u16 {
        match self {
            Self::Pcm16 => 2,
            Self::Float32 => 4,
        }
    }
}

/// Video stream description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoInputInfo {
    /// Frame width.
    pub width: i32,
    /// Frame height.
    pub height: i32,
    /// Frame rate numerator.
    pub rate: i32,
    /// Frame rate denominator.
    pub scale: i32,
    /// Number of frames.
    pub frames: i32,
    /// Bits per pixel.
    pub bit_count: u16,
    /// `BI_RGB` or a FOURCC from [`aviutl2_sys::video_format`].
    pub format: u32,
}

impl VideoInputInfo {
    /// Bytes in one frame. `BI_RGB` rows are padded to 4 bytes.
    #[must_use]
    pub fn frame_size(&self) -> usize {
        let width = to_usize(self.width);
        let height = to_usize(self.height.saturating_abs());
        let bits = usize::from(self.bit_count);
        if self.format == video_format::BI_RGB {
            (width * bits).div_ceil(32) * 4 * height
        } else {
            width * height * bits / 8
        }
    }

    fn bitmap_header(&self) -> BitmapInfoHeader {
        BitmapInfoHeader {
            size: 40,
            width: self.width,
            height: self.height,
            planes: 1,
            bit_count: self.bit_count,
            compression: self.format,
            size_image: u32::try_from(self.frame_size()).unwrap_or(0),
            ..BitmapInfoHeader::default()
        }
    }
}

/// Audio stream description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInputInfo {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Total samples per channel.
    pub samples: i32,
    /// Sample encoding.
    pub format: AudioFormat,
}

impl AudioInputInfo {
    /// Bytes per sample frame across all channels.
    #[must_use]
    pub fn block_align(&self) -> usize {
        usize::from(self.channels) * usize::from(self.format.bytes_per_sample())
    }

    fn wave_format(&self) -> WaveFormatEx {
        let block_align = self.channels.saturating_mul(self.format.bytes_per_sample());
        WaveFormatEx {
            format_tag: self.format.format_tag(),
            channels: self.channels,
            samples_per_sec: self.sample_rate,
            avg_bytes_per_sec: self.sample_rate.saturating_mul(u32::from(block_align)),
            block_align,
            bits_per_sample: self.format.bytes_per_sample() * 8,
            cb_size: 0,
        }
    }
}

/// File description returned by [`InputPlugin::info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputInfo {
    /// Video stream, if any.
    pub video: Option<VideoInputInfo>,
    /// Audio stream, if any.
    pub audio: Option<AudioInputInfo>,
    /// Frame numbers come from [`InputPlugin::time_to_frame`].
    pub time_to_frame: bool,
}

/// Input plugin description.
#[derive(Debug, Clone)]
pub struct InputPluginTable {
    /// Plugin name.
    pub name: String,
    /// Open dialog filters.
    pub file_filters: Vec<FileFilter>,
    /// Plugin information.
    pub information: String,
    /// Capabilities.
    pub flags: InputPluginFlags,
    /// Wire `func_time_to_frame`.
    pub time_to_frame: bool,
}

/// A media file reader.
pub trait InputPlugin: Send + Sync + Sized + 'static {
    /// Per-file state.
    type Handle: Send + 'static;

    /// Create the plugin.
    fn new(info: HostInfo) -> AnyResult<Self>;

    /// Describe the plugin.
    fn plugin_table(&self) -> InputPluginTable;

    /// Open `path`. Failing here is normal for files of other formats.
    fn open(&self, path: &Path) -> AnyResult<Self::Handle>;

    /// Close a handle.
    fn close(&self, handle: Self::Handle) -> AnyResult<()> {
        drop(handle);
        Ok(())
    }

    /// Describe the open file.
    fn info(&self, handle: &mut Self::Handle) -> AnyResult<InputInfo>;

    /// Decode `frame` into `buf` (sized by [`VideoInputInfo::frame_size`]).
    /// Returns the number of bytes written.
    fn read_video(&self, _handle: &mut Self::Handle, _frame: usize, _buf: &mut [u8]) -> AnyResult<usize> {
        Err(Aviutl2Error::Unsupported("read_video").into())
    }

    /// Decode `length` samples from `start` into `buf` (sized by
    /// `length * block_align`). Returns the number of samples written.
    fn read_audio(
        &self,
        _handle: &mut Self::Handle,
        _start: usize,
        _length: usize,
        _buf: &mut [u8],
    ) -> AnyResult<usize> {
        Err(Aviutl2Error::Unsupported("read_audio").into())
    }

    /// Number of tracks of `kind`.
    fn track_count(&self, _handle: &mut Self::Handle, _kind: TrackKind) -> AnyResult<usize> {
        Ok(1)
    }

    /// Select a track; returns the selected index.
    fn select_track(
        &self,
        _handle: &mut Self::Handle,
        _kind: TrackKind,
        index: usize,
    ) -> AnyResult<usize> {
        Ok(index)
    }

    /// Map media time in seconds to a frame number.
    fn time_to_frame(&self, _handle: &mut Self::Handle, _seconds: f64) -> AnyResult<usize> {
        Err(Aviutl2Error::Unsupported("time_to_frame").into())
    }

    /// Whether [`InputPlugin::config`] shows a dialog.
    fn has_config(&self) -> bool {
        false
    }

    /// Show the configuration dialog.
    fn config(&self, _hwnd: sys::Hwnd) -> AnyResult<()> {
        Ok(())
    }
}

struct HandleSlot<H> {
    handle: H,
    info: Option<InputInfo>,
    format: Box<BitmapInfoHeader>,
    audio_format: Box<WaveFormatEx>,
    selections: [u32; 2],
}

struct HandleCell<H> {
    slot: Mutex<HandleSlot<H>>,
}

impl<H> HandleCell<H> {
    /// # Safety
    ///
    /// `ih` must be NULL or a handle returned by `open` and not yet closed.
    unsafe fn from_raw<'a>(ih: sys::InputHandle) -> Option<&'a Self> {
        // SAFETY: forwarded caller contract.
        unsafe { ih.cast::<Self>().as_ref() }
    }
}

impl<H> HandleSlot<H> {
    fn ensure_info<I: InputPlugin<Handle = H>>(&mut self, plugin: &I) -> AnyResult<InputInfo> {
        if let Some(info) = self.info {
            return Ok(info);
        }
        let info = plugin.info(&mut self.handle)?;
        self.info = Some(info);
        Ok(info)
    }
}

struct InputState<I> {
    plugin: I,
    table: RawBox<sys::InputPluginTable>,
    _strings: Vec<WideString>,
}

/// Create `I`, lay out its table and store it for the trampolines.
pub(crate) fn install<I: InputPlugin>(info: HostInfo) -> Result<*mut sys::InputPluginTable> {
    let plugin = I::new(info).map_err(|e| Aviutl2Error::Plugin(e.to_string()))?;
    let desc = plugin.plugin_table();
    let name = WideString::new(&desc.name);
    let filter = FileFilter::encode(&desc.file_filters);
    let information = WideString::new(&desc.information);
    let table = RawBox::new(sys::InputPluginTable {
        flag: desc.flags.bits(),
        name: name.as_ptr(),
        filefilter: filter.as_ptr(),
        information: information.as_ptr(),
        func_open: Some(open::<I>),
        func_close: Some(close::<I>),
        func_info_get: Some(info_get::<I>),
        func_read_video: desc
            .flags
            .contains(InputPluginFlags::VIDEO)
            .then_some(read_video::<I> as unsafe extern "C" fn(_, _, _) -> _),
        func_read_audio: desc
            .flags
            .contains(InputPluginFlags::AUDIO)
            .then_some(read_audio::<I> as unsafe extern "C" fn(_, _, _, _) -> _),
        func_config: plugin
            .has_config()
            .then_some(config::<I> as unsafe extern "C" fn(_, _) -> _),
        func_set_track: desc
            .flags
            .contains(InputPluginFlags::MULTI_TRACK)
            .then_some(set_track::<I> as unsafe extern "C" fn(_, _, _) -> _),
        func_time_to_frame: desc
            .time_to_frame
            .then_some(time_to_frame::<I> as unsafe extern "C" fn(_, _) -> _),
    });
    let ptr = table.as_ptr();
    plugin::install(InputState {
        plugin,
        table,
        _strings: vec![name, filter, information],
    })?;
    tracing::info!(input = %desc.name, flags = desc.flags.bits(), "input plugin ready");
    Ok(ptr)
}

/// Run `f` with the installed instance of `I`.
///
/// # Errors
///
/// Returns [`Aviutl2Error::NotInitialized`] if `I` is not installed.
pub fn with_instance<I: InputPlugin, R>(f: impl FnOnce(&I) -> R) -> Result<R> {
    let state = plugin::state::<InputState<I>>()?;
    Ok(f(&state.plugin))
}

fn with_slot<I: InputPlugin, R: Copy>(
    callback: &'static str,
    ih: sys::InputHandle,
    fallback: R,
    f: impl FnOnce(&I, &mut HandleSlot<I::Handle>) -> AnyResult<R>,
) -> R {
    plugin::guard(callback, fallback, || {
        let state = match plugin::state::<InputState<I>>() {
            Ok(state) => state,
            Err(e) => {
                report(callback, &e);
                return fallback;
            }
        };
        // SAFETY: the host only passes handles returned by `open` that are
        // not yet closed.
        let Some(cell) = (unsafe { HandleCell::<I::Handle>::from_raw(ih) }) else {
            return fallback;
        };
        let mut slot = cell.slot.lock();
        match f(&state.plugin, &mut slot) {
            Ok(value) => value,
            Err(e) => {
                report(callback, &e);
                fallback
            }
        }
    })
}

unsafe extern "C" fn open<I: InputPlugin>(file: *const u16) -> sys::InputHandle {
    plugin::guard("func_open", std::ptr::null_mut(), || {
        let Ok(state) = plugin::state::<InputState<I>>() else {
            return std::ptr::null_mut();
        };
        // SAFETY: the host passes a NUL-terminated path valid for the call.
        let Some(path) = (unsafe { read_wide_string(file) }) else {
            return std::ptr::null_mut();
        };
        let path = PathBuf::from(path);
        match state.plugin.open(&path) {
            Ok(handle) => {
                let cell = Box::new(HandleCell {
                    slot: Mutex::new(HandleSlot {
                        handle,
                        info: None,
                        format: Box::default(),
                        audio_format: Box::default(),
                        selections: [0; 2],
                    }),
                });
                tracing::debug!(path = %path.display(), "input opened");
                Box::into_raw(cell).cast::<c_void>()
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "input open declined");
                std::ptr::null_mut()
            }
        }
    })
}

unsafe extern "C" fn close<I: InputPlugin>(ih: sys::InputHandle) -> bool {
    plugin::guard("func_close", false, || {
        if ih.is_null() {
            return false;
        }
        // SAFETY: `ih` came from `Box::into_raw` in `open` and the host closes
        // each handle exactly once.
        let cell = unsafe { Box::from_raw(ih.cast::<HandleCell<I::Handle>>()) };
        let slot = cell.slot.into_inner();
        let Ok(state) = plugin::state::<InputState<I>>() else {
            return false;
        };
        match state.plugin.close(slot.handle) {
            Ok(()) => true,
            Err(e) => {
                report("func_close", &e);
                false
            }
        }
    })
}

unsafe extern "C" fn info_get<I: InputPlugin>(ih: sys::InputHandle, iip: *mut sys::InputInfo) -> bool {
    if iip.is_null() {
        return false;
    }
    with_slot::<I, _>("func_info_get", ih, false, |plugin, slot| {
        let info = plugin.info(&mut slot.handle)?;
        slot.info = Some(info);
        let mut raw = sys::InputInfo::default();
        let mut flags = InputInfoFlags::empty();
        if let Some(video) = info.video {
            flags |= InputInfoFlags::VIDEO;
            *slot.format = video.bitmap_header();
            raw.rate = video.rate;
            raw.scale = video.scale;
            raw.n = video.frames;
            raw.format = &raw mut *slot.format;
            raw.format_size = to_i32(std::mem::size_of::<BitmapInfoHeader>());
        }
        if let Some(audio) = info.audio {
            flags |= InputInfoFlags::AUDIO;
            *slot.audio_format = audio.wave_format();
            raw.audio_n = audio.samples;
            raw.audio_format = &raw mut *slot.audio_format;
            raw.audio_format_size = to_i32(std::mem::size_of::<WaveFormatEx>());
        }
        if info.time_to_frame {
            flags |= InputInfoFlags::TIME_TO_FRAME;
        }
        raw.flag = flags.bits();
        // SAFETY: the host passes a writable info struct.
        unsafe { iip.write(raw) };
        Ok(true)
    })
}

unsafe extern "C" fn read_video<I: InputPlugin>(ih: sys::InputHandle, frame: i32, buf: *mut c_void) -> i32 {
    with_slot::<I, _>("func_read_video", ih, 0, |plugin, slot| {
        let info = slot.ensure_info(plugin)?;
        let (Some(video), Ok(frame)) = (info.video, usize::try_from(frame)) else {
            return Ok(0);
        };
        if buf.is_null() {
            return Ok(0);
        }
        let size = video.frame_size();
        // SAFETY: the host allocates at least one frame of the reported
        // format.
        let out = unsafe { std::slice::from_raw_parts_mut(buf.cast::<u8>(), size) };
        let written = plugin.read_video(&mut slot.handle, frame, out)?;
        Ok(to_i32(written.min(size)))
    })
}

unsafe extern "C" fn read_audio<I: InputPlugin>(
    ih: sys::InputHandle,
    start: i32,
    length: i32,
    buf: *mut c_void,
) -> i32 {
    with_slot::<I, _>("func_read_audio", ih, 0, |plugin, slot| {
        let info = slot.ensure_info(plugin)?;
        let (Some(audio), Ok(start), Ok(length)) =
            (info.audio, usize::try_from(start), usize::try_from(length))
        else {
            return Ok(0);
        };
        if buf.is_null() || length == 0 {
            return Ok(0);
        }
        // SAFETY: the host allocates `length` sample frames.
        let out = unsafe {
            std::slice::from_raw_parts_mut(buf.cast::<u8>(), length * audio.block_align())
        };
        let read = plugin.read_audio(&mut slot.handle, start, length, out)?;
        Ok(to_i32(read.min(length)))
    })
}

unsafe extern "C" fn set_track<I: InputPlugin>(ih: sys::InputHandle, kind: i32, index: i32) -> i32 {
    with_slot::<I, _>("func_set_track", ih, -1, |plugin, slot| {
        let Some(kind) = TrackKind::from_raw(kind) else {
            return Ok(-1);
        };
        if index == TRACK_QUERY_COUNT {
            return Ok(to_i32(plugin.track_count(&mut slot.handle, kind)?));
        }
        let Ok(index) = usize::try_from(index) else {
            return Ok(-1);
        };
        if let Some(count) = slot.selections.get_mut(kind.index()) {
            *count += 1;
            if *count > 1 {
                tracing::warn!(?kind, selections = *count, "track selected more than once on one handle");
            }
        }
        slot.info = None;
        Ok(to_i32(plugin.select_track(&mut slot.handle, kind, index)?))
    })
}

unsafe extern "C" fn time_to_frame<I: InputPlugin>(ih: sys::InputHandle, time: f64) -> i32 {
    with_slot::<I, _>("func_time_to_frame", ih, 0, |plugin, slot| {
        Ok(to_i32(plugin.time_to_frame(&mut slot.handle, time)?))
    })
}

unsafe extern "C" fn config<I: InputPlugin>(hwnd: sys::Hwnd, _dll_hinst: sys::Hinstance) -> bool {
    plugin::guard("func_config", false, || {
        let Ok(state) = plugin::state::<InputState<I>>() else {
            return false;
        };
        match state.plugin.config(hwnd) {
            Ok(()) => true,
            Err(e) => {
                report("func_config", &e);
                false
            }
        }
    })
}

#[doc(hidden)]
pub fn __initialize<I: InputPlugin>(version: u32) -> bool {
    plugin::guard("InitializePlugin", false, || {
        plugin::clear();
        match install::<I>(HostInfo::new(version)) {
            Ok(_) => true,
            Err(e) => {
                report("InitializePlugin", &e);
                false
            }
        }
    })
}

#[doc(hidden)]
pub fn __table<I: InputPlugin>() -> *mut sys::InputPluginTable {
    plugin::state::<InputState<I>>().map_or(std::ptr::null_mut(), |state| state.table.as_ptr())
}
