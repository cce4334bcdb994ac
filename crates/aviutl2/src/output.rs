//! Output plugins.
//!
//! Inside `func_output` the plugin pulls frames and samples from the host and
//! polls for abort between frames. [`OutputSession`] wraps that pull API so
//! that each video frame borrow ends at the next pull.

use std::path::PathBuf;

use parking_lot::Mutex;

use aviutl2_sys::{self as sys, OutputInfoFlags, OutputPluginFlags, audio_format, video_format};

use crate::error::{AnyResult, Aviutl2Error, Result};
use crate::plugin::{self, FileFilter, HostInfo, RawBox, report, to_i32, to_usize};
use crate::wide::{WideString, read_wide_string};

/// Pixel format requested from `func_get_video`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoFormat {
    /// 24-bit bottom-up DIB, rows padded to 4 bytes.
    Rgb24,
    /// 16-bit unorm RGBA, premultiplied alpha.
    Pa64,
    /// 16-bit float RGBA, premultiplied alpha.
    Hf64,
    /// Packed YUV 4:2:2.
    Yuy2,
    /// Legacy YC48.
    Yc48,
}

impl VideoFormat {
    /// Every format, in tag order.
    pub const ALL: [Self; 5] = [Self::Rgb24, Self::Pa64, Self::Hf64, Self::Yuy2, Self::Yc48];

    /// Format for a host tag, if known.
    #[must_use]
    pub fn from_fourcc(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|format| format.fourcc() == tag)
    }

    /// Format tag passed to the host.
    #[must_use]
    pub fn fourcc(self) -> u32 {
        match self {
            Self::Rgb24 => video_format::BI_RGB,
            Self::Pa64 => video_format::PA64,
            Self::Hf64 => video_format::HF64,
            Self::Yuy2 => video_format::YUY2,
            Self::Yc48 => video_format::YC48,
        }
    }

    /// Bits per pixel.
    #[must_use]
    pub fn bits_per_pixel(self) -> usize {
        match self {
            Self::Rgb24 => 24,
            Self::Pa64 | Self::Hf64 => 64,
            Self::Yuy2 => 16,
            Self::Yc48 => 48,
        }
    }

    /// Size of one frame in bytes.
    #[must_use]
    pub fn frame_size(self, width: usize, height: usize) -> usize {
        match self {
            Self::Rgb24 => (width * 24).div_ceil(32) * 4 * height,
            _ => width * height * self.bits_per_pixel() / 8,
        }
    }
}

/// Video side of an output job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoOutputInfo {
    /// Image width.
    pub width: usize,
    /// Image height.
    pub height: usize,
    /// Frame rate numerator.
    pub rate: i32,
    /// Frame rate denominator.
    pub scale: i32,
    /// Number of frames.
    pub frames: usize,
}

/// Audio side of an output job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioOutputInfo {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: usize,
    /// Total samples per channel.
    pub samples: usize,
}

/// One output job, valid for the duration of [`OutputPlugin::output`].
#[derive(Debug)]
pub struct OutputSession<'a> {
    raw: &'a sys::OutputInfo,
}

impl<'a> OutputSession<'a> {
    /// Wrap the host's output description.
    ///
    /// # Safety
    ///
    /// `raw` must be the pointer the host passed to the current `func_output`
    /// call, and the session must not outlive that call.
    #[must_use]
    pub unsafe fn from_raw(raw: *mut sys::OutputInfo) -> Option<Self> {
        // SAFETY: non-null pointers are valid per the caller contract.
        unsafe { raw.as_ref() }.map(|raw| Self { raw })
    }

    /// Video parameters, if video is to be written.
    #[must_use]
    pub fn video(&self) -> Option<VideoOutputInfo> {
        self.raw.flags().contains(OutputInfoFlags::VIDEO).then(|| VideoOutputInfo {
            width: to_usize(self.raw.w),
            height: to_usize(self.raw.h),
            rate: self.raw.rate,
            scale: self.raw.scale,
            frames: to_usize(self.raw.n),
        })
    }

    /// Audio parameters, if audio is to be written.
    #[must_use]
    pub fn audio(&self) -> Option<AudioOutputInfo> {
        self.raw.flags().contains(OutputInfoFlags::AUDIO).then(|| AudioOutputInfo {
            sample_rate: u32::try_from(self.raw.audio_rate).unwrap_or(0),
            channels: to_usize(self.raw.audio_ch),
            samples: to_usize(self.raw.audio_n),
        })
    }

    /// Destination path.
    #[must_use]
    pub fn save_path(&self) -> PathBuf {
        // SAFETY: the host keeps `savefile` valid for the call.
        PathBuf::from(unsafe { read_wide_string(self.raw.savefile) }.unwrap_or_default())
    }

    /// Pull one frame. The slice is valid until the next pull, which the
    /// `&mut self` borrow enforces.
    #[must_use]
    pub fn video_frame(&mut self, frame: usize, format: VideoFormat) -> Option<&[u8]> {
        let get = self.raw.func_get_video?;
        let frame = i32::try_from(frame).ok()?;
        // SAFETY: the host returns a buffer of one frame in `format`, valid
        // until the next pull.
        let data = unsafe { get(frame, format.fourcc()) };
        if data.is_null() {
            return None;
        }
        let size = format.frame_size(to_usize(self.raw.w), to_usize(self.raw.h));
        // SAFETY: see above.
        Some(unsafe { std::slice::from_raw_parts(data.cast::<u8>(), size) })
    }

    fn pull_audio<T: Copy>(&mut self, start: usize, length: usize, tag: u16) -> Option<Vec<T>> {
        let get = self.raw.func_get_audio?;
        let start = i32::try_from(start).ok()?;
        let length = i32::try_from(length).ok()?;
        let mut read = 0i32;
        // SAFETY: `read` is a valid out-pointer; the buffer holds `read`
        // interleaved sample frames until the next pull.
        let data = unsafe { get(start, length, &raw mut read, u32::from(tag)) };
        if data.is_null() {
            return None;
        }
        let count = to_usize(read.min(length)) * to_usize(self.raw.audio_ch);
        // SAFETY: see above; copied out immediately.
        Some(unsafe { std::slice::from_raw_parts(data.cast::<T>(), count) }.to_vec())
    }

    /// Pull interleaved 16-bit samples.
    #[must_use]
    pub fn audio_pcm16(&mut self, start: usize, length: usize) -> Option<Vec<i16>> {
        self.pull_audio(start, length, audio_format::PCM)
    }

    /// Pull interleaved float samples.
    #[must_use]
    pub fn audio_f32(&mut self, start: usize, length: usize) -> Option<Vec<f32>> {
        self.pull_audio(start, length, audio_format::IEEE_FLOAT)
    }

    /// Whether the user asked to abort.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        // SAFETY: no arguments.
        self.raw.func_is_abort.is_some_and(|f| unsafe { f() })
    }

    /// Update the remaining-time display.
    pub fn rest_time(&self, now: usize, total: usize) {
        if let Some(f) = self.raw.func_rest_time_disp {
            // SAFETY: plain integers.
            unsafe { f(to_i32(now), to_i32(total)) };
        }
    }

    /// Advisory prefetch depth in frames.
    pub fn set_buffer_size(&self, video: usize, audio: usize) {
        if let Some(f) = self.raw.func_set_buffer_size {
            // SAFETY: plain integers.
            unsafe { f(to_i32(video), to_i32(audio)) };
        }
    }

    /// Frame numbers `0..n`, stopping as soon as abort is requested. Abort
    /// is polled once per frame.
    #[must_use]
    pub fn frames(&self) -> Frames {
        Frames {
            next: 0,
            total: to_usize(self.raw.n),
            is_abort: self.raw.func_is_abort,
            aborted: false,
        }
    }
}

/// Iterator returned by [`OutputSession::frames`].
#[derive(Debug)]
pub struct Frames {
    next: usize,
    total: usize,
    is_abort: Option<unsafe extern "C" fn() -> bool>,
    aborted: bool,
}

impl Frames {
    /// Whether iteration stopped because of an abort request.
    #[must_use]
    pub fn aborted(&self) -> bool {
        self.aborted
    }
}

impl Iterator for Frames {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.aborted || self.next >= self.total {
            return None;
        }
        // SAFETY: no arguments; valid for the output call.
        if self.is_abort.is_some_and(|f| unsafe { f() }) {
            self.aborted = true;
            return None;
        }
        let frame = self.next;
        self.next += 1;
        Some(frame)
    }
}

/// Output plugin description.
#[derive(Debug, Clone)]
pub struct OutputPluginTable {
    /// Plugin name.
    pub name: String,
    /// Save dialog filters.
    pub file_filters: Vec<FileFilter>,
    /// Plugin information.
    pub information: String,
    /// Capabilities.
    pub flags: OutputPluginFlags,
}

/// A file writer.
pub trait OutputPlugin: Send + Sync + Sized + 'static {
    /// Create the plugin.
    fn new(info: HostInfo) -> AnyResult<Self>;

    /// Describe the plugin.
    fn plugin_table(&self) -> OutputPluginTable;

    /// Run one output job.
    fn output(&self, session: &mut OutputSession<'_>) -> AnyResult<()>;

    /// Whether [`OutputPlugin::config`] shows a dialog.
    fn has_config(&self) -> bool {
        false
    }

    /// Show the configuration dialog.
    fn config(&self, _hwnd: sys::Hwnd) -> AnyResult<()> {
        Ok(())
    }

    /// One-line description of the current configuration.
    fn config_text(&self) -> Option<String> {
        None
    }
}

struct OutputState<O> {
    plugin: O,
    table: RawBox<sys::OutputPluginTable>,
    config_text: Mutex<WideString>,
    _strings: Vec<WideString>,
}

/// Create `O`, lay out its table and store it for the trampolines.
pub(crate) fn install<O: OutputPlugin>(info: HostInfo) -> Result<*mut sys::OutputPluginTable> {
    let plugin = O::new(info).map_err(|e| Aviutl2Error::Plugin(e.to_string()))?;
    let desc = plugin.plugin_table();
    let name = WideString::new(&desc.name);
    let filter = FileFilter::encode(&desc.file_filters);
    let information = WideString::new(&desc.information);
    let table = RawBox::new(sys::OutputPluginTable {
        flag: desc.flags.bits(),
        name: name.as_ptr(),
        filefilter: filter.as_ptr(),
        information: information.as_ptr(),
        func_output: Some(output::<O>),
        func_config: plugin
            .has_config()
            .then_some(config::<O> as unsafe extern "C" fn(_, _) -> _),
        func_get_config_text: Some(config_text::<O>),
    });
    let ptr = table.as_ptr();
    plugin::install(OutputState {
        plugin,
        table,
        config_text: Mutex::new(WideString::default()),
        _strings: vec![name, filter, information],
    })?;
    tracing::info!(output = %desc.name, "output plugin ready");
    Ok(ptr)
}

/// Run `f` with the installed instance of `O`.
///
/// # Errors
///
/// Returns [`Aviutl2Error::NotInitialized`] if `O` is not installed.
pub fn with_instance<O: OutputPlugin, R>(f: impl FnOnce(&O) -> R) -> Result<R> {
    let state = plugin::state::<OutputState<O>>()?;
    Ok(f(&state.plugin))
}

unsafe extern "C" fn output<O: OutputPlugin>(oip: *mut sys::OutputInfo) -> bool {
    plugin::guard("func_output", false, || {
        let state = match plugin::state::<OutputState<O>>() {
            Ok(state) => state,
            Err(e) => {
                report("func_output", &e);
                return false;
            }
        };
        // SAFETY: the host passes a description valid for this call.
        let Some(mut session) = (unsafe { OutputSession::from_raw(oip) }) else {
            return false;
        };
        let path = session.save_path();
        tracing::info!(path = %path.display(), "output started");
        match state.plugin.output(&mut session) {
            Ok(()) => {
                tracing::info!(path = %path.display(), aborted = session.is_abort(), "output finished");
                true
            }
            Err(e) => {
                report("func_output", &e);
                false
            }
        }
    })
}

unsafe extern "C" fn config<O: OutputPlugin>(hwnd: sys::Hwnd, _dll_hinst: sys::Hinstance) -> bool {
    plugin::guard("func_config", false, || {
        let Ok(state) = plugin::state::<OutputState<O>>() else {
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

unsafe extern "C" fn config_text<O: OutputPlugin>() -> *const u16 {
    plugin::guard("func_get_config_text", std::ptr::null(), || {
        let Ok(state) = plugin::state::<OutputState<O>>() else {
            return std::ptr::null();
        };
        let Some(text) = state.plugin.config_text() else {
            return std::ptr::null();
        };
        let mut slot = state.config_text.lock();
        *slot = WideString::new(&text);
        slot.as_ptr()
    })
}

#[doc(hidden)]
pub fn __initialize<O: OutputPlugin>(version: u32) -> bool {
    plugin::guard("InitializePlugin", false, || {
        plugin::clear();
        match install::<O>(HostInfo::new(version)) {
            Ok(_) => true,
            Err(e) => {
                report("InitializePlugin", &e);
                false
            }
        }
    })
}

#[doc(hidden)]
pub fn __table<O: OutputPlugin>() -> *mut sys::OutputPluginTable {
    plugin::state::<OutputState<O>>().map_or(std::ptr::null_mut(), |state| state.table.as_ptr())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        static POLLS: Cell<u32> = const { Cell::new(0) };
    }

    unsafe extern "C" fn abort_after_three() -> bool {
        POLLS.with(|p| {
            p.set(p.get() + 1);
            p.get() > 3
        })
    }

    fn info(n: i32) -> sys::OutputInfo {
        sys::OutputInfo {
            flag: OutputInfoFlags::VIDEO.bits(),
            w: 4,
            h: 2,
            rate: 30,
            scale: 1,
            n,
            audio_rate: 0,
            audio_ch: 0,
            audio_n: 0,
            savefile: std::ptr::null(),
            func_get_video: None,
            func_get_audio: None,
            func_is_abort: Some(abort_after_three),
            func_rest_time_disp: None,
            func_set_buffer_size: None,
        }
    }

    #[test]
    fn test_frames_stop_on_abort() {
        POLLS.with(|p| p.set(0));
        let mut raw = info(10);
        // SAFETY: `raw` outlives the session.
        let Some(session) = (unsafe { OutputSession::from_raw(&mut raw) }) else {
            return;
        };
        let mut frames = session.frames();
        let seen: Vec<usize> = frames.by_ref().collect();
        assert_eq!(seen, vec![0, 1, 2]);
        assert!(frames.aborted());
        POLLS.with(|p| assert_eq!(p.get(), 4));
    }

    #[test]
    fn test_session_video_info() {
        let mut raw = info(5);
        // SAFETY: `raw` outlives the session.
        let Some(session) = (unsafe { OutputSession::from_raw(&mut raw) }) else {
            return;
        };
        let video = session.video();
        assert_eq!(video.map(|v| (v.width, v.height, v.frames)), Some((4, 2, 5)));
        assert!(session.audio().is_none());
        assert_eq!(session.save_path(), PathBuf::new());
    }

    #[test]
    fn test_frame_sizes() {
        assert_eq!(VideoFormat::Rgb24.frame_size(3, 2), 24);
        assert_eq!(VideoFormat::Pa64.frame_size(3, 2), 48);
        assert_eq!(VideoFormat::Yuy2.frame_size(4, 2), 16);
        assert_eq!(VideoFormat::Yc48.fourcc(), video_format::YC48);
        assert_eq!(VideoFormat::from_fourcc(video_format::HF64), Some(VideoFormat::Hf64));
        assert_eq!(VideoFormat::from_fourcc(0x1234), None);
    }
}
