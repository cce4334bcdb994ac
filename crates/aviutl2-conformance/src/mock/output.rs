//! Output job driver.
//!
//! Serves deterministic frames and samples on pull and simulates a user
//! abort after a configured number of `func_is_abort` polls.

use std::cell::RefCell;
use std::ffi::c_void;

use aviutl2::{VideoFormat, WideString};
use aviutl2_sys as sys;
use aviutl2_sys::audio_format;
use serde::Serialize;

use super::{to_i32, to_usize};

/// Output job handed to `func_output`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputJob {
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
    /// Audio sample rate.
    pub sample_rate: i32,
    /// Audio channels.
    pub channels: usize,
    /// Number of audio samples.
    pub samples: usize,
    /// Request video.
    pub video: bool,
    /// Request audio.
    pub audio: bool,
    /// `func_is_abort` turns true after this many polls.
    pub abort_after_polls: Option<usize>,
    /// Destination file name.
    pub savefile: String,
}

impl Default for OutputJob {
    fn default() -> Self {
        Self {
            width: 64,
            height: 36,
            rate: 30,
            scale: 1,
            frames: 60,
            sample_rate: 48_000,
            channels: 2,
            samples: 60 * 1600,
            video: true,
            audio: true,
            abort_after_polls: None,
            savefile: std::env::temp_dir()
                .join("aviutl2-conformance-output.bin")
                .display()
                .to_string(),
        }
    }
}

impl OutputJob {
    fn info_flags(&self) -> sys::OutputInfoFlags {
        let mut flags = sys::OutputInfoFlags::empty();
        flags.set(sys::OutputInfoFlags::VIDEO, self.video);
        flags.set(sys::OutputInfoFlags::AUDIO, self.audio);
        flags
    }
}

/// What the plugin did during one `func_output` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutputRun {
    /// Return value of `func_output`.
    pub returned: bool,
    /// Number of `func_is_abort` calls.
    pub polls: usize,
    /// Whether abort was signalled.
    pub abort_signalled: bool,
    /// Frames pulled, in order.
    pub frames_requested: Vec<usize>,
    /// Frames pulled after abort was signalled.
    pub frames_after_abort: usize,
    /// Sample frames delivered by `func_get_audio`.
    pub samples_delivered: usize,
    /// Pulls with an unknown format tag.
    pub unknown_formats: usize,
    /// `func_rest_time_disp` calls.
    pub rest_time_updates: usize,
    /// Last `func_set_buffer_size` arguments.
    pub buffer_size: Option<(i32, i32)>,
}

#[derive(Default)]
struct OutputState {
    job: OutputJob,
    run: OutputRun,
    video: Vec<u8>,
    audio: Vec<u8>,
}

thread_local! {
    static STATE: RefCell<OutputState> = RefCell::new(OutputState::default());
}

/// Byte `index` of frame `frame` as served by the mock.
#[must_use]
pub fn frame_byte(frame: usize, index: usize) -> u8 {
    (frame.wrapping_mul(31).wrapping_add(index) & 0xff) as u8
}

/// Sample value served at absolute sample `position`, channel `channel`.
#[must_use]
pub fn sample_value(position: usize, channel: usize) -> i16 {
    let phase = (position.wrapping_add(channel.wrapping_mul(7)) % 512) as i16;
    phase - 256
}

unsafe extern "C" fn get_video(frame: i32, format: u32) -> *mut c_void {
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        let Some(format) = VideoFormat::from_fourcc(format) else {
            state.run.unknown_formats += 1;
            return std::ptr::null_mut();
        };
        let frame = match usize::try_from(frame) {
            Ok(frame) if frame < state.job.frames => frame,
            _ => return std::ptr::null_mut(),
        };
        state.run.frames_requested.push(frame);
        if state.run.abort_signalled {
            state.run.frames_after_abort += 1;
        }
        let size = format.frame_size(state.job.width, state.job.height);
        state.video = (0..size).map(|i| frame_byte(frame, i)).collect();
        state.video.as_mut_ptr().cast()
    })
}

unsafe extern "C" fn get_audio(start: i32, length: i32, readed: *mut i32, format: u32) -> *mut c_void {
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        let start = to_usize(start);
        let count = to_usize(length).min(state.job.samples.saturating_sub(start));
        let channels = state.job.channels;
        let values = (start..start + count)
            .flat_map(|pos| (0..channels).map(move |ch| sample_value(pos, ch)));
        let bytes: Vec<u8> = match u16::try_from(format) {
            Ok(audio_format::PCM) => values.flat_map(i16::to_ne_bytes).collect(),
            Ok(audio_format::IEEE_FLOAT) => values
                .flat_map(|v| (f32::from(v) / 32_768.0).to_ne_bytes())
                .collect(),
            _ => {
                state.run.unknown_formats += 1;
                return std::ptr::null_mut();
            }
        };
        state.audio = bytes;
        state.run.samples_delivered += count;
        if !readed.is_null() {
            // SAFETY: non-null out-pointer supplied by the plugin for this call.
            unsafe { readed.write(to_i32(count)) };
        }
        state.audio.as_mut_ptr().cast()
    })
}

unsafe extern "C" fn is_abort() -> bool {
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        state.run.polls += 1;
        if let Some(limit) = state.job.abort_after_polls
            && state.run.polls > limit
        {
            state.run.abort_signalled = true;
        }
        state.run.abort_signalled
    })
}

unsafe extern "C" fn rest_time_disp(_now: i32, _total: i32) {
    STATE.with(|state| state.borrow_mut().run.rest_time_updates += 1);
}

unsafe extern "C" fn set_buffer_size(video: i32, audio: i32) {
    STATE.with(|state| state.borrow_mut().run.buffer_size = Some((video, audio)));
}

/// Run `func_output` against `job` on this thread.
pub fn run(func_output: unsafe extern "C" fn(*mut sys::OutputInfo) -> bool, job: OutputJob) -> OutputRun {
    let savefile = WideString::new(&job.savefile);
    let mut info = sys::OutputInfo {
        flag: job.info_flags().bits(),
        w: to_i32(job.width),
        h: to_i32(job.height),
        rate: job.rate,
        scale: job.scale,
        n: to_i32(job.frames),
        audio_rate: job.sample_rate,
        audio_ch: to_i32(job.channels),
        audio_n: to_i32(job.samples),
        savefile: savefile.as_ptr(),
        func_get_video: Some(get_video),
        func_get_audio: Some(get_audio),
        func_is_abort: Some(is_abort),
        func_rest_time_disp: Some(rest_time_disp),
        func_set_buffer_size: Some(set_buffer_size),
    };
    STATE.with(|state| {
        *state.borrow_mut() = OutputState {
            job,
            ..OutputState::default()
        };
    });
    // SAFETY: `info` and `savefile` outlive the call.
    let returned = unsafe { func_output(&raw mut info) };
    STATE.with(|state| {
        let mut state = state.take();
        state.run.returned = returned;
        state.run
    })
}
