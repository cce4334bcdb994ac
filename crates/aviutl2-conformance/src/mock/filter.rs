//! Filter processing host: one image or sample block per call.

use std::cell::RefCell;

use aviutl2_sys as sys;
use aviutl2_sys::PixelRgba;
use serde::Serialize;

use super::{to_i32, to_usize};

/// Result of one `func_proc_video` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VideoRun {
    /// Return value.
    pub returned: bool,
    /// Image after the call, row-major.
    #[serde(skip)]
    pub image: Vec<PixelRgba>,
    /// Width after the call.
    pub width: usize,
    /// Height after the call.
    pub height: usize,
    /// `get_image_data` calls.
    pub reads: usize,
    /// `set_image_data` calls.
    pub writes: usize,
}

/// Result of one `func_proc_audio` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AudioRun {
    /// Return value.
    pub returned: bool,
    /// Samples after the call, one vector per channel.
    #[serde(skip)]
    pub channels: Vec<Vec<f32>>,
    /// `get_sample_data` calls.
    pub reads: usize,
    /// `set_sample_data` calls.
    pub writes: usize,
    /// Calls naming a channel that does not exist.
    pub bad_channels: usize,
}

struct VideoState {
    run: VideoRun,
    object: *mut sys::ObjectInfo,
}

impl Default for VideoState {
    fn default() -> Self {
        Self {
            run: VideoRun::default(),
            object: std::ptr::null_mut(),
        }
    }
}

thread_local! {
    static VIDEO: RefCell<VideoState> = RefCell::new(VideoState::default());
    static AUDIO: RefCell<AudioRun> = RefCell::new(AudioRun::default());
}

unsafe extern "C" fn get_image_data(buffer: *mut PixelRgba) {
    VIDEO.with(|state| {
        let mut state = state.borrow_mut();
        state.run.reads += 1;
        if buffer.is_null() {
            return;
        }
        let image = &state.run.image;
        // SAFETY: the plugin supplies `width * height` pixels, which is the
        // current image length.
        unsafe { std::ptr::copy_nonoverlapping(image.as_ptr(), buffer, image.len()) };
    });
}

unsafe extern "C" fn set_image_data(buffer: *mut PixelRgba, width: i32, height: i32) {
    VIDEO.with(|state| {
        let mut state = state.borrow_mut();
        let (width, height) = (to_usize(width), to_usize(height));
        state.run.writes += 1;
        state.run.image = if buffer.is_null() {
            vec![PixelRgba::default(); width * height]
        } else {
            // SAFETY: the plugin supplies `width * height` readable pixels.
            unsafe { std::slice::from_raw_parts(buffer.cast_const(), width * height) }.to_vec()
        };
        state.run.width = width;
        state.run.height = height;
        if !state.object.is_null() {
            // SAFETY: `object` points at the live `ObjectInfo` of the running
            // call; the plugin only reads it through a shared pointer.
            let object = unsafe { &mut *state.object };
            object.width = to_i32(width);
            object.height = to_i32(height);
        }
    });
}

unsafe extern "C" fn get_sample_data(buffer: *mut f32, channel: i32) {
    AUDIO.with(|state| {
        let mut state = state.borrow_mut();
        state.reads += 1;
        let Some(samples) = usize::try_from(channel).ok().and_then(|c| state.channels.get(c)) else {
            state.bad_channels += 1;
            return;
        };
        if buffer.is_null() {
            return;
        }
        // SAFETY: the plugin supplies `sample_num` floats, the block length.
        unsafe { std::ptr::copy_nonoverlapping(samples.as_ptr(), buffer, samples.len()) };
    });
}

unsafe extern "C" fn set_sample_data(buffer: *mut f32, channel: i32) {
    AUDIO.with(|state| {
        let mut state = state.borrow_mut();
        state.writes += 1;
        let Some(samples) = usize::try_from(channel).ok().and_then(|c| state.channels.get_mut(c)) else {
            state.bad_channels += 1;
            return;
        };
        if buffer.is_null() {
            return;
        }
        // SAFETY: the plugin supplies `sample_num` floats, the block length.
        let source = unsafe { std::slice::from_raw_parts(buffer.cast_const(), samples.len()) };
        samples.copy_from_slice(source);
    });
}

/// Run `func_proc_video` on `image` of `width * height` pixels.
pub fn run_video(
    func: unsafe extern "C" fn(*mut sys::FilterProcVideo) -> bool,
    scene: sys::SceneInfo,
    mut object: sys::ObjectInfo,
    image: Vec<PixelRgba>,
    width: usize,
) -> VideoRun {
    let height = image.len().checked_div(width).unwrap_or(0);
    object.width = to_i32(width);
    object.height = to_i32(height);
    VIDEO.with(|state| {
        *state.borrow_mut() = VideoState {
            run: VideoRun {
                image,
                width,
                height,
                ..VideoRun::default()
            },
            object: &raw mut object,
        };
    });
    let mut raw = sys::FilterProcVideo {
        scene: &raw const scene,
        object: &raw const object,
        get_image_data: Some(get_image_data),
        set_image_data: Some(set_image_data),
        get_image_texture2d: None,
        get_framebuffer_texture2d: None,
    };
    // SAFETY: every pointer in `raw` outlives the call.
    let returned = unsafe { func(&raw mut raw) };
    VIDEO.with(|state| {
        let mut state = state.take();
        state.run.returned = returned;
        state.run
    })
}

/// Run `func_proc_audio` on one block; all channels must have equal length.
pub fn run_audio(
    func: unsafe extern "C" fn(*mut sys::FilterProcAudio) -> bool,
    scene: sys::SceneInfo,
    mut object: sys::ObjectInfo,
    channels: Vec<Vec<f32>>,
) -> AudioRun {
    let block = channels.iter().map(Vec::len).min().unwrap_or(0);
    let channels: Vec<Vec<f32>> = channels
        .into_iter()
        .map(|mut c| {
            c.truncate(block);
            c
        })
        .collect();
    object.sample_num = to_i32(block);
    object.channel_num = to_i32(channels.len());
    AUDIO.with(|state| {
        *state.borrow_mut() = AudioRun {
            channels,
            ..AudioRun::default()
        };
    });
    let mut raw = sys::FilterProcAudio {
        scene: &raw const scene,
        object: &raw const object,
        get_sample_data: Some(get_sample_data),
        set_sample_data: Some(set_sample_data),
    };
    // SAFETY: every pointer in `raw` outlives the call.
    let returned = unsafe { func(&raw mut raw) };
    AUDIO.with(|state| {
        let mut run = state.take();
        run.returned = returned;
        run
    })
}
