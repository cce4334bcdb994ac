//! Per-call processing contexts.
//!
//! A context borrows the host's processing struct for the duration of one
//! `func_proc_video` / `func_proc_audio` call. Image and sample buffers are
//! copied in and out; texture handles cannot outlive the call.

use std::marker::PhantomData;
use std::ptr::NonNull;

use aviutl2_sys::{self as sys, ObjectInfo, PixelRgba, SceneInfo};

use crate::error::{Aviutl2Error, Result};
use crate::plugin::{to_i32, to_usize};

/// `ID3D11Texture2D` handle, valid until the process call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture2d<'a> {
    raw: NonNull<sys::Texture2d>,
    _call: PhantomData<&'a ()>,
}

impl Texture2d<'_> {
    /// Raw texture pointer, to be passed to Direct3D.
    #[must_use]
    pub fn as_ptr(&self) -> *mut sys::Texture2d {
        self.raw.as_ptr()
    }
}

/// Video filter call context.
#[derive(Debug)]
pub struct VideoFilterContext<'a> {
    raw: &'a sys::FilterProcVideo,
}

impl<'a> VideoFilterContext<'a> {
    /// Wrap the host's processing struct.
    ///
    /// # Safety
    ///
    /// `raw` must be the pointer the host passed to the current
    /// `func_proc_video` call, and `'a` must end with that call.
    #[must_use]
    pub unsafe fn from_raw(raw: *mut sys::FilterProcVideo) -> Option<Self> {
        // SAFETY: non-null pointers are valid per the caller contract.
        unsafe { raw.as_ref() }.map(|raw| Self { raw })
    }

    /// Scene parameters.
    #[must_use]
    pub fn scene(&self) -> SceneInfo {
        // SAFETY: the host keeps `scene` valid for the call.
        unsafe { self.raw.scene.as_ref() }.copied().unwrap_or_default()
    }

    /// Object parameters, including the current image size.
    #[must_use]
    pub fn object(&self) -> ObjectInfo {
        // SAFETY: the host keeps `object` valid for the call.
        unsafe { self.raw.object.as_ref() }.copied().unwrap_or_default()
    }

    /// Current image size in pixels.
    #[must_use]
    pub fn size(&self) -> (usize, usize) {
        let object = self.object();
        (to_usize(object.width), to_usize(object.height))
    }

    /// Copy of the current image, row-major RGBA.
    ///
    /// # Errors
    ///
    /// Returns [`Aviutl2Error::Unsupported`] if the host lacks the accessor,
    /// or [`Aviutl2Error::DataTooLarge`] when the reported size cannot be
    /// allocated.
    pub fn image(&self) -> Result<Vec<PixelRgba>> {
        let get = self
            .raw
            .get_image_data
            .ok_or(Aviutl2Error::Unsupported("get_image_data"))?;
        let (width, height) = self.size();
        let pixel_bytes = std::mem::size_of::<PixelRgba>();
        let too_large = Aviutl2Error::DataTooLarge {
            size: width.saturating_mul(height).saturating_mul(pixel_bytes),
            max: isize::MAX.unsigned_abs(),
        };
        let Some(len) = width.checked_mul(height) else {
            return Err(too_large);
        };
        let mut pixels = Vec::new();
        if pixels.try_reserve_exact(len).is_err() {
            return Err(too_large);
        }
        pixels.resize(len, PixelRgba::default());
        if !pixels.is_empty() {
            // SAFETY: the buffer holds exactly width * height pixels.
            unsafe { get(pixels.as_mut_ptr()) };
        }
        Ok(pixels)
    }

    /// Replace the current image with `pixels` of `width * height`.
    ///
    /// # Errors
    ///
    /// Returns [`Aviutl2Error::SizeMismatch`] when the buffer length does not
    /// match the dimensions.
    pub fn set_image(&mut self, pixels: &[PixelRgba], width: usize, height: usize) -> Result<()> {
        let expected = width.saturating_mul(height);
        if pixels.len() != expected {
            return Err(Aviutl2Error::SizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        let set = self
            .raw
            .set_image_data
            .ok_or(Aviutl2Error::Unsupported("set_image_data"))?;
        // SAFETY: the host only reads `width * height` pixels from the buffer.
        unsafe { set(pixels.as_ptr().cast_mut(), to_i32(width), to_i32(height)) };
        Ok(())
    }

    /// Resize the image, leaving its contents undefined.
    ///
    /// # Errors
    ///
    /// Returns [`Aviutl2Error::Unsupported`] if the host lacks the accessor.
    pub fn resize(&mut self, width: usize, height: usize) -> Result<()> {
        let set = self
            .raw
            .set_image_data
            .ok_or(Aviutl2Error::Unsupported("set_image_data"))?;
        // SAFETY: a NULL buffer asks the host for a resize only.
        unsafe { set(std::ptr::null_mut(), to_i32(width), to_i32(height)) };
        Ok(())
    }

    /// Texture of the current image. Invalidated by `set_image`/`resize`,
    /// which the `&mut self` borrow enforces.
    #[must_use]
    pub fn image_texture(&self) -> Option<Texture2d<'_>> {
        let get = self.raw.get_image_texture2d?;
        // SAFETY: no arguments; the host returns a texture valid for the call.
        NonNull::new(unsafe { get() }).map(|raw| Texture2d {
            raw,
            _call: PhantomData,
        })
    }

    /// Framebuffer texture.
    #[must_use]
    pub fn framebuffer_texture(&self) -> Option<Texture2d<'a>> {
        let get = self.raw.get_framebuffer_texture2d?;
        // SAFETY: no arguments; the host returns a texture valid for the call.
        NonNull::new(unsafe { get() }).map(|raw| Texture2d {
            raw,
            _call: PhantomData,
        })
    }
}

/// Audio filter call context.
#[derive(Debug)]
pub struct AudioFilterContext<'a> {
    raw: &'a sys::FilterProcAudio,
}

impl AudioFilterContext<'_> {
    /// Wrap the host's processing struct.
    ///
    /// # Safety
    ///
    /// `raw` must be the pointer the host passed to the current
    /// `func_proc_audio` call, and the context must not outlive that call.
    #[must_use]
    pub unsafe fn from_raw(raw: *mut sys::FilterProcAudio) -> Option<Self> {
        // SAFETY: non-null pointers are valid per the caller contract.
        unsafe { raw.as_ref() }.map(|raw| Self { raw })
    }

    /// Scene parameters.
    #[must_use]
    pub fn scene(&self) -> SceneInfo {
        // SAFETY: the host keeps `scene` valid for the call.
        unsafe { self.raw.scene.as_ref() }.copied().unwrap_or_default()
    }

    /// Object parameters, including the sample block layout.
    #[must_use]
    pub fn object(&self) -> ObjectInfo {
        // SAFETY: the host keeps `object` valid for the call.
        unsafe { self.raw.object.as_ref() }.copied().unwrap_or_default()
    }

    /// Samples per channel in this block.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        to_usize(self.object().sample_num)
    }

    /// Channel count.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        to_usize(self.object().channel_num)
    }

    fn channel_index(&self, channel: usize) -> Result<i32> {
        if channel >= self.channel_count() {
            return Err(Aviutl2Error::SizeMismatch {
                expected: self.channel_count(),
                actual: channel,
            });
        }
        Ok(to_i32(channel))
    }

    /// Copy of one channel's samples.
    ///
    /// # Errors
    ///
    /// Fails for an out-of-range channel or a missing accessor.
    pub fn samples(&self, channel: usize) -> Result<Vec<f32>> {
        let index = self.channel_index(channel)?;
        let get = self
            .raw
            .get_sample_data
            .ok_or(Aviutl2Error::Unsupported("get_sample_data"))?;
        let mut samples = vec![0.0f32; self.sample_count()];
        if !samples.is_empty() {
            // SAFETY: the buffer holds `sample_num` floats.
            unsafe { get(samples.as_mut_ptr(), index) };
        }
        Ok(samples)
    }

    /// Replace one channel's samples; `samples.len()` must equal
    /// [`AudioFilterContext::sample_count`].
    ///
    /// # Errors
    ///
    /// Returns [`Aviutl2Error::SizeMismatch`] for a wrong length or channel.
    pub fn set_samples(&mut self, channel: usize, samples: &[f32]) -> Result<()> {
        let index = self.channel_index(channel)?;
        if samples.len() != self.sample_count() {
            return Err(Aviutl2Error::SizeMismatch {
                expected: self.sample_count(),
                actual: samples.len(),
            });
        }
        let set = self
            .raw
            .set_sample_data
            .ok_or(Aviutl2Error::Unsupported("set_sample_data"))?;
        // SAFETY: the host reads exactly `sample_num` floats.
        unsafe { set(samples.as_ptr().cast_mut(), index) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    thread_local! {
        static IMAGE: RefCell<(Vec<PixelRgba>, i32, i32)> = const { RefCell::new((Vec::new(), 0, 0)) };
        static CHANNELS: RefCell<Vec<Vec<f32>>> = const { RefCell::new(Vec::new()) };
    }

    unsafe extern "C" fn get_image(buffer: *mut PixelRgba) {
        IMAGE.with(|img| {
            let img = img.borrow();
            // SAFETY: the context sized the buffer to width * height.
            unsafe { std::ptr::copy_nonoverlapping(img.0.as_ptr(), buffer, img.0.len()) };
        });
    }

    unsafe extern "C" fn set_image(buffer: *mut PixelRgba, width: i32, height: i32) {
        let len = to_usize(width) * to_usize(height);
        let pixels = if buffer.is_null() {
            vec![PixelRgba::default(); len]
        } else {
            // SAFETY: the context passes width * height pixels.
            unsafe { std::slice::from_raw_parts(buffer, len) }.to_vec()
        };
        IMAGE.with(|img| *img.borrow_mut() = (pixels, width, height));
    }

    unsafe extern "C" fn get_samples(buffer: *mut f32, channel: i32) {
        CHANNELS.with(|c| {
            let c = c.borrow();
            if let Some(data) = c.get(to_usize(channel)) {
                // SAFETY: the context sized the buffer to sample_num.
                unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), buffer, data.len()) };
            }
        });
    }

    unsafe extern "C" fn set_samples(buffer: *mut f32, channel: i32) {
        CHANNELS.with(|c| {
            let mut c = c.borrow_mut();
            if let Some(data) = c.get_mut(to_usize(channel)) {
                let len = data.len();
                // SAFETY: the context passes sample_num floats.
                *data = unsafe { std::slice::from_raw_parts(buffer, len) }.to_vec();
            }
        });
    }

    #[test]
    fn test_video_image_round_trip() -> TestResult {
        let red = PixelRgba { r: 255, g: 0, b: 0, a: 255 };
        IMAGE.with(|img| *img.borrow_mut() = (vec![red; 6], 3, 2));
        let scene = SceneInfo::default();
        let object = ObjectInfo {
            width: 3,
            height: 2,
            ..ObjectInfo::default()
        };
        let mut raw = sys::FilterProcVideo {
            scene: &scene,
            object: &object,
            get_image_data: Some(get_image),
            set_image_data: Some(set_image),
            get_image_texture2d: None,
            get_framebuffer_texture2d: None,
        };
        // SAFETY: `raw` outlives the context.
        let mut ctx = unsafe { VideoFilterContext::from_raw(&mut raw) }.ok_or("null")?;
        let mut pixels = ctx.image()?;
        assert_eq!(pixels.len(), 6);
        for p in &mut pixels {
            p.g = 128;
        }
        ctx.set_image(&pixels, 3, 2)?;
        assert!(matches!(
            ctx.set_image(&pixels, 4, 2),
            Err(Aviutl2Error::SizeMismatch { expected: 8, actual: 6 })
        ));
        ctx.resize(1, 1)?;
        IMAGE.with(|img| assert_eq!(img.borrow().0.len(), 1));
        assert!(ctx.image_texture().is_none());
        Ok(())
    }

    #[test]
    fn test_image_rejects_unallocatable_size() -> TestResult {
        let scene = SceneInfo::default();
        let object = ObjectInfo {
            width: i32::MAX,
            height: i32::MAX,
            ..ObjectInfo::default()
        };
        let mut raw = sys::FilterProcVideo {
            scene: &scene,
            object: &object,
            get_image_data: Some(get_image),
            set_image_data: Some(set_image),
            get_image_texture2d: None,
            get_framebuffer_texture2d: None,
        };
        // SAFETY: `raw` outlives the context.
        let ctx = unsafe { VideoFilterContext::from_raw(&mut raw) }.ok_or("null")?;
        assert!(matches!(ctx.image(), Err(Aviutl2Error::DataTooLarge { .. })));
        Ok(())
    }

    #[test]
    fn test_audio_channels() -> TestResult {
        CHANNELS.with(|c| *c.borrow_mut() = vec![vec![0.5; 4], vec![-0.5; 4]]);
        let scene = SceneInfo::default();
        let object = ObjectInfo {
            sample_num: 4,
            channel_num: 2,
            ..ObjectInfo::default()
        };
        let mut raw = sys::FilterProcAudio {
            scene: &scene,
            object: &object,
            get_sample_data: Some(get_samples),
            set_sample_data: Some(set_samples),
        };
        // SAFETY: `raw` outlives the context.
        let mut ctx = unsafe { AudioFilterContext::from_raw(&mut raw) }.ok_or("null")?;
        let left = ctx.samples(0)?;
        let doubled: Vec<f32> = left.iter().map(|s| s * 2.0).collect();
        ctx.set_samples(0, &doubled)?;
        CHANNELS.with(|c| assert_eq!(c.borrow().first(), Some(&vec![1.0f32; 4])));
        assert!(matches!(ctx.samples(2), Err(Aviutl2Error::SizeMismatch { .. })));
        assert!(matches!(
            ctx.set_samples(1, &[0.0; 3]),
            Err(Aviutl2Error::SizeMismatch { expected: 4, actual: 3 })
        ));
        Ok(())
    }
}
